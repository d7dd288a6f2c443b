//! Prometheus metrics for the shop backend.
//!
//! Recording functions are grouped by the part of the system they observe.
//! Recording is a no-op until [`init`] installs the exporter.

use std::fmt;
use std::net::SocketAddr;

use crate::error::{Result, ShopError};
use tracing::info;

/// Every metric name used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    OrdersCreated,
    OrdersDeleted,
    TasksEnqueued,
    TasksSucceeded,
    TasksFailed,
    TasksRetried,
    TasksSkipped,
    TaskDuration,
    NotificationsSent,
    NotificationsFailed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::OrdersCreated => "shop_orders_created_total",
            MetricName::OrdersDeleted => "shop_orders_deleted_total",
            MetricName::TasksEnqueued => "shop_tasks_enqueued_total",
            MetricName::TasksSucceeded => "shop_tasks_succeeded_total",
            MetricName::TasksFailed => "shop_tasks_failed_total",
            MetricName::TasksRetried => "shop_tasks_retried_total",
            MetricName::TasksSkipped => "shop_tasks_skipped_total",
            MetricName::TaskDuration => "shop_task_duration_seconds",
            MetricName::NotificationsSent => "shop_notifications_sent_total",
            MetricName::NotificationsFailed => "shop_notifications_failed_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus exporter with an HTTP listener on `addr`
pub fn init(addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| ShopError::Config(format!("Invalid metrics address '{addr}': {e}")))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ShopError::Config(format!("Failed to install Prometheus exporter: {e}")))?;
    info!("Prometheus exporter listening on http://{}/metrics", addr);
    Ok(())
}

pub mod orders {
    use super::MetricName;

    pub fn created(items: usize) {
        ::metrics::counter!(MetricName::OrdersCreated.as_str()).increment(1);
        ::metrics::histogram!("shop_order_items").record(items as f64);
    }

    pub fn deleted() {
        ::metrics::counter!(MetricName::OrdersDeleted.as_str()).increment(1);
    }
}

pub mod tasks {
    use super::MetricName;

    pub fn enqueued(task: &'static str) {
        ::metrics::counter!(MetricName::TasksEnqueued.as_str(), "task" => task).increment(1);
    }

    pub fn succeeded(task: &'static str, secs: f64) {
        ::metrics::counter!(MetricName::TasksSucceeded.as_str(), "task" => task).increment(1);
        ::metrics::histogram!(MetricName::TaskDuration.as_str(), "task" => task).record(secs);
    }

    pub fn failed(task: &'static str) {
        ::metrics::counter!(MetricName::TasksFailed.as_str(), "task" => task).increment(1);
    }

    pub fn retried(task: &'static str) {
        ::metrics::counter!(MetricName::TasksRetried.as_str(), "task" => task).increment(1);
    }

    pub fn skipped(task: &'static str) {
        ::metrics::counter!(MetricName::TasksSkipped.as_str(), "task" => task).increment(1);
    }
}

pub mod notifications {
    use super::MetricName;

    pub fn sent(channel: &'static str) {
        ::metrics::counter!(MetricName::NotificationsSent.as_str(), "channel" => channel).increment(1);
    }

    pub fn failed(channel: &'static str) {
        ::metrics::counter!(MetricName::NotificationsFailed.as_str(), "channel" => channel).increment(1);
    }
}
