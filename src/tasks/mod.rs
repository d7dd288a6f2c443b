//! Background jobs: the queue that runs them, the job bodies, and the
//! periodic scheduler that enqueues recurring reports.

pub mod jobs;
pub mod queue;
pub mod scheduler;

pub use jobs::JobRunner;
pub use queue::{JobExecutor, QueueSettings, TaskQueue, TaskWorker};
pub use scheduler::{PeriodicTask, Schedule, Scheduler};

use crate::constants::task_names;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of background work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    HelloWorld,
    OrderCreatedMessage { order_uuid: Uuid },
    OrderDeletedMessage { order_uuid: Uuid },
    DailyStatistics,
    ProductsReport,
    WelcomeEmail { user_id: i64 },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::HelloWorld => task_names::HELLO_WORLD,
            Job::OrderCreatedMessage { .. } => task_names::ORDER_CREATED_MESSAGE,
            Job::OrderDeletedMessage { .. } => task_names::ORDER_DELETED_MESSAGE,
            Job::DailyStatistics => task_names::DAILY_STATISTICS,
            Job::ProductsReport => task_names::PRODUCTS_REPORT,
            Job::WelcomeEmail { .. } => task_names::WELCOME_EMAIL,
        }
    }

    /// Jobs sharing a key run successfully at most once per queue
    pub fn idempotency_key(&self) -> Option<String> {
        match self {
            Job::OrderCreatedMessage { order_uuid } => Some(format!("order-created:{order_uuid}")),
            Job::OrderDeletedMessage { order_uuid } => Some(format!("order-deleted:{order_uuid}")),
            Job::WelcomeEmail { user_id } => Some(format!("welcome-email:{user_id}")),
            Job::HelloWorld | Job::DailyStatistics | Job::ProductsReport => None,
        }
    }
}
