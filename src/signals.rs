//! Model lifecycle signals.
//!
//! Use cases emit a [`Signal`] after each successful write. Receivers run
//! synchronously in registration order and must stay cheap: anything that
//! talks to the outside world is handed to the task queue.

use crate::domain::{Order, User};
use crate::tasks::{Job, TaskQueue};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// Many-to-many change kinds, named after the hooks they mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum M2mAction {
    PostAdd,
    PostRemove,
    PostClear,
}

impl fmt::Display for M2mAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            M2mAction::PostAdd => "post_add",
            M2mAction::PostRemove => "post_remove",
            M2mAction::PostClear => "post_clear",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    OrderCreated(Order),
    OrderDeleted(Order),
    OrderProductsChanged {
        order_uuid: Uuid,
        action: M2mAction,
        product_ids: Vec<i64>,
    },
    ProductTagsChanged {
        product_id: i64,
        tag_ids: Vec<i64>,
    },
    UserCreated(User),
}

pub trait SignalReceiver: Send + Sync {
    fn receive(&self, signal: &Signal);
}

#[derive(Clone, Default)]
pub struct SignalBus {
    receivers: Vec<Arc<dyn SignalReceiver>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_receiver(mut self, receiver: Arc<dyn SignalReceiver>) -> Self {
        self.receivers.push(receiver);
        self
    }

    pub fn emit(&self, signal: Signal) {
        for receiver in &self.receivers {
            receiver.receive(&signal);
        }
    }
}

/// Turns lifecycle signals into background notification jobs
pub struct NotificationReceiver {
    queue: TaskQueue,
    order_delay: Duration,
}

impl NotificationReceiver {
    pub fn new(queue: TaskQueue, order_delay: Duration) -> Self {
        Self { queue, order_delay }
    }

    fn submit(&self, job: Job, delay: Duration) {
        let name = job.name();
        if let Err(e) = self.queue.enqueue_in(job, delay) {
            error!(task = name, "Failed to enqueue task from signal: {}", e);
        }
    }
}

impl SignalReceiver for NotificationReceiver {
    fn receive(&self, signal: &Signal) {
        match signal {
            Signal::OrderCreated(order) => {
                info!(order_uuid = %order.uuid, user_id = order.user_id, "Order created");
                self.submit(
                    Job::OrderCreatedMessage { order_uuid: order.uuid },
                    self.order_delay,
                );
            }
            Signal::OrderDeleted(order) => {
                info!(order_uuid = %order.uuid, "Order deleted");
                self.submit(Job::OrderDeletedMessage { order_uuid: order.uuid }, Duration::ZERO);
            }
            Signal::UserCreated(user) => {
                info!(user_id = user.id, username = %user.username, "User created");
                self.submit(Job::WelcomeEmail { user_id: user.id }, Duration::ZERO);
            }
            Signal::OrderProductsChanged {
                order_uuid,
                action,
                product_ids,
            } => {
                info!(%order_uuid, %action, ?product_ids, "Order products changed");
            }
            Signal::ProductTagsChanged { product_id, tag_ids } => {
                info!(product_id, ?tag_ids, "Product tags changed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl SignalReceiver for Collect {
        fn receive(&self, signal: &Signal) {
            let label = match signal {
                Signal::ProductTagsChanged { product_id, .. } => format!("tags:{product_id}"),
                other => format!("{other:?}"),
            };
            self.0.lock().unwrap().push(label);
        }
    }

    #[test]
    fn test_bus_dispatches_to_every_receiver_in_order() {
        let first = Arc::new(Collect::default());
        let second = Arc::new(Collect::default());
        let bus = SignalBus::new()
            .with_receiver(first.clone())
            .with_receiver(second.clone());

        bus.emit(Signal::ProductTagsChanged { product_id: 4, tag_ids: vec![1] });
        bus.emit(Signal::ProductTagsChanged { product_id: 5, tag_ids: vec![] });

        assert_eq!(*first.0.lock().unwrap(), vec!["tags:4", "tags:5"]);
        assert_eq!(*second.0.lock().unwrap(), vec!["tags:4", "tags:5"]);
    }

    #[test]
    fn test_m2m_action_names() {
        assert_eq!(M2mAction::PostAdd.to_string(), "post_add");
        assert_eq!(M2mAction::PostClear.to_string(), "post_clear");
    }
}
