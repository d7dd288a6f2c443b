#![allow(dead_code)]

use async_graphql::Request;
use async_trait::async_trait;
use serde_json::Value;
use shop_backend::app::ports::{EmailSender, MessageSender, OutgoingEmail, SheetWriter};
use shop_backend::error::Result;
use shop_backend::graphql::ShopSchema;
use shop_backend::server::build_app;
use shop_backend::storage::InMemoryStorage;
use shop_backend::tasks::{JobRunner, QueueSettings, TaskQueue, TaskWorker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const CHAT_ID: i64 = -1001;

/// Captures everything the background jobs send out
#[derive(Default)]
pub struct Recorder {
    pub messages: Mutex<Vec<(i64, String)>>,
    pub emails: Mutex<Vec<OutgoingEmail>>,
    pub rows: Mutex<Vec<Vec<Value>>>,
}

#[async_trait]
impl MessageSender for Recorder {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.messages.lock().await.push((chat_id, text.to_string()));
        Ok(())
    }
}

#[async_trait]
impl EmailSender for Recorder {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        self.emails.lock().await.push(email.clone());
        Ok(())
    }
}

#[async_trait]
impl SheetWriter for Recorder {
    async fn append_rows(&self, _range: &str, rows: &[Vec<Value>]) -> Result<()> {
        self.rows.lock().await.extend(rows.iter().cloned());
        Ok(())
    }
}

pub struct Harness {
    pub storage: Arc<InMemoryStorage>,
    pub recorder: Arc<Recorder>,
    pub schema: ShopSchema,
    pub router: axum::Router,
    pub worker: TaskWorker,
}

/// Full application over in-memory storage with recording senders
pub fn harness(order_delay: Duration) -> Harness {
    let storage = Arc::new(InMemoryStorage::new());
    let recorder = Arc::new(Recorder::default());
    let runner = JobRunner::new(
        storage.clone(),
        recorder.clone(),
        recorder.clone(),
        recorder.clone(),
        Some(CHAT_ID),
    );
    let settings = QueueSettings {
        max_retries: 1,
        retry_delay: Duration::from_millis(5),
        concurrency: 2,
    };
    let (queue, worker) = TaskQueue::start(Arc::new(runner), storage.clone(), settings);
    let (schema, router) = build_app(storage.clone(), queue, order_delay);

    Harness {
        storage,
        recorder,
        schema,
        router,
        worker,
    }
}

/// Run a GraphQL document and return `(data, error messages)`
pub async fn execute(schema: &ShopSchema, query: &str) -> (Value, Vec<String>) {
    let response = schema.execute(Request::new(query)).await;
    let errors = response.errors.iter().map(|e| e.message.clone()).collect();
    let data = response.data.into_json().unwrap_or(Value::Null);
    (data, errors)
}
