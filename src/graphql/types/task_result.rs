use crate::domain::TaskResult as DomainTaskResult;
use async_graphql::Object;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of a background task
pub struct TaskResult {
    pub inner: DomainTaskResult,
}

impl From<DomainTaskResult> for TaskResult {
    fn from(result: DomainTaskResult) -> Self {
        Self { inner: result }
    }
}

#[Object]
impl TaskResult {
    async fn id(&self) -> Uuid {
        self.inner.id
    }

    async fn task_name(&self) -> &str {
        &self.inner.task_name
    }

    /// SUCCESS, FAILURE or SKIPPED
    async fn status(&self) -> &str {
        self.inner.status.as_str()
    }

    async fn result(&self) -> Option<&str> {
        self.inner.result.as_deref()
    }

    async fn error(&self) -> Option<&str> {
        self.inner.error.as_deref()
    }

    async fn attempts(&self) -> u32 {
        self.inner.attempts
    }

    async fn enqueued_at(&self) -> DateTime<Utc> {
        self.inner.enqueued_at
    }

    async fn finished_at(&self) -> DateTime<Utc> {
        self.inner.finished_at
    }
}
