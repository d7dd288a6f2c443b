use super::Job;
use crate::config::TasksConfig;
use crate::domain::{TaskResult, TaskStatus};
use crate::error::{Result, ShopError};
use crate::observability::metrics;
use crate::storage::Storage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Runs the body of a job and returns a short human-readable result
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &Job) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub concurrency: usize,
}

impl From<&TasksConfig> for QueueSettings {
    fn from(config: &TasksConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            concurrency: config.concurrency.max(1),
        }
    }
}

struct Submission {
    id: Uuid,
    job: Job,
    delay: Duration,
    enqueued_at: DateTime<Utc>,
}

enum Command {
    Submit(Submission),
    Shutdown,
}

/// Cheap-to-clone handle for submitting jobs to the background worker
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Command>,
}

/// Owns the worker task; `shutdown` drains everything already submitted
pub struct TaskWorker {
    sender: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl TaskQueue {
    /// Spawn the worker on the current tokio runtime
    pub fn start(
        executor: Arc<dyn JobExecutor>,
        storage: Arc<dyn Storage>,
        settings: QueueSettings,
    ) -> (TaskQueue, TaskWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = Arc::new(WorkerState {
            executor,
            storage,
            permits: Semaphore::new(settings.concurrency.max(1)),
            claimed_keys: Mutex::new(HashSet::new()),
            settings,
        });
        let handle = tokio::spawn(run_worker(receiver, state));

        (
            TaskQueue {
                sender: sender.clone(),
            },
            TaskWorker { sender, handle },
        )
    }

    /// Run `job` as soon as a worker slot is free
    pub fn enqueue(&self, job: Job) -> Result<Uuid> {
        self.enqueue_in(job, Duration::ZERO)
    }

    /// Run `job` once `delay` has elapsed
    pub fn enqueue_in(&self, job: Job, delay: Duration) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let task = job.name();
        self.sender
            .send(Command::Submit(Submission {
                id,
                job,
                delay,
                enqueued_at: Utc::now(),
            }))
            .map_err(|_| ShopError::Task("task queue is shut down".to_string()))?;

        metrics::tasks::enqueued(task);
        debug!(task_id = %id, task, delay_ms = delay.as_millis() as u64, "Task enqueued");
        Ok(id)
    }
}

impl TaskWorker {
    /// Stop accepting jobs and wait for running and delayed ones to finish
    pub async fn shutdown(self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Err(e) = self.handle.await {
            error!("Task worker terminated abnormally: {}", e);
        }
    }
}

struct WorkerState {
    executor: Arc<dyn JobExecutor>,
    storage: Arc<dyn Storage>,
    permits: Semaphore,
    /// Keys of jobs that are running or already succeeded
    claimed_keys: Mutex<HashSet<String>>,
    settings: QueueSettings,
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<Command>, state: Arc<WorkerState>) {
    info!(
        concurrency = state.settings.concurrency,
        max_retries = state.settings.max_retries,
        "Task worker started"
    );
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            command = receiver.recv() => match command {
                Some(Command::Submit(submission)) => spawn_submission(&mut in_flight, &state, submission),
                Some(Command::Shutdown) | None => break,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!("Task panicked: {}", e);
                }
            }
        }
    }

    // Submissions accepted before the channel closed still run
    receiver.close();
    while let Ok(command) = receiver.try_recv() {
        if let Command::Submit(submission) = command {
            spawn_submission(&mut in_flight, &state, submission);
        }
    }
    info!(pending = in_flight.len(), "Task worker draining");
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!("Task panicked: {}", e);
        }
    }
    info!("Task worker stopped");
}

fn spawn_submission(in_flight: &mut JoinSet<()>, state: &Arc<WorkerState>, submission: Submission) {
    let state = state.clone();
    let span = tracing::info_span!("task", task_id = %submission.id, task = submission.job.name());
    in_flight.spawn(async move { state.process(submission).await }.instrument(span));
}

impl WorkerState {
    async fn process(&self, submission: Submission) {
        if !submission.delay.is_zero() {
            tokio::time::sleep(submission.delay).await;
        }

        let task = submission.job.name();
        let key = submission.job.idempotency_key();
        if let Some(key) = &key {
            if !self.claim(key) {
                info!(key = %key, "Skipping task already completed or in progress");
                metrics::tasks::skipped(task);
                self.record(&submission, TaskStatus::Skipped, None, None, 0).await;
                return;
            }
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = {
                let _permit = match self.permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!("Task semaphore closed");
                        return;
                    }
                };
                let started = Instant::now();
                let outcome = self.executor.execute(&submission.job).await;
                (outcome, started.elapsed())
            };

            match outcome {
                (Ok(summary), elapsed) => {
                    info!(attempt, elapsed_ms = elapsed.as_millis() as u64, "Task succeeded");
                    metrics::tasks::succeeded(task, elapsed.as_secs_f64());
                    self.record(&submission, TaskStatus::Success, Some(summary), None, attempt)
                        .await;
                    return;
                }
                (Err(e), _) if attempt <= self.settings.max_retries => {
                    warn!(attempt, error = %e, "Task failed, retrying");
                    metrics::tasks::retried(task);
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                (Err(e), _) => {
                    error!(attempt, error = %e, "Task failed permanently");
                    metrics::tasks::failed(task);
                    if let Some(key) = &key {
                        self.release(key);
                    }
                    self.record(&submission, TaskStatus::Failure, None, Some(e.to_string()), attempt)
                        .await;
                    return;
                }
            }
        }
    }

    fn claim(&self, key: &str) -> bool {
        match self.claimed_keys.lock() {
            Ok(mut keys) => keys.insert(key.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(key.to_string()),
        }
    }

    fn release(&self, key: &str) {
        match self.claimed_keys.lock() {
            Ok(mut keys) => keys.remove(key),
            Err(poisoned) => poisoned.into_inner().remove(key),
        };
    }

    async fn record(
        &self,
        submission: &Submission,
        status: TaskStatus,
        result: Option<String>,
        error: Option<String>,
        attempts: u32,
    ) {
        let task_result = TaskResult {
            id: submission.id,
            task_name: submission.job.name().to_string(),
            status,
            result,
            error,
            attempts,
            enqueued_at: submission.enqueued_at,
            finished_at: Utc::now(),
        };
        if let Err(e) = self.storage.record_task_result(&task_result).await {
            error!("Failed to record task result: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyExecutor {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl JobExecutor for FlakyExecutor {
        async fn execute(&self, _job: &Job) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                Err(ShopError::Task(format!("boom {call}")))
            } else {
                Ok("done".to_string())
            }
        }
    }

    fn settings(max_retries: u32) -> QueueSettings {
        QueueSettings {
            max_retries,
            retry_delay: Duration::from_millis(1),
            concurrency: 2,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let storage = Arc::new(InMemoryStorage::new());
        let executor = Arc::new(FlakyExecutor { calls: AtomicU32::new(0), fail_first: 2 });
        let (queue, worker) = TaskQueue::start(executor.clone(), storage.clone(), settings(3));

        queue.enqueue(Job::HelloWorld).unwrap();
        worker.shutdown().await;

        let results = storage.list_task_results(10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TaskStatus::Success);
        assert_eq!(results[0].attempts, 3);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_recorded_after_retries_exhausted() {
        let storage = Arc::new(InMemoryStorage::new());
        let executor = Arc::new(FlakyExecutor { calls: AtomicU32::new(0), fail_first: u32::MAX });
        let (queue, worker) = TaskQueue::start(executor, storage.clone(), settings(1));

        queue.enqueue(Job::DailyStatistics).unwrap();
        worker.shutdown().await;

        let results = storage.list_task_results(10).await.unwrap();
        assert_eq!(results[0].status, TaskStatus::Failure);
        assert_eq!(results[0].attempts, 2);
        assert_eq!(results[0].error.as_deref(), Some("Task error: boom 2"));
    }

    #[tokio::test]
    async fn test_duplicate_idempotent_job_is_skipped() {
        let storage = Arc::new(InMemoryStorage::new());
        let executor = Arc::new(FlakyExecutor { calls: AtomicU32::new(0), fail_first: 0 });
        let (queue, worker) = TaskQueue::start(executor.clone(), storage.clone(), settings(0));

        let job = Job::WelcomeEmail { user_id: 1 };
        queue.enqueue(job.clone()).unwrap();
        queue.enqueue_in(job, Duration::from_millis(20)).unwrap();
        worker.shutdown().await;

        let statuses: Vec<TaskStatus> = storage
            .list_task_results(10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert!(statuses.contains(&TaskStatus::Success));
        assert!(statuses.contains(&TaskStatus::Skipped));
    }

    #[tokio::test]
    async fn test_delayed_job_waits_for_countdown() {
        let storage = Arc::new(InMemoryStorage::new());
        let executor = Arc::new(FlakyExecutor { calls: AtomicU32::new(0), fail_first: 0 });
        let (queue, worker) = TaskQueue::start(executor.clone(), storage.clone(), settings(0));

        let started = Instant::now();
        queue.enqueue_in(Job::HelloWorld, Duration::from_millis(50)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);

        worker.shutdown().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submission_queued_behind_shutdown_still_runs() {
        let storage = Arc::new(InMemoryStorage::new());
        let executor = Arc::new(FlakyExecutor { calls: AtomicU32::new(0), fail_first: 0 });
        let (queue, worker) = TaskQueue::start(executor.clone(), storage.clone(), settings(0));

        // The worker has not polled yet, so the job sits behind the shutdown command
        assert!(worker.sender.send(Command::Shutdown).is_ok());
        let id = queue.enqueue(Job::HelloWorld).unwrap();
        worker.handle.await.unwrap();

        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        let results = storage.list_task_results(10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let storage = Arc::new(InMemoryStorage::new());
        let executor = Arc::new(FlakyExecutor { calls: AtomicU32::new(0), fail_first: 0 });
        let (queue, worker) = TaskQueue::start(executor, storage, settings(0));
        worker.shutdown().await;
        assert!(queue.enqueue(Job::HelloWorld).is_err());
    }
}
