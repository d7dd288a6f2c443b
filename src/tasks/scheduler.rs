use super::{Job, TaskQueue};
use crate::config::ScheduleConfig;
use crate::error::Result;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// When a periodic task fires, in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    DailyAt { hour: u32, minute: u32 },
    Every(Duration),
}

impl Schedule {
    /// The first firing strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Schedule::DailyAt { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
                let today = Utc.from_utc_datetime(&now.date_naive().and_time(time));
                if today > now {
                    today
                } else {
                    today + ChronoDuration::days(1)
                }
            }
            Schedule::Every(interval) => {
                let step = ChronoDuration::from_std(interval).unwrap_or_else(|_| ChronoDuration::hours(1));
                now + step.max(ChronoDuration::seconds(1))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeriodicTask {
    pub name: &'static str,
    pub job: Job,
    pub schedule: Schedule,
}

/// Enqueues periodic jobs on their schedules
pub struct Scheduler {
    tasks: Vec<PeriodicTask>,
    queue: TaskQueue,
}

impl Scheduler {
    pub fn new(tasks: Vec<PeriodicTask>, queue: TaskQueue) -> Self {
        Self { tasks, queue }
    }

    /// Daily statistics at the configured time and, when an interval is set,
    /// the products report
    pub fn from_config(config: &ScheduleConfig, queue: TaskQueue) -> Result<Self> {
        let mut tasks = Vec::new();
        if let Some((hour, minute)) = config.daily_statistics_time()? {
            tasks.push(PeriodicTask {
                name: "daily-statistics",
                job: Job::DailyStatistics,
                schedule: Schedule::DailyAt { hour, minute },
            });
        }
        if let Some(hours) = config.products_report_interval_hours.filter(|h| *h > 0) {
            tasks.push(PeriodicTask {
                name: "products-report",
                job: Job::ProductsReport,
                schedule: Schedule::Every(Duration::from_secs(hours * 3600)),
            });
        }
        Ok(Self::new(tasks, queue))
    }

    pub fn tasks(&self) -> &[PeriodicTask] {
        &self.tasks
    }

    /// One timer loop per task; abort the handles to stop them
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let Scheduler { tasks, queue } = self;
        tasks
            .into_iter()
            .map(|task| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    info!(task = task.name, schedule = ?task.schedule, "Periodic task scheduled");
                    loop {
                        let now = Utc::now();
                        let next = task.schedule.next_after(now);
                        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                        tokio::time::sleep(wait).await;

                        if let Err(e) = queue.enqueue(task.job.clone()) {
                            error!(task = task.name, "Stopping periodic task: {}", e);
                            break;
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::tasks::{JobExecutor, QueueSettings};
    use std::sync::Arc;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, h, m, s).unwrap()
    }

    #[test]
    fn test_daily_schedule_rolls_to_tomorrow_once_passed() {
        let schedule = Schedule::DailyAt { hour: 0, minute: 5 };
        assert_eq!(schedule.next_after(at(0, 1, 0)), at(0, 5, 0));
        assert_eq!(schedule.next_after(at(0, 5, 0)), at(0, 5, 0) + ChronoDuration::days(1));
        assert_eq!(schedule.next_after(at(13, 0, 0)), at(0, 5, 0) + ChronoDuration::days(1));
    }

    #[test]
    fn test_interval_schedule() {
        let schedule = Schedule::Every(Duration::from_secs(3600));
        assert_eq!(schedule.next_after(at(10, 0, 0)), at(11, 0, 0));
        assert_eq!(
            Schedule::Every(Duration::ZERO).next_after(at(10, 0, 0)),
            at(10, 0, 1)
        );
    }

    struct Noop;

    #[async_trait::async_trait]
    impl JobExecutor for Noop {
        async fn execute(&self, _job: &Job) -> Result<String> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_from_config_builds_enabled_tasks() {
        let settings = QueueSettings {
            max_retries: 0,
            retry_delay: Duration::ZERO,
            concurrency: 1,
        };
        let (queue, worker) = TaskQueue::start(Arc::new(Noop), Arc::new(InMemoryStorage::new()), settings);

        let config = ScheduleConfig {
            daily_statistics_at: Some("06:30".to_string()),
            products_report_interval_hours: Some(12),
        };
        let scheduler = Scheduler::from_config(&config, queue.clone()).unwrap();
        let schedules: Vec<Schedule> = scheduler.tasks().iter().map(|t| t.schedule).collect();
        assert_eq!(
            schedules,
            vec![
                Schedule::DailyAt { hour: 6, minute: 30 },
                Schedule::Every(Duration::from_secs(12 * 3600)),
            ]
        );

        let disabled = ScheduleConfig {
            daily_statistics_at: None,
            products_report_interval_hours: Some(0),
        };
        assert!(Scheduler::from_config(&disabled, queue).unwrap().tasks().is_empty());
        worker.shutdown().await;
    }
}
