use super::queue::JobExecutor;
use super::Job;
use crate::app::ports::{EmailSender, MessageSender, SheetWriter};
use crate::config::Config;
use crate::constants;
use crate::error::{Result, ShopError};
use crate::infra::{
    FileSheetWriter, HttpSheetWriter, LoggingEmailSender, LoggingMessageSender, SmtpEmailSender,
    TelegramClient,
};
use crate::observability::metrics;
use crate::reports::{self, OrderLine};
use crate::storage::Storage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Executes every [`Job`] against storage and the outbound channels
pub struct JobRunner {
    storage: Arc<dyn Storage>,
    messenger: Arc<dyn MessageSender>,
    mailer: Arc<dyn EmailSender>,
    sheets: Arc<dyn SheetWriter>,
    chat_id: Option<i64>,
    clock: Clock,
}

impl JobRunner {
    pub fn new(
        storage: Arc<dyn Storage>,
        messenger: Arc<dyn MessageSender>,
        mailer: Arc<dyn EmailSender>,
        sheets: Arc<dyn SheetWriter>,
        chat_id: Option<i64>,
    ) -> Self {
        Self {
            storage,
            messenger,
            mailer,
            sheets,
            chat_id,
            clock: Arc::new(Utc::now),
        }
    }

    /// Pick a real adapter per channel when configured, a local fallback otherwise
    pub fn from_config(config: &Config, storage: Arc<dyn Storage>) -> Result<Self> {
        let (messenger, chat_id): (Arc<dyn MessageSender>, i64) =
            match (config.telegram.bot_token.as_deref(), config.telegram.chat_id) {
                (Some(token), Some(chat_id)) => {
                    let client = TelegramClient::new(&config.telegram.api_base, token)?;
                    (Arc::new(client) as Arc<dyn MessageSender>, chat_id)
                }
                _ => {
                    warn!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not set, chat messages will only be logged");
                    (Arc::new(LoggingMessageSender) as Arc<dyn MessageSender>, constants::LOG_ONLY_CHAT_ID)
                }
            };

        let mailer: Arc<dyn EmailSender> = match SmtpEmailSender::from_config(&config.email)? {
            Some(smtp) => Arc::new(smtp),
            None => {
                warn!("SMTP_HOST not set, emails will only be logged");
                Arc::new(LoggingEmailSender)
            }
        };

        let sheets: Arc<dyn SheetWriter> = match (
            config.sheets.spreadsheet_id.as_deref(),
            config.sheets.access_token.as_deref(),
        ) {
            (Some(id), Some(token)) => {
                Arc::new(HttpSheetWriter::new(&config.sheets.api_base, id, token)?)
            }
            _ => {
                info!(path = %config.sheets.fallback_file, "Spreadsheet not configured, reports go to a local file");
                Arc::new(FileSheetWriter::new(&config.sheets.fallback_file))
            }
        };

        Ok(Self::new(storage, messenger, mailer, sheets, Some(chat_id)))
    }

    /// Replace the wall clock, used by the daily report window and message timestamps
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    async fn notify(&self, text: &str) -> Result<()> {
        let chat_id = self
            .chat_id
            .ok_or_else(|| ShopError::Notification("telegram chat id is not configured".to_string()))?;
        match self.messenger.send_message(chat_id, text).await {
            Ok(()) => {
                metrics::notifications::sent("telegram");
                Ok(())
            }
            Err(e) => {
                metrics::notifications::failed("telegram");
                Err(e)
            }
        }
    }

    async fn order_created_message(&self, order_uuid: Uuid) -> Result<String> {
        let order = self
            .storage
            .get_order(order_uuid)
            .await?
            .ok_or_else(|| ShopError::not_found("Order", order_uuid))?;
        let items = self.storage.get_order_products(order_uuid).await?;

        let product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        let titles: HashMap<i64, String> = self
            .storage
            .get_products_by_ids(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.title))
            .collect();

        let lines: Vec<OrderLine> = items
            .iter()
            .map(|item| OrderLine {
                title: titles.get(&item.product_id).cloned().unwrap_or_default(),
                quantity: item.quantity,
                price: item.price,
            })
            .collect();

        let text = reports::order_created_message(&order, &lines, (self.clock)());
        self.notify(&text).await?;
        Ok(format!("Sent notification for order {order_uuid} with {} items", lines.len()))
    }

    async fn order_deleted_message(&self, order_uuid: Uuid) -> Result<String> {
        self.notify(&reports::order_deleted_message(order_uuid)).await?;
        Ok(format!("Sent deletion notice for order {order_uuid}"))
    }

    async fn daily_statistics(&self) -> Result<String> {
        let (day, start, end) = reports::previous_day_window((self.clock)());
        let orders = self.storage.orders_created_between(start, end).await?;
        let uuids: Vec<Uuid> = orders.iter().map(|o| o.uuid).collect();
        let top = self
            .storage
            .top_products(&uuids, constants::DAILY_TOP_PRODUCTS)
            .await?;

        debug!(%day, orders = orders.len(), "Computed daily statistics");
        let text = reports::daily_statistics_message(day, orders.len(), &top);
        self.notify(&text).await?;
        Ok(format!("Reported {} orders for {day}", orders.len()))
    }

    async fn products_report(&self) -> Result<String> {
        let products = self.storage.list_products(0, None).await?;
        let rows = reports::product_report_rows(&products);
        self.sheets
            .append_rows(constants::PRODUCTS_REPORT_RANGE, &rows)
            .await?;
        Ok(format!("Wrote {} product rows", rows.len()))
    }

    async fn welcome_email(&self, user_id: i64) -> Result<String> {
        let user = self
            .storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| ShopError::not_found("User", user_id))?;
        let email = reports::welcome_email(&user);
        match self.mailer.send(&email).await {
            Ok(()) => metrics::notifications::sent("email"),
            Err(e) => {
                metrics::notifications::failed("email");
                return Err(e);
            }
        }
        Ok(format!("Sent welcome email to {}", user.email))
    }
}

#[async_trait]
impl JobExecutor for JobRunner {
    async fn execute(&self, job: &Job) -> Result<String> {
        match job {
            Job::HelloWorld => {
                info!("Hello, World!");
                Ok("Hello, World!".to_string())
            }
            Job::OrderCreatedMessage { order_uuid } => self.order_created_message(*order_uuid).await,
            Job::OrderDeletedMessage { order_uuid } => self.order_deleted_message(*order_uuid).await,
            Job::DailyStatistics => self.daily_statistics().await,
            Job::ProductsReport => self.products_report().await,
            Job::WelcomeEmail { user_id } => self.welcome_email(*user_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::OutgoingEmail;
    use crate::domain::{NewOrder, NewOrderItem, Product, User};
    use crate::storage::InMemoryStorage;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<(i64, String)>>,
        emails: Mutex<Vec<OutgoingEmail>>,
        rows: Mutex<Vec<(String, Vec<Vec<Value>>)>>,
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
        async fn append_rows(&self, range: &str, rows: &[Vec<Value>]) -> Result<()> {
            self.rows.lock().await.push((range.to_string(), rows.to_vec()));
            Ok(())
        }
    }

    fn runner(storage: Arc<InMemoryStorage>, recorder: Arc<Recorder>, chat_id: Option<i64>) -> JobRunner {
        JobRunner::new(storage, recorder.clone(), recorder.clone(), recorder, chat_id)
    }

    async fn seed(storage: &InMemoryStorage) -> (User, Product) {
        let mut user = User {
            id: 0,
            username: "ann".to_string(),
            email: "ann@example.com".to_string(),
            created_at: Utc::now(),
        };
        storage.create_user(&mut user).await.unwrap();
        let mut product = Product {
            id: 0,
            title: "Tea".to_string(),
            description: Some("Green".to_string()),
            price: Decimal::new(350, 2),
            summary: String::new(),
            is_18_plus: false,
            category_id: None,
            tag_ids: vec![],
            created_at: Utc::now(),
        };
        storage.create_product(&mut product).await.unwrap();
        (user, product)
    }

    #[tokio::test]
    async fn test_order_created_message_sent_to_chat() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = Arc::new(Recorder::default());
        let (user, product) = seed(&storage).await;
        let (order, _) = storage
            .create_order(NewOrder {
                user_id: user.id,
                display_number: 1.0,
                items: vec![NewOrderItem { product_id: product.id, quantity: 2, price: product.price }],
            })
            .await
            .unwrap();

        let sent_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let runner = runner(storage, recorder.clone(), Some(-42)).with_clock(move || sent_at);
        runner
            .execute(&Job::OrderCreatedMessage { order_uuid: order.uuid })
            .await
            .unwrap();

        let messages = recorder.messages.lock().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, -42);
        assert_eq!(
            messages[0].1,
            format!("New order {} created at 2024-05-01 12:00:00.000000+00:00\nTea - 2 - 3.50\n", order.uuid)
        );
    }

    #[tokio::test]
    async fn test_missing_order_or_chat_is_an_error() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = Arc::new(Recorder::default());

        let err = runner(storage.clone(), recorder.clone(), Some(1))
            .execute(&Job::OrderCreatedMessage { order_uuid: Uuid::new_v4() })
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::NotFound { entity: "Order", .. }));

        let err = runner(storage, recorder.clone(), None)
            .execute(&Job::OrderDeletedMessage { order_uuid: Uuid::nil() })
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Notification(_)));
        assert!(recorder.messages.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_daily_statistics_counts_yesterday_only() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = Arc::new(Recorder::default());
        let (user, product) = seed(&storage).await;
        storage
            .create_order(NewOrder {
                user_id: user.id,
                display_number: 1.0,
                items: vec![NewOrderItem { product_id: product.id, quantity: 3, price: product.price }],
            })
            .await
            .unwrap();

        // The order was created "today", so the report for yesterday is empty
        let now = Utc::now();
        let runner = runner(storage.clone(), recorder.clone(), Some(7)).with_clock(move || now);
        runner.execute(&Job::DailyStatistics).await.unwrap();

        // Looking back from tomorrow picks the order up
        let tomorrow = now + chrono::Duration::days(1);
        let runner = runner_with(storage, recorder.clone(), tomorrow);
        runner.execute(&Job::DailyStatistics).await.unwrap();

        let messages = recorder.messages.lock().await;
        let yesterday = (now - chrono::Duration::days(1)).date_naive();
        assert_eq!(messages[0].1, format!("Number of orders created on {yesterday}: 0\n"));
        assert_eq!(
            messages[1].1,
            format!("Number of orders created on {}: 1\n1. Tea - 3\n", now.date_naive())
        );
    }

    #[tokio::test]
    async fn test_default_config_logs_chat_messages() {
        let storage = Arc::new(InMemoryStorage::new());
        let (user, product) = seed(&storage).await;
        let (order, _) = storage
            .create_order(NewOrder {
                user_id: user.id,
                display_number: 1.0,
                items: vec![NewOrderItem { product_id: product.id, quantity: 1, price: product.price }],
            })
            .await
            .unwrap();

        let runner = JobRunner::from_config(&Config::default(), storage).unwrap();
        runner
            .execute(&Job::OrderCreatedMessage { order_uuid: order.uuid })
            .await
            .unwrap();
        runner
            .execute(&Job::OrderDeletedMessage { order_uuid: order.uuid })
            .await
            .unwrap();
        runner.execute(&Job::DailyStatistics).await.unwrap();
    }

    fn runner_with(storage: Arc<InMemoryStorage>, recorder: Arc<Recorder>, now: DateTime<Utc>) -> JobRunner {
        runner(storage, recorder, Some(7)).with_clock(move || now)
    }

    #[tokio::test]
    async fn test_products_report_and_welcome_email() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = Arc::new(Recorder::default());
        let (user, _) = seed(&storage).await;
        let runner = runner(storage, recorder.clone(), None);

        runner.execute(&Job::ProductsReport).await.unwrap();
        runner.execute(&Job::WelcomeEmail { user_id: user.id }).await.unwrap();

        let rows = recorder.rows.lock().await;
        assert_eq!(rows[0].0, "A:C");
        assert_eq!(rows[0].1, vec![vec![Value::from("Tea"), Value::from(3.5), Value::from("Green")]]);

        let emails = recorder.emails.lock().await;
        assert_eq!(emails[0].to, "ann@example.com");
        assert_eq!(emails[0].text_body, "Hello, ann! Welcome to our service!");
    }
}
