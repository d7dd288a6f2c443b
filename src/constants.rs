//! Defaults shared by the HTTP views, GraphQL resolvers and background jobs.

// Product listing paging
pub const DEFAULT_PAGE_OFFSET: i64 = 0;
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

// Seconds between an order being created and its chat notification
pub const ORDER_NOTIFICATION_DELAY_SECS: u64 = 10;

pub const DEFAULT_TASK_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TASK_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_TASK_CONCURRENCY: usize = 4;

// Task results kept by the in-memory backend, oldest dropped first
pub const IN_MEMORY_TASK_RESULTS_CAP: usize = 1000;

// Number of best sellers listed in the daily statistics report
pub const DAILY_TOP_PRODUCTS: usize = 3;

pub const PRODUCTS_REPORT_RANGE: &str = "A:C";

pub const WELCOME_EMAIL_SUBJECT: &str = "Welcome to our service";

pub const CATEGORY_NAME_MAX_LEN: usize = 120;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
// Chat id handed to the logging sender when Telegram is not configured
pub const LOG_ONLY_CHAT_ID: i64 = 0;
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

/// Stable job names recorded with every task result
pub mod task_names {
    pub const HELLO_WORLD: &str = "hello_world_task";
    pub const ORDER_CREATED_MESSAGE: &str = "order_send_telegram_message";
    pub const ORDER_DELETED_MESSAGE: &str = "order_deleted_telegram_message";
    pub const DAILY_STATISTICS: &str = "order_daily_statistics";
    pub const PRODUCTS_REPORT: &str = "write_google_sheet_products_report";
    pub const WELCOME_EMAIL: &str = "send_welcome_email";
}
