use crate::constants;
use crate::error::{Result, ShopError};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub tasks: TasksConfig,
    pub schedule: ScheduleConfig,
    pub telegram: TelegramConfig,
    pub email: EmailConfig,
    pub sheets: SheetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Prometheus exporter address; metrics are not exported when unset
    pub metrics_addr: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            metrics_addr: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Local SQLite path or remote libsql:// URL. Empty means in-memory storage.
    pub url: String,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub order_notification_delay_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub concurrency: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            order_notification_delay_secs: constants::ORDER_NOTIFICATION_DELAY_SECS,
            max_retries: constants::DEFAULT_TASK_MAX_RETRIES,
            retry_delay_secs: constants::DEFAULT_TASK_RETRY_DELAY_SECS,
            concurrency: constants::DEFAULT_TASK_CONCURRENCY,
        }
    }
}

impl TasksConfig {
    pub fn order_notification_delay(&self) -> Duration {
        Duration::from_secs(self.order_notification_delay_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// UTC time of day, `HH:MM`, for the daily order statistics report
    pub daily_statistics_at: Option<String>,
    pub products_report_interval_hours: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_statistics_at: Some("00:05".to_string()),
            products_report_interval_hours: None,
        }
    }
}

impl ScheduleConfig {
    /// Parse `daily_statistics_at` into (hour, minute)
    pub fn daily_statistics_time(&self) -> Result<Option<(u32, u32)>> {
        let Some(raw) = self.daily_statistics_at.as_deref() else {
            return Ok(None);
        };
        let invalid = || ShopError::Config(format!("schedule.daily_statistics_at '{raw}' is not HH:MM"));
        let (h, m) = raw.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Some((hour, minute)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<i64>,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: constants::TELEGRAM_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_address: "shop@example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub access_token: Option<String>,
    pub api_base: String,
    /// Where rows go when no spreadsheet is configured
    pub fallback_file: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            access_token: None,
            api_base: constants::SHEETS_API_BASE.to_string(),
            fallback_file: "reports/products.tsv".to_string(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, then apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// A missing file yields the defaults; a malformed one is an error
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                ShopError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.schedule.daily_statistics_time()?;
        Ok(config)
    }

    /// Overlay values from the environment; `lookup` is injectable for tests
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SHOP_PORT") {
            self.server.port = parse_env("SHOP_PORT", &port)?;
        }
        if let Some(addr) = lookup("SHOP_METRICS_ADDR") {
            self.server.metrics_addr = Some(addr);
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(token) = lookup("DATABASE_AUTH_TOKEN") {
            self.database.auth_token = Some(token);
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = lookup("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(parse_env("TELEGRAM_CHAT_ID", &chat_id)?);
        }
        if let Some(host) = lookup("SMTP_HOST") {
            self.email.smtp_host = Some(host);
        }
        if let Some(port) = lookup("SMTP_PORT") {
            self.email.smtp_port = parse_env("SMTP_PORT", &port)?;
        }
        if let Some(user) = lookup("SMTP_USERNAME") {
            self.email.smtp_username = Some(user);
        }
        if let Some(password) = lookup("SMTP_PASSWORD") {
            self.email.smtp_password = Some(password);
        }
        if let Some(from) = lookup("EMAIL_FROM") {
            self.email.from_address = from;
        }
        if let Some(id) = lookup("SHEETS_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = Some(id);
        }
        if let Some(token) = lookup("SHEETS_ACCESS_TOKEN") {
            self.sheets.access_token = Some(token);
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ShopError::Config(format!("{key} has invalid value '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.tasks.order_notification_delay_secs, 10);
        assert_eq!(config.schedule.daily_statistics_time().unwrap(), Some((0, 5)));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[tasks]\nmax_retries = 7\n\n[telegram]\nchat_id = 42").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.tasks.max_retries, 7);
        assert_eq!(config.tasks.concurrency, constants::DEFAULT_TASK_CONCURRENCY);
        assert_eq!(config.telegram.api_base, constants::TELEGRAM_API_BASE);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("SHOP_PORT", "9000"), ("TELEGRAM_CHAT_ID", "-100123")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.telegram.chat_id, Some(-100123));

        let err = config.apply_env(|k| (k == "SMTP_PORT").then(|| "abc".to_string()));
        assert!(matches!(err, Err(ShopError::Config(_))));
    }

    #[test]
    fn test_daily_time_validation() {
        let schedule = ScheduleConfig {
            daily_statistics_at: Some("25:00".to_string()),
            products_report_interval_hours: None,
        };
        assert!(schedule.daily_statistics_time().is_err());
    }
}
