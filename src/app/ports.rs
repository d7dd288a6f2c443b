use crate::error::Result;
use async_trait::async_trait;

/// Chat delivery, e.g. a Telegram bot
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// Spreadsheet-like report sink; `range` is A1 notation such as `A:C`
#[async_trait]
pub trait SheetWriter: Send + Sync {
    async fn append_rows(&self, range: &str, rows: &[Vec<serde_json::Value>]) -> Result<()>;
}
