// Adapters for the ports in `app::ports`

pub mod email_adapter;
pub mod sheets_adapter;
pub mod telegram_client;

pub use email_adapter::{LoggingEmailSender, SmtpEmailSender};
pub use sheets_adapter::{FileSheetWriter, HttpSheetWriter};
pub use telegram_client::{LoggingMessageSender, TelegramClient};
