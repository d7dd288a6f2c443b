use crate::app::ports::{EmailSender, OutgoingEmail};
use crate::config::EmailConfig;
use crate::error::{Result, ShopError};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// SMTP delivery over STARTTLS
pub struct SmtpEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// `None` when no SMTP host is configured
    pub fn from_config(config: &EmailConfig) -> Result<Option<Self>> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| ShopError::Config(format!("Invalid SMTP relay '{host}': {e}")))?
            .port(config.smtp_port);
        if let (Some(user), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        let from = parse_mailbox(&config.from_address)?;
        Ok(Some(Self {
            mailer: builder.build(),
            from,
        }))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|_| ShopError::Email(format!("Invalid email address: {address}")))
}

/// Plain text alone, or text plus HTML as multipart/alternative
pub fn build_message(from: Mailbox, email: &OutgoingEmail) -> Result<Message> {
    let builder = Message::builder()
        .from(from)
        .to(parse_mailbox(&email.to)?)
        .subject(email.subject.clone());

    let message = match &email.html_body {
        Some(html) => builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.text_body.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.clone()),
                ),
        ),
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text_body.clone()),
    };
    message.map_err(|e| ShopError::Email(format!("Failed to build message: {e}")))
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = build_message(self.from.clone(), email)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| ShopError::Email(e.to_string()))?;

        info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Logs emails instead of sending them
pub struct LoggingEmailSender;

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.text_body,
            "SMTP not configured, email logged only"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: "Welcome to our service".to_string(),
            text_body: "Hello, ann! Welcome to our service!".to_string(),
            html_body: Some("<p>Hello</p>".to_string()),
        }
    }

    #[test]
    fn test_build_message_sets_headers() {
        let from = parse_mailbox("shop@example.com").unwrap();
        let message = build_message(from, &email("ann@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: ann@example.com"));
        assert!(raw.contains("Subject: Welcome to our service"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let from = parse_mailbox("shop@example.com").unwrap();
        assert!(matches!(
            build_message(from, &email("nobody")),
            Err(ShopError::Email(_))
        ));
    }

    #[test]
    fn test_no_host_means_no_sender() {
        assert!(SmtpEmailSender::from_config(&EmailConfig::default())
            .unwrap()
            .is_none());
    }
}
