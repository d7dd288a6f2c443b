use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Task error: {0}")]
    Task(String),
}

impl ShopError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ShopError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        ShopError::Database {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
