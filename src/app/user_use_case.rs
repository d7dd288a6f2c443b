use crate::domain::User;
use crate::error::{Result, ShopError};
use crate::signals::{Signal, SignalBus};
use crate::storage::Storage;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Use case for registering users
pub struct UserUseCase {
    storage: Arc<dyn Storage>,
    signals: SignalBus,
}

impl UserUseCase {
    pub fn new(storage: Arc<dyn Storage>, signals: SignalBus) -> Self {
        Self { storage, signals }
    }

    pub async fn create_user(&self, username: &str, email: &str) -> Result<User> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(ShopError::Validation("Username must not be blank".to_string()));
        }
        if !email.contains('@') {
            return Err(ShopError::Validation(format!("'{email}' is not a valid email address")));
        }

        let mut user = User {
            id: 0,
            username: username.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        self.storage.create_user(&mut user).await?;
        info!(user_id = user.id, "User registered");

        self.signals.emit(Signal::UserCreated(user.clone()));
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.storage.get_user(id).await
    }
}
