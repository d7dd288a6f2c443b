use crate::config::DatabaseConfig;
use crate::error::{Result, ShopError};
use libsql::{Builder, Connection, Database};
use tracing::info;

pub struct DatabaseManager {
    db: Database,
}

impl DatabaseManager {
    /// Open the database named by the config: a remote Turso URL when it
    /// starts with `libsql://` or `https://`, otherwise a local SQLite file.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url.trim();
        if url.is_empty() {
            return Err(ShopError::Config("database.url is empty".to_string()));
        }

        let built = if url.starts_with("libsql://") || url.starts_with("https://") {
            let auth_token = config.auth_token.clone().ok_or_else(|| {
                ShopError::Config("database.auth_token is required for remote databases".to_string())
            })?;
            info!("Connecting to Turso database at {}", url);
            Builder::new_remote(url.to_string(), auth_token).build().await
        } else {
            info!("Opening local database at {}", url);
            Builder::new_local(url).build().await
        };
        let db = built
            .map_err(|e| ShopError::database(format!("Failed to connect to database: {e}")))?;

        Ok(Self { db })
    }

    /// Get a connection with foreign key enforcement switched on
    pub async fn get_connection(&self) -> Result<Connection> {
        let conn = self
            .db
            .connect()
            .map_err(|e| ShopError::database(format!("Failed to get database connection: {e}")))?;
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| ShopError::database(format!("Failed to enable foreign keys: {e}")))?;
        Ok(conn)
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection().await?;
        let migration_sql = include_str!("../migrations/001_create_shop_tables.sql");

        conn.execute_batch(migration_sql)
            .await
            .map_err(|e| ShopError::database(format!("Failed to run migrations: {e}")))?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}
