//! Key-value option storage.
//!
//! The calculator persists only a handful of string values (its identity and
//! the installed version). `OptionStore` is the port the rest of the crate
//! depends on; the host picks an implementation at startup.

use crate::db::Database;
use crate::errors::{AppError, ResultExt};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Option holding the backend-issued site identifier.
pub const OPTION_APP_ID: &str = "app_id";
/// Option holding the backend dashboard URL.
pub const OPTION_DASHBOARD_URL: &str = "dashboard_url";
/// Option holding the installed calculator version.
pub const OPTION_VERSION: &str = "version";

#[async_trait]
pub trait OptionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    /// Writes every pair or none of them.
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Process-local store, used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OptionStore for MemoryOptionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AppError> {
        let mut values = self.values.write().await;
        for (key, value) in entries {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// Postgres-backed store mirroring a CMS options table.
#[derive(Clone)]
pub struct PgOptionStore {
    pool: PgPool,
}

impl PgOptionStore {
    /// Wraps the pool and creates the options table if it does not exist.
    pub async fn connect(pool: PgPool) -> Result<Self, AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS calculator_options (
                option_name TEXT PRIMARY KEY,
                option_value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create calculator_options table")?;

        Ok(Self { pool })
    }
}

const UPSERT_OPTION: &str = r#"
    INSERT INTO calculator_options (option_name, option_value)
    VALUES ($1, $2)
    ON CONFLICT (option_name) DO UPDATE SET option_value = EXCLUDED.option_value
"#;

#[async_trait]
impl OptionStore for PgOptionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            "SELECT option_value FROM calculator_options WHERE option_name = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read option '{}'", key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(UPSERT_OPTION)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to write option '{}'", key))?;
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open option transaction")?;

        for (key, value) in entries {
            sqlx::query(UPSERT_OPTION)
                .bind(*key)
                .bind(*value)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to write option '{}'", key))?;
        }

        tx.commit()
            .await
            .context("Failed to commit option transaction")?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM calculator_options WHERE option_name = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete option '{}'", key))?;
        Ok(())
    }
}

/// Opens the Postgres store when a database URL is given, otherwise an
/// in-memory one.
pub async fn open_option_store(
    database_url: Option<&str>,
) -> anyhow::Result<Arc<dyn OptionStore>> {
    match database_url {
        Some(url) => {
            let db = Database::new(url).await?;
            let store = PgOptionStore::connect(db.pool)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            tracing::info!("Option store: Postgres");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Option store: in-memory");
            Ok(Arc::new(MemoryOptionStore::new()))
        }
    }
}
