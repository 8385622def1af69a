//! SQLite database connection
//!
//! All database access goes through [`Database`]. The store operations
//! live in sibling modules as further `impl Database` blocks; this module
//! owns the pool, migrations and the write-transaction discipline.

use futures::FutureExt;
use futures::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Pool sizing and lock-wait settings
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 8,
            busy_timeout: Duration::from_secs(10),
        }
    }
}

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database with default pool settings
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with(path, PoolSettings::default()).await
    }

    /// Connect with explicit pool settings
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect_with(path: &Path, settings: PoolSettings) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(settings.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Run `work` inside a `BEGIN IMMEDIATE` transaction
    ///
    /// The write lock is taken up front, so a read-then-write sequence
    /// inside `work` cannot interleave with another writer. Commits when
    /// `work` returns `Ok`, rolls back otherwise. The transaction runs on
    /// its own task: dropping the caller does not leave it half-applied.
    /// If `work` panics, the connection is detached from the pool so the
    /// open transaction dies with it.
    pub(crate) async fn write<T, F>(&self, work: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, AppError>>
            + Send
            + 'static,
    {
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let mut conn = pool.acquire().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

            let outcome = AssertUnwindSafe(work(&mut *conn)).catch_unwind().await;
            let Ok(result) = outcome else {
                drop(conn.detach());
                tracing::error!("write transaction panicked; connection discarded");
                return Err(AppError::Internal(anyhow::anyhow!(
                    "write transaction panicked"
                )));
            };

            match result {
                Ok(value) => {
                    if let Err(error) = sqlx::query("COMMIT").execute(&mut *conn).await {
                        let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                        return Err(error.into());
                    }
                    Ok(value)
                }
                Err(error) => {
                    if let Err(rollback_error) = sqlx::query("ROLLBACK").execute(&mut *conn).await
                    {
                        tracing::warn!(%rollback_error, "rollback failed");
                    }
                    Err(error)
                }
            }
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?
    }
}

// =============================================================================
// Constraint classification
// =============================================================================

/// Which unique constraint an insert tripped over, if any
pub(crate) fn unique_violation(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            Some(db_error.message().to_string())
        }
        _ => None,
    }
}

/// Whether an insert referenced a missing parent row
pub(crate) fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_error) if db_error.is_foreign_key_violation())
}
