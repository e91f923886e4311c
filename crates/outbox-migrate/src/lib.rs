//! Generic ordered-migration runner under an advisory lock.
//!
//! A [`MigrationRunner`] owns one `<prefix>_migrations` tracking table and
//! applies a caller-supplied [`Migration`] list to it: create the tracking
//! table if missing, find the highest applied version, then walk the
//! sorted input applying anything not already recorded. Out-of-order input
//! (a migration older than the highest applied version, and not itself
//! already applied) is rejected outright rather than silently skipped.
//!
//! The whole run happens under the fixed `"migration"` advisory lock so two
//! processes racing to migrate the same database serialize instead of
//! double-applying DDL.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use outbox_db::{AdvisoryLock, LockError};
use outbox_pool::BoxFuture;
use sqlx::{MySqlConnection, MySqlPool, Row};

pub const MIGRATION_LOCK_NAME: &str = "migration";
pub const MIGRATION_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// One migration step's DDL/DML, run against the same connection that holds
/// the migration lock. Boxed and `Send + Sync` so callers can build a
/// `Vec<Migration>` out of closures without naming their future types.
pub type MigrationFn = Arc<
    dyn for<'a> Fn(&'a mut MySqlConnection) -> BoxFuture<'a, Result<(), sqlx::Error>>
        + Send
        + Sync,
>;

#[derive(Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub up: MigrationFn,
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(
        "migration version {version} is older than the highest already-applied version \
         {last_applied}; out-of-order migrations are rejected"
    )]
    OutOfOrder { version: i64, last_applied: i64 },
    #[error("{0}; additionally failed to release the migration lock: {1}")]
    Joined(Box<MigrationError>, Box<LockError>),
}

/// Owns the `<prefix>_migrations` tracking table for one schema.
pub struct MigrationRunner {
    pool: MySqlPool,
    table: String,
}

impl MigrationRunner {
    pub fn new(pool: MySqlPool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            table: format!("{}_migrations", prefix.into()),
        }
    }

    /// Applies `migrations` in ascending version order. Already
    /// applied versions are skipped; nothing after the first out-of-order
    /// rejection runs. The lock is always released, and a release failure
    /// is joined with any error from applying migrations rather than
    /// masking it.
    pub async fn migrate(&self, mut migrations: Vec<Migration>) -> Result<(), MigrationError> {
        migrations.sort_by_key(|m| m.version);

        let mut conn = self.pool.acquire().await?;
        AdvisoryLock::acquire(&mut conn, MIGRATION_LOCK_NAME, MIGRATION_LOCK_TIMEOUT).await?;

        let result = self.apply_locked(&mut conn, &migrations).await;

        match AdvisoryLock::release(&mut conn, MIGRATION_LOCK_NAME).await {
            Ok(()) => result,
            Err(unlock_err) => match result {
                Ok(()) => Err(unlock_err.into()),
                Err(err) => Err(MigrationError::Joined(Box::new(err), Box::new(unlock_err))),
            },
        }
    }

    async fn apply_locked(
        &self,
        conn: &mut MySqlConnection,
        migrations: &[Migration],
    ) -> Result<(), MigrationError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version BIGINT NOT NULL,
                description TEXT NOT NULL,
                applied_at DATETIME NOT NULL,
                PRIMARY KEY (version)
            ) ENGINE=InnoDB CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
            self.table
        ))
        .execute(&mut *conn)
        .await?;

        let last_applied: i64 =
            sqlx::query(&format!("SELECT COALESCE(MAX(version), 0) AS last_applied FROM {}", self.table))
                .fetch_one(&mut *conn)
                .await?
                .try_get("last_applied")?;

        for migration in migrations {
            let already_applied = sqlx::query(&format!(
                "SELECT version FROM {} WHERE version = ?",
                self.table
            ))
            .bind(migration.version)
            .fetch_optional(&mut *conn)
            .await?
            .is_some();

            if already_applied {
                tracing::debug!(version = migration.version, table = %self.table, "migration already applied, skipping");
                continue;
            }

            if migration.version < last_applied {
                return Err(MigrationError::OutOfOrder {
                    version: migration.version,
                    last_applied,
                });
            }

            tracing::info!(version = migration.version, description = %migration.description, "applying migration");
            (migration.up)(conn).await?;

            sqlx::query(&format!(
                "INSERT INTO {} (version, description, applied_at) VALUES (?, ?, ?)",
                self.table
            ))
            .bind(migration.version)
            .bind(&migration.description)
            .bind(Utc::now().naive_utc())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}
