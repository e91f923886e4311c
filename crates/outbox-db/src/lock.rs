use std::time::Duration;

use sqlx::mysql::MySqlConnection;
use sqlx::Row;

/// Error kinds for the named advisory lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("advisory lock '{0}' timed out before it could be acquired")]
    Timeout(String),
    #[error("advisory lock '{0}' was not held by this session at release time")]
    NotLocked(String),
    #[error("advisory lock '{0}' returned an error from the server (out of memory / thread killed)")]
    NotFound(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// A named, session-scoped, cluster-wide mutex backed by `GET_LOCK`/
/// `RELEASE_LOCK`. Stateless: every call takes the live connection whose
/// session the lock is scoped to, so the caller (`outbox-uow::Locker`) owns
/// the connection's lifetime and is responsible for using the *same*
/// connection across acquire and release.
pub struct AdvisoryLock;

impl AdvisoryLock {
    /// `SELECT GET_LOCK(SUBSTRING(CONCAT(name, '.', DATABASE()), 1, 64), timeout_seconds)`.
    /// The server truncates the composed name to 64 bytes and namespaces it
    /// by the connected database.
    pub async fn acquire(
        conn: &mut MySqlConnection,
        name: &str,
        timeout: Duration,
    ) -> Result<(), LockError> {
        let row = sqlx::query(
            "SELECT GET_LOCK(SUBSTRING(CONCAT(?, '.', DATABASE()), 1, 64), ?) AS result",
        )
        .bind(name)
        .bind(timeout.as_secs() as i64)
        .fetch_one(conn)
        .await?;

        match row.try_get::<Option<i64>, _>("result")? {
            Some(1) => Ok(()),
            Some(_) => Err(LockError::Timeout(name.to_string())),
            None => Err(LockError::NotFound(name.to_string())),
        }
    }

    /// `SELECT RELEASE_LOCK(SUBSTRING(CONCAT(name, '.', DATABASE()), 1, 64))`.
    pub async fn release(conn: &mut MySqlConnection, name: &str) -> Result<(), LockError> {
        let row = sqlx::query(
            "SELECT RELEASE_LOCK(SUBSTRING(CONCAT(?, '.', DATABASE()), 1, 64)) AS result",
        )
        .bind(name)
        .fetch_one(conn)
        .await?;

        match row.try_get::<Option<i64>, _>("result")? {
            Some(1) => Ok(()),
            Some(_) => Err(LockError::NotLocked(name.to_string())),
            None => Err(LockError::NotFound(name.to_string())),
        }
    }
}
