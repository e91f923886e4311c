//! Thin, uniform DB surface shared by the outbox engine plus the
//! server-side advisory lock primitive.
//!
//! Code above this crate never distinguishes a pool, a borrowed connection
//! or a transaction — it writes functions generic over [`Exec`], and sqlx's
//! own `Executor` impls for `&MySqlPool`, `&mut PoolConnection<MySql>` and
//! `&mut Transaction<'_, MySql>` make all three substitutable for free.

mod exec;
mod lock;

pub use exec::Exec;
pub use lock::{AdvisoryLock, LockError};

pub const ENV_DB_URL: &str = "OUTBOX_DATABASE_URL";

use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

/// Connect to MySQL using `OUTBOX_DATABASE_URL`.
pub async fn connect_from_env() -> Result<MySqlPool, sqlx::Error> {
    let url =
        std::env::var(ENV_DB_URL).map_err(|err| sqlx::Error::Configuration(Box::new(err)))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new().max_connections(10).connect(url).await
}
