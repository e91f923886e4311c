//! Shared fixtures for scenario tests: connect to `OUTBOX_DATABASE_URL`
//! (mirroring `outbox-db`/`outbox-uow`'s existing scenario tests) and mint
//! a unique per-test transport name so tests don't collide over shared
//! `outbox_<transport>_*` tables when run in parallel or repeated.

use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::MySqlPool;

/// Connects using `OUTBOX_DATABASE_URL`, panicking with a pointer to
/// `--include-ignored` if it isn't set. Intended for `#[ignore]`-gated
/// scenario tests, same convention as `outbox-db`/`outbox-uow`.
pub async fn test_pool() -> MySqlPool {
    match std::env::var(outbox_db::ENV_DB_URL) {
        Ok(url) => outbox_db::connect(&url).await.expect("connect to OUTBOX_DATABASE_URL"),
        Err(_) => panic!(
            "scenario tests require {}; run with --include-ignored",
            outbox_db::ENV_DB_URL
        ),
    }
}

/// A transport/destination name unique to this process and call, suitable
/// as `outbox_<name>_*` table prefix. Not cryptographically random — just
/// distinct enough that concurrent test binaries and repeated runs within
/// one binary don't collide.
pub fn unique_transport_name(label: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{label}_{}_{n}", std::process::id())
}
