//! Scenario: advisory lock semantics.
//!
//! Requires a live MySQL instance reachable via `OUTBOX_DATABASE_URL`; run
//! with `OUTBOX_DATABASE_URL=... cargo test -p outbox-db -- --include-ignored`.

use std::time::Duration;

use outbox_db::{AdvisoryLock, LockError};
use sqlx::Connection;

async fn test_db_url() -> String {
    match std::env::var(outbox_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => panic!(
            "advisory lock scenario tests require {}; run with --include-ignored",
            outbox_db::ENV_DB_URL
        ),
    }
}

#[tokio::test]
#[ignore = "requires OUTBOX_DATABASE_URL"]
async fn second_session_times_out_while_first_holds_the_lock() {
    let url = test_db_url().await;
    let mut holder = sqlx::MySqlConnection::connect(&url).await.unwrap();
    let mut contender = sqlx::MySqlConnection::connect(&url).await.unwrap();

    AdvisoryLock::acquire(&mut holder, "scenario_lock_contention", Duration::from_secs(5))
        .await
        .unwrap();

    let result =
        AdvisoryLock::acquire(&mut contender, "scenario_lock_contention", Duration::from_secs(1))
            .await;
    assert!(matches!(result, Err(LockError::Timeout(_))));

    AdvisoryLock::release(&mut holder, "scenario_lock_contention").await.unwrap();

    AdvisoryLock::acquire(&mut contender, "scenario_lock_contention", Duration::from_secs(5))
        .await
        .unwrap();
    AdvisoryLock::release(&mut contender, "scenario_lock_contention").await.unwrap();
}

#[tokio::test]
#[ignore = "requires OUTBOX_DATABASE_URL"]
async fn release_without_holding_is_not_locked() {
    let url = test_db_url().await;
    let mut conn = sqlx::MySqlConnection::connect(&url).await.unwrap();

    let result = AdvisoryLock::release(&mut conn, "scenario_lock_never_held").await;
    assert!(matches!(result, Err(LockError::NotLocked(_))));
}

#[tokio::test]
#[ignore = "requires OUTBOX_DATABASE_URL"]
async fn reacquiring_within_the_same_session_succeeds() {
    let url = test_db_url().await;
    let mut conn = sqlx::MySqlConnection::connect(&url).await.unwrap();

    AdvisoryLock::acquire(&mut conn, "scenario_lock_reentrant", Duration::from_secs(5))
        .await
        .unwrap();
    AdvisoryLock::acquire(&mut conn, "scenario_lock_reentrant", Duration::from_secs(5))
        .await
        .unwrap();

    AdvisoryLock::release(&mut conn, "scenario_lock_reentrant").await.unwrap();
    AdvisoryLock::release(&mut conn, "scenario_lock_reentrant").await.unwrap();
}

#[tokio::test]
#[ignore = "requires OUTBOX_DATABASE_URL"]
async fn names_longer_than_64_bytes_still_contend_with_each_other() {
    let url = test_db_url().await;
    let mut holder = sqlx::MySqlConnection::connect(&url).await.unwrap();
    let mut contender = sqlx::MySqlConnection::connect(&url).await.unwrap();

    let long_name = "x".repeat(120);

    AdvisoryLock::acquire(&mut holder, &long_name, Duration::from_secs(5)).await.unwrap();
    let result = AdvisoryLock::acquire(&mut contender, &long_name, Duration::from_secs(1)).await;
    assert!(matches!(result, Err(LockError::Timeout(_))));

    AdvisoryLock::release(&mut holder, &long_name).await.unwrap();
}
