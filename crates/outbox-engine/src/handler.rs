//! Outbox handler — the relay. A long-running per-destination loop
//! that holds a cluster-wide advisory lock for the duration of one dispatch
//! round, compares a committed snapshot against a read-uncommitted snapshot
//! taken on the *same* connection to find the gap-free committed prefix,
//! forwards it to the transport, and advances the cursor.

use std::sync::Arc;
use std::time::Duration;

use outbox_db::{AdvisoryLock, LockError};
use sqlx::mysql::MySqlConnection;
use sqlx::{MySqlPool, Row};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::ident::validate_identifier;
use crate::model::{safe_prefix, StoredEvent};
use crate::transport::{OutboundEvent, PerEventTransport, Transport};

pub const DEFAULT_BATCH_SIZE: u32 = 1000;
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub transport_name: String,
    pub app_id: String,
    pub batch_size: u32,
    pub send_interval: Duration,
    pub lock_timeout: Duration,
}

impl HandlerConfig {
    pub fn new(
        transport_name: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let transport_name = transport_name.into();
        let app_id = app_id.into();
        validate_identifier(&transport_name)?;
        if app_id.is_empty() {
            return Err(EngineError::EmptyAppId);
        }
        Ok(Self {
            transport_name,
            app_id,
            batch_size: DEFAULT_BATCH_SIZE,
            send_interval: DEFAULT_SEND_INTERVAL,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }
}

/// Which `Transport` shape this handler drives — both shapes satisfy the
/// ordering contract; the deployment picks one.
pub enum Delivery {
    Batched(Arc<dyn Transport>),
    PerEvent(Arc<dyn PerEventTransport>),
}

pub struct OutboxHandler {
    db: MySqlPool,
    config: HandlerConfig,
    delivery: Delivery,
}

impl OutboxHandler {
    pub fn new(db: MySqlPool, config: HandlerConfig, delivery: Delivery) -> Self {
        Self { db, config, delivery }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Runs the relay loop until `cancel` fires. Each iteration waits on
    /// cancellation, the periodic timer, or the single-slot retry signal
    /// (primed so the first iteration runs immediately), then executes one
    /// dispatch round to completion — cancellation only stops the *next*
    /// iteration from starting, it never interrupts a round already running
    /// a DB transaction.
    pub async fn run(&self, cancel: CancellationToken) {
        let retry = Notify::new();
        retry.notify_one();
        let mut ticker = tokio::time::interval(self.config.send_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(transport = %self.config.transport_name, "relay loop cancelled");
                    break;
                }
                _ = ticker.tick() => {}
                _ = retry.notified() => {}
            }

            if let Err(err) = self.dispatch_round(&retry).await {
                tracing::error!(
                    transport = %self.config.transport_name,
                    error = %err,
                    "dispatch round failed"
                );
            }
        }
    }

    /// Runs exactly one dispatch round now, outside the timer loop. Useful
    /// for tests and for callers that want to drive rounds explicitly.
    pub async fn run_once(&self) -> Result<(), EngineError> {
        let retry = Notify::new();
        self.dispatch_round(&retry).await
    }

    async fn dispatch_round(&self, retry: &Notify) -> Result<(), EngineError> {
        let lock_name = format!("outbox_{}_handler", self.config.transport_name);
        let mut conn = self.db.acquire().await?;

        match AdvisoryLock::acquire(&mut conn, &lock_name, self.config.lock_timeout).await {
            Ok(()) => {}
            Err(LockError::Timeout(_)) => {
                tracing::debug!(
                    transport = %self.config.transport_name,
                    "relay lock held by another instance, skipping round"
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        let round_result = self.run_round(&mut conn, retry).await;

        match AdvisoryLock::release(&mut conn, &lock_name).await {
            Ok(()) => round_result,
            Err(unlock_err) => match round_result {
                Ok(()) => Err(unlock_err.into()),
                Err(err) => Err(EngineError::joined(err, unlock_err)),
            },
        }
    }

    async fn run_round(&self, conn: &mut MySqlConnection, retry: &Notify) -> Result<(), EngineError> {
        let transport_name = self.config.transport_name.clone();
        let event_table = format!("outbox_{transport_name}_event");
        let tracked_table = format!("outbox_{transport_name}_tracked_event");

        let cursor = read_cursor(conn, &tracked_table, &transport_name).await?;

        let committed = select_events(conn, &event_table, cursor, self.config.batch_size).await?;
        if committed.is_empty() {
            return Ok(());
        }

        let uncommitted =
            select_uncommitted(conn, &event_table, cursor, self.config.batch_size).await?;

        if uncommitted.len() > committed.len() || committed.len() as u32 == self.config.batch_size {
            retry.notify_one();
        }

        let safe = safe_prefix(&committed, &uncommitted);
        if safe.is_empty() {
            tracing::debug!(transport = %transport_name, "no gap-free committed prefix this round");
            return Ok(());
        }

        match &self.delivery {
            Delivery::Batched(transport) => {
                let events: Vec<OutboundEvent> = safe.iter().map(OutboundEvent::from).collect();
                match transport.handle_events(&events).await {
                    Ok(()) => {
                        let last = safe.last().expect("checked non-empty above").event_id;
                        advance_cursor(conn, &tracked_table, &transport_name, last).await?;
                    }
                    Err(err) => {
                        tracing::warn!(
                            transport = %transport_name,
                            error = %err,
                            "transport failed, round stopped, cursor not advanced"
                        );
                    }
                }
            }
            Delivery::PerEvent(transport) => {
                for event in safe {
                    let outbound = OutboundEvent::from(event);
                    match transport.handle_event(&outbound).await {
                        Ok(()) => {
                            advance_cursor(conn, &tracked_table, &transport_name, event.event_id).await?;
                        }
                        Err(err) => {
                            tracing::warn!(
                                transport = %transport_name,
                                error = %err,
                                event_id = event.event_id,
                                "transport failed, round stopped"
                            );
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

async fn read_cursor(
    conn: &mut MySqlConnection,
    tracked_table: &str,
    transport_name: &str,
) -> Result<i64, EngineError> {
    let row = sqlx::query(&format!(
        "SELECT last_tracked_event_id FROM {tracked_table} WHERE transport_name = ?"
    ))
    .bind(transport_name.as_bytes())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(row.try_get::<i64, _>("last_tracked_event_id")?),
        None => Ok(0),
    }
}

async fn select_events(
    conn: &mut MySqlConnection,
    event_table: &str,
    cursor: i64,
    batch_size: u32,
) -> Result<Vec<StoredEvent>, EngineError> {
    let rows = sqlx::query(&format!(
        "SELECT event_id, correlation_id, event_type, payload FROM {event_table} \
         WHERE event_id > ? ORDER BY event_id LIMIT ?"
    ))
    .bind(cursor)
    .bind(batch_size)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(StoredEvent::from_row).collect()
}

/// Opens a read-uncommitted, read-only transaction on `conn` — deliberately
/// the *same* connection/session the committed read just ran on, so the
/// two snapshots agree on what that one session can see; the hole-detection
/// invariant only holds if both reads share a session. Rolls back
/// immediately after reading.
async fn select_uncommitted(
    conn: &mut MySqlConnection,
    event_table: &str,
    cursor: i64,
    batch_size: u32,
) -> Result<Vec<StoredEvent>, EngineError> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED")
        .execute(&mut *conn)
        .await?;
    sqlx::query("START TRANSACTION READ ONLY").execute(&mut *conn).await?;

    let result = select_events(conn, event_table, cursor, batch_size).await;

    if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        tracing::error!(error = %rollback_err, "failed to roll back read-uncommitted snapshot transaction");
    }

    result
}

/// `INSERT ... ON DUPLICATE KEY UPDATE` upsert, clamped with `GREATEST` so
/// the cursor can never regress even under a defensive re-run.
async fn advance_cursor(
    conn: &mut MySqlConnection,
    tracked_table: &str,
    transport_name: &str,
    event_id: i64,
) -> Result<(), EngineError> {
    sqlx::query(&format!(
        "INSERT INTO {tracked_table} (transport_name, last_tracked_event_id) VALUES (?, ?) \
         ON DUPLICATE KEY UPDATE last_tracked_event_id = GREATEST(last_tracked_event_id, VALUES(last_tracked_event_id))"
    ))
    .bind(transport_name.as_bytes())
    .bind(event_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
