//! Per-transport schema, reached via the generic migration runner rather
//! than hand-run DDL: two ordered migrations per transport, one per table,
//! composing cleanly with `outbox-migrate`.

use std::sync::Arc;

use outbox_migrate::{Migration, MigrationRunner};
use sqlx::MySqlPool;

use crate::error::EngineError;
use crate::ident::validate_identifier;

pub fn migrations_for(transport: &str) -> Vec<Migration> {
    let event_table = format!("outbox_{transport}_event");
    let tracked_table = format!("outbox_{transport}_tracked_event");

    vec![
        Migration {
            version: 1,
            description: format!("create {event_table}"),
            up: Arc::new(move |conn| {
                let sql = format!(
                    "CREATE TABLE IF NOT EXISTS {event_table} (
                        event_id BIGINT NOT NULL AUTO_INCREMENT,
                        correlation_id VARBINARY(128) NOT NULL,
                        event_type VARBINARY(128) NOT NULL,
                        payload TEXT NOT NULL,
                        PRIMARY KEY (event_id)
                    ) ENGINE=InnoDB CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"
                );
                Box::pin(async move {
                    sqlx::query(&sql).execute(&mut *conn).await?;
                    Ok(())
                })
            }),
        },
        Migration {
            version: 2,
            description: format!("create {tracked_table}"),
            up: Arc::new(move |conn| {
                let sql = format!(
                    "CREATE TABLE IF NOT EXISTS {tracked_table} (
                        transport_name VARBINARY(128) NOT NULL,
                        last_tracked_event_id BIGINT NOT NULL,
                        PRIMARY KEY (transport_name)
                    ) ENGINE=InnoDB CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"
                );
                Box::pin(async move {
                    sqlx::query(&sql).execute(&mut *conn).await?;
                    Ok(())
                })
            }),
        },
    ]
}

/// Creates `outbox_<transport>_event` and `outbox_<transport>_tracked_event`
/// if they don't already exist, tracked under `outbox_<transport>_migrations`.
pub async fn ensure_schema(pool: MySqlPool, transport: &str) -> Result<(), EngineError> {
    validate_identifier(transport)?;
    let runner = MigrationRunner::new(pool, format!("outbox_{transport}"));
    runner.migrate(migrations_for(transport)).await?;
    Ok(())
}
