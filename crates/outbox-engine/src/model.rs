//! `StoredEvent` is a row of `outbox_<destination>_event`; it is the shared
//! read shape for both snapshots the relay compares.

use sqlx::Row;

use crate::error::EngineError;
use crate::transport::OutboundEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub event_id: i64,
    pub correlation_id: String,
    pub event_type: String,
    pub payload: String,
}

impl StoredEvent {
    pub(crate) fn from_row(row: sqlx::mysql::MySqlRow) -> Result<Self, EngineError> {
        let correlation_id = String::from_utf8(row.try_get::<Vec<u8>, _>("correlation_id")?)?;
        let event_type = String::from_utf8(row.try_get::<Vec<u8>, _>("event_type")?)?;
        Ok(StoredEvent {
            event_id: row.try_get("event_id")?,
            correlation_id,
            event_type,
            payload: row.try_get("payload")?,
        })
    }
}

impl From<&StoredEvent> for OutboundEvent {
    fn from(event: &StoredEvent) -> Self {
        OutboundEvent {
            event_id: event.event_id,
            correlation_id: event.correlation_id.clone(),
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
        }
    }
}

/// Longest prefix of `committed` that also appears, position for position,
/// in `uncommitted`. Stops at the first mismatched `event_id`, or at
/// whichever list runs out first. This is the "gap-free
/// committed prefix" — the only part of `committed` safe to forward without
/// risking a later-committing, lower-id row creating a hole downstream.
pub(crate) fn safe_prefix<'a>(committed: &'a [StoredEvent], uncommitted: &'a [StoredEvent]) -> &'a [StoredEvent] {
    let mut i = 0;
    while i < committed.len() && i < uncommitted.len() && committed[i].event_id == uncommitted[i].event_id {
        i += 1;
    }
    &committed[..i]
}
