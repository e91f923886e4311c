//! Outbox dispatcher — producer path.
//!
//! `Dispatcher::dispatch` serializes the event, mints a correlation id, and
//! inserts a row into `outbox_<destination>_event` through the *current*
//! [`UowContext`] — so the insert joins whatever business transaction the
//! caller is already inside, and the event only becomes externally visible
//! when that transaction commits.

use outbox_uow::UowContext;
use serde::Serialize;

use crate::correlation::new_correlation_id;
use crate::error::DispatchError;
use crate::ident::validate_identifier;

pub struct Dispatcher {
    destination: String,
    event_table: String,
}

impl Dispatcher {
    pub fn new(destination: impl Into<String>) -> Result<Self, DispatchError> {
        let destination = destination.into();
        validate_identifier(&destination)?;
        let event_table = format!("outbox_{destination}_event");
        Ok(Self { destination, event_table })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Serializes `event` with `serde_json`, mints its correlation id, and
    /// inserts it inside `ctx`'s shared transaction. Returns the minted
    /// correlation id so the caller can log/trace it further.
    pub async fn dispatch<E: Serialize>(
        &self,
        ctx: &UowContext,
        app_id: &str,
        event_type: &str,
        event: &E,
    ) -> Result<String, DispatchError> {
        let payload = serde_json::to_string(event)?;
        let correlation_id = new_correlation_id(app_id, &payload);

        let table = self.event_table.clone();
        let bound_correlation_id = correlation_id.clone();
        let bound_event_type = event_type.to_string();

        ctx.client(move |tx| async move {
            sqlx::query(&format!(
                "INSERT INTO {table} (correlation_id, event_type, payload) VALUES (?, ?, ?)"
            ))
            .bind(bound_correlation_id.into_bytes())
            .bind(bound_event_type.into_bytes())
            .bind(payload)
            .execute(&mut **tx)
            .await?;
            Ok(())
        })
        .await?;

        Ok(correlation_id)
    }
}
