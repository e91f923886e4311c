//! The external message bus sink. Framing, connection supervision and
//! reconnection are out of scope here — this crate only defines the call
//! shape the relay drives and advances the cursor against.
//!
//! Two incompatible shapes are worth supporting: a per-event call that lets
//! the cursor advance after every success, and a batched call that advances
//! once per round. Both are first-class here; [`crate::handler::Delivery`]
//! picks one per deployment.

use std::error::Error as StdError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    pub event_id: i64,
    pub correlation_id: String,
    pub event_type: String,
    pub payload: String,
}

#[derive(Debug, thiserror::Error)]
#[error("transport failed to handle event(s): {0}")]
pub struct TransportError(#[source] Box<dyn StdError + Send + Sync>);

impl TransportError {
    pub fn new<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        TransportError(Box::new(err))
    }
}

/// Batched transport: one call per round, one cursor advance per round on
/// success. A failure leaves the whole batch's worth of progress
/// unacknowledged — cheaper per event, coarser-grained retry.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn handle_events(&self, events: &[OutboundEvent]) -> Result<(), TransportError>;
}

/// Per-event transport: one call per event, cursor advances after each
/// success. Strictly forward-progressing across a crash, at the cost of
/// one cursor upsert per event.
#[async_trait::async_trait]
pub trait PerEventTransport: Send + Sync {
    async fn handle_event(&self, event: &OutboundEvent) -> Result<(), TransportError>;
}
