//! Transactional outbox engine: producer-side dispatch, the gap-free
//! relay, and correlation ids — the subsystem the rest of this workspace
//! (`outbox-uow`, `outbox-migrate`) exists to support.
//!
//! See `handler::OutboxHandler::run_round`'s doc comments for why the relay
//! takes two snapshots of the same query instead of one.

mod correlation;
mod dispatch;
mod error;
mod handler;
mod ident;
mod model;
mod schema;
mod transport;

pub use correlation::{content_prefix, new_correlation_id};
pub use dispatch::Dispatcher;
pub use error::{DispatchError, EngineError};
pub use handler::{
    Delivery, HandlerConfig, OutboxHandler, DEFAULT_BATCH_SIZE, DEFAULT_LOCK_TIMEOUT,
    DEFAULT_SEND_INTERVAL,
};
pub use ident::{validate_identifier, InvalidIdentifier};
pub use model::StoredEvent;
pub use schema::{ensure_schema, migrations_for};
pub use transport::{OutboundEvent, PerEventTransport, Transport, TransportError};
