//! Shared test fixtures for this workspace: DB bootstrap helpers, a
//! recording `Transport`/`PerEventTransport` double, and small hand-rolled
//! property-style generators (no `proptest` dependency).

mod fixture;
mod gen;
mod transport;

pub use fixture::{test_pool, unique_transport_name};
pub use gen::{assert_correlation_id_shape, Xorshift64};
pub use transport::{RecordingTransport, ScriptedFailure};
