//! Recording transport test doubles. `RecordingTransport` implements both
//! `Transport` shapes so a scenario test can drive either a batched or a
//! per-event `OutboxHandler` and assert on delivery order/count, with an
//! optional scripted failure for "transport error, then retry succeeds"
//! scenarios.

use std::sync::Mutex;

use outbox_engine::{OutboundEvent, PerEventTransport, Transport, TransportError};

#[derive(Debug, thiserror::Error)]
#[error("scripted transport failure")]
pub struct ScriptedFailure;

#[derive(Default)]
struct State {
    received: Vec<OutboundEvent>,
    calls: usize,
    /// Number of upcoming calls that should fail before succeeding.
    fail_next: usize,
}

/// Records every event (or batch) it's handed, in the order received.
/// `fail_next(n)` scripts the next `n` calls to return an error instead,
/// without recording anything for them.
pub struct RecordingTransport {
    state: Mutex<State>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self { state: Mutex::new(State::default()) }
    }

    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().fail_next = n;
    }

    pub fn received(&self) -> Vec<OutboundEvent> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    fn record_or_fail(&self, events: &[OutboundEvent]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(TransportError::new(ScriptedFailure));
        }
        state.received.extend_from_slice(events);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn handle_events(&self, events: &[OutboundEvent]) -> Result<(), TransportError> {
        self.record_or_fail(events)
    }
}

#[async_trait::async_trait]
impl PerEventTransport for RecordingTransport {
    async fn handle_event(&self, event: &OutboundEvent) -> Result<(), TransportError> {
        self.record_or_fail(std::slice::from_ref(event))
    }
}
