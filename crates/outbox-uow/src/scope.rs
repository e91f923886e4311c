use std::sync::atomic::{AtomicU64, Ordering};

/// An explicit reentrancy scope.
///
/// Callers mint a `ScopeId` once per top-level unit of work and pass it
/// explicitly down through anything that should join the same transaction
/// or lock. Two calls with the same `ScopeId` are "nested"; anything else
/// gets its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ScopeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}
