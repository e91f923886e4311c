//! Keyed, reference-counted cache of expensive closable resources.
//!
//! `SharedPool<K, V>` deduplicates one `V` per `K`: the first caller to
//! `get()` a key runs the factory and installs the result; every later
//! caller for the same key gets a clone of the same `Arc<V>` and the
//! refcount goes up by one. The value is torn down via its factory-supplied
//! release callback exactly once, when the refcount returns to zero.
//!
//! This is the building block nested connections, transactions and advisory
//! locks are built out of — see `outbox-db`, `outbox-uow`.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Teardown for a pooled value. Invoked exactly once, when the last holder
/// releases its handle.
pub type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), PoolError>> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool factory failed: {0}")]
    Factory(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("pool entry not found (released twice?)")]
    NotFound,
    #[error("pool release callback failed: {0}")]
    Release(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PoolError {
    pub fn factory<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        PoolError::Factory(Box::new(err))
    }

    pub fn release<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        PoolError::Release(Box::new(err))
    }
}

struct Entry<V> {
    value: Arc<V>,
    release: Option<ReleaseFn>,
    count: usize,
}

/// A keyed pool. Always handed out behind an `Arc` since handles keep a
/// reference back to it for release.
pub struct SharedPool<K, V> {
    inner: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> Default for SharedPool<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SharedPool<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically get-or-create the value for `key`.
    ///
    /// The map mutex is held across the factory call: factories in this
    /// system are cheap (open a connection, begin a transaction, take an
    /// advisory lock) and contention is low, so this is simpler than a
    /// release-and-double-check strategy and still preserves "only one
    /// factory invocation installs a value per key".
    pub async fn get<F, Fut>(
        self: &Arc<Self>,
        key: K,
        factory: F,
    ) -> Result<PoolHandle<K, V>, PoolError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(V, ReleaseFn), PoolError>>,
    {
        let mut guard = self.inner.lock().await;

        if let Some(entry) = guard.get_mut(&key) {
            entry.count += 1;
            let value = entry.value.clone();
            drop(guard);
            return Ok(PoolHandle::new(key, value, self.clone()));
        }

        let (value, release) = factory().await?;
        let value = Arc::new(value);
        guard.insert(
            key.clone(),
            Entry {
                value: value.clone(),
                release: Some(release),
                count: 1,
            },
        );
        drop(guard);
        Ok(PoolHandle::new(key, value, self.clone()))
    }

    async fn release(&self, key: &K) -> Result<(), PoolError> {
        let mut guard = self.inner.lock().await;
        let entry = guard.get_mut(key).ok_or(PoolError::NotFound)?;
        entry.count -= 1;
        if entry.count > 0 {
            return Ok(());
        }
        let mut entry = guard.remove(key).expect("entry present; just matched above");
        drop(guard);
        match entry.release.take() {
            Some(release) => release().await,
            None => Ok(()),
        }
    }

    /// Current number of distinct keys with at least one holder. Test-only
    /// introspection for pool-conservation checks.
    #[doc(hidden)]
    pub async fn live_keys(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Handle to a pooled value. `value()` borrows the shared resource;
/// `release()` must be called exactly once per handle when the caller is
/// done with it.
pub struct PoolHandle<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    key: K,
    value: Arc<V>,
    pool: Arc<SharedPool<K, V>>,
    // Set right before the handle is forgotten by `release()`, so `Drop`
    // never runs for the cooperative path below.
    forgotten: bool,
}

impl<K, V> PoolHandle<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn new(key: K, value: Arc<V>, pool: Arc<SharedPool<K, V>>) -> Self {
        Self {
            key,
            value,
            pool,
            forgotten: false,
        }
    }

    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// Release this handle's share of the pooled value. On the last
    /// release for a key this invokes the factory's teardown callback.
    pub async fn release(mut self) -> Result<(), PoolError> {
        let pool = self.pool.clone();
        let key = self.key.clone();
        self.forgotten = true;
        pool.release(&key).await
    }
}

impl<K, V> Drop for PoolHandle<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.forgotten {
            return;
        }
        // Defensive net: a handle should always be released explicitly via
        // `release().await`. Reaching this means the owning task returned
        // early or unwound without doing so; best-effort finish the
        // release on the runtime rather than leak the pool entry forever.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                let key = self.key.clone();
                handle.spawn(async move {
                    if let Err(err) = pool.release(&key).await {
                        tracing::error!(error = %err, "best-effort pool handle release failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!("pool handle dropped outside a tokio runtime; resource leaked");
            }
        }
    }
}
