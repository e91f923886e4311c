use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use outbox_db::AdvisoryLock;
use outbox_pool::{BoxFuture, PoolError, ReleaseFn, SharedPool};
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlPool};
use tokio::sync::Mutex;

use crate::ScopeId;

#[derive(Debug, thiserror::Error)]
pub enum LockerError {
    #[error(transparent)]
    Pool(#[from] PoolError),
}

struct LockState {
    conn: Option<PoolConnection<MySql>>,
    name: String,
}

/// Opaque pooled value backing one held advisory lock. `SharedPool` already
/// guarantees the factory — and so the one `AdvisoryLock::acquire` call —
/// runs exactly once per scope, so there is nothing left for this type to
/// track beyond the connection to release.
struct SharedLock(Arc<Mutex<LockState>>);

impl Clone for SharedLock {
    fn clone(&self) -> Self {
        SharedLock(self.0.clone())
    }
}

/// Reentrant named-lock primitive. Nested `execute_with_lock` calls
/// sharing a `ScopeId` acquire the advisory lock once and release it once,
/// on the outermost call.
pub struct Locker {
    db: MySqlPool,
    pool: Arc<SharedPool<ScopeId, SharedLock>>,
}

impl Locker {
    pub fn new(db: MySqlPool) -> Self {
        Self {
            db,
            pool: Arc::new(SharedPool::new()),
        }
    }

    pub async fn execute_with_lock<F, Fut, T, E>(
        &self,
        scope: ScopeId,
        lock_name: &str,
        timeout: Duration,
        callback: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockerError>,
    {
        let db = self.db.clone();
        let name = lock_name.to_string();
        let handle = self
            .pool
            .get(scope, move || {
                Box::pin(async move {
                    let mut conn = db.acquire().await.map_err(PoolError::factory)?;
                    AdvisoryLock::acquire(&mut conn, &name, timeout)
                        .await
                        .map_err(PoolError::factory)?;
                    let state = Arc::new(Mutex::new(LockState {
                        conn: Some(conn),
                        name,
                    }));
                    let teardown_state = state.clone();
                    let release: ReleaseFn = Box::new(move || {
                        Box::pin(async move {
                            let mut guard = teardown_state.lock().await;
                            if let Some(mut conn) = guard.conn.take() {
                                AdvisoryLock::release(&mut conn, &guard.name)
                                    .await
                                    .map_err(PoolError::release)?;
                            }
                            Ok(())
                        })
                    });
                    Ok((SharedLock(state), release))
                }) as BoxFuture<'static, Result<(SharedLock, ReleaseFn), PoolError>>
            })
            .await
            .map_err(|err| E::from(LockerError::Pool(err)))?;

        let result = callback().await;
        handle
            .release()
            .await
            .map_err(|err| E::from(LockerError::Pool(err)))?;
        result
    }
}
