use std::future::Future;
use std::sync::Arc;

use outbox_pool::{BoxFuture, PoolError, ReleaseFn, SharedPool};
use sqlx::{MySql, MySqlPool, Transaction};
use tokio::sync::Mutex;

use crate::ScopeId;

#[derive(Debug, thiserror::Error)]
pub enum UowError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("{0}; additionally failed to release the unit-of-work transaction: {1}")]
    Joined(Box<UowError>, Box<PoolError>),
}

impl UowError {
    /// Joins a release-path failure onto the error that was already in
    /// flight, so the release error never replaces — only supplements —
    /// whichever call actually caused the scope to fail.
    pub(crate) fn joined(primary: UowError, release: PoolError) -> Self {
        UowError::Joined(Box::new(primary), Box::new(release))
    }
}

struct ScopedTxState {
    tx: Option<Transaction<'static, MySql>>,
    // Once true, stays true: a nested failure anywhere in the scope must
    // survive a later sibling or outer call returning `Ok`. Tracking a
    // sticky poison flag rather than flipping a commit/rollback enum back
    // and forth is what makes that true regardless of call order.
    poisoned: bool,
    // Set only by a nested call that itself returned `Ok`. Teardown commits
    // only when this is true *and* `poisoned` is false — so a panic, which
    // unwinds past the call that would have set this, falls through to the
    // safe default of rollback instead of committing partial work.
    commit_requested: bool,
}

/// Handle to the transaction shared by every nested call in one
/// [`ScopeId`]. Cloning is cheap — every clone refers to the same
/// underlying transaction.
///
/// A sticky `poisoned` bool, not a plain commit/rollback enum, backs the
/// shared outcome: an enum reassigned on every `Ok` would let a later,
/// unrelated nested success erase an earlier nested failure's poison.
pub struct UowContext {
    state: Arc<Mutex<ScopedTxState>>,
}

impl Clone for UowContext {
    fn clone(&self) -> Self {
        UowContext {
            state: self.state.clone(),
        }
    }
}

impl UowContext {
    /// Run `f` against the shared transaction, holding the lock only for
    /// the duration of `f`. Nested `UnitOfWork::execute` calls for the same
    /// scope never contend on a guard held across a whole callback —
    /// they only ever block each other for the length of one query.
    pub async fn client<F, Fut, T>(&self, f: F) -> Result<T, sqlx::Error>
    where
        F: FnOnce(&mut Transaction<'static, MySql>) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut guard = self.state.lock().await;
        let tx = guard
            .tx
            .as_mut()
            .expect("UowContext used after its unit of work already finished");
        f(tx).await
    }

    /// Poison the shared transaction: even if every other nested call
    /// returns `Ok`, the outermost `execute` rolls back instead of
    /// committing. Permanent for the life of the scope.
    pub async fn mark_rollback_only(&self) {
        self.state.lock().await.poisoned = true;
    }

    /// Records that a call into this scope finished cleanly. Does not by
    /// itself guarantee a commit — `poisoned` still wins over this if any
    /// nested call ever failed.
    async fn mark_ready_to_commit(&self) {
        self.state.lock().await.commit_requested = true;
    }
}

/// Composable, reentrant "run this inside one transaction" primitive.
/// Nested `execute` calls sharing a `ScopeId` run against one transaction;
/// only the outermost call commits or rolls it back, at which point the
/// transaction is released back to the pool.
#[derive(Clone)]
pub struct UnitOfWork {
    db: MySqlPool,
    pool: Arc<SharedPool<ScopeId, UowContext>>,
}

impl UnitOfWork {
    pub fn new(db: MySqlPool) -> Self {
        Self {
            db,
            pool: Arc::new(SharedPool::new()),
        }
    }

    pub async fn execute<F, Fut, T>(&self, scope: ScopeId, callback: F) -> Result<T, UowError>
    where
        F: FnOnce(UowContext) -> Fut,
        Fut: Future<Output = Result<T, UowError>>,
    {
        let db = self.db.clone();
        let handle = self
            .pool
            .get(scope, move || {
                Box::pin(async move {
                    let tx = db.begin().await.map_err(PoolError::factory)?;
                    let state = Arc::new(Mutex::new(ScopedTxState {
                        tx: Some(tx),
                        poisoned: false,
                        commit_requested: false,
                    }));
                    let teardown_state = state.clone();
                    let release: ReleaseFn = Box::new(move || {
                        Box::pin(async move {
                            let mut guard = teardown_state.lock().await;
                            let tx = guard
                                .tx
                                .take()
                                .expect("unit of work transaction released twice");
                            // Rollback is the default outcome: it's what
                            // happens if no call ever reaches
                            // `mark_ready_to_commit` at all, which is
                            // exactly what a panic unwinding through
                            // `execute` looks like from here.
                            let should_commit = guard.commit_requested && !guard.poisoned;
                            drop(guard);
                            if should_commit {
                                tx.commit().await.map_err(PoolError::release)
                            } else {
                                tx.rollback().await.map_err(PoolError::release)
                            }
                        })
                    });
                    Ok((UowContext { state }, release))
                }) as BoxFuture<'static, Result<(UowContext, ReleaseFn), PoolError>>
            })
            .await?;

        let ctx = (**handle.value()).clone();
        let result = callback(ctx.clone()).await;
        match &result {
            Ok(_) => ctx.mark_ready_to_commit().await,
            Err(_) => ctx.mark_rollback_only().await,
        }

        // A release failure must never mask whichever error the callback
        // itself produced — join the two instead of letting `?` discard
        // `result` in favor of the teardown error.
        match (result, handle.release().await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release_err)) => Err(UowError::from(release_err)),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release_err)) => Err(UowError::joined(err, release_err)),
        }
    }
}
