use std::future::Future;
use std::time::Duration;

use crate::locker::{Locker, LockerError};
use crate::uow::{UnitOfWork, UowContext, UowError};
use crate::ScopeId;

#[derive(Debug, thiserror::Error)]
pub enum LockableError {
    #[error(transparent)]
    Lock(#[from] LockerError),
    #[error(transparent)]
    Uow(#[from] UowError),
}

/// Take a named lock, then run a unit of work inside it, both reentrant
/// over the same `ScopeId` — exactly this composition and nothing more.
pub struct LockableUnitOfWork {
    uow: UnitOfWork,
    locker: Locker,
}

impl LockableUnitOfWork {
    pub fn new(uow: UnitOfWork, locker: Locker) -> Self {
        Self { uow, locker }
    }

    pub async fn execute<F, Fut, T>(
        &self,
        scope: ScopeId,
        lock_name: &str,
        lock_timeout: Duration,
        callback: F,
    ) -> Result<T, LockableError>
    where
        F: FnOnce(UowContext) -> Fut,
        Fut: Future<Output = Result<T, UowError>>,
    {
        let uow = &self.uow;
        self.locker
            .execute_with_lock(scope, lock_name, lock_timeout, move || async move {
                uow.execute(scope, callback).await.map_err(LockableError::from)
            })
            .await
    }
}
