//! Reentrant transaction and advisory-lock composition.
//!
//! Both primitives are built the same way: a [`ScopeId`] keys an
//! `outbox_pool::SharedPool` entry, the factory does the expensive
//! one-time setup (begin a transaction, take a lock), and the pool's own
//! refcounting is what makes nested calls share one entry and only the
//! outermost call tear it down.

mod locker;
mod lockable;
mod scope;
mod uow;

pub use locker::{Locker, LockerError};
pub use lockable::{LockableError, LockableUnitOfWork};
pub use scope::ScopeId;
pub use uow::{UnitOfWork, UowContext, UowError};
