//! # Lock
//!
//! A non-reentrant mutual-exclusion lock that owns the state it protects.
//!
//! Unlike a bare mutex, a [`Lock`] knows *which actor* holds it. Acquiring a lock
//! the caller already holds would deadlock by construction, so it is reported as
//! [`UsageError::DoubleAcquire`] before the caller ever blocks.
//!
//! ## Wake order
//!
//! Waiters are granted the lock in **FIFO** order. The lock is built on
//! `tokio::sync::Mutex`, which queues waiters fairly.
//!
//! ```rust,ignore
//! let counter = Lock::new("counter", 0usize);
//! {
//!     let mut guard = counter.acquire(me).await?;
//!     *guard += 1;
//! } // released here
//!
//! // Acquiring twice from the same actor is a usage error, not a hang:
//! let guard = counter.acquire(me).await?;
//! assert!(counter.acquire(me).await.is_err());
//! ```

use crate::actor::ActorId;
use crate::error::UsageError;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Exclusive, blocking, FIFO lock around a value of type `T`.
pub struct Lock<T> {
    id: u64,
    name: String,
    holder: Mutex<Option<ActorId>>,
    inner: tokio::sync::Mutex<T>,
}

impl<T> Lock<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            holder: Mutex::new(None),
            inner: tokio::sync::Mutex::new(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The actor currently holding the lock, if any.
    pub fn holder(&self) -> Option<ActorId> {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the lock is free, then takes it on behalf of `actor`.
    pub async fn acquire(&self, actor: ActorId) -> Result<LockGuard<'_, T>, UsageError> {
        self.check_reentry(actor)?;
        let guard = self.inner.lock().await;
        self.set_holder(Some(actor));
        trace!(lock = %self.name, %actor, "acquired");
        Ok(LockGuard {
            lock: self,
            actor,
            guard,
        })
    }

    /// Takes the lock only if nobody holds it.
    pub fn try_acquire(&self, actor: ActorId) -> Result<Option<LockGuard<'_, T>>, UsageError> {
        self.check_reentry(actor)?;
        match self.inner.try_lock() {
            Ok(guard) => {
                self.set_holder(Some(actor));
                trace!(lock = %self.name, %actor, "acquired (try)");
                Ok(Some(LockGuard {
                    lock: self,
                    actor,
                    guard,
                }))
            }
            Err(_) => Ok(None),
        }
    }

    /// Consumes the lock and returns the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    fn check_reentry(&self, actor: ActorId) -> Result<(), UsageError> {
        if self.holder() == Some(actor) {
            return Err(UsageError::DoubleAcquire {
                lock: self.name.clone(),
                actor,
            });
        }
        Ok(())
    }

    fn set_holder(&self, actor: Option<ActorId>) {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = actor;
    }
}

impl<T> std::fmt::Debug for Lock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lock")
            .field("name", &self.name)
            .field("holder", &self.holder())
            .finish_non_exhaustive()
    }
}

/// Proof that an actor holds a [`Lock`]. Dropping the guard releases the lock.
pub struct LockGuard<'a, T> {
    pub(crate) lock: &'a Lock<T>,
    pub(crate) actor: ActorId,
    guard: tokio::sync::MutexGuard<'a, T>,
}

impl<'a, T> LockGuard<'a, T> {
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Releases the lock. Same as dropping the guard, but reads better at call sites.
    pub fn release(self) {
        drop(self);
    }
}

impl<T> Deref for LockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for LockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        // Runs before `guard` is dropped: the holder is cleared while the mutex is
        // still locked, so the next holder never sees a stale owner.
        self.lock.set_holder(None);
        trace!(lock = %self.lock.name, actor = %self.actor, "released");
    }
}
