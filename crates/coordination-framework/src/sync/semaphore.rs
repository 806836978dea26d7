//! # Semaphore
//!
//! A counting semaphore with a non-negative count. [`Semaphore::acquire`] blocks
//! while the count is zero; [`Semaphore::release`] increments it and wakes one
//! waiter. Waiters are served in FIFO order.
//!
//! Unlike a [`Lock`](super::Lock), a semaphore has no owner: any actor may release
//! a permit another actor acquired. The protocols rely on that in two places:
//!
//! - **Signaling** (count starts at 0): the barber sleeps on "client waiting" until
//!   a client releases it, and each client sleeps on its own "cut finished".
//! - **Hand-over exclusion** (count starts at 1): the readers' shared
//!   write-exclusion is taken by the first reader and given back by the last one.

use crate::error::CoordinationError;
use tracing::trace;

/// Counting semaphore; the count never goes negative.
#[derive(Debug)]
pub struct Semaphore {
    name: String,
    inner: tokio::sync::Semaphore,
}

impl Semaphore {
    pub fn new(name: impl Into<String>, permits: usize) -> Self {
        Self {
            name: name.into(),
            inner: tokio::sync::Semaphore::new(permits),
        }
    }

    /// Blocks until a permit is available, then takes it.
    pub async fn acquire(&self) -> Result<(), CoordinationError> {
        let permit = self.inner.acquire().await.map_err(|_| {
            CoordinationError::invariant(format!("semaphore `{}` was closed", self.name))
        })?;
        permit.forget();
        trace!(semaphore = %self.name, available = self.available(), "acquired");
        Ok(())
    }

    /// Takes a permit only if one is available right now.
    pub fn try_acquire(&self) -> bool {
        match self.inner.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Returns one permit, waking the longest waiter if there is one.
    pub fn release(&self) {
        self.inner.add_permits(1);
        trace!(semaphore = %self.name, available = self.available(), "released");
    }

    /// Current count.
    pub fn available(&self) -> usize {
        self.inner.available_permits()
    }
}
