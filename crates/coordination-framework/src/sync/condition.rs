//! # Condition Variable
//!
//! A [`Condition`] is a suspension point bound to exactly one [`Lock`]. Holding the
//! lock is enforced by the type system: [`Condition::wait`], [`Condition::notify`]
//! and [`Condition::notify_all`] all take the lock's guard. Handing them the guard
//! of some *other* lock is reported as [`UsageError::ForeignLock`].
//!
//! `wait` atomically releases the lock and suspends: the waiter registers for a
//! wakeup *before* the guard is dropped, so a notify issued by the next holder can
//! never be lost. The lock is reacquired before `wait` returns.
//!
//! Wakeups follow Mesa semantics. A woken waiter must re-check its predicate, which
//! [`Condition::wait_while`] does for you:
//!
//! ```rust,ignore
//! let not_empty = Condition::new("not_empty", &items);
//!
//! let guard = items.acquire(me).await?;
//! let mut guard = not_empty.wait_while(guard, |q| q.is_empty()).await?;
//! let item = guard.pop_front();
//! ```

use crate::error::UsageError;
use crate::sync::lock::{Lock, LockGuard};
use tokio::sync::Notify;

/// Condition variable bound to a single [`Lock`].
#[derive(Debug)]
pub struct Condition {
    name: String,
    lock_id: u64,
    notify: Notify,
}

impl Condition {
    /// Creates a condition associated with `lock`.
    pub fn new<T>(name: impl Into<String>, lock: &Lock<T>) -> Self {
        Self {
            name: name.into(),
            lock_id: lock.id(),
            notify: Notify::new(),
        }
    }

    /// Releases the lock, waits for a notification, then reacquires the lock.
    pub async fn wait<'a, T>(
        &self,
        guard: LockGuard<'a, T>,
    ) -> Result<LockGuard<'a, T>, UsageError> {
        self.check(&guard)?;

        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let (lock, actor) = (guard.lock, guard.actor);
        drop(guard);

        notified.await;
        lock.acquire(actor).await
    }

    /// Waits for as long as `condition` holds on the protected value.
    pub async fn wait_while<'a, T, F>(
        &self,
        mut guard: LockGuard<'a, T>,
        mut condition: F,
    ) -> Result<LockGuard<'a, T>, UsageError>
    where
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut *guard) {
            guard = self.wait(guard).await?;
        }
        Ok(guard)
    }

    /// Wakes one waiter.
    pub fn notify<T>(&self, guard: &LockGuard<'_, T>) -> Result<(), UsageError> {
        self.check(guard)?;
        self.notify.notify_one();
        Ok(())
    }

    /// Wakes every current waiter.
    pub fn notify_all<T>(&self, guard: &LockGuard<'_, T>) -> Result<(), UsageError> {
        self.check(guard)?;
        self.notify.notify_waiters();
        Ok(())
    }

    fn check<T>(&self, guard: &LockGuard<'_, T>) -> Result<(), UsageError> {
        if guard.lock.id() != self.lock_id {
            return Err(UsageError::ForeignLock {
                condition: self.name.clone(),
                lock: guard.lock.name().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorId, Role};
    use std::sync::Arc;
    use std::time::Duration;

    const A: ActorId = ActorId::new(Role::Process, 0);
    const B: ActorId = ActorId::new(Role::Process, 1);

    #[tokio::test]
    async fn foreign_guard_is_rejected() {
        let mine = Lock::new("mine", ());
        let other = Lock::new("other", ());
        let cond = Condition::new("ready", &mine);

        let guard = other.acquire(A).await.unwrap();
        assert_eq!(
            cond.notify(&guard),
            Err(UsageError::ForeignLock {
                condition: "ready".into(),
                lock: "other".into()
            })
        );
        assert!(cond.wait(guard).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_releases_and_reacquires() {
        let lock = Arc::new(Lock::new("flag", false));
        let cond = Arc::new(Condition::new("flag_set", &lock));

        let waiter = {
            let (lock, cond) = (lock.clone(), cond.clone());
            tokio::spawn(async move {
                let guard = lock.acquire(A).await.unwrap();
                let guard = cond.wait_while(guard, |set| !*set).await.unwrap();
                assert_eq!(guard.actor(), A);
                assert_eq!(lock.holder(), Some(A));
                *guard
            })
        };

        // The waiter must have released the lock for us to get it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut guard = lock.acquire(B).await.unwrap();
        *guard = true;
        cond.notify(&guard).unwrap();
        drop(guard);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn notify_all_wakes_every_waiter() {
        let lock = Arc::new(Lock::new("gate", false));
        let cond = Arc::new(Condition::new("open", &lock));

        let mut waiters = Vec::new();
        for i in 0..5 {
            let (lock, cond) = (lock.clone(), cond.clone());
            waiters.push(tokio::spawn(async move {
                let me = ActorId::new(Role::Reader, i);
                let guard = lock.acquire(me).await.unwrap();
                let _guard = cond.wait_while(guard, |open| !*open).await.unwrap();
            }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        let me = ActorId::new(Role::Writer, 0);
        let mut guard = lock.acquire(me).await.unwrap();
        *guard = true;
        cond.notify_all(&guard).unwrap();
        drop(guard);

        for w in waiters {
            tokio::time::timeout(Duration::from_secs(5), w)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
