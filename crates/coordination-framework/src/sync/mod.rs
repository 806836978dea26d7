//! # Primitive Layer
//!
//! The synchronization primitives every protocol is built from.
//!
//! | Primitive          | Blocks when                  | Wake order | Owner-checked |
//! |--------------------|------------------------------|------------|---------------|
//! | [`Lock`]           | another actor holds it       | FIFO       | yes           |
//! | [`Semaphore`]      | count is zero                | FIFO       | no            |
//! | [`Condition`]      | always (until notified)      | Mesa       | bound lock    |
//! | [`BoundedQueue`]   | full on put, empty on get    | one per op | via its lock  |
//!
//! All of them suspend the calling *task*, never the worker thread, so thousands
//! of blocked actors cost nothing but memory.
//!
//! ## Misuse is fatal
//!
//! Two mistakes can never be correct and are reported as
//! [`UsageError`](crate::error::UsageError) instead of silently hanging:
//!
//! - acquiring a [`Lock`] the same actor already holds;
//! - waiting on or notifying a [`Condition`] with the guard of a different lock.
//!
//! Notifying a condition *without* holding any lock does not compile: every
//! condition operation takes the lock guard.

pub mod condition;
pub mod lock;
pub mod queue;
pub mod semaphore;

pub use condition::Condition;
pub use lock::{Lock, LockGuard};
pub use queue::{BoundedQueue, PutOutcome, QueueSignal};
pub use semaphore::Semaphore;
