//! # Coordination Framework
//!
//! This crate provides the building blocks for classic concurrency-coordination
//! problems: a small **primitive layer** (lock, semaphore, condition variable,
//! bounded queue), a generic **actor launcher**, and an **event log** that records
//! what every actor did.
//!
//! ## Primitives
//!
//! The primitives wrap tokio's fair mutex, semaphore and notifier and add the
//! contract the protocols are written against:
//!
//! - a lock knows which actor holds it, and re-acquiring it is a reported usage
//!   error;
//! - a condition variable is bound to one lock and only accepts that lock's guard;
//! - a bounded queue is built from a lock and two conditions.
//!
//! ## Concurrency Model
//!
//! - Each actor runs on its own task of a **multi-threaded** runtime.
//! - Actors share state only through a protocol's shared resource, handed to them
//!   when they are spawned. There are no globals.
//! - Each piece of shared state is owned by exactly one [`Lock`](sync::Lock).
//!
//! ## Quick Example
//!
//! ```rust
//! use coordination_framework::sync::Lock;
//! use coordination_framework::{ActorId, Role};
//!
//! #[tokio::main]
//! async fn main() {
//!     let me = ActorId::new(Role::Process, 0);
//!     let turn = Lock::new("turn", 0usize);
//!
//!     let mut guard = turn.acquire(me).await.unwrap();
//!     *guard += 1;
//!
//!     // Re-acquiring a held lock is reported, not deadlocked on.
//!     assert!(turn.acquire(me).await.is_err());
//! }
//! ```
//!
//! ## Module Tour
//!
//! - [`sync`]: the primitive layer.
//! - [`actor`]: actor identity, the [`Actor`] trait and the per-run [`ActorEnv`].
//! - [`launcher`]: the [`Crew`] that spawns actors and joins them under a deadline.
//! - [`event`]: the event log, the only observable output of a run.
//! - [`delay`]: pluggable simulated work time.
//! - [`error`]: fatal errors ([`CoordinationError`], [`UsageError`]).
//! - [`tracing`]: subscriber setup.

pub mod actor;
pub mod delay;
pub mod error;
pub mod event;
pub mod launcher;
pub mod sync;
pub mod tracing;

// Re-export core types for convenience
pub use actor::{Actor, ActorEnv, ActorId, Role};
pub use delay::{Delay, FixedDelay, NoDelay, RandomDelay, WorkRange};
pub use error::{CoordinationError, UsageError};
pub use event::{Action, Event, EventLog, ResourceState};
pub use launcher::Crew;
