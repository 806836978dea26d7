//! # Actors
//!
//! An actor is a plain struct (its data) plus an implementation of the [`Actor`]
//! trait (its behavior). There is no base class to inherit from: the
//! [`Crew`](crate::launcher::Crew) launcher accepts any `Actor` and runs it on its
//! own tokio task.
//!
//! ## Late-bound shared state
//!
//! Shared state is never global. Each protocol builds one `Arc` of its shared
//! resource and hands a clone to every actor when it is spawned, in the same way a
//! context is injected into a running actor rather than baked into its constructor.
//!
//! ```rust,ignore
//! struct Pinger { id: ActorId, rounds: usize }
//!
//! #[async_trait]
//! impl Actor for Pinger {
//!     type Context = Turnstile;
//!
//!     fn id(&self) -> ActorId { self.id }
//!
//!     async fn run(self, table: Arc<Turnstile>, env: ActorEnv) -> Result<(), CoordinationError> {
//!         for _ in 0..self.rounds {
//!             table.take_turn(self.id, &env).await?;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::delay::{Delay, WorkRange};
use crate::error::CoordinationError;
use crate::event::{Action, Event, EventLog, ResourceState};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// The part an actor plays in its protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Producer,
    Consumer,
    Philosopher,
    Reader,
    Writer,
    Client,
    Barber,
    Process,
    /// The orchestrator itself, when it acts on a shared resource (e.g. closing the shop).
    Orchestrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
            Role::Philosopher => "philosopher",
            Role::Reader => "reader",
            Role::Writer => "writer",
            Role::Client => "client",
            Role::Barber => "barber",
            Role::Process => "process",
            Role::Orchestrator => "orchestrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one actor within a run: role tag plus a numeric index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId {
    pub role: Role,
    pub index: usize,
}

impl ActorId {
    pub const fn new(role: Role, index: usize) -> Self {
        Self { role, index }
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.role, self.index)
    }
}

/// Per-run services every actor receives: the event log and the delay source.
#[derive(Clone)]
pub struct ActorEnv {
    events: EventLog,
    delay: Arc<dyn Delay>,
}

impl ActorEnv {
    pub fn new(events: EventLog, delay: Arc<dyn Delay>) -> Self {
        Self { events, delay }
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Appends an event to the run's log. Call it while still holding the lock of
    /// the resource whose state is reported so the log order matches the real order.
    pub fn record(&self, actor: ActorId, action: Action, state: ResourceState) -> Event {
        self.events.record(actor, action, state)
    }

    /// Simulates a unit of work of variable length.
    pub async fn work(&self, range: WorkRange) {
        self.delay.pause(range).await;
    }
}

/// Behavior of an independently scheduled unit of work.
#[async_trait]
pub trait Actor: Send + 'static {
    /// The shared resource this actor coordinates through.
    type Context: Send + Sync + 'static;

    fn id(&self) -> ActorId;

    /// Runs the actor to completion. Returning an error aborts the whole run.
    async fn run(self, ctx: Arc<Self::Context>, env: ActorEnv) -> Result<(), CoordinationError>;
}
