//! # Event Log
//!
//! The event log is the only externally observable artifact of a protocol run.
//! Every entry records *who* did *what* and the resulting state of the shared
//! resource, stamped with the time since the log was opened.
//!
//! Entries are append-only. Their order reflects the real interleaving of the run
//! as long as actors record while still holding the lock of the resource they
//! report on; it is not a total order across unrelated resources.
//!
//! Each recorded event is also emitted as a structured `tracing` record, so a run
//! with `RUST_LOG=info` prints the same story the log holds:
//!
//! ```text
//! INFO actor{id=producer-1}: event actor=producer-1 action="produced-item P1-Item0" state=buffer 1/5
//! INFO actor{id=consumer-0}: event actor=consumer-0 action="consumed-item P1-Item0" state=buffer 0/5
//! ```

use crate::actor::ActorId;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// What an actor did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // --- bounded buffer ---
    ProducedItem(String),
    ConsumedItem(String),
    BufferFull,
    BufferEmpty,

    // --- dining philosophers ---
    Thinking,
    Hungry,
    AcquiredFork(usize),
    ReleasedFork(usize),
    /// Gave the lower fork back because the higher one was taken.
    BackedOff(usize),
    Eating,
    FinishedEating,

    // --- readers / writers ---
    AnnouncedWrite,
    StartedReading,
    FinishedReading,
    StartedWriting,
    FinishedWriting,

    // --- sleeping barber ---
    OpenedShop,
    Sleeping,
    WokeUp,
    CuttingHair(ActorId),
    ServedClient(ActorId),
    ClosedShop,
    Arrived,
    TookSeat,
    TurnedAway,
    GotHaircut,

    // --- alternation ---
    TookTurn(usize),

    // --- any actor ---
    Finished,
}

impl Action {
    /// Stable kebab-case tag of the action, without its payload.
    pub fn tag(&self) -> &'static str {
        match self {
            Action::ProducedItem(_) => "produced-item",
            Action::ConsumedItem(_) => "consumed-item",
            Action::BufferFull => "buffer-full",
            Action::BufferEmpty => "buffer-empty",
            Action::Thinking => "thinking",
            Action::Hungry => "hungry",
            Action::AcquiredFork(_) => "acquired-fork",
            Action::ReleasedFork(_) => "released-fork",
            Action::BackedOff(_) => "backed-off",
            Action::Eating => "eating",
            Action::FinishedEating => "finished-eating",
            Action::AnnouncedWrite => "announced-write",
            Action::StartedReading => "started-reading",
            Action::FinishedReading => "finished-reading",
            Action::StartedWriting => "started-writing",
            Action::FinishedWriting => "finished-writing",
            Action::OpenedShop => "opened-shop",
            Action::Sleeping => "sleeping",
            Action::WokeUp => "woke-up",
            Action::CuttingHair(_) => "cutting-hair",
            Action::ServedClient(_) => "served-client",
            Action::ClosedShop => "closed-shop",
            Action::Arrived => "arrived",
            Action::TookSeat => "took-seat",
            Action::TurnedAway => "turned-away",
            Action::GotHaircut => "got-haircut",
            Action::TookTurn(_) => "took-turn",
            Action::Finished => "finished",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ProducedItem(item) | Action::ConsumedItem(item) => {
                write!(f, "{} {}", self.tag(), item)
            }
            Action::AcquiredFork(fork) | Action::ReleasedFork(fork) | Action::BackedOff(fork) => {
                write!(f, "{} #{}", self.tag(), fork)
            }
            Action::CuttingHair(client) | Action::ServedClient(client) => {
                write!(f, "{} {}", self.tag(), client)
            }
            Action::TookTurn(round) => write!(f, "{} {}", self.tag(), round),
            _ => f.write_str(self.tag()),
        }
    }
}

/// State of the shared resource right after the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    Buffer { occupancy: usize, capacity: usize },
    Fork { fork: usize, holder: Option<ActorId> },
    Meals { remaining: usize },
    Room {
        readers: usize,
        writer_active: bool,
        writers_waiting: usize,
    },
    WaitingRoom { occupied: usize, chairs: usize },
    Turn { next: usize },
    None,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Buffer {
                occupancy,
                capacity,
            } => write!(f, "buffer {occupancy}/{capacity}"),
            ResourceState::Fork { fork, holder } => match holder {
                Some(holder) => write!(f, "fork #{fork} held by {holder}"),
                None => write!(f, "fork #{fork} free"),
            },
            ResourceState::Meals { remaining } => write!(f, "{remaining} meal(s) left"),
            ResourceState::Room {
                readers,
                writer_active,
                writers_waiting,
            } => write!(
                f,
                "readers={readers} writer_active={writer_active} writers_waiting={writers_waiting}"
            ),
            ResourceState::WaitingRoom { occupied, chairs } => {
                write!(f, "chairs {occupied}/{chairs} taken")
            }
            ResourceState::Turn { next } => write!(f, "turn -> {next}"),
            ResourceState::None => f.write_str("-"),
        }
    }
}

/// One entry of the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Time since the log was opened.
    pub at: Duration,
    pub actor: ActorId,
    pub action: Action,
    pub state: ResourceState,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>8.3}ms] {} {} ({})",
            self.at.as_secs_f64() * 1000.0,
            self.actor,
            self.action,
            self.state
        )
    }
}

/// Shared, append-only event log for one protocol run.
///
/// Cloning is cheap; all clones append to the same log.
#[derive(Clone)]
pub struct EventLog {
    opened: Instant,
    entries: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            opened: Instant::now(),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Appends an event and emits it as a tracing record.
    pub fn record(&self, actor: ActorId, action: Action, state: ResourceState) -> Event {
        let event = Event {
            at: self.opened.elapsed(),
            actor,
            action,
            state,
        };
        info!(actor = %event.actor, action = %event.action, state = %event.state, "event");

        // A panicking actor cannot leave a half-written Vec behind, so a poisoned
        // log is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        event
    }

    /// Copy of every entry recorded so far, in append order.
    pub fn snapshot(&self) -> Vec<Event> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries whose action carries the given tag.
    pub fn count(&self, tag: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.action.tag() == tag)
            .count()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}
