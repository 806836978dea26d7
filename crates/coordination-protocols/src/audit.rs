//! # Event-Log Audit
//!
//! Checks a finished run's event log against the properties each protocol
//! promises. The orchestrator audits every run; a failed audit is reported as an
//! invariant violation.
//!
//! | Protocol        | Property                                                        |
//! |-----------------|-----------------------------------------------------------------|
//! | bounded buffer  | every produced item consumed exactly once; occupancy in bounds  |
//! | dining          | every meal eaten; no fork ever held by two philosophers         |
//! | readers-writers | no writer alongside readers; no reader overtakes an announced writer |
//! | barber          | served + turned away == clients; turned away only when full     |
//! | alternation     | `2 * rounds` turns; no process twice in a row                   |

use coordination_framework::{Action, ActorId, Event, ResourceState, Role};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::config::{BarberConfig, BufferConfig, DiningConfig, ReadersWritersConfig};

/// A property a run's event log does not satisfy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("audit failed: {0}")]
pub struct Violation(pub String);

fn violation(msg: impl Into<String>) -> Violation {
    Violation(msg.into())
}

pub fn bounded_buffer(events: &[Event], config: &BufferConfig) -> Result<(), Violation> {
    let mut produced = HashSet::new();
    let mut consumed = HashSet::new();

    for event in events {
        if let ResourceState::Buffer {
            occupancy,
            capacity,
        } = event.state
        {
            if occupancy > capacity {
                return Err(violation(format!(
                    "buffer at {occupancy}/{capacity} after {}",
                    event.action
                )));
            }
        }
        match &event.action {
            Action::ProducedItem(item) => {
                if !produced.insert(item.clone()) {
                    return Err(violation(format!("{item} produced twice")));
                }
            }
            Action::ConsumedItem(item) => {
                if !produced.contains(item) {
                    return Err(violation(format!("{item} consumed before it was produced")));
                }
                if !consumed.insert(item.clone()) {
                    return Err(violation(format!("{item} consumed twice")));
                }
            }
            _ => {}
        }
    }

    if produced.len() != config.total_produced() || consumed != produced {
        return Err(violation(format!(
            "produced {} item(s), consumed {}, expected {}",
            produced.len(),
            consumed.len(),
            config.total_produced()
        )));
    }
    Ok(())
}

pub fn dining(events: &[Event], config: &DiningConfig) -> Result<(), Violation> {
    let mut holders: HashMap<usize, ActorId> = HashMap::new();
    let mut meals: HashMap<ActorId, usize> = HashMap::new();

    for event in events {
        match event.action {
            Action::AcquiredFork(fork) => {
                if let Some(holder) = holders.insert(fork, event.actor) {
                    return Err(violation(format!(
                        "{} picked up fork #{fork} while {holder} held it",
                        event.actor
                    )));
                }
            }
            Action::ReleasedFork(_) | Action::BackedOff(_) => {
                // A back-off names the contended fork; the state names the one put down.
                let ResourceState::Fork { fork, .. } = event.state else {
                    return Err(violation(format!(
                        "{} put down a fork without reporting which",
                        event.actor
                    )));
                };
                if holders.remove(&fork) != Some(event.actor) {
                    return Err(violation(format!(
                        "{} put down fork #{fork} it did not hold",
                        event.actor
                    )));
                }
            }
            Action::FinishedEating => *meals.entry(event.actor).or_default() += 1,
            _ => {}
        }
    }

    let total: usize = meals.values().sum();
    if total != config.philosophers * config.meals {
        return Err(violation(format!(
            "{total} meal(s) eaten, expected {}",
            config.philosophers * config.meals
        )));
    }
    if let Some((fork, holder)) = holders.iter().next() {
        return Err(violation(format!("fork #{fork} still held by {holder}")));
    }
    Ok(())
}

pub fn readers_writers(events: &[Event], config: &ReadersWritersConfig) -> Result<(), Violation> {
    // Writers that announced and have not finished yet.
    let mut announced: HashSet<ActorId> = HashSet::new();

    for event in events {
        if let ResourceState::Room {
            readers,
            writer_active,
            ..
        } = event.state
        {
            if writer_active && readers > 0 {
                return Err(violation(format!(
                    "writer active alongside {readers} reader(s) at {}",
                    event.action
                )));
            }
        }
        match event.action {
            Action::AnnouncedWrite => {
                announced.insert(event.actor);
            }
            Action::FinishedWriting => {
                announced.remove(&event.actor);
            }
            Action::StartedReading => {
                if let Some(writer) = announced.iter().next() {
                    return Err(violation(format!(
                        "{} started reading while {writer} was waiting to write",
                        event.actor
                    )));
                }
            }
            _ => {}
        }
    }

    let count = |action: Action| events.iter().filter(|e| e.action == action).count();
    let reads = count(Action::FinishedReading);
    let writes = count(Action::FinishedWriting);
    if reads != config.readers * config.reads_per_reader
        || writes != config.writers * config.writes_per_writer
    {
        return Err(violation(format!(
            "{reads} read(s) and {writes} write(s) completed, expected {} and {}",
            config.readers * config.reads_per_reader,
            config.writers * config.writes_per_writer
        )));
    }
    Ok(())
}

pub fn barber(events: &[Event], config: &BarberConfig) -> Result<(), Violation> {
    let mut served = 0;
    let mut turned_away = 0;

    for event in events {
        match event.action {
            Action::ServedClient(_) => served += 1,
            Action::TurnedAway => {
                turned_away += 1;
                match event.state {
                    ResourceState::WaitingRoom { occupied, chairs } if occupied == chairs => {}
                    ref state => {
                        return Err(violation(format!(
                            "{} turned away with {state}",
                            event.actor
                        )))
                    }
                }
            }
            Action::TookSeat => {
                if let ResourceState::WaitingRoom { occupied, chairs } = event.state {
                    if occupied > chairs {
                        return Err(violation(format!(
                            "{} seated with {occupied}/{chairs} chairs taken",
                            event.actor
                        )));
                    }
                }
            }
            _ => {}
        }
    }

    if served + turned_away != config.clients {
        return Err(violation(format!(
            "{served} served + {turned_away} turned away != {} clients",
            config.clients
        )));
    }
    Ok(())
}

pub fn alternation(events: &[Event], rounds: usize) -> Result<(), Violation> {
    let turns: Vec<&Event> = events
        .iter()
        .filter(|e| matches!(e.action, Action::TookTurn(_)))
        .collect();
    if turns.len() != 2 * rounds {
        return Err(violation(format!(
            "{} turn(s) taken, expected {}",
            turns.len(),
            2 * rounds
        )));
    }
    if let Some(pair) = turns.windows(2).find(|w| w[0].actor == w[1].actor) {
        return Err(violation(format!("{} acted twice in a row", pair[1].actor)));
    }
    if let Some(first) = turns.first() {
        if first.actor != ActorId::new(Role::Process, 0) {
            return Err(violation(format!("{} took the first turn", first.actor)));
        }
    }
    Ok(())
}
