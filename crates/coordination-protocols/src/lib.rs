//! # Coordination Protocols
//!
//! Five classic coordination problems, each built only from the primitives of
//! [`coordination_framework`]:
//!
//! | Module              | Actors                  | Shared resource                    |
//! |---------------------|-------------------------|------------------------------------|
//! | [`bounded_buffer`]  | producers, consumers    | bounded queue of labeled items     |
//! | [`dining`]          | philosophers            | ring of forks                      |
//! | [`readers_writers`] | readers, writers        | room with writer-priority entry    |
//! | [`barber`]          | one barber, clients     | waiting room plus handshake        |
//! | [`alternation`]     | two processes           | turn indicator                     |
//!
//! Every protocol module exposes its actors, its shared resource and a `run`
//! function that launches a configured crew and reports the outcome. The
//! [`lifecycle::Simulation`] orchestrator ties them to a
//! [`config::SimulationConfig`] and audits every run with [`audit`].

pub mod alternation;
pub mod audit;
pub mod barber;
pub mod bounded_buffer;
pub mod config;
pub mod dining;
pub mod lifecycle;
pub mod readers_writers;

pub use config::{ConfigError, SimulationConfig};
pub use lifecycle::{ProtocolKind, ProtocolRun, Simulation, Summary};
