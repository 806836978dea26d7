//! # Lifecycle
//!
//! The orchestrator: [`Simulation`] turns a [`SimulationConfig`](crate::config::SimulationConfig)
//! into protocol runs, one [`ProtocolRun`] per protocol.

mod simulation;

pub use simulation::{ProtocolKind, ProtocolRun, Simulation, Summary};
