use coordination_framework::{
    ActorEnv, CoordinationError, Delay, Event, EventLog, NoDelay, RandomDelay,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, info_span, Instrument};

use crate::audit;
use crate::config::{ConfigError, SimulationConfig};
use crate::{alternation, barber, bounded_buffer, dining, readers_writers};

/// The coordination protocols a [`Simulation`] can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ProtocolKind {
    BoundedBuffer,
    Dining,
    ReadersWriters,
    Barber,
    Alternation,
}

impl ProtocolKind {
    /// Every protocol, in the order a full run executes them.
    pub const ALL: [ProtocolKind; 5] = [
        ProtocolKind::BoundedBuffer,
        ProtocolKind::Dining,
        ProtocolKind::ReadersWriters,
        ProtocolKind::Barber,
        ProtocolKind::Alternation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProtocolKind::BoundedBuffer => "bounded-buffer",
            ProtocolKind::Dining => "dining",
            ProtocolKind::ReadersWriters => "readers-writers",
            ProtocolKind::Barber => "barber",
            ProtocolKind::Alternation => "alternation",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Protocol-specific outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    BoundedBuffer(bounded_buffer::BufferReport),
    Dining(dining::DiningReport),
    ReadersWriters(readers_writers::ReadersWritersReport),
    Barber(barber::BarberReport),
    Alternation(alternation::AlternationReport),
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Summary::BoundedBuffer(r) => write!(
                f,
                "{} produced, {} consumed, peak occupancy {}/{}",
                r.produced, r.consumed, r.peak_occupancy, r.capacity
            ),
            Summary::Dining(r) => write!(
                f,
                "{} meals eaten, {} back-off(s)",
                r.meals, r.backoffs
            ),
            Summary::ReadersWriters(r) => write!(
                f,
                "{} read(s), {} write(s), up to {} concurrent reader(s)",
                r.reads, r.writes, r.peak_readers
            ),
            Summary::Barber(r) => write!(
                f,
                "{} of {} client(s) served, {} turned away",
                r.served, r.clients, r.turned_away
            ),
            Summary::Alternation(r) => write!(f, "{} turn(s) alternated", r.sequence.len()),
        }
    }
}

/// Everything a finished protocol run produced.
#[derive(Debug, Clone)]
pub struct ProtocolRun {
    pub kind: ProtocolKind,
    pub summary: Summary,
    /// The complete, audited event log.
    pub events: Vec<Event>,
    pub elapsed: Duration,
}

/// The orchestrator of the coordination suite.
///
/// `Simulation` is responsible for:
/// - **Validation**: rejecting configurations that cannot terminate before any
///   actor exists
/// - **Launching**: spawning the configured actor counts of a protocol, each with
///   the protocol's shared resource
/// - **Supervision**: waiting for completion under the configured deadline and
///   aborting the run on the first fatal error
/// - **Audit**: checking the run's event log against the protocol's properties
///
/// Every run gets a fresh event log; nothing carries over between runs.
///
/// # Example
///
/// ```ignore
/// let simulation = Simulation::new(SimulationConfig::default())?;
///
/// for run in simulation.run_all(&ProtocolKind::ALL).await? {
///     println!("{}: {}", run.kind, run.summary);
/// }
/// ```
pub struct Simulation {
    config: SimulationConfig,
    delay: Arc<dyn Delay>,
}

impl Simulation {
    /// Validates `config` and prepares a simulation with a random delay source,
    /// seeded from `config.seed` when one is set.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let delay = Arc::new(RandomDelay::new(config.seed));
        Ok(Self { config, delay })
    }

    /// Replaces the delay source, e.g. with [`NoDelay`] for fast deterministic runs.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Skips all simulated work.
    pub fn without_delay(self) -> Self {
        self.with_delay(Arc::new(NoDelay))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Runs one protocol to completion and audits its event log.
    ///
    /// # Errors
    ///
    /// - [`CoordinationError::Stalled`] if the run misses the configured deadline
    /// - [`CoordinationError::Invariant`] or [`CoordinationError::Usage`] raised by
    ///   an actor, or an audit failure
    /// - [`CoordinationError::ActorPanicked`] if an actor panicked
    pub async fn run(&self, kind: ProtocolKind) -> Result<ProtocolRun, CoordinationError> {
        let span = info_span!("protocol", name = kind.name());
        self.run_protocol(kind).instrument(span).await
    }

    /// Runs `kinds` in order, stopping at the first failure.
    pub async fn run_all(
        &self,
        kinds: &[ProtocolKind],
    ) -> Result<Vec<ProtocolRun>, CoordinationError> {
        let mut runs = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            runs.push(self.run(kind).await?);
        }
        Ok(runs)
    }

    async fn run_protocol(&self, kind: ProtocolKind) -> Result<ProtocolRun, CoordinationError> {
        let config = &self.config;
        let events = EventLog::new();
        let env = ActorEnv::new(events.clone(), self.delay.clone());
        let work = config.work.range();
        let deadline = config.deadline();

        info!("Starting protocol");
        let started = Instant::now();

        let outcome = match kind {
            ProtocolKind::BoundedBuffer => {
                bounded_buffer::run(&config.bounded_buffer, work, env, deadline)
                    .await
                    .map(Summary::BoundedBuffer)
            }
            ProtocolKind::Dining => dining::run(&config.dining, work, env, deadline)
                .await
                .map(Summary::Dining),
            ProtocolKind::ReadersWriters => {
                readers_writers::run(&config.readers_writers, work, env, deadline)
                    .await
                    .map(Summary::ReadersWriters)
            }
            ProtocolKind::Barber => barber::run(&config.barber, work, env, deadline)
                .await
                .map(Summary::Barber),
            ProtocolKind::Alternation => alternation::run(&config.alternation, work, env, deadline)
                .await
                .map(Summary::Alternation),
        };
        let summary = outcome.inspect_err(|e| error!(error = %e, "Protocol failed"))?;

        let events = events.snapshot();
        self.audit(kind, &events)
            .map_err(|violation| CoordinationError::invariant(violation.to_string()))
            .inspect_err(|e| error!(error = %e, "Protocol failed audit"))?;

        let elapsed = started.elapsed();
        info!(
            events = events.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            %summary,
            "Protocol finished"
        );
        Ok(ProtocolRun {
            kind,
            summary,
            events,
            elapsed,
        })
    }

    fn audit(&self, kind: ProtocolKind, events: &[Event]) -> Result<(), audit::Violation> {
        let config = &self.config;
        match kind {
            ProtocolKind::BoundedBuffer => audit::bounded_buffer(events, &config.bounded_buffer),
            ProtocolKind::Dining => audit::dining(events, &config.dining),
            ProtocolKind::ReadersWriters => audit::readers_writers(events, &config.readers_writers),
            ProtocolKind::Barber => audit::barber(events, &config.barber),
            ProtocolKind::Alternation => audit::alternation(events, config.alternation.rounds),
        }
    }
}
