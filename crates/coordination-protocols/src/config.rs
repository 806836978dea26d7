//! # Simulation Configuration
//!
//! One TOML document configures every protocol. Each section is optional and
//! every field has a default, so an empty file (or no file at all) runs the
//! classic textbook sizes:
//!
//! ```toml
//! deadline_ms = 120000
//! seed = 7
//!
//! [work]
//! min_ms = 100
//! max_ms = 500
//!
//! [bounded_buffer]
//! capacity = 5
//! producers = 3
//! items_per_producer = 5
//! consumers = 3
//! items_per_consumer = 5
//!
//! [barber]
//! chairs = 3
//! clients = 10
//! ```
//!
//! [`SimulationConfig::validate`] rejects shapes that cannot terminate (an
//! unbalanced buffer, a one-seat table, a shop without chairs) before any actor
//! is spawned.

use coordination_framework::{CoordinationError, WorkRange};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] CoordinationError),
}

/// A simulated-work range in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkSpec {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl WorkSpec {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn range(&self) -> WorkRange {
        WorkRange::millis(self.min_ms, self.max_ms)
    }
}

impl Default for WorkSpec {
    fn default() -> Self {
        Self::new(100, 500)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Upper bound on one protocol run. Missing it is reported as a stall.
    pub deadline_ms: u64,
    /// Seed for the random delay source. Unseeded runs draw from entropy.
    pub seed: Option<u64>,
    /// Work duration every actor simulates between coordination steps.
    pub work: WorkSpec,
    pub bounded_buffer: BufferConfig,
    pub dining: DiningConfig,
    pub readers_writers: ReadersWritersConfig,
    pub barber: BarberConfig,
    pub alternation: AlternationConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 120_000,
            seed: None,
            work: WorkSpec::default(),
            bounded_buffer: BufferConfig::default(),
            dining: DiningConfig::default(),
            readers_writers: ReadersWritersConfig::default(),
            barber: BarberConfig::default(),
            alternation: AlternationConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn validate(&self) -> Result<(), CoordinationError> {
        if self.deadline_ms == 0 {
            return Err(invalid("deadline_ms must be positive"));
        }
        self.bounded_buffer.validate()?;
        self.dining.validate()?;
        self.readers_writers.validate()?;
        self.barber.validate()?;
        self.alternation.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    pub capacity: usize,
    pub producers: usize,
    pub items_per_producer: usize,
    pub consumers: usize,
    pub items_per_consumer: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            producers: 3,
            items_per_producer: 5,
            consumers: 3,
            items_per_consumer: 5,
        }
    }
}

impl BufferConfig {
    pub fn total_produced(&self) -> usize {
        self.producers * self.items_per_producer
    }

    pub fn total_consumed(&self) -> usize {
        self.consumers * self.items_per_consumer
    }

    pub fn validate(&self) -> Result<(), CoordinationError> {
        if self.capacity == 0 {
            return Err(invalid("bounded_buffer.capacity must be at least 1"));
        }
        // Any imbalance leaves someone blocked forever on a full or empty buffer.
        if self.total_produced() != self.total_consumed() {
            return Err(invalid(format!(
                "bounded_buffer produces {} items but consumes {}",
                self.total_produced(),
                self.total_consumed()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiningConfig {
    pub philosophers: usize,
    pub meals: usize,
}

impl Default for DiningConfig {
    fn default() -> Self {
        Self {
            philosophers: 5,
            meals: 3,
        }
    }
}

impl DiningConfig {
    pub fn validate(&self) -> Result<(), CoordinationError> {
        if self.philosophers < 2 {
            return Err(invalid("dining.philosophers must be at least 2"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadersWritersConfig {
    pub readers: usize,
    pub writers: usize,
    pub reads_per_reader: usize,
    pub writes_per_writer: usize,
}

impl Default for ReadersWritersConfig {
    fn default() -> Self {
        Self {
            readers: 5,
            writers: 2,
            reads_per_reader: 3,
            writes_per_writer: 2,
        }
    }
}

impl ReadersWritersConfig {
    pub fn validate(&self) -> Result<(), CoordinationError> {
        if self.readers + self.writers == 0 {
            return Err(invalid("readers_writers needs at least one reader or writer"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarberConfig {
    pub chairs: usize,
    pub clients: usize,
    /// Gap between two client arrivals.
    pub arrival: WorkSpec,
}

impl Default for BarberConfig {
    fn default() -> Self {
        Self {
            chairs: 3,
            clients: 10,
            arrival: WorkSpec::new(100, 1000),
        }
    }
}

impl BarberConfig {
    pub fn validate(&self) -> Result<(), CoordinationError> {
        if self.chairs == 0 {
            return Err(invalid("barber.chairs must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlternationConfig {
    pub rounds: usize,
}

impl Default for AlternationConfig {
    fn default() -> Self {
        Self { rounds: 5 }
    }
}

impl AlternationConfig {
    pub fn validate(&self) -> Result<(), CoordinationError> {
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> CoordinationError {
    CoordinationError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SimulationConfig::from_toml("").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.bounded_buffer.total_produced(), 15);
        assert_eq!(config.dining.philosophers, 5);
        assert_eq!(config.barber.chairs, 3);
    }

    #[test]
    fn sections_override_selectively() {
        let config = SimulationConfig::from_toml(
            r#"
            seed = 42

            [work]
            min_ms = 0
            max_ms = 0

            [dining]
            meals = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.work, WorkSpec::new(0, 0));
        assert_eq!(config.dining.meals, 7);
        assert_eq!(config.dining.philosophers, 5);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = SimulationConfig::from_toml("[barber]\nseats = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unbalanced_buffer_is_invalid() {
        let err = SimulationConfig::from_toml(
            "[bounded_buffer]\nproducers = 2\nitems_per_producer = 5\n\
             consumers = 3\nitems_per_consumer = 5\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("produces 10 items but consumes 15"));
    }

    #[test]
    fn degenerate_shapes_are_invalid() {
        for doc in [
            "[dining]\nphilosophers = 1\n",
            "[barber]\nchairs = 0\n",
            "[bounded_buffer]\ncapacity = 0\n",
            "deadline_ms = 0\n",
        ] {
            assert!(
                matches!(SimulationConfig::from_toml(doc), Err(ConfigError::Invalid(_))),
                "{doc:?} should be rejected"
            );
        }
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[alternation]\nrounds = 9").unwrap();
        let config = SimulationConfig::load(file.path()).unwrap();
        assert_eq!(config.alternation.rounds, 9);
    }

    #[test]
    fn shipped_config_is_valid() {
        let config =
            SimulationConfig::from_toml(include_str!("../../../config/coordination.toml")).unwrap();
        assert_eq!(config.seed, Some(2024));
        assert_eq!(config.barber.arrival, WorkSpec::new(10, 100));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = SimulationConfig::load("/nonexistent/coordination.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/coordination.toml"));
    }
}
