//! # Coordination Errors
//!
//! This module defines the error types shared by the primitives, the launcher and
//! every protocol built on top of them. Keeping them in one place means a protocol
//! run can surface a misuse of a primitive without translating it first.
//!
//! Only *fatal* conditions are errors. A full waiting room or a full buffer under
//! a non-blocking put is an expected outcome and is reported through the event log
//! instead (see [`crate::event`]).

use crate::actor::ActorId;

/// A primitive was used in a way that can never be correct.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// The actor already holds this non-reentrant lock.
    #[error("{actor} tried to acquire lock `{lock}` it already holds")]
    DoubleAcquire { lock: String, actor: ActorId },

    /// A condition variable was handed the guard of a lock it is not bound to.
    #[error("condition `{condition}` used with guard of foreign lock `{lock}`")]
    ForeignLock { condition: String, lock: String },
}

/// Errors that abort a protocol run.
#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The run did not finish before its deadline; the listed actors were still live.
    #[error("{protocol} stalled with {} actor(s) pending: {}", pending.len(), join_ids(pending))]
    Stalled {
        protocol: String,
        pending: Vec<ActorId>,
    },

    #[error("{actor} panicked: {message}")]
    ActorPanicked { actor: String, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CoordinationError {
    /// Shorthand used by protocol code when a checked invariant does not hold.
    pub fn invariant(msg: impl Into<String>) -> Self {
        CoordinationError::Invariant(msg.into())
    }

    pub fn is_invariant(&self) -> bool {
        matches!(self, CoordinationError::Invariant(_))
    }
}

fn join_ids(ids: &[ActorId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Role;

    #[test]
    fn stalled_lists_pending_actors() {
        let err = CoordinationError::Stalled {
            protocol: "dining".into(),
            pending: vec![
                ActorId::new(Role::Philosopher, 1),
                ActorId::new(Role::Philosopher, 3),
            ],
        };
        assert_eq!(
            err.to_string(),
            "dining stalled with 2 actor(s) pending: philosopher-1, philosopher-3"
        );
    }

    #[test]
    fn usage_error_converts() {
        let usage = UsageError::DoubleAcquire {
            lock: "turn".into(),
            actor: ActorId::new(Role::Process, 0),
        };
        let err: CoordinationError = usage.clone().into();
        assert!(matches!(err, CoordinationError::Usage(u) if u == usage));
    }
}
