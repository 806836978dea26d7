//! # Strict Alternation
//!
//! Two processes take turns on a shared [`Turnstile`]: process 0 acts first, then
//! process 1, then process 0 again, for a fixed number of rounds each. A process
//! that finds the turn belongs to the other one waits on the turnstile's
//! condition until it is handed the turn.
//!
//! The turnstile remembers who acted last; a process acting twice in a row is an
//! invariant violation.

use async_trait::async_trait;
use coordination_framework::sync::{Condition, Lock};
use coordination_framework::{
    Action, Actor, ActorEnv, ActorId, CoordinationError, Crew, ResourceState, Role, WorkRange,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::AlternationConfig;

/// Number of processes taking turns.
pub const PROCESSES: usize = 2;

#[derive(Debug)]
struct TurnState {
    next: usize,
    last: Option<usize>,
}

/// The shared turn indicator.
#[derive(Debug)]
pub struct Turnstile {
    turn: Lock<TurnState>,
    handed_over: Condition,
}

impl Turnstile {
    pub fn new() -> Self {
        let turn = Lock::new(
            "turn",
            TurnState {
                next: 0,
                last: None,
            },
        );
        let handed_over = Condition::new("turn.handed_over", &turn);
        Self { turn, handed_over }
    }

    /// Waits for `process`'s turn, performs the action and hands the turn over.
    pub async fn take_turn(
        &self,
        process: ActorId,
        round: usize,
        env: &ActorEnv,
        work: WorkRange,
    ) -> Result<(), CoordinationError> {
        let me = process.index;
        if me >= PROCESSES {
            return Err(CoordinationError::invariant(format!(
                "{process} is not one of the {PROCESSES} alternating processes"
            )));
        }

        let turn = self.turn.acquire(process).await?;
        let mut turn = self.handed_over.wait_while(turn, |t| t.next != me).await?;
        if turn.last == Some(me) {
            return Err(CoordinationError::invariant(format!(
                "{process} acted twice in a row"
            )));
        }

        env.work(work).await;
        turn.last = Some(me);
        turn.next = (me + 1) % PROCESSES;
        env.record(
            process,
            Action::TookTurn(round),
            ResourceState::Turn { next: turn.next },
        );
        self.handed_over.notify(&turn)?;
        Ok(())
    }
}

impl Default for Turnstile {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Process {
    id: ActorId,
    rounds: usize,
    work: WorkRange,
}

impl Process {
    pub fn new(index: usize, rounds: usize, work: WorkRange) -> Self {
        Self {
            id: ActorId::new(Role::Process, index),
            rounds,
            work,
        }
    }
}

#[async_trait]
impl Actor for Process {
    type Context = Turnstile;

    fn id(&self) -> ActorId {
        self.id
    }

    async fn run(self, turnstile: Arc<Turnstile>, env: ActorEnv) -> Result<(), CoordinationError> {
        for round in 0..self.rounds {
            turnstile.take_turn(self.id, round, &env, self.work).await?;
        }
        env.record(self.id, Action::Finished, ResourceState::None);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternationReport {
    /// Process index of every turn, in order.
    pub sequence: Vec<usize>,
}

pub async fn run(
    config: &AlternationConfig,
    work: WorkRange,
    env: ActorEnv,
    deadline: Duration,
) -> Result<AlternationReport, CoordinationError> {
    config.validate()?;
    let turnstile = Arc::new(Turnstile::new());
    let mut crew = Crew::new("alternation", env.clone())?;
    for index in 0..PROCESSES {
        crew.spawn(Process::new(index, config.rounds, work), turnstile.clone());
    }
    crew.join(deadline).await?;

    let sequence: Vec<usize> = env
        .events()
        .snapshot()
        .iter()
        .filter(|e| matches!(e.action, Action::TookTurn(_)))
        .map(|e| e.actor.index)
        .collect();
    debug!(turns = sequence.len(), "Alternation finished");
    Ok(AlternationReport { sequence })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination_framework::{EventLog, NoDelay};

    fn env() -> ActorEnv {
        ActorEnv::new(EventLog::new(), Arc::new(NoDelay))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn processes_strictly_alternate() {
        let report = run(
            &AlternationConfig { rounds: 20 },
            WorkRange::zero(),
            env(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(report.sequence.len(), 40);
        assert_eq!(report.sequence[0], 0);
        assert!(report.sequence.windows(2).all(|w| w[0] != w[1]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn zero_rounds_is_an_empty_run() {
        let report = run(
            &AlternationConfig { rounds: 0 },
            WorkRange::zero(),
            env(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(report.sequence.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lone_process_stalls_waiting_for_its_partner() {
        let env = env();
        let turnstile = Arc::new(Turnstile::new());
        let mut crew = Crew::new("alternation", env).unwrap();
        crew.spawn(Process::new(1, 1, WorkRange::zero()), turnstile);
        match crew.join(Duration::from_millis(50)).await.unwrap_err() {
            CoordinationError::Stalled { pending, .. } => {
                assert_eq!(pending, vec![ActorId::new(Role::Process, 1)]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn third_process_is_rejected() {
        let turnstile = Turnstile::new();
        let err = turnstile
            .take_turn(ActorId::new(Role::Process, 2), 0, &env(), WorkRange::zero())
            .await
            .unwrap_err();
        assert!(err.is_invariant());
    }
}
