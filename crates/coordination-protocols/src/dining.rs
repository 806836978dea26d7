//! # Dining Philosophers
//!
//! N philosophers sit around a table with one fork between each pair of
//! neighbors. Philosopher `i` needs forks `i` and `(i + 1) % N` to eat.
//!
//! ## Acquisition order
//!
//! Every philosopher reaches for the **lower-numbered** of its two forks first, so
//! there is a global order on forks and no cycle of waiters can form. On top of
//! that, a philosopher never blocks while holding a fork:
//!
//! 1. wait for the lower fork (holding nothing);
//! 2. *try* the higher fork;
//! 3. if it is taken, put the lower fork back (`backed-off`), wait until the
//!    higher fork is free (still holding nothing) and start over.
//!
//! Each fork records its current holder. Picking up a fork that already has one
//! is an invariant violation.

use async_trait::async_trait;
use coordination_framework::sync::{Lock, LockGuard};
use coordination_framework::{
    Action, Actor, ActorEnv, ActorId, CoordinationError, Crew, ResourceState, Role, WorkRange,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::DiningConfig;

#[derive(Debug, Default)]
pub struct Fork {
    holder: Option<ActorId>,
    uses: usize,
}

/// The ring of forks.
#[derive(Debug)]
pub struct Table {
    forks: Vec<Lock<Fork>>,
}

impl Table {
    pub fn new(seats: usize) -> Result<Self, CoordinationError> {
        if seats < 2 {
            return Err(CoordinationError::InvalidConfig(format!(
                "a table needs at least 2 seats, got {seats}"
            )));
        }
        let forks = (0..seats)
            .map(|i| Lock::new(format!("fork-{i}"), Fork::default()))
            .collect();
        Ok(Self { forks })
    }

    pub fn seats(&self) -> usize {
        self.forks.len()
    }

    /// The two forks of `seat`, lower-numbered first.
    pub fn forks_of(&self, seat: usize) -> (usize, usize) {
        let left = seat % self.seats();
        let right = (seat + 1) % self.seats();
        (left.min(right), left.max(right))
    }

    /// How many times each fork has been picked up.
    pub async fn fork_uses(&self, observer: ActorId) -> Result<Vec<usize>, CoordinationError> {
        let mut uses = Vec::with_capacity(self.forks.len());
        for fork in &self.forks {
            uses.push(fork.acquire(observer).await?.uses);
        }
        Ok(uses)
    }

    fn pick_up(
        &self,
        fork: &mut LockGuard<'_, Fork>,
        number: usize,
        philosopher: ActorId,
        env: &ActorEnv,
    ) -> Result<(), CoordinationError> {
        if let Some(holder) = fork.holder {
            return Err(CoordinationError::invariant(format!(
                "{philosopher} picked up fork #{number} still held by {holder}"
            )));
        }
        fork.holder = Some(philosopher);
        fork.uses += 1;
        env.record(
            philosopher,
            Action::AcquiredFork(number),
            ResourceState::Fork {
                fork: number,
                holder: fork.holder,
            },
        );
        Ok(())
    }

    fn put_down(
        &self,
        mut fork: LockGuard<'_, Fork>,
        number: usize,
        philosopher: ActorId,
        action: Action,
        env: &ActorEnv,
    ) {
        fork.holder = None;
        env.record(
            philosopher,
            action,
            ResourceState::Fork {
                fork: number,
                holder: None,
            },
        );
    }

    /// Blocks until `philosopher` holds both forks of `seat` and has eaten once.
    pub async fn dine(
        &self,
        philosopher: ActorId,
        seat: usize,
        env: &ActorEnv,
        eat: WorkRange,
    ) -> Result<(), CoordinationError> {
        let (low, high) = self.forks_of(seat);
        loop {
            let mut first = self.forks[low].acquire(philosopher).await?;
            self.pick_up(&mut first, low, philosopher, env)?;

            let Some(mut second) = self.forks[high].try_acquire(philosopher)? else {
                self.put_down(first, low, philosopher, Action::BackedOff(high), env);
                // Wait for the contended fork while holding nothing.
                self.forks[high].acquire(philosopher).await?.release();
                continue;
            };
            self.pick_up(&mut second, high, philosopher, env)?;

            env.record(philosopher, Action::Eating, ResourceState::None);
            env.work(eat).await;

            self.put_down(second, high, philosopher, Action::ReleasedFork(high), env);
            self.put_down(first, low, philosopher, Action::ReleasedFork(low), env);
            return Ok(());
        }
    }
}

pub struct Philosopher {
    id: ActorId,
    meals: usize,
    work: WorkRange,
}

impl Philosopher {
    pub fn new(seat: usize, meals: usize, work: WorkRange) -> Self {
        Self {
            id: ActorId::new(Role::Philosopher, seat),
            meals,
            work,
        }
    }
}

#[async_trait]
impl Actor for Philosopher {
    type Context = Table;

    fn id(&self) -> ActorId {
        self.id
    }

    async fn run(self, table: Arc<Table>, env: ActorEnv) -> Result<(), CoordinationError> {
        let mut remaining = self.meals;
        while remaining > 0 {
            env.record(self.id, Action::Thinking, ResourceState::Meals { remaining });
            env.work(self.work).await;

            env.record(self.id, Action::Hungry, ResourceState::Meals { remaining });
            table.dine(self.id, self.id.index, &env, self.work).await?;

            remaining -= 1;
            env.record(
                self.id,
                Action::FinishedEating,
                ResourceState::Meals { remaining },
            );
        }
        env.record(self.id, Action::Finished, ResourceState::None);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiningReport {
    pub meals: usize,
    /// Meals eaten, indexed by seat.
    pub meals_per_philosopher: Vec<usize>,
    pub backoffs: usize,
    /// Times each fork was picked up, indexed by fork number.
    pub fork_uses: Vec<usize>,
}

pub async fn run(
    config: &DiningConfig,
    work: WorkRange,
    env: ActorEnv,
    deadline: Duration,
) -> Result<DiningReport, CoordinationError> {
    config.validate()?;
    let table = Arc::new(Table::new(config.philosophers)?);
    let mut crew = Crew::new("dining", env.clone())?;
    for seat in 0..config.philosophers {
        crew.spawn(Philosopher::new(seat, config.meals, work), table.clone());
    }
    crew.join(deadline).await?;

    let mut meals_per_philosopher = vec![0; config.philosophers];
    for event in env.events().snapshot() {
        if event.action == Action::FinishedEating {
            if let Some(count) = meals_per_philosopher.get_mut(event.actor.index) {
                *count += 1;
            }
        }
    }
    Ok(DiningReport {
        meals: meals_per_philosopher.iter().sum(),
        meals_per_philosopher,
        backoffs: env.events().count("backed-off"),
        fork_uses: table
            .fork_uses(ActorId::new(Role::Orchestrator, 0))
            .await?,
    })
}
