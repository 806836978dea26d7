//! # Readers-Writers
//!
//! Readers may share the [`Library`]; a writer needs it alone. The policy keeps
//! writers from starving:
//!
//! - A writer **announces** itself (`writers_waiting += 1`) before it queues for
//!   the write-exclusion. From that moment no new reader may enter; readers
//!   already inside finish normally.
//! - Writers queue FIFO on the write-exclusion, so an announced writer is
//!   eventually admitted.
//! - When a writer leaves and no other writer is waiting, every blocked reader is
//!   woken.
//!
//! The write-exclusion is a binary [`Semaphore`] rather than a [`Lock`] because
//! readers hold it as a group: the first reader in takes it and the last reader
//! out gives it back.
//!
//! A continuous stream of writers can starve readers. That is the accepted cost of
//! the policy.

use async_trait::async_trait;
use coordination_framework::sync::{Condition, Lock, LockGuard, Semaphore};
use coordination_framework::{
    Action, Actor, ActorEnv, ActorId, CoordinationError, Crew, ResourceState, Role, WorkRange,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReadersWritersConfig;

#[derive(Debug, Default)]
struct RoomState {
    readers: usize,
    writer_active: bool,
    writers_waiting: usize,
}

impl RoomState {
    fn snapshot(&self) -> ResourceState {
        ResourceState::Room {
            readers: self.readers,
            writer_active: self.writer_active,
            writers_waiting: self.writers_waiting,
        }
    }

    fn check(&self) -> Result<(), CoordinationError> {
        if self.writer_active && self.readers > 0 {
            return Err(CoordinationError::invariant(format!(
                "writer active alongside {} reader(s)",
                self.readers
            )));
        }
        Ok(())
    }
}

/// The shared resource readers and writers contend for.
#[derive(Debug)]
pub struct Library {
    state: Lock<RoomState>,
    readers_admitted: Condition,
    write_exclusion: Semaphore,
}

impl Library {
    pub fn new() -> Self {
        let state = Lock::new("library", RoomState::default());
        let readers_admitted = Condition::new("library.readers_admitted", &state);
        Self {
            state,
            readers_admitted,
            write_exclusion: Semaphore::new("library.write_exclusion", 1),
        }
    }

    pub async fn begin_read(
        &self,
        reader: ActorId,
        env: &ActorEnv,
    ) -> Result<(), CoordinationError> {
        let state = self.state.acquire(reader).await?;
        let mut state = self
            .readers_admitted
            .wait_while(state, |s| s.writer_active || s.writers_waiting > 0)
            .await?;

        if state.readers == 0 && !self.write_exclusion.try_acquire() {
            return Err(CoordinationError::invariant(format!(
                "{reader} found the write-exclusion taken with no writer active or waiting"
            )));
        }
        state.readers += 1;
        state.check()?;
        env.record(reader, Action::StartedReading, state.snapshot());
        Ok(())
    }

    pub async fn end_read(&self, reader: ActorId, env: &ActorEnv) -> Result<(), CoordinationError> {
        let mut state = self.state.acquire(reader).await?;
        state.readers = state.readers.checked_sub(1).ok_or_else(|| {
            CoordinationError::invariant(format!("{reader} left without having entered"))
        })?;
        env.record(reader, Action::FinishedReading, state.snapshot());
        if state.readers == 0 {
            self.write_exclusion.release();
        }
        Ok(())
    }

    pub async fn begin_write(
        &self,
        writer: ActorId,
        env: &ActorEnv,
    ) -> Result<(), CoordinationError> {
        {
            let mut state = self.state.acquire(writer).await?;
            state.writers_waiting += 1;
            env.record(writer, Action::AnnouncedWrite, state.snapshot());
        }

        self.write_exclusion.acquire().await?;

        let mut state = self.state.acquire(writer).await?;
        state.writers_waiting = state.writers_waiting.checked_sub(1).ok_or_else(|| {
            CoordinationError::invariant(format!("{writer} admitted without announcing"))
        })?;
        if state.writer_active {
            return Err(CoordinationError::invariant(format!(
                "{writer} admitted while another writer is active"
            )));
        }
        state.writer_active = true;
        state.check()?;
        env.record(writer, Action::StartedWriting, state.snapshot());
        Ok(())
    }

    pub async fn end_write(
        &self,
        writer: ActorId,
        env: &ActorEnv,
    ) -> Result<(), CoordinationError> {
        let mut state = self.state.acquire(writer).await?;
        if !state.writer_active {
            return Err(CoordinationError::invariant(format!(
                "{writer} finished writing without having started"
            )));
        }
        state.writer_active = false;
        env.record(writer, Action::FinishedWriting, state.snapshot());
        self.write_exclusion.release();
        self.admit_readers_if_clear(&state)?;
        Ok(())
    }

    fn admit_readers_if_clear(
        &self,
        state: &LockGuard<'_, RoomState>,
    ) -> Result<(), CoordinationError> {
        if state.writers_waiting == 0 {
            self.readers_admitted.notify_all(state)?;
        }
        Ok(())
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Reader {
    id: ActorId,
    reads: usize,
    work: WorkRange,
}

impl Reader {
    pub fn new(index: usize, reads: usize, work: WorkRange) -> Self {
        Self {
            id: ActorId::new(Role::Reader, index),
            reads,
            work,
        }
    }
}

#[async_trait]
impl Actor for Reader {
    type Context = Library;

    fn id(&self) -> ActorId {
        self.id
    }

    async fn run(self, library: Arc<Library>, env: ActorEnv) -> Result<(), CoordinationError> {
        for _ in 0..self.reads {
            env.work(self.work).await;
            library.begin_read(self.id, &env).await?;
            env.work(self.work).await;
            library.end_read(self.id, &env).await?;
        }
        env.record(self.id, Action::Finished, ResourceState::None);
        Ok(())
    }
}

pub struct Writer {
    id: ActorId,
    writes: usize,
    work: WorkRange,
}

impl Writer {
    pub fn new(index: usize, writes: usize, work: WorkRange) -> Self {
        Self {
            id: ActorId::new(Role::Writer, index),
            writes,
            work,
        }
    }
}

#[async_trait]
impl Actor for Writer {
    type Context = Library;

    fn id(&self) -> ActorId {
        self.id
    }

    async fn run(self, library: Arc<Library>, env: ActorEnv) -> Result<(), CoordinationError> {
        for _ in 0..self.writes {
            env.work(self.work).await;
            library.begin_write(self.id, &env).await?;
            env.work(self.work).await;
            library.end_write(self.id, &env).await?;
        }
        env.record(self.id, Action::Finished, ResourceState::None);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadersWritersReport {
    pub reads: usize,
    pub writes: usize,
    /// Most readers observed inside at once.
    pub peak_readers: usize,
}

pub async fn run(
    config: &ReadersWritersConfig,
    work: WorkRange,
    env: ActorEnv,
    deadline: Duration,
) -> Result<ReadersWritersReport, CoordinationError> {
    config.validate()?;
    let library = Arc::new(Library::new());
    let mut crew = Crew::new("readers-writers", env.clone())?;
    for index in 0..config.writers {
        crew.spawn(
            Writer::new(index, config.writes_per_writer, work),
            library.clone(),
        );
    }
    for index in 0..config.readers {
        crew.spawn(
            Reader::new(index, config.reads_per_reader, work),
            library.clone(),
        );
    }
    crew.join(deadline).await?;

    let events = env.events();
    let peak_readers = events
        .snapshot()
        .iter()
        .filter_map(|e| match e.state {
            ResourceState::Room { readers, .. } => Some(readers),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    Ok(ReadersWritersReport {
        reads: events.count("finished-reading"),
        writes: events.count("finished-writing"),
        peak_readers,
    })
}
