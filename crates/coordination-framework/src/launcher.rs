//! # Crew Launcher
//!
//! A [`Crew`] is the generic worker launcher: it runs any number of [`Actor`]s,
//! each on its own tokio task, and waits for all of them.
//!
//! ## Lifecycle
//!
//! 1. **Create**: `Crew::new(protocol, env)` checks that the current runtime is
//!    multi-threaded. Actors must preempt each other for real, so a
//!    current-thread runtime is rejected.
//! 2. **Spawn**: `crew.spawn(actor, shared)` hands the actor its shared resource
//!    and the run's [`ActorEnv`], inside a tracing span named after the actor.
//! 3. **Join**: `crew.join(deadline)` waits for every actor. The first actor
//!    error aborts the rest and is returned. An actor panic becomes
//!    [`CoordinationError::ActorPanicked`]. Missing the deadline aborts everyone
//!    and reports the actors still live as [`CoordinationError::Stalled`]; for a
//!    protocol that cannot deadlock that means a bug.
//!
//! ```rust,ignore
//! let mut crew = Crew::new("alternation", env)?;
//! let turnstile = Arc::new(Turnstile::new());
//! crew.spawn(Process::new(0, rounds), turnstile.clone());
//! crew.spawn(Process::new(1, rounds), turnstile.clone());
//! let finished = crew.join(Duration::from_secs(10)).await?;
//! ```

use crate::actor::{Actor, ActorEnv, ActorId};
use crate::error::CoordinationError;
use std::any::Any;
use std::collections::BTreeSet;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

type Outcome = (ActorId, Result<(), CoordinationError>);
type Roster = Arc<Mutex<BTreeSet<ActorId>>>;

/// Removes its actor from the roster when the actor's task ends, however it ends.
struct Departure {
    id: ActorId,
    roster: Roster,
}

impl Drop for Departure {
    fn drop(&mut self) {
        self.roster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Turns a panic raised while polling an actor into a value, so the launcher
/// knows which actor it came from.
struct CatchPanic<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for CatchPanic<F> {
    type Output = Result<F::Output, Box<dyn Any + Send>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.inner.as_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Runs a group of actors to completion.
pub struct Crew {
    protocol: String,
    env: ActorEnv,
    tasks: JoinSet<Outcome>,
    roster: Roster,
    spawned: usize,
}

impl Crew {
    pub fn new(protocol: impl Into<String>, env: ActorEnv) -> Result<Self, CoordinationError> {
        let protocol = protocol.into();
        let handle = Handle::try_current().map_err(|_| {
            CoordinationError::InvalidConfig(format!("{protocol}: no tokio runtime running"))
        })?;
        if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(CoordinationError::InvalidConfig(format!(
                "{protocol}: actors need a multi-threaded runtime"
            )));
        }
        Ok(Self {
            protocol,
            env,
            tasks: JoinSet::new(),
            roster: Arc::new(Mutex::new(BTreeSet::new())),
            spawned: 0,
        })
    }

    /// Starts `actor` on its own task with `shared` as its context.
    pub fn spawn<A: Actor>(&mut self, actor: A, shared: Arc<A::Context>) {
        let id = actor.id();
        let env = self.env.clone();
        self.lock_roster().insert(id);
        let departure = Departure {
            id,
            roster: self.roster.clone(),
        };
        let span = info_span!("actor", id = %id);

        self.tasks.spawn(
            async move {
                let _departure = departure;
                debug!("Actor started");
                let result = match (CatchPanic {
                    inner: Box::pin(actor.run(shared, env)),
                })
                .await
                {
                    Ok(result) => result,
                    Err(payload) => Err(CoordinationError::ActorPanicked {
                        actor: id.to_string(),
                        message: panic_message(payload.as_ref()),
                    }),
                };
                match &result {
                    Ok(()) => debug!("Actor finished"),
                    Err(e) => warn!(error = %e, "Actor failed"),
                }
                (id, result)
            }
            .instrument(span),
        );
        self.spawned += 1;
    }

    /// Waits for every spawned actor, returning their ids in completion order.
    pub async fn join(self, deadline: Duration) -> Result<Vec<ActorId>, CoordinationError> {
        self.join_until(Instant::now() + deadline).await
    }

    /// Like [`join`](Self::join), against an absolute deadline shared with other
    /// crews of the same run.
    pub async fn join_until(mut self, until: Instant) -> Result<Vec<ActorId>, CoordinationError> {
        let mut finished = Vec::with_capacity(self.spawned);

        loop {
            let next = match tokio::time::timeout_at(until, self.tasks.join_next()).await {
                Ok(next) => next,
                Err(_) => {
                    let pending: Vec<ActorId> = self.lock_roster().iter().copied().collect();
                    error!(
                        protocol = %self.protocol,
                        pending = pending.len(),
                        "Deadline passed, aborting actors"
                    );
                    self.tasks.abort_all();
                    return Err(CoordinationError::Stalled {
                        protocol: self.protocol.clone(),
                        pending,
                    });
                }
            };

            match next {
                None => break,
                Some(Ok((id, Ok(())))) => finished.push(id),
                Some(Ok((id, Err(e)))) => {
                    error!(protocol = %self.protocol, actor = %id, error = %e, "Aborting run");
                    self.tasks.abort_all();
                    return Err(e);
                }
                Some(Err(join_error)) => {
                    if join_error.is_cancelled() {
                        continue;
                    }
                    error!(protocol = %self.protocol, error = %join_error, "Aborting run");
                    self.tasks.abort_all();
                    return Err(CoordinationError::ActorPanicked {
                        actor: "unknown actor".to_string(),
                        message: join_error.to_string(),
                    });
                }
            }
        }

        info!(protocol = %self.protocol, actors = finished.len(), "All actors finished");
        Ok(finished)
    }

    fn lock_roster(&self) -> std::sync::MutexGuard<'_, BTreeSet<ActorId>> {
        self.roster.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
