//! # Sleeping Barber
//!
//! One barber, a waiting room with a fixed number of chairs, and a stream of
//! clients.
//!
//! - A client takes a free chair if there is one, wakes the barber and waits
//!   until its own haircut is finished. If every chair is taken it leaves
//!   (`turned-away`). Being turned away is an expected outcome, not an error.
//! - The barber sleeps until a client is waiting, takes the longest-waiting
//!   client, cuts, and signals that client.
//! - Once every client is gone the shop is closed, which wakes the barber one
//!   last time so it can leave.
//!
//! Every seated client carries a [`Ticket`] with a private "cut finished"
//! semaphore, so the barber always signals the client it actually served.
//!
//! Seating, turning away and picking the next client are all recorded while the
//! waiting-room lock is held, so the event log shows them in the order they
//! happened. Closing the shop closes the waiting room under that same lock: a
//! client is either seated before the close (and served) or turned away.

use async_trait::async_trait;
use coordination_framework::sync::{BoundedQueue, Lock, PutOutcome, QueueSignal, Semaphore};
use coordination_framework::{
    Action, Actor, ActorEnv, ActorId, CoordinationError, Crew, ResourceState, Role, WorkRange,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::BarberConfig;

/// A seated client waiting for the barber.
pub struct Ticket {
    client: ActorId,
    cut_finished: Arc<Semaphore>,
}

#[derive(Debug, Default)]
struct Ledger {
    served: usize,
    turned_away: usize,
}

pub struct Shop {
    chairs: usize,
    waiting_room: BoundedQueue<Ticket>,
    client_waiting: Semaphore,
    ledger: Lock<Ledger>,
}

impl Shop {
    pub fn new(chairs: usize) -> Result<Self, CoordinationError> {
        Ok(Self {
            chairs,
            waiting_room: BoundedQueue::new("waiting_room", chairs)?,
            client_waiting: Semaphore::new("shop.client_waiting", 0),
            ledger: Lock::new("shop.ledger", Ledger::default()),
        })
    }

    fn room(&self, occupied: usize) -> ResourceState {
        ResourceState::WaitingRoom {
            occupied,
            chairs: self.chairs,
        }
    }

    /// A client arrives. Returns `true` once it has had its haircut, `false` if it
    /// was turned away because every chair was taken or the shop had closed.
    pub async fn visit(&self, client: ActorId, env: &ActorEnv) -> Result<bool, CoordinationError> {
        env.record(client, Action::Arrived, ResourceState::None);

        let cut_finished = Arc::new(Semaphore::new(format!("{client}.cut_finished"), 0));
        let ticket = Ticket {
            client,
            cut_finished: cut_finished.clone(),
        };
        let outcome = self
            .waiting_room
            .try_put_observed(client, ticket, |signal| match signal {
                QueueSignal::Put { occupancy, .. } => {
                    env.record(client, Action::TookSeat, self.room(occupancy));
                }
                QueueSignal::Full { occupancy } | QueueSignal::Closed { occupancy } => {
                    env.record(client, Action::TurnedAway, self.room(occupancy));
                }
                QueueSignal::Got { .. } | QueueSignal::Empty => {}
            })
            .await?;

        match outcome {
            PutOutcome::Full(_) | PutOutcome::Closed(_) => {
                self.ledger.acquire(client).await?.turned_away += 1;
                Ok(false)
            }
            PutOutcome::Accepted { .. } => {
                self.client_waiting.release();
                cut_finished.acquire().await?;
                env.record(client, Action::GotHaircut, ResourceState::None);
                Ok(true)
            }
        }
    }

    /// Serves clients until the shop is closed and the waiting room is empty.
    pub async fn work_shift(
        &self,
        barber: ActorId,
        env: &ActorEnv,
        cut: WorkRange,
    ) -> Result<usize, CoordinationError> {
        env.record(barber, Action::OpenedShop, self.room(0));
        let mut served = 0;
        loop {
            env.record(barber, Action::Sleeping, ResourceState::None);
            self.client_waiting.acquire().await?;
            env.record(barber, Action::WokeUp, ResourceState::None);

            let next = self
                .waiting_room
                .try_get_observed(barber, |signal| {
                    if let QueueSignal::Got { item, occupancy } = signal {
                        env.record(barber, Action::CuttingHair(item.client), self.room(occupancy));
                    }
                })
                .await?;
            let Some((ticket, _)) = next else {
                if self.waiting_room.is_closed(barber).await? {
                    break;
                }
                return Err(CoordinationError::invariant(format!(
                    "{barber} woke up to an empty waiting room in an open shop"
                )));
            };

            env.work(cut).await;
            self.ledger.acquire(barber).await?.served += 1;
            env.record(barber, Action::ServedClient(ticket.client), ResourceState::None);
            ticket.cut_finished.release();
            served += 1;
        }
        env.record(barber, Action::ClosedShop, self.room(0));
        Ok(served)
    }

    /// Closes the shop and wakes the barber so it can leave once the room is empty.
    pub async fn close(&self, by: ActorId) -> Result<(), CoordinationError> {
        if self.waiting_room.close(by).await? {
            self.client_waiting.release();
            let ledger = self.ledger.acquire(by).await?;
            info!(served = ledger.served, turned_away = ledger.turned_away, "Shop closing");
        }
        Ok(())
    }

    /// `(served, turned_away)` so far.
    pub async fn tally(&self, observer: ActorId) -> Result<(usize, usize), CoordinationError> {
        let ledger = self.ledger.acquire(observer).await?;
        Ok((ledger.served, ledger.turned_away))
    }
}

pub struct Barber {
    id: ActorId,
    work: WorkRange,
}

impl Barber {
    pub fn new(work: WorkRange) -> Self {
        Self {
            id: ActorId::new(Role::Barber, 0),
            work,
        }
    }
}

#[async_trait]
impl Actor for Barber {
    type Context = Shop;

    fn id(&self) -> ActorId {
        self.id
    }

    async fn run(self, shop: Arc<Shop>, env: ActorEnv) -> Result<(), CoordinationError> {
        shop.work_shift(self.id, &env, self.work).await?;
        env.record(self.id, Action::Finished, ResourceState::None);
        Ok(())
    }
}

pub struct Client {
    id: ActorId,
}

impl Client {
    pub fn new(index: usize) -> Self {
        Self {
            id: ActorId::new(Role::Client, index),
        }
    }
}

#[async_trait]
impl Actor for Client {
    type Context = Shop;

    fn id(&self) -> ActorId {
        self.id
    }

    async fn run(self, shop: Arc<Shop>, env: ActorEnv) -> Result<(), CoordinationError> {
        shop.visit(self.id, &env).await?;
        env.record(self.id, Action::Finished, ResourceState::None);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarberReport {
    pub clients: usize,
    pub served: usize,
    pub turned_away: usize,
}

/// Runs one barber against `config.clients` arrivals. The arrival schedule and
/// both crews share one deadline measured from the start of the run.
pub async fn run(
    config: &BarberConfig,
    work: WorkRange,
    env: ActorEnv,
    deadline: Duration,
) -> Result<BarberReport, CoordinationError> {
    config.validate()?;
    let until = Instant::now() + deadline;
    let shop = Arc::new(Shop::new(config.chairs)?);
    let orchestrator = ActorId::new(Role::Orchestrator, 0);
    let barber_id = ActorId::new(Role::Barber, 0);

    let mut barber = Crew::new("barber", env.clone())?;
    barber.spawn(Barber::new(work), shop.clone());

    let mut clients = Crew::new("barber", env.clone())?;
    let mut never_arrived = Vec::new();
    for index in 0..config.clients {
        if index > 0 {
            let arrival = env.work(config.arrival.range());
            if tokio::time::timeout_at(until, arrival).await.is_err() {
                never_arrived.extend((index..config.clients).map(Client::new).map(|c| c.id));
                break;
            }
        }
        clients.spawn(Client::new(index), shop.clone());
    }

    // Close only once every client has left so none can arrive to a closed shop.
    let outcome = match clients.join_until(until).await {
        Err(CoordinationError::Stalled { protocol, mut pending }) => {
            pending.extend(never_arrived);
            pending.push(barber_id);
            pending.sort();
            Err(CoordinationError::Stalled { protocol, pending })
        }
        Ok(_) if !never_arrived.is_empty() => {
            never_arrived.push(barber_id);
            never_arrived.sort();
            Err(CoordinationError::Stalled {
                protocol: "barber".to_string(),
                pending: never_arrived,
            })
        }
        other => other.map(drop),
    };
    if let Err(e) = outcome {
        warn!(error = %e, "Barber run ended early");
        return Err(e);
    }
    shop.close(orchestrator).await?;
    barber.join_until(until).await?;

    let (served, turned_away) = shop.tally(orchestrator).await?;
    Ok(BarberReport {
        clients: config.clients,
        served,
        turned_away,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkSpec;
    use coordination_framework::{EventLog, FixedDelay, NoDelay, RandomDelay};

    fn env() -> ActorEnv {
        ActorEnv::new(EventLog::new(), Arc::new(NoDelay))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_client_is_served_or_turned_away() {
        let config = BarberConfig {
            chairs: 3,
            clients: 10,
            ..BarberConfig::default()
        };
        let report = run(&config, WorkRange::zero(), env(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(report.served + report.turned_away, 10);
        assert!(report.served >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_waiting_room_turns_clients_away() {
        let env = env();
        let shop = Shop::new(1).unwrap();
        let first = ActorId::new(Role::Client, 0);
        let second = ActorId::new(Role::Client, 1);

        // No barber: the first client sits and waits forever.
        let seated =
            tokio::time::timeout(Duration::from_millis(20), shop.visit(first, &env)).await;
        assert!(seated.is_err());
        assert!(!shop.visit(second, &env).await.unwrap());

        let turned: Vec<_> = env
            .events()
            .snapshot()
            .into_iter()
            .filter(|e| e.action == Action::TurnedAway)
            .collect();
        assert_eq!(turned.len(), 1);
        assert_eq!(turned[0].actor, second);
        assert_eq!(
            turned[0].state,
            ResourceState::WaitingRoom {
                occupied: 1,
                chairs: 1
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn closed_shop_turns_clients_away() {
        let env = env();
        let shop = Shop::new(2).unwrap();
        let orchestrator = ActorId::new(Role::Orchestrator, 0);
        shop.close(orchestrator).await.unwrap();
        assert!(!shop.visit(ActorId::new(Role::Client, 0), &env).await.unwrap());
        assert_eq!(shop.tally(orchestrator).await.unwrap(), (0, 1));

        let turned = env.events().snapshot();
        assert_eq!(turned.last().map(|e| e.action.clone()), Some(Action::TurnedAway));
        assert_eq!(turned.last().map(|e| e.state.clone()), Some(shop.room(0)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn closing_never_strands_a_seated_client() {
        let env = env();
        let shop = Arc::new(Shop::new(4).unwrap());
        let barber = {
            let (shop, env) = (shop.clone(), env.clone());
            tokio::spawn(async move {
                shop.work_shift(ActorId::new(Role::Barber, 0), &env, WorkRange::zero())
                    .await
            })
        };

        let mut visits = Vec::new();
        for i in 0..16 {
            let (shop, env) = (shop.clone(), env.clone());
            visits.push(tokio::spawn(async move {
                shop.visit(ActorId::new(Role::Client, i), &env).await
            }));
        }
        tokio::task::yield_now().await;
        shop.close(ActorId::new(Role::Orchestrator, 0)).await.unwrap();

        // Every seated client must get its haircut even though the shop closed
        // while others were still arriving.
        let mut haircuts = 0;
        for visit in visits {
            let had_haircut = tokio::time::timeout(Duration::from_secs(5), visit)
                .await
                .expect("a seated client was stranded")
                .unwrap()
                .unwrap();
            haircuts += usize::from(had_haircut);
        }
        let served = tokio::time::timeout(Duration::from_secs(5), barber)
            .await
            .expect("barber never left")
            .unwrap()
            .unwrap();

        assert_eq!(served, haircuts);
        assert_eq!(env.events().count("took-seat"), served);
        assert_eq!(env.events().count("turned-away"), 16 - served);
        assert_eq!(
            shop.tally(ActorId::new(Role::Orchestrator, 0)).await.unwrap(),
            (served, 16 - served)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn deadline_covers_arrivals_and_both_crews() {
        // Seeded delays with min == max sleep for exactly that long.
        let env = ActorEnv::new(EventLog::new(), Arc::new(RandomDelay::new(Some(0))));
        let config = BarberConfig {
            chairs: 1,
            clients: 3,
            arrival: WorkSpec::new(200, 200),
        };
        let started = Instant::now();
        let err = run(
            &config,
            WorkRange::millis(300, 300),
            env,
            Duration::from_millis(350),
        )
        .await
        .unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(600));
        match err {
            CoordinationError::Stalled { protocol, pending } => {
                assert_eq!(protocol, "barber");
                assert!(pending.contains(&ActorId::new(Role::Client, 1)));
                assert!(pending.contains(&ActorId::new(Role::Client, 2)));
                assert!(pending.contains(&ActorId::new(Role::Barber, 0)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn barber_drains_the_room_before_leaving() {
        let env = ActorEnv::new(EventLog::new(), Arc::new(FixedDelay(Duration::from_millis(5))));
        let config = BarberConfig {
            chairs: 5,
            clients: 4,
            ..BarberConfig::default()
        };
        let report = run(&config, WorkRange::zero(), env.clone(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(report.served, 4);
        assert_eq!(report.turned_away, 0);

        let tags: Vec<&str> = env
            .events()
            .snapshot()
            .iter()
            .map(|e| e.action.tag())
            .collect();
        assert_eq!(tags.iter().filter(|t| **t == "served-client").count(), 4);
        assert_eq!(
            tags.iter().rposition(|t| *t == "closed-shop"),
            tags.iter().rposition(|t| *t == "finished").map(|i| i - 1)
        );
    }
}
