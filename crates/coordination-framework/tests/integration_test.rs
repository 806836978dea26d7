use async_trait::async_trait;
use coordination_framework::sync::{Condition, Lock, Semaphore};
use coordination_framework::{
    Action, Actor, ActorEnv, ActorId, CoordinationError, Crew, EventLog, NoDelay, ResourceState,
    Role, UsageError,
};
use std::sync::Arc;
use std::time::Duration;

/// A counter monitor: workers take turns incrementing under one lock, and a
/// condition tells the last worker when everyone else is done.
struct Tally {
    count: Lock<usize>,
    reached: Condition,
}

impl Tally {
    fn new() -> Self {
        let count = Lock::new("tally", 0);
        let reached = Condition::new("tally.reached", &count);
        Self { count, reached }
    }
}

struct Counter {
    id: ActorId,
    increments: usize,
    target: usize,
}

#[async_trait]
impl Actor for Counter {
    type Context = Tally;

    fn id(&self) -> ActorId {
        self.id
    }

    async fn run(self, tally: Arc<Tally>, env: ActorEnv) -> Result<(), CoordinationError> {
        for _ in 0..self.increments {
            let mut count = tally.count.acquire(self.id).await?;
            *count += 1;
            tally.reached.notify_all(&count)?;
        }
        let count = tally.count.acquire(self.id).await?;
        let count = tally.reached.wait_while(count, |c| *c < self.target).await?;
        env.record(
            self.id,
            Action::Finished,
            ResourceState::Buffer {
                occupancy: *count,
                capacity: self.target,
            },
        );
        Ok(())
    }
}

fn env() -> ActorEnv {
    ActorEnv::new(EventLog::new(), Arc::new(NoDelay))
}

/// Full end-to-end test of lock, condition and launcher working together.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_monitor_under_the_launcher() {
    let env = env();
    let tally = Arc::new(Tally::new());
    let mut crew = Crew::new("tally", env.clone()).expect("Failed to create crew");
    for index in 0..8 {
        crew.spawn(
            Counter {
                id: ActorId::new(Role::Process, index),
                increments: 25,
                target: 200,
            },
            tally.clone(),
        );
    }
    let finished = crew
        .join(Duration::from_secs(10))
        .await
        .expect("Crew failed");
    assert_eq!(finished.len(), 8);

    for event in env.events().snapshot() {
        assert_eq!(
            event.state,
            ResourceState::Buffer {
                occupancy: 200,
                capacity: 200
            }
        );
    }
}

/// Misusing a primitive inside an actor aborts the whole run with the usage error.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_usage_error_aborts_the_run() {
    struct Careless {
        id: ActorId,
    }

    #[async_trait]
    impl Actor for Careless {
        type Context = Lock<()>;

        fn id(&self) -> ActorId {
            self.id
        }

        async fn run(self, lock: Arc<Lock<()>>, _env: ActorEnv) -> Result<(), CoordinationError> {
            let _held = lock.acquire(self.id).await?;
            let _again = lock.acquire(self.id).await?;
            Ok(())
        }
    }

    let mut crew = Crew::new("careless", env()).expect("Failed to create crew");
    crew.spawn(
        Careless {
            id: ActorId::new(Role::Process, 0),
        },
        Arc::new(Lock::new("door", ())),
    );
    match crew.join(Duration::from_secs(5)).await {
        Err(CoordinationError::Usage(UsageError::DoubleAcquire { lock, actor })) => {
            assert_eq!(lock, "door");
            assert_eq!(actor, ActorId::new(Role::Process, 0));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

/// A condition refuses the guard of a lock it is not bound to.
#[tokio::test]
async fn test_condition_with_foreign_lock() {
    let me = ActorId::new(Role::Process, 0);
    let bound = Lock::new("bound", ());
    let other = Lock::new("other", ());
    let condition = Condition::new("bound.changed", &bound);

    let guard = other.acquire(me).await.expect("Failed to acquire");
    assert!(matches!(
        condition.notify(&guard),
        Err(UsageError::ForeignLock { .. })
    ));
    assert!(matches!(
        condition.wait(guard).await,
        Err(UsageError::ForeignLock { .. })
    ));
}

/// Semaphore permits released by one task are taken by another, in FIFO order.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_semaphore_hand_over() {
    let sem = Arc::new(Semaphore::new("baton", 0));
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut waiters = Vec::new();
    for i in 0..3 {
        let (sem, order) = (sem.clone(), order.clone());
        waiters.push(tokio::spawn(async move {
            sem.acquire().await.expect("Semaphore closed");
            order.lock().expect("poisoned").push(i);
        }));
        // Let each waiter queue up before the next one.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    for _ in 0..3 {
        sem.release();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    for w in waiters {
        w.await.expect("Waiter panicked");
    }
    assert_eq!(*order.lock().expect("poisoned"), vec![0, 1, 2]);
}
