use coordination_framework::{Action, CoordinationError, ResourceState};
use coordination_protocols::config::{BarberConfig, BufferConfig, DiningConfig};
use coordination_protocols::{ProtocolKind, Simulation, SimulationConfig, Summary};
use std::collections::HashSet;

fn simulation(config: SimulationConfig) -> Simulation {
    Simulation::new(config)
        .expect("Failed to validate config")
        .without_delay()
}

/// Capacity 5, three producers and three consumers of five items each:
/// exactly 15 distinct items consumed, occupancy always within bounds.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bounded_buffer_scenario() {
    let run = simulation(SimulationConfig::default())
        .run(ProtocolKind::BoundedBuffer)
        .await
        .expect("Bounded buffer run failed");

    let consumed: Vec<&String> = run
        .events
        .iter()
        .filter_map(|e| match &e.action {
            Action::ConsumedItem(item) => Some(item),
            _ => None,
        })
        .collect();
    assert_eq!(consumed.len(), 15);
    assert_eq!(consumed.iter().collect::<HashSet<_>>().len(), 15);

    for event in &run.events {
        if let ResourceState::Buffer {
            occupancy,
            capacity,
        } = event.state
        {
            assert_eq!(capacity, 5);
            assert!(occupancy <= 5, "occupancy {occupancy} at {event}");
        }
    }
}

/// Five philosophers, three meals each: fifteen `finished-eating` events and no
/// deadline expiry.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dining_scenario() {
    let run = simulation(SimulationConfig::default())
        .run(ProtocolKind::Dining)
        .await
        .expect("Dining run failed");

    let meals = run
        .events
        .iter()
        .filter(|e| e.action == Action::FinishedEating)
        .count();
    assert_eq!(meals, 15);
    match run.summary {
        Summary::Dining(report) => assert_eq!(report.meals_per_philosopher, vec![3; 5]),
        other => panic!("unexpected summary: {other:?}"),
    }
}

/// Three chairs, ten clients: everyone is either served or turned away.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_barber_scenario() {
    let run = simulation(SimulationConfig::default())
        .run(ProtocolKind::Barber)
        .await
        .expect("Barber run failed");

    let Summary::Barber(report) = &run.summary else {
        panic!("unexpected summary: {:?}", run.summary);
    };
    assert!(report.served <= 10);
    assert_eq!(report.turned_away, 10 - report.served);
    assert_eq!(
        run.events
            .iter()
            .filter(|e| e.action == Action::TurnedAway)
            .count(),
        report.turned_away
    );
}

/// A full run executes every protocol in order, each with its own event log.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_all_protocols() {
    let runs = simulation(SimulationConfig::default())
        .run_all(&ProtocolKind::ALL)
        .await
        .expect("Full run failed");

    let kinds: Vec<ProtocolKind> = runs.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, ProtocolKind::ALL.to_vec());

    let alternation = &runs[4];
    let turns: Vec<usize> = alternation
        .events
        .iter()
        .filter(|e| matches!(e.action, Action::TookTurn(_)))
        .map(|e| e.actor.index)
        .collect();
    assert_eq!(turns, vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
}

/// Larger crowds under a seeded random delay still satisfy every audit.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_seeded_random_delays() {
    let config = SimulationConfig::from_toml(
        r#"
        seed = 11

        [work]
        min_ms = 0
        max_ms = 3

        [bounded_buffer]
        capacity = 2
        producers = 4
        items_per_producer = 6
        consumers = 6
        items_per_consumer = 4

        [dining]
        philosophers = 7
        meals = 4

        [readers_writers]
        readers = 8
        writers = 3
        reads_per_reader = 4
        writes_per_writer = 3

        [barber]
        chairs = 2
        clients = 12
        arrival = { min_ms = 0, max_ms = 2 }
        "#,
    )
    .expect("Failed to parse config");

    let runs = Simulation::new(config)
        .expect("Failed to validate config")
        .run_all(&ProtocolKind::ALL)
        .await
        .expect("Seeded run failed");
    assert_eq!(runs.len(), 5);
}

/// A deadline too short for the work is reported as a stall naming the protocol.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deadline_expiry_is_reported() {
    let config = SimulationConfig {
        deadline_ms: 20,
        dining: DiningConfig {
            philosophers: 3,
            meals: 100,
        },
        ..SimulationConfig::default()
    };
    let err = Simulation::new(config)
        .expect("Failed to validate config")
        .with_delay(std::sync::Arc::new(coordination_framework::FixedDelay(
            std::time::Duration::from_millis(5),
        )))
        .run(ProtocolKind::Dining)
        .await
        .expect_err("Run should have missed its deadline");

    match err {
        CoordinationError::Stalled { protocol, pending } => {
            assert_eq!(protocol, "dining");
            assert!(!pending.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Invalid shapes never reach the launcher.
#[test]
fn test_invalid_configs_are_rejected_up_front() {
    let unbalanced = SimulationConfig {
        bounded_buffer: BufferConfig {
            consumers: 2,
            ..BufferConfig::default()
        },
        ..SimulationConfig::default()
    };
    assert!(Simulation::new(unbalanced).is_err());

    let chairless = SimulationConfig {
        barber: BarberConfig {
            chairs: 0,
            ..BarberConfig::default()
        },
        ..SimulationConfig::default()
    };
    assert!(Simulation::new(chairless).is_err());
}
