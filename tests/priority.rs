use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, timeout};
use tokio_actor_dispatch::{
    actor::{Actor, ActorExt},
    dispatch::DispatchTableBuilder,
    ActorConfig, ActorSystem, FairnessPolicy, Priority, Reply,
};

type Journal = Arc<Mutex<Vec<String>>>;

struct Record;

struct Probe {
    label: String,
    journal: Journal,
}

impl Actor for Probe {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table.act::<Record>("record").handle(|probe, _, _| {
            probe.journal.lock().push(probe.label.clone());
            Ok(Reply::none())
        });
    }
}

async fn wait_for_entries(journal: &Journal, expected: usize) -> Vec<String> {
    timeout(Duration::from_secs(5), async {
        loop {
            if journal.lock().len() >= expected {
                return journal.lock().clone();
            }
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("journal never filled")
}

fn spawn_probe(system: &ActorSystem, label: String, priority: Priority, journal: &Journal) {
    let handle = Probe {
        label: label.clone(),
        journal: journal.clone(),
    }
    .spawn_on(
        system,
        label,
        ActorConfig::default().with_priority(priority),
    )
    .unwrap();
    handle.send(Record).unwrap();
}

// Single-threaded runtime: every lane is filled before the first turn runs.
#[tokio::test(flavor = "current_thread")]
async fn high_priority_is_served_first() {
    let system = ActorSystem::builder().workers(1).start().unwrap();
    let journal = Journal::default();

    for index in 0..3 {
        spawn_probe(&system, format!("normal-{index}"), Priority::Normal, &journal);
    }
    for index in 0..3 {
        spawn_probe(&system, format!("high-{index}"), Priority::High, &journal);
    }
    assert_eq!(system.environment(Priority::High).pending(), 3);
    assert_eq!(system.environment(Priority::Normal).pending(), 3);

    let order = wait_for_entries(&journal, 6).await;
    assert_eq!(
        order,
        vec!["high-0", "high-1", "high-2", "normal-0", "normal-1", "normal-2"]
    );
    assert_eq!(system.environment(Priority::High).turns(), 3);
    assert_eq!(system.environment(Priority::Normal).turns(), 3);
    system.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn normal_priority_progresses_under_high_load() {
    let system = ActorSystem::builder()
        .workers(1)
        .fairness(FairnessPolicy::new(2))
        .start()
        .unwrap();
    let journal = Journal::default();

    for index in 0..2 {
        spawn_probe(&system, format!("normal-{index}"), Priority::Normal, &journal);
    }
    for index in 0..6 {
        spawn_probe(&system, format!("high-{index}"), Priority::High, &journal);
    }

    let order = wait_for_entries(&journal, 8).await;
    assert_eq!(
        order,
        vec![
            "high-0", "high-1", "normal-0", "high-2", "high-3", "normal-1", "high-4", "high-5"
        ]
    );
    system.shutdown().await;
}

struct Spin;

struct Busy {
    remaining: usize,
    journal: Journal,
}

impl Actor for Busy {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table.act::<Spin>("spin").handle(|busy, _, ctx| {
            busy.remaining = busy.remaining.saturating_sub(1);
            if busy.remaining == 0 {
                busy.journal.lock().push(ctx.actor_id().to_string());
            }
            Ok(Reply::none())
        });
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn normal_actor_finishes_while_high_tier_is_saturated() {
    let system = ActorSystem::builder()
        .workers(2)
        .fairness(FairnessPolicy::new(4))
        .start()
        .unwrap();
    let journal = Journal::default();

    let hot: Vec<_> = (0..4)
        .map(|index| {
            Busy {
                remaining: 5_000,
                journal: journal.clone(),
            }
            .spawn_on(
                &system,
                format!("hot-{index}"),
                ActorConfig::default().with_priority(Priority::High),
            )
            .unwrap()
        })
        .collect();
    let cold = Busy {
        remaining: 50,
        journal: journal.clone(),
    }
    .spawn_on(&system, "cold", ())
    .unwrap();

    for _ in 0..5_000 {
        for actor in &hot {
            actor.send(Spin).unwrap();
        }
    }
    for _ in 0..50 {
        cold.send(Spin).unwrap();
    }

    let finished = wait_for_entries(&journal, 5).await;
    let cold_position = finished.iter().position(|id| id == "cold").unwrap();
    assert!(cold_position < 4, "cold finished last: {finished:?}");
    system.shutdown().await;
}
