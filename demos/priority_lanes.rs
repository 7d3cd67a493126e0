//! Priority lanes example: an alarm actor on the high-priority tier and a
//! reporting actor on the normal tier share one worker pool.
//!
//! This example shows:
//! - Message ancestry (`DiskAlarm` extends `Alarm`)
//! - The built-in `"cause"` extractor
//! - Bus subscriptions next to direct sends
//! - Draining a mailbox on stop

use std::io;

use tokio_actor_dispatch::{
    actor::{Actor, ActorExt},
    dispatch::{Cause, DispatchTableBuilder},
    ActorConfig, ActorSystem, Extends, Failure, MessageCatalog, Priority, Reply,
    ShutdownPolicy,
};

struct Alarm {
    severity: u8,
}

struct DiskAlarm {
    alarm: Alarm,
    mount: &'static str,
}

impl Extends<Alarm> for DiskAlarm {
    fn parent(&self) -> &Alarm {
        &self.alarm
    }
}

struct Summary;

// Alarm desk - runs on the high-priority tier
#[derive(Default)]
struct AlarmDesk {
    alarms: u32,
    disk_alarms: u32,
    causes: Vec<String>,
}

impl Actor for AlarmDesk {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table
            .act::<Alarm>("alarm")
            .subscribe_and_direct()
            .handle(|desk, alarm, ctx| {
                desk.alarms += 1;
                tracing::info!(actor = %ctx.actor_id(), severity = alarm.severity, "alarm");
                Ok(Reply::none())
            });
        table
            .act::<DiskAlarm>("disk_alarm")
            .subscribe()
            .handle(|desk, alarm, _| {
                desk.disk_alarms += 1;
                tracing::warn!(mount = alarm.mount, severity = alarm.alarm.severity, "disk alarm");
                Ok(Reply::none())
            });
        table
            .act::<Failure>("failure")
            .extract_as::<Cause>("cause")
            .invoke(|desk, args, _| {
                let cause = args.take::<Cause>(0)?;
                desk.causes.push(cause.to_string());
                Ok(Reply::none())
            });
        table.act::<Summary>("summary").handle(|desk, _, _| {
            Ok(Reply::with(format!(
                "{} alarms, {} disk alarms, causes: {:?}",
                desk.alarms, desk.disk_alarms, desk.causes
            )))
        });
    }
}

// Reporter - runs on the normal tier
#[derive(Default)]
struct Reporter {
    lines: Vec<String>,
}

struct Line(String);

impl Actor for Reporter {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table.act::<Line>("line").handle(|reporter, line, _| {
            reporter.lines.push(line.0.clone());
            Ok(Reply::none())
        });
        table
            .act::<Alarm>("alarm")
            .subscribe()
            .handle(|reporter, alarm, ctx| {
                reporter
                    .lines
                    .push(format!("{} saw severity {}", ctx.message_type(), alarm.severity));
                Ok(Reply::none())
            });
        table
            .act::<Summary>("summary")
            .handle(|reporter, _, _| Ok(Reply::with(reporter.lines.len())));
    }

    fn on_stopped(&mut self) {
        tracing::info!(lines = self.lines.len(), "reporter flushed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let catalog = MessageCatalog::builder()
        .extends::<DiskAlarm, Alarm>()
        .build()?;
    let system = ActorSystem::builder().workers(2).catalog(catalog).start()?;

    let desk = AlarmDesk::default().spawn_on(
        &system,
        "alarm-desk",
        ActorConfig::default().with_priority(Priority::High),
    )?;
    let reporter = Reporter::default().spawn_on(
        &system,
        "reporter",
        ActorConfig::default().with_shutdown_policy(ShutdownPolicy::Drain),
    )?;

    for line in 0..20 {
        reporter.send(Line(format!("report line {line}")))?;
    }
    desk.send(Alarm { severity: 1 })?;
    let reached = system.publish(DiskAlarm {
        alarm: Alarm { severity: 3 },
        mount: "/var",
    });
    println!("✅ Disk alarm reached {reached} actors");

    desk.send(
        Failure::new("backup failed")
            .with_cause(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume")),
    )?;
    if let Err(err) = desk.ask::<(), _>(Failure::new("unknown failure"))?.await {
        println!("⚠️  Failure without cause rejected: {err}");
    }

    let summary = desk.ask::<String, _>(Summary)?.await?;
    println!("✅ Alarm desk: {summary}");

    reporter.stop()?;
    reporter.stopped().await;
    println!("✅ Reporter stopped after draining its mailbox");

    desk.stop()?;
    desk.stopped().await;
    system.shutdown().await;
    Ok(())
}
