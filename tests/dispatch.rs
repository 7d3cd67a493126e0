use std::any::TypeId;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_actor_dispatch::{
    actor::{Actor, ActorExt},
    dispatch::DispatchTableBuilder,
    ActorSystem, AskError, DeadLetter, Delivery, DispatchError, Extends, MessageCatalog,
    Observer, Reply,
};

#[derive(Clone, Default)]
struct RecordingObserver {
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,
}

impl Observer for RecordingObserver {
    fn dead_letter(&self, letter: &DeadLetter) {
        self.dead_letters.lock().push(letter.clone());
    }
}

struct Seen;

#[derive(Default)]
struct IntActor {
    seen: Vec<i32>,
    args: Vec<usize>,
}

impl Actor for IntActor {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table.act::<i32>("on_int").invoke(|actor, args, _ctx| {
            actor.args.push(args.len());
            actor.seen.push(*args.get::<i32>(0)?);
            Ok(Reply::none())
        });
        table
            .act::<Seen>("seen")
            .handle(|actor, _, _| Ok(Reply::with((actor.seen.clone(), actor.args.clone()))));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn direct_int_reaches_handler_unchanged() {
    let system = ActorSystem::builder().workers(2).start().unwrap();
    let handle = IntActor::default().spawn_on(&system, "ints", ()).unwrap();

    handle.send(42_i32).unwrap();
    let (seen, args) = handle
        .ask::<(Vec<i32>, Vec<usize>), _>(Seen)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(seen, vec![42]);
    assert_eq!(args, vec![1]);

    let table = system.register::<IntActor>().unwrap();
    let handler = table.resolve(TypeId::of::<i32>(), Delivery::Direct).unwrap();
    assert_eq!(handler.params().len(), 1);
    assert!(!handler.subscribes());
    system.shutdown().await;
}

struct BaseEvent {
    code: u32,
}

struct IoEvent {
    base: BaseEvent,
    path: &'static str,
}

impl Extends<BaseEvent> for IoEvent {
    fn parent(&self) -> &BaseEvent {
        &self.base
    }
}

fn event_catalog() -> MessageCatalog {
    MessageCatalog::builder()
        .extends::<IoEvent, BaseEvent>()
        .build()
        .unwrap()
}

#[derive(Default)]
struct Specific {
    calls: Vec<String>,
}

impl Actor for Specific {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table.act::<BaseEvent>("base").handle(|actor, event, _| {
            actor.calls.push(format!("base:{}", event.code));
            Ok(Reply::none())
        });
        table
            .act::<IoEvent>("io")
            .param::<IoEvent>()
            .param::<BaseEvent>()
            .invoke(|actor, args, _| {
                let io = args.get::<IoEvent>(0)?;
                let base = args.get::<BaseEvent>(1)?;
                actor.calls.push(format!("io:{}:{}", io.path, base.code));
                Ok(Reply::none())
            });
        table
            .act::<Seen>("seen")
            .handle(|actor, _, _| Ok(Reply::with(actor.calls.clone())));
    }
}

#[derive(Default)]
struct General {
    calls: Vec<String>,
}

impl Actor for General {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table.act::<BaseEvent>("base").handle(|actor, event, ctx| {
            let short = ctx.message_type().rsplit("::").next().unwrap_or_default();
            actor.calls.push(format!("{short}:{}", event.code));
            Ok(Reply::none())
        });
        table
            .act::<Seen>("seen")
            .handle(|actor, _, _| Ok(Reply::with(actor.calls.clone())));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ancestry_resolves_most_specific_handler() {
    let system = ActorSystem::builder()
        .workers(2)
        .catalog(event_catalog())
        .start()
        .unwrap();
    let specific = Specific::default().spawn_on(&system, "specific", ()).unwrap();
    let general = General::default().spawn_on(&system, "general", ()).unwrap();

    for event in [
        IoEvent {
            base: BaseEvent { code: 5 },
            path: "/tmp/a",
        },
        IoEvent {
            base: BaseEvent { code: 6 },
            path: "/tmp/b",
        },
    ] {
        specific.send(event).unwrap();
    }
    specific.send(BaseEvent { code: 7 }).unwrap();
    general
        .send(IoEvent {
            base: BaseEvent { code: 9 },
            path: "/tmp/c",
        })
        .unwrap();

    let calls = specific.ask::<Vec<String>, _>(Seen).unwrap().await.unwrap();
    assert_eq!(calls, vec!["io:/tmp/a:5", "io:/tmp/b:6", "base:7"]);

    let calls = general.ask::<Vec<String>, _>(Seen).unwrap().await.unwrap();
    assert_eq!(calls, vec!["IoEvent:9"]);
    system.shutdown().await;
}

struct Tick(u32);

#[derive(Default)]
struct Channels {
    calls: Vec<(&'static str, Delivery, u32)>,
}

impl Actor for Channels {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table.act::<Tick>("direct_tick").handle(|actor, tick, ctx| {
            actor.calls.push(("direct_tick", ctx.delivery(), tick.0));
            Ok(Reply::none())
        });
        table
            .act::<Tick>("bus_tick")
            .subscribe()
            .handle(|actor, tick, ctx| {
                actor.calls.push(("bus_tick", ctx.delivery(), tick.0));
                Ok(Reply::none())
            });
        table
            .act::<Seen>("seen")
            .handle(|actor, _, _| Ok(Reply::with(actor.calls.clone())));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delivery_channel_selects_handler() {
    let system = ActorSystem::builder().workers(2).start().unwrap();
    let handle = Channels::default().spawn_on(&system, "channels", ()).unwrap();
    assert_eq!(system.subscriber_count::<Tick>(), 1);

    handle.send(Tick(1)).unwrap();
    let reached = system.publish(Tick(2));
    assert_eq!(reached, 1);

    let mut calls = handle
        .ask::<Vec<(&'static str, Delivery, u32)>, _>(Seen)
        .unwrap()
        .await
        .unwrap();
    calls.sort_by_key(|call| call.2);
    assert_eq!(
        calls,
        vec![
            ("direct_tick", Delivery::Direct, 1),
            ("bus_tick", Delivery::Subscription, 2),
        ]
    );
    system.shutdown().await;
}

#[derive(Default)]
struct BaseWatcher {
    calls: Vec<String>,
}

impl Actor for BaseWatcher {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table
            .act::<BaseEvent>("base")
            .subscribe()
            .handle(|actor, event, ctx| {
                let short = ctx.message_type().rsplit("::").next().unwrap_or_default();
                actor.calls.push(format!("base<-{short}:{}", event.code));
                Ok(Reply::none())
            });
        table
            .act::<Seen>("seen")
            .handle(|actor, _, _| Ok(Reply::with(actor.calls.clone())));
    }
}

#[derive(Default)]
struct Layered {
    calls: Vec<String>,
}

impl Actor for Layered {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table
            .act::<BaseEvent>("base")
            .subscribe()
            .handle(|actor, event, _| {
                actor.calls.push(format!("base:{}", event.code));
                Ok(Reply::none())
            });
        table.act::<IoEvent>("io").subscribe().handle(|actor, event, _| {
            actor.calls.push(format!("io:{}", event.path));
            Ok(Reply::none())
        });
        table
            .act::<Seen>("seen")
            .handle(|actor, _, _| Ok(Reply::with(actor.calls.clone())));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publish_reaches_ancestor_subscribers_once_per_actor() {
    let system = ActorSystem::builder()
        .workers(2)
        .catalog(event_catalog())
        .start()
        .unwrap();
    let watcher = BaseWatcher::default().spawn_on(&system, "watcher", ()).unwrap();
    let layered = Layered::default().spawn_on(&system, "layered", ()).unwrap();
    assert_eq!(system.subscriber_count::<BaseEvent>(), 2);
    assert_eq!(system.subscriber_count::<IoEvent>(), 1);

    let reached = system.publish(IoEvent {
        base: BaseEvent { code: 1 },
        path: "/dev/sda",
    });
    assert_eq!(reached, 2);
    assert_eq!(system.publish(BaseEvent { code: 2 }), 2);

    let calls = watcher.ask::<Vec<String>, _>(Seen).unwrap().await.unwrap();
    assert_eq!(calls, vec!["base<-IoEvent:1", "base<-BaseEvent:2"]);

    let calls = layered.ask::<Vec<String>, _>(Seen).unwrap().await.unwrap();
    assert_eq!(calls, vec!["io:/dev/sda", "base:2"]);
    system.shutdown().await;
}

struct Unknown;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unmatched_messages_become_dead_letters() {
    let observer = RecordingObserver::default();
    let system = ActorSystem::builder()
        .workers(2)
        .observer(observer.clone())
        .start()
        .unwrap();
    let handle = IntActor::default().spawn_on(&system, "ints", ()).unwrap();

    let err = handle.ask::<(), _>(Unknown).unwrap().await.unwrap_err();
    match err {
        AskError::Dispatch(DispatchError::NoMatchingHandler { message, delivery }) => {
            assert!(message.ends_with("Unknown"));
            assert_eq!(delivery, Delivery::Direct);
        }
        other => panic!("unexpected error: {other}"),
    }

    handle.send(7_i32).unwrap();
    let (seen, _) = handle
        .ask::<(Vec<i32>, Vec<usize>), _>(Seen)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(seen, vec![7]);

    let letters = observer.dead_letters.lock().clone();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].actor.as_str(), "ints");
    assert!(handle.last_error().is_none());
    system.shutdown().await;
}

#[derive(Default)]
struct FastPath {
    calls: Vec<(bool, u32)>,
}

impl Actor for FastPath {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table
            .act::<BaseEvent>("fast")
            .call_by_message()
            .invoke(|actor, args, _| {
                let event = args.message::<BaseEvent>()?;
                let same = std::ptr::eq(event, args.get::<BaseEvent>(0)?);
                actor.calls.push((same, event.code));
                Ok(Reply::none())
            });
        table
            .act::<Seen>("seen")
            .handle(|actor, _, _| Ok(Reply::with(actor.calls.clone())));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn call_by_message_handles_exact_and_derived_types() {
    let system = ActorSystem::builder()
        .workers(2)
        .catalog(event_catalog())
        .start()
        .unwrap();
    let table = system.register::<FastPath>().unwrap();
    assert!(table
        .resolve(TypeId::of::<IoEvent>(), Delivery::Direct)
        .unwrap()
        .is_call_by_message());

    let handle = FastPath::default().spawn_on(&system, "fast", ()).unwrap();
    handle.send(BaseEvent { code: 1 }).unwrap();
    handle
        .send(IoEvent {
            base: BaseEvent { code: 2 },
            path: "/tmp/d",
        })
        .unwrap();

    let calls = handle.ask::<Vec<(bool, u32)>, _>(Seen).unwrap().await.unwrap();
    assert_eq!(calls, vec![(true, 1), (true, 2)]);
    system.shutdown().await;
}

trait Counts {
    fn count(&mut self) -> &mut u64;
}

struct Bump;
struct Reset;
struct Peek;

fn counting<A: Actor + Counts>(table: &mut DispatchTableBuilder<A>) {
    table.act::<Bump>("bump").handle(|actor, _, _| {
        *actor.count() += 1;
        Ok(Reply::none())
    });
    table.act::<Reset>("reset").not_inherited().handle(|actor, _, _| {
        *actor.count() = 0;
        Ok(Reply::none())
    });
    table
        .act::<Peek>("peek")
        .handle(|actor, _, _| Ok(Reply::with(*actor.count())));
}

#[derive(Default)]
struct Doubler {
    count: u64,
}

impl Counts for Doubler {
    fn count(&mut self) -> &mut u64 {
        &mut self.count
    }
}

impl Actor for Doubler {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table.act::<Bump>("double_bump").handle(|actor, _, _| {
            actor.count += 2;
            Ok(Reply::none())
        });
        table.inherit(counting);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn capabilities_compose_and_can_be_overridden() {
    let system = ActorSystem::builder().workers(2).start().unwrap();
    let table = system.register::<Doubler>().unwrap();
    let names: Vec<_> = table.handlers().iter().map(|h| h.name()).collect();
    assert_eq!(names, vec!["double_bump", "peek"]);
    assert_eq!(table.handlers()[1].level(), 1);

    let handle = Doubler::default().spawn_on(&system, "doubler", ()).unwrap();
    handle.send(Bump).unwrap();
    handle.send(Bump).unwrap();
    assert_eq!(handle.ask::<u64, _>(Peek).unwrap().await.unwrap(), 4);

    let err = handle.ask::<(), _>(Reset).unwrap().await.unwrap_err();
    assert!(matches!(err, AskError::Dispatch(_)));
    system.shutdown().await;
}
