use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_actor_dispatch::{
    actor::{Actor, ActorExt},
    dispatch::{Cause, DispatchTableBuilder, FnExtractor},
    ActorError, ActorSystem, AskError, ExtractionError, Extends, Failure, FailureReport,
    MessageCatalog, Observer, Reply,
};

#[derive(Clone, Default)]
struct RecordingObserver {
    failures: Arc<Mutex<Vec<FailureReport>>>,
}

impl Observer for RecordingObserver {
    fn handler_failed(&self, report: &FailureReport) {
        self.failures.lock().push(report.clone());
    }
}

struct CauseCollector {
    invoked: Arc<AtomicUsize>,
    causes: Vec<String>,
}

struct Causes;

impl Actor for CauseCollector {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table
            .act::<Failure>("on_cause")
            .extract_as::<Cause>("cause")
            .invoke(|actor, args, _| {
                actor.invoked.fetch_add(1, Ordering::SeqCst);
                let cause = args.take::<Cause>(0)?;
                actor.causes.push(cause.to_string());
                Ok(Reply::none())
            });
        table
            .act::<Causes>("causes")
            .handle(|actor, _, _| Ok(Reply::with(actor.causes.clone())));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cause_extractor_feeds_the_handler() {
    let system = ActorSystem::builder().workers(2).start().unwrap();
    let invoked = Arc::new(AtomicUsize::new(0));
    let handle = CauseCollector {
        invoked: invoked.clone(),
        causes: Vec::new(),
    }
    .spawn_on(&system, "causes", ())
    .unwrap();

    let failure =
        Failure::new("write failed").with_cause(io::Error::new(io::ErrorKind::Other, "disk full"));
    handle.ask::<(), _>(failure).unwrap().await.unwrap();

    let causes = handle.ask::<Vec<String>, _>(Causes).unwrap().await.unwrap();
    assert_eq!(causes, vec!["disk full"]);
    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    system.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_extraction_skips_the_handler() {
    let observer = RecordingObserver::default();
    let system = ActorSystem::builder()
        .workers(2)
        .observer(observer.clone())
        .start()
        .unwrap();
    let invoked = Arc::new(AtomicUsize::new(0));
    let handle = CauseCollector {
        invoked: invoked.clone(),
        causes: Vec::new(),
    }
    .spawn_on(&system, "causes", ())
    .unwrap();

    let err = handle
        .ask::<(), _>(Failure::new("no cause attached"))
        .unwrap()
        .await
        .unwrap_err();
    let expected = ActorError::Extraction(ExtractionError::new("cause", "failure has no cause"));
    assert_eq!(err, AskError::Actor(expected.clone()));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(handle.last_error(), Some(expected.clone()));

    let failures = observer.failures.lock().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].handler, "on_cause");
    assert_eq!(failures[0].error, expected);

    // The token was released: later messages still run.
    let failure = Failure::new("retry").with_cause(io::Error::new(io::ErrorKind::Other, "timeout"));
    handle.ask::<(), _>(failure).unwrap().await.unwrap();
    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    system.shutdown().await;
}

struct Order {
    quantity: u32,
    price: u64,
}

struct RushOrder {
    order: Order,
    deadline: &'static str,
}

impl Extends<Order> for RushOrder {
    fn parent(&self) -> &Order {
        &self.order
    }
}

fn quantity(order: &Order) -> Result<u32, ExtractionError> {
    Ok(order.quantity)
}

fn price(order: &Order) -> Result<u64, ExtractionError> {
    if order.price == 0 {
        return Err(ExtractionError::new("price", "free orders are not accepted"));
    }
    Ok(order.price)
}

fn deadline(order: &RushOrder) -> Result<String, ExtractionError> {
    Ok(order.deadline.to_uppercase())
}

#[derive(Default)]
struct Ledger {
    totals: Vec<(u32, u64, String)>,
}

struct Totals;

impl Actor for Ledger {
    fn handlers(table: &mut DispatchTableBuilder<Self>) {
        table
            .act::<RushOrder>("rush")
            .extract_as::<u32>("quantity")
            .extract_with(FnExtractor::new("price", price))
            .extract_with(FnExtractor::new("deadline", deadline))
            .invoke(|ledger, args, _| {
                let quantity = args.take::<u32>(0)?;
                let price = args.take::<u64>(1)?;
                let deadline = args.take::<String>(2)?;
                ledger.totals.push((quantity, price, deadline));
                Ok(Reply::none())
            });
        table
            .act::<Totals>("totals")
            .handle(|ledger, _, _| Ok(Reply::with(ledger.totals.clone())));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn extractors_read_the_original_message() {
    let catalog = MessageCatalog::builder()
        .extends::<RushOrder, Order>()
        .extractor("quantity", FnExtractor::new("quantity", quantity))
        .build()
        .unwrap();
    let system = ActorSystem::builder()
        .workers(2)
        .catalog(catalog)
        .start()
        .unwrap();
    let handle = Ledger::default().spawn_on(&system, "ledger", ()).unwrap();

    handle
        .send(RushOrder {
            order: Order {
                quantity: 3,
                price: 250,
            },
            deadline: "friday",
        })
        .unwrap();
    let err = handle
        .ask::<(), _>(RushOrder {
            order: Order {
                quantity: 1,
                price: 0,
            },
            deadline: "monday",
        })
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AskError::Actor(ActorError::Extraction(ref e)) if e.extractor() == "price"
    ));

    let totals = handle
        .ask::<Vec<(u32, u64, String)>, _>(Totals)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(totals, vec![(3, 250, "FRIDAY".to_string())]);
    system.shutdown().await;
}
