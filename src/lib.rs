#![warn(missing_docs)]
//! Tokio Actor Dispatch is a Tokio-native actor core built around typed
//! handler tables, extractor-driven argument preparation and priority tiers
//! sharing one worker pool.
//!
//! # Overview
//! - Each actor type declares its handlers once; the resulting
//!   [`DispatchTable`](crate::dispatch::DispatchTable) resolves a message's
//!   runtime type, most specific ancestor first, to exactly one handler.
//! - Handler parameters are filled from the message itself or by
//!   [`MessageExtractor`](crate::dispatch::MessageExtractor)s; failed
//!   extraction never reaches the handler body.
//! - Mailboxes are unbounded FIFO queues guarded by an execution token, so at
//!   most one handler runs per actor at any instant, on any worker.
//! - High- and normal-priority environments share one pool; a
//!   [`FairnessPolicy`](crate::environment::FairnessPolicy) keeps the
//!   normal tier progressing under load.
//! - See `demos/priority_lanes.rs` for a runnable end-to-end example.
//!
//! ```rust,no_run
//! use tokio_actor_dispatch::{
//!     actor::{Actor, ActorExt},
//!     dispatch::DispatchTableBuilder,
//!     ActorConfig, ActorSystem, Priority, Reply,
//! };
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: i64,
//! }
//!
//! struct Inc(i64);
//! struct Get;
//!
//! impl Actor for Counter {
//!     fn handlers(table: &mut DispatchTableBuilder<Self>) {
//!         table.act::<Inc>("inc").handle(|counter, Inc(delta), _ctx| {
//!             counter.value += delta;
//!             Ok(Reply::none())
//!         });
//!         table
//!             .act::<Get>("get")
//!             .handle(|counter, _msg, _ctx| Ok(Reply::with(counter.value)));
//!     }
//! }
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = ActorSystem::builder().workers(2).start()?;
//!     let config = ActorConfig::default().with_priority(Priority::High);
//!     let handle = Counter::default().spawn_on(&system, "counter", config)?;
//!     handle.send(Inc(1))?;
//!     let value: i64 = handle.ask(Get)?.await?;
//!     assert_eq!(value, 1);
//!     handle.stop()?;
//!     handle.stopped().await;
//!     system.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod actor;
mod bus;
pub mod dispatch;
pub mod environment;
pub mod error;
mod mailbox;
pub mod observer;
pub mod types;

pub use actor::{
    context::Context,
    handle::{ActorHandle, PendingReply},
    runtime::{ActorConfig, ActorSystem, ActorSystemBuilder, SystemConfig},
    Actor, ActorExt, IntoActorConfig,
};
pub use dispatch::{
    Arguments, DispatchTable, DispatchTableBuilder, Extends, ExtractorRef, Failure,
    MessageCatalog, MessageExtractor,
};
pub use environment::{ExecutionEnvironment, FairnessPolicy};
pub use error::{
    ActorError, ActorResult, AskError, DispatchError, ExtractionError, RegistrationError,
    SendError, SpawnError,
};
pub use observer::{DeadLetter, FailureReport, LoggingObserver, Observer};
pub use types::{
    ActorId, ActorStatus, Delivery, HandlerMode, MessageType, Priority, Reply, ShutdownPolicy,
};
