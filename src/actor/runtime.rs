use std::any::{Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::actor::cell::{ActorCell, LiveCell};
use crate::actor::{handle::ActorHandle, Actor, IntoActorConfig};
use crate::bus::{EventBus, Subscriber};
use crate::dispatch::{DispatchTable, MessageCatalog};
use crate::environment::{ExecutionEnvironment, FairnessPolicy, WorkerPool};
use crate::error::{RegistrationError, SpawnError};
use crate::observer::{LoggingObserver, Observer};
use crate::types::{ActorId, Payload, Priority, ShutdownPolicy};

/// Configuration for the shared worker pool.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Number of worker tasks shared by all tiers.
    pub workers: usize,
    /// Fairness policy between tiers.
    pub fairness: FairnessPolicy,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(4);
        Self {
            workers,
            fairness: FairnessPolicy::default(),
        }
    }
}

impl SystemConfig {
    /// Sets the number of workers; at least one is always started.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the fairness policy.
    pub fn with_fairness(mut self, fairness: FairnessPolicy) -> Self {
        self.fairness = fairness;
        self
    }
}

/// Configuration for spawning an actor.
#[derive(Debug, Clone, Default)]
pub struct ActorConfig {
    /// Tier the actor is bound to for its whole life.
    pub priority: Priority,
    /// What `stop` does with already queued messages.
    pub shutdown: ShutdownPolicy,
}

impl ActorConfig {
    /// Sets the priority tier.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the shutdown policy.
    pub fn with_shutdown_policy(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// State shared by the system handle, every actor cell and every context.
pub(crate) struct SystemShared {
    pub catalog: Arc<MessageCatalog>,
    pub tables: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    pub bus: EventBus,
    pub pool: WorkerPool,
    pub observer: Arc<dyn Observer>,
    /// Actors that have not reached their terminal state, by id.
    pub cells: DashMap<ActorId, Weak<dyn LiveCell>>,
}

/// Builder for [`ActorSystem`].
pub struct ActorSystemBuilder {
    config: SystemConfig,
    catalog: MessageCatalog,
    observer: Arc<dyn Observer>,
}

impl Default for ActorSystemBuilder {
    fn default() -> Self {
        Self {
            config: SystemConfig::default(),
            catalog: MessageCatalog::default(),
            observer: Arc::new(LoggingObserver),
        }
    }
}

impl ActorSystemBuilder {
    /// Replaces the pool configuration.
    pub fn config(mut self, config: SystemConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of workers.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Sets the fairness policy.
    pub fn fairness(mut self, fairness: FairnessPolicy) -> Self {
        self.config.fairness = fairness;
        self
    }

    /// Message hierarchy and extractor aliases used by every table of the system.
    pub fn catalog(mut self, catalog: MessageCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Receiver of dead letters and handler failures; defaults to [`LoggingObserver`].
    pub fn observer(mut self, observer: impl Observer) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Starts the worker pool on the current Tokio runtime.
    ///
    /// # Errors
    /// Returns `SpawnError::MissingRuntime` outside a Tokio runtime.
    pub fn start(self) -> Result<ActorSystem, SpawnError> {
        let pool = WorkerPool::start(self.config.workers, self.config.fairness)?;
        Ok(ActorSystem::from_shared(Arc::new(SystemShared {
            catalog: Arc::new(self.catalog),
            tables: DashMap::new(),
            bus: EventBus::default(),
            pool,
            observer: self.observer,
            cells: DashMap::new(),
        })))
    }
}

/// Entry point of the runtime: owns the worker pool, the per type dispatch
/// tables and the subscription bus.
///
/// Cheap to clone. Call [`shutdown`](Self::shutdown) to stop the workers and
/// release bus subscriptions.
#[derive(Clone)]
pub struct ActorSystem {
    shared: Arc<SystemShared>,
}

impl Debug for ActorSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("actor_types", &self.shared.tables.len())
            .field("stopped", &self.shared.pool.core().is_stopped())
            .finish()
    }
}

impl ActorSystem {
    /// Returns a builder with default configuration.
    pub fn builder() -> ActorSystemBuilder {
        ActorSystemBuilder::default()
    }

    /// Starts a system with default configuration.
    ///
    /// # Errors
    /// Returns `SpawnError::MissingRuntime` outside a Tokio runtime.
    pub fn start() -> Result<Self, SpawnError> {
        Self::builder().start()
    }

    pub(crate) fn from_shared(shared: Arc<SystemShared>) -> Self {
        Self { shared }
    }

    /// Builds, or returns the cached, dispatch table of actor type `A`.
    ///
    /// Spawning registers implicitly; call this to surface registration
    /// errors early.
    pub fn register<A: Actor>(&self) -> Result<Arc<DispatchTable<A>>, RegistrationError> {
        let key = TypeId::of::<A>();
        if let Some(table) = self.cached_table::<A>(key) {
            return Ok(table);
        }

        let table = Arc::new(DispatchTable::<A>::build(Arc::clone(&self.shared.catalog))?);
        let stored = Arc::clone(
            self.shared
                .tables
                .entry(key)
                .or_insert_with(|| Arc::clone(&table) as Arc<dyn Any + Send + Sync>)
                .value(),
        );

        #[cfg(feature = "tracing")]
        tracing::debug!(
            actor = table.actor(),
            handlers = table.handlers().len(),
            "Dispatch table registered"
        );

        Ok(stored.downcast::<DispatchTable<A>>().unwrap_or(table))
    }

    fn cached_table<A: Actor>(&self, key: TypeId) -> Option<Arc<DispatchTable<A>>> {
        let entry = self.shared.tables.get(&key)?;
        Arc::clone(entry.value()).downcast::<DispatchTable<A>>().ok()
    }

    /// Spawns `actor` under `id`, bound to the tier named in `config`.
    ///
    /// The config parameter is optional - pass `None`, `()`, `ActorConfig::default()`, or `&config`.
    /// An id can be reused once the actor holding it has stopped.
    ///
    /// # Errors
    /// - `SpawnError::PoolStopped` after [`shutdown`](Self::shutdown).
    /// - `SpawnError::DuplicateId` while another actor of this system uses `id`.
    /// - `SpawnError::Registration` if the actor type's handlers are invalid.
    pub fn spawn<A: Actor>(
        &self,
        id: impl Into<ActorId>,
        actor: A,
        config: impl IntoActorConfig,
    ) -> Result<ActorHandle<A>, SpawnError> {
        if self.shared.pool.core().is_stopped() {
            return Err(SpawnError::PoolStopped);
        }
        let table = self.register::<A>()?;
        let config = config.into_config();
        let subscriptions: Vec<TypeId> = table
            .subscriptions()
            .map(|message| message.id())
            .collect();
        let id = id.into();
        let cell = Arc::new(ActorCell::new(
            id.clone(),
            actor,
            table,
            self.environment(config.priority),
            config.shutdown,
            Arc::clone(&self.shared),
        ));
        self.claim_id(&id, &cell)?;
        let handle = ActorHandle::new(Arc::clone(&cell));

        let subscriber: Arc<dyn Subscriber> = Arc::new(handle.clone());
        for message in subscriptions {
            self.shared.bus.subscribe(message, Arc::clone(&subscriber));
        }

        if self.shared.pool.core().is_stopped() {
            cell.terminate();
            return Err(SpawnError::PoolStopped);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            actor_id = %handle.id(),
            priority = %config.priority,
            "Actor spawned"
        );

        Ok(handle)
    }

    fn claim_id<A: Actor>(
        &self,
        id: &ActorId,
        cell: &Arc<ActorCell<A>>,
    ) -> Result<(), SpawnError> {
        let live: Weak<dyn LiveCell> = Arc::downgrade(cell) as Weak<dyn LiveCell>;
        match self.shared.cells.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                let in_use = entry
                    .get()
                    .upgrade()
                    .is_some_and(|existing| existing.is_live());
                if in_use {
                    return Err(SpawnError::DuplicateId(id.clone()));
                }
                entry.insert(live);
            }
            Entry::Vacant(entry) => {
                entry.insert(live);
            }
        }
        Ok(())
    }

    /// Environment serving the `priority` tier.
    pub fn environment(&self, priority: Priority) -> ExecutionEnvironment {
        ExecutionEnvironment::new(priority, Arc::clone(self.shared.pool.core()))
    }

    /// Publishes `message` to every actor subscribed to its type or an ancestor.
    ///
    /// Returns the number of actors that accepted the publication.
    pub fn publish<M: Any + Send + Sync>(&self, message: M) -> usize {
        self.shared
            .bus
            .publish(&self.shared.catalog, Payload::new(message))
    }

    /// Number of actors subscribed to exactly `M`.
    pub fn subscriber_count<M: Any>(&self) -> usize {
        self.shared.bus.subscriber_count(TypeId::of::<M>())
    }

    /// Catalog shared by all tables of this system.
    pub fn catalog(&self) -> &MessageCatalog {
        &self.shared.catalog
    }

    /// Stops the worker pool, then terminates every actor still alive and
    /// drops every bus subscription.
    ///
    /// Turns already running complete. Messages still queued are discarded:
    /// their askers resolve to `AskError::Discarded`, `on_stopped` runs and
    /// later sends fail with `SendError::Closed`. Stop actors with the drain
    /// policy first to have their mailboxes processed.
    pub async fn shutdown(&self) {
        self.shared.pool.shutdown().await;
        let live: Vec<Arc<dyn LiveCell>> = self
            .shared
            .cells
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .collect();
        self.shared.cells.clear();
        for cell in &live {
            cell.terminate();
        }
        self.shared.bus.clear();

        #[cfg(feature = "tracing")]
        tracing::debug!(terminated = live.len(), "Actor system stopped");
    }
}
