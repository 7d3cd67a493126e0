//! Core actor trait and the runtime glue around it.

/// Internal actor cell binding instance, table, mailbox and environment.
mod cell;
/// Context handed to every handler invocation.
pub mod context;
/// Actor handle for external communication.
pub mod handle;
/// System configuration, registration and spawning.
pub mod runtime;

use crate::dispatch::DispatchTableBuilder;
use crate::error::{ActorError, SpawnError};
use crate::types::ActorId;
use handle::ActorHandle;
use runtime::{ActorConfig, ActorSystem};

/// Primary trait implemented by all actors.
///
/// An actor declares its handlers once per type; the runtime turns the
/// declarations into a shared [`DispatchTable`](crate::dispatch::DispatchTable)
/// and guarantees that at most one handler runs per instance at a time.
pub trait Actor: Sized + Send + 'static {
    /// Declares the handlers of this actor type.
    ///
    /// Called once per actor type and system, at registration.
    fn handlers(table: &mut DispatchTableBuilder<Self>);

    /// Called after a handler invocation failed, still under the actor's
    /// execution token.
    fn on_failure(&mut self, _error: &ActorError) {}

    /// Called once the actor reached its terminal state, after
    /// [`ActorHandle::stop`](crate::ActorHandle::stop) or
    /// [`ActorSystem::shutdown`](crate::ActorSystem::shutdown).
    ///
    /// Dropping every handle does not stop an actor: an actor with
    /// subscriptions stays reachable through the bus, and one without is
    /// released without this hook running.
    fn on_stopped(&mut self) {}
}

/// Helper trait for flexible ActorConfig parameter.
///
/// This allows passing `()`, `None`, `ActorConfig::default()`, or `&config` to `spawn`.
pub trait IntoActorConfig {
    /// Converts the value into an `ActorConfig`.
    fn into_config(self) -> ActorConfig;
}

impl IntoActorConfig for ActorConfig {
    fn into_config(self) -> ActorConfig {
        self
    }
}

impl IntoActorConfig for &ActorConfig {
    fn into_config(self) -> ActorConfig {
        self.clone()
    }
}

impl IntoActorConfig for Option<ActorConfig> {
    fn into_config(self) -> ActorConfig {
        self.unwrap_or_default()
    }
}

impl IntoActorConfig for () {
    fn into_config(self) -> ActorConfig {
        ActorConfig::default()
    }
}

/// Convenience trait for spawning actors directly from their implementations.
pub trait ActorExt: Actor {
    /// Consumes the actor, spawns it on `system`, and returns its handle.
    ///
    /// The config parameter is optional - pass `None`, `()`, `ActorConfig::default()`, or `&config`.
    fn spawn_on(
        self,
        system: &ActorSystem,
        id: impl Into<ActorId>,
        config: impl IntoActorConfig,
    ) -> Result<ActorHandle<Self>, SpawnError> {
        system.spawn(id, self, config)
    }
}

impl<T> ActorExt for T where T: Actor {}
