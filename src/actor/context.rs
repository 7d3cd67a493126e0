//! Context handed to handler invocations.

use std::any::Any;
use std::sync::Arc;

use crate::actor::runtime::{ActorSystem, SystemShared};
use crate::types::{ActorId, Delivery, Payload};

/// Per invocation view of the running actor and its system.
///
/// Handlers are synchronous: anything that needs to wait on another actor
/// must be sent as a message or spawned, never awaited on the worker.
pub struct Context<'a> {
    actor_id: &'a ActorId,
    delivery: Delivery,
    message_type: &'static str,
    system: &'a Arc<SystemShared>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        actor_id: &'a ActorId,
        delivery: Delivery,
        message_type: &'static str,
        system: &'a Arc<SystemShared>,
    ) -> Self {
        Self {
            actor_id,
            delivery,
            message_type,
            system,
        }
    }

    /// Returns the unique identifier of this actor.
    pub fn actor_id(&self) -> &ActorId {
        self.actor_id
    }

    /// Channel the current message arrived through.
    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Static type name of the current message.
    pub fn message_type(&self) -> &'static str {
        self.message_type
    }

    /// Publishes `message` on the system bus; returns the number of subscribers reached.
    pub fn publish<M: Any + Send + Sync>(&self, message: M) -> usize {
        self.system
            .bus
            .publish(&self.system.catalog, Payload::new(message))
    }

    /// The system this actor runs in, e.g. to spawn further actors.
    pub fn system(&self) -> ActorSystem {
        ActorSystem::from_shared(Arc::clone(self.system))
    }
}
