//! Shared subscription channel feeding `subscribe` handlers.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::dispatch::MessageCatalog;
use crate::error::SendError;
use crate::types::{ActorId, Payload};

/// Mailbox endpoint the bus publishes into.
pub(crate) trait Subscriber: Send + Sync {
    fn subscriber_id(&self) -> &ActorId;
    fn deliver(&self, payload: Payload) -> Result<(), SendError>;
}

/// Subscriptions keyed by accepted message type.
#[derive(Default)]
pub(crate) struct EventBus {
    subscriptions: DashMap<TypeId, Vec<Arc<dyn Subscriber>>>,
}

impl EventBus {
    pub fn subscribe(&self, ty: TypeId, subscriber: Arc<dyn Subscriber>) {
        let mut entry = self.subscriptions.entry(ty).or_default();
        if entry
            .iter()
            .all(|existing| existing.subscriber_id() != subscriber.subscriber_id())
        {
            entry.push(subscriber);
        }
    }

    pub fn unsubscribe(&self, id: &ActorId) {
        for mut entry in self.subscriptions.iter_mut() {
            entry.retain(|subscriber| subscriber.subscriber_id() != id);
        }
        self.subscriptions.retain(|_, subscribers| !subscribers.is_empty());
    }

    /// Delivers `payload` once to every actor subscribed to its type or an
    /// ancestor. Returns the number of mailboxes that accepted it.
    pub fn publish(&self, catalog: &MessageCatalog, payload: Payload) -> usize {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for level in catalog.ancestry(payload.type_id()) {
            if let Some(subscribers) = self.subscriptions.get(&level) {
                for subscriber in subscribers.iter() {
                    if seen.insert(subscriber.subscriber_id().clone()) {
                        targets.push(Arc::clone(subscriber));
                    }
                }
            }
        }
        targets
            .into_iter()
            .filter(|target| target.deliver(payload.clone()).is_ok())
            .count()
    }

    pub fn subscriber_count(&self, ty: TypeId) -> usize {
        self.subscriptions
            .get(&ty)
            .map_or(0, |subscribers| subscribers.len())
    }

    pub fn clear(&self) {
        self.subscriptions.clear();
    }
}
