//! Shared type definitions used across the dispatch core and the runtime.

use std::any::{Any, TypeId};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::AskError;

/// Unique identifier assigned to each actor within the system.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActorId(Arc<str>);

impl ActorId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for ActorId
where
    T: Into<String>,
{
    fn from(value: T) -> Self {
        let owned: String = value.into();
        Self(Arc::from(owned.into_boxed_str()))
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime identity of a message type.
#[derive(Clone, Copy, Debug)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
}

impl MessageType {
    /// Identity of `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type name, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Channel a message arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// Addressed to one actor through its handle.
    Direct,
    /// Published on the shared event bus.
    Subscription,
}

impl Display for Delivery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Direct => f.write_str("direct"),
            Delivery::Subscription => f.write_str("subscription"),
        }
    }
}

/// Channels a handler is eligible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandlerMode {
    /// Direct sends only.
    #[default]
    Direct,
    /// Bus publications only.
    Subscribe,
    /// Both channels.
    Both,
}

impl HandlerMode {
    /// Returns true if a message arriving through `delivery` may use this handler.
    pub fn accepts(self, delivery: Delivery) -> bool {
        matches!(
            (self, delivery),
            (HandlerMode::Direct, Delivery::Direct)
                | (HandlerMode::Subscribe, Delivery::Subscription)
                | (HandlerMode::Both, _)
        )
    }

    /// Returns true if both modes share at least one channel.
    pub fn overlaps(self, other: HandlerMode) -> bool {
        [Delivery::Direct, Delivery::Subscription]
            .into_iter()
            .any(|delivery| self.accepts(delivery) && other.accepts(delivery))
    }
}

impl Display for HandlerMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerMode::Direct => f.write_str("direct"),
            HandlerMode::Subscribe => f.write_str("subscribe"),
            HandlerMode::Both => f.write_str("subscribe+direct"),
        }
    }
}

/// Priority tier of an execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
    /// Served first, subject to the fairness policy.
    High,
    /// Default tier.
    #[default]
    Normal,
}

impl Priority {
    /// All tiers, highest first.
    pub const ALL: [Priority; 2] = [Priority::High, Priority::Normal];

    pub(crate) fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => f.write_str("high-priority"),
            Priority::Normal => f.write_str("normal-priority"),
        }
    }
}

/// What happens to queued messages when an actor is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Process everything accepted before the stop, then terminate.
    #[default]
    Drain,
    /// Drop everything still queued; pending askers receive `AskError::Discarded`.
    Discard,
}

/// Lifecycle status for a running actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorStatus {
    /// The actor accepts and processes messages.
    Running,
    /// The mailbox is closed; queued work is being drained or discarded.
    Stopping,
    /// The actor has stopped.
    Stopped,
}

/// Value produced by a handler for a waiting asker.
#[derive(Debug, Default)]
pub struct Reply(Option<Box<dyn Any + Send>>);

impl Reply {
    /// No reply value.
    pub fn none() -> Self {
        Self(None)
    }

    /// Replies with `value`.
    pub fn with<T: Any + Send>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    /// Returns true if the handler produced a value.
    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }

    pub(crate) fn into_inner(self) -> Option<Box<dyn Any + Send>> {
        self.0
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

/// Shared, immutable message value together with its static type name.
#[derive(Clone)]
pub(crate) struct Payload {
    pub value: Arc<dyn Any + Send + Sync>,
    pub type_name: &'static str,
}

impl Payload {
    pub fn new<M: Any + Send + Sync>(message: M) -> Self {
        Self {
            value: Arc::new(message),
            type_name: std::any::type_name::<M>(),
        }
    }

    /// Runtime type of the wrapped value.
    pub fn type_id(&self) -> TypeId {
        (*self.value).type_id()
    }
}

pub(crate) type Responder = oneshot::Sender<Result<Reply, AskError>>;

/// Internal representation of mailbox entries.
pub(crate) enum Envelope {
    /// A message with an optional responder.
    Message {
        payload: Payload,
        delivery: Delivery,
        responder: Option<Responder>,
    },
    /// Marks the point after which the actor terminates.
    Stop,
}
