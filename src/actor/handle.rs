//! Handle-based communication API for actors.

use std::any::{type_name, Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context as TaskContext, Poll};

use tokio::sync::oneshot;

use crate::actor::cell::ActorCell;
use crate::actor::Actor;
use crate::bus::Subscriber;
use crate::environment::ExecutionEnvironment;
use crate::error::{ActorError, AskError, SendError};
use crate::types::{ActorId, ActorStatus, Delivery, Payload, Priority, Reply};

/// Cloneable handle that callers use to communicate with an actor.
pub struct ActorHandle<A: Actor> {
    cell: Arc<ActorCell<A>>,
}

impl<A: Actor> Clone for ActorHandle<A> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<A: Actor> PartialEq for ActorHandle<A> {
    fn eq(&self, other: &Self) -> bool {
        self.cell.id == other.cell.id
    }
}

impl<A: Actor> Eq for ActorHandle<A> {}

impl<A: Actor> std::hash::Hash for ActorHandle<A> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.cell.id.hash(state);
    }
}

impl<A: Actor> Debug for ActorHandle<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHandle")
            .field("id", &self.cell.id)
            .field("actor", &self.cell.table.actor())
            .field("priority", &self.cell.env.priority())
            .field("status", &self.status())
            .finish()
    }
}

impl<A: Actor> ActorHandle<A> {
    pub(crate) fn new(cell: Arc<ActorCell<A>>) -> Self {
        Self { cell }
    }

    /// Returns the unique identifier of the actor.
    pub fn id(&self) -> &ActorId {
        &self.cell.id
    }

    /// Tier the actor is bound to.
    pub fn priority(&self) -> Priority {
        self.cell.env.priority()
    }

    /// Execution environment the actor is bound to.
    pub fn environment(&self) -> &ExecutionEnvironment {
        &self.cell.env
    }

    /// Returns the current number of messages in the mailbox.
    pub fn mailbox_len(&self) -> usize {
        self.cell.mailbox_len()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ActorStatus {
        *self.cell.status.borrow()
    }

    /// Returns true if the actor still accepts messages.
    pub fn is_alive(&self) -> bool {
        self.status() == ActorStatus::Running
    }

    /// Most recent handler failure, if any.
    pub fn last_error(&self) -> Option<ActorError> {
        self.cell.last_error.lock().clone()
    }

    /// Sends a message to the actor without waiting for a response (fire-and-forget).
    ///
    /// Never blocks: the message is queued before this returns.
    ///
    /// # Errors
    /// Returns `SendError::Closed` once `stop` has been called.
    pub fn send<M: Any + Send + Sync>(&self, msg: M) -> Result<(), SendError> {
        self.cell.enqueue(Payload::new(msg), Delivery::Direct, None)
    }

    /// Queues a message and returns a future resolving to the handler's reply.
    ///
    /// The message is queued before this returns, so ordering relative to
    /// other sends from the same caller is preserved even if the future is
    /// awaited later or dropped.
    ///
    /// # Errors
    /// Returns `SendError::Closed` once `stop` has been called. The
    /// returned future resolves to:
    /// - `AskError::Dispatch` if no handler accepts the message.
    /// - `AskError::Actor` if the handler failed.
    /// - `AskError::Discarded` if the actor stopped with the discard policy, or
    ///   the system shut down, before the message was processed.
    /// - `AskError::NoReply` or `AskError::ReplyType` if the reply is missing or of another type.
    pub fn ask<R, M>(&self, msg: M) -> Result<PendingReply<R>, SendError>
    where
        R: Any + Send,
        M: Any + Send + Sync,
    {
        let (tx, rx) = oneshot::channel();
        self.cell
            .enqueue(Payload::new(msg), Delivery::Direct, Some(tx))?;
        Ok(PendingReply {
            rx,
            _reply: PhantomData,
        })
    }

    /// Signals the actor to stop.
    ///
    /// Closes the mailbox immediately; what happens to already queued
    /// messages depends on the actor's [`ShutdownPolicy`](crate::types::ShutdownPolicy).
    ///
    /// # Errors
    /// Returns `SendError::Closed` if the actor was already stopped.
    pub fn stop(&self) -> Result<(), SendError> {
        self.cell.stop()
    }

    /// Waits until the actor reached [`ActorStatus::Stopped`].
    pub async fn stopped(&self) {
        let mut status = self.cell.status.subscribe();
        let _ = status
            .wait_for(|status| *status == ActorStatus::Stopped)
            .await;
    }
}

impl<A: Actor> Subscriber for ActorHandle<A> {
    fn subscriber_id(&self) -> &ActorId {
        &self.cell.id
    }

    fn deliver(&self, payload: Payload) -> Result<(), SendError> {
        self.cell.enqueue(payload, Delivery::Subscription, None)
    }
}

/// Reply of an [`ActorHandle::ask`], typed as `R`.
///
/// Handlers returning no value satisfy `R = ()`.
#[must_use = "the reply is lost unless the future is awaited"]
pub struct PendingReply<R> {
    rx: oneshot::Receiver<Result<Reply, AskError>>,
    _reply: PhantomData<fn() -> R>,
}

impl<R> Debug for PendingReply<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("reply", &type_name::<R>())
            .finish()
    }
}

impl<R: Any + Send> Future for PendingReply<R> {
    type Output = Result<R, AskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let outcome = ready!(Pin::new(&mut self.rx).poll(cx));
        Poll::Ready(match outcome {
            Err(_) => Err(AskError::ResponseDropped),
            Ok(Err(err)) => Err(err),
            Ok(Ok(reply)) => downcast_reply(reply),
        })
    }
}

fn downcast_reply<R: Any + Send>(reply: Reply) -> Result<R, AskError> {
    let value: Box<dyn Any + Send> = match reply.into_inner() {
        Some(value) => value,
        None if TypeId::of::<R>() == TypeId::of::<()>() => Box::new(()),
        None => return Err(AskError::NoReply),
    };
    value
        .downcast::<R>()
        .map(|value| *value)
        .map_err(|_| AskError::ReplyType {
            expected: type_name::<R>(),
        })
}
