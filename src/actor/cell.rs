use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::actor::context::Context;
use crate::actor::runtime::SystemShared;
use crate::actor::Actor;
use crate::dispatch::DispatchTable;
use crate::environment::{ExecutionEnvironment, Schedulable};
use crate::error::{ActorError, AskError, DispatchError, SendError};
use crate::mailbox::{Mailbox, MailboxToken};
use crate::observer::{DeadLetter, FailureReport};
use crate::types::{
    ActorId, ActorStatus, Delivery, Envelope, Payload, Responder, ShutdownPolicy,
};

/// Type-erased view of a cell kept in the system's id registry.
pub(crate) trait LiveCell: Send + Sync {
    /// True until the terminal state is reached.
    fn is_live(&self) -> bool;
    /// Closes the mailbox, answers queued askers with `Discarded` and
    /// finalizes. Only called once no worker will run the cell again.
    fn terminate(&self);
}

/// Live actor instance: state, shared table, mailbox and tier binding.
pub(crate) struct ActorCell<A: Actor> {
    pub id: ActorId,
    actor: Mutex<A>,
    pub table: Arc<DispatchTable<A>>,
    mailbox: Mailbox<Envelope>,
    pub env: ExecutionEnvironment,
    shutdown: ShutdownPolicy,
    system: Arc<SystemShared>,
    pub status: watch::Sender<ActorStatus>,
    pub last_error: Mutex<Option<ActorError>>,
    finalized: AtomicBool,
}

impl<A: Actor> ActorCell<A> {
    pub fn new(
        id: ActorId,
        actor: A,
        table: Arc<DispatchTable<A>>,
        env: ExecutionEnvironment,
        shutdown: ShutdownPolicy,
        system: Arc<SystemShared>,
    ) -> Self {
        let (status, _) = watch::channel(ActorStatus::Running);
        Self {
            id,
            actor: Mutex::new(actor),
            table,
            mailbox: Mailbox::new(),
            env,
            shutdown,
            system,
            status,
            last_error: Mutex::new(None),
            finalized: AtomicBool::new(false),
        }
    }

    pub fn enqueue(
        self: &Arc<Self>,
        payload: Payload,
        delivery: Delivery,
        responder: Option<Responder>,
    ) -> Result<(), SendError> {
        self.mailbox
            .enqueue(Envelope::Message {
                payload,
                delivery,
                responder,
            })
            .map_err(|_| SendError::Closed)?;
        self.schedule();
        Ok(())
    }

    /// Closes the mailbox and queues the stop marker behind every accepted message.
    pub fn stop(self: &Arc<Self>) -> Result<(), SendError> {
        if !self.mailbox.close() {
            return Err(SendError::Closed);
        }
        self.status.send_replace(ActorStatus::Stopping);
        self.mailbox.push_closed(Envelope::Stop);
        self.schedule();
        Ok(())
    }

    pub fn mailbox_len(&self) -> usize {
        self.mailbox.len()
    }

    fn schedule(self: &Arc<Self>) {
        if self.mailbox.request_schedule() {
            self.env.submit(Arc::clone(self) as Arc<dyn Schedulable>);
        }
    }

    fn process(&self, payload: Payload, delivery: Delivery, responder: Option<Responder>) {
        let Some(handler) = self.table.resolve(payload.type_id(), delivery) else {
            let error = DispatchError::NoMatchingHandler {
                message: payload.type_name,
                delivery,
            };
            let letter = DeadLetter {
                actor: self.id.clone(),
                message_type: payload.type_name,
                delivery,
                error: error.clone(),
            };
            self.guard("dead_letter", || self.system.observer.dead_letter(&letter));
            if let Some(tx) = responder {
                let _ = tx.send(Err(AskError::Dispatch(error)));
            }
            return;
        };

        let message: &(dyn Any + Send + Sync) = &*payload.value;
        let ctx = Context::new(&self.id, delivery, payload.type_name, &self.system);
        let outcome = {
            let mut actor = self.actor.lock();
            let result = catch_unwind(AssertUnwindSafe(|| {
                handler.call(&mut actor, message, self.table.catalog(), &ctx)
            }))
            .unwrap_or_else(|panic| Err(ActorError::Panic(panic_message(panic.as_ref()))));
            if let Err(error) = &result {
                self.guard("on_failure", || actor.on_failure(error));
            }
            result
        };

        match outcome {
            Ok(reply) => {
                if let Some(tx) = responder {
                    let _ = tx.send(Ok(reply));
                }
            }
            Err(error) => {
                *self.last_error.lock() = Some(error.clone());
                let report = FailureReport {
                    actor: self.id.clone(),
                    handler: handler.name(),
                    message_type: payload.type_name,
                    error: error.clone(),
                };
                self.guard("handler_failed", || {
                    self.system.observer.handler_failed(&report)
                });
                if let Some(tx) = responder {
                    let _ = tx.send(Err(AskError::Actor(error)));
                }
            }
        }
    }

    fn discard(&self, token: &MailboxToken<'_, Envelope>) {
        let mut discarded = 0usize;
        while let Some(envelope) = token.dequeue() {
            match envelope {
                Envelope::Message { responder, .. } => {
                    discarded += 1;
                    if let Some(tx) = responder {
                        let _ = tx.send(Err(AskError::Discarded));
                    }
                }
                Envelope::Stop => {
                    self.finalize();
                    break;
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(actor_id = %self.id, discarded, "Mailbox discarded");

        #[cfg(not(feature = "tracing"))]
        let _ = discarded;
    }

    fn finalize(&self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        self.system.bus.unsubscribe(&self.id);
        self.guard("on_stopped", || self.actor.lock().on_stopped());
        self.status.send_replace(ActorStatus::Stopped);
        self.system.cells.remove_if(&self.id, |_, cell| {
            cell.as_ptr() as *const () == self as *const Self as *const ()
        });

        #[cfg(feature = "tracing")]
        tracing::info!(
            actor_id = %self.id,
            priority = %self.env.priority(),
            "Actor stopped"
        );
    }

    /// Runs a user or observer hook; a panic is logged and swallowed so the
    /// turn still releases the token.
    fn guard(&self, hook: &'static str, f: impl FnOnce()) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
            let message = panic_message(panic.as_ref());

            #[cfg(feature = "tracing")]
            tracing::error!(actor_id = %self.id, hook, %message, "Hook panicked");

            #[cfg(not(feature = "tracing"))]
            let _ = (hook, message);
        }
    }

    fn turn(&self, token: &MailboxToken<'_, Envelope>) {
        if self.mailbox.is_closed() && self.shutdown == ShutdownPolicy::Discard {
            self.discard(token);
        } else if let Some(envelope) = token.dequeue() {
            match envelope {
                Envelope::Message {
                    payload,
                    delivery,
                    responder,
                } => self.process(payload, delivery, responder),
                Envelope::Stop => self.finalize(),
            }
        }
    }
}

impl<A: Actor> Schedulable for ActorCell<A> {
    fn run_turn(self: Arc<Self>) {
        let Some(token) = self.mailbox.try_acquire() else {
            return;
        };
        let turn = catch_unwind(AssertUnwindSafe(|| self.turn(&token)));
        drop(token);
        if let Err(panic) = turn {
            let message = panic_message(panic.as_ref());

            #[cfg(feature = "tracing")]
            tracing::error!(actor_id = %self.id, %message, "Turn panicked");

            #[cfg(not(feature = "tracing"))]
            let _ = message;
        }
        self.schedule();
    }
}

impl<A: Actor> LiveCell for ActorCell<A> {
    fn is_live(&self) -> bool {
        *self.status.borrow() != ActorStatus::Stopped
    }

    fn terminate(&self) {
        if self.mailbox.close() {
            self.status.send_replace(ActorStatus::Stopping);
        }
        let Some(token) = self.mailbox.seize() else {
            return;
        };
        while let Some(envelope) = token.dequeue() {
            if let Envelope::Message {
                responder: Some(tx),
                ..
            } = envelope
            {
                let _ = tx.send(Err(AskError::Discarded));
            }
        }
        drop(token);
        self.finalize();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
