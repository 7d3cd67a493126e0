//! Dead-letter and failure reporting.

use crate::error::{ActorError, DispatchError};
use crate::types::{ActorId, Delivery};

/// A message no handler accepted.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Receiving actor.
    pub actor: ActorId,
    /// Static type name of the message.
    pub message_type: &'static str,
    /// Channel the message arrived through.
    pub delivery: Delivery,
    /// Why dispatch failed.
    pub error: DispatchError,
}

/// A handler invocation that failed (extraction, argument, user error or panic).
#[derive(Debug, Clone)]
pub struct FailureReport {
    /// Actor whose handler failed.
    pub actor: ActorId,
    /// Handler name.
    pub handler: &'static str,
    /// Static type name of the message.
    pub message_type: &'static str,
    /// The failure.
    pub error: ActorError,
}

/// Receives dispatch failures and handler failures of every actor in a system.
///
/// Called from worker tasks; implementations must not block.
pub trait Observer: Send + Sync + 'static {
    /// A message was delivered that no handler accepts.
    fn dead_letter(&self, _letter: &DeadLetter) {}

    /// A handler invocation failed.
    fn handler_failed(&self, _report: &FailureReport) {}
}

/// Default observer: emits structured `tracing` warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn dead_letter(&self, letter: &DeadLetter) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            actor_id = %letter.actor,
            message_type = letter.message_type,
            delivery = %letter.delivery,
            "Dead letter: {}",
            letter.error
        );

        #[cfg(not(feature = "tracing"))]
        let _ = letter;
    }

    fn handler_failed(&self, report: &FailureReport) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            actor_id = %report.actor,
            handler = report.handler,
            message_type = report.message_type,
            error = %report.error,
            "Handler failed"
        );

        #[cfg(not(feature = "tracing"))]
        let _ = report;
    }
}
