//! Error types surfaced by registration, dispatch and the actor runtime.

use thiserror::Error;

use crate::types::{ActorId, Delivery, HandlerMode};

/// Result type for handler logic.
pub type ActorResult<T> = Result<T, ActorError>;

/// Errors raised while building the dispatch table of an actor type or the
/// message catalog. Registration errors are fatal for the type being built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Two handlers accept the same message type on overlapping channels.
    #[error(
        "actor `{actor}`: handlers `{first}` and `{second}` both accept `{message}` ({mode} delivery)"
    )]
    DuplicateHandler {
        /// Actor type being registered.
        actor: &'static str,
        /// Accepted message type.
        message: &'static str,
        /// Delivery mode of the later declaration.
        mode: HandlerMode,
        /// Handler declared first.
        first: &'static str,
        /// Handler declared second.
        second: &'static str,
    },
    /// The extractor cannot produce the declared parameter, or cannot read the
    /// accepted message type.
    #[error(
        "handler `{handler}` parameter {index}: extractor `{extractor}` {reason} (expected `{expected}`, found `{found}`)"
    )]
    IncompatibleExtractor {
        /// Handler name.
        handler: &'static str,
        /// Parameter position.
        index: usize,
        /// Extractor name.
        extractor: &'static str,
        /// Which side of the extractor mismatched.
        reason: &'static str,
        /// Type the handler requires.
        expected: &'static str,
        /// Type the extractor declares.
        found: &'static str,
    },
    /// A parameter needs extraction but no extractor was given or the alias is unknown.
    #[error("handler `{handler}` parameter {index} of type `{param}` has no extractor{alias}")]
    MissingExtractor {
        /// Handler name.
        handler: &'static str,
        /// Parameter position.
        index: usize,
        /// Declared parameter type.
        param: &'static str,
        /// Rendered alias hint, empty when none was named.
        alias: String,
    },
    /// A call-by-message handler declared an extracted parameter.
    #[error("call-by-message handler `{handler}` cannot declare extracted parameters")]
    ExtractorOnDirectCall {
        /// Handler name.
        handler: &'static str,
    },
    /// A message type was given two different parents.
    #[error("`{child}` already extends `{existing}`, cannot also extend `{requested}`")]
    ConflictingParent {
        /// Child message type.
        child: &'static str,
        /// Parent already on record.
        existing: &'static str,
        /// Parent requested by the new declaration.
        requested: &'static str,
    },
    /// The declared ancestry loops back onto itself.
    #[error("message hierarchy cycle through `{message}`")]
    CyclicHierarchy {
        /// A type on the cycle.
        message: &'static str,
    },
}

/// Errors raised when resolving a delivered message against a dispatch table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No handler accepts the message on the channel it arrived through.
    #[error("no handler for `{message}` ({delivery} delivery)")]
    NoMatchingHandler {
        /// Static type name captured at send time.
        message: &'static str,
        /// Channel the message arrived through.
        delivery: Delivery,
    },
}

/// Failure reported by a message extractor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("extractor `{extractor}` failed: {reason}")]
pub struct ExtractionError {
    extractor: &'static str,
    reason: String,
}

impl ExtractionError {
    /// Creates an extraction error for the named extractor.
    pub fn new(extractor: &'static str, reason: impl Into<String>) -> Self {
        Self {
            extractor,
            reason: reason.into(),
        }
    }

    /// Name of the failing extractor.
    pub fn extractor(&self) -> &'static str {
        self.extractor
    }

    /// Human readable reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors returned from handler invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// A custom error message from the handler.
    #[error("actor logic error: {0}")]
    User(String),
    /// A parameter extractor failed; the handler body did not run.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// The handler asked for an argument that does not exist or has another type.
    #[error("argument {index}: {reason} (requested `{expected}`)")]
    Argument {
        /// Parameter position.
        index: usize,
        /// Requested type.
        expected: &'static str,
        /// What went wrong.
        reason: &'static str,
    },
    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panic(String),
}

impl ActorError {
    /// Creates a new user-defined error.
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }
}

/// Failures encountered while enqueueing a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The actor's mailbox is closed (actor stopped or stopping).
    #[error("mailbox closed")]
    Closed,
}

/// Errors reported when awaiting a reply from an actor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AskError {
    /// Failed to enqueue the request.
    #[error(transparent)]
    Send(#[from] SendError),
    /// The actor has no handler for the request.
    #[error(transparent)]
    Dispatch(DispatchError),
    /// The handler failed.
    #[error("actor returned error: {0}")]
    Actor(ActorError),
    /// The actor stopped with the discard policy before reaching the request.
    #[error("request discarded by actor shutdown")]
    Discarded,
    /// The handler completed without producing a reply.
    #[error("handler produced no reply")]
    NoReply,
    /// The handler replied with a value of another type.
    #[error("reply is not a `{expected}`")]
    ReplyType {
        /// Type the caller asked for.
        expected: &'static str,
    },
    /// The reply channel was dropped without an answer.
    #[error("response channel dropped")]
    ResponseDropped,
}

/// Failures encountered when starting a system or spawning an actor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// No Tokio runtime was found in the current context.
    #[error("tokio runtime handle not in scope")]
    MissingRuntime,
    /// The worker pool has been shut down.
    #[error("worker pool stopped")]
    PoolStopped,
    /// Another live actor of this system already uses the id.
    #[error("actor id `{0}` already in use")]
    DuplicateId(ActorId),
    /// The actor type failed registration.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}
