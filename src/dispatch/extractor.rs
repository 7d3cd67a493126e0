//! Message extractors: pure transforms from a delivered message to a handler argument.

use std::any::{type_name, Any};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::error::ExtractionError;
use crate::types::MessageType;

/// Extracts a value of type `Output` from a message of type `Input`.
///
/// Implementations must be pure: the same message always yields the same
/// value or the same error.
pub trait MessageExtractor: Send + Sync + 'static {
    /// Message type the extractor reads.
    type Input: Any + Send + Sync;
    /// Value handed to the handler parameter.
    type Output: Any + Send;

    /// Name used in registration and extraction errors.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Extracts the argument.
    fn extract_from(&self, message: &Self::Input) -> Result<Self::Output, ExtractionError>;
}

trait ErasedExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn input(&self) -> MessageType;
    fn output(&self) -> MessageType;
    fn extract(
        &self,
        message: &(dyn Any + Send + Sync),
    ) -> Result<Box<dyn Any + Send>, ExtractionError>;
}

impl<E: MessageExtractor> ErasedExtractor for E {
    fn name(&self) -> &'static str {
        MessageExtractor::name(self)
    }

    fn input(&self) -> MessageType {
        MessageType::of::<E::Input>()
    }

    fn output(&self) -> MessageType {
        MessageType::of::<E::Output>()
    }

    fn extract(
        &self,
        message: &(dyn Any + Send + Sync),
    ) -> Result<Box<dyn Any + Send>, ExtractionError> {
        let input = message.downcast_ref::<E::Input>().ok_or_else(|| {
            ExtractionError::new(
                MessageExtractor::name(self),
                format!("expected a `{}`", type_name::<E::Input>()),
            )
        })?;
        let value = self.extract_from(input)?;
        Ok(Box::new(value))
    }
}

/// Shared handle to a stateless extractor with its input and output types erased.
#[derive(Clone)]
pub struct ExtractorRef(Arc<dyn ErasedExtractor>);

impl ExtractorRef {
    /// Erases `extractor`.
    pub fn new<E: MessageExtractor>(extractor: E) -> Self {
        Self(Arc::new(extractor))
    }

    /// Wraps a plain function as an extractor.
    pub fn from_fn<I, O>(name: &'static str, f: fn(&I) -> Result<O, ExtractionError>) -> Self
    where
        I: Any + Send + Sync,
        O: Any + Send,
    {
        Self::new(FnExtractor { name, f })
    }

    /// Extractor name.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Type the extractor reads.
    pub fn input_type(&self) -> MessageType {
        self.0.input()
    }

    /// Type the extractor produces.
    pub fn output_type(&self) -> MessageType {
        self.0.output()
    }

    /// Runs the extractor against a message already projected to [`input_type`](Self::input_type).
    pub fn extract_from(
        &self,
        message: &(dyn Any + Send + Sync),
    ) -> Result<Box<dyn Any + Send>, ExtractionError> {
        self.0.extract(message)
    }
}

impl Debug for ExtractorRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRef")
            .field("name", &self.name())
            .field("input", &self.input_type().name())
            .field("output", &self.output_type().name())
            .finish()
    }
}

/// Extractor backed by a function pointer.
pub struct FnExtractor<I, O> {
    name: &'static str,
    f: fn(&I) -> Result<O, ExtractionError>,
}

impl<I, O> FnExtractor<I, O> {
    /// Names `f` as an extractor.
    pub fn new(name: &'static str, f: fn(&I) -> Result<O, ExtractionError>) -> Self {
        Self { name, f }
    }
}

impl<I, O> MessageExtractor for FnExtractor<I, O>
where
    I: Any + Send + Sync,
    O: Any + Send,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &'static str {
        self.name
    }

    fn extract_from(&self, message: &I) -> Result<O, ExtractionError> {
        (self.f)(message)
    }
}

/// Shared error value carried as a failure cause.
pub type Cause = Arc<dyn Error + Send + Sync>;

/// Failure report message: a description plus an optional underlying cause.
#[derive(Debug, Clone)]
pub struct Failure {
    description: String,
    cause: Option<Cause>,
}

impl Failure {
    /// Failure without a cause.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            cause: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Failure description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Underlying cause, if any.
    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description)
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn Error + 'static))
    }
}

/// Extracts the underlying cause of a [`Failure`]. Registered in every
/// catalog under the alias `"cause"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CauseExtractor;

impl MessageExtractor for CauseExtractor {
    type Input = Failure;
    type Output = Cause;

    fn name(&self) -> &'static str {
        "cause"
    }

    fn extract_from(&self, message: &Failure) -> Result<Cause, ExtractionError> {
        message
            .cause()
            .cloned()
            .ok_or_else(|| ExtractionError::new("cause", "failure has no cause"))
    }
}
