//! Immutable handler metadata and positional handler arguments.

use std::any::{type_name, Any};
use std::fmt::{Debug, Formatter};

use crate::actor::context::Context;
use crate::dispatch::catalog::MessageCatalog;
use crate::dispatch::extractor::ExtractorRef;
use crate::error::{ActorError, ActorResult};
use crate::types::{HandlerMode, MessageType, Reply};

/// Result returned by handler trampolines.
pub type HandlerResult = ActorResult<Reply>;

pub(crate) type Invoke<A> =
    Box<dyn Fn(&mut A, &mut Arguments<'_>, &Context<'_>) -> HandlerResult + Send + Sync>;

/// Source of one handler parameter, after registration resolved it.
#[derive(Clone, Debug)]
pub enum ParamSource {
    /// The delivered message viewed as the parameter type.
    Message,
    /// The value produced by an extractor.
    Extracted(ExtractorRef),
}

/// One resolved handler parameter.
#[derive(Clone, Debug)]
pub struct Param {
    ty: MessageType,
    source: ParamSource,
}

impl Param {
    pub(crate) fn new(ty: MessageType, source: ParamSource) -> Self {
        Self { ty, source }
    }

    /// Declared parameter type.
    pub fn ty(&self) -> MessageType {
        self.ty
    }

    /// Where the value comes from.
    pub fn source(&self) -> &ParamSource {
        &self.source
    }
}

/// Metadata and call target of one registered handler.
pub struct HandlerDescriptor<A> {
    pub(crate) name: &'static str,
    pub(crate) accepted: MessageType,
    pub(crate) mode: HandlerMode,
    pub(crate) call_by_message: bool,
    pub(crate) fast_path: bool,
    pub(crate) params: Vec<Param>,
    pub(crate) level: usize,
    pub(crate) invoke: Invoke<A>,
}

impl<A> HandlerDescriptor<A> {
    /// Handler name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Message type the handler accepts.
    pub fn accepted(&self) -> MessageType {
        self.accepted
    }

    /// Channels the handler is eligible for.
    pub fn mode(&self) -> HandlerMode {
        self.mode
    }

    /// Returns true if the handler also receives bus publications.
    pub fn subscribes(&self) -> bool {
        !matches!(self.mode, HandlerMode::Direct)
    }

    /// Returns true if exact-type messages bypass projection and extraction.
    pub fn is_call_by_message(&self) -> bool {
        self.call_by_message
    }

    /// Ordered parameter list.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Composition depth the handler was declared at (0 for the actor itself).
    pub fn level(&self) -> usize {
        self.level
    }

    /// Builds the argument list for `message` and calls the handler.
    pub(crate) fn call(
        &self,
        actor: &mut A,
        message: &(dyn Any + Send + Sync),
        catalog: &MessageCatalog,
        ctx: &Context<'_>,
    ) -> HandlerResult {
        if self.fast_path && message.type_id() == self.accepted.id() {
            let mut args = Arguments::direct(message, self.params.len());
            return (self.invoke)(actor, &mut args, ctx);
        }

        let accepted = catalog
            .project(message, self.accepted.id())
            .ok_or(ActorError::Argument {
                index: 0,
                expected: self.accepted.name(),
                reason: "message does not extend the accepted type",
            })?;
        let mut slots = Vec::with_capacity(self.params.len());
        for (index, param) in self.params.iter().enumerate() {
            let slot = match &param.source {
                ParamSource::Message => {
                    let view = catalog.project(message, param.ty.id()).ok_or(
                        ActorError::Argument {
                            index,
                            expected: param.ty.name(),
                            reason: "message does not extend the parameter type",
                        },
                    )?;
                    Slot::Message(view)
                }
                ParamSource::Extracted(extractor) => {
                    let input = catalog
                        .project(message, extractor.input_type().id())
                        .ok_or(ActorError::Argument {
                            index,
                            expected: extractor.input_type().name(),
                            reason: "message does not extend the extractor input",
                        })?;
                    Slot::Value(Some(extractor.extract_from(input)?))
                }
            };
            slots.push(slot);
        }
        let mut args = Arguments {
            message: accepted,
            slots,
        };
        (self.invoke)(actor, &mut args, ctx)
    }
}

impl<A> Debug for HandlerDescriptor<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("accepted", &self.accepted.name())
            .field("mode", &self.mode)
            .field("call_by_message", &self.call_by_message)
            .field("params", &self.params)
            .field("level", &self.level)
            .finish()
    }
}

enum Slot<'a> {
    Message(&'a (dyn Any + Send + Sync)),
    Value(Option<Box<dyn Any + Send>>),
}

/// Positional arguments prepared for one handler call.
pub struct Arguments<'a> {
    message: &'a (dyn Any + Send + Sync),
    slots: Vec<Slot<'a>>,
}

impl<'a> Arguments<'a> {
    fn direct(message: &'a (dyn Any + Send + Sync), params: usize) -> Self {
        Self {
            message,
            slots: (0..params).map(|_| Slot::Message(message)).collect(),
        }
    }

    /// The delivered message viewed as the handler's accepted type.
    pub fn message<T: Any>(&self) -> ActorResult<&'a T> {
        let message: &'a (dyn Any + Send + Sync) = self.message;
        message.downcast_ref::<T>().ok_or(ActorError::Argument {
            index: 0,
            expected: type_name::<T>(),
            reason: "not the accepted message type",
        })
    }

    /// Borrows parameter `index`.
    pub fn get<T: Any>(&self, index: usize) -> ActorResult<&T> {
        let missing = |reason| ActorError::Argument {
            index,
            expected: type_name::<T>(),
            reason,
        };
        match self.slots.get(index) {
            Some(Slot::Message(view)) => view
                .downcast_ref::<T>()
                .ok_or_else(|| missing("type mismatch")),
            Some(Slot::Value(Some(value))) => value
                .downcast_ref::<T>()
                .ok_or_else(|| missing("type mismatch")),
            Some(Slot::Value(None)) => Err(missing("already taken")),
            None => Err(missing("no such parameter")),
        }
    }

    /// Moves an extracted parameter out of the argument list.
    pub fn take<T: Any>(&mut self, index: usize) -> ActorResult<T> {
        let missing = |reason| ActorError::Argument {
            index,
            expected: type_name::<T>(),
            reason,
        };
        match self.slots.get_mut(index) {
            Some(Slot::Value(slot)) => {
                let value = slot.take().ok_or_else(|| missing("already taken"))?;
                match value.downcast::<T>() {
                    Ok(value) => Ok(*value),
                    Err(value) => {
                        *slot = Some(value);
                        Err(missing("type mismatch"))
                    }
                }
            }
            Some(Slot::Message(_)) => Err(missing("message parameters can only be borrowed")),
            None => Err(missing("no such parameter")),
        }
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the handler declared no parameters.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
