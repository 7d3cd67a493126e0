//! Per actor type dispatch tables and the builder actors declare handlers with.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::actor::context::Context;
use crate::actor::Actor;
use crate::dispatch::catalog::MessageCatalog;
use crate::dispatch::descriptor::{
    Arguments, HandlerDescriptor, HandlerResult, Invoke, Param, ParamSource,
};
use crate::dispatch::extractor::{ExtractorRef, MessageExtractor};
use crate::error::RegistrationError;
use crate::types::{Delivery, HandlerMode, MessageType};

enum ParamDecl {
    Message(MessageType),
    Extractor(MessageType, ExtractorRef),
    Alias(MessageType, &'static str),
}

struct Declared<A> {
    name: &'static str,
    accepted: MessageType,
    mode: HandlerMode,
    call_by_message: bool,
    inheritable: bool,
    params: Vec<ParamDecl>,
    level: usize,
    invoke: Invoke<A>,
}

/// Collects the handler declarations of one actor type.
///
/// Handlers are declared in [`Actor::handlers`]; capabilities shared by
/// several actor types are composed with [`inherit`](Self::inherit).
pub struct DispatchTableBuilder<A> {
    catalog: Arc<MessageCatalog>,
    level: usize,
    declared: Vec<Declared<A>>,
}

impl<A: 'static> DispatchTableBuilder<A> {
    pub(crate) fn new(catalog: Arc<MessageCatalog>) -> Self {
        Self {
            catalog,
            level: 0,
            declared: Vec::new(),
        }
    }

    /// Starts declaring a handler accepting `M`.
    pub fn act<M: Any + Send + Sync>(&mut self, name: &'static str) -> HandlerSpec<'_, A, M> {
        HandlerSpec {
            builder: self,
            name,
            mode: HandlerMode::Direct,
            call_by_message: false,
            inheritable: true,
            params: Vec::new(),
            _message: PhantomData,
        }
    }

    /// Composes the handlers declared by `capability` below this level.
    ///
    /// Inherited handlers rank after the handlers declared here, and a
    /// handler declared here with the same accepted type and mode overrides
    /// the inherited one.
    pub fn inherit<F>(&mut self, capability: F) -> &mut Self
    where
        F: FnOnce(&mut DispatchTableBuilder<A>),
    {
        let mut parent = DispatchTableBuilder {
            catalog: Arc::clone(&self.catalog),
            level: self.level + 1,
            declared: Vec::new(),
        };
        capability(&mut parent);
        self.declared
            .extend(parent.declared.into_iter().filter(|d| d.inheritable));
        self
    }

    /// Catalog the table resolves ancestry and aliases against.
    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }

    fn finish(self, actor: &'static str) -> Result<DispatchTable<A>, RegistrationError> {
        let mut declared = self.declared;
        declared.sort_by_key(|d| d.level);

        let mut handlers: Vec<HandlerDescriptor<A>> = Vec::with_capacity(declared.len());
        for d in declared {
            if let Some(existing) = handlers
                .iter()
                .find(|h| h.accepted == d.accepted && h.mode.overlaps(d.mode))
            {
                if existing.level < d.level && existing.mode == d.mode {
                    continue;
                }
                return Err(RegistrationError::DuplicateHandler {
                    actor,
                    message: d.accepted.name(),
                    mode: d.mode,
                    first: existing.name,
                    second: d.name,
                });
            }
            let params = resolve_params(&self.catalog, &d)?;
            let fast_path = d.call_by_message
                && params.iter().all(|p| {
                    matches!(p.source(), ParamSource::Message) && p.ty() == d.accepted
                });
            handlers.push(HandlerDescriptor {
                name: d.name,
                accepted: d.accepted,
                mode: d.mode,
                call_by_message: d.call_by_message,
                fast_path,
                params,
                level: d.level,
                invoke: d.invoke,
            });
        }

        let mut by_type: HashMap<TypeId, Vec<usize>> = HashMap::new();
        for (index, handler) in handlers.iter().enumerate() {
            by_type
                .entry(handler.accepted.id())
                .or_default()
                .push(index);
        }

        Ok(DispatchTable {
            actor,
            catalog: self.catalog,
            handlers,
            by_type,
        })
    }
}

fn resolve_params<A>(
    catalog: &MessageCatalog,
    declared: &Declared<A>,
) -> Result<Vec<Param>, RegistrationError> {
    if declared.params.is_empty() {
        return Ok(vec![Param::new(declared.accepted, ParamSource::Message)]);
    }
    let accepted = declared.accepted;
    let mut params = Vec::with_capacity(declared.params.len());
    for (index, decl) in declared.params.iter().enumerate() {
        let (ty, extractor) = match decl {
            ParamDecl::Message(ty) => {
                if !catalog.is_within(accepted.id(), ty.id()) {
                    return Err(RegistrationError::MissingExtractor {
                        handler: declared.name,
                        index,
                        param: ty.name(),
                        alias: String::new(),
                    });
                }
                params.push(Param::new(*ty, ParamSource::Message));
                continue;
            }
            ParamDecl::Extractor(ty, extractor) => (*ty, extractor.clone()),
            ParamDecl::Alias(ty, alias) => match catalog.extractor(alias) {
                Some(extractor) => (*ty, extractor.clone()),
                None => {
                    return Err(RegistrationError::MissingExtractor {
                        handler: declared.name,
                        index,
                        param: ty.name(),
                        alias: format!(" (unknown alias `{alias}`)"),
                    })
                }
            },
        };
        if declared.call_by_message {
            return Err(RegistrationError::ExtractorOnDirectCall {
                handler: declared.name,
            });
        }
        if extractor.output_type() != ty {
            return Err(RegistrationError::IncompatibleExtractor {
                handler: declared.name,
                index,
                extractor: extractor.name(),
                reason: "produces another type",
                expected: ty.name(),
                found: extractor.output_type().name(),
            });
        }
        if !catalog.is_within(accepted.id(), extractor.input_type().id()) {
            return Err(RegistrationError::IncompatibleExtractor {
                handler: declared.name,
                index,
                extractor: extractor.name(),
                reason: "cannot read the accepted message",
                expected: accepted.name(),
                found: extractor.input_type().name(),
            });
        }
        params.push(Param::new(ty, ParamSource::Extracted(extractor)));
    }
    Ok(params)
}

/// Declaration of one handler; registered once [`invoke`](Self::invoke) or
/// [`handle`](Self::handle) supplies the call target.
#[must_use = "a handler is only registered once `invoke` or `handle` is called"]
pub struct HandlerSpec<'b, A, M> {
    builder: &'b mut DispatchTableBuilder<A>,
    name: &'static str,
    mode: HandlerMode,
    call_by_message: bool,
    inheritable: bool,
    params: Vec<ParamDecl>,
    _message: PhantomData<fn() -> M>,
}

impl<'b, A: 'static, M: Any + Send + Sync> HandlerSpec<'b, A, M> {
    /// Receives bus publications only.
    pub fn subscribe(mut self) -> Self {
        self.mode = HandlerMode::Subscribe;
        self
    }

    /// Receives bus publications and direct sends.
    pub fn subscribe_and_direct(mut self) -> Self {
        self.mode = HandlerMode::Both;
        self
    }

    /// Messages of exactly type `M` skip projection and extraction.
    pub fn call_by_message(mut self) -> Self {
        self.call_by_message = true;
        self
    }

    /// Excludes the handler when its capability is composed into another type.
    pub fn not_inherited(mut self) -> Self {
        self.inheritable = false;
        self
    }

    /// Adds a parameter receiving the message viewed as `T`.
    pub fn param<T: Any>(mut self) -> Self {
        self.params.push(ParamDecl::Message(MessageType::of::<T>()));
        self
    }

    /// Adds a parameter of type `T` produced by `extractor`.
    pub fn extract_by<T: Any>(mut self, extractor: ExtractorRef) -> Self {
        self.params
            .push(ParamDecl::Extractor(MessageType::of::<T>(), extractor));
        self
    }

    /// Adds a parameter produced by a typed extractor.
    pub fn extract_with<E: MessageExtractor>(self, extractor: E) -> Self {
        self.extract_by::<E::Output>(ExtractorRef::new(extractor))
    }

    /// Adds a parameter of type `T` produced by the catalog extractor named `alias`.
    pub fn extract_as<T: Any>(mut self, alias: &'static str) -> Self {
        self.params
            .push(ParamDecl::Alias(MessageType::of::<T>(), alias));
        self
    }

    /// Registers `f` as the call target; it receives the prepared arguments.
    pub fn invoke<F>(self, f: F)
    where
        F: Fn(&mut A, &mut Arguments<'_>, &Context<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        let level = self.builder.level;
        self.builder.declared.push(Declared {
            name: self.name,
            accepted: MessageType::of::<M>(),
            mode: self.mode,
            call_by_message: self.call_by_message,
            inheritable: self.inheritable,
            params: self.params,
            level,
            invoke: Box::new(f),
        });
    }

    /// Registers `f` as the call target; it receives the message as `&M`.
    pub fn handle<F>(self, f: F)
    where
        F: Fn(&mut A, &M, &Context<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.invoke(move |actor, args, ctx| {
            let message = args.message::<M>()?;
            f(actor, message, ctx)
        });
    }
}

/// Immutable, per actor type map from message type to handlers.
///
/// Built once per actor type and shared read-only by every instance and
/// worker.
pub struct DispatchTable<A> {
    actor: &'static str,
    catalog: Arc<MessageCatalog>,
    handlers: Vec<HandlerDescriptor<A>>,
    by_type: HashMap<TypeId, Vec<usize>>,
}

impl<A: Actor> DispatchTable<A> {
    /// Runs `A::handlers` and validates the declarations.
    pub fn build(catalog: Arc<MessageCatalog>) -> Result<Self, RegistrationError> {
        let mut builder = DispatchTableBuilder::new(catalog);
        A::handlers(&mut builder);
        builder.finish(type_name::<A>())
    }
}

impl<A> DispatchTable<A> {
    /// Handler for a message of runtime type `ty` arriving through `delivery`.
    ///
    /// Ancestry is walked most specific first; at one level the first
    /// eligible handler in declaration order wins.
    pub fn resolve(&self, ty: TypeId, delivery: Delivery) -> Option<&HandlerDescriptor<A>> {
        self.catalog.ancestry(ty).find_map(|level| {
            self.by_type.get(&level).and_then(|indices| {
                indices
                    .iter()
                    .map(|&index| &self.handlers[index])
                    .find(|handler| handler.mode.accepts(delivery))
            })
        })
    }

    /// Accepted types of handlers eligible for bus publications.
    pub fn subscriptions(&self) -> impl Iterator<Item = MessageType> + '_ {
        self.handlers
            .iter()
            .filter(|handler| handler.mode.accepts(Delivery::Subscription))
            .map(|handler| handler.accepted)
    }

    /// All handlers, own declarations first.
    pub fn handlers(&self) -> &[HandlerDescriptor<A>] {
        &self.handlers
    }

    /// Actor type name.
    pub fn actor(&self) -> &'static str {
        self.actor
    }

    /// Catalog the table was built against.
    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }
}

impl<A> Debug for DispatchTable<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("actor", &self.actor)
            .field("handlers", &self.handlers)
            .finish()
    }
}
