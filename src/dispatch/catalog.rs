//! Message ancestry and named extractor aliases.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::dispatch::extractor::{CauseExtractor, ExtractorRef, MessageExtractor};
use crate::error::RegistrationError;
use crate::types::MessageType;

/// Declares that a message type is composed over a parent message type.
///
/// Handlers accepting the parent also receive the child; they observe it
/// through [`Extends::parent`].
///
/// ```
/// use tokio_actor_dispatch::dispatch::Extends;
///
/// struct Failure { code: u32 }
/// struct IoFailure { base: Failure, path: String }
///
/// impl Extends<Failure> for IoFailure {
///     fn parent(&self) -> &Failure {
///         &self.base
///     }
/// }
/// ```
pub trait Extends<P>: Any + Send + Sync {
    /// Borrowed view of the parent part.
    fn parent(&self) -> &P;
}

type Upcast = fn(&(dyn Any + Send + Sync)) -> Option<&(dyn Any + Send + Sync)>;

fn upcast<C, P>(message: &(dyn Any + Send + Sync)) -> Option<&(dyn Any + Send + Sync)>
where
    C: Extends<P>,
    P: Any + Send + Sync,
{
    message
        .downcast_ref::<C>()
        .map(|child| child.parent() as &(dyn Any + Send + Sync))
}

#[derive(Clone, Copy)]
struct Link {
    parent: MessageType,
    upcast: Upcast,
}

/// Immutable registry of message ancestry and extractor aliases shared by
/// every dispatch table of a system.
#[derive(Clone)]
pub struct MessageCatalog {
    names: HashMap<TypeId, MessageType>,
    parents: HashMap<TypeId, Link>,
    extractors: HashMap<&'static str, ExtractorRef>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        let mut extractors = HashMap::new();
        extractors.insert("cause", ExtractorRef::new(CauseExtractor));
        Self {
            names: HashMap::new(),
            parents: HashMap::new(),
            extractors,
        }
    }
}

impl std::fmt::Debug for MessageCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCatalog")
            .field("links", &self.parents.len())
            .field("extractors", &self.extractors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MessageCatalog {
    /// Starts a catalog with the built-in `"cause"` alias.
    pub fn builder() -> MessageCatalogBuilder {
        MessageCatalogBuilder {
            catalog: MessageCatalog::default(),
            error: None,
        }
    }

    /// Yields `ty` followed by its ancestors, most specific first.
    pub fn ancestry(&self, ty: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        std::iter::successors(Some(ty), move |current| {
            self.parents.get(current).map(|link| link.parent.id())
        })
    }

    /// Returns true if `ancestor` is `ty` or one of its ancestors.
    pub fn is_within(&self, ty: TypeId, ancestor: TypeId) -> bool {
        self.ancestry(ty).any(|level| level == ancestor)
    }

    /// Name of a type the catalog knows about.
    pub fn name_of(&self, ty: TypeId) -> Option<&'static str> {
        self.names.get(&ty).map(MessageType::name)
    }

    /// Views `message` as `target` by walking the upcast chain.
    pub fn project<'m>(
        &self,
        message: &'m (dyn Any + Send + Sync),
        target: TypeId,
    ) -> Option<&'m (dyn Any + Send + Sync)> {
        let mut current = message;
        loop {
            let ty = current.type_id();
            if ty == target {
                return Some(current);
            }
            let link = self.parents.get(&ty)?;
            current = (link.upcast)(current)?;
        }
    }

    /// Extractor registered under `alias`.
    pub fn extractor(&self, alias: &str) -> Option<&ExtractorRef> {
        self.extractors.get(alias)
    }
}

/// Builder for [`MessageCatalog`]. The first declaration error is kept and
/// returned from [`build`](Self::build).
#[must_use]
pub struct MessageCatalogBuilder {
    catalog: MessageCatalog,
    error: Option<RegistrationError>,
}

impl MessageCatalogBuilder {
    /// Declares `C` as a child of `P`.
    pub fn extends<C, P>(mut self) -> Self
    where
        C: Extends<P>,
        P: Any + Send + Sync,
    {
        if self.error.is_some() {
            return self;
        }
        let child = MessageType::of::<C>();
        let parent = MessageType::of::<P>();
        if let Some(existing) = self.catalog.parents.get(&child.id()) {
            if existing.parent != parent {
                self.error = Some(RegistrationError::ConflictingParent {
                    child: child.name(),
                    existing: existing.parent.name(),
                    requested: parent.name(),
                });
            }
            return self;
        }
        if child == parent || self.catalog.is_within(parent.id(), child.id()) {
            self.error = Some(RegistrationError::CyclicHierarchy {
                message: child.name(),
            });
            return self;
        }
        self.catalog.names.insert(child.id(), child);
        self.catalog.names.insert(parent.id(), parent);
        self.catalog.parents.insert(
            child.id(),
            Link {
                parent,
                upcast: upcast::<C, P>,
            },
        );
        self
    }

    /// Registers `extractor` under `alias`, replacing an earlier registration.
    pub fn extractor<E: MessageExtractor>(self, alias: &'static str, extractor: E) -> Self {
        self.extractor_ref(alias, ExtractorRef::new(extractor))
    }

    /// Registers an already erased extractor under `alias`.
    pub fn extractor_ref(mut self, alias: &'static str, extractor: ExtractorRef) -> Self {
        self.catalog.extractors.insert(alias, extractor);
        self
    }

    /// Finishes the catalog.
    pub fn build(self) -> Result<MessageCatalog, RegistrationError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.catalog),
        }
    }
}
