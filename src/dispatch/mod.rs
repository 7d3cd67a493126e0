//! Handler registration and message dispatch.
//!
//! An actor type declares its handlers once through a
//! [`DispatchTableBuilder`]. The resulting [`DispatchTable`] maps a message's
//! runtime type, walked through the [`MessageCatalog`] ancestry, to exactly
//! one [`HandlerDescriptor`] per delivery channel. Descriptors prepare their
//! positional [`Arguments`] with [`MessageExtractor`]s before calling the
//! registered closure.

/// Message ancestry and extractor aliases.
pub mod catalog;
/// Handler metadata and arguments.
pub mod descriptor;
/// Message extractors.
pub mod extractor;
/// Dispatch tables and their builder.
pub mod table;

pub use catalog::{Extends, MessageCatalog, MessageCatalogBuilder};
pub use descriptor::{Arguments, HandlerDescriptor, HandlerResult, Param, ParamSource};
pub use extractor::{Cause, CauseExtractor, ExtractorRef, Failure, FnExtractor, MessageExtractor};
pub use table::{DispatchTable, DispatchTableBuilder, HandlerSpec};
