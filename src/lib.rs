//! Los Libros Assembler
//!
//! Flattens a multi-document publication (content documents, stylesheets
//! and a table of contents) into one continuous document tree.
//!
//! # Modules
//!
//! - `aggregate`: concurrent resolution of spine and stylesheet resources
//! - `html`: body extraction and fragment rewriting
//! - `assembler`: load cycle orchestration and layout sinks
//! - `events`: typed lifecycle notifications

pub mod aggregate;
pub mod assembler;
pub mod config;
pub mod error;
pub mod events;
pub mod html;
pub mod loader;
pub mod publication;

#[cfg(test)]
mod testing;

pub use aggregate::{AggregateError, ResourceAggregator};
pub use assembler::{
    AssemblyReport, HtmlDocumentLayout, LayoutSink, LoadedPublication, PublicationAssembler,
    UnresolvedReference,
};
pub use config::{AssemblerConfig, Config};
pub use error::{AssemblyError, Result};
pub use events::{EventBus, PublicationEvent, Subscription};
pub use loader::{FsLoader, LoadError, ResourceKind, ResourceLoader};
pub use publication::{
    CssEntry, FragmentMap, Publication, ResourceCache, ResourceEntry, SpineEntry, TocEntry,
};
