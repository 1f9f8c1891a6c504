//! Publication model
//!
//! Types handed over by the manifest parser: spine and stylesheet
//! descriptors, the table of contents, and the pre-populated content cache.
//! Also holds the per-cycle fragment map produced by aggregation.

mod cache;
mod types;

pub use cache::{FragmentMap, ResourceCache};
pub use types::{CssEntry, Publication, ResourceEntry, SpineEntry, TocEntry};
