//! HTML processing module
//!
//! Provides the HTML manipulation needed to merge content documents:
//! - Body fragment extraction
//! - Media path correction
//! - Internal link retargeting and id namespacing
//!
//! Uses roxmltree for extraction and lol_html for streaming rewrites.

mod extract;
mod transformer;

pub use extract::{extract_fragment, wrap_fragment, ExtractError};
pub use transformer::{
    flatten_reference, is_internal_reference, namespace_id, retarget_link, transform,
    TransformError, TransformOutput,
};
