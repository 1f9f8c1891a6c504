//! Error types for publication assembly

use thiserror::Error;

use crate::aggregate::AggregateError;
use crate::html::TransformError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AssemblyError>;

/// Why a load cycle failed
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// A resource could not be resolved; nothing was handed to the layout
    #[error("Resource aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),

    /// A TOC entry points at a spine id with no resolved fragment
    #[error("No fragment for TOC entry '{toc_id}'")]
    MissingFragment { toc_id: String },

    /// Rewriting a fragment failed; earlier pages stay as they were added
    #[error("Failed to transform TOC entry '{toc_id}': {source}")]
    Transform {
        toc_id: String,
        #[source]
        source: TransformError,
    },
}

impl AssemblyError {
    /// TOC entry the failure is attributed to, if any
    pub fn toc_id(&self) -> Option<&str> {
        match self {
            AssemblyError::MissingFragment { toc_id } | AssemblyError::Transform { toc_id, .. } => {
                Some(toc_id.as_str())
            }
            AssemblyError::Aggregate(_) => None,
        }
    }
}
