//! Resource loading
//!
//! The aggregator only depends on the [`ResourceLoader`] trait; where the
//! bytes come from is up to the implementation.

mod fs;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use fs::FsLoader;

/// Kind of resource being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// XHTML content document, reduced to its body fragment
    Html,
    /// Stylesheet, passed through as raw text
    Css,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Html => write!(f, "html"),
            ResourceKind::Css => write!(f, "css"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid resource path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Load failed: {0}")]
    Other(String),
}

/// Async source for resources missing from the content cache
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Fetch the raw text of `href`
    async fn load(&self, href: &str, kind: ResourceKind) -> Result<String, LoadError>;
}
