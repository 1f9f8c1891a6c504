//! Filesystem loader for unpacked publications

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{LoadError, ResourceKind, ResourceLoader};

/// Loads resources from a directory holding an unpacked publication
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an href onto a path below the root.
    ///
    /// Hrefs are percent-decoded, lose any fragment, and may not climb out
    /// of the root.
    fn resolve(&self, href: &str) -> Result<PathBuf, LoadError> {
        let without_fragment = href.split('#').next().unwrap_or_default();
        let decoded = urlencoding::decode(without_fragment)
            .map_err(|_| LoadError::InvalidPath(href.to_string()))?;
        let relative = Path::new(decoded.trim_start_matches('/'));

        if relative.as_os_str().is_empty() {
            return Err(LoadError::InvalidPath(href.to_string()));
        }

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(LoadError::InvalidPath(href.to_string())),
            }
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ResourceLoader for FsLoader {
    async fn load(&self, href: &str, kind: ResourceKind) -> Result<String, LoadError> {
        let path = self.resolve(href)?;
        tracing::debug!("Reading {} resource from {}", kind, path.display());

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(LoadError::NotFound(href.to_string())),
            Err(e) => Err(LoadError::Io(e)),
        }
    }
}
