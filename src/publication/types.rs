//! Publication data types
//!
//! Mirrors what the manifest parser hands over for one publication.

use serde::{Deserialize, Serialize};

use super::cache::ResourceCache;

/// A resource descriptor: a logical id plus the location to fetch it from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Logical id, unique within one entry list
    pub id: String,
    /// Location, either absolute from the publication root (`/text/ch1.xhtml`)
    /// or relative (`text/ch1.xhtml`)
    pub href: String,
}

/// HTML content document in reading order
pub type SpineEntry = ResourceEntry;

/// Stylesheet referenced by the publication
pub type CssEntry = ResourceEntry;

impl ResourceEntry {
    pub fn new(id: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
        }
    }

    /// Key used to look the resource up in the content cache.
    ///
    /// Cache keys never carry a leading separator.
    pub fn cache_key(&self) -> &str {
        self.href.strip_prefix('/').unwrap_or(&self.href)
    }
}

/// Table of contents entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Id of the spine entry whose fragment this entry renders
    pub id: String,
    /// Namespace token used when rewriting ids and anchors
    pub file: String,
    /// Directory depth of the document relative to the publication root
    #[serde(default)]
    pub path: String,
    /// Original document location, e.g. `text/chapter2.xhtml`
    pub href: String,
}

impl TocEntry {
    pub fn new(
        id: impl Into<String>,
        file: impl Into<String>,
        path: impl Into<String>,
        href: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            path: path.into(),
            href: href.into(),
        }
    }

    /// Directory portion of `href`, including the trailing separator
    pub fn href_dir(&self) -> &str {
        match self.href.rfind('/') {
            Some(pos) => &self.href[..=pos],
            None => "",
        }
    }

    /// `../` once per segment of `path`
    pub fn depth_prefix(&self) -> String {
        self.path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|_| "../")
            .collect()
    }
}

/// A publication as produced by the manifest parser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Publication {
    #[serde(default)]
    pub title: Option<String>,
    /// Content documents in reading order
    #[serde(rename = "spine", default)]
    pub spine_entries: Vec<SpineEntry>,
    /// Stylesheets
    #[serde(rename = "stylesheets", default)]
    pub css_entries: Vec<CssEntry>,
    /// Table of contents in canonical document order
    #[serde(default)]
    pub toc: Vec<TocEntry>,
    /// Content already retrieved while reading the container
    #[serde(default)]
    pub content: ResourceCache,
}

impl Publication {
    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    /// Display title, falling back to "Untitled"
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }
}
