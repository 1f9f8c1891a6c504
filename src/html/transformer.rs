//! Fragment rewriting for flattened publications
//!
//! Once every content document lives in one tree, ids can collide and
//! relative references stop resolving. A fragment is rewritten once, in a
//! single lol_html pass:
//!
//! 1. `src`/`poster` values are re-rooted against the document location
//! 2. internal links are retargeted to flattened anchors
//! 3. ids are namespaced with the entry's `file` token
//!
//! Link retargeting and id namespacing share the `<file>_<id>` convention,
//! so a link rewritten in one fragment resolves to an id rewritten in
//! another.

use lol_html::{element, rewrite_str, RewriteStrSettings};
use thiserror::Error;

use crate::publication::TocEntry;

/// Elements whose `href` is retargeted
const LINK_ELEMENTS: [&str; 2] = ["a", "area"];

/// Result of rewriting one fragment
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Rewritten markup
    pub html: String,
    /// Ids defined by the fragment, after namespacing
    pub ids: Vec<String>,
    /// Anchors targeted by retargeted links, without the leading `#`
    pub link_targets: Vec<String>,
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),

    #[error("fragment contains no element")]
    MalformedFragment,
}

/// Rewrite a fragment for its position in the flattened publication
pub fn transform(fragment: &str, entry: &TocEntry) -> Result<TransformOutput, TransformError> {
    let media_prefix = format!("{}{}", entry.depth_prefix(), entry.href_dir());
    let file = entry.file.as_str();

    let mut element_count = 0usize;
    let mut ids = Vec::new();
    let mut link_targets = Vec::new();

    let html = rewrite_str(
        fragment,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("*", |_el| {
                    element_count += 1;
                    Ok(())
                }),
                // Media paths
                element!("[src]", |el| {
                    if let Some(src) = el.get_attribute("src") {
                        if let Some(corrected) = correct_media_path(&src, &media_prefix) {
                            el.set_attribute("src", &corrected)?;
                        }
                    }
                    Ok(())
                }),
                element!("[poster]", |el| {
                    if let Some(poster) = el.get_attribute("poster") {
                        if let Some(corrected) = correct_media_path(&poster, &media_prefix) {
                            el.set_attribute("poster", &corrected)?;
                        }
                    }
                    Ok(())
                }),
                // Internal links
                element!("[href]", |el| {
                    if !LINK_ELEMENTS.contains(&el.tag_name().as_str()) {
                        return Ok(());
                    }
                    if has_external_rel(el.get_attribute("rel").as_deref()) {
                        return Ok(());
                    }
                    let Some(href) = el.get_attribute("href") else {
                        return Ok(());
                    };
                    if !is_internal_reference(&href) {
                        return Ok(());
                    }

                    let target = retarget_link(&href, file);
                    el.set_attribute("href", &format!("#{}", target))?;
                    link_targets.push(target);
                    Ok(())
                }),
                // Ids
                element!("[id]", |el| {
                    if let Some(id) = el.get_attribute("id") {
                        let namespaced = namespace_id(file, &id);
                        el.set_attribute("id", &namespaced)?;
                        ids.push(namespaced);
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| TransformError::Rewrite(e.to_string()))?;

    if element_count == 0 {
        return Err(TransformError::MalformedFragment);
    }

    Ok(TransformOutput {
        html,
        ids,
        link_targets,
    })
}

/// `<file>_<id>`
pub fn namespace_id(file: &str, id: &str) -> String {
    format!("{}_{}", file, id)
}

/// Replace every path separator and fragment marker with `_`.
///
/// `text/chapter2.xhtml#milestone1` becomes `text_chapter2.xhtml_milestone1`.
pub fn flatten_reference(href: &str) -> String {
    href.replace(['/', '#'], "_")
}

/// Flattened anchor (without `#`) for an internal link found in `file`
pub fn retarget_link(href: &str, file: &str) -> String {
    match href.strip_prefix('#') {
        Some(name) => namespace_id(file, name),
        None => flatten_reference(href),
    }
}

/// Whether a reference stays inside the publication.
///
/// Anything carrying a URI scheme (`http:`, `mailto:`, `data:`) or starting
/// with `//` leaves it.
pub fn is_internal_reference(href: &str) -> bool {
    let href = href.trim();
    !href.is_empty() && !href.starts_with("//") && !has_scheme(href)
}

fn has_scheme(href: &str) -> bool {
    let Some(colon) = href.find(':') else {
        return false;
    };
    let scheme = &href[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

fn has_external_rel(rel: Option<&str>) -> bool {
    rel.map(|rel| rel.split_whitespace().any(|token| token.eq_ignore_ascii_case("external")))
        .unwrap_or(false)
}

/// New value for a relative media reference, `None` when it stays as is
fn correct_media_path(value: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() || !is_internal_reference(value) || value.starts_with('/') {
        return None;
    }
    Some(format!("{}{}", prefix, value))
}
