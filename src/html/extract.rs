//! Body fragment extraction
//!
//! Content documents are merged into one tree, so only the body content is
//! kept. The cache-hit path and the loader path both go through
//! [`extract_fragment`], which keeps their output byte-identical.

use roxmltree::{Document, Node, ParsingOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("XHTML parse error: {0}")]
    Parse(String),

    #[error("document has no body element")]
    MissingBody,

    #[error("document body has no element child")]
    EmptyBody,
}

/// Reduce a content document to its body fragment.
///
/// For a full document, the first element child of `body` is located and
/// its inner markup returned. Anything that is not a full document is
/// assumed to be stripped already and returned unchanged.
pub fn extract_fragment(raw: &str) -> Result<String, ExtractError> {
    if !is_full_document(raw) {
        return Ok(raw.to_string());
    }

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(raw, options)
        .map_err(|e| ExtractError::Parse(e.to_string()))?;

    let body = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "body")
        .ok_or(ExtractError::MissingBody)?;

    let first = body
        .children()
        .find(Node::is_element)
        .ok_or(ExtractError::EmptyBody)?;

    Ok(inner_markup(raw, first).to_string())
}

/// Wrap a fragment in a synthetic container so it has exactly one root
pub fn wrap_fragment(fragment: &str) -> String {
    format!("<div>{}</div>", fragment)
}

fn is_full_document(raw: &str) -> bool {
    raw.to_ascii_lowercase().contains("<html")
}

/// Source text between an element's start and end tags
fn inner_markup<'a>(raw: &'a str, node: Node<'_, '_>) -> &'a str {
    match (node.first_child(), node.last_child()) {
        (Some(first), Some(last)) => &raw[first.range().start..last.range().end],
        _ => "",
    }
}
