//! Layout sinks
//!
//! The assembler pushes rewritten pages into a [`LayoutSink`] one at a time,
//! in table of contents order, then finalises it.

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

/// Receiver of assembled pages
pub trait LayoutSink {
    /// Stylesheet of the publication, offered before any page
    fn add_stylesheet(&mut self, _id: &str, _css: &str) {}

    /// Append a rewritten page
    fn add(&mut self, id: &str, file: &str, html: &str);

    /// Establish the initial viewport
    fn update(&mut self);

    /// Return to the previously saved reading position
    fn restore_bookmarks(&mut self);

    /// Compute positions; no more pages follow
    fn finalise(&mut self);
}

#[derive(Debug, Clone)]
struct PageSlot {
    id: String,
    file: String,
    html: String,
}

/// Where a page starts in the rendered body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagePosition {
    pub id: String,
    pub file: String,
    /// Byte offset of the page's section within the body markup
    pub offset: usize,
}

/// Layout producing one continuous HTML document.
///
/// Each page becomes `<section id="<file>" data-page-id="<id>">`, so a link
/// to a whole document lands on its section.
#[derive(Debug, Clone, Default)]
pub struct HtmlDocumentLayout {
    title: String,
    stylesheets: Vec<(String, String)>,
    pages: Vec<PageSlot>,
    bookmark: Option<String>,
    current_page: Option<usize>,
    positions: Vec<PagePosition>,
    finalised: bool,
}

impl HtmlDocumentLayout {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Page (by `file` token or page id) to open at once finalised
    pub fn with_bookmark(mut self, bookmark: Option<String>) -> Self {
        self.bookmark = bookmark;
        self
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Index of the page the viewport starts on
    pub fn current_page(&self) -> Option<usize> {
        self.current_page
    }

    pub fn positions(&self) -> &[PagePosition] {
        &self.positions
    }

    pub fn is_finalised(&self) -> bool {
        self.finalised
    }

    fn render_page(page: &PageSlot) -> String {
        format!(
            "<section id=\"{}\" data-page-id=\"{}\">{}</section>\n",
            encode_double_quoted_attribute(&page.file),
            encode_double_quoted_attribute(&page.id),
            page.html
        )
    }

    fn render_body(&self) -> String {
        self.pages.iter().map(Self::render_page).collect()
    }

    /// Full flattened document
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n");
        out.push_str(&format!("<title>{}</title>\n", encode_text(&self.title)));

        for (id, css) in &self.stylesheets {
            out.push_str(&format!(
                "<style data-stylesheet-id=\"{}\">\n{}\n</style>\n",
                encode_double_quoted_attribute(id),
                css
            ));
        }
        out.push_str("</head>\n");

        match self.current_page.and_then(|index| self.pages.get(index)) {
            Some(page) => out.push_str(&format!(
                "<body data-initial-page=\"{}\">\n",
                encode_double_quoted_attribute(&page.file)
            )),
            None => out.push_str("<body>\n"),
        }
        out.push_str(&self.render_body());
        out.push_str("</body>\n</html>\n");
        out
    }
}

impl LayoutSink for HtmlDocumentLayout {
    fn add_stylesheet(&mut self, id: &str, css: &str) {
        self.stylesheets.push((id.to_string(), css.to_string()));
    }

    fn add(&mut self, id: &str, file: &str, html: &str) {
        self.pages.push(PageSlot {
            id: id.to_string(),
            file: file.to_string(),
            html: html.to_string(),
        });
    }

    fn update(&mut self) {
        self.current_page = if self.pages.is_empty() { None } else { Some(0) };
    }

    fn restore_bookmarks(&mut self) {
        let Some(bookmark) = self.bookmark.as_deref() else {
            return;
        };

        match self
            .pages
            .iter()
            .position(|p| p.file == bookmark || p.id == bookmark)
        {
            Some(index) => {
                tracing::debug!("Restored bookmark {} at page {}", bookmark, index);
                self.current_page = Some(index);
            }
            None => tracing::debug!("Bookmark {} matches no page, staying at start", bookmark),
        }
    }

    fn finalise(&mut self) {
        let mut offset = 0;
        self.positions = self
            .pages
            .iter()
            .map(|page| {
                let position = PagePosition {
                    id: page.id.clone(),
                    file: page.file.clone(),
                    offset,
                };
                offset += Self::render_page(page).len();
                position
            })
            .collect();
        self.finalised = true;
    }
}
