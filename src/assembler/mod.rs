//! Publication assembly
//!
//! Drives one load cycle: resolves the HTML and CSS fragments, waits for
//! both joins, then rewrites and hands pages to the layout in table of
//! contents order.

mod layout;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate::ResourceAggregator;
use crate::config::AssemblerConfig;
use crate::error::{AssemblyError, Result};
use crate::events::{EventBus, PublicationEvent};
use crate::html::transform;
use crate::loader::{ResourceKind, ResourceLoader};
use crate::publication::{FragmentMap, Publication};

pub use layout::{HtmlDocumentLayout, LayoutSink, PagePosition};

/// Internal link whose target exists nowhere in the flattened document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    /// TOC entry containing the link
    pub toc_id: String,
    /// Flattened anchor the link points at
    pub target: String,
}

/// Summary of a completed assembly pass
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub cycle_id: Uuid,
    /// TOC ids in the order they were handed to the layout
    pub pages: Vec<String>,
    pub stylesheets: usize,
    pub unresolved_references: Vec<UnresolvedReference>,
    pub completed_at: DateTime<Utc>,
}

/// A publication whose pages all reached the layout
#[derive(Debug)]
pub struct LoadedPublication<'p, L> {
    pub publication: &'p Publication,
    pub layout: L,
    pub report: AssemblyReport,
}

/// State owned by one load cycle
struct LoadCycle<'p> {
    id: Uuid,
    publication: &'p Publication,
}

impl<'p> LoadCycle<'p> {
    fn new(publication: &'p Publication) -> Self {
        Self {
            id: Uuid::new_v4(),
            publication,
        }
    }
}

/// Assembles publications into a layout. Holds no state between cycles.
#[derive(Debug, Clone, Default)]
pub struct PublicationAssembler {
    config: AssemblerConfig,
    events: EventBus,
}

impl PublicationAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            events: EventBus::default(),
        }
    }

    /// Publish lifecycle events on an existing bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run a full load cycle: aggregate, then assemble into `layout`
    pub async fn load<'p, L: LayoutSink>(
        &self,
        publication: &'p Publication,
        loader: &dyn ResourceLoader,
        layout: L,
    ) -> Result<LoadedPublication<'p, L>> {
        let cycle = LoadCycle::new(publication);
        let span = tracing::info_span!(
            "load_cycle",
            cycle_id = %cycle.id,
            title = publication.display_title()
        );

        self.run_cycle(cycle, loader, layout).instrument(span).await
    }

    async fn run_cycle<'p, L: LayoutSink>(
        &self,
        cycle: LoadCycle<'p>,
        loader: &dyn ResourceLoader,
        mut layout: L,
    ) -> Result<LoadedPublication<'p, L>> {
        let publication = cycle.publication;
        tracing::info!(
            "Loading publication: {} pages, {} stylesheets",
            publication.toc().len(),
            publication.css_entries.len()
        );
        self.events.publish(PublicationEvent::LoadStarted {
            cycle_id: cycle.id,
            title: publication.display_title().to_string(),
        });

        let timeout = self.config.fetch_timeout();
        let html = ResourceAggregator::new(ResourceKind::Html, &publication.content, loader)
            .with_timeout(timeout);
        let css = ResourceAggregator::new(ResourceKind::Css, &publication.content, loader)
            .with_timeout(timeout);

        let (pages, stylesheets) = tokio::try_join!(
            html.aggregate(&publication.spine_entries),
            css.aggregate(&publication.css_entries)
        )
        .map_err(|e| self.fail(&cycle, AssemblyError::from(e)))?;

        self.events.publish(PublicationEvent::ResourcesResolved {
            cycle_id: cycle.id,
            pages: pages.len(),
            stylesheets: stylesheets.len(),
        });

        let report = self
            .assemble_cycle(&cycle, pages, stylesheets, &mut layout)
            .map_err(|e| self.fail(&cycle, e))?;

        Ok(LoadedPublication {
            publication,
            layout,
            report,
        })
    }

    /// Run a load cycle, reporting through callbacks instead of a result.
    ///
    /// Exactly one of `on_complete` and `on_failure` is invoked.
    pub async fn load_with_callbacks<L, C, F>(
        &self,
        publication: &Publication,
        loader: &dyn ResourceLoader,
        layout: L,
        on_complete: C,
        on_failure: F,
    ) where
        L: LayoutSink,
        C: FnOnce(&Publication, L),
        F: FnOnce(&AssemblyError),
    {
        match self.load(publication, loader, layout).await {
            Ok(loaded) => on_complete(loaded.publication, loaded.layout),
            Err(e) => on_failure(&e),
        }
    }

    /// Assemble already resolved fragments into `layout`.
    ///
    /// `html_fragments` must hold a fragment for every TOC id; pages are
    /// added in TOC order and stylesheets in the publication's stylesheet
    /// order.
    pub fn assemble<L: LayoutSink>(
        &self,
        publication: &Publication,
        html_fragments: FragmentMap,
        css_fragments: FragmentMap,
        layout: &mut L,
    ) -> Result<AssemblyReport> {
        let cycle = LoadCycle::new(publication);
        self.assemble_cycle(&cycle, html_fragments, css_fragments, layout)
    }

    fn assemble_cycle<L: LayoutSink>(
        &self,
        cycle: &LoadCycle<'_>,
        html_fragments: FragmentMap,
        css_fragments: FragmentMap,
        layout: &mut L,
    ) -> Result<AssemblyReport> {
        let publication = cycle.publication;
        let toc = publication.toc();

        // Nothing reaches the layout unless every page can be rendered
        if let Some(missing) = toc.iter().find(|entry| !html_fragments.contains(&entry.id)) {
            return Err(AssemblyError::MissingFragment {
                toc_id: missing.id.clone(),
            });
        }

        let mut stylesheets = 0;
        for entry in &publication.css_entries {
            if let Some(css) = css_fragments.get(&entry.id) {
                layout.add_stylesheet(&entry.id, css);
                stylesheets += 1;
            }
        }

        let mut anchors: HashSet<String> = HashSet::new();
        let mut references: Vec<UnresolvedReference> = Vec::new();
        let mut pages = Vec::with_capacity(toc.len());

        for entry in toc {
            let fragment = html_fragments
                .get(&entry.id)
                .ok_or_else(|| AssemblyError::MissingFragment {
                    toc_id: entry.id.clone(),
                })?;

            let output = transform(fragment, entry).map_err(|source| AssemblyError::Transform {
                toc_id: entry.id.clone(),
                source,
            })?;

            layout.add(&entry.id, &entry.file, &output.html);
            tracing::debug!("Added page {} ({})", entry.id, entry.file);
            self.events.publish(PublicationEvent::PageAdded {
                cycle_id: cycle.id,
                id: entry.id.clone(),
                file: entry.file.clone(),
            });

            anchors.insert(entry.file.clone());
            anchors.extend(output.ids);
            references.extend(output.link_targets.into_iter().map(|target| UnresolvedReference {
                toc_id: entry.id.clone(),
                target,
            }));
            pages.push(entry.id.clone());
        }

        let unresolved: Vec<UnresolvedReference> = references
            .into_iter()
            .filter(|reference| !anchors.contains(&reference.target))
            .collect();
        for reference in &unresolved {
            tracing::warn!(
                "Unresolved internal reference #{} in {}",
                reference.target,
                reference.toc_id
            );
        }

        layout.update();
        layout.restore_bookmarks();
        layout.finalise();

        self.events.publish(PublicationEvent::PublicationLoaded {
            cycle_id: cycle.id,
            pages: pages.len(),
        });
        tracing::info!(
            "Publication assembled: {} pages, {} stylesheets, {} unresolved references",
            pages.len(),
            stylesheets,
            unresolved.len()
        );

        Ok(AssemblyReport {
            cycle_id: cycle.id,
            pages,
            stylesheets,
            unresolved_references: unresolved,
            completed_at: Utc::now(),
        })
    }

    fn fail(&self, cycle: &LoadCycle<'_>, error: AssemblyError) -> AssemblyError {
        tracing::error!("Load cycle failed: {}", error);
        self.events.publish(PublicationEvent::LoadFailed {
            cycle_id: cycle.id,
            reason: error.to_string(),
        });
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateError;
    use crate::publication::{CssEntry, SpineEntry, TocEntry};
    use crate::testing::{LayoutCall, RecordingLayout, StaticLoader};
    use std::collections::HashMap;
    use std::task::Poll;
    use std::time::Duration;

    fn chapter(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?><html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>t</title></head><body><section>{}</section></body></html>",
            body
        )
    }

    fn publication(chapters: &[&str]) -> Publication {
        Publication {
            title: Some("Sample".to_string()),
            spine_entries: chapters
                .iter()
                .map(|c| SpineEntry::new(*c, format!("text/{}.xhtml", c)))
                .collect(),
            css_entries: vec![CssEntry::new("main", "css/main.css")],
            toc: chapters
                .iter()
                .map(|c| TocEntry::new(*c, *c, "", format!("text/{}.xhtml", c)))
                .collect(),
            ..Publication::default()
        }
    }

    /// Load ch1..ch3, letting the chapter fetches finish in `release`
    /// order. Returns the fetch completion order and the layout order.
    async fn load_with_completion_order(release: &[&str]) -> (Vec<String>, Vec<String>) {
        let chapters = ["ch1", "ch2", "ch3"];
        let publication = publication(&chapters);
        let mut loader = StaticLoader::new().with_document("css/main.css", "p {}");
        let mut gates = HashMap::new();
        for id in chapters {
            let href = format!("text/{}.xhtml", id);
            loader = loader.with_document(&href, &chapter(&format!("<p>{}</p>", id)));
            gates.insert(id, loader.with_gate(&href));
        }
        let layout = RecordingLayout::default();
        let assembler = PublicationAssembler::default();

        let load = assembler.load(&publication, &loader, layout.clone());
        tokio::pin!(load);
        assert!(futures::poll!(&mut load).is_pending());

        let mut finished = None;
        for id in release {
            assert!(finished.is_none(), "load finished before every fetch resolved");
            gates[id].notify_one();
            if let Poll::Ready(result) = futures::poll!(&mut load) {
                finished = Some(result);
            }
        }

        let loaded = finished
            .expect("load still pending after every fetch resolved")
            .unwrap();
        assert_eq!(loaded.report.pages, vec!["ch1", "ch2", "ch3"]);

        let fetch_order = loader
            .completion_order()
            .into_iter()
            .filter(|href| href.ends_with(".xhtml"))
            .collect();
        (fetch_order, layout.added_ids())
    }

    #[tokio::test]
    async fn test_pages_follow_toc_order_when_fetches_finish_reversed() {
        let (fetch_order, added) = load_with_completion_order(&["ch3", "ch2", "ch1"]).await;

        assert_eq!(fetch_order, vec!["text/ch3.xhtml", "text/ch2.xhtml", "text/ch1.xhtml"]);
        assert_eq!(added, vec!["ch1", "ch2", "ch3"]);
    }

    #[tokio::test]
    async fn test_pages_follow_toc_order_when_fetches_finish_shuffled() {
        let (fetch_order, added) = load_with_completion_order(&["ch2", "ch3", "ch1"]).await;

        assert_eq!(fetch_order, vec!["text/ch2.xhtml", "text/ch3.xhtml", "text/ch1.xhtml"]);
        assert_eq!(added, vec!["ch1", "ch2", "ch3"]);
    }

    #[tokio::test]
    async fn test_pages_follow_toc_order_when_fetches_finish_in_order() {
        let (fetch_order, added) = load_with_completion_order(&["ch1", "ch3", "ch2"]).await;

        assert_eq!(fetch_order, vec!["text/ch1.xhtml", "text/ch3.xhtml", "text/ch2.xhtml"]);
        assert_eq!(added, vec!["ch1", "ch2", "ch3"]);
    }

    #[tokio::test]
    async fn test_assembly_waits_for_both_joins() {
        let publication = publication(&["ch1"]);
        let mut loader = StaticLoader::new()
            .with_document("text/ch1.xhtml", &chapter("<p>one</p>"))
            .with_document("css/main.css", "p {}");
        let css_gate = loader.with_gate("css/main.css");
        let layout = RecordingLayout::default();
        let assembler = PublicationAssembler::default();

        let load = assembler.load(&publication, &loader, layout.clone());
        tokio::pin!(load);

        let pending = tokio::time::timeout(Duration::from_millis(50), &mut load).await;
        assert!(pending.is_err(), "assembly finished before the stylesheet resolved");
        assert!(layout.calls().is_empty());

        css_gate.notify_one();
        let loaded = load.await.unwrap();

        assert_eq!(loaded.report.stylesheets, 1);
        assert_eq!(layout.added_ids(), vec!["ch1"]);
    }

    #[tokio::test]
    async fn test_layout_call_sequence() {
        let publication = publication(&["ch1", "ch2"]);
        let loader = StaticLoader::new()
            .with_document("text/ch1.xhtml", &chapter("<p id=\"a\">one</p>"))
            .with_document("text/ch2.xhtml", &chapter("<p>two</p>"))
            .with_document("css/main.css", "p {}");
        let layout = RecordingLayout::default();

        PublicationAssembler::default()
            .load(&publication, &loader, layout.clone())
            .await
            .unwrap();

        assert_eq!(
            layout.calls(),
            vec![
                LayoutCall::Stylesheet("main".to_string()),
                LayoutCall::Add {
                    id: "ch1".to_string(),
                    file: "ch1".to_string(),
                    html: "<div><p id=\"ch1_a\">one</p></div>".to_string(),
                },
                LayoutCall::Add {
                    id: "ch2".to_string(),
                    file: "ch2".to_string(),
                    html: "<div><p>two</p></div>".to_string(),
                },
                LayoutCall::Update,
                LayoutCall::RestoreBookmarks,
                LayoutCall::Finalise,
            ]
        );
    }

    #[tokio::test]
    async fn test_shared_ids_are_unique_after_flattening() {
        let publication = publication(&["chapter1", "chapter2"]);
        let loader = StaticLoader::new()
            .with_document("text/chapter1.xhtml", &chapter("<p id=\"p1\">one</p>"))
            .with_document("text/chapter2.xhtml", &chapter("<p id=\"p1\">two</p>"))
            .with_document("css/main.css", "p {}");

        let loaded = PublicationAssembler::default()
            .load(&publication, &loader, HtmlDocumentLayout::new("Sample"))
            .await
            .unwrap();

        let html = loaded.layout.render();
        assert_eq!(html.matches("id=\"chapter1_p1\"").count(), 1);
        assert_eq!(html.matches("id=\"chapter2_p1\"").count(), 1);
        assert!(!html.contains("id=\"p1\""));
    }

    #[tokio::test]
    async fn test_cross_document_links_resolve() {
        let mut publication = publication(&["ch1", "ch2"]);
        publication.toc[1].file = "text_ch2.xhtml".to_string();
        let loader = StaticLoader::new()
            .with_document(
                "text/ch1.xhtml",
                &chapter("<a href=\"text/ch2.xhtml#m1\">go</a><a href=\"#gone\">x</a>"),
            )
            .with_document("text/ch2.xhtml", &chapter("<p id=\"m1\">two</p>"))
            .with_document("css/main.css", "p {}");

        let loaded = PublicationAssembler::default()
            .load(&publication, &loader, RecordingLayout::default())
            .await
            .unwrap();

        assert_eq!(
            loaded.report.unresolved_references,
            vec![UnresolvedReference {
                toc_id: "ch1".to_string(),
                target: "ch1_gone".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_fragment_fails_before_any_page() {
        let mut publication = publication(&["ch1"]);
        publication
            .toc
            .push(TocEntry::new("ghost", "ghost", "", "text/ghost.xhtml"));
        let loader = StaticLoader::new()
            .with_document("text/ch1.xhtml", &chapter("<p>one</p>"))
            .with_document("css/main.css", "p {}");
        let layout = RecordingLayout::default();

        let result = PublicationAssembler::default()
            .load(&publication, &loader, layout.clone())
            .await;

        assert!(matches!(result, Err(AssemblyError::MissingFragment { toc_id }) if toc_id == "ghost"));
        assert!(layout.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_failure_invokes_failure_callback() {
        let publication = publication(&["ch1"]);
        let loader = StaticLoader::new()
            .with_document("css/main.css", "p {}")
            .with_failure("text/ch1.xhtml");
        let layout = RecordingLayout::default();

        let mut completed = false;
        let mut failure = None;
        PublicationAssembler::default()
            .load_with_callbacks(
                &publication,
                &loader,
                layout.clone(),
                |_, _| completed = true,
                |e| failure = Some(e.to_string()),
            )
            .await;

        assert!(!completed);
        assert!(failure.unwrap().contains("text/ch1.xhtml"));
        assert!(layout.calls().is_empty());
    }

    #[tokio::test]
    async fn test_completion_callback_receives_layout() {
        let publication = publication(&["ch1"]);
        let loader = StaticLoader::new()
            .with_document("text/ch1.xhtml", &chapter("<p>one</p>"))
            .with_document("css/main.css", "p {}");

        let mut pages = None;
        PublicationAssembler::default()
            .load_with_callbacks(
                &publication,
                &loader,
                HtmlDocumentLayout::new("Sample"),
                |publication, layout| {
                    assert_eq!(publication.display_title(), "Sample");
                    assert!(layout.is_finalised());
                    pages = Some(layout.page_count());
                },
                |e| panic!("unexpected failure: {}", e),
            )
            .await;

        assert_eq!(pages, Some(1));
    }

    #[tokio::test]
    async fn test_fetch_timeout_fails_load() {
        let publication = publication(&["ch1"]);
        let loader = StaticLoader::new()
            .with_document("text/ch1.xhtml", &chapter("<p>one</p>"))
            .never_resolving("css/main.css");
        let assembler = PublicationAssembler::new(AssemblerConfig {
            fetch_timeout_secs: 1,
        });

        let result = assembler
            .load(&publication, &loader, RecordingLayout::default())
            .await;

        assert!(matches!(
            result,
            Err(AssemblyError::Aggregate(AggregateError::Timeout { .. }))
        ));
    }

    #[test]
    fn test_transform_failure_names_entry_and_keeps_earlier_pages() {
        let publication = publication(&["ch1", "ch2", "ch3"]);
        let mut html = FragmentMap::default();
        html.insert("ch1".to_string(), "<div><p>one</p></div>".to_string());
        html.insert("ch2".to_string(), String::new());
        html.insert("ch3".to_string(), "<div><p>three</p></div>".to_string());
        let mut layout = RecordingLayout::default();

        let result = PublicationAssembler::default().assemble(
            &publication,
            html,
            FragmentMap::default(),
            &mut layout,
        );

        let error = result.unwrap_err();
        assert_eq!(error.toc_id(), Some("ch2"));
        assert_eq!(layout.added_ids(), vec!["ch1"]);
        assert!(!layout.calls().contains(&LayoutCall::Finalise));
    }

    #[tokio::test]
    async fn test_lifecycle_events_published() {
        let publication = publication(&["ch1", "ch2"]);
        let loader = StaticLoader::new()
            .with_document("text/ch1.xhtml", &chapter("<p>one</p>"))
            .with_document("text/ch2.xhtml", &chapter("<p>two</p>"))
            .with_document("css/main.css", "p {}");
        let assembler = PublicationAssembler::default();
        let mut subscription = assembler.events().subscribe();

        let loaded = assembler
            .load(&publication, &loader, RecordingLayout::default())
            .await
            .unwrap();
        let cycle_id = loaded.report.cycle_id;

        let mut events = Vec::new();
        while let Some(event) = subscription.try_recv() {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                PublicationEvent::LoadStarted {
                    cycle_id,
                    title: "Sample".to_string(),
                },
                PublicationEvent::ResourcesResolved {
                    cycle_id,
                    pages: 2,
                    stylesheets: 1,
                },
                PublicationEvent::PageAdded {
                    cycle_id,
                    id: "ch1".to_string(),
                    file: "ch1".to_string(),
                },
                PublicationEvent::PageAdded {
                    cycle_id,
                    id: "ch2".to_string(),
                    file: "ch2".to_string(),
                },
                PublicationEvent::PublicationLoaded { cycle_id, pages: 2 },
            ]
        );
    }
}
