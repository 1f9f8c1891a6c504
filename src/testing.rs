//! Test doubles shared by the unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::assembler::LayoutSink;
use crate::loader::{LoadError, ResourceKind, ResourceLoader};

/// In-memory loader with per-href gates and failures
#[derive(Default)]
pub(crate) struct StaticLoader {
    documents: HashMap<String, String>,
    gates: HashMap<String, Arc<Notify>>,
    failures: HashSet<String>,
    never: HashSet<String>,
    calls: AtomicUsize,
    order: Mutex<Vec<String>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, href: &str, content: &str) -> Self {
        self.documents.insert(href.to_string(), content.to_string());
        self
    }

    /// Hold `href` until the returned handle is notified
    pub fn with_gate(&mut self, href: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.insert(href.to_string(), gate.clone());
        gate
    }

    pub fn with_failure(mut self, href: &str) -> Self {
        self.failures.insert(href.to_string());
        self
    }

    pub fn never_resolving(mut self, href: &str) -> Self {
        self.never.insert(href.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Hrefs in the order their loads completed
    pub fn completion_order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceLoader for StaticLoader {
    async fn load(&self, href: &str, _kind: ResourceKind) -> Result<String, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.never.contains(href) {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = self.gates.get(href) {
            gate.notified().await;
        }
        if self.failures.contains(href) {
            return Err(LoadError::Other(format!("refused {}", href)));
        }

        let content = self
            .documents
            .get(href)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(href.to_string()))?;
        self.order.lock().unwrap().push(href.to_string());
        Ok(content)
    }
}

/// Layout call recorded by [`RecordingLayout`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LayoutCall {
    Stylesheet(String),
    Add { id: String, file: String, html: String },
    Update,
    RestoreBookmarks,
    Finalise,
}

/// Layout sink that records every call; clones share the record
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingLayout {
    calls: Arc<Mutex<Vec<LayoutCall>>>,
}

impl RecordingLayout {
    pub fn calls(&self) -> Vec<LayoutCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn added_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LayoutCall::Add { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: LayoutCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl LayoutSink for RecordingLayout {
    fn add_stylesheet(&mut self, id: &str, _css: &str) {
        self.record(LayoutCall::Stylesheet(id.to_string()));
    }

    fn add(&mut self, id: &str, file: &str, html: &str) {
        self.record(LayoutCall::Add {
            id: id.to_string(),
            file: file.to_string(),
            html: html.to_string(),
        });
    }

    fn update(&mut self) {
        self.record(LayoutCall::Update);
    }

    fn restore_bookmarks(&mut self) {
        self.record(LayoutCall::RestoreBookmarks);
    }

    fn finalise(&mut self) {
        self.record(LayoutCall::Finalise);
    }
}
