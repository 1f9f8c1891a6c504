//! Resource aggregation
//!
//! Resolves every entry of a spine or stylesheet list, from the content
//! cache when possible and through the loader otherwise, and joins the
//! results into one [`FragmentMap`] keyed by entry id.
//!
//! All entries are dispatched at once and the join completes when the last
//! one resolves. The first failure rejects the whole join.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::try_join_all;
use thiserror::Error;
use tokio::time::timeout;

use crate::html::{extract_fragment, wrap_fragment, ExtractError};
use crate::loader::{LoadError, ResourceKind, ResourceLoader};
use crate::publication::{FragmentMap, ResourceCache, ResourceEntry};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("failed to resolve {kind} resource '{id}' ({href}): {source}")]
    Resolution {
        kind: ResourceKind,
        id: String,
        href: String,
        #[source]
        source: LoadError,
    },

    #[error("{kind} resource '{id}' ({href}) did not resolve within {timeout:?}")]
    Timeout {
        kind: ResourceKind,
        id: String,
        href: String,
        timeout: Duration,
    },

    #[error("malformed {kind} resource '{id}': {source}")]
    Malformed {
        kind: ResourceKind,
        id: String,
        #[source]
        source: ExtractError,
    },

    #[error("duplicate {kind} entry id '{id}'")]
    DuplicateEntry { kind: ResourceKind, id: String },
}

/// Fan-out/fan-in resolver for one kind of resource
pub struct ResourceAggregator<'a> {
    kind: ResourceKind,
    cache: &'a ResourceCache,
    loader: &'a dyn ResourceLoader,
    fetch_timeout: Option<Duration>,
}

impl<'a> ResourceAggregator<'a> {
    pub fn new(kind: ResourceKind, cache: &'a ResourceCache, loader: &'a dyn ResourceLoader) -> Self {
        Self {
            kind,
            cache,
            loader,
            fetch_timeout: None,
        }
    }

    /// Fail any single fetch that takes longer than `limit`
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.fetch_timeout = limit;
        self
    }

    /// Resolve every entry and join the results
    pub async fn aggregate(&self, entries: &[ResourceEntry]) -> Result<FragmentMap, AggregateError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(AggregateError::DuplicateEntry {
                    kind: self.kind,
                    id: entry.id.clone(),
                });
            }
        }

        let resolved = try_join_all(entries.iter().map(|entry| self.resolve(entry))).await?;

        let mut fragments = FragmentMap::with_capacity(resolved.len());
        for (id, content) in resolved {
            fragments.insert(id, content);
        }

        tracing::info!(
            kind = %self.kind,
            count = fragments.len(),
            "All resources resolved"
        );

        Ok(fragments)
    }

    async fn resolve(&self, entry: &ResourceEntry) -> Result<(String, String), AggregateError> {
        let raw = match self.cache.get(entry.cache_key()) {
            Some(cached) => {
                tracing::debug!(kind = %self.kind, id = %entry.id, cache_hit = true, "Resolved {}", entry.href);
                cached.to_string()
            }
            None => {
                let fetched = self.fetch(entry).await?;
                tracing::debug!(kind = %self.kind, id = %entry.id, cache_hit = false, "Resolved {}", entry.href);
                fetched
            }
        };

        let content = self.shape(entry, &raw)?;
        Ok((entry.id.clone(), content))
    }

    async fn fetch(&self, entry: &ResourceEntry) -> Result<String, AggregateError> {
        let load = self.loader.load(&entry.href, self.kind);

        let result = match self.fetch_timeout {
            Some(limit) => timeout(limit, load).await.map_err(|_| AggregateError::Timeout {
                kind: self.kind,
                id: entry.id.clone(),
                href: entry.href.clone(),
                timeout: limit,
            })?,
            None => load.await,
        };

        result.map_err(|source| AggregateError::Resolution {
            kind: self.kind,
            id: entry.id.clone(),
            href: entry.href.clone(),
            source,
        })
    }

    /// Bring content into map shape; identical for cached and fetched input
    fn shape(&self, entry: &ResourceEntry, raw: &str) -> Result<String, AggregateError> {
        match self.kind {
            ResourceKind::Html => extract_fragment(raw)
                .map(|fragment| wrap_fragment(&fragment))
                .map_err(|source| AggregateError::Malformed {
                    kind: self.kind,
                    id: entry.id.clone(),
                    source,
                }),
            ResourceKind::Css => Ok(raw.to_string()),
        }
    }
}
