// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built documents keyed by the file output node that produced them.
//!
//! Entries are stamped with the graph revision they were built from; any
//! edit to the graph makes them stale.

use foamgraph_graph::{Document, NodeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Cache hit and build counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: usize,
    /// Documents actually built
    pub builds: usize,
}

#[derive(Debug, Clone)]
struct CachedDocument {
    revision: u64,
    document: Arc<Document>,
}

/// Owner-keyed document cache
#[derive(Debug, Default)]
pub struct DocumentCache {
    entries: HashMap<NodeId, CachedDocument>,
    stats: CacheStats,
}

impl DocumentCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached document for `node` if it was built at `revision`
    pub fn get(&self, node: NodeId, revision: u64) -> Option<Arc<Document>> {
        self.entries
            .get(&node)
            .filter(|entry| entry.revision == revision)
            .map(|entry| Arc::clone(&entry.document))
    }

    /// Return the cached document or build and remember it
    pub fn get_or_try_build<E>(
        &mut self,
        node: NodeId,
        revision: u64,
        build: impl FnOnce() -> Result<Document, E>,
    ) -> Result<Arc<Document>, E> {
        if let Some(document) = self.get(node, revision) {
            self.stats.hits += 1;
            tracing::debug!("Document cache hit for {}", node);
            return Ok(document);
        }

        let document = Arc::new(build()?);
        self.stats.builds += 1;
        self.entries.insert(
            node,
            CachedDocument {
                revision,
                document: Arc::clone(&document),
            },
        );
        Ok(document)
    }

    /// Drop the entry for one node
    pub fn invalidate(&mut self, node: NodeId) {
        self.entries.remove(&node);
    }

    /// Drop every entry and reset the counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
    }

    /// Number of cached documents, stale ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no documents
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit and build counters
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
