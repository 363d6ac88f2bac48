//! The graph store abstraction
//!
//! [`GraphStore`] is the persistence seam for saved graphs: the kernel
//! hands a [`FlowDocument`] to a backend keyed by `graph_id` and reads it
//! back later. Backends range from the in-memory reference implementation
//! to anything that can hold a YAML blob; implement this trait to plug in
//! a database or object store.

use async_trait::async_trait;
use flowfile_core::doc::FlowDocument;
use flowfile_core::settings::FlowId;

use crate::error::Result;

/// Summary row returned by [`GraphStore::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSummary {
    pub graph_id: FlowId,
    pub name: String,
    pub node_count: usize,
}

/// Keyed persistence for flow documents
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Save or replace the document under its `graph_id`
    async fn put(&self, doc: &FlowDocument) -> Result<()>;

    /// Load a document, `None` when the id is unknown
    async fn get(&self, graph_id: FlowId) -> Result<Option<FlowDocument>>;

    /// Summaries of every stored graph, ascending by id
    async fn list(&self) -> Result<Vec<GraphSummary>>;

    /// Remove a document; returns whether it existed
    async fn delete(&self, graph_id: FlowId) -> Result<bool>;
}
