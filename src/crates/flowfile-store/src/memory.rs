//! In-memory graph store
//!
//! Reference [`GraphStore`] backend holding documents in a shared map.
//! Nothing survives a restart; use it for development, tests, and
//! short-lived sessions. Clones share the same underlying map.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use flowfile_core::doc::FlowDocument;
use flowfile_core::settings::FlowId;

use crate::error::Result;
use crate::traits::{GraphStore, GraphSummary};

/// Thread-safe map-backed store
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    docs: Arc<RwLock<HashMap<FlowId, FlowDocument>>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything (test isolation)
    pub async fn clear(&self) {
        self.docs.write().await.clear();
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn put(&self, doc: &FlowDocument) -> Result<()> {
        self.docs.write().await.insert(doc.graph_id, doc.clone());
        Ok(())
    }

    async fn get(&self, graph_id: FlowId) -> Result<Option<FlowDocument>> {
        Ok(self.docs.read().await.get(&graph_id).cloned())
    }

    async fn list(&self) -> Result<Vec<GraphSummary>> {
        let docs = self.docs.read().await;
        let mut summaries: Vec<GraphSummary> = docs
            .values()
            .map(|doc| GraphSummary {
                graph_id: doc.graph_id,
                name: doc.name.clone(),
                node_count: doc.nodes.len(),
            })
            .collect();
        summaries.sort_by_key(|s| s.graph_id);
        Ok(summaries)
    }

    async fn delete(&self, graph_id: FlowId) -> Result<bool> {
        Ok(self.docs.write().await.remove(&graph_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_core::graph::FlowGraph;
    use flowfile_core::settings::{ManualInputSettings, NodePayload};
    use flowfile_core::types::{Field, LogicalType};
    use serde_json::json;

    fn doc(graph_id: FlowId, name: &str) -> FlowDocument {
        let mut graph = FlowGraph::new(graph_id, name);
        graph
            .add_node(NodePayload::ManualInput(ManualInputSettings {
                columns: vec![Field::new("a", LogicalType::Int64)],
                rows: vec![vec![json!(1)]],
            }))
            .unwrap();
        FlowDocument::from_graph(&graph).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = InMemoryGraphStore::new();
        let original = doc(1, "one");
        store.put(&original).await.unwrap();

        let loaded = store.get(1).await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(store.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sorted_by_id() {
        let store = InMemoryGraphStore::new();
        store.put(&doc(5, "five")).await.unwrap();
        store.put(&doc(2, "two")).await.unwrap();

        let summaries = store.list().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].graph_id, 2);
        assert_eq!(summaries[1].graph_id, 5);
        assert_eq!(summaries[0].node_count, 1);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = InMemoryGraphStore::new();
        store.put(&doc(1, "one")).await.unwrap();
        assert!(store.delete(1).await.unwrap());
        assert!(!store.delete(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryGraphStore::new();
        let clone = store.clone();
        store.put(&doc(1, "one")).await.unwrap();
        assert!(clone.get(1).await.unwrap().is_some());
    }
}
