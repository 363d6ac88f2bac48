//! Filesystem graph store
//!
//! Persists one YAML document per graph id under a root directory
//! (`<root>/<graph_id>.yaml`). Writes go through the kernel's atomic file
//! writer, so a crash mid-save never corrupts an existing document.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use flowfile_core::doc::FlowDocument;
use flowfile_core::settings::FlowId;

use crate::error::{Result, StoreError};
use crate::traits::{GraphStore, GraphSummary};

/// One-YAML-file-per-graph store
#[derive(Debug, Clone)]
pub struct FileGraphStore {
    root: PathBuf,
}

impl FileGraphStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, graph_id: FlowId) -> PathBuf {
        self.root.join(format!("{}.yaml", graph_id))
    }
}

#[async_trait]
impl GraphStore for FileGraphStore {
    async fn put(&self, doc: &FlowDocument) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        doc.save_file(self.path_of(doc.graph_id))?;
        tracing::debug!(graph_id = doc.graph_id, root = %self.root.display(), "saved graph document");
        Ok(())
    }

    async fn get(&self, graph_id: FlowId) -> Result<Option<FlowDocument>> {
        let path = self.path_of(graph_id);
        if !path.exists() {
            return Ok(None);
        }
        let doc = FlowDocument::load_file(&path)?;
        Ok(Some(doc))
    }

    async fn list(&self) -> Result<Vec<GraphSummary>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            match FlowDocument::load_file(&path) {
                Ok(doc) => summaries.push(GraphSummary {
                    graph_id: doc.graph_id,
                    name: doc.name,
                    node_count: doc.nodes.len(),
                }),
                Err(e) => {
                    return Err(StoreError::Backend(format!(
                        "unreadable document '{}': {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        summaries.sort_by_key(|s| s.graph_id);
        Ok(summaries)
    }

    async fn delete(&self, graph_id: FlowId) -> Result<bool> {
        let path = self.path_of(graph_id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_core::graph::FlowGraph;
    use flowfile_core::settings::{ManualInputSettings, NodePayload};
    use flowfile_core::types::{Field, LogicalType};
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(graph_id: FlowId) -> FlowDocument {
        let mut graph = FlowGraph::new(graph_id, format!("graph-{}", graph_id));
        graph
            .add_node(NodePayload::ManualInput(ManualInputSettings {
                columns: vec![Field::new("a", LogicalType::Int64)],
                rows: vec![vec![json!(1)]],
            }))
            .unwrap();
        FlowDocument::from_graph(&graph).unwrap()
    }

    #[tokio::test]
    async fn test_file_roundtrip_preserves_hashes() {
        let dir = TempDir::new().unwrap();
        let store = FileGraphStore::new(dir.path());

        let original = doc(3);
        let hashes = original.clone().into_graph().unwrap().content_hashes().unwrap();
        store.put(&original).await.unwrap();

        let loaded = store.get(3).await.unwrap().unwrap();
        let reloaded = loaded.into_graph().unwrap();
        assert_eq!(reloaded.content_hashes().unwrap(), hashes);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileGraphStore::new(dir.path());
        store.put(&doc(2)).await.unwrap();
        store.put(&doc(1)).await.unwrap();

        let summaries = store.list().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].graph_id, 1);

        assert!(store.delete(2).await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(!store.delete(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_root_lists_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileGraphStore::new(dir.path().join("never-created"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.get(1).await.unwrap().is_none());
    }
}
