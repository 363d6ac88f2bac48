//! Canonical document persistence
//!
//! A graph serializes to a versioned, human-readable document in YAML or
//! JSON. Edges are not stored separately; each node carries `input_refs`
//! naming its upstream nodes and slots, and the edge set is recovered on
//! load. Re-loading a saved document yields a graph with identical
//! `content_hash` at every node.
//!
//! ```yaml
//! version: 1.0.0
//! graph_id: 1
//! name: sales
//! settings:
//!   execution_mode: development
//!   execution_location: auto
//!   auto_save: false
//!   show_progress: true
//! nodes:
//!   - id: 1
//!     kind: manual_input
//!     pos: { x: 0.0, y: 0.0 }
//!     settings:
//!       columns: [{ name: qty, type: int64 }]
//!       rows: [[10]]
//!   - id: 2
//!     kind: filter
//!     input_refs: [{ from: 1, slot: main }]
//!     settings:
//!       mode: advanced
//!       advanced: "[qty] > 5"
//! ```
//!
//! Unknown optional keys are tolerated; a missing required key or an
//! unknown `kind` is rejected with a descriptive error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{FlowError, Result};
use crate::graph::{FlowGraph, GraphSettings, InputSlot, NodeId};
use crate::settings::{FlowId, NodeKind, NodePayload, NodeSettings};

/// Version written into new documents
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Canvas position of a node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One upstream reference; the edge set is derived from these
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRef {
    pub from: NodeId,
    pub slot: InputSlot,
}

/// One node of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocNode {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub pos: Position,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub cache_results: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_refs: Vec<InputRef>,
    /// Per-kind payload without the discriminant (`kind` lives above)
    pub settings: Value,
}

/// The versioned top-level document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub version: String,
    pub graph_id: FlowId,
    pub name: String,
    pub settings: GraphSettings,
    pub nodes: Vec<DocNode>,
}

impl FlowDocument {
    /// Snapshot a graph into a document
    pub fn from_graph(graph: &FlowGraph) -> Result<Self> {
        let mut nodes = Vec::with_capacity(graph.node_count());
        for node in graph.nodes() {
            let mut settings = serde_json::to_value(&node.settings.payload)?;
            if let Some(obj) = settings.as_object_mut() {
                // `kind` is the node-level discriminant, not payload data.
                obj.remove("kind");
            }
            let input_refs = graph
                .inputs_of(node.id)
                .into_iter()
                .map(|(slot, from)| InputRef { from, slot })
                .collect();
            nodes.push(DocNode {
                id: node.id,
                kind: node.kind(),
                pos: Position {
                    x: node.settings.pos_x,
                    y: node.settings.pos_y,
                },
                description: node.settings.description.clone(),
                cache_results: node.settings.cache_results,
                input_refs,
                settings,
            });
        }
        Ok(Self {
            version: DOCUMENT_VERSION.to_string(),
            graph_id: graph.graph_id,
            name: graph.name.clone(),
            settings: graph.settings.clone(),
            nodes,
        })
    }

    /// Rebuild the graph: nodes first, then edges from `input_refs`
    pub fn into_graph(self) -> Result<FlowGraph> {
        check_version(&self.version)?;

        let mut graph = FlowGraph::new(self.graph_id, self.name.clone());
        graph.settings = self.settings.clone();

        for doc_node in &self.nodes {
            let mut tagged = doc_node.settings.clone();
            let obj = tagged.as_object_mut().ok_or_else(|| {
                FlowError::invalid_settings(
                    "settings",
                    format!("node {} settings must be a mapping", doc_node.id),
                )
            })?;
            obj.insert(
                "kind".to_string(),
                Value::String(doc_node.kind.as_str().to_string()),
            );
            let payload: NodePayload = serde_json::from_value(tagged).map_err(|e| {
                FlowError::invalid_settings(
                    "settings",
                    format!("node {} ({}): {}", doc_node.id, doc_node.kind, e),
                )
            })?;

            let mut settings = NodeSettings::new(self.graph_id, doc_node.id, payload)?;
            settings.description = doc_node.description.clone();
            settings.pos_x = doc_node.pos.x;
            settings.pos_y = doc_node.pos.y;
            settings.cache_results = doc_node.cache_results;
            graph.insert_node(doc_node.id, settings)?;
        }

        for doc_node in &self.nodes {
            for input in &doc_node.input_refs {
                graph.connect(input.from, doc_node.id, input.slot)?;
            }
        }
        Ok(graph)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let doc: FlowDocument = serde_yaml::from_str(text)?;
        check_version(&doc.version)?;
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let doc: FlowDocument = serde_json::from_str(text)?;
        check_version(&doc.version)?;
        Ok(doc)
    }

    /// Load from a file, dispatching on the extension (yaml default)
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }

    /// Save to a file atomically, dispatching on the extension
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => self.to_json()?,
            _ => self.to_yaml()?,
        };
        crate::engine::io::atomic_write(path, text.as_bytes()).map_err(|e| match e {
            crate::engine::EngineError::Io(io) => FlowError::Io(io),
            other => FlowError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                other.to_string(),
            )),
        })
    }
}

/// Accept any 1.x document; reject everything else clearly
fn check_version(version: &str) -> Result<()> {
    let major = version.split('.').next().unwrap_or_default();
    if major != "1" {
        return Err(FlowError::invalid_settings(
            "version",
            format!(
                "unsupported document version '{}' (supported: {})",
                version, DOCUMENT_VERSION
            ),
        ));
    }
    Ok(())
}
