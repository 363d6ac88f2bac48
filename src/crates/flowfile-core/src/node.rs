//! Flow nodes
//!
//! A [`FlowNode`] is owned by its graph and holds the validated settings
//! record, the execution state machine, and the last observed result. Nodes
//! refer to their inputs by id only; adjacency lives on the graph.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::graph::NodeId;
use crate::schema::SchemaState;
use crate::settings::{NodeKind, NodeSettings};
use crate::types::Schema;

/// Execution state machine of a node
///
/// `Unset → Pending → Running → (Ok | Failed | Cancelled)`; any settings or
/// upstream change resets to `Unset` and clears the last result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Unset,
    Pending,
    Running,
    Ok,
    Failed,
    Cancelled,
}

/// Result of the most recent execution of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum NodeOutcome {
    Ok {
        rows: usize,
        schema: Schema,
        duration_ms: u64,
        /// Where the bounded sample was cached, if caching applied
        #[serde(skip_serializing_if = "Option::is_none")]
        sample_path: Option<PathBuf>,
        /// Whether the result was served from the sample cache
        #[serde(default)]
        cached: bool,
    },
    Error {
        message: String,
    },
}

/// A node of the flow graph: settings plus execution bookkeeping
#[derive(Debug, Clone)]
pub struct FlowNode {
    pub id: NodeId,
    pub settings: NodeSettings,
    pub run_state: RunState,
    pub last_result: Option<NodeOutcome>,
    /// Predicted schema, maintained eagerly by the propagator
    pub schema_state: SchemaState,
    /// Schema inferred once by probing a source file; cleared on edit
    pub(crate) probed_schema: Option<Schema>,
}

impl FlowNode {
    pub fn new(id: NodeId, settings: NodeSettings) -> Self {
        Self {
            id,
            settings,
            run_state: RunState::Unset,
            last_result: None,
            schema_state: SchemaState::unknown("not yet propagated"),
            probed_schema: None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.settings.kind()
    }

    /// Reset execution state after a settings or upstream change
    pub fn invalidate(&mut self) {
        self.run_state = RunState::Unset;
        self.last_result = None;
        self.probed_schema = None;
    }

    /// Predicted schema when it is fully known
    pub fn predicted_schema(&self) -> Option<&Schema> {
        self.schema_state.known()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{NodePayload, SampleSettings};

    #[test]
    fn test_invalidate_resets_state() {
        let settings =
            NodeSettings::new(1, 1, NodePayload::Sample(SampleSettings { n: 10 })).unwrap();
        let mut node = FlowNode::new(1, settings);
        node.run_state = RunState::Ok;
        node.last_result = Some(NodeOutcome::Ok {
            rows: 3,
            schema: Schema::empty(),
            duration_ms: 1,
            sample_path: None,
            cached: false,
        });

        node.invalidate();
        assert_eq!(node.run_state, RunState::Unset);
        assert!(node.last_result.is_none());
    }
}
