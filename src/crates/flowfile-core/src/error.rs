//! Error types for graph construction, validation, and execution
//!
//! All fallible operations in this crate return [`Result`], carrying a
//! [`FlowError`] that names the specific failure kind. Structural errors
//! (`Cycle`, `SlotTaken`, `UnknownNode`, `ArityMismatch`) are raised
//! synchronously by the operation that caused them and leave the graph
//! unchanged. Execution errors are attached to the offending node and
//! surfaced through the event stream and the final run report.
//!
//! # Error Hierarchy
//!
//! ```text
//! FlowError
//! ├── InvalidSettings    - Settings record rejected at construction
//! ├── UnknownNode        - Node id not present in the graph
//! ├── SlotTaken          - Destination input slot already occupied
//! ├── ArityMismatch      - Connected inputs do not match the kind's arity
//! ├── Cycle              - Operation would create (or found) a cycle
//! ├── MissingUpstream    - Required input slot unsatisfied at run time
//! ├── SchemaUnknown      - Schema cannot be predicted for a node
//! ├── Execution          - Engine-reported failure at a node
//! ├── Io                 - Filesystem / cache errors
//! ├── Serialization      - JSON encoding errors
//! ├── Yaml               - Document parsing errors
//! ├── Cancelled          - Run cancelled cooperatively
//! └── Timeout            - Per-node timeout elapsed
//! ```

use thiserror::Error;

use crate::graph::NodeId;

/// Convenience result type using [`FlowError`]
pub type Result<T> = std::result::Result<T, FlowError>;

/// Error type covering every fallible operation on a flow graph
#[derive(Error, Debug)]
pub enum FlowError {
    /// A settings record failed validation at construction.
    ///
    /// Carries the offending field and a human-readable reason, e.g.
    /// "between operator requires value2".
    #[error("invalid settings: field '{field}': {reason}")]
    InvalidSettings {
        /// Name of the field that failed validation
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A node id was referenced that does not exist in the graph
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The destination `(node, slot)` of a connect is already occupied
    #[error("input slot '{slot}' of node {node} is already connected")]
    SlotTaken {
        /// Destination node
        node: NodeId,
        /// Occupied slot, rendered (`main`, `left`, `right`, `main[i]`)
        slot: String,
    },

    /// Connected inputs do not match the arity declared by the node kind
    #[error("node {node} ({kind}) expects {expected}, found {found} connected input(s)")]
    ArityMismatch {
        /// Node whose inputs were checked
        node: NodeId,
        /// Node kind name
        kind: String,
        /// Human description of the declared shape ("exactly one main input", ...)
        expected: String,
        /// Number of satisfied input slots
        found: usize,
    },

    /// The operation would create a cycle, or a cycle was found defensively
    #[error("operation would create a cycle ({from} -> {to})")]
    Cycle {
        /// Source of the offending edge
        from: NodeId,
        /// Destination of the offending edge
        to: NodeId,
    },

    /// A required input slot had no upstream at execution time
    #[error("node {node} is missing its '{slot}' input")]
    MissingUpstream {
        /// Node that could not execute
        node: NodeId,
        /// Unsatisfied slot
        slot: String,
    },

    /// The schema of a node cannot be predicted
    #[error("schema unknown for node {node}: {reason}")]
    SchemaUnknown {
        /// Node whose schema is unknown
        node: NodeId,
        /// Human-readable reason (missing input, raw code without a declared schema, ...)
        reason: String,
    },

    /// The engine reported a failure while executing a node's plan
    #[error("node {node} execution failed: {message}")]
    Execution {
        /// Node whose plan failed
        node: NodeId,
        /// Engine error message
        message: String,
    },

    /// I/O failure (source files, cache directory, output sinks)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure (canonical settings, samples)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML document failure (load/save of flow documents)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The run was cancelled cooperatively between nodes
    #[error("run cancelled")]
    Cancelled,

    /// A per-node timeout elapsed
    #[error("node {node} timed out after {duration_ms}ms")]
    Timeout {
        /// Node that exceeded its budget
        node: NodeId,
        /// Configured timeout in milliseconds
        duration_ms: u64,
    },
}

impl FlowError {
    /// Create an `InvalidSettings` error
    pub fn invalid_settings(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an `Execution` error attached to a node
    pub fn execution(node: NodeId, message: impl Into<String>) -> Self {
        Self::Execution {
            node,
            message: message.into(),
        }
    }

    /// Create a `SchemaUnknown` error attached to a node
    pub fn schema_unknown(node: NodeId, reason: impl Into<String>) -> Self {
        Self::SchemaUnknown {
            node,
            reason: reason.into(),
        }
    }

    /// Whether a failed node execution may be retried once.
    ///
    /// Only transient I/O failures qualify; deterministic errors never retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = FlowError::invalid_settings("value2", "between operator requires value2");
        assert_eq!(
            err.to_string(),
            "invalid settings: field 'value2': between operator requires value2"
        );

        let err = FlowError::SlotTaken {
            node: 4,
            slot: "left".to_string(),
        };
        assert_eq!(err.to_string(), "input slot 'left' of node 4 is already connected");
    }

    #[test]
    fn test_transient_classification() {
        let io = FlowError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(io.is_transient());

        let exec = FlowError::execution(7, "divide by zero");
        assert!(!exec.is_transient());
        assert!(!FlowError::Cancelled.is_transient());
    }
}
