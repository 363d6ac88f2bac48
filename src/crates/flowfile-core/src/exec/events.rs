//! Execution events and run reports
//!
//! A run emits a stream of [`ExecutionEvent`]s on a channel: one `node`
//! event per observed state transition, then a terminal `finished` event
//! with the overall outcome. The same information is aggregated into the
//! [`RunReport`] returned by `run()` for callers that prefer the pull
//! model over the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::graph::{ExecutionMode, NodeId};
use crate::node::RunState;
use crate::settings::FlowId;

/// One entry of the run's event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A node transitioned state
    Node {
        t: DateTime<Utc>,
        node_id: NodeId,
        state: RunState,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rows: Option<usize>,
        /// Served from the sample cache
        #[serde(default)]
        cached: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Terminal event closing the stream
    Finished {
        t: DateTime<Utc>,
        success: bool,
        nodes_completed: usize,
        nodes_failed: usize,
    },
}

/// Per-node entry of the final report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node_id: NodeId,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(default)]
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated outcome of one `run()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub graph_id: FlowId,
    pub mode: ExecutionMode,
    pub success: bool,
    #[serde(default)]
    pub cancelled: bool,
    pub nodes_completed: usize,
    pub nodes_failed: usize,
    /// Entries in execution (topological) order
    pub node_reports: Vec<NodeReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Fans node transitions out to the optional channel while collecting the
/// per-node reports for the final summary
pub(crate) struct EventEmitter {
    sender: Option<UnboundedSender<ExecutionEvent>>,
    reports: Vec<NodeReport>,
}

impl EventEmitter {
    pub fn new(sender: Option<UnboundedSender<ExecutionEvent>>) -> Self {
        Self {
            sender,
            reports: Vec::new(),
        }
    }

    /// Record a terminal per-node observation and emit its event
    pub fn node(&mut self, report: NodeReport) {
        if let Some(tx) = &self.sender {
            // A closed receiver only means nobody is listening.
            let _ = tx.send(ExecutionEvent::Node {
                t: Utc::now(),
                node_id: report.node_id,
                state: report.state,
                duration_ms: report.duration_ms,
                rows: report.rows,
                cached: report.cached,
                error: report.error.clone(),
            });
        }
        self.reports.push(report);
    }

    /// Emit the terminal event and hand back the collected reports
    pub fn finish(self, success: bool) -> Vec<NodeReport> {
        let failed = self
            .reports
            .iter()
            .filter(|r| r.state == RunState::Failed)
            .count();
        let completed = self
            .reports
            .iter()
            .filter(|r| r.state == RunState::Ok)
            .count();
        if let Some(tx) = &self.sender {
            let _ = tx.send(ExecutionEvent::Finished {
                t: Utc::now(),
                success,
                nodes_completed: completed,
                nodes_failed: failed,
            });
        }
        self.reports
    }
}
