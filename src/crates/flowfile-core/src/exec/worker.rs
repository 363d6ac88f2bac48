//! Worker offload channel
//!
//! In Performance mode a run may hand a sink's lazy plan to a worker that
//! executes it out of process and reports back the path of a cached
//! artifact. The kernel only knows this trait; wire formats and process
//! management live behind implementations.

use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::engine::io::atomic_write;
use crate::engine::LazyFrame;
use crate::error::{FlowError, Result};
use crate::graph::NodeId;

/// Executes lazy plans away from the caller and returns artifact paths
pub trait WorkerOffload: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Execute `plan` and return the path of the cached result artifact
    fn execute_plan(&self, node_id: NodeId, plan: &LazyFrame, token: &CancelToken)
        -> Result<PathBuf>;
}

/// Reference worker: collects in-process and spools the result to disk.
///
/// Stands in for a real out-of-process worker in tests and single-machine
/// runs; the artifact is the JSON encoding of the collected table.
#[derive(Debug, Clone)]
pub struct SpoolWorker {
    dir: PathBuf,
}

impl SpoolWorker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl WorkerOffload for SpoolWorker {
    fn name(&self) -> &str {
        "spool"
    }

    fn execute_plan(
        &self,
        node_id: NodeId,
        plan: &LazyFrame,
        token: &CancelToken,
    ) -> Result<PathBuf> {
        let table = plan.collect(token).map_err(|e| match e {
            crate::engine::EngineError::Cancelled => FlowError::Cancelled,
            crate::engine::EngineError::Io(io) => FlowError::Io(io),
            other => FlowError::execution(node_id, other.to_string()),
        })?;
        let path = self.dir.join(format!("node-{}.artifact", node_id));
        let bytes = serde_json::to_vec(&table)?;
        atomic_write(&path, &bytes).map_err(|e| match e {
            crate::engine::EngineError::Io(io) => FlowError::Io(io),
            other => FlowError::execution(node_id, other.to_string()),
        })?;
        tracing::debug!(node_id, path = %path.display(), "spooled worker artifact");
        Ok(path)
    }
}
