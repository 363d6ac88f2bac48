//! Execution of flow graphs
//!
//! One contract, two strategies. [`ExecutionEngine::run`] walks the graph
//! in topological order and delegates computation to the lazy engine:
//!
//! - **Performance (lazy pull)**: build one memoized plan per sink and
//!   issue a single `collect` (or sink write) per sink, serially in
//!   ascending node id. Shared sub-pipelines are built once per run.
//! - **Development (eager push)**: execute every node in order on bounded
//!   samples, serving and writing the content-addressed sample cache.
//!
//! Both strategies observe the cancellation token between nodes and forward
//! it into the engine's `collect`. A failed node marks everything strictly
//! downstream `pending` (not failed); transient I/O failures retry exactly
//! once; deterministic errors never retry. Progress is reported as
//! [`ExecutionEvent`]s on an optional channel and aggregated into the
//! returned [`RunReport`].

pub mod cache;
pub mod events;
pub mod transform;
pub mod worker;

pub use cache::SampleCache;
pub use events::{ExecutionEvent, NodeReport, RunReport};
pub use worker::{SpoolWorker, WorkerOffload};

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::engine::{DataTable, EngineError, LazyFrame};
use crate::error::{FlowError, Result};
use crate::graph::{ExecutionLocation, ExecutionMode, FlowGraph, NodeId};
use crate::node::{NodeOutcome, RunState};
use crate::settings::NodePayload;

use events::EventEmitter;

/// Default bound on materialized samples in Development mode
pub const DEFAULT_SAMPLE_ROWS: usize = 1_000;

/// Runs graphs; construction is cheap, configuration is builder-style
#[derive(Clone)]
pub struct ExecutionEngine {
    cache_root: PathBuf,
    sample_rows: usize,
    node_timeout: Option<Duration>,
    events: Option<UnboundedSender<ExecutionEvent>>,
    worker: Option<Arc<dyn WorkerOffload>>,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self {
            cache_root: PathBuf::from("cache"),
            sample_rows: DEFAULT_SAMPLE_ROWS,
            node_timeout: None,
            events: None,
            worker: None,
        }
    }

    /// Root of the per-graph sample caches (default `cache/`)
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    /// Bound on Development-mode samples (default 1 000 rows)
    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }

    /// Per-node wall-clock budget; exceeding it fails the node
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    /// Channel receiving progress events during `run`
    pub fn with_event_sender(mut self, sender: UnboundedSender<ExecutionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Worker used when the graph's execution location is remote
    pub fn with_worker(mut self, worker: Arc<dyn WorkerOffload>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Execute the whole graph with the strategy selected on it.
    ///
    /// The mutable borrow is the single-writer discipline: structural edits
    /// and runs on the same graph cannot overlap.
    pub fn run(&self, graph: &mut FlowGraph, token: &CancelToken) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mode = graph.settings.execution_mode;
        tracing::debug!(%run_id, graph_id = graph.graph_id, ?mode, "starting run");

        let order = graph.topological_order()?;
        for &id in &order {
            graph.get_node_mut(id)?.run_state = RunState::Pending;
        }

        let mut emitter = EventEmitter::new(self.events.clone());
        let cancelled = match mode {
            ExecutionMode::Development => self.run_eager(graph, &order, token, &mut emitter)?,
            ExecutionMode::Performance => self.run_lazy(graph, &order, token, &mut emitter)?,
        };

        let node_reports = emitter.finish(!cancelled && !has_failures(graph, &order));
        let nodes_failed = node_reports
            .iter()
            .filter(|r| r.state == RunState::Failed)
            .count();
        let nodes_completed = node_reports
            .iter()
            .filter(|r| r.state == RunState::Ok)
            .count();
        let success = !cancelled && nodes_failed == 0;

        Ok(RunReport {
            run_id,
            graph_id: graph.graph_id,
            mode,
            success,
            cancelled,
            nodes_completed,
            nodes_failed,
            node_reports,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Non-blocking variant: the run proceeds on its own thread and emits
    /// progress on the returned channel; join the handle for the report.
    pub fn run_detached(
        &self,
        mut graph: FlowGraph,
        token: CancelToken,
    ) -> (
        UnboundedReceiver<ExecutionEvent>,
        std::thread::JoinHandle<(FlowGraph, Result<RunReport>)>,
    ) {
        let (tx, rx) = unbounded_channel();
        let engine = self.clone().with_event_sender(tx);
        let handle = std::thread::spawn(move || {
            let report = engine.run(&mut graph, &token);
            (graph, report)
        });
        (rx, handle)
    }

    /// Re-execute one node individually and return its table.
    ///
    /// `force` bypasses the sample cache. Upstream nodes are pulled through
    /// their lazy plans; only the addressed node's state is updated.
    pub fn execute_node(
        &self,
        graph: &mut FlowGraph,
        node_id: NodeId,
        token: &CancelToken,
        force: bool,
    ) -> Result<DataTable> {
        let hash = graph.content_hash(node_id)?;
        let sample_cache = SampleCache::new(&self.cache_root, graph.graph_id);
        let dev = graph.settings.execution_mode == ExecutionMode::Development;
        let cacheable = dev && graph.get_node(node_id)?.settings.cache_results;

        if cacheable && !force {
            if let Some(table) = sample_cache.load(&hash) {
                let node = graph.get_node_mut(node_id)?;
                node.run_state = RunState::Ok;
                node.last_result = Some(NodeOutcome::Ok {
                    rows: table.height(),
                    schema: table.schema.clone(),
                    duration_ms: 0,
                    sample_path: Some(sample_cache.entry_path(&hash)),
                    cached: true,
                });
                return Ok(table);
            }
        }

        let mut memo = HashMap::new();
        let plan = build_plan_memo(graph, node_id, &mut memo)?;
        let start = Instant::now();
        let result = plan.collect(token);
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(table) => {
                let table = if dev { table.head(self.sample_rows) } else { table };
                let mut sample_path = None;
                if cacheable {
                    match sample_cache.store(&hash, &table) {
                        Ok(path) => sample_path = Some(path),
                        Err(e) => tracing::warn!(node_id, error = %e, "failed to write sample cache"),
                    }
                }
                let node = graph.get_node_mut(node_id)?;
                node.run_state = RunState::Ok;
                node.last_result = Some(NodeOutcome::Ok {
                    rows: table.height(),
                    schema: table.schema.clone(),
                    duration_ms,
                    sample_path,
                    cached: false,
                });
                Ok(table)
            }
            Err(e) => {
                let err = engine_error(node_id, e);
                let node = graph.get_node_mut(node_id)?;
                if matches!(err, FlowError::Cancelled) {
                    node.run_state = RunState::Cancelled;
                } else {
                    node.run_state = RunState::Failed;
                    node.last_result = Some(NodeOutcome::Error {
                        message: err.to_string(),
                    });
                }
                Err(err)
            }
        }
    }

    /// Development strategy: eager push with the sample cache
    fn run_eager(
        &self,
        graph: &mut FlowGraph,
        order: &[NodeId],
        token: &CancelToken,
        emitter: &mut EventEmitter,
    ) -> Result<bool> {
        let hashes = graph.content_hashes()?;
        let sample_cache = SampleCache::new(&self.cache_root, graph.graph_id);
        let mut results: HashMap<NodeId, DataTable> = HashMap::new();
        let mut blocked: HashSet<NodeId> = HashSet::new();

        for &id in order {
            if token.is_cancelled() {
                return Ok(true);
            }
            if blocked.contains(&id) {
                // Downstream of a failure stays pending.
                continue;
            }
            let hash = &hashes[&id];
            graph.get_node_mut(id)?.run_state = RunState::Running;

            let cacheable = graph.get_node(id)?.settings.cache_results;
            if cacheable {
                if let Some(table) = sample_cache.load(hash) {
                    self.finish_ok(
                        graph,
                        emitter,
                        id,
                        table.clone(),
                        None,
                        Some(sample_cache.entry_path(hash)),
                        true,
                    )?;
                    results.insert(id, table);
                    continue;
                }
            }

            let start = Instant::now();
            let outcome = self.execute_eager_node(graph, id, &results, token);
            let duration_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(table) => {
                    if let Some(limit) = self.node_timeout {
                        if start.elapsed() > limit {
                            let err = FlowError::Timeout {
                                node: id,
                                duration_ms: limit.as_millis() as u64,
                            };
                            self.finish_failed(graph, emitter, id, &err)?;
                            blocked.extend(graph.downstream_of(id));
                            continue;
                        }
                    }
                    let sample = table.head(self.sample_rows);
                    let mut sample_path = None;
                    if cacheable {
                        match sample_cache.store(hash, &sample) {
                            Ok(path) => sample_path = Some(path),
                            Err(e) => {
                                tracing::warn!(node_id = id, error = %e, "failed to write sample cache")
                            }
                        }
                    }
                    self.finish_ok(
                        graph,
                        emitter,
                        id,
                        sample.clone(),
                        Some(duration_ms),
                        sample_path,
                        false,
                    )?;
                    results.insert(id, sample);
                }
                Err(FlowError::Cancelled) => {
                    // The in-progress node transitions to cancelled; the
                    // rest stay pending, caches written so far are kept.
                    graph.get_node_mut(id)?.run_state = RunState::Cancelled;
                    emitter.node(NodeReport {
                        node_id: id,
                        state: RunState::Cancelled,
                        duration_ms: Some(duration_ms),
                        rows: None,
                        cached: false,
                        error: None,
                    });
                    return Ok(true);
                }
                Err(err) => {
                    self.finish_failed(graph, emitter, id, &err)?;
                    blocked.extend(graph.downstream_of(id));
                }
            }
        }
        Ok(false)
    }

    /// Run one node eagerly against materialized upstream tables, with a
    /// single retry on transient I/O errors
    fn execute_eager_node(
        &self,
        graph: &FlowGraph,
        id: NodeId,
        results: &HashMap<NodeId, DataTable>,
        token: &CancelToken,
    ) -> Result<DataTable> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let inputs: Vec<_> = graph
                .inputs_of(id)
                .into_iter()
                .filter_map(|(slot, up)| {
                    results
                        .get(&up)
                        .map(|t| (slot, LazyFrame::scan_table(t.clone())))
                })
                .collect();
            let plan = transform::build_plan(graph, id, inputs)?;
            let sink_settings = match &graph.get_node(id)?.settings.payload {
                NodePayload::Output(out) => Some(out.clone()),
                _ => None,
            };
            let result = plan.collect(token).and_then(|table| {
                if let Some(out) = &sink_settings {
                    crate::engine::io::write_table(
                        &table,
                        Path::new(&out.path),
                        out.format,
                        out.write_mode,
                        out.delimiter,
                    )?;
                }
                Ok(table)
            });
            match result {
                Ok(table) => return Ok(table),
                Err(EngineError::Io(io)) if attempt == 1 => {
                    tracing::warn!(node_id = id, error = %io, "transient I/O failure, retrying once");
                    continue;
                }
                Err(e) => return Err(engine_error(id, e)),
            }
        }
    }

    /// Performance strategy: one plan and one collect per sink
    fn run_lazy(
        &self,
        graph: &mut FlowGraph,
        order: &[NodeId],
        token: &CancelToken,
        emitter: &mut EventEmitter,
    ) -> Result<bool> {
        let sinks = graph.sink_nodes();
        let use_worker = match graph.settings.execution_location {
            ExecutionLocation::Local => None,
            ExecutionLocation::Remote | ExecutionLocation::Auto => self.worker.clone(),
        };
        if graph.settings.execution_location == ExecutionLocation::Remote && use_worker.is_none() {
            return Err(FlowError::invalid_settings(
                "execution_location",
                "remote execution requires a configured worker",
            ));
        }

        // Shared sub-pipelines are built once per run.
        let mut memo: HashMap<NodeId, LazyFrame> = HashMap::new();
        let mut done: HashSet<NodeId> = HashSet::new();

        // Multiple sinks run serially in ascending node id.
        for &sink in &sinks {
            if token.is_cancelled() {
                return Ok(true);
            }
            graph.get_node_mut(sink)?.run_state = RunState::Running;

            let plan = match build_plan_memo(graph, sink, &mut memo) {
                Ok(plan) => plan,
                Err(err) => {
                    self.finish_failed(graph, emitter, sink, &err)?;
                    continue;
                }
            };

            let start = Instant::now();
            let outcome = self.collect_sink(graph, sink, &plan, use_worker.as_deref(), token);
            let duration_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok((rows, schema, sample_path)) => {
                    if let Some(limit) = self.node_timeout {
                        if start.elapsed() > limit {
                            let err = FlowError::Timeout {
                                node: sink,
                                duration_ms: limit.as_millis() as u64,
                            };
                            self.finish_failed(graph, emitter, sink, &err)?;
                            continue;
                        }
                    }
                    // Everything the sink pulled through is observed done,
                    // reported in topological order.
                    for &id in order {
                        if id == sink || done.contains(&id) || !memo.contains_key(&id) {
                            continue;
                        }
                        if !reaches_sink(graph, id, sink) {
                            continue;
                        }
                        done.insert(id);
                        graph.get_node_mut(id)?.run_state = RunState::Ok;
                        emitter.node(NodeReport {
                            node_id: id,
                            state: RunState::Ok,
                            duration_ms: None,
                            rows: None,
                            cached: false,
                            error: None,
                        });
                    }
                    done.insert(sink);
                    let node = graph.get_node_mut(sink)?;
                    node.run_state = RunState::Ok;
                    node.last_result = Some(NodeOutcome::Ok {
                        rows: rows.unwrap_or(0),
                        schema,
                        duration_ms,
                        sample_path,
                        cached: false,
                    });
                    emitter.node(NodeReport {
                        node_id: sink,
                        state: RunState::Ok,
                        duration_ms: Some(duration_ms),
                        rows,
                        cached: false,
                        error: None,
                    });
                }
                Err(FlowError::Cancelled) => {
                    graph.get_node_mut(sink)?.run_state = RunState::Cancelled;
                    emitter.node(NodeReport {
                        node_id: sink,
                        state: RunState::Cancelled,
                        duration_ms: Some(duration_ms),
                        rows: None,
                        cached: false,
                        error: None,
                    });
                    return Ok(true);
                }
                Err(err) => {
                    self.finish_failed(graph, emitter, sink, &err)?;
                }
            }
        }
        Ok(false)
    }

    /// Collect or offload one sink, retrying transient I/O once
    fn collect_sink(
        &self,
        graph: &FlowGraph,
        sink: NodeId,
        plan: &LazyFrame,
        worker: Option<&dyn WorkerOffload>,
        token: &CancelToken,
    ) -> Result<(Option<usize>, crate::types::Schema, Option<PathBuf>)> {
        let node = graph.get_node(sink)?;

        // Output sinks write through the engine's sink path.
        if let NodePayload::Output(out) = &node.settings.payload {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match plan.sink(
                    Path::new(&out.path),
                    out.format,
                    out.write_mode,
                    out.delimiter,
                    token,
                ) {
                    Ok(rows) => {
                        let schema = node
                            .predicted_schema()
                            .cloned()
                            .unwrap_or_default();
                        return Ok((Some(rows), schema, Some(PathBuf::from(&out.path))));
                    }
                    Err(EngineError::Io(io)) if attempt == 1 => {
                        tracing::warn!(node_id = sink, error = %io, "transient I/O failure, retrying once");
                        continue;
                    }
                    Err(e) => return Err(engine_error(sink, e)),
                }
            }
        }

        if let Some(worker) = worker {
            tracing::debug!(node_id = sink, worker = worker.name(), "offloading sink plan");
            let artifact = worker.execute_plan(sink, plan, token)?;
            let schema = node.predicted_schema().cloned().unwrap_or_default();
            return Ok((None, schema, Some(artifact)));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match plan.collect(token) {
                Ok(table) => return Ok((Some(table.height()), table.schema, None)),
                Err(EngineError::Io(io)) if attempt == 1 => {
                    tracing::warn!(node_id = sink, error = %io, "transient I/O failure, retrying once");
                    continue;
                }
                Err(e) => return Err(engine_error(sink, e)),
            }
        }
    }

    fn finish_ok(
        &self,
        graph: &mut FlowGraph,
        emitter: &mut EventEmitter,
        id: NodeId,
        table: DataTable,
        duration_ms: Option<u64>,
        sample_path: Option<PathBuf>,
        cached: bool,
    ) -> Result<()> {
        let node = graph.get_node_mut(id)?;
        node.run_state = RunState::Ok;
        node.last_result = Some(NodeOutcome::Ok {
            rows: table.height(),
            schema: table.schema.clone(),
            duration_ms: duration_ms.unwrap_or(0),
            sample_path,
            cached,
        });
        emitter.node(NodeReport {
            node_id: id,
            state: RunState::Ok,
            duration_ms,
            rows: Some(table.height()),
            cached,
            error: None,
        });
        Ok(())
    }

    fn finish_failed(
        &self,
        graph: &mut FlowGraph,
        emitter: &mut EventEmitter,
        id: NodeId,
        err: &FlowError,
    ) -> Result<()> {
        tracing::debug!(node_id = id, error = %err, "node failed");
        let node = graph.get_node_mut(id)?;
        node.run_state = RunState::Failed;
        node.last_result = Some(NodeOutcome::Error {
            message: err.to_string(),
        });
        emitter.node(NodeReport {
            node_id: id,
            state: RunState::Failed,
            duration_ms: None,
            rows: None,
            cached: false,
            error: Some(err.to_string()),
        });
        Ok(())
    }
}

/// Recursive plan construction with per-run memoization
fn build_plan_memo(
    graph: &FlowGraph,
    id: NodeId,
    memo: &mut HashMap<NodeId, LazyFrame>,
) -> Result<LazyFrame> {
    if let Some(plan) = memo.get(&id) {
        return Ok(plan.clone());
    }
    let mut inputs = Vec::new();
    for (slot, upstream) in graph.inputs_of(id) {
        inputs.push((slot, build_plan_memo(graph, upstream, memo)?));
    }
    let plan = transform::build_plan(graph, id, inputs)?;
    memo.insert(id, plan.clone());
    Ok(plan)
}

/// Whether `sink` is reachable from `id` (used to attribute lazy progress)
fn reaches_sink(graph: &FlowGraph, id: NodeId, sink: NodeId) -> bool {
    let mut stack = vec![id];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == sink {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        stack.extend(graph.leads_to(current));
    }
    false
}

fn has_failures(graph: &FlowGraph, order: &[NodeId]) -> bool {
    order.iter().any(|&id| {
        graph
            .get_node(id)
            .map(|n| n.run_state == RunState::Failed)
            .unwrap_or(false)
    })
}

fn engine_error(node: NodeId, e: EngineError) -> FlowError {
    match e {
        EngineError::Cancelled => FlowError::Cancelled,
        EngineError::Io(io) => FlowError::Io(io),
        other => FlowError::execution(node, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InputSlot;
    use crate::settings::*;
    use crate::types::{Field, LogicalType};
    use serde_json::json;
    use tempfile::TempDir;

    fn sales_rows() -> NodePayload {
        NodePayload::ManualInput(ManualInputSettings {
            columns: vec![
                Field::new("region", LogicalType::String),
                Field::new("qty", LogicalType::Int64),
                Field::new("price", LogicalType::Int64),
            ],
            rows: vec![
                vec![json!("N"), json!(10), json!(150)],
                vec![json!("S"), json!(5), json!(300)],
                vec![json!("N"), json!(20), json!(250)],
                vec![json!("E"), json!(8), json!(200)],
            ],
        })
    }

    /// formula -> filter -> group_by -> sort over the sales rows
    fn scenario_graph(mode: ExecutionMode) -> (FlowGraph, NodeId) {
        let mut graph = FlowGraph::new(1, "scenario");
        graph.settings.execution_mode = mode;
        let src = graph.add_node(sales_rows()).unwrap();
        let total = graph
            .add_node(NodePayload::Formula(FormulaSettings {
                name: "total".to_string(),
                data_type: None,
                expression: "[qty] * [price]".to_string(),
            }))
            .unwrap();
        let keep = graph
            .add_node(NodePayload::Filter(FilterSettings {
                mode: FilterMode::Advanced,
                basic: None,
                advanced: Some("[total] > 1500".to_string()),
            }))
            .unwrap();
        let grouped = graph
            .add_node(NodePayload::GroupBy(GroupBySettings {
                keys: vec!["region".to_string()],
                aggregations: vec![
                    Aggregation {
                        input_col: "total".to_string(),
                        function: AggFunction::Sum,
                        output_name: "total_revenue".to_string(),
                    },
                    Aggregation {
                        input_col: "total".to_string(),
                        function: AggFunction::Mean,
                        output_name: "avg_total".to_string(),
                    },
                ],
            }))
            .unwrap();
        let sorted = graph
            .add_node(NodePayload::Sort(SortSettings {
                columns: vec![SortColumn {
                    column: "total_revenue".to_string(),
                    direction: SortDirection::Desc,
                }],
            }))
            .unwrap();
        graph.connect(src, total, InputSlot::Main).unwrap();
        graph.connect(total, keep, InputSlot::Main).unwrap();
        graph.connect(keep, grouped, InputSlot::Main).unwrap();
        graph.connect(grouped, sorted, InputSlot::Main).unwrap();
        (graph, sorted)
    }

    fn engine(dir: &TempDir) -> ExecutionEngine {
        ExecutionEngine::new().with_cache_root(dir.path())
    }

    #[test]
    fn test_scenario_development_run() {
        let dir = TempDir::new().unwrap();
        let (mut graph, sink) = scenario_graph(ExecutionMode::Development);

        let report = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();
        assert!(report.success);
        assert_eq!(report.nodes_failed, 0);
        assert_eq!(report.nodes_completed, 5);

        // Strictly greater than 1500 keeps 20 * 250 = 5000 (N) and
        // 8 * 200 = 1600 (E); both 1500 totals drop.
        let table = engine(&dir)
            .execute_node(&mut graph, sink, &CancelToken::new(), true)
            .unwrap();
        assert_eq!(
            table.to_records(),
            vec![
                json!({"region": "N", "total_revenue": 5000, "avg_total": 5000.0}),
                json!({"region": "E", "total_revenue": 1600, "avg_total": 1600.0}),
            ]
        );
    }

    #[test]
    fn test_scenario_performance_run_matches() {
        let dir = TempDir::new().unwrap();
        let (mut graph, sink) = scenario_graph(ExecutionMode::Performance);

        let report = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();
        assert!(report.success);
        // Sink carries rows and duration; the pulled-through nodes are ok.
        let sink_report = report
            .node_reports
            .iter()
            .find(|r| r.node_id == sink)
            .unwrap();
        assert_eq!(sink_report.rows, Some(2));
        for node in graph.nodes() {
            assert_eq!(node.run_state, RunState::Ok);
        }
    }

    #[test]
    fn test_predicted_schema_matches_collected_schema() {
        let dir = TempDir::new().unwrap();
        let (mut graph, sink) = scenario_graph(ExecutionMode::Development);

        let predicted = graph.get_node(sink).unwrap().predicted_schema().cloned().unwrap();
        let table = engine(&dir)
            .execute_node(&mut graph, sink, &CancelToken::new(), true)
            .unwrap();
        assert_eq!(predicted, table.schema);
    }

    #[test]
    fn test_cache_reuse_on_second_run() {
        let dir = TempDir::new().unwrap();
        let (mut graph, _) = scenario_graph(ExecutionMode::Development);
        for id in graph.node_ids() {
            graph
                .update_presentation(id, None, None, Some(true))
                .unwrap();
        }

        let first = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();
        assert!(first.success);
        assert!(first.node_reports.iter().all(|r| !r.cached));

        let second = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();
        assert!(second.success);
        // Every node is served from the cache: no duration, marked cached.
        for report in &second.node_reports {
            assert!(report.cached, "node {} was not cached", report.node_id);
            assert_eq!(report.duration_ms, None);
        }
    }

    #[test]
    fn test_cache_invalidated_by_upstream_edit() {
        let dir = TempDir::new().unwrap();
        let (mut graph, _) = scenario_graph(ExecutionMode::Development);
        for id in graph.node_ids() {
            graph
                .update_presentation(id, None, None, Some(true))
                .unwrap();
        }
        engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();

        // Editing the filter changes its hash and all hashes downstream.
        let filter_id = 3;
        graph
            .update_settings(
                filter_id,
                NodePayload::Filter(FilterSettings {
                    mode: FilterMode::Advanced,
                    basic: None,
                    advanced: Some("[total] > 100".to_string()),
                }),
            )
            .unwrap();

        let report = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();
        let cached: Vec<NodeId> = report
            .node_reports
            .iter()
            .filter(|r| r.cached)
            .map(|r| r.node_id)
            .collect();
        // The source and formula are untouched, the rest recompute.
        assert_eq!(cached, vec![1, 2]);
    }

    #[test]
    fn test_join_with_one_input_raises_missing_upstream() {
        let dir = TempDir::new().unwrap();
        let mut graph = FlowGraph::new(1, "half-join");
        let src = graph.add_node(sales_rows()).unwrap();
        let join = graph
            .add_node(NodePayload::Join(JoinSettings {
                mapping: vec![JoinPair {
                    left_col: "region".to_string(),
                    right_col: "region".to_string(),
                }],
                strategy: JoinStrategy::Inner,
                left_select: None,
                right_select: None,
            }))
            .unwrap();
        graph.connect(src, join, InputSlot::Left).unwrap();

        let report = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();
        assert!(!report.success);
        let join_report = report
            .node_reports
            .iter()
            .find(|r| r.node_id == join)
            .unwrap();
        assert_eq!(join_report.state, RunState::Failed);
        assert!(join_report.error.as_ref().unwrap().contains("right"));
    }

    #[test]
    fn test_failure_keeps_downstream_pending() {
        let dir = TempDir::new().unwrap();
        let mut graph = FlowGraph::new(1, "failing");
        graph.settings.execution_mode = ExecutionMode::Development;
        let src = graph.add_node(sales_rows()).unwrap();
        let bad = graph
            .add_node(NodePayload::Filter(FilterSettings {
                mode: FilterMode::Advanced,
                basic: None,
                advanced: Some("[missing_column] > 1".to_string()),
            }))
            .unwrap();
        let after = graph
            .add_node(NodePayload::Sample(SampleSettings { n: 10 }))
            .unwrap();
        graph.connect(src, bad, InputSlot::Main).unwrap();
        graph.connect(bad, after, InputSlot::Main).unwrap();

        let report = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();
        assert!(!report.success);
        assert_eq!(graph.get_node(src).unwrap().run_state, RunState::Ok);
        assert_eq!(graph.get_node(bad).unwrap().run_state, RunState::Failed);
        // Downstream of the failure is pending, not failed.
        assert_eq!(graph.get_node(after).unwrap().run_state, RunState::Pending);
    }

    #[test]
    fn test_cancelled_before_start_leaves_nodes_pending() {
        let dir = TempDir::new().unwrap();
        let (mut graph, _) = scenario_graph(ExecutionMode::Development);
        let token = CancelToken::new();
        token.cancel();

        let report = engine(&dir).run(&mut graph, &token).unwrap();
        assert!(report.cancelled);
        assert!(!report.success);
        for node in graph.nodes() {
            assert_eq!(node.run_state, RunState::Pending);
        }
    }

    #[test]
    fn test_output_sink_writes_file() {
        let dir = TempDir::new().unwrap();
        let out_path = dir.path().join("result.csv");
        let mut graph = FlowGraph::new(1, "sink");
        graph.settings.execution_mode = ExecutionMode::Performance;
        let src = graph.add_node(sales_rows()).unwrap();
        let out = graph
            .add_node(NodePayload::Output(OutputSettings {
                path: out_path.to_string_lossy().to_string(),
                format: FileFormat::Csv,
                write_mode: WriteMode::Overwrite,
                delimiter: None,
            }))
            .unwrap();
        graph.connect(src, out, InputSlot::Main).unwrap();

        let report = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();
        assert!(report.success);
        let written = std::fs::read_to_string(&out_path).unwrap();
        assert!(written.starts_with("region,qty,price\n"));
        assert_eq!(written.lines().count(), 5);
        assert_eq!(graph.get_node(out).unwrap().run_state, RunState::Ok);
    }

    #[test]
    fn test_remote_location_uses_worker() {
        let dir = TempDir::new().unwrap();
        let spool = TempDir::new().unwrap();
        let (mut graph, sink) = scenario_graph(ExecutionMode::Performance);
        graph.settings.execution_location = ExecutionLocation::Remote;

        let engine = ExecutionEngine::new()
            .with_cache_root(dir.path())
            .with_worker(Arc::new(SpoolWorker::new(spool.path())));
        let report = engine.run(&mut graph, &CancelToken::new()).unwrap();
        assert!(report.success);

        match graph.get_node(sink).unwrap().last_result.as_ref().unwrap() {
            NodeOutcome::Ok { sample_path, .. } => {
                assert!(sample_path.as_ref().unwrap().exists());
            }
            other => panic!("expected ok outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_without_worker_is_invalid() {
        let dir = TempDir::new().unwrap();
        let (mut graph, _) = scenario_graph(ExecutionMode::Performance);
        graph.settings.execution_location = ExecutionLocation::Remote;

        let err = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, FlowError::InvalidSettings { .. }));
    }

    #[test]
    fn test_detached_run_streams_events() {
        let dir = TempDir::new().unwrap();
        let (graph, _) = scenario_graph(ExecutionMode::Development);

        let (mut rx, handle) = engine(&dir).run_detached(graph, CancelToken::new());
        let (_graph, report) = handle.join().unwrap();
        assert!(report.unwrap().success);

        let mut saw_finished = false;
        while let Ok(event) = rx.try_recv() {
            if let ExecutionEvent::Finished { success, .. } = event {
                saw_finished = true;
                assert!(success);
            }
        }
        assert!(saw_finished);
    }

    #[test]
    fn test_missing_source_file_fails_after_retry() {
        let dir = TempDir::new().unwrap();
        let mut graph = FlowGraph::new(1, "io");
        graph.settings.execution_mode = ExecutionMode::Development;
        let src = graph
            .add_node(NodePayload::SourceTable(SourceTableSettings {
                path: dir.path().join("absent.csv").to_string_lossy().to_string(),
                format: FileFormat::Csv,
                delimiter: None,
                has_header: None,
                encoding: None,
                skip_rows: None,
                columns: None,
            }))
            .unwrap();

        let report = engine(&dir).run(&mut graph, &CancelToken::new()).unwrap();
        assert!(!report.success);
        assert_eq!(graph.get_node(src).unwrap().run_state, RunState::Failed);
    }
}
