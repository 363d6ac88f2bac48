//! Fluent dataframe facade
//!
//! [`FlowFrame`] is the second surface over the same graph: a cheap value
//! holding a shared graph reference and the id of the node it points at.
//! Every operation constructs the corresponding settings record, asks the
//! graph to add a connected node of that kind, and returns a new frame
//! pointing at it. Frames are never mutated; repeating an operation appends
//! another node.
//!
//! Pipelines built here and pipelines built from explicit settings records
//! produce identical content hashes, because both surfaces put identical
//! records into the graph.
//!
//! # Examples
//!
//! ```rust
//! use flowfile_core::builder::FlowFrame;
//! use flowfile_core::types::{Field, LogicalType};
//! use serde_json::json;
//!
//! let graph = FlowFrame::new_graph(1, "sales");
//! let frame = FlowFrame::manual_input(
//!     &graph,
//!     vec![
//!         Field::new("qty", LogicalType::Int64),
//!         Field::new("price", LogicalType::Int64),
//!     ],
//!     vec![vec![json!(10), json!(150)]],
//! ).unwrap();
//!
//! let result = frame
//!     .with_column("total", "[qty] * [price]").unwrap()
//!     .filter("[total] > 1000").unwrap();
//! assert!(result.content_hash().is_ok());
//! ```
//!
//! Two dialects reach the engine: bracketed-formula strings (compiled and
//! checked by the schema propagator) and raw engine source via
//! [`FlowFrame::raw_code`] — the only escape hatch; its node is surfaced as
//! a code block, not a form.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::engine::DataTable;
use crate::error::{FlowError, Result};
use crate::exec::ExecutionEngine;
use crate::cancel::CancelToken;
use crate::graph::{FlowGraph, InputSlot, NodeId};
use crate::settings::*;
use crate::types::{Field, LogicalType, Schema};

/// Shared handle to a graph under construction
pub type SharedGraph = Arc<Mutex<FlowGraph>>;

/// A cheap `(graph, node)` value; each operation appends a node
#[derive(Clone, Debug)]
pub struct FlowFrame {
    graph: SharedGraph,
    node_id: NodeId,
}

impl FlowFrame {
    /// Create a fresh shared graph for builder pipelines
    pub fn new_graph(graph_id: FlowId, name: impl Into<String>) -> SharedGraph {
        Arc::new(Mutex::new(FlowGraph::new(graph_id, name)))
    }

    /// Start a pipeline from literal rows
    pub fn manual_input(
        graph: &SharedGraph,
        columns: Vec<Field>,
        rows: Vec<Vec<Value>>,
    ) -> Result<FlowFrame> {
        Self::source(
            graph,
            NodePayload::ManualInput(ManualInputSettings { columns, rows }),
        )
    }

    /// Start a pipeline from a file source
    pub fn read_file(graph: &SharedGraph, settings: SourceTableSettings) -> Result<FlowFrame> {
        Self::source(graph, NodePayload::SourceTable(settings))
    }

    /// Start a pipeline from any arity-0 payload
    pub fn source(graph: &SharedGraph, payload: NodePayload) -> Result<FlowFrame> {
        let node_id = lock(graph).add_node(payload)?;
        Ok(FlowFrame {
            graph: graph.clone(),
            node_id,
        })
    }

    /// The node this frame points at
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The shared graph this frame appends into
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Content hash of the frame's node
    pub fn content_hash(&self) -> Result<String> {
        lock(&self.graph).content_hash(self.node_id)
    }

    /// Keep rows matching a bracketed-formula predicate
    pub fn filter(&self, expression: impl Into<String>) -> Result<FlowFrame> {
        self.append(NodePayload::Filter(FilterSettings {
            mode: FilterMode::Advanced,
            basic: None,
            advanced: Some(expression.into()),
        }))
    }

    /// Keep rows matching a structured filter form
    pub fn filter_basic(&self, basic: BasicFilter) -> Result<FlowFrame> {
        self.append(NodePayload::Filter(FilterSettings {
            mode: FilterMode::Basic,
            basic: Some(basic),
            advanced: None,
        }))
    }

    /// Add one derived column from a bracketed-formula expression
    pub fn with_column(
        &self,
        name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Result<FlowFrame> {
        self.append(NodePayload::Formula(FormulaSettings {
            name: name.into(),
            data_type: None,
            expression: expression.into(),
        }))
    }

    /// Add one derived column with a declared output type
    pub fn with_column_typed(
        &self,
        name: impl Into<String>,
        dtype: LogicalType,
        expression: impl Into<String>,
    ) -> Result<FlowFrame> {
        self.append(NodePayload::Formula(FormulaSettings {
            name: name.into(),
            data_type: Some(dtype),
            expression: expression.into(),
        }))
    }

    /// Project, rename, and reorder with a full select form
    pub fn select(&self, columns: Vec<SelectColumn>) -> Result<FlowFrame> {
        self.append(NodePayload::Select(SelectSettings { columns }))
    }

    /// Keep the named columns, in the given order
    pub fn select_columns(&self, names: &[&str]) -> Result<FlowFrame> {
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| SelectColumn {
                old_name: name.to_string(),
                new_name: None,
                keep: true,
                position: i,
                data_type: None,
                cast: false,
            })
            .collect();
        self.select(columns)
    }

    /// Sort by `(column, direction)` pairs
    pub fn sort(&self, by: Vec<SortColumn>) -> Result<FlowFrame> {
        self.append(NodePayload::Sort(SortSettings { columns: by }))
    }

    /// Sort descending by one column
    pub fn sort_desc(&self, column: impl Into<String>) -> Result<FlowFrame> {
        self.sort(vec![SortColumn {
            column: column.into(),
            direction: SortDirection::Desc,
        }])
    }

    /// Distinct rows over a column subset (`None` = all columns)
    pub fn unique(&self, columns: Option<Vec<String>>, strategy: UniqueKeep) -> Result<FlowFrame> {
        self.append(NodePayload::Unique(UniqueSettings { columns, strategy }))
    }

    /// First `n` rows
    pub fn head(&self, n: i64) -> Result<FlowFrame> {
        self.append(NodePayload::Sample(SampleSettings { n }))
    }

    /// Group by key columns; finish with [`GroupedFrame::agg`]
    pub fn group_by(&self, keys: &[&str]) -> GroupedFrame {
        GroupedFrame {
            frame: self.clone(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Spread distinct values of `pivot_col` into columns
    pub fn pivot(
        &self,
        index_cols: &[&str],
        pivot_col: impl Into<String>,
        value_col: impl Into<String>,
        aggregation: AggFunction,
    ) -> Result<FlowFrame> {
        self.append(NodePayload::Pivot(PivotSettings {
            index_cols: index_cols.iter().map(|c| c.to_string()).collect(),
            pivot_col: pivot_col.into(),
            value_col: value_col.into(),
            aggregation,
        }))
    }

    /// Melt value columns into `variable` / `value` pairs
    pub fn unpivot(&self, id_cols: &[&str], value_cols: &[&str]) -> Result<FlowFrame> {
        self.append(NodePayload::Unpivot(UnpivotSettings {
            id_cols: id_cols.iter().map(|c| c.to_string()).collect(),
            value_cols: value_cols.iter().map(|c| c.to_string()).collect(),
            selector: None,
        }))
    }

    /// Join this frame (left) with another frame of the same graph
    pub fn join(
        &self,
        other: &FlowFrame,
        mapping: Vec<JoinPair>,
        strategy: JoinStrategy,
    ) -> Result<FlowFrame> {
        if !Arc::ptr_eq(&self.graph, &other.graph) {
            return Err(FlowError::invalid_settings(
                "join",
                "both sides of a join must come from the same graph",
            ));
        }
        let payload = NodePayload::Join(JoinSettings {
            mapping,
            strategy,
            left_select: None,
            right_select: None,
        });
        let mut graph = lock(&self.graph);
        let id = graph.add_node(payload)?;
        graph.connect(self.node_id, id, InputSlot::Left)?;
        graph.connect(other.node_id, id, InputSlot::Right)?;
        drop(graph);
        Ok(self.at(id))
    }

    /// Concatenate this frame with others
    pub fn union(&self, others: &[&FlowFrame], how: UnionMode) -> Result<FlowFrame> {
        for other in others {
            if !Arc::ptr_eq(&self.graph, &other.graph) {
                return Err(FlowError::invalid_settings(
                    "union",
                    "all inputs of a union must come from the same graph",
                ));
            }
        }
        let mut graph = lock(&self.graph);
        let id = graph.add_node(NodePayload::Union(UnionSettings { how }))?;
        graph.connect(self.node_id, id, InputSlot::MainAt(0))?;
        for (i, other) in others.iter().enumerate() {
            graph.connect(other.node_id, id, InputSlot::MainAt(i + 1))?;
        }
        drop(graph);
        Ok(self.at(id))
    }

    /// The escape hatch: a raw-code node carrying engine source text.
    ///
    /// The node is tagged raw code, its settings store the source verbatim,
    /// and its schema is unknown unless `declared_schema` is given.
    pub fn raw_code(
        &self,
        code: impl Into<String>,
        declared_schema: Option<Schema>,
    ) -> Result<FlowFrame> {
        let payload = NodePayload::RawCode(RawCodeSettings {
            code: code.into(),
            declared_schema,
        });
        let mut graph = lock(&self.graph);
        let id = graph.add_node(payload)?;
        graph.connect(self.node_id, id, InputSlot::MainAt(0))?;
        drop(graph);
        Ok(self.at(id))
    }

    /// Terminal side-effect sink
    pub fn write_output(&self, settings: OutputSettings) -> Result<FlowFrame> {
        self.append(NodePayload::Output(settings))
    }

    /// Materialize this frame's node through the execution engine
    pub fn collect(&self) -> Result<DataTable> {
        let mut graph = lock(&self.graph);
        ExecutionEngine::new().execute_node(&mut graph, self.node_id, &CancelToken::new(), true)
    }

    /// Predicted schema of this frame's node, when known
    pub fn predicted_schema(&self) -> Option<Schema> {
        lock(&self.graph)
            .get_node(self.node_id)
            .ok()
            .and_then(|n| n.predicted_schema().cloned())
    }

    fn append(&self, payload: NodePayload) -> Result<FlowFrame> {
        let mut graph = lock(&self.graph);
        let id = graph.add_node(payload)?;
        graph.connect(self.node_id, id, InputSlot::Main)?;
        drop(graph);
        Ok(self.at(id))
    }

    fn at(&self, node_id: NodeId) -> FlowFrame {
        FlowFrame {
            graph: self.graph.clone(),
            node_id,
        }
    }
}

/// Pending group-by: keys chosen, aggregations outstanding
pub struct GroupedFrame {
    frame: FlowFrame,
    keys: Vec<String>,
}

impl GroupedFrame {
    /// Finish the group-by with `(input column, function, output name)`
    /// aggregations; an empty list yields the distinct keys
    pub fn agg(self, aggregations: Vec<Aggregation>) -> Result<FlowFrame> {
        self.frame.append(NodePayload::GroupBy(GroupBySettings {
            keys: self.keys,
            aggregations,
        }))
    }
}

fn lock(graph: &SharedGraph) -> MutexGuard<'_, FlowGraph> {
    // A poisoned lock means a writer panicked mid-edit; propagating the
    // panic is the only sound option for a single-writer graph.
    graph.lock().expect("flow graph lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ExecutionMode;
    use serde_json::json;

    fn sales_columns() -> Vec<Field> {
        vec![
            Field::new("region", LogicalType::String),
            Field::new("qty", LogicalType::Int64),
            Field::new("price", LogicalType::Int64),
        ]
    }

    fn sales_rows() -> Vec<Vec<Value>> {
        vec![
            vec![json!("N"), json!(10), json!(150)],
            vec![json!("S"), json!(5), json!(300)],
            vec![json!("N"), json!(20), json!(250)],
            vec![json!("E"), json!(8), json!(200)],
        ]
    }

    fn aggregations() -> Vec<Aggregation> {
        vec![
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
        ]
    }

    #[test]
    fn test_builder_pipeline_collects() {
        let graph = FlowFrame::new_graph(1, "sales");
        let result = FlowFrame::manual_input(&graph, sales_columns(), sales_rows())
            .unwrap()
            .with_column("total", "[qty] * [price]")
            .unwrap()
            .filter("[total] > 1500")
            .unwrap()
            .group_by(&["region"])
            .agg(aggregations())
            .unwrap()
            .sort_desc("total_revenue")
            .unwrap();

        let table = result.collect().unwrap();
        assert_eq!(
            table.to_records(),
            vec![
                json!({"region": "N", "total_revenue": 5000, "avg_total": 5000.0}),
                json!({"region": "E", "total_revenue": 1600, "avg_total": 1600.0}),
            ]
        );
    }

    #[test]
    fn test_dual_surface_equivalence() {
        // Builder surface.
        let built = {
            let graph = FlowFrame::new_graph(1, "sales");
            let frame = FlowFrame::manual_input(&graph, sales_columns(), sales_rows())
                .unwrap()
                .with_column("total", "[qty] * [price]")
                .unwrap()
                .filter("[total] > 1500")
                .unwrap()
                .group_by(&["region"])
                .agg(aggregations())
                .unwrap();
            frame.content_hash().unwrap()
        };

        // Explicit settings-record surface.
        let explicit = {
            let mut graph = FlowGraph::new(1, "sales");
            let src = graph
                .add_node(NodePayload::ManualInput(ManualInputSettings {
                    columns: sales_columns(),
                    rows: sales_rows(),
                }))
                .unwrap();
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
                    aggregations: aggregations(),
                }))
                .unwrap();
            graph.connect(src, total, InputSlot::Main).unwrap();
            graph.connect(total, keep, InputSlot::Main).unwrap();
            graph.connect(keep, grouped, InputSlot::Main).unwrap();
            graph.content_hash(grouped).unwrap()
        };

        assert_eq!(built, explicit);
    }

    #[test]
    fn test_every_call_appends_a_node() {
        let graph = FlowFrame::new_graph(1, "appends");
        let frame = FlowFrame::manual_input(&graph, sales_columns(), sales_rows()).unwrap();
        let a = frame.filter("[qty] > 1").unwrap();
        let b = frame.filter("[qty] > 1").unwrap();

        // Identical operations still append distinct nodes...
        assert_ne!(a.node_id(), b.node_id());
        assert_eq!(lock(&graph).node_count(), 3);
        // ...with identical effective definitions.
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn test_join_across_graphs_rejected() {
        let g1 = FlowFrame::new_graph(1, "a");
        let g2 = FlowFrame::new_graph(2, "b");
        let left = FlowFrame::manual_input(&g1, sales_columns(), sales_rows()).unwrap();
        let right = FlowFrame::manual_input(&g2, sales_columns(), sales_rows()).unwrap();

        let err = left
            .join(
                &right,
                vec![JoinPair {
                    left_col: "region".to_string(),
                    right_col: "region".to_string(),
                }],
                JoinStrategy::Inner,
            )
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidSettings { .. }));
    }

    #[test]
    fn test_raw_code_is_schema_unknown() {
        let graph = FlowFrame::new_graph(1, "raw");
        let frame = FlowFrame::manual_input(&graph, sales_columns(), sales_rows()).unwrap();
        let raw = frame.raw_code("input.drop_nulls()", None).unwrap();
        assert!(raw.predicted_schema().is_none());

        let declared = frame
            .raw_code(
                "input.select(['region'])",
                Some(Schema::new(vec![Field::new("region", LogicalType::String)])),
            )
            .unwrap();
        assert!(declared.predicted_schema().is_some());
    }

    #[test]
    fn test_union_variadic_slots() {
        let graph = FlowFrame::new_graph(1, "union");
        let a = FlowFrame::manual_input(&graph, sales_columns(), sales_rows()).unwrap();
        let b = FlowFrame::manual_input(&graph, sales_columns(), sales_rows()).unwrap();
        let c = FlowFrame::manual_input(&graph, sales_columns(), sales_rows()).unwrap();

        let u = a.union(&[&b, &c], UnionMode::Vertical).unwrap();
        let table = u.collect().unwrap();
        assert_eq!(table.height(), 12);
    }

    #[test]
    fn test_builder_respects_graph_mode() {
        let graph = FlowFrame::new_graph(1, "mode");
        lock(&graph).settings.execution_mode = ExecutionMode::Performance;
        let frame = FlowFrame::manual_input(&graph, sales_columns(), sales_rows()).unwrap();
        let head = frame.head(2).unwrap();
        assert_eq!(head.collect().unwrap().height(), 2);
    }
}
