//! Schema propagation without data
//!
//! Every node kind declares a schema rule `schema_of(settings, inputs)`;
//! the propagator runs those rules eagerly after each graph mutation, in
//! topological order, so downstream nodes always see fresh predictions.
//! Nodes whose schema cannot be derived (missing connection, dynamic pivot
//! columns, raw code without a declared schema) are marked schema-unknown
//! with a human-readable reason instead of a guess.
//!
//! The single exception to the no-data rule is a file source with no
//! declared columns: its schema is inferred once from a bounded probe of
//! the file and memoized until the node is edited.

use std::path::Path;

use crate::engine::io::{self, ScanOptions};
use crate::formula;
use crate::graph::{FlowGraph, InputSlot, NodeId};
use crate::settings::{
    JoinSettings, JoinStrategy, NodePayload, SelectColumn, UnpivotSelector,
};
use crate::types::{Field, LogicalType, Schema};

/// Outcome of schema prediction for one node
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaState {
    /// Fully predicted
    Known(Schema),
    /// Statically known prefix plus a data-dependent remainder (pivot)
    Partial {
        known: Schema,
        /// Description of the dynamic columns
        dynamic: String,
    },
    /// Not predictable; `reason` says why
    Unknown { reason: String },
}

impl SchemaState {
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown {
            reason: reason.into(),
        }
    }

    /// The schema when fully known
    pub fn known(&self) -> Option<&Schema> {
        match self {
            Self::Known(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

/// Recompute `schema_state` for every node, in topological order
pub fn propagate(graph: &mut FlowGraph) {
    let order = match graph.topological_order() {
        Ok(order) => order,
        Err(_) => {
            for id in graph.node_ids() {
                if let Ok(node) = graph.get_node_mut(id) {
                    node.schema_state = SchemaState::unknown("graph contains a cycle");
                }
            }
            return;
        }
    };

    for id in order {
        let (state, probed) = predict(graph, id);
        if let Ok(node) = graph.get_node_mut(id) {
            node.schema_state = state;
            if probed.is_some() {
                node.probed_schema = probed;
            }
        }
    }
}

/// Schema rule dispatch for one node; second element is a probe result to
/// memoize on the node
fn predict(graph: &FlowGraph, id: NodeId) -> (SchemaState, Option<Schema>) {
    let node = match graph.get_node(id) {
        Ok(node) => node,
        Err(_) => return (SchemaState::unknown("node not found"), None),
    };

    match &node.settings.payload {
        NodePayload::ManualInput(s) => (SchemaState::Known(s.schema()), None),
        NodePayload::SourceTable(s) => {
            if let Some(cols) = &s.columns {
                return (SchemaState::Known(Schema::new(cols.clone())), None);
            }
            if let Some(probed) = &node.probed_schema {
                return (SchemaState::Known(probed.clone()), None);
            }
            let options = ScanOptions {
                delimiter: s.delimiter,
                has_header: s.has_header,
                skip_rows: s.skip_rows,
                declared: None,
                limit: None,
            };
            match io::probe_schema(Path::new(&s.path), s.format, &options) {
                Ok(schema) => (SchemaState::Known(schema.clone()), Some(schema)),
                Err(e) => (
                    SchemaState::unknown(format!("cannot probe '{}': {}", s.path, e)),
                    None,
                ),
            }
        }
        NodePayload::RawCode(s) => match &s.declared_schema {
            Some(schema) => (SchemaState::Known(schema.clone()), None),
            None => (
                SchemaState::unknown("raw code node declares no schema"),
                None,
            ),
        },
        NodePayload::Filter(s) => {
            let input = match single_input(graph, id) {
                Ok(state) => state,
                Err(reason) => return (SchemaState::unknown(reason), None),
            };
            // Column checks need a concrete schema; partials pass through.
            let schema = match input {
                SchemaState::Known(schema) => schema,
                partial @ SchemaState::Partial { .. } => return (partial, None),
                unknown @ SchemaState::Unknown { .. } => {
                    return (
                        SchemaState::unknown(upstream_reason(graph, id, &unknown)),
                        None,
                    )
                }
            };
            match &s.basic {
                Some(basic) if !schema.contains(&basic.field) => (
                    SchemaState::unknown(format!("filter column '{}' not found", basic.field)),
                    None,
                ),
                _ => {
                    if let Some(expr) = &s.advanced {
                        if let Err(e) = formula::compile(expr) {
                            return (SchemaState::unknown(format!("invalid filter expression: {}", e)), None);
                        }
                    }
                    (SchemaState::Known(schema), None)
                }
            }
        }
        NodePayload::Sort(s) => {
            with_known_input(graph, id, |schema| {
                for col in &s.columns {
                    if !schema.contains(&col.column) {
                        return Err(format!("sort column '{}' not found", col.column));
                    }
                }
                Ok(schema.clone())
            })
        }
        NodePayload::Unique(s) => {
            with_known_input(graph, id, |schema| {
                if let Some(cols) = &s.columns {
                    for col in cols {
                        if !schema.contains(col) {
                            return Err(format!("unique column '{}' not found", col));
                        }
                    }
                }
                Ok(schema.clone())
            })
        }
        NodePayload::Sample(_) | NodePayload::Output(_) => {
            let input = match single_input(graph, id) {
                Ok(state) => state,
                Err(reason) => return (SchemaState::unknown(reason), None),
            };
            match passthrough(&input) {
                Ok(state) => (state, None),
                Err(reason) => (SchemaState::unknown(reason), None),
            }
        }
        NodePayload::Select(s) => {
            with_known_input(graph, id, |schema| {
                let mut fields = Vec::new();
                for col in s.kept_in_order() {
                    let source = schema
                        .field(&col.old_name)
                        .ok_or_else(|| format!("select column '{}' not found", col.old_name))?;
                    let dtype = match (&col.data_type, col.cast) {
                        (Some(t), true) => t.clone(),
                        _ => source.dtype.clone(),
                    };
                    fields.push(Field::new(col.output_name().to_string(), dtype));
                }
                Ok(Schema::new(fields))
            })
        }
        NodePayload::Formula(s) => {
            with_known_input(graph, id, |schema| {
                let expr = formula::compile(&s.expression)
                    .map_err(|e| format!("invalid formula: {}", e))?;
                let dtype = match &s.data_type {
                    Some(t) => t.clone(),
                    None => expr
                        .infer_type(schema)
                        .map_err(|e| format!("cannot infer formula type: {}", e))?,
                };
                Ok(schema.with_field(Field::new(s.name.clone(), dtype)))
            })
        }
        NodePayload::GroupBy(s) => {
            with_known_input(graph, id, |schema| {
                let mut fields = Vec::new();
                for key in &s.keys {
                    let f = schema
                        .field(key)
                        .ok_or_else(|| format!("group key '{}' not found", key))?;
                    fields.push(f.clone());
                }
                for agg in &s.aggregations {
                    let f = schema
                        .field(&agg.input_col)
                        .ok_or_else(|| format!("aggregation column '{}' not found", agg.input_col))?;
                    fields.push(Field::new(
                        agg.output_name.clone(),
                        agg.function.output_type(&f.dtype),
                    ));
                }
                Ok(Schema::new(fields))
            })
        }
        NodePayload::Pivot(s) => {
            let input = match single_input(graph, id) {
                Ok(state) => state,
                Err(reason) => return (SchemaState::unknown(reason), None),
            };
            let schema = match input.known() {
                Some(schema) => schema,
                None => {
                    return (
                        SchemaState::unknown(upstream_reason(graph, id, &input)),
                        None,
                    )
                }
            };
            let mut known = Vec::new();
            for col in &s.index_cols {
                match schema.field(col) {
                    Some(f) => known.push(f.clone()),
                    None => {
                        return (
                            SchemaState::unknown(format!("index column '{}' not found", col)),
                            None,
                        )
                    }
                }
            }
            if !schema.contains(&s.pivot_col) {
                return (
                    SchemaState::unknown(format!("pivot column '{}' not found", s.pivot_col)),
                    None,
                );
            }
            if !schema.contains(&s.value_col) {
                return (
                    SchemaState::unknown(format!("value column '{}' not found", s.value_col)),
                    None,
                );
            }
            // Distinct pivot values are unknown at design time.
            (
                SchemaState::Partial {
                    known: Schema::new(known),
                    dynamic: format!("value-of({}) x {}", s.pivot_col, s.aggregation),
                },
                None,
            )
        }
        NodePayload::Unpivot(s) => {
            with_known_input(graph, id, |schema| {
                for col in &s.id_cols {
                    if !schema.contains(col) {
                        return Err(format!("id column '{}' not found", col));
                    }
                }
                let value_cols = resolve_unpivot_columns(s.selector, &s.value_cols, &s.id_cols, schema)?;
                let mut value_type: Option<LogicalType> = None;
                for col in &value_cols {
                    let f = schema
                        .field(col)
                        .ok_or_else(|| format!("value column '{}' not found", col))?;
                    value_type = Some(match value_type {
                        None => f.dtype.clone(),
                        Some(prev) => prev.supertype(&f.dtype),
                    });
                }
                let mut fields: Vec<Field> = s
                    .id_cols
                    .iter()
                    .filter_map(|c| schema.field(c).cloned())
                    .collect();
                fields.push(Field::new("variable", LogicalType::String));
                fields.push(Field::new(
                    "value",
                    value_type.unwrap_or(LogicalType::String),
                ));
                Ok(Schema::new(fields))
            })
        }
        NodePayload::Join(s) => (join_schema(graph, id, s), None),
        NodePayload::Union(_) => {
            let inputs = graph.inputs_of(id);
            if inputs.is_empty() {
                return (SchemaState::unknown("union has no inputs"), None);
            }
            let mut schemas = Vec::with_capacity(inputs.len());
            for (_, upstream) in &inputs {
                match graph.get_node(*upstream).ok().map(|n| &n.schema_state) {
                    Some(SchemaState::Known(schema)) => schemas.push(schema.clone()),
                    _ => {
                        return (
                            SchemaState::unknown(format!(
                                "upstream node {} has unknown schema",
                                upstream
                            )),
                            None,
                        )
                    }
                }
            }
            // Aligned column union, first-seen order; types widen.
            let mut fields: Vec<Field> = Vec::new();
            for schema in &schemas {
                for f in &schema.fields {
                    match fields.iter_mut().find(|existing| existing.name == f.name) {
                        Some(existing) => existing.dtype = existing.dtype.supertype(&f.dtype),
                        None => fields.push(f.clone()),
                    }
                }
            }
            (SchemaState::Known(Schema::new(fields)), None)
        }
    }
}

/// Shorthand for kinds whose output is derivable only from a known input
fn with_known_input(
    graph: &FlowGraph,
    id: NodeId,
    rule: impl FnOnce(&Schema) -> Result<Schema, String>,
) -> (SchemaState, Option<Schema>) {
    let input = match single_input(graph, id) {
        Ok(state) => state,
        Err(reason) => return (SchemaState::unknown(reason), None),
    };
    match input.known() {
        Some(schema) => match rule(schema) {
            Ok(out) => (SchemaState::Known(out), None),
            Err(reason) => (SchemaState::unknown(reason), None),
        },
        None => (
            SchemaState::unknown(upstream_reason(graph, id, &input)),
            None,
        ),
    }
}

/// State of the single `main` input, or a reason it is unavailable
fn single_input(graph: &FlowGraph, id: NodeId) -> Result<SchemaState, String> {
    let inputs = graph.inputs_of(id);
    match inputs.as_slice() {
        [(InputSlot::Main, upstream)] => Ok(graph
            .get_node(*upstream)
            .map(|n| n.schema_state.clone())
            .unwrap_or_else(|_| SchemaState::unknown("upstream node missing"))),
        [] => Err("missing main input".to_string()),
        _ => Err("unexpected extra inputs".to_string()),
    }
}

fn upstream_reason(graph: &FlowGraph, id: NodeId, state: &SchemaState) -> String {
    let upstream = graph
        .inputs_of(id)
        .first()
        .map(|(_, up)| *up)
        .unwrap_or_default();
    match state {
        SchemaState::Partial { .. } => {
            format!("upstream node {} has a dynamic schema", upstream)
        }
        SchemaState::Unknown { reason } => {
            format!("upstream node {} has unknown schema: {}", upstream, reason)
        }
        SchemaState::Known(_) => String::new(),
    }
}

/// Pass a known or partial input straight through
fn passthrough(state: &SchemaState) -> Result<SchemaState, String> {
    match state {
        SchemaState::Known(_) | SchemaState::Partial { .. } => Ok(state.clone()),
        SchemaState::Unknown { reason } => Err(format!("upstream schema unknown: {}", reason)),
    }
}

/// Apply an optional select form to one side of a join
fn project_side(schema: &Schema, select: &Option<Vec<SelectColumn>>) -> Result<Schema, String> {
    match select {
        None => Ok(schema.clone()),
        Some(columns) => {
            let mut kept: Vec<&SelectColumn> = columns.iter().filter(|c| c.keep).collect();
            kept.sort_by_key(|c| c.position);
            let mut fields = Vec::with_capacity(kept.len());
            for col in kept {
                let source = schema
                    .field(&col.old_name)
                    .ok_or_else(|| format!("join select column '{}' not found", col.old_name))?;
                let dtype = match (&col.data_type, col.cast) {
                    (Some(t), true) => t.clone(),
                    _ => source.dtype.clone(),
                };
                fields.push(Field::new(col.output_name().to_string(), dtype));
            }
            Ok(Schema::new(fields))
        }
    }
}

fn join_schema(graph: &FlowGraph, id: NodeId, s: &JoinSettings) -> SchemaState {
    let inputs = graph.inputs_of(id);
    let left = inputs.iter().find(|(slot, _)| *slot == InputSlot::Left);
    let right = inputs.iter().find(|(slot, _)| *slot == InputSlot::Right);
    let (left, right) = match (left, right) {
        (Some((_, l)), Some((_, r))) => (*l, *r),
        (None, _) => return SchemaState::unknown("missing left input"),
        (_, None) => return SchemaState::unknown("missing right input"),
    };

    let left_schema = match graph.get_node(left).ok().map(|n| &n.schema_state) {
        Some(SchemaState::Known(schema)) => schema.clone(),
        _ => return SchemaState::unknown(format!("upstream node {} has unknown schema", left)),
    };
    let right_schema = match graph.get_node(right).ok().map(|n| &n.schema_state) {
        Some(SchemaState::Known(schema)) => schema.clone(),
        _ => return SchemaState::unknown(format!("upstream node {} has unknown schema", right)),
    };

    let left_schema = match project_side(&left_schema, &s.left_select) {
        Ok(schema) => schema,
        Err(reason) => return SchemaState::unknown(reason),
    };
    let right_schema = match project_side(&right_schema, &s.right_select) {
        Ok(schema) => schema,
        Err(reason) => return SchemaState::unknown(reason),
    };

    for pair in &s.mapping {
        if !left_schema.contains(&pair.left_col) {
            return SchemaState::unknown(format!("left join column '{}' not found", pair.left_col));
        }
        if !right_schema.contains(&pair.right_col) {
            return SchemaState::unknown(format!(
                "right join column '{}' not found",
                pair.right_col
            ));
        }
    }

    // Semi and anti joins keep only the left side.
    if matches!(s.strategy, JoinStrategy::Semi | JoinStrategy::Anti) {
        return SchemaState::Known(left_schema);
    }

    let right_keys: Vec<&str> = s.mapping.iter().map(|p| p.right_col.as_str()).collect();
    let mut fields = left_schema.fields.clone();
    for f in &right_schema.fields {
        if right_keys.contains(&f.name.as_str()) {
            continue;
        }
        let name = if left_schema.contains(&f.name) {
            format!("{}_right", f.name)
        } else {
            f.name.clone()
        };
        fields.push(Field::new(name, f.dtype.clone()));
    }
    SchemaState::Known(Schema::new(fields))
}

/// Resolve the melted column list from an explicit list or a selector
pub fn resolve_unpivot_columns(
    selector: Option<UnpivotSelector>,
    value_cols: &[String],
    id_cols: &[String],
    schema: &Schema,
) -> Result<Vec<String>, String> {
    if !value_cols.is_empty() {
        return Ok(value_cols.to_vec());
    }
    let selector = selector.ok_or_else(|| "unpivot has no value columns".to_string())?;
    let cols: Vec<String> = schema
        .fields
        .iter()
        .filter(|f| !id_cols.contains(&f.name))
        .filter(|f| match selector {
            UnpivotSelector::All => true,
            UnpivotSelector::Numeric => f.dtype.is_numeric(),
            UnpivotSelector::Float => {
                matches!(f.dtype, LogicalType::Float32 | LogicalType::Float64)
            }
            UnpivotSelector::String => f.dtype == LogicalType::String,
            UnpivotSelector::Date => f.dtype.is_temporal(),
        })
        .map(|f| f.name.clone())
        .collect();
    if cols.is_empty() {
        return Err("unpivot selector matched no columns".to_string());
    }
    Ok(cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FlowGraph;
    use crate::settings::*;
    use serde_json::json;

    fn sales_source() -> NodePayload {
        NodePayload::ManualInput(ManualInputSettings {
            columns: vec![
                Field::new("region", LogicalType::String),
                Field::new("qty", LogicalType::Int64),
                Field::new("price", LogicalType::Int64),
            ],
            rows: vec![vec![json!("N"), json!(10), json!(150)]],
        })
    }

    fn known(graph: &FlowGraph, id: NodeId) -> Schema {
        graph
            .get_node(id)
            .unwrap()
            .schema_state
            .known()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_formula_extends_schema() {
        let mut graph = FlowGraph::new(1, "t");
        let src = graph.add_node(sales_source()).unwrap();
        let f = graph
            .add_node(NodePayload::Formula(FormulaSettings {
                name: "total".to_string(),
                data_type: None,
                expression: "[qty] * [price]".to_string(),
            }))
            .unwrap();
        graph.connect(src, f, InputSlot::Main).unwrap();

        let schema = known(&graph, f);
        assert_eq!(schema.names(), vec!["region", "qty", "price", "total"]);
        assert_eq!(schema.field("total").unwrap().dtype, LogicalType::Int64);
    }

    #[test]
    fn test_group_by_schema_keys_then_aggs() {
        let mut graph = FlowGraph::new(1, "t");
        let src = graph.add_node(sales_source()).unwrap();
        let g = graph
            .add_node(NodePayload::GroupBy(GroupBySettings {
                keys: vec!["region".to_string()],
                aggregations: vec![
                    Aggregation {
                        input_col: "qty".to_string(),
                        function: AggFunction::Sum,
                        output_name: "total_qty".to_string(),
                    },
                    Aggregation {
                        input_col: "qty".to_string(),
                        function: AggFunction::Mean,
                        output_name: "avg_qty".to_string(),
                    },
                ],
            }))
            .unwrap();
        graph.connect(src, g, InputSlot::Main).unwrap();

        let schema = known(&graph, g);
        assert_eq!(schema.names(), vec!["region", "total_qty", "avg_qty"]);
        assert_eq!(schema.field("total_qty").unwrap().dtype, LogicalType::Int64);
        assert_eq!(schema.field("avg_qty").unwrap().dtype, LogicalType::Float64);
    }

    #[test]
    fn test_select_reorders_renames_casts() {
        let mut graph = FlowGraph::new(1, "t");
        let src = graph.add_node(sales_source()).unwrap();
        let sel = graph
            .add_node(NodePayload::Select(SelectSettings {
                columns: vec![
                    SelectColumn {
                        old_name: "qty".to_string(),
                        new_name: Some("quantity".to_string()),
                        keep: true,
                        position: 1,
                        data_type: Some(LogicalType::Float64),
                        cast: true,
                    },
                    SelectColumn {
                        old_name: "region".to_string(),
                        new_name: None,
                        keep: true,
                        position: 0,
                        data_type: None,
                        cast: false,
                    },
                    SelectColumn {
                        old_name: "price".to_string(),
                        new_name: None,
                        keep: false,
                        position: 2,
                        data_type: None,
                        cast: false,
                    },
                ],
            }))
            .unwrap();
        graph.connect(src, sel, InputSlot::Main).unwrap();

        let schema = known(&graph, sel);
        assert_eq!(schema.names(), vec!["region", "quantity"]);
        assert_eq!(
            schema.field("quantity").unwrap().dtype,
            LogicalType::Float64
        );
    }

    #[test]
    fn test_pivot_is_partial() {
        let mut graph = FlowGraph::new(1, "t");
        let src = graph.add_node(sales_source()).unwrap();
        let p = graph
            .add_node(NodePayload::Pivot(PivotSettings {
                index_cols: vec!["region".to_string()],
                pivot_col: "qty".to_string(),
                value_col: "price".to_string(),
                aggregation: AggFunction::Sum,
            }))
            .unwrap();
        graph.connect(src, p, InputSlot::Main).unwrap();

        match &graph.get_node(p).unwrap().schema_state {
            SchemaState::Partial { known, dynamic } => {
                assert_eq!(known.names(), vec!["region"]);
                assert!(dynamic.contains("value-of(qty)"));
            }
            other => panic!("expected partial schema, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_code_unknown_propagates_with_reason() {
        let mut graph = FlowGraph::new(1, "t");
        let raw = graph
            .add_node(NodePayload::RawCode(RawCodeSettings {
                code: "input.head()".to_string(),
                declared_schema: None,
            }))
            .unwrap();
        let sel = graph
            .add_node(NodePayload::Select(SelectSettings {
                columns: vec![SelectColumn {
                    old_name: "a".to_string(),
                    new_name: None,
                    keep: true,
                    position: 0,
                    data_type: None,
                    cast: false,
                }],
            }))
            .unwrap();
        graph.connect(raw, sel, InputSlot::Main).unwrap();

        // The select is unknown and its reason points at the upstream node.
        match &graph.get_node(sel).unwrap().schema_state {
            SchemaState::Unknown { reason } => {
                assert!(reason.contains(&format!("upstream node {}", raw)), "{}", reason);
            }
            other => panic!("expected unknown schema, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_input_is_unknown() {
        let mut graph = FlowGraph::new(1, "t");
        let f = graph
            .add_node(NodePayload::Filter(FilterSettings {
                mode: FilterMode::Advanced,
                basic: None,
                advanced: Some("[qty] > 1".to_string()),
            }))
            .unwrap();
        assert!(graph.get_node(f).unwrap().schema_state.is_unknown());
    }

    #[test]
    fn test_join_schema_drops_right_keys_and_suffixes() {
        let mut graph = FlowGraph::new(1, "t");
        let left = graph.add_node(sales_source()).unwrap();
        let right = graph
            .add_node(NodePayload::ManualInput(ManualInputSettings {
                columns: vec![
                    Field::new("region", LogicalType::String),
                    Field::new("qty", LogicalType::Int64),
                    Field::new("manager", LogicalType::String),
                ],
                rows: vec![],
            }))
            .unwrap();
        let join = graph
            .add_node(NodePayload::Join(JoinSettings {
                mapping: vec![JoinPair {
                    left_col: "region".to_string(),
                    right_col: "region".to_string(),
                }],
                strategy: JoinStrategy::Left,
                left_select: None,
                right_select: None,
            }))
            .unwrap();
        graph.connect(left, join, InputSlot::Left).unwrap();
        graph.connect(right, join, InputSlot::Right).unwrap();

        let schema = known(&graph, join);
        assert_eq!(
            schema.names(),
            vec!["region", "qty", "price", "qty_right", "manager"]
        );
    }

    #[test]
    fn test_unpivot_selector_numeric() {
        let mut graph = FlowGraph::new(1, "t");
        let src = graph.add_node(sales_source()).unwrap();
        let u = graph
            .add_node(NodePayload::Unpivot(UnpivotSettings {
                id_cols: vec!["region".to_string()],
                value_cols: vec![],
                selector: Some(UnpivotSelector::Numeric),
            }))
            .unwrap();
        graph.connect(src, u, InputSlot::Main).unwrap();

        let schema = known(&graph, u);
        assert_eq!(schema.names(), vec!["region", "variable", "value"]);
        assert_eq!(schema.field("value").unwrap().dtype, LogicalType::Int64);
    }

    #[test]
    fn test_union_diagonal_schema() {
        let mut graph = FlowGraph::new(1, "t");
        let a = graph.add_node(sales_source()).unwrap();
        let b = graph
            .add_node(NodePayload::ManualInput(ManualInputSettings {
                columns: vec![
                    Field::new("region", LogicalType::String),
                    Field::new("notes", LogicalType::String),
                ],
                rows: vec![],
            }))
            .unwrap();
        let u = graph
            .add_node(NodePayload::Union(UnionSettings {
                how: UnionMode::Diagonal,
            }))
            .unwrap();
        graph.connect(a, u, InputSlot::MainAt(0)).unwrap();
        graph.connect(b, u, InputSlot::MainAt(1)).unwrap();

        let schema = known(&graph, u);
        assert_eq!(schema.names(), vec!["region", "qty", "price", "notes"]);
    }
}
