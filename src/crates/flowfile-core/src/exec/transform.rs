//! Settings-to-plan dispatch
//!
//! One function per run turns a node's validated settings plus its input
//! plans into an engine plan. This is the single place where the closed
//! kind set meets the engine surface; both execution strategies go through
//! it, which keeps their observable semantics identical.

use std::path::PathBuf;

use serde_json::Value;

use crate::engine::expr::{BinaryOp, Expr, ScalarFunc, UnaryOp};
use crate::engine::io::ScanOptions;
use crate::engine::lazy::{LazyFrame, Projection};
use crate::engine::DataTable;
use crate::error::{FlowError, Result};
use crate::formula;
use crate::graph::{FlowGraph, InputSlot, NodeId};
use crate::schema::{self, SchemaState};
use crate::settings::*;
use crate::types::Schema;

/// Build the lazy plan of `node_id` from its settings and input plans.
///
/// `inputs` carries one entry per satisfied slot; missing required slots
/// surface as [`FlowError::MissingUpstream`].
pub fn build_plan(
    graph: &FlowGraph,
    node_id: NodeId,
    mut inputs: Vec<(InputSlot, LazyFrame)>,
) -> Result<LazyFrame> {
    inputs.sort_by_key(|(slot, _)| *slot);
    let node = graph.get_node(node_id)?;

    match &node.settings.payload {
        NodePayload::SourceTable(s) => {
            let options = ScanOptions {
                delimiter: s.delimiter,
                has_header: s.has_header,
                skip_rows: s.skip_rows,
                declared: s.columns.as_ref().map(|cols| Schema::new(cols.clone())),
                limit: None,
            };
            Ok(LazyFrame::scan_file(
                PathBuf::from(&s.path),
                s.format,
                options,
            ))
        }
        NodePayload::ManualInput(s) => {
            let table = DataTable::new(s.schema(), s.rows.clone())
                .map_err(|e| FlowError::execution(node_id, e.to_string()))?;
            Ok(LazyFrame::scan_table(table))
        }
        NodePayload::Filter(s) => {
            let input = take_single(node_id, &mut inputs)?;
            let predicate = filter_expr(node_id, s)?;
            Ok(input.filter(predicate))
        }
        NodePayload::Select(s) => {
            let input = take_single(node_id, &mut inputs)?;
            Ok(input.select(projections_of(&s.columns)))
        }
        NodePayload::Sort(s) => {
            let input = take_single(node_id, &mut inputs)?;
            let by = s
                .columns
                .iter()
                .map(|c| (c.column.clone(), c.direction == SortDirection::Desc))
                .collect();
            Ok(input.sort(by))
        }
        NodePayload::Unique(s) => {
            let input = take_single(node_id, &mut inputs)?;
            Ok(input.unique(s.columns.clone(), s.strategy))
        }
        NodePayload::Sample(s) => {
            let input = take_single(node_id, &mut inputs)?;
            Ok(input.limit(s.n as usize))
        }
        NodePayload::Formula(s) => {
            let input = take_single(node_id, &mut inputs)?;
            let expr = formula::compile(&s.expression)
                .map_err(|e| FlowError::execution(node_id, format!("invalid formula: {}", e)))?;
            Ok(input.with_column(s.name.clone(), expr, s.data_type.clone()))
        }
        NodePayload::GroupBy(s) => {
            let input = take_single(node_id, &mut inputs)?;
            let aggs = s
                .aggregations
                .iter()
                .map(|a| (a.input_col.clone(), a.function, a.output_name.clone()))
                .collect();
            Ok(input.group_by(s.keys.clone(), aggs))
        }
        NodePayload::Pivot(s) => {
            let input = take_single(node_id, &mut inputs)?;
            Ok(input.pivot(
                s.index_cols.clone(),
                s.pivot_col.clone(),
                s.value_col.clone(),
                s.aggregation,
            ))
        }
        NodePayload::Unpivot(s) => {
            let input = take_single(node_id, &mut inputs)?;
            let value_cols = resolve_value_cols(graph, node_id, s)?;
            Ok(input.unpivot(s.id_cols.clone(), value_cols))
        }
        NodePayload::Join(s) => {
            let (left, right) = take_binary(node_id, &mut inputs)?;
            let left = match &s.left_select {
                Some(cols) => left.select(projections_of(cols)),
                None => left,
            };
            let right = match &s.right_select {
                Some(cols) => right.select(projections_of(cols)),
                None => right,
            };
            let pairs = s
                .mapping
                .iter()
                .map(|p| (p.left_col.clone(), p.right_col.clone()))
                .collect();
            Ok(left.join(right, pairs, s.strategy))
        }
        NodePayload::Union(s) => {
            if inputs.is_empty() {
                return Err(FlowError::MissingUpstream {
                    node: node_id,
                    slot: InputSlot::MainAt(0).to_string(),
                });
            }
            let frames = inputs.into_iter().map(|(_, frame)| frame).collect();
            Ok(LazyFrame::concat(frames, s.how))
        }
        NodePayload::RawCode(_) => Err(FlowError::execution(
            node_id,
            "the in-process engine cannot execute raw engine code",
        )),
        // The sink write is the executor's job; the plan is the input.
        NodePayload::Output(_) => take_single(node_id, &mut inputs),
    }
}

fn take_single(node_id: NodeId, inputs: &mut Vec<(InputSlot, LazyFrame)>) -> Result<LazyFrame> {
    match inputs
        .iter()
        .position(|(slot, _)| *slot == InputSlot::Main)
    {
        Some(idx) => Ok(inputs.remove(idx).1),
        None => Err(FlowError::MissingUpstream {
            node: node_id,
            slot: InputSlot::Main.to_string(),
        }),
    }
}

fn take_binary(
    node_id: NodeId,
    inputs: &mut Vec<(InputSlot, LazyFrame)>,
) -> Result<(LazyFrame, LazyFrame)> {
    let left = inputs
        .iter()
        .position(|(slot, _)| *slot == InputSlot::Left)
        .ok_or(FlowError::MissingUpstream {
            node: node_id,
            slot: InputSlot::Left.to_string(),
        })?;
    let left = inputs.remove(left).1;
    let right = inputs
        .iter()
        .position(|(slot, _)| *slot == InputSlot::Right)
        .ok_or(FlowError::MissingUpstream {
            node: node_id,
            slot: InputSlot::Right.to_string(),
        })?;
    let right = inputs.remove(right).1;
    Ok((left, right))
}

fn projections_of(columns: &[SelectColumn]) -> Vec<Projection> {
    let mut kept: Vec<&SelectColumn> = columns.iter().filter(|c| c.keep).collect();
    kept.sort_by_key(|c| c.position);
    kept.iter()
        .map(|c| Projection {
            column: c.old_name.clone(),
            alias: c.new_name.clone(),
            cast: if c.cast { c.data_type.clone() } else { None },
        })
        .collect()
}

/// Predicate of a filter node, from either dialect
pub fn filter_expr(node_id: NodeId, settings: &FilterSettings) -> Result<Expr> {
    match settings.mode {
        FilterMode::Advanced => {
            let source = settings.advanced.as_deref().unwrap_or_default();
            formula::compile(source).map_err(|e| {
                FlowError::execution(node_id, format!("invalid filter expression: {}", e))
            })
        }
        FilterMode::Basic => {
            let basic = settings.basic.as_ref().ok_or_else(|| {
                FlowError::invalid_settings("basic", "basic mode requires a basic filter")
            })?;
            Ok(basic_expr(basic))
        }
    }
}

/// Compile one basic-filter form entry to an engine predicate
fn basic_expr(basic: &BasicFilter) -> Expr {
    let col = Expr::col(basic.field.clone());
    let value = basic.value.clone().unwrap_or(Value::Null);
    match basic.operator {
        FilterOperator::Eq => Expr::binary(BinaryOp::Eq, col, Expr::Lit(value)),
        FilterOperator::Ne => Expr::binary(BinaryOp::Ne, col, Expr::Lit(value)),
        FilterOperator::Lt => Expr::binary(BinaryOp::Lt, col, Expr::Lit(value)),
        FilterOperator::Le => Expr::binary(BinaryOp::Le, col, Expr::Lit(value)),
        FilterOperator::Gt => Expr::binary(BinaryOp::Gt, col, Expr::Lit(value)),
        FilterOperator::Ge => Expr::binary(BinaryOp::Ge, col, Expr::Lit(value)),
        FilterOperator::Contains => Expr::Func {
            func: ScalarFunc::Contains,
            args: vec![col, Expr::Lit(value)],
        },
        FilterOperator::NotContains => Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(Expr::Func {
                func: ScalarFunc::Contains,
                args: vec![col, Expr::Lit(value)],
            }),
        },
        FilterOperator::StartsWith => Expr::Func {
            func: ScalarFunc::StartsWith,
            args: vec![col, Expr::Lit(value)],
        },
        FilterOperator::EndsWith => Expr::Func {
            func: ScalarFunc::EndsWith,
            args: vec![col, Expr::Lit(value)],
        },
        // Null probes ignore value and value2 entirely.
        FilterOperator::IsNull => Expr::IsNull(Box::new(col)),
        FilterOperator::IsNotNull => Expr::IsNotNull(Box::new(col)),
        FilterOperator::In | FilterOperator::NotIn => {
            let list = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            Expr::InList {
                expr: Box::new(col),
                list,
                negated: basic.operator == FilterOperator::NotIn,
            }
        }
        FilterOperator::Between => {
            let upper = basic.value2.clone().unwrap_or(Value::Null);
            Expr::binary(
                BinaryOp::And,
                Expr::binary(BinaryOp::Ge, col.clone(), Expr::Lit(value)),
                Expr::binary(BinaryOp::Le, col, Expr::Lit(upper)),
            )
        }
    }
}

/// Unpivot value columns, resolved against the propagated upstream schema
fn resolve_value_cols(
    graph: &FlowGraph,
    node_id: NodeId,
    s: &UnpivotSettings,
) -> Result<Vec<String>> {
    if !s.value_cols.is_empty() {
        return Ok(s.value_cols.clone());
    }
    let upstream = graph
        .inputs_of(node_id)
        .first()
        .map(|(_, up)| *up)
        .ok_or(FlowError::MissingUpstream {
            node: node_id,
            slot: InputSlot::Main.to_string(),
        })?;
    let state = &graph.get_node(upstream)?.schema_state;
    match state {
        SchemaState::Known(input_schema) => {
            schema::resolve_unpivot_columns(s.selector, &s.value_cols, &s.id_cols, input_schema)
                .map_err(|reason| FlowError::schema_unknown(node_id, reason))
        }
        _ => Err(FlowError::schema_unknown(
            node_id,
            format!("upstream node {} has unknown schema", upstream),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::types::{Field, LogicalType};
    use serde_json::json;

    fn people() -> DataTable {
        DataTable::new(
            Schema::new(vec![
                Field::new("name", LogicalType::String),
                Field::new("age", LogicalType::Int64),
            ]),
            vec![
                vec![json!("ada"), json!(36)],
                vec![json!("grace"), Value::Null],
                vec![json!("alan"), json!(41)],
            ],
        )
        .unwrap()
    }

    fn filter_rows(basic: BasicFilter) -> usize {
        let expr = basic_expr(&basic);
        LazyFrame::scan_table(people())
            .filter(expr)
            .collect(&CancelToken::new())
            .unwrap()
            .height()
    }

    #[test]
    fn test_is_null_ignores_value_fields() {
        let rows = filter_rows(BasicFilter {
            field: "age".to_string(),
            operator: FilterOperator::IsNull,
            value: Some(json!("ignored")),
            value2: Some(json!("also ignored")),
        });
        assert_eq!(rows, 1);

        let rows = filter_rows(BasicFilter {
            field: "age".to_string(),
            operator: FilterOperator::IsNotNull,
            value: None,
            value2: None,
        });
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_between_is_inclusive() {
        let rows = filter_rows(BasicFilter {
            field: "age".to_string(),
            operator: FilterOperator::Between,
            value: Some(json!(36)),
            value2: Some(json!(41)),
        });
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_string_operators() {
        let rows = filter_rows(BasicFilter {
            field: "name".to_string(),
            operator: FilterOperator::StartsWith,
            value: Some(json!("a")),
            value2: None,
        });
        assert_eq!(rows, 2);

        let rows = filter_rows(BasicFilter {
            field: "name".to_string(),
            operator: FilterOperator::NotContains,
            value: Some(json!("a")),
            value2: None,
        });
        // "grace" contains 'a'; every name here does.
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_in_list_operator() {
        let rows = filter_rows(BasicFilter {
            field: "name".to_string(),
            operator: FilterOperator::In,
            value: Some(json!(["ada", "alan"])),
            value2: None,
        });
        assert_eq!(rows, 2);

        let rows = filter_rows(BasicFilter {
            field: "name".to_string(),
            operator: FilterOperator::NotIn,
            value: Some(json!(["ada"])),
            value2: None,
        });
        assert_eq!(rows, 2);
    }
}
