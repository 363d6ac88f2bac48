//! Lazy query plans
//!
//! A [`LazyFrame`] is a cheap value tree describing a query. Builder
//! methods wrap a plan in further operators; nothing runs until
//! [`LazyFrame::collect`] walks the tree, or [`LazyFrame::sink`] writes the
//! collected result through the atomic file writers. [`LazyFrame::explain`]
//! renders the plan, and a projection-pruning pass pushes column selection
//! into file scans before evaluation.

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;

use super::expr::{aggregate, compare_values, render, Expr};
use super::io::{self, ScanOptions};
use super::table::{cast_value, DataTable};
use super::{EngineError, EngineResult};
use crate::cancel::CancelToken;
use crate::settings::{
    AggFunction, FileFormat, JoinStrategy, UnionMode, UniqueKeep, WriteMode,
};
use crate::types::{Field, LogicalType, Schema};

/// One output column of a `select`
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Source column in the input
    pub column: String,
    /// Output name; defaults to the source name
    pub alias: Option<String>,
    /// Cast applied to the values
    pub cast: Option<LogicalType>,
}

impl Projection {
    pub fn named(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: None,
            cast: None,
        }
    }

    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

/// Lazy plan tree; evaluated only on `collect` / `sink`
#[derive(Debug, Clone, PartialEq)]
pub enum LazyFrame {
    /// In-memory table scan
    ScanTable(DataTable),
    /// File scan; `projection` is filled by the pruning pass
    ScanFile {
        path: PathBuf,
        format: FileFormat,
        options: ScanOptions,
        projection: Option<Vec<String>>,
    },
    Filter {
        input: Box<LazyFrame>,
        predicate: Expr,
    },
    WithColumn {
        input: Box<LazyFrame>,
        name: String,
        expr: Expr,
        dtype: Option<LogicalType>,
    },
    Select {
        input: Box<LazyFrame>,
        projections: Vec<Projection>,
    },
    Sort {
        input: Box<LazyFrame>,
        /// `(column, descending)`
        by: Vec<(String, bool)>,
    },
    Unique {
        input: Box<LazyFrame>,
        subset: Option<Vec<String>>,
        keep: UniqueKeep,
    },
    Limit {
        input: Box<LazyFrame>,
        n: usize,
    },
    GroupBy {
        input: Box<LazyFrame>,
        keys: Vec<String>,
        /// `(input column, function, output name)`
        aggs: Vec<(String, AggFunction, String)>,
    },
    Pivot {
        input: Box<LazyFrame>,
        index: Vec<String>,
        pivot_col: String,
        value_col: String,
        agg: AggFunction,
    },
    Unpivot {
        input: Box<LazyFrame>,
        id_cols: Vec<String>,
        value_cols: Vec<String>,
    },
    Join {
        left: Box<LazyFrame>,
        right: Box<LazyFrame>,
        /// `(left column, right column)` equality pairs
        pairs: Vec<(String, String)>,
        strategy: JoinStrategy,
    },
    Concat {
        inputs: Vec<LazyFrame>,
        how: UnionMode,
    },
}

impl LazyFrame {
    pub fn scan_table(table: DataTable) -> LazyFrame {
        LazyFrame::ScanTable(table)
    }

    pub fn scan_file(path: impl Into<PathBuf>, format: FileFormat, options: ScanOptions) -> LazyFrame {
        LazyFrame::ScanFile {
            path: path.into(),
            format,
            options,
            projection: None,
        }
    }

    pub fn filter(self, predicate: Expr) -> LazyFrame {
        LazyFrame::Filter {
            input: Box::new(self),
            predicate,
        }
    }

    pub fn with_column(self, name: impl Into<String>, expr: Expr, dtype: Option<LogicalType>) -> LazyFrame {
        LazyFrame::WithColumn {
            input: Box::new(self),
            name: name.into(),
            expr,
            dtype,
        }
    }

    pub fn select(self, projections: Vec<Projection>) -> LazyFrame {
        LazyFrame::Select {
            input: Box::new(self),
            projections,
        }
    }

    pub fn sort(self, by: Vec<(String, bool)>) -> LazyFrame {
        LazyFrame::Sort {
            input: Box::new(self),
            by,
        }
    }

    pub fn unique(self, subset: Option<Vec<String>>, keep: UniqueKeep) -> LazyFrame {
        LazyFrame::Unique {
            input: Box::new(self),
            subset,
            keep,
        }
    }

    pub fn limit(self, n: usize) -> LazyFrame {
        LazyFrame::Limit {
            input: Box::new(self),
            n,
        }
    }

    pub fn group_by(self, keys: Vec<String>, aggs: Vec<(String, AggFunction, String)>) -> LazyFrame {
        LazyFrame::GroupBy {
            input: Box::new(self),
            keys,
            aggs,
        }
    }

    pub fn pivot(
        self,
        index: Vec<String>,
        pivot_col: impl Into<String>,
        value_col: impl Into<String>,
        agg: AggFunction,
    ) -> LazyFrame {
        LazyFrame::Pivot {
            input: Box::new(self),
            index,
            pivot_col: pivot_col.into(),
            value_col: value_col.into(),
            agg,
        }
    }

    pub fn unpivot(self, id_cols: Vec<String>, value_cols: Vec<String>) -> LazyFrame {
        LazyFrame::Unpivot {
            input: Box::new(self),
            id_cols,
            value_cols,
        }
    }

    pub fn join(self, right: LazyFrame, pairs: Vec<(String, String)>, strategy: JoinStrategy) -> LazyFrame {
        LazyFrame::Join {
            left: Box::new(self),
            right: Box::new(right),
            pairs,
            strategy,
        }
    }

    pub fn concat(inputs: Vec<LazyFrame>, how: UnionMode) -> LazyFrame {
        LazyFrame::Concat { inputs, how }
    }

    /// Evaluate the plan into a table.
    ///
    /// The cancellation token is observed at every operator; a cancelled
    /// collect returns [`EngineError::Cancelled`] without partial results.
    pub fn collect(&self, token: &CancelToken) -> EngineResult<DataTable> {
        self.clone().optimize().evaluate(token)
    }

    /// Collect and write the result through the atomic sink writers.
    ///
    /// Returns the number of rows written.
    pub fn sink(
        &self,
        path: &std::path::Path,
        format: FileFormat,
        write_mode: WriteMode,
        delimiter: Option<char>,
        token: &CancelToken,
    ) -> EngineResult<usize> {
        let table = self.collect(token)?;
        io::write_table(&table, path, format, write_mode, delimiter)?;
        Ok(table.height())
    }

    /// Render the plan as an indented tree, leaves last
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        let line = match self {
            Self::ScanTable(t) => format!("SCAN TABLE rows={} cols={}", t.height(), t.width()),
            Self::ScanFile {
                path, format, projection, ..
            } => match projection {
                Some(cols) => format!(
                    "SCAN {} \"{}\" projection=[{}]",
                    format,
                    path.display(),
                    cols.join(", ")
                ),
                None => format!("SCAN {} \"{}\"", format, path.display()),
            },
            Self::Filter { predicate, .. } => format!("FILTER {}", predicate),
            Self::WithColumn { name, expr, .. } => format!("WITH COLUMN {} = {}", name, expr),
            Self::Select { projections, .. } => {
                let cols: Vec<String> = projections
                    .iter()
                    .map(|p| {
                        if p.alias.is_some() {
                            format!("{} as {}", p.column, p.output_name())
                        } else {
                            p.column.clone()
                        }
                    })
                    .collect();
                format!("SELECT [{}]", cols.join(", "))
            }
            Self::Sort { by, .. } => {
                let keys: Vec<String> = by
                    .iter()
                    .map(|(c, desc)| format!("{} {}", c, if *desc { "desc" } else { "asc" }))
                    .collect();
                format!("SORT by=[{}]", keys.join(", "))
            }
            Self::Unique { subset, .. } => match subset {
                Some(cols) => format!("UNIQUE subset=[{}]", cols.join(", ")),
                None => "UNIQUE".to_string(),
            },
            Self::Limit { n, .. } => format!("LIMIT {}", n),
            Self::GroupBy { keys, aggs, .. } => {
                let rendered: Vec<String> = aggs
                    .iter()
                    .map(|(col, f, out)| format!("{}({}) as {}", f, col, out))
                    .collect();
                format!("GROUP BY keys=[{}] aggs=[{}]", keys.join(", "), rendered.join(", "))
            }
            Self::Pivot {
                index,
                pivot_col,
                value_col,
                agg,
                ..
            } => format!(
                "PIVOT index=[{}] on={} values={} agg={}",
                index.join(", "),
                pivot_col,
                value_col,
                agg
            ),
            Self::Unpivot {
                id_cols, value_cols, ..
            } => format!(
                "UNPIVOT id=[{}] values=[{}]",
                id_cols.join(", "),
                value_cols.join(", ")
            ),
            Self::Join { pairs, strategy, .. } => {
                let on: Vec<String> = pairs
                    .iter()
                    .map(|(l, r)| format!("{} = {}", l, r))
                    .collect();
                format!("JOIN {:?} on [{}]", strategy, on.join(", "))
            }
            Self::Concat { how, inputs } => {
                format!("CONCAT {:?} inputs={}", how, inputs.len())
            }
        };
        out.push_str(&pad);
        out.push_str(&line);
        out.push('\n');
        match self {
            Self::ScanTable(_) | Self::ScanFile { .. } => {}
            Self::Filter { input, .. }
            | Self::WithColumn { input, .. }
            | Self::Select { input, .. }
            | Self::Sort { input, .. }
            | Self::Unique { input, .. }
            | Self::Limit { input, .. }
            | Self::GroupBy { input, .. }
            | Self::Pivot { input, .. }
            | Self::Unpivot { input, .. } => input.explain_into(out, depth + 1),
            Self::Join { left, right, .. } => {
                left.explain_into(out, depth + 1);
                right.explain_into(out, depth + 1);
            }
            Self::Concat { inputs, .. } => {
                for input in inputs {
                    input.explain_into(out, depth + 1);
                }
            }
        }
    }

    /// Push column requirements down to file scans
    pub fn optimize(self) -> LazyFrame {
        self.push_projection(None)
    }

    fn push_projection(self, needed: Option<HashSet<String>>) -> LazyFrame {
        match self {
            Self::ScanFile {
                path,
                format,
                options,
                projection,
            } => {
                let projection = projection.or_else(|| {
                    needed.map(|set| {
                        let mut cols: Vec<String> = set.into_iter().collect();
                        cols.sort();
                        cols
                    })
                });
                Self::ScanFile {
                    path,
                    format,
                    options,
                    projection,
                }
            }
            Self::ScanTable(t) => Self::ScanTable(t),
            Self::Select { input, projections } => {
                let set: HashSet<String> =
                    projections.iter().map(|p| p.column.clone()).collect();
                Self::Select {
                    input: Box::new(input.push_projection(Some(set))),
                    projections,
                }
            }
            Self::Filter { input, predicate } => {
                let needed = needed.map(|mut set| {
                    let mut cols = Vec::new();
                    predicate.referenced_columns(&mut cols);
                    set.extend(cols);
                    set
                });
                Self::Filter {
                    input: Box::new(input.push_projection(needed)),
                    predicate,
                }
            }
            Self::WithColumn {
                input,
                name,
                expr,
                dtype,
            } => {
                let needed = needed.map(|mut set| {
                    set.remove(&name);
                    let mut cols = Vec::new();
                    expr.referenced_columns(&mut cols);
                    set.extend(cols);
                    set
                });
                Self::WithColumn {
                    input: Box::new(input.push_projection(needed)),
                    name,
                    expr,
                    dtype,
                }
            }
            Self::Sort { input, by } => {
                let needed = needed.map(|mut set| {
                    set.extend(by.iter().map(|(c, _)| c.clone()));
                    set
                });
                Self::Sort {
                    input: Box::new(input.push_projection(needed)),
                    by,
                }
            }
            Self::Unique { input, subset, keep } => {
                let needed = match (&subset, needed) {
                    (Some(cols), Some(mut set)) => {
                        set.extend(cols.iter().cloned());
                        Some(set)
                    }
                    // Unique over all columns needs every column.
                    (None, _) => None,
                    (_, none) => none,
                };
                Self::Unique {
                    input: Box::new(input.push_projection(needed)),
                    subset,
                    keep,
                }
            }
            Self::Limit { input, n } => Self::Limit {
                input: Box::new(input.push_projection(needed)),
                n,
            },
            Self::GroupBy { input, keys, aggs } => {
                let mut set: HashSet<String> = keys.iter().cloned().collect();
                set.extend(aggs.iter().map(|(col, _, _)| col.clone()));
                Self::GroupBy {
                    input: Box::new(input.push_projection(Some(set))),
                    keys,
                    aggs,
                }
            }
            // Conservative: reshaping and multi-input operators keep all
            // upstream columns.
            Self::Pivot {
                input,
                index,
                pivot_col,
                value_col,
                agg,
            } => Self::Pivot {
                input: Box::new(input.push_projection(None)),
                index,
                pivot_col,
                value_col,
                agg,
            },
            Self::Unpivot {
                input,
                id_cols,
                value_cols,
            } => Self::Unpivot {
                input: Box::new(input.push_projection(None)),
                id_cols,
                value_cols,
            },
            Self::Join {
                left,
                right,
                pairs,
                strategy,
            } => Self::Join {
                left: Box::new(left.push_projection(None)),
                right: Box::new(right.push_projection(None)),
                pairs,
                strategy,
            },
            Self::Concat { inputs, how } => Self::Concat {
                inputs: inputs
                    .into_iter()
                    .map(|i| i.push_projection(None))
                    .collect(),
                how,
            },
        }
    }

    fn evaluate(self, token: &CancelToken) -> EngineResult<DataTable> {
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match self {
            Self::ScanTable(table) => Ok(table),
            Self::ScanFile {
                path,
                format,
                options,
                projection,
            } => {
                let table = io::read_table(&path, format, &options)?;
                match projection {
                    Some(cols) => {
                        let projections = table
                            .schema
                            .fields
                            .iter()
                            .filter(|f| cols.iter().any(|c| *c == f.name))
                            .map(|f| Projection::named(f.name.clone()))
                            .collect();
                        apply_select(table, projections)
                    }
                    None => Ok(table),
                }
            }
            Self::Filter { input, predicate } => {
                let table = input.evaluate(token)?;
                let mut rows = Vec::new();
                for row in table.rows {
                    if predicate.eval(&table.schema, &row)? == Value::Bool(true) {
                        rows.push(row);
                    }
                }
                Ok(DataTable {
                    schema: table.schema,
                    rows,
                })
            }
            Self::WithColumn {
                input,
                name,
                expr,
                dtype,
            } => {
                let table = input.evaluate(token)?;
                let out_type = match &dtype {
                    Some(t) => t.clone(),
                    None => expr.infer_type(&table.schema)?,
                };
                let schema = table.schema.with_field(Field::new(name.clone(), out_type.clone()));
                let replace_at = table.schema.index_of(&name);
                let mut rows = Vec::with_capacity(table.rows.len());
                for mut row in table.rows {
                    let mut value = expr.eval(&table.schema, &row)?;
                    if dtype.is_some() {
                        value = cast_value(&value, &out_type)?;
                    }
                    match replace_at {
                        Some(idx) => row[idx] = value,
                        None => row.push(value),
                    }
                    rows.push(row);
                }
                Ok(DataTable { schema, rows })
            }
            Self::Select { input, projections } => {
                let table = input.evaluate(token)?;
                apply_select(table, projections)
            }
            Self::Sort { input, by } => {
                let table = input.evaluate(token)?;
                if by.is_empty() {
                    return Ok(table);
                }
                let mut indices = Vec::with_capacity(by.len());
                for (col, desc) in &by {
                    let idx = table.schema.index_of(col).ok_or_else(|| {
                        EngineError::compute(format!("sort column '{}' not found", col))
                    })?;
                    indices.push((idx, *desc));
                }
                let mut rows = table.rows;
                rows.sort_by(|a, b| {
                    for (idx, desc) in &indices {
                        let ord = compare_values(&a[*idx], &b[*idx]).unwrap_or(Ordering::Equal);
                        let ord = if *desc { ord.reverse() } else { ord };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                });
                Ok(DataTable {
                    schema: table.schema,
                    rows,
                })
            }
            Self::Unique { input, subset, keep } => {
                let table = input.evaluate(token)?;
                apply_unique(table, subset, keep)
            }
            Self::Limit { input, n } => {
                let table = input.evaluate(token)?;
                Ok(table.head(n))
            }
            Self::GroupBy { input, keys, aggs } => {
                let table = input.evaluate(token)?;
                apply_group_by(table, keys, aggs)
            }
            Self::Pivot {
                input,
                index,
                pivot_col,
                value_col,
                agg,
            } => {
                let table = input.evaluate(token)?;
                apply_pivot(table, index, pivot_col, value_col, agg)
            }
            Self::Unpivot {
                input,
                id_cols,
                value_cols,
            } => {
                let table = input.evaluate(token)?;
                apply_unpivot(table, id_cols, value_cols)
            }
            Self::Join {
                left,
                right,
                pairs,
                strategy,
            } => {
                let l = left.evaluate(token)?;
                let r = right.evaluate(token)?;
                apply_join(l, r, pairs, strategy)
            }
            Self::Concat { inputs, how } => {
                let mut tables = Vec::with_capacity(inputs.len());
                for input in inputs {
                    tables.push(input.evaluate(token)?);
                }
                apply_concat(tables, how)
            }
        }
    }
}

fn apply_select(table: DataTable, projections: Vec<Projection>) -> EngineResult<DataTable> {
    let mut fields = Vec::with_capacity(projections.len());
    let mut sources = Vec::with_capacity(projections.len());
    for p in &projections {
        let idx = table.schema.index_of(&p.column).ok_or_else(|| {
            EngineError::compute(format!("select column '{}' not found", p.column))
        })?;
        let dtype = match &p.cast {
            Some(t) => t.clone(),
            None => table.schema.fields[idx].dtype.clone(),
        };
        fields.push(Field::new(p.output_name().to_string(), dtype));
        sources.push((idx, p.cast.clone()));
    }
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut out = Vec::with_capacity(sources.len());
        for (idx, cast) in &sources {
            let value = match cast {
                Some(t) => cast_value(&row[*idx], t)?,
                None => row[*idx].clone(),
            };
            out.push(value);
        }
        rows.push(out);
    }
    Ok(DataTable {
        schema: Schema::new(fields),
        rows,
    })
}

fn group_key(row: &[Value], indices: &[usize]) -> String {
    // Canonical JSON of the key tuple; cheap and hashable.
    let key: Vec<&Value> = indices.iter().map(|&i| &row[i]).collect();
    serde_json::to_string(&key).unwrap_or_default()
}

fn apply_unique(
    table: DataTable,
    subset: Option<Vec<String>>,
    keep: UniqueKeep,
) -> EngineResult<DataTable> {
    let cols: Vec<String> = match subset {
        Some(cols) if !cols.is_empty() => cols,
        // Empty column list means all columns.
        _ => table.schema.names().iter().map(|s| s.to_string()).collect(),
    };
    let mut indices = Vec::with_capacity(cols.len());
    for col in &cols {
        indices.push(table.schema.index_of(col).ok_or_else(|| {
            EngineError::compute(format!("unique column '{}' not found", col))
        })?);
    }

    use std::collections::HashMap;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in &table.rows {
        *counts.entry(group_key(row, &indices)).or_insert(0) += 1;
    }

    let mut kept: Vec<Vec<Value>> = Vec::new();
    match keep {
        UniqueKeep::First | UniqueKeep::Any => {
            let mut seen = HashSet::new();
            for row in &table.rows {
                if seen.insert(group_key(row, &indices)) {
                    kept.push(row.clone());
                }
            }
        }
        UniqueKeep::Last => {
            let mut last: HashMap<String, usize> = HashMap::new();
            for (i, row) in table.rows.iter().enumerate() {
                last.insert(group_key(row, &indices), i);
            }
            let mut rows: Vec<usize> = last.into_values().collect();
            rows.sort_unstable();
            kept.extend(rows.into_iter().map(|i| table.rows[i].clone()));
        }
        UniqueKeep::None => {
            for row in &table.rows {
                if counts[&group_key(row, &indices)] == 1 {
                    kept.push(row.clone());
                }
            }
        }
    }
    Ok(DataTable {
        schema: table.schema,
        rows: kept,
    })
}

fn apply_group_by(
    table: DataTable,
    keys: Vec<String>,
    aggs: Vec<(String, AggFunction, String)>,
) -> EngineResult<DataTable> {
    let mut key_indices = Vec::with_capacity(keys.len());
    for key in &keys {
        key_indices.push(table.schema.index_of(key).ok_or_else(|| {
            EngineError::compute(format!("group key '{}' not found", key))
        })?);
    }
    let mut agg_indices = Vec::with_capacity(aggs.len());
    for (col, _, _) in &aggs {
        agg_indices.push(table.schema.index_of(col).ok_or_else(|| {
            EngineError::compute(format!("aggregation column '{}' not found", col))
        })?);
    }

    // Groups in first-seen row order for determinism.
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<usize>> = std::collections::HashMap::new();
    for (i, row) in table.rows.iter().enumerate() {
        let key = group_key(row, &key_indices);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(i);
    }
    if keys.is_empty() && table.rows.is_empty() {
        // Global aggregation over zero rows still yields one row.
        order.push(group_key(&[], &[]));
        groups.insert(group_key(&[], &[]), Vec::new());
    }

    let mut fields: Vec<Field> = key_indices
        .iter()
        .map(|&i| table.schema.fields[i].clone())
        .collect();
    for ((col, func, out), &idx) in aggs.iter().zip(&agg_indices) {
        let _ = col;
        let input_type = &table.schema.fields[idx].dtype;
        fields.push(Field::new(out.clone(), func.output_type(input_type)));
    }

    let mut rows = Vec::with_capacity(order.len());
    for key in order {
        let members = &groups[&key];
        let mut row: Vec<Value> = match members.first() {
            Some(&first) => key_indices
                .iter()
                .map(|&i| table.rows[first][i].clone())
                .collect(),
            None => Vec::new(),
        };
        for ((_, func, _), &idx) in aggs.iter().zip(&agg_indices) {
            let values: Vec<Value> = members
                .iter()
                .map(|&i| table.rows[i][idx].clone())
                .collect();
            row.push(aggregate(*func, &values)?);
        }
        rows.push(row);
    }
    Ok(DataTable {
        schema: Schema::new(fields),
        rows,
    })
}

fn apply_pivot(
    table: DataTable,
    index: Vec<String>,
    pivot_col: String,
    value_col: String,
    agg: AggFunction,
) -> EngineResult<DataTable> {
    let pivot_idx = table.schema.index_of(&pivot_col).ok_or_else(|| {
        EngineError::compute(format!("pivot column '{}' not found", pivot_col))
    })?;
    let value_idx = table.schema.index_of(&value_col).ok_or_else(|| {
        EngineError::compute(format!("value column '{}' not found", value_col))
    })?;
    let mut index_indices = Vec::with_capacity(index.len());
    for col in &index {
        index_indices.push(table.schema.index_of(col).ok_or_else(|| {
            EngineError::compute(format!("index column '{}' not found", col))
        })?);
    }

    // Distinct pivot values, sorted for a deterministic column order.
    let mut pivot_values: Vec<Value> = Vec::new();
    for row in &table.rows {
        let v = &row[pivot_idx];
        if !pivot_values.iter().any(|p| p == v) {
            pivot_values.push(v.clone());
        }
    }
    pivot_values.sort_by(|a, b| compare_values(a, b).unwrap_or(Ordering::Equal));

    // A zero-column index collapses everything into one synthetic group,
    // which disappears from the output schema: the singleton index is
    // synthesized and dropped.
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<usize>> = std::collections::HashMap::new();
    for (i, row) in table.rows.iter().enumerate() {
        let key = group_key(row, &index_indices);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(i);
    }

    let value_type = &table.schema.fields[value_idx].dtype;
    let mut fields: Vec<Field> = index_indices
        .iter()
        .map(|&i| table.schema.fields[i].clone())
        .collect();
    for pv in &pivot_values {
        fields.push(Field::new(render(pv), agg.output_type(value_type)));
    }

    let mut rows = Vec::with_capacity(order.len());
    for key in order {
        let members = &groups[&key];
        let first = members[0];
        let mut row: Vec<Value> = index_indices
            .iter()
            .map(|&i| table.rows[first][i].clone())
            .collect();
        for pv in &pivot_values {
            let values: Vec<Value> = members
                .iter()
                .filter(|&&i| table.rows[i][pivot_idx] == *pv)
                .map(|&i| table.rows[i][value_idx].clone())
                .collect();
            row.push(if values.is_empty() {
                Value::Null
            } else {
                aggregate(agg, &values)?
            });
        }
        rows.push(row);
    }

    Ok(DataTable {
        schema: Schema::new(fields),
        rows,
    })
}

fn apply_unpivot(
    table: DataTable,
    id_cols: Vec<String>,
    value_cols: Vec<String>,
) -> EngineResult<DataTable> {
    let mut id_indices = Vec::with_capacity(id_cols.len());
    for col in &id_cols {
        id_indices.push(table.schema.index_of(col).ok_or_else(|| {
            EngineError::compute(format!("id column '{}' not found", col))
        })?);
    }
    let mut value_indices = Vec::with_capacity(value_cols.len());
    for col in &value_cols {
        value_indices.push(table.schema.index_of(col).ok_or_else(|| {
            EngineError::compute(format!("value column '{}' not found", col))
        })?);
    }

    let mut value_type: Option<LogicalType> = None;
    for &idx in &value_indices {
        let t = table.schema.fields[idx].dtype.clone();
        value_type = Some(match value_type {
            None => t,
            Some(prev) => prev.supertype(&t),
        });
    }

    let mut fields: Vec<Field> = id_indices
        .iter()
        .map(|&i| table.schema.fields[i].clone())
        .collect();
    fields.push(Field::new("variable", LogicalType::String));
    fields.push(Field::new(
        "value",
        value_type.unwrap_or(LogicalType::String),
    ));

    let mut rows = Vec::with_capacity(table.rows.len() * value_indices.len());
    for row in &table.rows {
        for (&idx, name) in value_indices.iter().zip(&value_cols) {
            let mut out: Vec<Value> = id_indices.iter().map(|&i| row[i].clone()).collect();
            out.push(Value::String(name.clone()));
            out.push(row[idx].clone());
            rows.push(out);
        }
    }
    Ok(DataTable {
        schema: Schema::new(fields),
        rows,
    })
}

fn apply_join(
    left: DataTable,
    right: DataTable,
    pairs: Vec<(String, String)>,
    strategy: JoinStrategy,
) -> EngineResult<DataTable> {
    let mut left_keys = Vec::with_capacity(pairs.len());
    let mut right_keys = Vec::with_capacity(pairs.len());
    for (l, r) in &pairs {
        left_keys.push(left.schema.index_of(l).ok_or_else(|| {
            EngineError::compute(format!("left join column '{}' not found", l))
        })?);
        right_keys.push(right.schema.index_of(r).ok_or_else(|| {
            EngineError::compute(format!("right join column '{}' not found", r))
        })?);
    }

    // Right payload: all right columns except its join keys; collisions with
    // left names get a `_right` suffix.
    let right_payload: Vec<usize> = (0..right.schema.len())
        .filter(|i| !right_keys.contains(i))
        .collect();
    let mut fields = left.schema.fields.clone();
    if !matches!(strategy, JoinStrategy::Semi | JoinStrategy::Anti) {
        for &i in &right_payload {
            let f = &right.schema.fields[i];
            let name = if left.schema.contains(&f.name) {
                format!("{}_right", f.name)
            } else {
                f.name.clone()
            };
            fields.push(Field::new(name, f.dtype.clone()));
        }
    }
    let schema = Schema::new(fields);

    // Index the right side by key for the equality strategies.
    let mut right_index: std::collections::HashMap<String, Vec<usize>> =
        std::collections::HashMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        right_index
            .entry(group_key(row, &right_keys))
            .or_default()
            .push(i);
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    let mut matched_right: HashSet<usize> = HashSet::new();

    match strategy {
        JoinStrategy::Cross => {
            for lrow in &left.rows {
                for rrow in &right.rows {
                    let mut out = lrow.clone();
                    out.extend(right_payload.iter().map(|&i| rrow[i].clone()));
                    rows.push(out);
                }
            }
        }
        JoinStrategy::Semi | JoinStrategy::Anti => {
            for lrow in &left.rows {
                let has = right_index.contains_key(&group_key(lrow, &left_keys));
                if has == (strategy == JoinStrategy::Semi) {
                    rows.push(lrow.clone());
                }
            }
        }
        JoinStrategy::Inner | JoinStrategy::Left | JoinStrategy::Right | JoinStrategy::Outer => {
            for lrow in &left.rows {
                let key = group_key(lrow, &left_keys);
                match right_index.get(&key) {
                    Some(matches) => {
                        for &ri in matches {
                            matched_right.insert(ri);
                            let mut out = lrow.clone();
                            out.extend(right_payload.iter().map(|&i| right.rows[ri][i].clone()));
                            rows.push(out);
                        }
                    }
                    None => {
                        if matches!(strategy, JoinStrategy::Left | JoinStrategy::Outer) {
                            let mut out = lrow.clone();
                            out.extend(std::iter::repeat(Value::Null).take(right_payload.len()));
                            rows.push(out);
                        }
                    }
                }
            }
            if matches!(strategy, JoinStrategy::Right | JoinStrategy::Outer) {
                for (ri, rrow) in right.rows.iter().enumerate() {
                    if matched_right.contains(&ri) {
                        continue;
                    }
                    // Unmatched right rows surface their key values in the
                    // left key columns.
                    let mut out = vec![Value::Null; left.schema.len()];
                    for (&li, &rki) in left_keys.iter().zip(&right_keys) {
                        out[li] = rrow[rki].clone();
                    }
                    out.extend(right_payload.iter().map(|&i| rrow[i].clone()));
                    rows.push(out);
                }
            }
        }
    }

    DataTable::new(schema, rows)
}

fn apply_concat(tables: Vec<DataTable>, how: UnionMode) -> EngineResult<DataTable> {
    if tables.is_empty() {
        return Ok(DataTable::empty(Schema::empty()));
    }
    match how {
        UnionMode::Vertical => {
            let names: Vec<String> = tables[0].schema.names().iter().map(|s| s.to_string()).collect();
            for t in &tables[1..] {
                let other: Vec<String> = t.schema.names().iter().map(|s| s.to_string()).collect();
                if other != names {
                    return Err(EngineError::compute(format!(
                        "vertical concat requires matching columns: [{}] vs [{}]",
                        names.join(", "),
                        other.join(", ")
                    )));
                }
            }
            let mut fields = tables[0].schema.fields.clone();
            for t in &tables[1..] {
                for (f, other) in fields.iter_mut().zip(&t.schema.fields) {
                    f.dtype = f.dtype.supertype(&other.dtype);
                }
            }
            let rows = tables.into_iter().flat_map(|t| t.rows).collect();
            Ok(DataTable {
                schema: Schema::new(fields),
                rows,
            })
        }
        UnionMode::Diagonal => {
            // Column union in first-seen order.
            let mut fields: Vec<Field> = Vec::new();
            for t in &tables {
                for f in &t.schema.fields {
                    match fields.iter_mut().find(|existing| existing.name == f.name) {
                        Some(existing) => existing.dtype = existing.dtype.supertype(&f.dtype),
                        None => fields.push(f.clone()),
                    }
                }
            }
            let schema = Schema::new(fields);
            let mut rows = Vec::new();
            for t in &tables {
                for row in &t.rows {
                    let out = schema
                        .fields
                        .iter()
                        .map(|f| {
                            t.schema
                                .index_of(&f.name)
                                .map(|i| row[i].clone())
                                .unwrap_or(Value::Null)
                        })
                        .collect();
                    rows.push(out);
                }
            }
            Ok(DataTable { schema, rows })
        }
    }
}
