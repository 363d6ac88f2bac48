//! Typed node settings
//!
//! Every node kind in the closed set has exactly one settings record. A
//! record is validated when it is attached to a graph and is immutable
//! afterwards; editing replaces the whole record. The per-kind payload is a
//! tagged variant discriminated by `kind`, so unknown kinds and malformed
//! payloads are rejected at the serde boundary, and contradictions (a basic
//! filter with no basic payload, a `between` without `value2`, duplicate
//! aggregation output names) are rejected by [`NodePayload::validate`].
//!
//! Shared fields (`flow_id`, `node_id`, `cache_results`, `description`,
//! canvas position) live on [`NodeSettings`] beside the payload. Only the
//! payload participates in content hashing: canvas edits never invalidate
//! downstream caches.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::error::{FlowError, Result};
use crate::graph::NodeId;
use crate::types::{Field, LogicalType, Schema};

/// Stable integer identity of a graph
pub type FlowId = u64;

/// Closed set of node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    SourceTable,
    ManualInput,
    Filter,
    Select,
    Sort,
    Unique,
    Sample,
    Formula,
    GroupBy,
    Pivot,
    Unpivot,
    Join,
    Union,
    RawCode,
    Output,
}

impl NodeKind {
    /// Declared input shape of this kind
    pub fn input_shape(&self) -> InputShape {
        match self {
            Self::SourceTable | Self::ManualInput => InputShape::Source,
            Self::Filter
            | Self::Select
            | Self::Sort
            | Self::Unique
            | Self::Sample
            | Self::Formula
            | Self::GroupBy
            | Self::Pivot
            | Self::Unpivot
            | Self::Output => InputShape::Single,
            Self::Join => InputShape::Binary,
            // Raw code accepts one or two inputs; union any number.
            Self::Union | Self::RawCode => InputShape::Variadic,
        }
    }

    /// Whether executing this kind performs a side effect (file write)
    pub fn is_side_effect(&self) -> bool {
        matches!(self, Self::Output)
    }

    /// Kind name as written in documents (`source_table`, `group_by`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceTable => "source_table",
            Self::ManualInput => "manual_input",
            Self::Filter => "filter",
            Self::Select => "select",
            Self::Sort => "sort",
            Self::Unique => "unique",
            Self::Sample => "sample",
            Self::Formula => "formula",
            Self::GroupBy => "group_by",
            Self::Pivot => "pivot",
            Self::Unpivot => "unpivot",
            Self::Join => "join",
            Self::Union => "union",
            Self::RawCode => "raw_code",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input shape declared by a node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    /// No inputs
    Source,
    /// One `main` slot
    Single,
    /// `left` and `right` slots
    Binary,
    /// Ordered `main[i]` slots
    Variadic,
}

/// Complete settings of one node: shared fields plus the per-kind payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Graph this node belongs to
    pub flow_id: FlowId,
    /// Node identity inside the graph
    pub node_id: NodeId,
    /// Persist a bounded sample in Development mode
    #[serde(default)]
    pub cache_results: bool,
    /// Free-text description, opaque to execution
    #[serde(default)]
    pub description: String,
    /// Canvas position, opaque to execution
    #[serde(default)]
    pub pos_x: f64,
    #[serde(default)]
    pub pos_y: f64,
    /// Per-kind payload, tagged by `kind`
    #[serde(flatten)]
    pub payload: NodePayload,
}

impl NodeSettings {
    /// Build and validate a settings record
    pub fn new(flow_id: FlowId, node_id: NodeId, payload: NodePayload) -> Result<Self> {
        payload.validate()?;
        Ok(Self {
            flow_id,
            node_id,
            cache_results: false,
            description: String::new(),
            pos_x: 0.0,
            pos_y: 0.0,
            payload,
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    /// Re-run payload validation (used when records arrive from documents)
    pub fn validate(&self) -> Result<()> {
        self.payload.validate()
    }

    /// Canonical JSON encoding of the payload, used for content hashing.
    ///
    /// `serde_json` objects are key-sorted, so equivalent records produce
    /// byte-identical encodings regardless of construction order.
    pub fn canonical_json(&self) -> Result<String> {
        let value = serde_json::to_value(&self.payload)?;
        Ok(serde_json::to_string(&value)?)
    }
}

/// Per-kind settings payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodePayload {
    SourceTable(SourceTableSettings),
    ManualInput(ManualInputSettings),
    Filter(FilterSettings),
    Select(SelectSettings),
    Sort(SortSettings),
    Unique(UniqueSettings),
    Sample(SampleSettings),
    Formula(FormulaSettings),
    GroupBy(GroupBySettings),
    Pivot(PivotSettings),
    Unpivot(UnpivotSettings),
    Join(JoinSettings),
    Union(UnionSettings),
    RawCode(RawCodeSettings),
    Output(OutputSettings),
}

impl NodePayload {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::SourceTable(_) => NodeKind::SourceTable,
            Self::ManualInput(_) => NodeKind::ManualInput,
            Self::Filter(_) => NodeKind::Filter,
            Self::Select(_) => NodeKind::Select,
            Self::Sort(_) => NodeKind::Sort,
            Self::Unique(_) => NodeKind::Unique,
            Self::Sample(_) => NodeKind::Sample,
            Self::Formula(_) => NodeKind::Formula,
            Self::GroupBy(_) => NodeKind::GroupBy,
            Self::Pivot(_) => NodeKind::Pivot,
            Self::Unpivot(_) => NodeKind::Unpivot,
            Self::Join(_) => NodeKind::Join,
            Self::Union(_) => NodeKind::Union,
            Self::RawCode(_) => NodeKind::RawCode,
            Self::Output(_) => NodeKind::Output,
        }
    }

    /// Validate the record against the construction contract.
    ///
    /// Fails with [`FlowError::InvalidSettings`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::SourceTable(s) => s.validate(),
            Self::ManualInput(s) => s.validate(),
            Self::Filter(s) => s.validate(),
            Self::Select(s) => s.validate(),
            Self::Sort(s) => s.validate(),
            Self::Unique(_) => Ok(()),
            Self::Sample(s) => s.validate(),
            Self::Formula(s) => s.validate(),
            Self::GroupBy(s) => s.validate(),
            Self::Pivot(s) => s.validate(),
            Self::Unpivot(s) => s.validate(),
            Self::Join(s) => s.validate(),
            Self::Union(_) => Ok(()),
            Self::RawCode(s) => s.validate(),
            Self::Output(s) => s.validate(),
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(FlowError::invalid_settings(field, "must not be empty"));
    }
    Ok(())
}

/// File formats understood by the engine's readers and writers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Csv,
    Parquet,
    Json,
    Excel,
    /// Output-only; the sole format supporting `append`
    Delta,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Json => "json",
            Self::Excel => "excel",
            Self::Delta => "delta",
        };
        f.write_str(s)
    }
}

/// `source_table`: read a file through the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTableSettings {
    pub path: String,
    pub format: FileFormat,
    /// Field delimiter for csv (defaults to `,`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    /// Whether the first csv row is a header (defaults to true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_header: Option<bool>,
    /// Text encoding label, forwarded to the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Rows to skip before the header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_rows: Option<u64>,
    /// Declared schema; when absent the engine probes the source once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Field>>,
}

impl SourceTableSettings {
    fn validate(&self) -> Result<()> {
        require_non_empty("path", &self.path)?;
        if self.format == FileFormat::Delta {
            return Err(FlowError::invalid_settings(
                "format",
                "delta is an output-only format",
            ));
        }
        if let Some(cols) = &self.columns {
            if cols.is_empty() {
                return Err(FlowError::invalid_settings(
                    "columns",
                    "declared schema must not be empty",
                ));
            }
        }
        Ok(())
    }
}

/// `manual_input`: literal rows typed into a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualInputSettings {
    pub columns: Vec<Field>,
    pub rows: Vec<Vec<Value>>,
}

impl ManualInputSettings {
    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(FlowError::invalid_settings("columns", "must not be empty"));
        }
        let mut seen = HashSet::new();
        for col in &self.columns {
            require_non_empty("columns.name", &col.name)?;
            if !seen.insert(col.name.as_str()) {
                return Err(FlowError::invalid_settings(
                    "columns",
                    format!("duplicate column name '{}'", col.name),
                ));
            }
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(FlowError::invalid_settings(
                    "rows",
                    format!(
                        "row {} has {} values, expected {}",
                        i,
                        row.len(),
                        self.columns.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Declared schema of the literal table
    pub fn schema(&self) -> Schema {
        Schema::new(self.columns.clone())
    }
}

/// Filter mode: a structured form or a free expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Basic,
    Advanced,
}

/// Comparison operators offered by the basic filter form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    In,
    NotIn,
    Between,
}

impl FilterOperator {
    /// Whether the operator consumes `value` at all
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// Structured half of the filter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicFilter {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Upper bound for `between`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value2: Option<Value>,
}

/// `filter`: keep rows matching a predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    pub mode: FilterMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicFilter>,
    /// Engine expression text used in advanced mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced: Option<String>,
}

impl FilterSettings {
    fn validate(&self) -> Result<()> {
        match self.mode {
            FilterMode::Basic => {
                let basic = self.basic.as_ref().ok_or_else(|| {
                    FlowError::invalid_settings("basic", "basic mode requires a basic filter")
                })?;
                require_non_empty("basic.field", &basic.field)?;
                if basic.operator.takes_value() && basic.value.is_none() {
                    return Err(FlowError::invalid_settings(
                        "basic.value",
                        format!("operator {:?} requires a value", basic.operator),
                    ));
                }
                if basic.operator == FilterOperator::Between && basic.value2.is_none() {
                    return Err(FlowError::invalid_settings(
                        "basic.value2",
                        "between operator requires value2",
                    ));
                }
                if matches!(basic.operator, FilterOperator::In | FilterOperator::NotIn)
                    && !matches!(basic.value, Some(Value::Array(_)))
                {
                    return Err(FlowError::invalid_settings(
                        "basic.value",
                        "in / not_in require a list value",
                    ));
                }
                Ok(())
            }
            FilterMode::Advanced => {
                let expr = self.advanced.as_deref().unwrap_or("");
                require_non_empty("advanced", expr)
            }
        }
    }
}

/// One entry of a select form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectColumn {
    pub old_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    pub keep: bool,
    /// Output ordering key among kept entries
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<LogicalType>,
    /// Apply `data_type` as a cast (requires `data_type`)
    #[serde(default)]
    pub cast: bool,
}

impl SelectColumn {
    /// Output column name after optional rename
    pub fn output_name(&self) -> &str {
        self.new_name.as_deref().unwrap_or(&self.old_name)
    }
}

/// `select`: reorder / rename / drop / cast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectSettings {
    pub columns: Vec<SelectColumn>,
}

impl SelectSettings {
    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(FlowError::invalid_settings("columns", "must not be empty"));
        }
        let mut out_names = HashSet::new();
        for col in &self.columns {
            require_non_empty("columns.old_name", &col.old_name)?;
            if col.cast && col.data_type.is_none() {
                return Err(FlowError::invalid_settings(
                    "columns.cast",
                    format!("cast requested for '{}' without a data_type", col.old_name),
                ));
            }
            if col.keep && !out_names.insert(col.output_name().to_string()) {
                return Err(FlowError::invalid_settings(
                    "columns.new_name",
                    format!("duplicate output column '{}'", col.output_name()),
                ));
            }
        }
        Ok(())
    }

    /// Kept entries sorted by `position` (ties broken by form order)
    pub fn kept_in_order(&self) -> Vec<&SelectColumn> {
        let mut kept: Vec<&SelectColumn> = self.columns.iter().filter(|c| c.keep).collect();
        kept.sort_by_key(|c| c.position);
        kept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortColumn {
    pub column: String,
    pub direction: SortDirection,
}

/// `sort`: multi-key ordering; an empty list is a pass-through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSettings {
    pub columns: Vec<SortColumn>,
}

impl SortSettings {
    fn validate(&self) -> Result<()> {
        for col in &self.columns {
            require_non_empty("columns.column", &col.column)?;
        }
        Ok(())
    }
}

/// Which duplicate to keep in `unique`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueKeep {
    First,
    Last,
    Any,
    /// Drop every row that has a duplicate
    None,
}

/// `unique`: distinct rows over a column subset (empty = all columns)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    pub strategy: UniqueKeep,
}

/// `sample`: bounded head of the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSettings {
    pub n: i64,
}

impl SampleSettings {
    fn validate(&self) -> Result<()> {
        if self.n < 0 {
            return Err(FlowError::invalid_settings("n", "sample size must be >= 0"));
        }
        Ok(())
    }
}

/// `formula`: one derived column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaSettings {
    pub name: String,
    /// Declared output type; inferred from the expression when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<LogicalType>,
    /// Bracketed-formula or engine expression text
    pub expression: String,
}

impl FormulaSettings {
    fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("expression", &self.expression)
    }
}

/// Aggregation functions offered by `group_by` and `pivot`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFunction {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    First,
    Last,
    NUnique,
    Concat,
}

impl AggFunction {
    /// Output type of the aggregation given the source column type
    pub fn output_type(&self, input: &LogicalType) -> LogicalType {
        match self {
            Self::Sum | Self::Min | Self::Max | Self::First | Self::Last => input.clone(),
            Self::Mean | Self::Median => LogicalType::Float64,
            Self::Count | Self::NUnique => LogicalType::UInt32,
            Self::Concat => LogicalType::String,
        }
    }
}

impl fmt::Display for AggFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::First => "first",
            Self::Last => "last",
            Self::NUnique => "n_unique",
            Self::Concat => "concat",
        };
        f.write_str(s)
    }
}

/// One aggregation of a `group_by`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub input_col: String,
    pub function: AggFunction,
    pub output_name: String,
}

/// `group_by`: keys plus aggregations; empty aggregations = distinct keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBySettings {
    pub keys: Vec<String>,
    pub aggregations: Vec<Aggregation>,
}

impl GroupBySettings {
    fn validate(&self) -> Result<()> {
        for key in &self.keys {
            require_non_empty("keys", key)?;
        }
        let mut names: HashSet<&str> = self.keys.iter().map(|k| k.as_str()).collect();
        for agg in &self.aggregations {
            require_non_empty("aggregations.input_col", &agg.input_col)?;
            require_non_empty("aggregations.output_name", &agg.output_name)?;
            if !names.insert(agg.output_name.as_str()) {
                return Err(FlowError::invalid_settings(
                    "aggregations.output_name",
                    format!("duplicate aggregation output name '{}'", agg.output_name),
                ));
            }
        }
        Ok(())
    }
}

/// `pivot`: spread distinct values of one column into columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotSettings {
    pub index_cols: Vec<String>,
    pub pivot_col: String,
    pub value_col: String,
    pub aggregation: AggFunction,
}

impl PivotSettings {
    fn validate(&self) -> Result<()> {
        require_non_empty("pivot_col", &self.pivot_col)?;
        require_non_empty("value_col", &self.value_col)?;
        for col in &self.index_cols {
            require_non_empty("index_cols", col)?;
        }
        Ok(())
    }
}

/// Column selector used by `unpivot` instead of an explicit list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnpivotSelector {
    Numeric,
    String,
    Float,
    Date,
    All,
}

/// `unpivot`: melt value columns into `variable` / `value` pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnpivotSettings {
    pub id_cols: Vec<String>,
    #[serde(default)]
    pub value_cols: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<UnpivotSelector>,
}

impl UnpivotSettings {
    fn validate(&self) -> Result<()> {
        if self.value_cols.is_empty() && self.selector.is_none() {
            return Err(FlowError::invalid_settings(
                "value_cols",
                "either value_cols or a selector is required",
            ));
        }
        if !self.value_cols.is_empty() && self.selector.is_some() {
            return Err(FlowError::invalid_settings(
                "selector",
                "value_cols and selector are mutually exclusive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    Inner,
    Left,
    Right,
    Outer,
    Cross,
    Semi,
    Anti,
}

/// One equality pair of a join mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPair {
    pub left_col: String,
    pub right_col: String,
}

/// `join`: binary combine over an equality mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSettings {
    #[serde(default)]
    pub mapping: Vec<JoinPair>,
    pub strategy: JoinStrategy,
    /// Projection applied to the left side before joining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_select: Option<Vec<SelectColumn>>,
    /// Projection applied to the right side before joining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_select: Option<Vec<SelectColumn>>,
}

impl JoinSettings {
    fn validate(&self) -> Result<()> {
        if self.strategy == JoinStrategy::Cross {
            if !self.mapping.is_empty() {
                return Err(FlowError::invalid_settings(
                    "mapping",
                    "cross join takes no mapping",
                ));
            }
        } else if self.mapping.is_empty() {
            return Err(FlowError::invalid_settings(
                "mapping",
                format!("{:?} join requires at least one column pair", self.strategy),
            ));
        }
        for pair in &self.mapping {
            require_non_empty("mapping.left_col", &pair.left_col)?;
            require_non_empty("mapping.right_col", &pair.right_col)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionMode {
    /// Columns must align; rows are stacked
    Vertical,
    /// Column union; missing cells become null
    Diagonal,
}

/// `union`: variadic concatenation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionSettings {
    pub how: UnionMode,
}

/// `raw_code`: escape hatch carrying engine source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCodeSettings {
    pub code: String,
    /// Schema declared by the author; without it the node is schema-unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_schema: Option<Schema>,
}

impl RawCodeSettings {
    fn validate(&self) -> Result<()> {
        require_non_empty("code", &self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Overwrite,
    /// Delta only
    Append,
    NewFile,
}

/// `output`: side-effect sink writing the input table to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub path: String,
    pub format: FileFormat,
    pub write_mode: WriteMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

impl OutputSettings {
    fn validate(&self) -> Result<()> {
        require_non_empty("path", &self.path)?;
        if self.write_mode == WriteMode::Append && self.format != FileFormat::Delta {
            return Err(FlowError::invalid_settings(
                "write_mode",
                "append is only supported for the delta format",
            ));
        }
        Ok(())
    }
}
