//! Materialized tables
//!
//! A [`DataTable`] is the engine's collected form: a schema plus row-major
//! cells. Tables are plain values; cloning one clones its rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EngineError, EngineResult};
use crate::types::{Field, LogicalType, Schema};

/// A collected table: ordered schema plus row-major cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub schema: Schema,
    pub rows: Vec<Vec<Value>>,
}

impl DataTable {
    /// Build a table, checking that every row matches the schema width
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> EngineResult<Self> {
        let width = schema.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(EngineError::compute(format!(
                    "row {} has {} cells, schema has {} columns",
                    i,
                    row.len(),
                    width
                )));
            }
        }
        Ok(Self { schema, rows })
    }

    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.schema.len()
    }

    /// First `n` rows, schema preserved
    pub fn head(&self, n: usize) -> DataTable {
        DataTable {
            schema: self.schema.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Cells of one column, by name
    pub fn column(&self, name: &str) -> EngineResult<Vec<Value>> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| EngineError::compute(format!("unknown column '{}'", name)))?;
        Ok(self.rows.iter().map(|r| r[idx].clone()).collect())
    }

    /// Rows as JSON objects in schema order (tests, samples, json sink)
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let map: serde_json::Map<String, Value> = self
                    .schema
                    .fields
                    .iter()
                    .zip(row.iter())
                    .map(|(f, v)| (f.name.clone(), v.clone()))
                    .collect();
                Value::Object(map)
            })
            .collect()
    }

    /// Build from JSON objects using the field order of `schema`
    pub fn from_records(schema: Schema, records: &[Value]) -> EngineResult<Self> {
        let mut rows = Vec::with_capacity(records.len());
        for rec in records {
            let obj = rec
                .as_object()
                .ok_or_else(|| EngineError::compute("record is not an object"))?;
            let row = schema
                .fields
                .iter()
                .map(|f| obj.get(&f.name).cloned().unwrap_or(Value::Null))
                .collect();
            rows.push(row);
        }
        Self::new(schema, rows)
    }
}

/// Cast one cell to a logical type.
///
/// Casting is lenient the way engine casts are: numbers parse from strings,
/// anything renders to a string, null stays null. Failures are reported,
/// never silently nulled.
pub fn cast_value(value: &Value, to: &LogicalType) -> EngineResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let fail = || {
        EngineError::compute(format!("cannot cast {} to {}", value, to))
    };
    match to {
        LogicalType::String => Ok(Value::String(super::expr::render(value))),
        LogicalType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            Value::Number(n) => Ok(Value::Bool(n.as_f64().unwrap_or(0.0) != 0.0)),
            _ => Err(fail()),
        },
        t if t.is_integer() => {
            let n = match value {
                Value::Number(n) => n.as_f64().ok_or_else(fail)?,
                Value::String(s) => s.trim().parse::<f64>().map_err(|_| fail())?,
                Value::Bool(b) => {
                    if *b {
                        1.0
                    } else {
                        0.0
                    }
                }
                _ => return Err(fail()),
            };
            if n.fract() != 0.0 {
                return Err(fail());
            }
            Ok(Value::from(n as i64))
        }
        LogicalType::Float32 | LogicalType::Float64 | LogicalType::Decimal => {
            let n = match value {
                Value::Number(n) => n.as_f64().ok_or_else(fail)?,
                Value::String(s) => s.trim().parse::<f64>().map_err(|_| fail())?,
                Value::Bool(b) => {
                    if *b {
                        1.0
                    } else {
                        0.0
                    }
                }
                _ => return Err(fail()),
            };
            Ok(Value::from(n))
        }
        LogicalType::Date | LogicalType::Datetime | LogicalType::Time => match value {
            // Temporal cells stay ISO strings; the tag is what changes.
            Value::String(_) => Ok(value.clone()),
            _ => Err(fail()),
        },
        LogicalType::List(_) => match value {
            Value::Array(_) => Ok(value.clone()),
            _ => Err(fail()),
        },
        LogicalType::Struct => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(fail()),
        },
        _ => unreachable!("all LogicalType variants are covered above"),
    }
}

/// Infer a column's logical type from observed cells
pub fn infer_column_type(values: &[Value]) -> LogicalType {
    let mut ty: Option<LogicalType> = None;
    for v in values {
        if v.is_null() {
            continue;
        }
        let t = super::expr::type_of_value(v);
        ty = Some(match ty {
            None => t,
            Some(prev) => prev.supertype(&t),
        });
    }
    ty.unwrap_or(LogicalType::String)
}

/// Schema with every column type inferred from the rows
pub fn infer_schema(names: &[String], rows: &[Vec<Value>]) -> Schema {
    let fields = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let column: Vec<Value> = rows.iter().map(|r| r[i].clone()).collect();
            Field::new(name.clone(), infer_column_type(&column))
        })
        .collect();
    Schema::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_width_mismatch_rejected() {
        let schema = Schema::new(vec![Field::new("a", LogicalType::Int64)]);
        assert!(DataTable::new(schema, vec![vec![json!(1), json!(2)]]).is_err());
    }

    #[test]
    fn test_records_roundtrip() {
        let schema = Schema::new(vec![
            Field::new("a", LogicalType::Int64),
            Field::new("b", LogicalType::String),
        ]);
        let table = DataTable::new(
            schema.clone(),
            vec![vec![json!(1), json!("x")], vec![json!(2), json!("y")]],
        )
        .unwrap();

        let records = table.to_records();
        assert_eq!(records[0], json!({"a": 1, "b": "x"}));

        let back = DataTable::from_records(schema, &records).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_cast_string_to_int() {
        assert_eq!(
            cast_value(&json!("42"), &LogicalType::Int64).unwrap(),
            json!(42)
        );
        assert!(cast_value(&json!("4.5"), &LogicalType::Int64).is_err());
        assert_eq!(
            cast_value(&json!(7), &LogicalType::String).unwrap(),
            json!("7")
        );
    }

    #[test]
    fn test_infer_column_type_widens() {
        assert_eq!(
            infer_column_type(&[json!(1), json!(2.5)]),
            LogicalType::Float64
        );
        assert_eq!(
            infer_column_type(&[Value::Null, json!("x")]),
            LogicalType::String
        );
        assert_eq!(infer_column_type(&[Value::Null]), LogicalType::String);
    }
}
