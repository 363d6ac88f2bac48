//! File scans and atomic sinks
//!
//! The engine reads csv and json (array-of-objects or newline-delimited)
//! sources and writes csv and json sinks. All writes go through a
//! temp-file-plus-rename so a cancelled or crashed run never leaves a
//! half-written artifact. Parquet, excel, and delta are recognized formats
//! but are not implemented by the in-process engine and fail with
//! [`EngineError::Unsupported`].

use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;

use super::table::{self, DataTable};
use super::{EngineError, EngineResult};
use crate::settings::{FileFormat, WriteMode};
use crate::types::Schema;

/// Options forwarded from source settings to the readers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanOptions {
    pub delimiter: Option<char>,
    pub has_header: Option<bool>,
    pub skip_rows: Option<u64>,
    /// Declared schema overriding inference
    pub declared: Option<Schema>,
    /// Bound on rows read (schema probes)
    pub limit: Option<usize>,
}

/// Read a source file into a table
pub fn read_table(path: &Path, format: FileFormat, options: &ScanOptions) -> EngineResult<DataTable> {
    match format {
        FileFormat::Csv => read_csv(path, options),
        FileFormat::Json => read_json(path, options),
        other => Err(EngineError::Unsupported(format!(
            "reading {} sources",
            other
        ))),
    }
}

/// Probe a source once for its schema, reading a bounded number of rows
pub fn probe_schema(path: &Path, format: FileFormat, options: &ScanOptions) -> EngineResult<Schema> {
    let mut bounded = options.clone();
    bounded.limit = Some(100);
    read_table(path, format, &bounded).map(|t| t.schema)
}

fn read_csv(path: &Path, options: &ScanOptions) -> EngineResult<DataTable> {
    let content = fs::read_to_string(path)?;
    let delimiter = options.delimiter.unwrap_or(',');
    let has_header = options.has_header.unwrap_or(true);
    let skip = options.skip_rows.unwrap_or(0) as usize;

    let mut records = parse_csv(&content, delimiter);
    if skip > 0 {
        records.drain(..skip.min(records.len()));
    }
    if records.is_empty() {
        return Ok(DataTable::empty(options.declared.clone().unwrap_or_default()));
    }

    let names: Vec<String> = if has_header {
        records.remove(0)
    } else {
        (0..records[0].len())
            .map(|i| format!("column_{}", i + 1))
            .collect()
    };

    if let Some(limit) = options.limit {
        records.truncate(limit);
    }

    let width = names.len();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        if record.len() != width {
            return Err(EngineError::compute(format!(
                "csv row {} has {} fields, header has {}",
                i + 1,
                record.len(),
                width
            )));
        }
        rows.push(record.iter().map(|cell| parse_cell(cell)).collect());
    }

    match &options.declared {
        Some(schema) => {
            if schema.len() != width {
                return Err(EngineError::compute(format!(
                    "declared schema has {} columns, file has {}",
                    schema.len(),
                    width
                )));
            }
            let mut cast_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut out = Vec::with_capacity(width);
                for (value, field) in row.iter().zip(&schema.fields) {
                    out.push(table::cast_value(value, &field.dtype)?);
                }
                cast_rows.push(out);
            }
            DataTable::new(schema.clone(), cast_rows)
        }
        None => {
            let schema = table::infer_schema(&names, &rows);
            DataTable::new(schema, rows)
        }
    }
}

/// Parse csv text into records, honoring double-quoted fields
fn parse_csv(content: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                c if c == delimiter => {
                    record.push(std::mem::take(&mut field));
                }
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Interpret an unquoted csv cell: int, float, bool, null, else string
fn parse_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::from(f);
    }
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn read_json(path: &Path, options: &ScanOptions) -> EngineResult<DataTable> {
    let content = fs::read_to_string(path)?;
    let trimmed = content.trim();

    let records: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<Value>>(trimmed)
            .map_err(|e| EngineError::compute(format!("invalid json source: {}", e)))?
    } else {
        // Newline-delimited objects.
        let mut out = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let v = serde_json::from_str(line).map_err(|e| {
                EngineError::compute(format!("invalid json on line {}: {}", i + 1, e))
            })?;
            out.push(v);
        }
        out
    };

    let records: Vec<Value> = match options.limit {
        Some(limit) => records.into_iter().take(limit).collect(),
        None => records,
    };

    if let Some(schema) = &options.declared {
        return DataTable::from_records(schema.clone(), &records);
    }

    // Column order: first-seen across all records.
    let mut names: Vec<String> = Vec::new();
    for rec in &records {
        let obj = rec
            .as_object()
            .ok_or_else(|| EngineError::compute("json record is not an object"))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }
    let rows: Vec<Vec<Value>> = records
        .iter()
        .map(|rec| {
            let obj = rec.as_object().expect("checked above");
            names
                .iter()
                .map(|n| obj.get(n).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    let schema = table::infer_schema(&names, &rows);
    DataTable::new(schema, rows)
}

/// Write a table to disk atomically (temp file + rename)
pub fn write_table(
    table: &DataTable,
    path: &Path,
    format: FileFormat,
    write_mode: WriteMode,
    delimiter: Option<char>,
) -> EngineResult<()> {
    match write_mode {
        WriteMode::Overwrite => {}
        WriteMode::NewFile => {
            if path.exists() {
                return Err(EngineError::compute(format!(
                    "'{}' already exists and write mode is new_file",
                    path.display()
                )));
            }
        }
        WriteMode::Append => {
            return Err(EngineError::Unsupported(
                "append sinks (delta) in the in-process engine".to_string(),
            ))
        }
    }

    let payload = match format {
        FileFormat::Csv => render_csv(table, delimiter.unwrap_or(',')),
        FileFormat::Json => {
            let records = table.to_records();
            serde_json::to_string_pretty(&records)
                .map_err(|e| EngineError::compute(e.to_string()))?
        }
        other => {
            return Err(EngineError::Unsupported(format!("writing {} sinks", other)));
        }
    };

    atomic_write(path, payload.as_bytes())?;
    Ok(())
}

/// Write bytes to `path` via a sibling temp file and rename
pub fn atomic_write(path: &Path, bytes: &[u8]) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("out")
    ));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn render_csv(table: &DataTable, delimiter: char) -> String {
    let mut out = String::new();
    let names: Vec<String> = table
        .schema
        .names()
        .iter()
        .map(|n| escape_csv(n, delimiter))
        .collect();
    out.push_str(&names.join(&delimiter.to_string()));
    out.push('\n');
    for row in &table.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                Value::String(s) => escape_csv(s, delimiter),
                other => other.to_string(),
            })
            .collect();
        out.push_str(&cells.join(&delimiter.to_string()));
        out.push('\n');
    }
    out
}

fn escape_csv(s: &str, delimiter: char) -> String {
    if s.contains(delimiter) || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, LogicalType};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_csv_roundtrip_with_inference() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "name,qty,price\nWidget,10,1.5\n\"A,B\",3,2\n").unwrap();

        let table = read_table(&path, FileFormat::Csv, &ScanOptions::default()).unwrap();
        assert_eq!(table.schema.names(), vec!["name", "qty", "price"]);
        assert_eq!(table.schema.fields[1].dtype, LogicalType::Int64);
        assert_eq!(table.schema.fields[2].dtype, LogicalType::Float64);
        assert_eq!(table.rows[1][0], json!("A,B"));

        let out = dir.path().join("out.csv");
        write_table(&table, &out, FileFormat::Csv, WriteMode::Overwrite, None).unwrap();
        let back = read_table(&out, FileFormat::Csv, &ScanOptions::default()).unwrap();
        assert_eq!(back.rows, table.rows);
    }

    #[test]
    fn test_csv_declared_schema_casts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "a\n1\n2\n").unwrap();

        let options = ScanOptions {
            declared: Some(Schema::new(vec![Field::new("a", LogicalType::Float64)])),
            ..Default::default()
        };
        let table = read_table(&path, FileFormat::Csv, &options).unwrap();
        assert_eq!(table.rows[0][0], json!(1.0));
    }

    #[test]
    fn test_csv_without_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "1,x\n2,y\n").unwrap();

        let options = ScanOptions {
            has_header: Some(false),
            ..Default::default()
        };
        let table = read_table(&path, FileFormat::Csv, &options).unwrap();
        assert_eq!(table.schema.names(), vec!["column_1", "column_2"]);
        assert_eq!(table.height(), 2);
    }

    #[test]
    fn test_json_array_and_ndjson() {
        let dir = TempDir::new().unwrap();
        let arr = dir.path().join("a.json");
        fs::write(&arr, r#"[{"a": 1, "b": "x"}, {"a": 2}]"#).unwrap();
        let table = read_table(&arr, FileFormat::Json, &ScanOptions::default()).unwrap();
        assert_eq!(table.schema.names(), vec!["a", "b"]);
        assert_eq!(table.rows[1][1], Value::Null);

        let nd = dir.path().join("b.json");
        fs::write(&nd, "{\"a\": 1}\n{\"a\": 2}\n").unwrap();
        let table = read_table(&nd, FileFormat::Json, &ScanOptions::default()).unwrap();
        assert_eq!(table.height(), 2);
    }

    #[test]
    fn test_probe_schema_is_bounded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        let mut content = String::from("n\n");
        for i in 0..10_000 {
            content.push_str(&format!("{}\n", i));
        }
        fs::write(&path, content).unwrap();

        let schema = probe_schema(&path, FileFormat::Csv, &ScanOptions::default()).unwrap();
        assert_eq!(schema.fields[0].dtype, LogicalType::Int64);
    }

    #[test]
    fn test_new_file_mode_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let table = DataTable::new(
            Schema::new(vec![Field::new("a", LogicalType::Int64)]),
            vec![vec![json!(1)]],
        )
        .unwrap();

        write_table(&table, &path, FileFormat::Csv, WriteMode::NewFile, None).unwrap();
        assert!(write_table(&table, &path, FileFormat::Csv, WriteMode::NewFile, None).is_err());
    }

    #[test]
    fn test_unsupported_formats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.parquet");
        assert!(matches!(
            read_table(&path, FileFormat::Parquet, &ScanOptions::default()),
            Err(EngineError::Unsupported(_))
        ));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        atomic_write(&path, b"a\n1\n").unwrap();
        assert!(path.exists());
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
