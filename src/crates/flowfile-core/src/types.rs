//! Logical types and schemas
//!
//! The kernel treats column types as opaque tags drawn from the engine's
//! closed logical-type set; coercion rules live in the engine. A [`Schema`]
//! is an ordered sequence of `(name, logical type)` pairs, which is all the
//! schema propagator needs to predict node outputs without touching data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed logical-type set mirrored from the columnar engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
    Date,
    Datetime,
    Time,
    Decimal,
    /// Homogeneous list of an inner type
    List(Box<LogicalType>),
    /// Nested struct; field types are opaque to the kernel
    Struct,
}

impl LogicalType {
    /// Whether the type is one of the fixed-width integer types
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// Whether the type is numeric (integers, floats, decimal)
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::Float32 | Self::Float64 | Self::Decimal)
    }

    /// Whether the type is temporal (date, datetime, time)
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Datetime | Self::Time)
    }

    /// Common super-type of two logical types.
    ///
    /// Used by unpivot (melted value column) and diagonal concat. The rule
    /// set is deliberately small: identical types are kept, numeric pairs
    /// widen to `Float64` when a float is involved and to `Int64` otherwise,
    /// everything else falls back to `String`.
    pub fn supertype(&self, other: &LogicalType) -> LogicalType {
        if self == other {
            return self.clone();
        }
        if self.is_numeric() && other.is_numeric() {
            if matches!(self, Self::Float32 | Self::Float64 | Self::Decimal)
                || matches!(other, Self::Float32 | Self::Float64 | Self::Decimal)
            {
                return Self::Float64;
            }
            return Self::Int64;
        }
        Self::String
    }

    /// Parse a type tag as written in documents and settings forms
    pub fn parse(tag: &str) -> Option<LogicalType> {
        let t = match tag.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "utf8" => Self::String,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" | "int" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "float32" => Self::Float32,
            "float64" | "float" | "double" => Self::Float64,
            "bool" | "boolean" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::Datetime,
            "time" => Self::Time,
            "decimal" => Self::Decimal,
            "struct" => Self::Struct,
            other => {
                if let Some(inner) = other.strip_prefix("list[").and_then(|s| s.strip_suffix(']')) {
                    return LogicalType::parse(inner).map(|t| Self::List(Box::new(t)));
                }
                return None;
            }
        };
        Some(t)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Int8 => write!(f, "int8"),
            Self::Int16 => write!(f, "int16"),
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::UInt8 => write!(f, "uint8"),
            Self::UInt16 => write!(f, "uint16"),
            Self::UInt32 => write!(f, "uint32"),
            Self::UInt64 => write!(f, "uint64"),
            Self::Float32 => write!(f, "float32"),
            Self::Float64 => write!(f, "float64"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
            Self::Datetime => write!(f, "datetime"),
            Self::Time => write!(f, "time"),
            Self::Decimal => write!(f, "decimal"),
            Self::List(inner) => write!(f, "list[{}]", inner),
            Self::Struct => write!(f, "struct"),
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column name
    pub name: String,
    /// Logical type tag
    #[serde(rename = "type")]
    pub dtype: LogicalType,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: LogicalType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// Ordered sequence of `(column_name, logical_type)` pairs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a column by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Field lookup by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Column names in schema order
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Append a field, replacing any existing field of the same name in place
    pub fn with_field(&self, field: Field) -> Schema {
        let mut fields = self.fields.clone();
        match fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => fields.push(field),
        }
        Schema { fields }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field.name, field.dtype)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parse_roundtrip() {
        for tag in [
            "string", "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64",
            "float32", "float64", "boolean", "date", "datetime", "time", "decimal", "struct",
            "list[int64]",
        ] {
            let t = LogicalType::parse(tag).unwrap();
            assert_eq!(t.to_string(), tag);
        }
        assert!(LogicalType::parse("varchar").is_none());
    }

    #[test]
    fn test_supertype_widening() {
        assert_eq!(
            LogicalType::Int32.supertype(&LogicalType::Int64),
            LogicalType::Int64
        );
        assert_eq!(
            LogicalType::Int64.supertype(&LogicalType::Float32),
            LogicalType::Float64
        );
        assert_eq!(
            LogicalType::String.supertype(&LogicalType::Int64),
            LogicalType::String
        );
        assert_eq!(
            LogicalType::Date.supertype(&LogicalType::Date),
            LogicalType::Date
        );
    }

    #[test]
    fn test_schema_with_field_replaces_in_place() {
        let schema = Schema::new(vec![
            Field::new("a", LogicalType::Int64),
            Field::new("b", LogicalType::String),
        ]);

        let updated = schema.with_field(Field::new("a", LogicalType::Float64));
        assert_eq!(updated.index_of("a"), Some(0));
        assert_eq!(updated.field("a").unwrap().dtype, LogicalType::Float64);

        let appended = schema.with_field(Field::new("c", LogicalType::Boolean));
        assert_eq!(appended.index_of("c"), Some(2));
    }
}
