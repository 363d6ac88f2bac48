//! Expression trees and row evaluation
//!
//! An [`Expr`] is the engine's expression language: column references,
//! literals, arithmetic, comparisons, boolean logic, a conditional, and a
//! fixed set of scalar functions. Expressions are evaluated per row over
//! `serde_json::Value` cells; temporal cells are ISO-8601 strings and are
//! parsed on demand by the date-part functions.
//!
//! The same module hosts the aggregation kernels used by `group_by` and
//! `pivot`, and the static type inference the schema propagator relies on.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use super::{EngineError, EngineResult};
use crate::settings::AggFunction;
use crate::types::{LogicalType, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Scalar functions callable from formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunc {
    Round,
    Abs,
    Upper,
    Lower,
    Length,
    Trim,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Contains,
    StartsWith,
    EndsWith,
}

impl ScalarFunc {
    pub fn by_name(name: &str) -> Option<ScalarFunc> {
        let f = match name.to_ascii_lowercase().as_str() {
            "round" => Self::Round,
            "abs" => Self::Abs,
            "upper" => Self::Upper,
            "lower" => Self::Lower,
            "length" => Self::Length,
            "trim" => Self::Trim,
            "year" => Self::Year,
            "month" => Self::Month,
            "day" => Self::Day,
            "hour" => Self::Hour,
            "minute" => Self::Minute,
            "second" => Self::Second,
            "contains" => Self::Contains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            _ => return None,
        };
        Some(f)
    }

    /// Number of arguments the function accepts (min, max)
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Self::Round => (1, 2),
            Self::Contains | Self::StartsWith | Self::EndsWith => (2, 2),
            _ => (1, 1),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Round => "round",
            Self::Abs => "abs",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Length => "length",
            Self::Trim => "trim",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
        }
    }
}

/// Engine expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Col(String),
    Lit(Value),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Func {
        func: ScalarFunc,
        args: Vec<Expr>,
    },
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    InList {
        expr: Box<Expr>,
        list: Vec<Value>,
        negated: bool,
    },
}

impl fmt::Display for Expr {
    /// Render in the bracketed-formula dialect: `[qty] * [price]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Col(name) => write!(f, "[{}]", name),
            Expr::Lit(Value::String(s)) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Expr::Lit(v) => write!(f, "{}", v),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Unary { op, expr } => match op {
                UnaryOp::Neg => write!(f, "(-{})", expr),
                UnaryOp::Not => write!(f, "(not {})", expr),
            },
            Expr::Func { func, args } => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => write!(f, "if {} then {} else {} endif", cond, then, otherwise),
            Expr::IsNull(expr) => write!(f, "({} is null)", expr),
            Expr::IsNotNull(expr) => write!(f, "({} is not null)", expr),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                write!(f, "({} {} (", expr, if *negated { "not in" } else { "in" })?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match v {
                        Value::String(s) => write!(f, "'{}'", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "))")
            }
        }
    }
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Expr {
        Expr::Col(name.into())
    }

    pub fn lit(value: impl Into<Value>) -> Expr {
        Expr::Lit(value.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluate against one row of `schema`-shaped cells
    pub fn eval(&self, schema: &Schema, row: &[Value]) -> EngineResult<Value> {
        match self {
            Expr::Col(name) => {
                let idx = schema
                    .index_of(name)
                    .ok_or_else(|| EngineError::compute(format!("unknown column '{}'", name)))?;
                Ok(row[idx].clone())
            }
            Expr::Lit(v) => Ok(v.clone()),
            Expr::Binary { op, left, right } => {
                let l = left.eval(schema, row)?;
                // Short-circuit boolean logic before evaluating the right side.
                match op {
                    BinaryOp::And if l == Value::Bool(false) => return Ok(Value::Bool(false)),
                    BinaryOp::Or if l == Value::Bool(true) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let r = right.eval(schema, row)?;
                eval_binary(*op, &l, &r)
            }
            Expr::Unary { op, expr } => {
                let v = expr.eval(schema, row)?;
                match op {
                    UnaryOp::Neg => match as_f64(&v) {
                        Some(n) => Ok(number(-n, v.is_i64() || v.is_u64())),
                        None => Err(EngineError::compute(format!("cannot negate {}", v))),
                    },
                    UnaryOp::Not => match v {
                        Value::Bool(b) => Ok(Value::Bool(!b)),
                        Value::Null => Ok(Value::Null),
                        other => Err(EngineError::compute(format!("cannot apply not to {}", other))),
                    },
                }
            }
            Expr::Func { func, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(schema, row)?);
                }
                eval_func(*func, &values)
            }
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => {
                let c = cond.eval(schema, row)?;
                match c {
                    Value::Bool(true) => then.eval(schema, row),
                    Value::Bool(false) | Value::Null => otherwise.eval(schema, row),
                    other => Err(EngineError::compute(format!(
                        "if condition must be boolean, got {}",
                        other
                    ))),
                }
            }
            Expr::IsNull(expr) => Ok(Value::Bool(expr.eval(schema, row)?.is_null())),
            Expr::IsNotNull(expr) => Ok(Value::Bool(!expr.eval(schema, row)?.is_null())),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let v = expr.eval(schema, row)?;
                let found = list.iter().any(|item| loose_eq(&v, item));
                Ok(Value::Bool(found != *negated))
            }
        }
    }

    /// Static result type of the expression over `schema`.
    ///
    /// Mirrors the evaluation rules: comparisons and logic yield booleans,
    /// `/` always widens to float, `+` over a string operand concatenates.
    pub fn infer_type(&self, schema: &Schema) -> EngineResult<LogicalType> {
        match self {
            Expr::Col(name) => schema
                .field(name)
                .map(|f| f.dtype.clone())
                .ok_or_else(|| EngineError::compute(format!("unknown column '{}'", name))),
            Expr::Lit(v) => Ok(type_of_value(v)),
            Expr::Binary { op, left, right } => {
                let l = left.infer_type(schema)?;
                let r = right.infer_type(schema)?;
                Ok(match op {
                    BinaryOp::Eq
                    | BinaryOp::Ne
                    | BinaryOp::Lt
                    | BinaryOp::Le
                    | BinaryOp::Gt
                    | BinaryOp::Ge
                    | BinaryOp::And
                    | BinaryOp::Or => LogicalType::Boolean,
                    BinaryOp::Div => LogicalType::Float64,
                    BinaryOp::Add if l == LogicalType::String || r == LogicalType::String => {
                        LogicalType::String
                    }
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Mod => {
                        l.supertype(&r)
                    }
                })
            }
            Expr::Unary { op, expr } => match op {
                UnaryOp::Neg => expr.infer_type(schema),
                UnaryOp::Not => Ok(LogicalType::Boolean),
            },
            Expr::Func { func, args } => Ok(match func {
                ScalarFunc::Round => LogicalType::Float64,
                ScalarFunc::Abs => args[0].infer_type(schema)?,
                ScalarFunc::Upper | ScalarFunc::Lower | ScalarFunc::Trim => LogicalType::String,
                ScalarFunc::Length => LogicalType::UInt32,
                ScalarFunc::Year
                | ScalarFunc::Month
                | ScalarFunc::Day
                | ScalarFunc::Hour
                | ScalarFunc::Minute
                | ScalarFunc::Second => LogicalType::Int32,
                ScalarFunc::Contains | ScalarFunc::StartsWith | ScalarFunc::EndsWith => {
                    LogicalType::Boolean
                }
            }),
            Expr::IfElse { then, otherwise, .. } => {
                let t = then.infer_type(schema)?;
                let o = otherwise.infer_type(schema)?;
                Ok(t.supertype(&o))
            }
            Expr::IsNull(_) | Expr::IsNotNull(_) | Expr::InList { .. } => Ok(LogicalType::Boolean),
        }
    }

    /// Column names referenced anywhere in the expression
    pub fn referenced_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Col(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Expr::Lit(_) => {}
            Expr::Binary { left, right, .. } => {
                left.referenced_columns(out);
                right.referenced_columns(out);
            }
            Expr::Unary { expr, .. } => expr.referenced_columns(out),
            Expr::Func { args, .. } => {
                for arg in args {
                    arg.referenced_columns(out);
                }
            }
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => {
                cond.referenced_columns(out);
                then.referenced_columns(out);
                otherwise.referenced_columns(out);
            }
            Expr::IsNull(expr) | Expr::IsNotNull(expr) => expr.referenced_columns(out),
            Expr::InList { expr, .. } => expr.referenced_columns(out),
        }
    }
}

fn eval_binary(op: BinaryOp, l: &Value, r: &Value) -> EngineResult<Value> {
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let (a, b) = match (l, r) {
                (Value::Bool(a), Value::Bool(b)) => (*a, *b),
                (Value::Null, _) | (_, Value::Null) => return Ok(Value::Null),
                _ => {
                    return Err(EngineError::compute(format!(
                        "boolean operator over non-booleans: {} {} {}",
                        l, op, r
                    )))
                }
            };
            Ok(Value::Bool(if op == BinaryOp::And { a && b } else { a || b }))
        }
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(l, r))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(l, r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            let ord = compare_values(l, r).ok_or_else(|| {
                EngineError::compute(format!("cannot compare {} with {}", l, r))
            })?;
            let result = match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                BinaryOp::Ge => ord != Ordering::Less,
                _ => unreachable!(),
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::Add => {
            // String + anything concatenates, matching the formula dialect.
            if l.is_string() || r.is_string() {
                return Ok(Value::String(format!("{}{}", render(l), render(r))));
            }
            arith(op, l, r)
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => arith(op, l, r),
    }
}

fn arith(op: BinaryOp, l: &Value, r: &Value) -> EngineResult<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let (a, b) = match (as_f64(l), as_f64(r)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(EngineError::compute(format!(
                "arithmetic over non-numeric values: {} {} {}",
                l, op, r
            )))
        }
    };
    let integral = is_integral(l) && is_integral(r);
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(EngineError::compute("division by zero"));
            }
            return Ok(number(a / b, false));
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(EngineError::compute("modulo by zero"));
            }
            a % b
        }
        _ => unreachable!(),
    };
    Ok(number(result, integral))
}

fn eval_func(func: ScalarFunc, args: &[Value]) -> EngineResult<Value> {
    if args.iter().any(|v| v.is_null()) {
        return Ok(Value::Null);
    }
    match func {
        ScalarFunc::Round => {
            let n = expect_number(func, &args[0])?;
            let digits = if args.len() > 1 {
                expect_number(func, &args[1])? as i32
            } else {
                0
            };
            let factor = 10f64.powi(digits);
            Ok(number((n * factor).round() / factor, false))
        }
        ScalarFunc::Abs => {
            let n = expect_number(func, &args[0])?;
            Ok(number(n.abs(), is_integral(&args[0])))
        }
        ScalarFunc::Upper => Ok(Value::String(expect_string(func, &args[0])?.to_uppercase())),
        ScalarFunc::Lower => Ok(Value::String(expect_string(func, &args[0])?.to_lowercase())),
        ScalarFunc::Trim => Ok(Value::String(expect_string(func, &args[0])?.trim().to_string())),
        ScalarFunc::Length => {
            let s = expect_string(func, &args[0])?;
            Ok(Value::from(s.chars().count() as u64))
        }
        ScalarFunc::Year => date_part(func, &args[0], |d, _| d.year() as i64),
        ScalarFunc::Month => date_part(func, &args[0], |d, _| d.month() as i64),
        ScalarFunc::Day => date_part(func, &args[0], |d, _| d.day() as i64),
        ScalarFunc::Hour => time_part(func, &args[0], |t| t.hour() as i64),
        ScalarFunc::Minute => time_part(func, &args[0], |t| t.minute() as i64),
        ScalarFunc::Second => time_part(func, &args[0], |t| t.second() as i64),
        ScalarFunc::Contains => {
            let s = expect_string(func, &args[0])?;
            let needle = expect_string(func, &args[1])?;
            Ok(Value::Bool(s.contains(&needle)))
        }
        ScalarFunc::StartsWith => {
            let s = expect_string(func, &args[0])?;
            let prefix = expect_string(func, &args[1])?;
            Ok(Value::Bool(s.starts_with(&prefix)))
        }
        ScalarFunc::EndsWith => {
            let s = expect_string(func, &args[0])?;
            let suffix = expect_string(func, &args[1])?;
            Ok(Value::Bool(s.ends_with(&suffix)))
        }
    }
}

fn parse_temporal(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn date_part(
    func: ScalarFunc,
    value: &Value,
    part: impl Fn(NaiveDate, NaiveTime) -> i64,
) -> EngineResult<Value> {
    let s = expect_string(func, value)?;
    let dt = parse_temporal(&s)
        .ok_or_else(|| EngineError::compute(format!("{}: '{}' is not a date", func.name(), s)))?;
    Ok(Value::from(part(dt.date(), dt.time())))
}

fn time_part(func: ScalarFunc, value: &Value, part: impl Fn(NaiveTime) -> i64) -> EngineResult<Value> {
    let s = expect_string(func, value)?;
    if let Ok(t) = NaiveTime::parse_from_str(&s, "%H:%M:%S") {
        return Ok(Value::from(part(t)));
    }
    let dt = parse_temporal(&s)
        .ok_or_else(|| EngineError::compute(format!("{}: '{}' is not a time", func.name(), s)))?;
    Ok(Value::from(part(dt.time())))
}

fn expect_number(func: ScalarFunc, v: &Value) -> EngineResult<f64> {
    as_f64(v).ok_or_else(|| {
        EngineError::compute(format!("{} expects a number, got {}", func.name(), v))
    })
}

fn expect_string(func: ScalarFunc, v: &Value) -> EngineResult<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        other => Err(EngineError::compute(format!(
            "{} expects a string, got {}",
            func.name(),
            other
        ))),
    }
}

/// Numeric view of a cell
pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn is_integral(v: &Value) -> bool {
    matches!(v, Value::Number(n) if n.is_i64() || n.is_u64())
}

/// Build a numeric cell, keeping integer representation when exact
pub fn number(n: f64, prefer_int: bool) -> Value {
    if prefer_int && n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Equality with numeric loosening (1 == 1.0)
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Total-ish ordering over cells: null < numbers < strings < bools.
///
/// Within numbers the comparison is by f64; within strings lexicographic.
/// Returns `None` only for values with no meaningful order (arrays, objects).
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Bool(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(_), Value::Number(_)) => as_f64(a)?.partial_cmp(&as_f64(b)?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Array(_), _) | (_, Value::Array(_)) => None,
        (Value::Object(_), _) | (_, Value::Object(_)) => None,
        _ => Some(rank(a).cmp(&rank(b))),
    }
}

/// Render a cell the way string concatenation sees it
pub fn render(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Logical type of a literal cell
pub fn type_of_value(v: &Value) -> LogicalType {
    match v {
        Value::Number(n) if n.is_i64() || n.is_u64() => LogicalType::Int64,
        Value::Number(_) => LogicalType::Float64,
        Value::Bool(_) => LogicalType::Boolean,
        Value::Array(_) => LogicalType::List(Box::new(LogicalType::String)),
        Value::Object(_) => LogicalType::Struct,
        _ => LogicalType::String,
    }
}

/// Apply one aggregation kernel to a column of values
pub fn aggregate(func: AggFunction, values: &[Value]) -> EngineResult<Value> {
    let non_null: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
    match func {
        AggFunction::Count => Ok(Value::from(values.len() as u64)),
        AggFunction::NUnique => {
            let mut seen: Vec<&Value> = Vec::new();
            for v in &non_null {
                if !seen.iter().any(|s| loose_eq(s, v)) {
                    seen.push(v);
                }
            }
            Ok(Value::from(seen.len() as u64))
        }
        AggFunction::First => Ok(non_null.first().map(|v| (*v).clone()).unwrap_or(Value::Null)),
        AggFunction::Last => Ok(non_null.last().map(|v| (*v).clone()).unwrap_or(Value::Null)),
        AggFunction::Concat => {
            let joined = non_null
                .iter()
                .map(|v| render(v))
                .collect::<Vec<_>>()
                .join(",");
            Ok(Value::String(joined))
        }
        AggFunction::Min | AggFunction::Max => {
            let mut best: Option<&Value> = None;
            for v in &non_null {
                best = match best {
                    None => Some(v),
                    Some(b) => {
                        let ord = compare_values(v, b).ok_or_else(|| {
                            EngineError::compute(format!("cannot order {} against {}", v, b))
                        })?;
                        let take = if func == AggFunction::Min {
                            ord == Ordering::Less
                        } else {
                            ord == Ordering::Greater
                        };
                        Some(if take { v } else { b })
                    }
                };
            }
            Ok(best.cloned().unwrap_or(Value::Null))
        }
        AggFunction::Sum | AggFunction::Mean | AggFunction::Median => {
            let mut nums = Vec::with_capacity(non_null.len());
            let mut integral = true;
            for v in &non_null {
                let n = as_f64(v).ok_or_else(|| {
                    EngineError::compute(format!("{} over non-numeric value {}", func, v))
                })?;
                integral &= is_integral(v);
                nums.push(n);
            }
            if nums.is_empty() {
                return Ok(Value::Null);
            }
            match func {
                AggFunction::Sum => Ok(number(nums.iter().sum(), integral)),
                AggFunction::Mean => Ok(number(nums.iter().sum::<f64>() / nums.len() as f64, false)),
                AggFunction::Median => {
                    nums.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                    let mid = nums.len() / 2;
                    let median = if nums.len() % 2 == 0 {
                        (nums[mid - 1] + nums[mid]) / 2.0
                    } else {
                        nums[mid]
                    };
                    Ok(number(median, false))
                }
                _ => unreachable!(),
            }
        }
    }
}
