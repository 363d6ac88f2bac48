//! # flowfile-core
//!
//! The FlowGraph execution kernel: a settings-driven DAG for data
//! pipelines, executed by an in-process columnar lazy engine.
//!
//! Pipelines are built on either of two surfaces — explicit settings
//! records on a [`FlowGraph`](graph::FlowGraph), or the fluent
//! [`FlowFrame`](builder::FlowFrame) facade — and both compile to the same
//! graph. Schemas propagate eagerly without touching data; execution is a
//! separate step with two strategies behind one contract.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Surfaces                                                    │
//! │  ┌─────────────────────┐   ┌──────────────────────────────┐  │
//! │  │ Settings records    │   │ FlowFrame fluent builder     │  │
//! │  │ (graph operations)  │   │ (dataframe-like, linear)     │  │
//! │  └──────────┬──────────┘   └──────────────┬───────────────┘  │
//! │             └──────────────┬──────────────┘                  │
//! │                            ▼                                 │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ FlowGraph: id-indexed nodes, slotted edges, acyclic,   │  │
//! │  │ content hashes, eager schema propagation               │  │
//! │  └──────────────────────────┬─────────────────────────────┘  │
//! │                             ▼                                │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ ExecutionEngine: Performance (lazy pull, one collect   │  │
//! │  │ per sink) or Development (eager push, sample cache)    │  │
//! │  └──────────────────────────┬─────────────────────────────┘  │
//! │                             ▼                                │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ engine: LazyFrame plans, Expr, DataTable, file IO      │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use flowfile_core::builder::FlowFrame;
//! use flowfile_core::types::{Field, LogicalType};
//! use serde_json::json;
//!
//! let graph = FlowFrame::new_graph(1, "orders");
//! let totals = FlowFrame::manual_input(
//!     &graph,
//!     vec![
//!         Field::new("region", LogicalType::String),
//!         Field::new("qty", LogicalType::Int64),
//!         Field::new("price", LogicalType::Int64),
//!     ],
//!     vec![
//!         vec![json!("N"), json!(10), json!(150)],
//!         vec![json!("S"), json!(5), json!(300)],
//!     ],
//! ).unwrap()
//! .with_column("total", "[qty] * [price]").unwrap()
//! .filter("[total] > 1000").unwrap();
//!
//! let table = totals.collect().unwrap();
//! assert_eq!(table.height(), 2);
//! ```
//!
//! # Key Types
//!
//! - [`graph::FlowGraph`] — the structural source of truth
//! - [`settings::NodeSettings`] — validated per-kind settings records
//! - [`schema`] — eager schema propagation ([`schema::SchemaState`])
//! - [`exec::ExecutionEngine`] — both execution strategies, events, cache
//! - [`builder::FlowFrame`] — the fluent facade
//! - [`doc::FlowDocument`] — versioned YAML/JSON persistence
//! - [`codegen`] — fluent-script export
//! - [`formula`] — the bracketed-formula dialect
//! - [`engine`] — the in-process lazy frame engine

pub mod builder;
pub mod cancel;
pub mod codegen;
pub mod doc;
pub mod engine;
pub mod error;
pub mod exec;
pub mod formula;
pub mod graph;
pub mod node;
pub mod schema;
pub mod settings;
pub mod types;

pub use builder::FlowFrame;
pub use cancel::CancelToken;
pub use doc::FlowDocument;
pub use error::{FlowError, Result};
pub use exec::{ExecutionEngine, ExecutionEvent, RunReport};
pub use graph::{ExecutionLocation, ExecutionMode, FlowGraph, InputSlot};
pub use node::{FlowNode, NodeOutcome, RunState};
pub use schema::SchemaState;
pub use settings::{NodeKind, NodePayload, NodeSettings};
pub use types::{Field, LogicalType, Schema};
