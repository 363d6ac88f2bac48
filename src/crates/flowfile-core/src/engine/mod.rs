//! The in-process columnar lazy frame engine
//!
//! The kernel delegates all computation to this engine through a narrow
//! surface: a [`LazyFrame`] plan builder with `collect()` and `explain()`,
//! an [`Expr`] tree, a materialized [`DataTable`], and file readers and
//! writers. Nothing outside this module touches cell data.
//!
//! Plans are cheap value trees; evaluation happens only on `collect` (or a
//! sink write), with cooperative cancellation checked at every operator.
//! A light projection-pruning pass pushes column selection into file scans.

pub mod expr;
pub mod io;
pub mod lazy;
pub mod table;

pub use expr::{BinaryOp, Expr, ScalarFunc, UnaryOp};
pub use lazy::{LazyFrame, Projection};
pub use table::DataTable;

use thiserror::Error;

/// Errors produced inside the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem failure while scanning or sinking
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Evaluation failure (missing column, type error, bad cast)
    #[error("{0}")]
    Compute(String),

    /// Operation the in-process engine does not implement
    #[error("unsupported by the in-process engine: {0}")]
    Unsupported(String),

    /// Collect observed the cancellation token
    #[error("collect cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn compute(msg: impl Into<String>) -> Self {
        Self::Compute(msg.into())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
