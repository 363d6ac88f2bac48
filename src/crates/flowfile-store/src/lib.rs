//! # flowfile-store
//!
//! Persistent key-value stores for saved flow graphs. The kernel produces
//! [`FlowDocument`](flowfile_core::doc::FlowDocument)s; this crate stores
//! them behind the [`GraphStore`] trait with two backends:
//!
//! - [`InMemoryGraphStore`] — reference backend for development and tests
//! - [`FileGraphStore`] — one YAML file per graph id, atomic writes
//!
//! ```rust,no_run
//! use flowfile_store::{FileGraphStore, GraphStore};
//! use flowfile_core::doc::FlowDocument;
//!
//! # async fn save(doc: FlowDocument) -> flowfile_store::Result<()> {
//! let store = FileGraphStore::new("graphs");
//! store.put(&doc).await?;
//! let names: Vec<String> = store.list().await?.into_iter().map(|s| s.name).collect();
//! # let _ = names;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use file::FileGraphStore;
pub use memory::InMemoryGraphStore;
pub use traits::{GraphStore, GraphSummary};
