//! Cooperative cancellation
//!
//! A [`CancelToken`] is cloned into a run and forwarded to the engine's
//! `collect`. Cancellation is checked between nodes in eager mode and at
//! every plan operator in lazy mode; nothing is interrupted mid-write, so
//! caches stay consistent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observers see it at their next check
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
