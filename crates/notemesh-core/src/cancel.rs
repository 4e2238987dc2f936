//! Cooperative cancellation for long-running operations.
//!
//! Cancellation is "stop before the next unit of work", never "abort
//! immediately": the embed-all run checks the flag at batch boundaries
//! only, so an in-flight provider call always completes first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; cannot be un-set.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_uncancelled() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let flag = CancelFlag::new();
        let shared = flag.clone();
        flag.cancel();
        assert!(shared.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let flag = CancelFlag::new();
        flag.cancel();
        flag.cancel();
        assert!(flag.is_cancelled());
    }
}
