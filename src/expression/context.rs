//! Evaluation context shared by all evaluators of one expression tree.

use crate::expression::{ExpressionError, ExpressionResult};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Produces the row index a value should be read at.
pub type IndexSupplier = Arc<dyn Fn() -> ExpressionResult<i64> + Send + Sync>;

/// Caller supplied cancellation check; returns `true` once work should stop.
pub type StopCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// Mutable state of an evaluation session: the row cursor and the
/// cooperative stop check.
///
/// One context belongs to one expression tree. The caller moves the cursor
/// with [`set_index`](Self::set_index) before each evaluation; the tree only
/// reads it.
pub struct ExpressionContext {
    index: AtomicI64,
    stopped: AtomicBool,
    stop_check: Option<StopCheck>,
}

impl fmt::Debug for ExpressionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionContext")
            .field("index", &self.index())
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for ExpressionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self {
            index: AtomicI64::new(0),
            stopped: AtomicBool::new(false),
            stop_check: None,
        }
    }

    pub fn with_stop_check(stop_check: StopCheck) -> Self {
        Self {
            stop_check: Some(stop_check),
            ..Self::new()
        }
    }

    /// Point the context at another row.
    pub fn set_index(&self, index: i64) {
        self.index.store(index, Ordering::Relaxed);
    }

    pub fn index(&self) -> i64 {
        self.index.load(Ordering::Relaxed)
    }

    /// Supplier reading the current row index of this context.
    pub fn index_supplier(self: &Arc<Self>) -> IndexSupplier {
        let context = Arc::clone(self);
        Arc::new(move || Ok(context.index()))
    }

    /// Ask every evaluator polling this context to stop.
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Relaxed) || self.stop_check.as_ref().is_some_and(|check| check())
    }

    /// Fail with [`ExpressionError::Cancelled`] if a stop was requested.
    pub fn check_stop(&self) -> ExpressionResult<()> {
        if self.is_stop_requested() {
            Err(ExpressionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_cursor() {
        let context = Arc::new(ExpressionContext::new());
        let supplier = context.index_supplier();
        assert_eq!(supplier().unwrap(), 0);

        context.set_index(7);
        assert_eq!(context.index(), 7);
        assert_eq!(supplier().unwrap(), 7);
    }

    #[test]
    fn test_request_stop() {
        let context = ExpressionContext::new();
        assert!(context.check_stop().is_ok());

        context.request_stop();
        assert!(matches!(context.check_stop(), Err(ExpressionError::Cancelled)));
    }

    #[test]
    fn test_stop_check_callback() {
        let flag = Arc::new(AtomicBool::new(false));
        let observed = flag.clone();
        let context =
            ExpressionContext::with_stop_check(Box::new(move || observed.load(Ordering::SeqCst)));
        assert!(context.check_stop().is_ok());

        flag.store(true, Ordering::SeqCst);
        assert!(context.is_stop_requested());
        assert!(context.check_stop().is_err());
    }
}
