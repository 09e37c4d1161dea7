// Control plane: request deadlines and cancellation
//
// Every public router entry point takes a QueryContext. The route finder and
// the split optimizer poll it between discrete steps (per hop expansion, per
// rebalancing iteration) so an expired request stops promptly.
//
// Numan Thabit 2025 Nov

use crate::errors::{RouterError, RouterResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl QueryContext {
    /// No deadline, never cancelled unless `cancel` is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Returns a Cancelled error naming `stage` once the context is done.
    pub fn check(&self, stage: &str) -> RouterResult<()> {
        if self.is_done() {
            debug!(stage = stage, "query cancelled");
            return Err(RouterError::Cancelled(format!("cancelled during {stage}")));
        }
        Ok(())
    }
}
