//! Progress reporting and cooperative cancellation: spec.md §4 component 7,
//! §5.
//!
//! Cancellation is a one-way `Arc<AtomicBool>` flag set by the caller; every
//! long per-revision or per-event loop checks it after each unit of work
//! and returns promptly. There is no preemption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative, one-way cancellation signal shared between the caller and
/// the running pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What a phase returns when it checks cancellation mid-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed,
    Cancelled,
}

/// A sink for coarse per-phase progress. Implementations must be cheap to
/// call from parallel workers; `report` may be called far more often than
/// once per unit of real work.
pub trait ProgressSink: Send + Sync {
    fn start_phase(&self, name: &str, total: u64);
    fn advance(&self, delta: u64);
    fn finish_phase(&self);
}

/// The default no-op sink, used by library callers and tests.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn start_phase(&self, _name: &str, _total: u64) {}
    fn advance(&self, _delta: u64) {}
    fn finish_phase(&self) {}
}

/// A sink that reports phase transitions and completion through `tracing`,
/// the way the teacher's CLI logs daemon lifecycle events.
#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn start_phase(&self, name: &str, total: u64) {
        tracing::info!(phase = name, total, "phase started");
    }

    fn advance(&self, _delta: u64) {}

    fn finish_phase(&self) {
        tracing::debug!("phase finished");
    }
}
