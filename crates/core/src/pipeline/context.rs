//! Threads configuration, branch classification, and cancellation through
//! every phase: spec.md §9 ("Global mutable state" — re-architect by
//! threading a `PipelineContext` struct through every phase).

use std::sync::Arc;

use crate::branch::BranchClassifier;
use crate::options::Options;
use crate::progress::{CancellationToken, ProgressSink};
use crate::scheduler::Scheduler;

pub struct PipelineContext {
    pub options: Options,
    pub classifier: BranchClassifier,
    pub cancellation: CancellationToken,
    pub progress: Arc<dyn ProgressSink>,
    pub scheduler: Scheduler,
    pub repo_uuid: String,
}

impl PipelineContext {
    pub fn new(options: Options, progress: Arc<dyn ProgressSink>, repo_uuid: String) -> Self {
        let classifier = BranchClassifier::new(&options.branchify);
        let scheduler = Scheduler::new(options.serial);
        Self {
            options,
            classifier,
            cancellation: CancellationToken::new(),
            progress,
            scheduler,
            repo_uuid,
        }
    }
}
