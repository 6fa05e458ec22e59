use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Milestones reported while a reconciliation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sorted,
    Indexed,
    ReferencePass,
    ExactDatePass,
    StrictWindowPass,
    FuzzyPass,
    SplitMergePass,
    Finished,
}

impl Stage {
    pub fn percent(self) -> u8 {
        match self {
            Stage::Sorted => 5,
            Stage::Indexed => 15,
            Stage::ReferencePass => 30,
            Stage::ExactDatePass => 50,
            Stage::StrictWindowPass => 70,
            Stage::FuzzyPass => 85,
            Stage::SplitMergePass => 92,
            Stage::Finished => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub stage: Stage,
    pub percent: u8,
    pub groups_so_far: usize,
}

/// Receives checkpoints. Notifications only; a sink cannot influence the run.
pub trait ProgressSink {
    fn checkpoint(&self, checkpoint: Checkpoint);
}

impl<F: Fn(Checkpoint)> ProgressSink for F {
    fn checkpoint(&self, checkpoint: Checkpoint) {
        self(checkpoint)
    }
}

/// Sink that drops every checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn checkpoint(&self, _checkpoint: Checkpoint) {}
}

/// Cooperative cancellation flag shared between the caller and a running
/// reconciliation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
