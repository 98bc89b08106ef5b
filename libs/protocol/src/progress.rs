//! Per-operation progress counters

use crate::message::Progress;

/// Progress counters for one operation.
///
/// Owned exclusively by the executor driving that operation; created at
/// operation start and discarded at operation end. Never shared between
/// operations.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    total_to_process: u32,
    processed_count: u32,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the counters for a new counted sequence.
    ///
    /// `total_to_process` of 0 means the step count is unknown; percentages
    /// are then computed against a denominator of 1 and are informational
    /// only.
    pub fn begin(&mut self, total_to_process: u32) {
        self.total_to_process = total_to_process;
        self.processed_count = 0;
    }

    /// Record one completed step and return the snapshot for it.
    ///
    /// Incrementing past the declared total is allowed; the percentage then
    /// reports over 100%, which surfaces miscounted plans in the wrapped
    /// task rather than being an error here.
    pub fn record_step(&mut self) -> Progress {
        self.processed_count += 1;
        Progress::compute(self.processed_count, self.total_to_process)
    }

    pub fn total_to_process(&self) -> u32 {
        self.total_to_process
    }

    pub fn processed_count(&self) -> u32 {
        self.processed_count
    }
}
