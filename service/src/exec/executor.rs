//! Operation executor
//!
//! Runs one opaque install/publish task, emits a status message for every
//! milestone, and classifies severity. Messages are flushed one at a time
//! in emission order; order is the externally observable contract.

use tracing::{error, info, warn};

use pkgstream_protocol::{ExceptionDetail, Level, ProgressTracker, StatusMessage};

use crate::exec::sink::{MessageSink, SinkError};
use crate::task::{OperationTask, StepFailure, TaskError};

/// Final classification of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// The run finished; `history` points at the installation history
    /// artifact when the task produced one.
    Completed { history: Option<String> },

    /// The run ended with accumulated or fatal errors, in emission order.
    Failed { errors: Vec<String> },
}

/// Drives one operation against one sink.
///
/// Owns the progress tracker for the operation; neither is shared with
/// any other operation.
pub struct OperationExecutor<S: MessageSink> {
    sink: S,
    tracker: ProgressTracker,
}

impl<S: MessageSink> OperationExecutor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            tracker: ProgressTracker::new(),
        }
    }

    /// Execute the task to completion.
    ///
    /// Recoverable per-step failures are emitted as ERROR and collected;
    /// the run continues and returns `Failed` summarizing them. An
    /// unrecoverable failure emits a single FATAL message, which is
    /// flushed before the operation ends. `Err` is returned only when the
    /// sink goes away (client disconnect), which aborts the run.
    pub async fn run(&mut self, task: &dyn OperationTask) -> Result<TerminalOutcome, SinkError> {
        let plan = match task.plan().await {
            Ok(plan) => plan,
            Err(e) => {
                self.emit_fatal(&e).await?;
                return Ok(TerminalOutcome::Failed {
                    errors: vec![e.message],
                });
            }
        };

        for banner in &plan.banners {
            // Administrative messages bypass the tracker and carry no progress
            self.emit(Level::Info, banner.clone(), None, false).await?;
        }

        self.tracker.begin(plan.declared_steps);
        let mut errors: Vec<String> = Vec::new();

        for (index, step) in plan.steps.iter().enumerate() {
            match task.run_step(index, step).await {
                Ok(description) => {
                    self.emit(Level::Info, description, None, true).await?;
                }
                Err(StepFailure { message, detail }) => {
                    // A failed step is still a processed step: the progress
                    // snapshot includes it.
                    errors.push(message.clone());
                    self.emit(Level::Error, message, Some(detail), true).await?;
                }
            }
        }

        let history = match task.finish().await {
            Ok(history) => history,
            Err(e) => {
                errors.push(e.message.clone());
                self.emit(Level::Error, e.message, e.detail, false).await?;
                None
            }
        };

        if errors.is_empty() {
            info!("Operation completed, {} steps", plan.steps.len());
            Ok(TerminalOutcome::Completed { history })
        } else {
            warn!("Operation finished with {} errors", errors.len());
            Ok(TerminalOutcome::Failed { errors })
        }
    }

    async fn emit(
        &mut self,
        level: Level,
        text: String,
        exception: Option<ExceptionDetail>,
        counted: bool,
    ) -> Result<(), SinkError> {
        let mut msg = StatusMessage::new(level, text);
        if let Some(exception) = exception {
            msg = msg.with_exception(exception);
        }

        if counted {
            let progress = self.tracker.record_step();
            info!(
                "Progress: ({}/{} - {}%)",
                progress.processed, progress.total, progress.percentage
            );
            msg = msg.with_progress(progress);
        } else {
            match level {
                Level::Fatal | Level::Error => error!("{}", msg.message),
                Level::Warn => warn!("{}", msg.message),
                _ => info!("{}", msg.message),
            }
        }

        self.sink.send(&msg).await
    }

    async fn emit_fatal(&mut self, e: &TaskError) -> Result<(), SinkError> {
        self.emit(Level::Fatal, e.message.clone(), e.detail.clone(), false)
            .await
    }
}
