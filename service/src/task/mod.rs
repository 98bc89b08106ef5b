//! Long-running operation tasks
//!
//! The executor treats the actual install/publish business logic as an
//! opaque task behind this trait: plan the work, apply one step at a
//! time, finish. Each task module owns its own filesystem semantics.

pub mod package;
pub mod publish;

use async_trait::async_trait;

use pkgstream_protocol::ExceptionDetail;

pub use package::UpdatePackageTask;
pub use publish::PublishTask;

/// Unrecoverable failure: the task cannot start (or cannot wrap up).
#[derive(Debug, Clone)]
pub struct TaskError {
    pub message: String,
    pub detail: Option<ExceptionDetail>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(message: impl Into<String>, detail: ExceptionDetail) -> Self {
        Self {
            message: message.into(),
            detail: Some(detail),
        }
    }
}

/// Recoverable failure of one step; the run continues.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub message: String,
    pub detail: ExceptionDetail,
}

/// One counted unit of work.
#[derive(Debug, Clone)]
pub struct TaskStep {
    pub label: String,
}

/// The work a task intends to do.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    /// Administrative messages emitted before the counted sequence,
    /// without progress attached.
    pub banners: Vec<String>,

    /// Step count declared up front; 0 means unknown. May disagree with
    /// `steps.len()` when the task's own accounting is off, in which case
    /// progress runs past 100%.
    pub declared_steps: u32,

    pub steps: Vec<TaskStep>,
}

/// An opaque long-running operation.
#[async_trait]
pub trait OperationTask: Send + Sync {
    /// Inspect inputs and produce the plan. Failure here is unrecoverable
    /// (emitted as a single FATAL message).
    async fn plan(&self) -> Result<TaskPlan, TaskError>;

    /// Apply one step; returns the message text describing it. A
    /// `StepFailure` is recoverable: it is reported and the run continues.
    async fn run_step(&self, index: usize, step: &TaskStep) -> Result<String, StepFailure>;

    /// Wrap up and return an optional history artifact reference.
    async fn finish(&self) -> Result<Option<String>, TaskError>;
}
