pub mod controller;
pub mod poller;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancellationSignal;
use crate::config::PollingConfig;
use crate::engine::types::{WorkflowHandle, WorkflowSpec};
use crate::engine::Engine;
use crate::error::{AppError, Result};
use crate::notify::ProgressSink;

pub use controller::{OperationOutcome, ResolutionController};
pub use poller::{IntervalScheduler, PollLoop, Scheduler};

/// Polling parameters for one run.
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_consecutive_query_failures: Option<u32>,
}

impl From<&PollingConfig> for PollOptions {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_consecutive_query_failures: config.max_consecutive_query_failures,
        }
    }
}

/// Submit a workflow and track it until the engine reports a final status.
///
/// Only a failed submission is returned as an error (`AppError::Submission`),
/// unless a query failure cap is configured and exceeded. Query and abort
/// failures along the way are reported to `sink` and polling carries on.
pub async fn run_to_completion(
    engine: Arc<dyn Engine>,
    sink: Arc<dyn ProgressSink>,
    spec: &WorkflowSpec,
    cancel: CancellationSignal,
    options: PollOptions,
) -> Result<OperationOutcome> {
    let submitted = engine
        .submit(spec)
        .await
        .map_err(|e| AppError::Submission(Box::new(e)))?;

    let handle = WorkflowHandle::new(submitted.id, spec.label());
    tracing::info!(
        id = %handle.id(),
        label = %handle.label(),
        status = %submitted.status,
        "Workflow submitted"
    );

    let controller = ResolutionController::new(
        handle,
        sink,
        IntervalScheduler::default(),
        options.max_consecutive_query_failures,
    );

    PollLoop::new(engine, controller, options.interval)
        .run(&submitted.status, cancel)
        .await
}
