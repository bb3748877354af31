use std::sync::Arc;
use std::time::Duration;

use crate::engine::types::{WorkflowHandle, WorkflowMetadata, WorkflowResponse};
use crate::error::{AppError, Result};
use crate::notify::{Level, Notification, ProgressSink};
use crate::workflow::poller::Scheduler;
use crate::workflow::status::{classify, is_final, StatusClass};

/// Final result of tracking one workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub id: String,
    pub status: String,
}

impl OperationOutcome {
    pub fn class(&self) -> StatusClass {
        classify(&self.status)
    }

    pub fn succeeded(&self) -> bool {
        self.class() == StatusClass::Success
    }
}

/// Mutable state threaded across ticks. Owned by exactly one controller.
#[derive(Debug, Default)]
struct PollState {
    last_notified_status: Option<String>,
    consecutive_query_failures: u32,
    settled: bool,
    outcome: Option<Result<OperationOutcome>>,
}

/// Decides when a tracked workflow is done and resolves it exactly once.
///
/// Every stimulus (initial status, timer-driven query, abort response) goes
/// through the same classify/notify/settle pipeline. `settle` is the only
/// writer of the settled flag and the only place the timer is stopped.
pub struct ResolutionController<S> {
    handle: WorkflowHandle,
    sink: Arc<dyn ProgressSink>,
    scheduler: S,
    max_query_failures: Option<u32>,
    state: PollState,
}

impl<S: Scheduler> ResolutionController<S> {
    pub fn new(
        handle: WorkflowHandle,
        sink: Arc<dyn ProgressSink>,
        scheduler: S,
        max_query_failures: Option<u32>,
    ) -> Self {
        Self {
            handle,
            sink,
            scheduler,
            max_query_failures,
            state: PollState::default(),
        }
    }

    pub fn handle(&self) -> &WorkflowHandle {
        &self.handle
    }

    pub fn is_settled(&self) -> bool {
        self.state.settled
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Start the recurring timer. Ignored once settled.
    pub fn start_timer(&mut self, period: Duration) {
        if self.state.settled {
            return;
        }
        self.scheduler.start(period);
    }

    /// Wait for the next timer tick.
    pub async fn next_tick(&mut self) {
        self.scheduler.tick().await
    }

    /// Classify a status and notify, suppress, or settle accordingly.
    pub fn process_status(&mut self, status: &str) {
        if self.state.settled {
            tracing::debug!(id = %self.handle.id(), status = status, "Ignoring status after settlement");
            return;
        }

        match classify(status) {
            StatusClass::Pending => self.notify_change(Level::Progress, status),
            StatusClass::Success => {
                self.notify(Level::Info, self.status_message(status));
                self.settle_with_status(status);
            }
            StatusClass::Failure => {
                self.notify(Level::Error, self.status_message(status));
                self.settle_with_status(status);
            }
            StatusClass::Aborted if is_final(status) => {
                self.notify(Level::Warning, self.status_message(status));
                self.settle_with_status(status);
            }
            // Aborting: keep polling until the engine reports a final status.
            StatusClass::Aborted => self.notify_change(Level::Warning, status),
        }
    }

    /// Feed the result of a timer-driven status query.
    pub fn on_query_result(&mut self, result: Result<WorkflowResponse>) {
        if self.state.settled {
            return;
        }

        match result {
            Ok(response) => {
                self.state.consecutive_query_failures = 0;
                self.process_status(&response.status);
            }
            Err(e) => {
                self.state.consecutive_query_failures += 1;
                let attempts = self.state.consecutive_query_failures;
                tracing::warn!(
                    id = %self.handle.id(),
                    attempts = attempts,
                    error = %e,
                    "Status query failed"
                );
                self.notify(
                    Level::Error,
                    format!(
                        "Failed to query status of {} ({}): {e}",
                        self.handle.label(),
                        self.handle.id()
                    ),
                );

                if self.max_query_failures.is_some_and(|max| attempts >= max) {
                    self.settle(Err(AppError::QueryRetriesExhausted {
                        id: self.handle.id().to_string(),
                        attempts,
                    }));
                }
            }
        }
    }

    /// Feed the response of an abort request. Discarded after settlement.
    pub fn on_abort_result(&mut self, result: Result<WorkflowResponse>) {
        if self.state.settled {
            tracing::debug!(id = %self.handle.id(), "Discarding abort result after settlement");
            return;
        }

        match result {
            Ok(response) => self.process_status(&response.status),
            Err(e) => {
                tracing::warn!(id = %self.handle.id(), error = %e, "Abort request failed");
                self.notify(
                    Level::Error,
                    format!(
                        "Failed to abort {} ({}): {e}",
                        self.handle.label(),
                        self.handle.id()
                    ),
                );
            }
        }
    }

    /// True when the operation settled with a `Failed` status.
    pub fn settled_as_failure(&self) -> bool {
        matches!(&self.state.outcome, Some(Ok(o)) if o.class() == StatusClass::Failure)
    }

    /// Explain a failed workflow using its metadata. A metadata error is
    /// reported but never changes the outcome.
    pub fn report_failure_details(&self, metadata: Result<WorkflowMetadata>) {
        match metadata {
            Ok(metadata) => {
                let messages = metadata.failure_messages();
                if messages.is_empty() {
                    tracing::debug!(id = %self.handle.id(), "No failure details in metadata");
                    return;
                }
                self.notify(
                    Level::Error,
                    format!(
                        "Failure details for {} ({}):\n\n{}",
                        self.handle.label(),
                        self.handle.id(),
                        messages.join("\n\n")
                    ),
                );
            }
            Err(e) => {
                tracing::warn!(id = %self.handle.id(), error = %e, "Metadata query failed");
                self.notify(
                    Level::Error,
                    format!(
                        "Failed to fetch failure details of {} ({}): {e}",
                        self.handle.label(),
                        self.handle.id()
                    ),
                );
            }
        }
    }

    /// Hand over the outcome. Only meaningful once settled.
    pub fn into_outcome(mut self) -> Result<OperationOutcome> {
        self.state.outcome.take().unwrap_or_else(|| {
            Err(AppError::Internal(format!(
                "workflow {} was never settled",
                self.handle.id()
            )))
        })
    }

    fn settle_with_status(&mut self, status: &str) {
        let outcome = OperationOutcome {
            id: self.handle.id().to_string(),
            status: status.to_string(),
        };
        self.settle(Ok(outcome));
    }

    /// Returns false if the operation was already settled.
    fn settle(&mut self, outcome: Result<OperationOutcome>) -> bool {
        if self.state.settled {
            return false;
        }

        self.state.settled = true;
        self.scheduler.stop();

        match &outcome {
            Ok(o) => tracing::info!(id = %o.id, status = %o.status, "Workflow settled"),
            Err(e) => tracing::warn!(id = %self.handle.id(), error = %e, "Workflow settled with error"),
        }
        self.state.outcome = Some(outcome);
        true
    }

    /// Notify only when the status differs from the last one shown.
    fn notify_change(&mut self, level: Level, status: &str) {
        if self.state.last_notified_status.as_deref() == Some(status) {
            tracing::debug!(id = %self.handle.id(), status = status, "Suppressing duplicate status");
            return;
        }
        self.notify(level, self.status_message(status));
        self.state.last_notified_status = Some(status.to_string());
    }

    fn status_message(&self, status: &str) -> String {
        format!("{} {} ({})", status, self.handle.label(), self.handle.id())
    }

    fn notify(&self, level: Level, message: String) {
        self.sink.notify(Notification::new(level, message));
    }
}
