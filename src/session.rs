use std::path::Path;
use std::sync::Arc;

use crate::cancel::CancellationSignal;
use crate::config::AppConfig;
use crate::engine::cromwell::CromwellClient;
use crate::engine::types::WorkflowResponse;
use crate::engine::Engine;
use crate::error::Result;
use crate::notify::{ProgressSink, TracingSink};
use crate::workflow::{run_to_completion, OperationOutcome, PollOptions};
use crate::workspace::WorkspaceManager;

/// Everything one host process needs to drive workflows: configuration, the
/// engine client and the notification sink. Built once at startup and passed
/// to the commands that need it.
pub struct Session {
    config: AppConfig,
    engine: Arc<dyn Engine>,
    sink: Arc<dyn ProgressSink>,
    workspace: WorkspaceManager,
}

impl Session {
    pub fn new(config: AppConfig) -> Result<Self> {
        let engine = Arc::new(CromwellClient::new(&config.engine)?);
        Ok(Self::with_parts(config, engine, Arc::new(TracingSink)))
    }

    pub fn with_parts(
        config: AppConfig,
        engine: Arc<dyn Engine>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let workspace = WorkspaceManager::new(&config.workspace);
        Self {
            config,
            engine,
            sink,
            workspace,
        }
    }

    /// Prepare companion files for `source`, submit it and wait for the outcome.
    pub async fn run(&self, source: &Path, cancel: CancellationSignal) -> Result<OperationOutcome> {
        let spec = self.workspace.prepare(source).await?;

        tracing::info!(
            source = %spec.source.display(),
            inputs = %spec.inputs.display(),
            options = %spec.options.display(),
            "Running workflow"
        );

        run_to_completion(
            Arc::clone(&self.engine),
            Arc::clone(&self.sink),
            &spec,
            cancel,
            PollOptions::from(&self.config.polling),
        )
        .await
    }

    pub async fn status(&self, id: &str) -> Result<WorkflowResponse> {
        self.engine.query_status(id).await
    }

    pub async fn abort(&self, id: &str) -> Result<WorkflowResponse> {
        self.engine.abort(id).await
    }
}
