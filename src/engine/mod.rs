pub mod cromwell;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Request/response contract of the remote execution engine.
///
/// Each call is an independent network round trip. Transport and non-2xx
/// failures both surface as `Err`; callers decide whether they are fatal.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Submit a workflow and return its engine-assigned id and first status.
    async fn submit(&self, spec: &WorkflowSpec) -> Result<WorkflowResponse>;

    /// Fetch the current status of a workflow.
    async fn query_status(&self, id: &str) -> Result<WorkflowResponse>;

    /// Request termination of a workflow. Returns the status after the request.
    async fn abort(&self, id: &str) -> Result<WorkflowResponse>;

    /// Fetch the status, call states and failure causes of a workflow.
    async fn metadata(&self, id: &str) -> Result<WorkflowMetadata>;
}
