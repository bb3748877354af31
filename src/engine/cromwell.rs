use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::config::EngineConfig;
use crate::engine::types::*;
use crate::engine::Engine;
use crate::error::{AppError, Result};

/// HTTP client for a Cromwell-style workflow REST API.
pub struct CromwellClient {
    client: Client,
    base_uri: String,
}

impl CromwellClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_uri: config.base_uri.trim_end_matches('/').to_string(),
        })
    }

    fn workflow_url(&self, id: &str, action: &str) -> String {
        format!("{}/{}/{action}", self.base_uri, urlencoding::encode(id))
    }

    async fn file_part(path: &Path) -> Result<Part> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Part::bytes(bytes).file_name(file_name))
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Engine {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }
}

#[async_trait]
impl Engine for CromwellClient {
    async fn submit(&self, spec: &WorkflowSpec) -> Result<WorkflowResponse> {
        let form = Form::new()
            .part("workflowSource", Self::file_part(&spec.source).await?)
            .part("workflowInputs", Self::file_part(&spec.inputs).await?)
            .part("workflowOptions", Self::file_part(&spec.options).await?);

        tracing::debug!(uri = %self.base_uri, source = %spec.source.display(), "Submitting workflow");

        let response = self
            .client
            .post(&self.base_uri)
            .multipart(form)
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn query_status(&self, id: &str) -> Result<WorkflowResponse> {
        let response = self
            .client
            .get(self.workflow_url(id, "status"))
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn abort(&self, id: &str) -> Result<WorkflowResponse> {
        tracing::debug!(id = id, "Requesting workflow abort");

        let response = self
            .client
            .post(self.workflow_url(id, "abort"))
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn metadata(&self, id: &str) -> Result<WorkflowMetadata> {
        let response = self
            .client
            .get(self.workflow_url(id, "metadata"))
            .query(&[
                ("includeKey", "status"),
                ("includeKey", "executionStatus"),
                ("includeKey", "failures"),
                ("includeKey", "stderr"),
                ("expandSubWorkflows", "true"),
            ])
            .send()
            .await?;

        Self::parse(response).await
    }
}
