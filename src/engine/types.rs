use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Body returned by every engine endpoint (submit, status, abort).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub status: String,
}

/// Files that make up one workflow submission.
#[derive(Debug, Clone)]
pub struct WorkflowSpec {
    pub source: PathBuf,
    pub inputs: PathBuf,
    pub options: PathBuf,
}

impl WorkflowSpec {
    /// Human-readable label for the submission, taken from the source file name.
    pub fn label(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Identifies one in-flight workflow. Created on successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowHandle {
    id: String,
    label: String,
}

impl WorkflowHandle {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Subset of `GET {base}/{id}/metadata` needed to explain a failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowMetadata {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub failures: Vec<Failure>,
    #[serde(default)]
    pub calls: BTreeMap<String, Vec<CallAttempt>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAttempt {
    #[serde(default)]
    pub execution_status: String,
    #[serde(default)]
    pub failures: Vec<Failure>,
    #[serde(default)]
    pub stderr: Option<String>,
}

/// One failure with its nested causes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub caused_by: Vec<Failure>,
}

impl WorkflowMetadata {
    /// Flattened failure messages, one entry per failed call attempt. Falls
    /// back to the workflow-level failures when no call failed. Empty unless
    /// the workflow itself is `Failed`.
    pub fn failure_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if self.status != "Failed" {
            return messages;
        }

        for (call, attempts) in &self.calls {
            for attempt in attempts.iter().filter(|a| a.execution_status == "Failed") {
                let mut lines = collect_failures(&attempt.failures);
                if let Some(stderr) = &attempt.stderr {
                    lines.push(format!("stderr: {stderr}"));
                }
                messages.push(format!("{call}: {}", lines.join("\n\n")));
            }
        }

        if messages.is_empty() {
            let lines = collect_failures(&self.failures);
            if !lines.is_empty() {
                messages.push(lines.join("\n\n"));
            }
        }

        messages
    }
}

/// Depth-first: causes come before the message they explain.
pub fn collect_failures(failures: &[Failure]) -> Vec<String> {
    fn walk(failures: &[Failure], out: &mut Vec<String>) {
        for failure in failures {
            walk(&failure.caused_by, out);
            if !failure.message.is_empty() {
                out.push(failure.message.clone());
            }
        }
    }

    let mut out = Vec::new();
    walk(failures, &mut out);
    out
}
