use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::WorkspaceConfig;
use crate::engine::types::WorkflowSpec;
use crate::error::{AppError, Result};

const WDL_EXTENSION: &str = "wdl";
const INPUTS_SUFFIX: &str = ".inputs.json";
const OPTIONS_FILE: &str = "options.json";
const EMPTY_JSON_TEMPLATE: &[u8] = b"{\n\n}";

/// Manages the storage directory holding per-workflow companion files.
pub struct WorkspaceManager {
    storage_dir: PathBuf,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            storage_dir: config.storage_dir.clone(),
        }
    }

    /// Build a submission for a WDL source file, creating empty inputs and
    /// options files on first use. Existing companion files are left as is.
    pub async fn prepare(&self, source: &Path) -> Result<WorkflowSpec> {
        if source.extension().and_then(|e| e.to_str()) != Some(WDL_EXTENSION) {
            return Err(AppError::InvalidWorkflow(
                "This command is only valid for WDL files!".to_string(),
            ));
        }

        let is_file = tokio::fs::metadata(source)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(AppError::InvalidWorkflow(format!(
                "Workflow source not found: {}",
                source.display()
            )));
        }

        tokio::fs::create_dir_all(&self.storage_dir).await?;

        let inputs = self.inputs_path(source);
        let options = self.storage_dir.join(OPTIONS_FILE);
        Self::ensure_file(&inputs).await?;
        Self::ensure_file(&options).await?;

        Ok(WorkflowSpec {
            source: source.to_path_buf(),
            inputs,
            options,
        })
    }

    fn inputs_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.storage_dir.join(format!("{stem}{INPUTS_SUFFIX}"))
    }

    async fn ensure_file(path: &Path) -> Result<()> {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => {
                tracing::info!(path = %path.display(), "Created companion file");
                Self::fill_or_remove(path, file).await
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the empty template. A half-written file would be kept forever by
    /// `create_new`, so it is removed on failure.
    async fn fill_or_remove<W: AsyncWrite + Unpin>(path: &Path, mut writer: W) -> Result<()> {
        let written = match writer.write_all(EMPTY_JSON_TEMPLATE).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        drop(writer);

        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "Removing partially written companion file");
            if let Err(remove) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %remove, "Failed to remove companion file");
            }
            return Err(e.into());
        }
        Ok(())
    }
}
