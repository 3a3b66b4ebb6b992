//! Real file system service implementation
//!
//! Writes run artifacts into the output directory. Each file is written to a
//! temporary sibling and renamed into place so readers never see a partial file.

use async_trait::async_trait;
use shared::{harness_debug, Component};
use std::path::PathBuf;
use tokio::fs;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::FileSystem;

pub struct RealFileSystem {
    base_dir: PathBuf,
}

impl RealFileSystem {
    /// Outputs to `./output`
    pub fn new() -> Self {
        Self::with_base_dir(PathBuf::from("./output"))
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }
}

impl Default for RealFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for RealFileSystem {
    async fn write_artifact(&self, name: &str, contents: &str) -> OrchestratorResult<PathBuf> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| OrchestratorError::file_system("create directory", &self.base_dir, e))?;

        let path = self.base_dir.join(name);
        let temp_path = self.base_dir.join(format!(".{name}.tmp"));

        fs::write(&temp_path, contents)
            .await
            .map_err(|e| OrchestratorError::file_system("write", &temp_path, e))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| OrchestratorError::file_system("rename", &path, e))?;

        harness_debug!(Component::Reporter, "📁 Wrote {}", path.display());
        Ok(path)
    }
}
