//! Writing rewritten modules back to disk.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Overwrites modules in full and runs the configured formatter on them.
#[derive(Debug, Clone, Default)]
pub struct Persister {
    formatter: Vec<String>,
    atomic: bool,
}

impl Persister {
    pub fn new(formatter: Vec<String>, atomic: bool) -> Self {
        Self { formatter, atomic }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.formatter.clone(), config.atomic_writes)
    }

    /// Persister that only writes.
    pub fn without_formatter(mut self) -> Self {
        self.formatter.clear();
        self
    }

    /// Write `contents` to `path`, then format it. Formatting is best effort.
    pub async fn persist(&self, path: &Path, contents: &str) -> Result<(), PersistError> {
        self.write(path, contents).await?;
        self.format(path).await;
        Ok(())
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), PersistError> {
        let err = |source: std::io::Error| PersistError::Write {
            path: path.to_path_buf(),
            source,
        };

        if !self.atomic {
            return tokio::fs::write(path, contents).await.map_err(err);
        }

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, contents).await.map_err(err)?;
        if let Err(source) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err(source));
        }
        Ok(())
    }

    async fn format(&self, path: &Path) {
        let Some((program, args)) = self.formatter.split_first() else {
            return;
        };

        let output = Command::new(program).args(args).arg(path).output().await;
        match output {
            Ok(output) if output.status.success() => {
                debug!(path = %path.display(), formatter = %program, "formatted module");
            }
            Ok(output) => warn!(
                path = %path.display(),
                formatter = %program,
                "formatter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => warn!(path = %path.display(), formatter = %program, "failed to run formatter: {}", e),
        }
    }
}

/// Sibling temporary file, so the rename stays on one filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.docgen.tmp"))
}
