//! Post-restore rebuild step
//!
//! Restored packages come back as plain files; native addons and install
//! scripts still need the package manager's rebuild. npmmvn only starts that
//! step and reports whether it succeeded.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while running the rebuild step
#[derive(Debug, Error)]
pub enum RebuildError {
    /// No command configured
    #[error("Rebuild command is empty")]
    EmptyCommand,

    /// Command could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Command ran and failed
    #[error("{command} exited with {status}")]
    Failed { command: String, status: String },
}

/// A rebuild of the restored dependency tree, run in the project root
pub trait Rebuild: Send + Sync {
    fn rebuild(&self, project_root: &Path) -> impl Future<Output = Result<(), RebuildError>> + Send;
}

/// Runs an external command such as `npm rebuild`
#[derive(Debug, Clone)]
pub struct CommandRebuild {
    command: Vec<String>,
}

impl CommandRebuild {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn display(&self) -> String {
        self.command.join(" ")
    }
}

impl Default for CommandRebuild {
    fn default() -> Self {
        Self::new(vec!["npm".to_string(), "rebuild".to_string()])
    }
}

impl Rebuild for CommandRebuild {
    async fn rebuild(&self, project_root: &Path) -> Result<(), RebuildError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(RebuildError::EmptyCommand)?;

        info!(command = %self.display(), root = %project_root.display(), "Rebuild");
        let status = tokio::process::Command::new(program)
            .args(args)
            .current_dir(project_root)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| RebuildError::Spawn {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(RebuildError::Failed {
                command: self.display(),
                status: status.to_string(),
            })
        }
    }
}
