use crate::domain::VersionValue;
use crate::error::{ReleaseError, Result};
use std::path::PathBuf;
use std::process::Command;
use tracing::{info, warn};

/// Environment variable carrying the released version
pub const VERSION_ENV: &str = "RELEASE_LADDER_VERSION";
/// Environment variable carrying the distribution tag
pub const DIST_TAG_ENV: &str = "RELEASE_LADDER_DIST_TAG";

/// Publishes a released version to a package registry
pub trait RegistryPublisher {
    fn publish(&self, version: &VersionValue, dist_tag: &str) -> Result<()>;
}

/// Runs a configured command to publish
///
/// The command receives the version and distribution tag through
/// [VERSION_ENV] and [DIST_TAG_ENV].
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandPublisher {
    /// Build from `[publish] command`; `None` when no command is configured
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(CommandPublisher {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: None,
        })
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl RegistryPublisher for CommandPublisher {
    /// Run the publish command
    ///
    /// # Returns
    /// * `Ok(())` if the command exits with code 0
    /// * `Err` if it cannot be started or returns a non-zero exit code
    fn publish(&self, version: &VersionValue, dist_tag: &str) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(VERSION_ENV, version.to_string())
            .env(DIST_TAG_ENV, dist_tag);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        info!(program = %self.program, %version, dist_tag, "publishing");
        let output = cmd.output().map_err(|e| {
            ReleaseError::publish(format!("Failed to execute {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            warn!(code = output.status.code().unwrap_or(-1), "publish command failed");
            return Err(ReleaseError::publish(format!(
                "{} failed with exit code {}\nStdout: {}\nStderr: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stdout,
                stderr
            )));
        }

        Ok(())
    }
}
