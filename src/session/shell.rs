//! Interactive shell launching

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::env::ShellDialect;
use crate::{Error, Result};

const DEFAULT_SHELL: &str = "/bin/bash";

/// Starts the user's shell inside a session.
#[async_trait]
pub trait ShellLauncher: Send + Sync {
    /// Run a shell in `session_dir` until it exits
    async fn launch(&self, session_dir: &Path) -> Result<()>;
}

/// Launches `$SHELL` as a child process and waits for it.
#[derive(Debug, Clone)]
pub struct ProcessShellLauncher {
    shell: PathBuf,
}

impl ProcessShellLauncher {
    /// Use `shell`
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self { shell: shell.into() }
    }

    /// Use `$SHELL`, else bash
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("SHELL").map_or_else(|| PathBuf::from(DEFAULT_SHELL), PathBuf::from))
    }

    fn dialect(&self) -> ShellDialect {
        match self.shell.file_name().and_then(|n| n.to_str()) {
            Some("zsh") => ShellDialect::Zsh,
            _ => ShellDialect::Bash,
        }
    }
}

#[async_trait]
impl ShellLauncher for ProcessShellLauncher {
    async fn launch(&self, session_dir: &Path) -> Result<()> {
        let dialect = self.dialect();
        let mut cmd = Command::new(&self.shell);
        cmd.current_dir(session_dir);
        match dialect {
            ShellDialect::Bash => {
                cmd.arg("--rcfile").arg(session_dir.join(dialect.env_file()));
            }
            ShellDialect::Zsh => {
                cmd.env("ZDOTDIR", session_dir);
            }
        }

        debug!(shell = %self.shell.display(), dir = %session_dir.display(), "Starting session shell");
        let status = cmd.status().await?;
        if !status.success() {
            return Err(Error::Other(format!(
                "session shell {} exited with {status}",
                self.shell.display()
            )));
        }
        Ok(())
    }
}
