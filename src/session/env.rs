//! Generated shell environment files

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// History file name
pub const HISTORY_FILE: &str = ".history";
/// Environment file sourced by bash
pub const BASH_ENV_FILE: &str = ".ocenv";
/// Environment file read by zsh through `ZDOTDIR`
pub const ZSH_ENV_FILE: &str = ".zshenv";

const CLUSTER_ID_VAR: &str = "CLUSTERID";

/// Shell dialect of an environment file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellDialect {
    /// `bash --rcfile .ocenv`
    Bash,
    /// `zsh` with `ZDOTDIR` at the session directory
    Zsh,
}

impl ShellDialect {
    /// Environment file for this dialect
    pub fn env_file(self) -> &'static str {
        match self {
            Self::Bash => BASH_ENV_FILE,
            Self::Zsh => ZSH_ENV_FILE,
        }
    }

    /// Every dialect a session provides
    pub fn all() -> [Self; 2] {
        [Self::Bash, Self::Zsh]
    }
}

/// What a session's environment binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnv {
    /// Session directory
    pub session_dir: PathBuf,
    /// Canonical cluster ID
    pub cluster_id: String,
    /// Cluster name as shown to the user
    pub cluster_name: String,
}

impl SessionEnv {
    /// Kubeconfig the session's tools use
    pub fn kubeconfig(&self) -> PathBuf {
        kubeconfig_path(&self.session_dir, &self.cluster_id)
    }

    /// Render the environment file for `dialect`, one `export` per line.
    pub fn render(&self, dialect: ShellDialect) -> Result<String> {
        let dir = &self.session_dir;
        let lines = [
            export("HISTFILE", &quote_path(&dir.join(HISTORY_FILE))?),
            format!("export PATH=\"$PATH\":{}", quote_path(&dir.join("bin"))?),
            export("KUBECONFIG", &quote_path(&self.kubeconfig())?),
            export(CLUSTER_ID_VAR, &quote(&self.cluster_id)?),
            export("CLUSTERNAME", &quote(&self.cluster_name)?),
            match dialect {
                ShellDialect::Bash => r#"export PS1="[${CLUSTERNAME} \W]\$ ""#.to_string(),
                ShellDialect::Zsh => r#"export PROMPT="[${CLUSTERNAME} %1~]%# ""#.to_string(),
            },
        ];
        Ok(lines.join("\n") + "\n")
    }
}

/// `<session>/<cluster id>/config`
pub fn kubeconfig_path(session_dir: &Path, cluster_id: &str) -> PathBuf {
    session_dir.join(cluster_id).join("config")
}

/// Cluster ID an existing environment file is bound to.
pub fn bound_cluster_id(contents: &str) -> Option<String> {
    let prefix = format!("export {CLUSTER_ID_VAR}=");
    contents
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .and_then(|value| shlex::split(value))
        .and_then(|mut words| words.pop())
        .filter(|id| !id.is_empty())
}

fn export(name: &str, value: &str) -> String {
    format!("export {name}={value}")
}

fn quote(value: &str) -> Result<String> {
    shlex::try_quote(value)
        .map(|q| q.into_owned())
        .map_err(|e| Error::invalid_argument(format!("cannot quote {value:?} for a shell: {e}")))
}

fn quote_path(path: &Path) -> Result<String> {
    quote(&path.to_string_lossy())
}
