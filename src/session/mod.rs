//! Session store
//!
//! A session is a directory under the session root, named after the alias
//! or the cluster ID. It holds a history file, generated environment files
//! for bash and zsh, and the kubeconfig written by login. Directories
//! outlive the process so a user can re-enter them; they are only removed
//! by an explicit delete.
//!
//! No locking is done: two processes working on the same session name race.

pub mod env;
pub mod shell;

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info, warn};

pub use env::{SessionEnv, ShellDialect};
pub use shell::{ProcessShellLauncher, ShellLauncher};

use crate::login::{Collaborators, Login};
use crate::{Error, Result};

/// Options for one `session` invocation
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Session name
    pub alias: Option<String>,
    /// Cluster to bind; defaults to the alias
    pub cluster_id: Option<String>,
    /// Remove the session instead of entering it
    pub delete_session: bool,
}

/// The name a session directory is keyed by, and the cluster it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    name: String,
    cluster_key: String,
}

impl SessionIdentity {
    /// Alias names the session when given, else the cluster ID does.
    pub fn resolve(alias: Option<&str>, cluster_id: Option<&str>) -> Result<Self> {
        let alias = alias.filter(|a| !a.is_empty());
        let cluster_id = cluster_id.filter(|c| !c.is_empty());
        let (Some(name), Some(cluster_key)) = (alias.or(cluster_id), cluster_id.or(alias)) else {
            return Err(Error::invalid_argument("ClusterID or Alias required"));
        };

        static NAME_RE: OnceLock<Regex> = OnceLock::new();
        let name_re = NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("static regex"));
        if !name_re.is_match(name) {
            return Err(Error::invalid_argument(format!("invalid session name {name:?}")));
        }

        Ok(Self {
            name: name.to_string(),
            cluster_key: cluster_key.to_string(),
        })
    }

    /// Directory name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// ID, external ID or name to resolve the cluster by
    pub fn cluster_key(&self) -> &str {
        &self.cluster_key
    }
}

/// A backplane session rooted in a session directory.
pub struct BackplaneSession {
    root: PathBuf,
    path: PathBuf,
    login: Login,
    shell: Arc<dyn ShellLauncher>,
    set_up: bool,
}

impl BackplaneSession {
    /// Create a session store under `root`
    pub fn new(root: impl Into<PathBuf>, collaborators: Collaborators, shell: Arc<dyn ShellLauncher>) -> Self {
        let root = root.into();
        Self {
            path: root.clone(),
            root,
            login: Login::new(collaborators),
            shell,
            set_up: false,
        }
    }

    /// Current session directory; the root until a session is selected
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the session directory and its files.
    ///
    /// The history file is only created when absent. Environment files are
    /// always regenerated for the given cluster, so calling this again is
    /// safe and never leaves another cluster's bindings behind.
    pub fn setup(&mut self, cluster_id: &str, cluster_name: &str) -> Result<SessionEnv> {
        fs::create_dir_all(&self.path)?;

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.join(env::HISTORY_FILE))?;

        let session_env = SessionEnv {
            session_dir: self.path.clone(),
            cluster_id: cluster_id.to_string(),
            cluster_name: cluster_name.to_string(),
        };

        for dialect in ShellDialect::all() {
            let file = self.path.join(dialect.env_file());
            if let Ok(existing) = fs::read_to_string(&file)
                && let Some(previous) = env::bound_cluster_id(&existing)
                && previous != cluster_id
            {
                warn!(
                    session = %self.path.display(),
                    previous_cluster = %previous,
                    cluster_id,
                    "Session directory rebound to another cluster"
                );
            }
            fs::write(&file, session_env.render(dialect)?)?;
        }

        self.set_up = true;
        debug!(session = %self.path.display(), cluster_id, "Session set up");
        Ok(session_env)
    }

    /// Enter, or with `delete_session` remove, the session named by `options`.
    pub async fn run_command(&mut self, options: &SessionOptions) -> Result<()> {
        let identity = SessionIdentity::resolve(options.alias.as_deref(), options.cluster_id.as_deref())?;
        self.path = self.root.join(identity.name());

        if options.delete_session {
            return match self.delete() {
                Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound && !self.set_up => {
                    debug!(session = %self.path.display(), "No session to delete");
                    Ok(())
                }
                other => other,
            };
        }

        let cluster = self.login.resolve(identity.cluster_key()).await.map_err(|e| {
            debug!(key = identity.cluster_key(), error = %e, "cluster lookup failed");
            Error::invalid_argument(format!("invalid cluster Id {}", identity.cluster_key()))
        })?;

        let session_env = self.setup(&cluster.id, &cluster.name)?;
        self.login.run(&cluster.id, &session_env.kubeconfig()).await?;

        info!(session = %self.path.display(), cluster_id = %cluster.id, "Session ready");
        self.shell.launch(&self.path).await
    }

    /// Remove the session directory; a missing directory is reported as is.
    pub fn delete(&self) -> Result<()> {
        if self.path == self.root {
            return Err(Error::invalid_argument("no session selected"));
        }
        fs::remove_dir_all(&self.path)?;
        info!(session = %self.path.display(), "Session deleted");
        Ok(())
    }
}
