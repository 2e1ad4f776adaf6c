//! Kubeconfig read/write on top of kube's [`Kubeconfig`] model.
//!
//! Entries are looked up and replaced by name; anything the broker does not
//! touch is written back as read.

use std::fs;
use std::path::{Path, PathBuf};

pub use kube::config::{Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext};

use crate::{Error, Result};

/// `KUBECONFIG` environment variable
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Read a kubeconfig; a missing or empty file is an empty config.
pub fn load(path: &Path) -> Result<Kubeconfig> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Kubeconfig::default()),
        Err(e) => return Err(e.into()),
    };
    if data.trim().is_empty() {
        return Ok(Kubeconfig::default());
    }
    Ok(serde_yaml::from_str(&data)?)
}

/// Write `kubeconfig` to `path`, creating parent directories.
pub fn save(kubeconfig: &Kubeconfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut doc = kubeconfig.clone();
    doc.api_version.get_or_insert_with(|| "v1".to_string());
    doc.kind.get_or_insert_with(|| "Config".to_string());
    fs::write(path, serde_yaml::to_string(&doc)?)?;
    Ok(())
}

/// Name-based lookups and edits of kubeconfig entries
pub trait KubeconfigExt {
    /// Context settings by name
    fn context(&self, name: &str) -> Option<&Context>;

    /// Cluster settings by name
    fn cluster(&self, name: &str) -> Option<&Cluster>;

    /// API server of the named cluster
    fn server(&self, cluster_name: &str) -> Option<&str>;

    /// The selected context, if it exists
    fn current(&self) -> Option<(&str, &Context)>;

    /// Insert or replace a cluster entry
    fn upsert_cluster(&mut self, cluster: NamedCluster);

    /// Insert or replace a user entry
    fn upsert_auth_info(&mut self, auth_info: NamedAuthInfo);

    /// Insert or replace a context entry
    fn upsert_context(&mut self, context: NamedContext);

    /// Remove a context and, when nothing else refers to them, its cluster
    /// and user.
    fn remove_context(&mut self, name: &str) -> Option<NamedContext>;
}

impl KubeconfigExt for Kubeconfig {
    fn context(&self, name: &str) -> Option<&Context> {
        self.contexts
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.context.as_ref())
    }

    fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.cluster.as_ref())
    }

    fn server(&self, cluster_name: &str) -> Option<&str> {
        self.cluster(cluster_name).and_then(|c| c.server.as_deref())
    }

    fn current(&self) -> Option<(&str, &Context)> {
        let name = self.current_context.as_deref().filter(|n| !n.is_empty())?;
        self.context(name).map(|ctx| (name, ctx))
    }

    fn upsert_cluster(&mut self, cluster: NamedCluster) {
        let name = cluster.name.clone();
        upsert(&mut self.clusters, |c| c.name == name, cluster);
    }

    fn upsert_auth_info(&mut self, auth_info: NamedAuthInfo) {
        let name = auth_info.name.clone();
        upsert(&mut self.auth_infos, |a| a.name == name, auth_info);
    }

    fn upsert_context(&mut self, context: NamedContext) {
        let name = context.name.clone();
        upsert(&mut self.contexts, |c| c.name == name, context);
    }

    fn remove_context(&mut self, name: &str) -> Option<NamedContext> {
        let idx = self.contexts.iter().position(|c| c.name == name)?;
        let removed = self.contexts.remove(idx);

        if let Some(ctx) = removed.context.as_ref() {
            let remaining: Vec<&Context> = self.contexts.iter().filter_map(|c| c.context.as_ref()).collect();
            if !remaining.iter().any(|c| c.cluster == ctx.cluster) {
                self.clusters.retain(|c| c.name != ctx.cluster);
            }
            if let Some(user) = ctx.user.as_deref() {
                if !remaining.iter().any(|c| c.user.as_deref() == Some(user)) {
                    self.auth_infos.retain(|a| a.name != user);
                }
            }
        }
        if self.current_context.as_deref() == Some(name) {
            self.current_context = None;
        }
        Some(removed)
    }
}

fn upsert<T>(entries: &mut Vec<T>, same_name: impl Fn(&T) -> bool, entry: T) {
    match entries.iter().position(same_name) {
        Some(idx) => entries[idx] = entry,
        None => entries.push(entry),
    }
}

/// `KUBECONFIG` (first entry), else `~/.kube/config`.
pub fn default_kubeconfig_path() -> Result<PathBuf> {
    if let Some(first) = std::env::var_os(KUBECONFIG_ENV)
        .as_ref()
        .and_then(|v| std::env::split_paths(v).next())
        .filter(|p| !p.as_os_str().is_empty())
    {
        return Ok(first);
    }
    dirs::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .ok_or_else(|| Error::config("Cannot determine home directory"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const SAMPLE: &str = r"
apiVersion: v1
kind: Config
preferences: {}
clusters:
- name: dummy_cluster
  cluster:
    server: https://api.backplane.apps.something3.com/backplane/cluster/configcluster
    certificate-authority-data: Zm9v
contexts:
- name: default/test123/anonymous
  context:
    cluster: dummy_cluster
    namespace: default
current-context: default/test123/anonymous
users: []
";

    fn sample() -> Kubeconfig {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    fn named_cluster(name: &str, server: &str) -> NamedCluster {
        serde_json::from_value(json!({"name": name, "cluster": {"server": server}})).unwrap()
    }

    fn named_context(name: &str, cluster: &str, user: &str) -> NamedContext {
        serde_json::from_value(json!({"name": name, "context": {"cluster": cluster, "user": user}})).unwrap()
    }

    fn named_user(name: &str) -> NamedAuthInfo {
        serde_json::from_value(json!({"name": name, "user": {"token": "t"}})).unwrap()
    }

    #[test]
    fn parses_current_context_and_cluster() {
        let cfg = sample();
        let (name, ctx) = cfg.current().unwrap();
        assert_eq!(name, "default/test123/anonymous");
        assert_eq!(ctx.cluster, "dummy_cluster");
        let cluster = cfg.cluster("dummy_cluster").unwrap();
        assert_eq!(cluster.certificate_authority_data.as_deref(), Some("Zm9v"));
        assert!(cfg.preferences.is_some());
    }

    #[test]
    fn empty_and_missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        assert!(load(&path).unwrap().contexts.is_empty());
        fs::write(&path, "").unwrap();
        assert!(load(&path).unwrap().current_context.is_none());
    }

    /// Fields the broker never edits survive a save and reload
    #[test]
    fn test_save_then_load_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config");
        save(&sample(), &path).unwrap();

        let cfg = load(&path).unwrap();
        assert_eq!(cfg.current_context.as_deref(), Some("default/test123/anonymous"));
        assert_eq!(
            cfg.cluster("dummy_cluster").unwrap().certificate_authority_data.as_deref(),
            Some("Zm9v")
        );
        assert_eq!(cfg.context("default/test123/anonymous").unwrap().namespace.as_deref(), Some("default"));
        assert!(cfg.preferences.is_some());
    }

    #[test]
    fn upsert_replaces_by_name() {
        let mut cfg = Kubeconfig::default();
        cfg.upsert_cluster(named_cluster("a", "https://one"));
        cfg.upsert_cluster(named_cluster("a", "https://two"));
        assert_eq!(cfg.clusters.len(), 1);
        assert_eq!(cfg.server("a"), Some("https://two"));
    }

    #[test]
    fn remove_context_drops_unshared_entries() {
        let mut cfg = Kubeconfig::default();
        cfg.upsert_cluster(named_cluster("c1", "https://one"));
        cfg.upsert_auth_info(named_user("u1"));
        cfg.upsert_context(named_context("ctx1", "c1", "u1"));
        cfg.upsert_context(named_context("ctx2", "c2", "u1"));
        cfg.current_context = Some("ctx1".into());

        assert_eq!(cfg.remove_context("ctx1").unwrap().name, "ctx1");
        assert!(cfg.cluster("c1").is_none());
        assert_eq!(cfg.auth_infos.len(), 1, "user still referenced by ctx2");
        assert!(cfg.current_context.is_none());
        assert!(cfg.remove_context("ctx1").is_none());
    }
}
