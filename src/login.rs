//! Login orchestration
//!
//! Resolves the cluster, picks the access path, logs in through backplane
//! and writes a kubeconfig context pointing at the backplane proxy. The
//! kubeconfig user runs `ocm token` as an exec plugin, so no credential is
//! written to disk.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::access::{Access, AccessClassifier, AccessMode};
use crate::backplane::{BackplaneApi, BackplaneClientFactory};
use crate::config::ConfigProvider;
use crate::escalate::CredentialEscalator;
use crate::kubeconfig::{self, KubeconfigExt, NamedAuthInfo, NamedCluster, NamedContext};
use crate::ocm::{Cluster, OcmInterface};
use crate::sts::StsClientFactory;
use crate::{Error, Result};

/// Marker path segment of kubeconfig servers that go through backplane
pub const BACKPLANE_SERVER_MARKER: &str = "/backplane/cluster/";

const KUBECONFIG_USER: &str = "anonymous";
const DEFAULT_NAMESPACE: &str = "default";
const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

/// The collaborators every orchestrator needs
#[derive(Clone)]
pub struct Collaborators {
    /// Account management
    pub ocm: Arc<dyn OcmInterface>,
    /// Backplane configuration
    pub config: Arc<dyn ConfigProvider>,
    /// STS client construction
    pub sts: Arc<dyn StsClientFactory>,
    /// Backplane client construction
    pub backplane: Arc<dyn BackplaneClientFactory>,
}

impl Collaborators {
    /// Classifier over these collaborators
    pub fn classifier(&self) -> AccessClassifier {
        AccessClassifier::new(Arc::clone(&self.ocm))
    }

    /// Escalator over these collaborators
    pub fn escalator(&self) -> CredentialEscalator {
        CredentialEscalator::new(
            Arc::clone(&self.ocm),
            Arc::clone(&self.config),
            Arc::clone(&self.sts),
            Arc::clone(&self.backplane),
        )
    }
}

/// What a login wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Canonical cluster ID
    pub cluster_id: String,
    /// Cluster display name
    pub cluster_name: String,
    /// Backplane proxy server for the cluster API
    pub server: String,
    /// Kubeconfig context written
    pub context: String,
    /// Access path used
    pub access_mode: AccessMode,
}

/// Login orchestrator
pub struct Login {
    collaborators: Collaborators,
    classifier: AccessClassifier,
    escalator: CredentialEscalator,
}

impl Login {
    /// Create an orchestrator over `collaborators`
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            classifier: collaborators.classifier(),
            escalator: collaborators.escalator(),
            collaborators,
        }
    }

    /// Resolve an ID, external ID or name to the canonical cluster.
    pub async fn resolve(&self, cluster_key: &str) -> Result<Cluster> {
        let ocm = &self.collaborators.ocm;
        let (cluster_id, cluster_name) = ocm
            .get_target_cluster(cluster_key)
            .await
            .map_err(|e| Error::lookup(format!("failed to find cluster {cluster_key}"), e))?;
        let mut cluster = ocm
            .get_cluster(&cluster_id)
            .await
            .map_err(|e| Error::lookup(format!("failed to get cluster {cluster_id}"), e))?;
        if cluster.name.is_empty() {
            cluster.name = cluster_name;
        }
        Ok(cluster)
    }

    /// Log in to `cluster_key` and write the context into `kubeconfig_path`.
    pub async fn run(&self, cluster_key: &str, kubeconfig_path: &Path) -> Result<LoginOutcome> {
        if cluster_key.is_empty() {
            return Err(Error::invalid_argument("cluster ID or name required"));
        }

        let cluster = self.resolve(cluster_key).await?;
        if cluster.hibernating {
            return Err(Error::invalid_argument(format!(
                "cluster {} is hibernating, login failed",
                cluster.id
            )));
        }

        let bp_config = self
            .collaborators
            .config
            .backplane_configuration()
            .map_err(|e| Error::config_with("error retrieving backplane configuration", e))?;

        let access = self.classifier.classify(&cluster).await?;
        let access_mode = access.mode();
        let client = match access {
            Access::Direct => self.direct_client(&bp_config.url).await?,
            Access::Isolated { jump_role } => {
                self.escalator
                    .escalate_with_jump_role(&cluster.id, jump_role)
                    .await?
                    .client
            }
        };

        let proxy_uri = client
            .login_cluster(&cluster.id)
            .await
            .map_err(|e| Error::lookup(format!("failed to log in to cluster {}", cluster.id), e))?;
        let server = format!(
            "{}/{}",
            bp_config.url.trim_end_matches('/'),
            proxy_uri.trim_start_matches('/')
        );
        debug!(cluster_id = %cluster.id, %server, %access_mode, "Backplane login accepted");

        let context = write_context(kubeconfig_path, &cluster.id, &server, bp_config.proxy_url)?;
        info!(
            cluster_id = %cluster.id,
            context = %context,
            kubeconfig = %kubeconfig_path.display(),
            "Logged in"
        );

        Ok(LoginOutcome {
            cluster_id: cluster.id,
            cluster_name: cluster.name,
            server,
            context,
            access_mode,
        })
    }

    async fn direct_client(&self, url: &str) -> Result<Arc<dyn BackplaneApi>> {
        let token = self
            .collaborators
            .ocm
            .get_access_token()
            .await
            .map_err(|e| Error::lookup("failed to retrieve OCM token", e))?;
        self.collaborators
            .backplane
            .new_client_with_access_token(url, &token)
            .map_err(|e| Error::client_construction("failed to create backplane client with access token", e))
    }
}

/// Kubeconfig context name for a cluster
pub fn context_name(cluster_id: &str) -> String {
    format!("{DEFAULT_NAMESPACE}/{cluster_id}/{KUBECONFIG_USER}")
}

fn write_context(
    path: &Path,
    cluster_id: &str,
    server: &str,
    proxy_url: Option<String>,
) -> Result<String> {
    let mut config = kubeconfig::load(path)?;
    let context = context_name(cluster_id);

    let mut cluster = json!({ "server": server });
    if let Some(proxy_url) = proxy_url.filter(|p| !p.is_empty()) {
        cluster["proxy-url"] = json!(proxy_url);
    }
    config.upsert_cluster(entry::<NamedCluster>(json!({ "name": cluster_id, "cluster": cluster }))?);
    config.upsert_auth_info(entry::<NamedAuthInfo>(json!({
        "name": KUBECONFIG_USER,
        "user": {
            "exec": {
                "apiVersion": EXEC_API_VERSION,
                "command": "ocm",
                "args": ["token"]
            }
        }
    }))?);
    config.upsert_context(entry::<NamedContext>(json!({
        "name": context,
        "context": {
            "cluster": cluster_id,
            "user": KUBECONFIG_USER,
            "namespace": DEFAULT_NAMESPACE
        }
    }))?);
    config.current_context = Some(context.clone());
    kubeconfig::save(&config, path)?;

    Ok(context)
}

/// A kubeconfig entry from its on-disk form
fn entry<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}
