//! OCM account-management collaborator
//!
//! Cluster lookups, identity token and STS support jump role metadata.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::OcmSettings;
use crate::{Error, Result};

const CLUSTERS_PATH: &str = "/api/clusters_mgmt/v1/clusters";

/// Cloud hosting a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudProvider {
    /// Amazon Web Services
    Aws,
    /// Google Cloud
    Gcp,
    /// Anything else, by OCM id
    Other(String),
}

impl CloudProvider {
    fn from_id(id: &str) -> Self {
        match id {
            "aws" => Self::Aws,
            "gcp" => Self::Gcp,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The cluster facts access decisions depend on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Canonical cluster ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Hosting cloud
    pub cloud_provider: CloudProvider,
    /// Whether the AWS account uses STS
    pub sts_enabled: bool,
    /// Whether the cluster is hibernating
    pub hibernating: bool,
}

impl Cluster {
    /// An AWS cluster
    pub fn aws(id: impl Into<String>, sts_enabled: bool) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            cloud_provider: CloudProvider::Aws,
            sts_enabled,
            hibernating: false,
        }
    }

    /// A GCP cluster
    pub fn gcp(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            cloud_provider: CloudProvider::Gcp,
            sts_enabled: false,
            hibernating: false,
        }
    }
}

/// Account-management API used by the access flow
#[async_trait]
pub trait OcmInterface: Send + Sync {
    /// Caller's bearer token
    async fn get_access_token(&self) -> Result<String>;

    /// Resolve an ID, external ID or name to `(canonical id, name)`.
    async fn get_target_cluster(&self, key: &str) -> Result<(String, String)>;

    /// Cluster facts by canonical ID
    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster>;

    /// Per-cluster STS support jump role ARN
    async fn get_sts_support_jump_role_arn(&self, cluster_id: &str) -> Result<String>;
}

/// OCM REST client
pub struct HttpOcmClient {
    http: reqwest::Client,
    settings: OcmSettings,
}

#[derive(Deserialize)]
struct ClusterList {
    #[serde(default)]
    items: Vec<ClusterObject>,
}

#[derive(Deserialize)]
struct ClusterObject {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    cloud_provider: Option<IdRef>,
    #[serde(default)]
    aws: Option<AwsObject>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Deserialize)]
struct AwsObject {
    #[serde(default)]
    sts: Option<StsObject>,
}

#[derive(Deserialize)]
struct StsObject {
    #[serde(default)]
    enabled: bool,
}

#[derive(Deserialize)]
struct JumpRole {
    role_arn: String,
}

impl From<ClusterObject> for Cluster {
    fn from(obj: ClusterObject) -> Self {
        Self {
            cloud_provider: obj
                .cloud_provider
                .map_or(CloudProvider::Other(String::new()), |p| CloudProvider::from_id(&p.id)),
            sts_enabled: obj.aws.and_then(|a| a.sts).is_some_and(|s| s.enabled),
            hibernating: obj.state.as_deref() == Some("hibernating"),
            id: obj.id,
            name: obj.name,
        }
    }
}

impl HttpOcmClient {
    /// Create a client from OCM settings
    pub fn new(settings: OcmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, settings })
    }

    fn token(&self) -> Result<&str> {
        self.settings
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::config("not logged in to OCM; run `ocm login` or set OCM_TOKEN"))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = url::Url::parse(&self.settings.url)
            .map_err(|e| Error::config(format!("invalid OCM url {}: {e}", self.settings.url)))?;
        url.set_path(path);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }

        debug!(%url, "OCM request");
        let response = self.http.get(url).bearer_auth(self.token()?).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Other(format!("OCM returned {status}: {}", body.trim())));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl OcmInterface for HttpOcmClient {
    async fn get_access_token(&self) -> Result<String> {
        self.token().map(ToString::to_string)
    }

    async fn get_target_cluster(&self, key: &str) -> Result<(String, String)> {
        let search = cluster_search(key);
        let list: ClusterList = self.get(CLUSTERS_PATH, &[("search", search.as_str())]).await?;
        match list.items.as_slice() {
            [cluster] => Ok((cluster.id.clone(), cluster.name.clone())),
            [] => Err(Error::Other(format!("no cluster found for {key}"))),
            _ => Err(Error::Other(format!("{key} matches more than one cluster"))),
        }
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster> {
        let obj: ClusterObject = self.get(&format!("{CLUSTERS_PATH}/{cluster_id}"), &[]).await?;
        Ok(obj.into())
    }

    async fn get_sts_support_jump_role_arn(&self, cluster_id: &str) -> Result<String> {
        let role: JumpRole = self
            .get(&format!("{CLUSTERS_PATH}/{cluster_id}/sts_support_jump_role"), &[])
            .await?;
        Ok(role.role_arn)
    }
}

/// Search expression matching `key` against ID, name or external ID.
///
/// Quotes in `key` are doubled so it stays a single string literal.
fn cluster_search(key: &str) -> String {
    let key = key.replace('\'', "''");
    format!("id = '{key}' or name = '{key}' or external_id = '{key}'")
}
