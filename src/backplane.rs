//! Backplane API collaborator

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{Error, Result};

/// Authenticated backplane API
#[async_trait]
pub trait BackplaneApi: Send + Sync {
    /// Log in to a cluster; returns the proxy URI path for its API server.
    async fn login_cluster(&self, cluster_id: &str) -> Result<String>;
}

/// Builds backplane API clients
pub trait BackplaneClientFactory: Send + Sync {
    /// Client authenticating with the caller's bearer token
    fn new_client_with_access_token(&self, url: &str, token: &str) -> Result<Arc<dyn BackplaneApi>>;
}

/// Factory for [`HttpBackplaneClient`]
#[derive(Debug, Clone, Default)]
pub struct HttpBackplaneClientFactory {
    proxy_url: Option<String>,
}

impl HttpBackplaneClientFactory {
    /// Factory whose clients go through `proxy_url`
    pub fn new(proxy_url: Option<String>) -> Self {
        Self { proxy_url }
    }
}

impl BackplaneClientFactory for HttpBackplaneClientFactory {
    fn new_client_with_access_token(&self, url: &str, token: &str) -> Result<Arc<dyn BackplaneApi>> {
        Ok(Arc::new(HttpBackplaneClient::new(url, token, self.proxy_url.as_deref())?))
    }
}

/// Backplane REST client
pub struct HttpBackplaneClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    proxy_uri: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpBackplaneClient {
    /// Create a client for `url` using `token`
    pub fn new(url: &str, token: &str, proxy_url: Option<&str>) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::invalid_argument("empty access token"));
        }
        let base_url =
            Url::parse(url).map_err(|e| Error::config(format!("invalid backplane url {url}: {e}")))?;

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));
        if let Some(proxy) = proxy_url.filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl BackplaneApi for HttpBackplaneClient {
    async fn login_cluster(&self, cluster_id: &str) -> Result<String> {
        let url = self
            .base_url
            .join(&format!("backplane/login/{cluster_id}"))
            .map_err(|e| Error::Other(format!("invalid login url: {e}")))?;

        debug!(%url, "Backplane login");
        let response = self.http.post(url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body: LoginResponse = response.json().await?;

        match body.proxy_uri {
            Some(uri) if status.is_success() && !uri.is_empty() => Ok(uri),
            _ => Err(Error::Other(format!(
                "backplane login for {cluster_id} failed ({status}): {}",
                body.message.unwrap_or_default()
            ))),
        }
    }
}
