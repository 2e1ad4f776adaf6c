//! STS gateway
//!
//! Builds proxy-aware `aws-sdk-sts` clients and performs the two role
//! assumptions of isolated access:
//!
//! 1. `AssumeRoleWithWebIdentity` - the OCM bearer token is the web identity
//!    assertion; the call is unsigned.
//! 2. `AssumeRole` - signed with the credentials from step 1.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::config::{Credentials as SdkCredentials, SharedCredentialsProvider};
use aws_smithy_http_client::proxy::ProxyConfig;
use aws_smithy_http_client::tls::{self, rustls_provider::CryptoMode};
use aws_smithy_runtime_api::client::http::{HttpClient, SharedHttpClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::arn::Arn;
use crate::{Error, Result};

/// Signing region for STS calls
pub const DEFAULT_STS_REGION: &str = "us-east-1";

/// Provider name the SDK records for chained caller credentials
const CALLER_PROVIDER_NAME: &str = "backplane-initial-role";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_SESSION_NAME_LEN: usize = 64;

/// Temporary AWS credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token
    pub session_token: String,
    /// Expiry, when STS reported one
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Fixed credentials used as the caller identity for a chained assumption.
#[derive(Debug, Clone)]
pub struct StaticCredentialsProvider {
    credentials: Credentials,
}

impl StaticCredentialsProvider {
    /// Wrap a key/secret/session triple
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            credentials: Credentials {
                access_key_id: access_key_id.into(),
                secret_access_key: secret_access_key.into(),
                session_token: session_token.into(),
                expiration: None,
            },
        }
    }

    /// The wrapped credentials
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl From<Credentials> for StaticCredentialsProvider {
    fn from(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

/// Role assumption primitives
#[async_trait]
pub trait StsClient: Send + Sync {
    /// Exchange an OIDC bearer token for credentials of `role`.
    async fn assume_role_with_web_identity(
        &self,
        token: &str,
        role: &Arn,
        session_name: &str,
    ) -> Result<Credentials>;

    /// Assume `role` as the identity behind `caller`.
    async fn assume_role(
        &self,
        caller: &StaticCredentialsProvider,
        role: &Arn,
        session_name: &str,
    ) -> Result<Credentials>;
}

/// Builds STS clients bound to a proxy
pub trait StsClientFactory: Send + Sync {
    /// Create a client that sends every request through `proxy_url`.
    fn new_client(&self, proxy_url: Option<&str>) -> Result<Arc<dyn StsClient>>;
}

/// Factory for [`SdkStsClient`]
#[derive(Debug, Clone, Default)]
pub struct SdkStsClientFactory;

impl StsClientFactory for SdkStsClientFactory {
    fn new_client(&self, proxy_url: Option<&str>) -> Result<Arc<dyn StsClient>> {
        Ok(Arc::new(SdkStsClient::new(proxy_url)?))
    }
}

/// HTTPS client for the SDK, sending every request through `proxy_url`
fn https_client(proxy_url: Option<&str>) -> Result<SharedHttpClient> {
    let builder = aws_smithy_http_client::Builder::new().tls_provider(tls::Provider::Rustls(CryptoMode::AwsLc));
    let Some(proxy) = proxy_url.filter(|p| !p.is_empty()) else {
        return Ok(builder.build_https());
    };

    Url::parse(proxy).map_err(|e| Error::Other(format!("invalid proxy URL {proxy}: {e}")))?;
    let proxy_config =
        ProxyConfig::all(proxy).map_err(|e| Error::Other(format!("invalid proxy URL {proxy}: {e}")))?;
    debug!(proxy, "STS requests go through proxy");
    Ok(builder.proxy_config(proxy_config).build_https())
}

/// STS client over `aws-sdk-sts`
pub struct SdkStsClient {
    config: SdkConfig,
}

impl SdkStsClient {
    /// Client for the default region, optionally through a proxy.
    pub fn new(proxy_url: Option<&str>) -> Result<Self> {
        Ok(Self::with_http_client(https_client(proxy_url)?))
    }

    /// Client sending requests through `http_client`.
    ///
    /// Retries are disabled; callers decide whether a failed step is retried.
    pub fn with_http_client(http_client: impl HttpClient + 'static) -> Self {
        let config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::from_static(DEFAULT_STS_REGION))
            .http_client(http_client)
            .retry_config(RetryConfig::disabled())
            .timeout_config(TimeoutConfig::builder().operation_timeout(REQUEST_TIMEOUT).build())
            .build();
        Self { config }
    }

    fn client(&self, caller: Option<&StaticCredentialsProvider>) -> aws_sdk_sts::Client {
        let mut builder = aws_sdk_sts::config::Builder::from(&self.config);
        if let Some(caller) = caller {
            builder = builder.credentials_provider(SharedCredentialsProvider::new(sdk_credentials(caller)));
        }
        aws_sdk_sts::Client::from_conf(builder.build())
    }
}

#[async_trait]
impl StsClient for SdkStsClient {
    async fn assume_role_with_web_identity(
        &self,
        token: &str,
        role: &Arn,
        session_name: &str,
    ) -> Result<Credentials> {
        debug!(role_arn = %role, session_name, "Calling STS AssumeRoleWithWebIdentity");
        let resp = self
            .client(None)
            .assume_role_with_web_identity()
            .role_arn(role.to_string())
            .role_session_name(session_name)
            .web_identity_token(token)
            .send()
            .await
            .map_err(aws_sdk_sts::Error::from)?;

        resp.credentials()
            .map(Credentials::from)
            .ok_or_else(|| Error::Other("STS AssumeRoleWithWebIdentity response has no credentials".into()))
    }

    async fn assume_role(
        &self,
        caller: &StaticCredentialsProvider,
        role: &Arn,
        session_name: &str,
    ) -> Result<Credentials> {
        debug!(role_arn = %role, session_name, caller = %caller.credentials().access_key_id, "Calling STS AssumeRole");
        let resp = self
            .client(Some(caller))
            .assume_role()
            .role_arn(role.to_string())
            .role_session_name(session_name)
            .send()
            .await
            .map_err(aws_sdk_sts::Error::from)?;

        resp.credentials()
            .map(Credentials::from)
            .ok_or_else(|| Error::Other("STS AssumeRole response has no credentials".into()))
    }
}

impl From<&aws_sdk_sts::types::Credentials> for Credentials {
    fn from(creds: &aws_sdk_sts::types::Credentials) -> Self {
        let expiration = creds.expiration();
        Self {
            access_key_id: creds.access_key_id().to_owned(),
            secret_access_key: creds.secret_access_key().to_owned(),
            session_token: creds.session_token().to_owned(),
            expiration: DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos()),
        }
    }
}

/// SDK credentials for a chained call made as `caller`
fn sdk_credentials(caller: &StaticCredentialsProvider) -> SdkCredentials {
    let creds = caller.credentials();
    SdkCredentials::new(
        &creds.access_key_id,
        &creds.secret_access_key,
        Some(creds.session_token.clone()).filter(|t| !t.is_empty()),
        creds.expiration.map(SystemTime::from),
        CALLER_PROVIDER_NAME,
    )
}

/// Derive a valid `RoleSessionName` from an identity label.
///
/// STS allows `[\w+=,.@-]{2,64}`; anything else becomes `-`.
pub fn role_session_name(identity: &str) -> String {
    let mut name: String = identity
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "_+=,.@-".contains(c) {
                c
            } else {
                '-'
            }
        })
        .take(MAX_SESSION_NAME_LEN)
        .collect();
    while name.len() < 2 {
        name.push('-');
    }
    name
}
