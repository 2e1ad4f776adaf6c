//! Credential escalation for isolated access.
//!
//! ```text
//! OCM token ──AssumeRoleWithWebIdentity──▶ initial role credentials
//!                                               │
//!             email claim ─▶ session name       │ AssumeRole
//!                                               ▼
//!                                       jump role credentials
//! ```
//!
//! Each step fails with its own fixed message prefix and returns at once;
//! nothing is retried here.

use std::sync::Arc;

use tracing::{debug, info};

use crate::arn::{Arn, RoleChain};
use crate::backplane::{BackplaneApi, BackplaneClientFactory};
use crate::config::ConfigProvider;
use crate::ocm::OcmInterface;
use crate::sts::{Credentials, StaticCredentialsProvider, StsClientFactory, role_session_name};
use crate::token;
use crate::{Error, Result};

/// Session name for the web identity hop, before the caller's identity is known
pub const INITIAL_SESSION_NAME: &str = "backplane-initial";

/// Result of a successful escalation
pub struct IsolatedAccess {
    /// Backplane client authenticated with the caller's bearer token
    pub client: Arc<dyn BackplaneApi>,
    /// Final jump role credentials
    pub credentials: Credentials,
    /// Identity label taken from the token
    pub identity: String,
    /// Roles assumed, in order
    pub role_chain: RoleChain,
}

/// Orchestrates token, configuration and STS collaborators.
pub struct CredentialEscalator {
    ocm: Arc<dyn OcmInterface>,
    config: Arc<dyn ConfigProvider>,
    sts: Arc<dyn StsClientFactory>,
    backplane: Arc<dyn BackplaneClientFactory>,
}

impl CredentialEscalator {
    /// Create an escalator over the given collaborators
    pub fn new(
        ocm: Arc<dyn OcmInterface>,
        config: Arc<dyn ConfigProvider>,
        sts: Arc<dyn StsClientFactory>,
        backplane: Arc<dyn BackplaneClientFactory>,
    ) -> Self {
        Self {
            ocm,
            config,
            sts,
            backplane,
        }
    }

    /// Produce jump role credentials and an authenticated backplane client
    /// for `cluster_id`, looking up its jump role from OCM.
    pub async fn escalate(&self, cluster_id: &str) -> Result<IsolatedAccess> {
        self.run(cluster_id, None).await
    }

    /// Like [`escalate`](Self::escalate) with a jump role the caller already
    /// looked up, usually during classification.
    pub async fn escalate_with_jump_role(&self, cluster_id: &str, jump_role: Arn) -> Result<IsolatedAccess> {
        self.run(cluster_id, Some(jump_role)).await
    }

    async fn run(&self, cluster_id: &str, known_jump_role: Option<Arn>) -> Result<IsolatedAccess> {
        if cluster_id.is_empty() {
            return Err(Error::invalid_argument("must provide non-empty cluster ID"));
        }

        let token = self
            .ocm
            .get_access_token()
            .await
            .map_err(|e| Error::lookup("failed to retrieve OCM token", e))?;

        let bp_config = self
            .config
            .backplane_configuration()
            .map_err(|e| Error::config_with("error retrieving backplane configuration", e))?;

        if bp_config.assume_initial_arn.is_empty() {
            return Err(Error::config(
                "backplane config is missing required `assume-initial-arn` property",
            ));
        }
        let initial = Arn::parse(&bp_config.assume_initial_arn)
            .map_err(|e| Error::config_with("invalid `assume-initial-arn` property", e))?;

        let sts = self
            .sts
            .new_client(bp_config.proxy_url.as_deref())
            .map_err(|e| Error::client_construction("failed to create sts client", e))?;

        debug!(cluster_id, role_arn = %initial, "Assuming initial role with web identity");
        let first_hop = sts
            .assume_role_with_web_identity(&token, &initial, INITIAL_SESSION_NAME)
            .await
            .map_err(|e| Error::role_assumption("failed to assume role using JWT", e))?;

        let identity = token::extract_email(&token)
            .map_err(|e| Error::claim_with("unable to extract email from given token", e))?;

        let caller = StaticCredentialsProvider::from(first_hop);
        let client = self
            .backplane
            .new_client_with_access_token(&bp_config.url, &token)
            .map_err(|e| Error::client_construction("failed to create backplane client with access token", e))?;

        let jump = match known_jump_role {
            Some(jump) => jump,
            None => {
                let raw_jump = self
                    .ocm
                    .get_sts_support_jump_role_arn(cluster_id)
                    .await
                    .map_err(|e| Error::lookup("failed to get STS support jump role ARN", e))?;
                Arn::parse(&raw_jump)?
            }
        };

        debug!(cluster_id, role_arn = %jump, "Assuming jump role");
        let credentials = sts
            .assume_role(&caller, &jump, &role_session_name(&identity))
            .await
            .map_err(|e| Error::role_assumption("failed to assume jump role", e))?;

        info!(cluster_id, identity = %identity, "Isolated access credentials obtained");

        Ok(IsolatedAccess {
            client,
            credentials,
            identity,
            role_chain: RoleChain { initial, jump },
        })
    }
}
