//! Access classification: direct backplane access or isolated (STS jump
//! role) access.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::arn::Arn;
use crate::ocm::{CloudProvider, Cluster, OcmInterface};
use crate::{Error, Result};

/// Jump role name of the legacy support flow, which needs no isolation
pub const LEGACY_SUPPORT_ROLE: &str = "RH-Technical-Support-Access";

/// How a cluster must be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Backplane with the caller's bearer token
    Direct,
    /// Web identity role, then the cluster's jump role
    Isolated,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Isolated => f.write_str("isolated"),
        }
    }
}

/// Classification result; isolated access carries the jump role it was
/// decided on so escalation does not look it up again
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Backplane with the caller's bearer token
    Direct,
    /// Escalate through `jump_role`
    Isolated {
        /// The cluster's STS support jump role
        jump_role: Arn,
    },
}

impl Access {
    /// Mode without the jump role
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        match self {
            Self::Direct => AccessMode::Direct,
            Self::Isolated { .. } => AccessMode::Isolated,
        }
    }
}

/// Decides the [`Access`] of a cluster
pub struct AccessClassifier {
    ocm: Arc<dyn OcmInterface>,
}

impl AccessClassifier {
    /// Classifier backed by `ocm` for jump role lookups
    pub fn new(ocm: Arc<dyn OcmInterface>) -> Self {
        Self { ocm }
    }

    /// Classify `cluster`.
    ///
    /// Only AWS clusters with STS enabled cost a lookup, and at most one.
    pub async fn classify(&self, cluster: &Cluster) -> Result<Access> {
        if cluster.cloud_provider != CloudProvider::Aws || !cluster.sts_enabled {
            debug!(cluster_id = %cluster.id, "Cluster is not AWS STS, using direct access");
            return Ok(Access::Direct);
        }

        let raw = self
            .ocm
            .get_sts_support_jump_role_arn(&cluster.id)
            .await
            .map_err(|e| Error::lookup("failed to get STS support jump role ARN", e))?;

        let jump_role = Arn::parse(&raw)?;
        let role_name = jump_role
            .role_name()
            .ok_or_else(|| Error::malformed_arn(&raw, "resource is not an IAM role"))?;

        if role_name == LEGACY_SUPPORT_ROLE {
            debug!(cluster_id = %cluster.id, role_name, "Legacy support role, using direct access");
            return Ok(Access::Direct);
        }
        debug!(cluster_id = %cluster.id, role_name, "Classified STS cluster as isolated");
        Ok(Access::Isolated { jump_role })
    }
}
