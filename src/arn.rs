//! Amazon Resource Names
//!
//! Role ARNs arrive as strings from configuration and from OCM. They are
//! parsed once into [`Arn`] and passed around typed from then on; parsing
//! fails closed.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A syntactically valid ARN:
/// `arn:partition:service:region:account-id:resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    partition: String,
    service: String,
    region: String,
    account_id: String,
    resource: String,
}

impl Arn {
    /// Parse an ARN string.
    ///
    /// The resource part may itself contain `:` (everything after the fifth
    /// separator belongs to it). Region and account may be empty, as they
    /// are for IAM.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(6, ':');

        if parts.next() != Some("arn") {
            return Err(Error::malformed_arn(raw, "missing 'arn:' prefix"));
        }

        let (Some(partition), Some(service), Some(region), Some(account_id), Some(resource)) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(Error::malformed_arn(raw, "not enough sections"));
        };

        if partition.is_empty() {
            return Err(Error::malformed_arn(raw, "empty partition"));
        }
        if service.is_empty() {
            return Err(Error::malformed_arn(raw, "empty service"));
        }
        if resource.is_empty() {
            return Err(Error::malformed_arn(raw, "empty resource"));
        }

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            resource: resource.to_string(),
        })
    }

    /// Partition (`aws`, `aws-us-gov`, ...)
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Service namespace (`iam`, `sts`, ...)
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Region, empty for global services
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Owning account
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Resource part, e.g. `role/path/Name`
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Role name for `role/...` resources: the last path segment.
    pub fn role_name(&self) -> Option<&str> {
        let path = self.resource.strip_prefix("role/")?;
        path.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

impl FromStr for Arn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// The two hops of isolated access: the configured initial role assumed
/// with the caller's web identity, then the per-cluster jump role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChain {
    /// First hop, from backplane configuration
    pub initial: Arn,
    /// Second hop, from the account-management API
    pub jump: Arn,
}
