//! Error types for the backplane broker
//!
//! Every step of the access flow wraps its upstream failure with a fixed,
//! step-identifying message. `Display` renders `"<message>: <source>"` so the
//! failing step is readable without a backtrace.

use std::io;

use aws_sdk_sts::error::DisplayErrorContext;
use thiserror::Error;

/// Result type alias for the broker
pub type Result<T> = std::result::Result<T, Error>;

/// Broker errors
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing caller input
    #[error("{0}")]
    InvalidArgument(String),

    /// Missing or invalid local configuration
    #[error("{message}{}", caused_by(.source))]
    Config {
        /// Step message
        message: String,
        /// Upstream error
        #[source]
        source: Option<Box<Error>>,
    },

    /// External metadata fetch failed
    #[error("{message}{}", caused_by(.source))]
    Lookup {
        /// Step message
        message: String,
        /// Upstream error
        #[source]
        source: Option<Box<Error>>,
    },

    /// Fetched metadata holds an ARN that does not parse
    #[error("malformed ARN {arn:?}: {reason}")]
    MalformedArn {
        /// Raw input
        arn: String,
        /// What was wrong with it
        reason: String,
    },

    /// HTTP/STS/backplane client setup failed
    #[error("{message}{}", caused_by(.source))]
    ClientConstruction {
        /// Step message
        message: String,
        /// Upstream error
        #[source]
        source: Option<Box<Error>>,
    },

    /// STS refused a role assumption
    #[error("{message}{}", caused_by(.source))]
    RoleAssumption {
        /// Step message
        message: String,
        /// Upstream error
        #[source]
        source: Option<Box<Error>>,
    },

    /// Bearer token claims could not be read
    #[error("{message}{}", caused_by(.source))]
    ClaimExtraction {
        /// Step message
        message: String,
        /// Upstream error
        #[source]
        source: Option<Box<Error>>,
    },

    /// Kubeconfig does not hold the expected backplane state
    #[error("{0}")]
    Kubeconfig(String),

    /// Filesystem error, surfaced verbatim
    #[error("{0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token could not be decoded
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// STS service or transport error
    #[error("{}", DisplayErrorContext(.0.as_ref()))]
    Sts(#[source] Box<aws_sdk_sts::Error>),

    /// Bare upstream message
    #[error("{0}")]
    Other(String),
}

fn caused_by(source: &Option<Box<Error>>) -> String {
    source
        .as_ref()
        .map(|e| format!(": {e}"))
        .unwrap_or_default()
}

impl From<aws_sdk_sts::Error> for Error {
    fn from(err: aws_sdk_sts::Error) -> Self {
        Self::Sts(Box::new(err))
    }
}

impl Error {
    /// Invalid caller input
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Configuration problem with no upstream cause
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Configuration problem caused by `source`
    pub fn config_with(message: impl Into<String>, source: Error) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Metadata lookup failure caused by `source`
    pub fn lookup(message: impl Into<String>, source: Error) -> Self {
        Self::Lookup {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Malformed ARN
    pub fn malformed_arn(arn: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedArn {
            arn: arn.into(),
            reason: reason.into(),
        }
    }

    /// Client construction failure caused by `source`
    pub fn client_construction(message: impl Into<String>, source: Error) -> Self {
        Self::ClientConstruction {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Role assumption failure caused by `source`
    pub fn role_assumption(message: impl Into<String>, source: Error) -> Self {
        Self::RoleAssumption {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Claim extraction failure with no upstream cause
    pub fn claim(message: impl Into<String>) -> Self {
        Self::ClaimExtraction {
            message: message.into(),
            source: None,
        }
    }

    /// Claim extraction failure caused by `source`
    pub fn claim_with(message: impl Into<String>, source: Error) -> Self {
        Self::ClaimExtraction {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the caller may retry the same call unchanged.
    ///
    /// Role assumption is only worth retrying with a refreshed token, so it is
    /// reported as non-retryable here.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Lookup { .. } | Self::ClientConstruction { .. } | Self::Http(_) => true,
            Self::InvalidArgument(_)
            | Self::Config { .. }
            | Self::MalformedArn { .. }
            | Self::RoleAssumption { .. }
            | Self::ClaimExtraction { .. }
            | Self::Kubeconfig(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_)
            | Self::Jwt(_)
            | Self::Sts(_)
            | Self::Other(_) => false,
        }
    }
}
