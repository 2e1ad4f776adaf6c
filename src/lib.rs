//! Backplane credential broker
//!
//! Decides how a managed cluster must be reached, obtains short-lived
//! credentials for that path and materializes a working session.
//!
//! # Access paths
//!
//! - **Direct**: backplane is called with the caller's OCM bearer token.
//! - **Isolated**: the token is exchanged for an initial AWS role with
//!   `AssumeRoleWithWebIdentity`, then the cluster's STS support jump role
//!   is assumed with `AssumeRole`.
//!
//! Every collaborator (OCM, configuration, STS, backplane, shell) sits
//! behind a trait so flows can be driven with fakes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod arn;
pub mod backplane;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod error;
pub mod escalate;
pub mod kubeconfig;
pub mod login;
pub mod logout;
pub mod ocm;
pub mod session;
pub mod sts;
pub mod token;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging on stderr
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
        }
        _ => {
            subscriber.with(fmt::layer().with_writer(std::io::stderr)).init();
        }
    }

    Ok(())
}
