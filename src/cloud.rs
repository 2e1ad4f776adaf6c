//! `cloud credentials`: print the jump role credentials of an isolated
//! access cluster.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::Access;
use crate::login::{Collaborators, Login};
use crate::sts::Credentials;
use crate::{Error, Result};

/// Output format for credentials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// `export AWS_...=` lines
    #[default]
    Env,
    /// AWS `credential_process` JSON
    Json,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ProcessCredentials<'a> {
    version: u8,
    access_key_id: &'a str,
    secret_access_key: &'a str,
    session_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<DateTime<Utc>>,
}

/// Escalate to the jump role of `cluster_key` and render its credentials.
pub async fn credentials(collaborators: Collaborators, cluster_key: &str, format: OutputFormat) -> Result<String> {
    let login = Login::new(collaborators.clone());
    let cluster = login.resolve(cluster_key).await?;

    match collaborators.classifier().classify(&cluster).await? {
        Access::Direct => Err(Error::invalid_argument(format!(
            "cluster {} does not use isolated access, no cloud credentials to issue",
            cluster.id
        ))),
        Access::Isolated { jump_role } => {
            let access = collaborators
                .escalator()
                .escalate_with_jump_role(&cluster.id, jump_role)
                .await?;
            render(&access.credentials, format)
        }
    }
}

/// Render credentials in `format`
pub fn render(credentials: &Credentials, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Env => {
            let vars = [
                ("AWS_ACCESS_KEY_ID", credentials.access_key_id.as_str()),
                ("AWS_SECRET_ACCESS_KEY", credentials.secret_access_key.as_str()),
                ("AWS_SESSION_TOKEN", credentials.session_token.as_str()),
            ];
            let mut out = String::new();
            for (name, value) in vars {
                let quoted = shlex::try_quote(value)
                    .map_err(|e| Error::Other(format!("cannot quote {name} for a shell: {e}")))?;
                out.push_str(&format!("export {name}={quoted}\n"));
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&ProcessCredentials {
            version: 1,
            access_key_id: &credentials.access_key_id,
            secret_access_key: &credentials.secret_access_key,
            session_token: &credentials.session_token,
            expiration: credentials.expiration,
        })?),
    }
}
