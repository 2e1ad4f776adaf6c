//! Logout: drop the current backplane context from a kubeconfig.

use std::path::Path;

use tracing::info;

use crate::kubeconfig::{self, KubeconfigExt};
use crate::login::BACKPLANE_SERVER_MARKER;
use crate::{Error, Result};

/// Remove the current context, its cluster and user.
///
/// The file is only rewritten when the current context points at a
/// backplane proxy; any other login is left untouched. Returns the removed
/// context name.
pub fn logout(kubeconfig_path: &Path) -> Result<String> {
    let mut config = kubeconfig::load(kubeconfig_path)?;

    let (name, context) = config
        .current()
        .ok_or_else(|| Error::Kubeconfig("current context does not exist".to_string()))?;
    let name = name.to_string();

    let server = config.server(&context.cluster).unwrap_or_default();
    if !server.contains(BACKPLANE_SERVER_MARKER) {
        return Err(Error::Kubeconfig(format!(
            "you're not logged in using backplane, current context {name} uses {server}"
        )));
    }

    config.remove_context(&name);
    kubeconfig::save(&config, kubeconfig_path)?;

    info!(context = %name, kubeconfig = %kubeconfig_path.display(), "Logged out");
    Ok(name)
}
