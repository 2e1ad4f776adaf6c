//! Configuration management
//!
//! Backplane settings come from `~/.config/backplane/config.json` (or the
//! file named by `BACKPLANE_CONFIG` / `--config`), with environment
//! overrides layered on top:
//!
//! | key                  | env override    |
//! |----------------------|-----------------|
//! | `url`                | `BACKPLANE_URL` |
//! | `proxy-url`          | `HTTPS_PROXY` (only when the file sets none) |
//! | `assume-initial-arn` | -               |
//! | `session-dir`        | -               |
//!
//! OCM settings are read from `~/.config/ocm/ocm.json` with `OCM_URL` and
//! `OCM_TOKEN` overrides.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable naming the backplane API endpoint
pub const BACKPLANE_URL_ENV: &str = "BACKPLANE_URL";

/// Environment variable naming an alternative config file
pub const BACKPLANE_CONFIG_ENV: &str = "BACKPLANE_CONFIG";

/// Default OCM API endpoint
pub const DEFAULT_OCM_URL: &str = "https://api.openshift.com";

const SESSION_DIR_NAME: &str = "backplane";

/// Backplane configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BackplaneConfiguration {
    /// Backplane API URL
    pub url: String,
    /// Proxy for backplane and STS traffic
    pub proxy_url: Option<String>,
    /// First-hop role for isolated access
    pub assume_initial_arn: String,
    /// Base directory for sessions (default `~/backplane`)
    pub session_dir: Option<PathBuf>,
}

impl BackplaneConfiguration {
    /// Load configuration from file and environment.
    ///
    /// An explicitly named file must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::config(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                Some(p.to_path_buf())
            }
            None => default_config_path().filter(|p| p.exists()),
        };

        let mut figment =
            Figment::from(Env::raw().only(&["HTTPS_PROXY"]).map(|_| "proxy-url".into()));
        if let Some(p) = &path {
            figment = figment.merge(Json::file(p));
        }
        figment = figment.merge(Env::raw().only(&[BACKPLANE_URL_ENV]).map(|_| "url".into()));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;

        if config.url.is_empty() {
            return Err(Error::config(format!(
                "backplane url is not set; set `url` in the config file or {BACKPLANE_URL_ENV}"
            )));
        }

        Ok(config)
    }

    /// Base directory holding one sub-directory per session.
    pub fn session_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.session_dir {
            return Ok(dir.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(SESSION_DIR_NAME))
            .ok_or_else(|| Error::config("Cannot determine home directory"))
    }
}

/// `BACKPLANE_CONFIG`, else `~/.config/backplane/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(BACKPLANE_CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::home_dir().map(|home| home.join(".config").join("backplane").join("config.json"))
}

/// Source of backplane configuration for the access flow
pub trait ConfigProvider: Send + Sync {
    /// Current backplane configuration
    fn backplane_configuration(&self) -> Result<BackplaneConfiguration>;
}

/// Reads configuration from disk on every call
#[derive(Debug, Clone, Default)]
pub struct FileConfigProvider {
    path: Option<PathBuf>,
}

impl FileConfigProvider {
    /// Provider for an explicit file, or the default location when `None`
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ConfigProvider for FileConfigProvider {
    fn backplane_configuration(&self) -> Result<BackplaneConfiguration> {
        BackplaneConfiguration::load(self.path.as_deref())
    }
}

/// A configuration fixed at construction
impl ConfigProvider for BackplaneConfiguration {
    fn backplane_configuration(&self) -> Result<BackplaneConfiguration> {
        Ok(self.clone())
    }
}

/// OCM API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcmSettings {
    /// OCM API URL
    pub url: String,
    /// Access token saved by `ocm login`
    pub access_token: Option<String>,
}

impl Default for OcmSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_OCM_URL.to_string(),
            access_token: None,
        }
    }
}

impl OcmSettings {
    /// Load from `~/.config/ocm/ocm.json`, then `OCM_URL` / `OCM_TOKEN`.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(figment::providers::Serialized::defaults(Self::default()));
        if let Some(path) = dirs::home_dir().map(|h| h.join(".config").join("ocm").join("ocm.json")) {
            if path.exists() {
                figment = figment.merge(Json::file(path));
            }
        }
        figment = figment
            .merge(Env::raw().only(&["OCM_URL"]).map(|_| "url".into()))
            .merge(Env::raw().only(&["OCM_TOKEN"]).map(|_| "access_token".into()));

        figment.extract().map_err(|e| Error::config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_kebab_case_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"{{"url":"https://api.backplane.example.com","proxy-url":"http://proxy:8888",
                "assume-initial-arn":"arn:aws:iam::123456789:role/ManagedOpenShift-Support-Role",
                "session-dir":"/tmp/bp-sessions"}}"#
        )
        .unwrap();
        drop(f);

        let config = BackplaneConfiguration::load(Some(&path)).unwrap();
        assert_eq!(config.proxy_url.as_deref(), Some("http://proxy:8888"));
        assert_eq!(
            config.assume_initial_arn,
            "arn:aws:iam::123456789:role/ManagedOpenShift-Support-Role"
        );
        assert_eq!(config.session_root().unwrap(), PathBuf::from("/tmp/bp-sessions"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = BackplaneConfiguration::load(Some(Path::new("/nonexistent/bp.json"))).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn unparseable_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = BackplaneConfiguration::load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn fixed_configuration_is_its_own_provider() {
        let config = BackplaneConfiguration {
            url: "https://bp".into(),
            ..Default::default()
        };
        assert_eq!(config.backplane_configuration().unwrap(), config);
    }

    #[test]
    fn default_session_root_is_under_home() {
        let config = BackplaneConfiguration::default();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.session_root().unwrap(), home.join("backplane"));
        }
    }
}
