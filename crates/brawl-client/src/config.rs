//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The portal
//! password is loaded from the BRAWL_PORTAL_PASSWORD env var or
//! password_file, never stored in the TOML directly to avoid leaking
//! secrets.

use std::path::{Path, PathBuf};

use brawl_auth::constants::{
    DEFAULT_KEY_NAME, DEFAULT_SESSION_MARGIN_SECS, IP_DISCOVERY_URL, PORTAL_BASE_URL,
};
use common::Secret;
use serde::Deserialize;

use crate::client::API_BASE_URL;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub portal: PortalConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Developer portal account and key settings
#[derive(Debug, Deserialize)]
pub struct PortalConfig {
    pub email: String,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    /// Path to a file containing the portal password (alternative to the
    /// BRAWL_PORTAL_PASSWORD env var)
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(default = "default_portal_base_url")]
    pub base_url: String,
    #[serde(default = "default_key_name")]
    pub key_name: String,
    #[serde(default = "default_session_margin")]
    pub session_margin_secs: u64,
}

/// Data API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_ip_endpoint")]
    pub ip_endpoint: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            ip_endpoint: default_ip_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_portal_base_url() -> String {
    PORTAL_BASE_URL.into()
}

fn default_api_base_url() -> String {
    API_BASE_URL.into()
}

fn default_ip_endpoint() -> String {
    IP_DISCOVERY_URL.into()
}

fn default_key_name() -> String {
    DEFAULT_KEY_NAME.into()
}

fn default_session_margin() -> u64 {
    DEFAULT_SESSION_MARGIN_SECS
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment
    /// variables.
    ///
    /// Password resolution order:
    /// 1. BRAWL_PORTAL_PASSWORD env var
    /// 2. password_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.portal.email.is_empty() {
            return Err(common::Error::Config("portal email must not be empty".into()));
        }

        for (field, url) in [
            ("portal base_url", &config.portal.base_url),
            ("api base_url", &config.api.base_url),
            ("api ip_endpoint", &config.api.ip_endpoint),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        // Resolve password: env var takes precedence over file
        if let Ok(password) = std::env::var("BRAWL_PORTAL_PASSWORD") {
            config.portal.password = Some(Secret::new(password));
        } else if let Some(ref password_file) = config.portal.password_file {
            let password = std::fs::read_to_string(password_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read password_file {}: {e}",
                    password_file.display()
                ))
            })?;
            let password = password.trim().to_owned();
            if !password.is_empty() {
                config.portal.password = Some(Secret::new(password));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or BRAWL_CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("BRAWL_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("brawl-client.toml")
    }
}
