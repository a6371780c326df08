//! Run configuration: one JSON file naming the grid, the hand-maintained
//! account/tier/exception files, and the notification target.
//!
//! Relative paths resolve against the directory holding the configuration
//! file. Credentials are never stored here, only the names of the
//! environment variables that hold them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sgtier_error::{Result, SgError};
use sgtier_grid::{ClientSettings, GridEndpoint};
use sgtier_types::{Credentials, Secret};
use tracing::debug;

use crate::loader::{TierFilePaths, read_config_file};
use crate::notify::MailTransport;
use crate::reconcile::TransportPolicy;

pub const DEFAULT_USERNAME_ENV: &str = "SGTIER_USERNAME";
pub const DEFAULT_PASSWORD_ENV: &str = "SGTIER_PASSWORD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub grid: GridConfig,
    /// JSON object of account id -> account name.
    pub account_mapping: PathBuf,
    pub tiers: TierFilePaths,
    /// Optional; without it nothing is excepted.
    #[serde(default)]
    pub exceptions: Option<PathBuf>,
    pub email: EmailConfig,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub on_transport_error: TransportPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    /// Management API host, without scheme.
    pub hostname: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GridConfig {
    pub fn endpoint(&self) -> Result<GridEndpoint> {
        GridEndpoint::new(&self.hostname, &self.api_version)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            accept_invalid_certs: self.accept_invalid_certs,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_api_version() -> String {
    "v4".to_owned()
}

const fn default_accept_invalid_certs() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    pub recipient: String,
    #[serde(default)]
    pub transport: MailTransport,
}

/// Names of the environment variables holding the console credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    #[serde(default = "default_username_env")]
    pub username_env: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username_env: default_username_env(),
            password_env: default_password_env(),
        }
    }
}

fn default_username_env() -> String {
    DEFAULT_USERNAME_ENV.to_owned()
}

fn default_password_env() -> String {
    DEFAULT_PASSWORD_ENV.to_owned()
}

impl RunConfig {
    /// Parse and validate a configuration document. Paths are left as written.
    pub fn from_json_str(path: &Path, text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| SgError::malformed(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.hostname.trim().is_empty() {
            return Err(SgError::invalid("grid.hostname must not be empty"));
        }
        if self.grid.timeout_secs == 0 {
            return Err(SgError::invalid("grid.timeout_secs must be at least 1"));
        }
        if self.email.recipient.trim().is_empty() {
            return Err(SgError::invalid("email.recipient must not be empty"));
        }
        if self.credentials.username_env.is_empty() || self.credentials.password_env.is_empty() {
            return Err(SgError::invalid(
                "credentials.username_env and credentials.password_env must name variables",
            ));
        }
        // Catches bad hostnames and versions before any file or network work.
        self.grid.endpoint()?;
        Ok(())
    }

    /// Rebase every relative path onto `base`.
    #[must_use]
    pub fn resolved_against(self, base: &Path) -> Self {
        Self {
            account_mapping: base.join(&self.account_mapping),
            tiers: self.tiers.resolved_against(base),
            exceptions: self.exceptions.map(|path| base.join(path)),
            email: EmailConfig {
                recipient: self.email.recipient,
                transport: self.email.transport.resolved_against(base),
            },
            log_file: self.log_file.map(|path| base.join(path)),
            ..self
        }
    }
}

/// Read, validate and path-resolve the run configuration at `path`.
pub fn load_run_config(path: &Path) -> Result<RunConfig> {
    let text = read_config_file(path)?;
    let config = RunConfig::from_json_str(path, &text)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let config = config.resolved_against(base);
    debug!(
        path = %path.display(),
        hostname = %config.grid.hostname,
        policy = ?config.on_transport_error,
        "run configuration loaded"
    );
    Ok(config)
}

/// Resolve console credentials through `lookup` (the process environment in
/// production). A missing or empty variable is a configuration error.
pub fn resolve_credentials<F>(config: &CredentialsConfig, lookup: F) -> Result<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    let fetch = |var: &str| {
        lookup(var)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| SgError::CredentialMissing {
                var: var.to_owned(),
            })
    };
    let username = fetch(&config.username_env)?;
    let password = fetch(&config.password_env)?;
    Ok(Credentials {
        username,
        password: Secret::new(password),
    })
}
