use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for tier reconciliation.
///
/// Only configuration problems abort a run. Every other variant is raised at
/// a single HTTP call or a single notification and is handled by the caller
/// according to the run's continue/abort policy.
#[derive(Error, Debug)]
pub enum SgError {
    // === Configuration Errors ===
    /// A required configuration file does not exist.
    #[error("configuration file not found: '{path}'")]
    ConfigMissing { path: PathBuf },

    /// A required configuration file exists but has no content.
    #[error("configuration file is empty: '{path}'")]
    ConfigEmpty { path: PathBuf },

    /// A configuration file could not be parsed into the expected shape.
    #[error("malformed configuration file '{path}': {detail}")]
    ConfigMalformed { path: PathBuf, detail: String },

    /// Configuration parsed but is semantically unusable.
    #[error("invalid configuration: {detail}")]
    ConfigInvalid { detail: String },

    /// A credential environment variable is unset or empty.
    #[error("credential environment variable '{var}' is not set")]
    CredentialMissing { var: String },

    // === Authentication Errors ===
    /// The authorize endpoint answered with a non-200 status.
    #[error("authorization rejected for {account}: HTTP {status}")]
    AuthRejected { account: String, status: u16 },

    // === Transport Errors ===
    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("request to {endpoint} failed: {detail}")]
    Transport { endpoint: String, detail: String },

    /// The server answered with a non-success status code.
    #[error("request to {endpoint} returned HTTP {status}")]
    HttpStatus { endpoint: String, status: u16 },

    /// The response body was not the JSON shape the endpoint documents.
    #[error("undecodable response from {endpoint}: {detail}")]
    Decode { endpoint: String, detail: String },

    // === Notification Errors ===
    /// A notification could not be handed to its transport.
    #[error("notification failed: {detail}")]
    Notify { detail: String },

    // === I/O Errors ===
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal logic error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification used for policy decisions and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum ErrorKind {
    /// Missing, empty or malformed configuration. Always fatal.
    Config = 2,
    /// Token acquisition failed for one account.
    Auth = 3,
    /// One HTTP call failed or returned garbage.
    Transport = 4,
    /// A notification transport failed.
    Notify = 5,
    /// Local I/O or internal invariant failure.
    Internal = 70,
}

impl SgError {
    /// Map this error onto the reconciliation error taxonomy.
    #[allow(clippy::match_same_arms)]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigMissing { .. }
            | Self::ConfigEmpty { .. }
            | Self::ConfigMalformed { .. }
            | Self::ConfigInvalid { .. }
            | Self::CredentialMissing { .. } => ErrorKind::Config,
            Self::AuthRejected { .. } => ErrorKind::Auth,
            Self::Transport { .. } | Self::HttpStatus { .. } | Self::Decode { .. } => {
                ErrorKind::Transport
            }
            Self::Notify { .. } => ErrorKind::Notify,
            Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error must stop the run regardless of policy.
    pub const fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Config | ErrorKind::Internal)
    }

    /// Whether a later identical request could plausibly succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ConfigMissing { .. } => Some("Check the path in the run configuration"),
            Self::ConfigEmpty { .. } => {
                Some("Populate the file; an empty account mapping is never valid")
            }
            Self::ConfigMalformed { .. } => {
                Some("Tier files are JSON arrays of names; the mapping is a JSON object id -> name")
            }
            Self::CredentialMissing { .. } => {
                Some("Export the tenant console credentials before starting the run")
            }
            Self::AuthRejected { .. } => {
                Some("Verify the account id and that the console user exists in that tenant")
            }
            Self::Transport { .. } => Some("Check grid hostname, DNS and TLS settings"),
            _ => None,
        }
    }

    /// Get the process exit code for this error (for CLI use).
    pub const fn exit_code(&self) -> i32 {
        self.kind() as i32
    }

    /// Create a malformed-config error.
    pub fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::ConfigMalformed {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create an invalid-config error.
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            detail: detail.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `SgError`.
pub type Result<T> = std::result::Result<T, SgError>;
