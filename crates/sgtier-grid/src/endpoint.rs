//! Versioned URL construction for the management API.

use sgtier_error::{Result, SgError};

/// Request paths relative to the versioned API base.
pub mod paths {
    pub const AUTHORIZE: &str = "/authorize";
    pub const LIST_BUCKETS: &str = "/org/containers?include=compliance,region";

    pub fn policy_tag(bucket: &str) -> String {
        format!("/org/containers/{bucket}/ilm-policy-tag")
    }

    pub fn consistency(bucket: &str) -> String {
        format!("/org/containers/{bucket}/consistency")
    }
}

/// Grid host plus API version, e.g. `https://grid.example.net/api/v4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridEndpoint {
    base_url: String,
}

impl GridEndpoint {
    /// Build an endpoint from a bare hostname (optionally with `:port`).
    ///
    /// The scheme is always `https`; a hostname that already carries a
    /// scheme is rejected rather than silently doubled.
    pub fn new(hostname: &str, api_version: &str) -> Result<Self> {
        let hostname = hostname.trim().trim_end_matches('/');
        if hostname.is_empty() {
            return Err(SgError::invalid("grid hostname must be non-empty"));
        }
        if hostname.contains("://") {
            return Err(SgError::invalid(format!(
                "grid hostname must not include a scheme: {hostname}"
            )));
        }
        let version = api_version.trim().trim_start_matches('v');
        if version.is_empty() || !version.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(SgError::invalid(format!(
                "api version must look like 'v4', got '{api_version}'"
            )));
        }
        Ok(Self {
            base_url: format!("https://{hostname}/api/v{version}"),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for `path`, or the bare base URL when `path` is `None`.
    pub fn url(&self, path: Option<&str>) -> String {
        match path {
            None => self.base_url.clone(),
            Some(path) => format!("{}{path}", self.base_url),
        }
    }
}
