//! Authenticated client for the StorageGRID tenant management API.
//!
//! [`GridApi`] is the seam the reconciliation core talks to. [`GridClient`]
//! implements it over blocking HTTPS; tests implement it in memory.
//!
//! Every call is one synchronous request/response. No retries happen here:
//! callers decide what a failed call means.

pub mod endpoint;
pub mod wire;

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use sgtier_error::{Result, SgError};
use sgtier_types::{ConsistencyLevel, PolicyTag, Secret};
use tracing::{debug, error, info};

pub use endpoint::{GridEndpoint, paths};
pub use wire::{ApiStatus, AuthRequest, BucketSummary};

/// Bearer token returned by the authorize endpoint.
#[derive(Debug, Clone)]
pub struct Token(Secret);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Secret::new(value))
    }

    pub fn expose(&self) -> &str {
        self.0.expose()
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.0.expose())
    }
}

/// The grid operations the reconciler depends on.
pub trait GridApi {
    /// Exchange console credentials for a bearer token.
    ///
    /// `account_name` only affects logging: `None` means grid-level
    /// authentication.
    fn authorize(&self, request: &AuthRequest<'_>, account_name: Option<&str>) -> Result<Token>;

    /// List every bucket visible to the token's account.
    fn list_buckets(&self, token: &Token) -> Result<Vec<BucketSummary>>;

    /// Read a bucket's ILM policy tag; `Ok(None)` means no tag is assigned.
    fn get_policy_tag(&self, token: &Token, bucket: &str) -> Result<Option<PolicyTag>>;

    /// Assign an ILM policy tag to a bucket.
    fn put_policy_tag(&self, token: &Token, bucket: &str, tag: &PolicyTag) -> Result<ApiStatus>;

    /// Read a bucket's consistency level; `Ok(None)` means the grid reported none.
    fn get_consistency(&self, token: &Token, bucket: &str) -> Result<Option<ConsistencyLevel>>;

    /// Assert a bucket's consistency level.
    fn set_consistency(
        &self,
        token: &Token,
        bucket: &str,
        level: &ConsistencyLevel,
    ) -> Result<ApiStatus>;
}

/// Transport settings for [`GridClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Skip TLS certificate verification (grids commonly run self-signed certs).
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Blocking HTTPS implementation of [`GridApi`].
#[derive(Debug)]
pub struct GridClient {
    endpoint: GridEndpoint,
    client: Client,
}

impl GridClient {
    pub fn new(endpoint: GridEndpoint, settings: &ClientSettings) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| SgError::invalid(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &GridEndpoint {
        &self.endpoint
    }

    fn get(&self, url: &str, token: &Token) -> RequestBuilder {
        self.client.get(url).header("Authorization", token.bearer())
    }
}

/// Send a request and return the status plus raw body.
fn exchange(url: &str, request: RequestBuilder) -> Result<(StatusCode, String)> {
    let response = request
        .send()
        .map_err(|e| SgError::transport(url, e.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| SgError::transport(url, format!("failed to read body: {e}")))?;
    debug!(url, status = status.as_u16(), bytes = body.len(), "grid response");
    Ok((status, body))
}

/// Like [`exchange`] but non-2xx statuses become errors.
fn exchange_ok(url: &str, request: RequestBuilder) -> Result<String> {
    let (status, body) = exchange(url, request)?;
    if !status.is_success() {
        return Err(SgError::HttpStatus {
            endpoint: url.to_owned(),
            status: status.as_u16(),
        });
    }
    Ok(body)
}

impl GridApi for GridClient {
    fn authorize(&self, request: &AuthRequest<'_>, account_name: Option<&str>) -> Result<Token> {
        let url = self.endpoint.url(Some(paths::AUTHORIZE));
        let subject = account_name.map_or_else(
            || "grid authentication".to_owned(),
            |name| format!("account {name}"),
        );
        let builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request);
        let (status, body) = exchange(&url, builder)?;
        if status != StatusCode::OK {
            error!(status = status.as_u16(), "Failed to get token for {subject}");
            return Err(SgError::AuthRejected {
                account: account_name.unwrap_or("grid").to_owned(),
                status: status.as_u16(),
            });
        }
        let token = wire::decode_token(&url, &body)?;
        info!("Token received for {subject}");
        Ok(token)
    }

    fn list_buckets(&self, token: &Token) -> Result<Vec<BucketSummary>> {
        let url = self.endpoint.url(Some(paths::LIST_BUCKETS));
        let body = exchange_ok(&url, self.get(&url, token))?;
        wire::decode_bucket_list(&url, &body)
    }

    fn get_policy_tag(&self, token: &Token, bucket: &str) -> Result<Option<PolicyTag>> {
        let url = self.endpoint.url(Some(&paths::policy_tag(bucket)));
        let body = exchange_ok(&url, self.get(&url, token))?;
        wire::decode_policy_tag(&url, &body)
    }

    fn put_policy_tag(&self, token: &Token, bucket: &str, tag: &PolicyTag) -> Result<ApiStatus> {
        let url = self.endpoint.url(Some(&paths::policy_tag(bucket)));
        let builder = self
            .client
            .put(&url)
            .header("Authorization", token.bearer())
            .json(&wire::PolicyTagBody {
                ilm_policy_tag_name: tag.as_str(),
            });
        let body = exchange_ok(&url, builder)?;
        wire::decode_status(&url, &body)
    }

    fn get_consistency(&self, token: &Token, bucket: &str) -> Result<Option<ConsistencyLevel>> {
        let url = self.endpoint.url(Some(&paths::consistency(bucket)));
        let body = exchange_ok(&url, self.get(&url, token))?;
        wire::decode_consistency(&url, &body)
    }

    fn set_consistency(
        &self,
        token: &Token,
        bucket: &str,
        level: &ConsistencyLevel,
    ) -> Result<ApiStatus> {
        let url = self.endpoint.url(Some(&paths::consistency(bucket)));
        let builder = self
            .client
            .post(&url)
            .header("Authorization", token.bearer())
            .json(&wire::ConsistencyBody {
                consistency: level.as_str(),
            });
        let body = exchange_ok(&url, builder)?;
        wire::decode_status(&url, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_debug_is_redacted() {
        let token = Token::new("eyJhbGciOi");
        assert!(!format!("{token:?}").contains("eyJhbGciOi"));
        assert_eq!(token.bearer(), "Bearer eyJhbGciOi");
    }

    #[test]
    fn client_builds_with_default_settings() {
        let client = GridClient::new(
            GridEndpoint::new("grid.example.net", "v4").unwrap(),
            &ClientSettings::default(),
        )
        .unwrap();
        assert_eq!(client.endpoint().base_url(), "https://grid.example.net/api/v4");
    }

    #[test]
    fn unreachable_grid_is_a_transport_error() {
        let client = GridClient::new(
            GridEndpoint::new("127.0.0.1:9", "v4").unwrap(),
            &ClientSettings {
                accept_invalid_certs: true,
                timeout: Duration::from_millis(500),
            },
        )
        .unwrap();
        let err = client
            .list_buckets(&Token::new("t"))
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, SgError::Transport { .. }), "{err}");
    }
}
