//! JSON request bodies and response envelopes.
//!
//! Every response is `{"data": ..., "status": ...}`. Decoders are pure
//! functions over the body text so they can be tested without a grid.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sgtier_error::{Result, SgError};
use sgtier_types::{ConsistencyLevel, PolicyTag};

use crate::Token;

/// Body of `POST /authorize`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest<'a> {
    /// Tenant account id; omitted for grid-level authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<&'a str>,
    pub username: &'a str,
    pub password: &'a str,
    pub cookie: bool,
    pub csrf_token: bool,
}

impl<'a> AuthRequest<'a> {
    pub fn for_account(account_id: &'a str, username: &'a str, password: &'a str) -> Self {
        Self {
            account_id: Some(account_id),
            username,
            password,
            cookie: true,
            csrf_token: false,
        }
    }

    pub fn for_grid(username: &'a str, password: &'a str) -> Self {
        Self {
            account_id: None,
            username,
            password,
            cookie: true,
            csrf_token: false,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PolicyTagBody<'a> {
    pub ilm_policy_tag_name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConsistencyBody<'a> {
    pub consistency: &'a str,
}

/// One entry of the bucket listing. Fields beyond `name` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BucketSummary {
    pub name: String,
}

/// The `status` field of a write response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiStatus(pub String);

impl ApiStatus {
    pub fn success() -> Self {
        Self("success".to_owned())
    }

    /// Compared case-insensitively against `success`.
    pub fn is_success(&self) -> bool {
        self.0.eq_ignore_ascii_case("success")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagData {
    #[serde(default)]
    ilm_policy_tag_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConsistencyData {
    #[serde(default)]
    consistency: Option<String>,
}

fn parse<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<Envelope<T>> {
    serde_json::from_str(body).map_err(|e| SgError::decode(endpoint, e.to_string()))
}

pub fn decode_token(endpoint: &str, body: &str) -> Result<Token> {
    let envelope: Envelope<String> = parse(endpoint, body)?;
    match envelope.data {
        Some(token) if !token.is_empty() => Ok(Token::new(token)),
        _ => Err(SgError::decode(endpoint, "authorize response carries no token")),
    }
}

/// A missing or null `data` is an empty listing, not an error.
pub fn decode_bucket_list(endpoint: &str, body: &str) -> Result<Vec<BucketSummary>> {
    let envelope: Envelope<Vec<BucketSummary>> = parse(endpoint, body)?;
    Ok(envelope.data.unwrap_or_default())
}

/// Absent data, absent tag field, null and empty string all mean "no tag".
pub fn decode_policy_tag(endpoint: &str, body: &str) -> Result<Option<PolicyTag>> {
    let envelope: Envelope<TagData> = parse(endpoint, body)?;
    Ok(envelope
        .data
        .and_then(|data| data.ilm_policy_tag_name)
        .filter(|name| !name.is_empty())
        .map(PolicyTag::from))
}

pub fn decode_consistency(endpoint: &str, body: &str) -> Result<Option<ConsistencyLevel>> {
    let envelope: Envelope<ConsistencyData> = parse(endpoint, body)?;
    Ok(envelope
        .data
        .and_then(|data| data.consistency)
        .filter(|level| !level.is_empty())
        .map(ConsistencyLevel))
}

pub fn decode_status(endpoint: &str, body: &str) -> Result<ApiStatus> {
    let envelope: Envelope<serde_json::Value> = parse(endpoint, body)?;
    envelope
        .status
        .map(ApiStatus)
        .ok_or_else(|| SgError::decode(endpoint, "write response carries no status"))
}
