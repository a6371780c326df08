//! Shared fixtures for the reconciliation integration tests: an in-memory
//! grid, a recording notifier, and on-disk configuration trees.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use sgtier_core::notify::Notifier;
use sgtier_core::{RunConfig, load_run_config};
use sgtier_error::{Result, SgError};
use sgtier_grid::{ApiStatus, AuthRequest, BucketSummary, GridApi, Token};
use sgtier_types::{ConsistencyLevel, Credentials, PolicyTag, Secret};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authorize { account_id: Option<String> },
    ListBuckets { account_id: String },
    GetTag { bucket: String },
    PutTag { bucket: String, tag: String },
    GetConsistency { bucket: String },
    SetConsistency { bucket: String, level: String },
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::PutTag { .. } | Self::SetConsistency { .. })
    }

    pub fn bucket(&self) -> Option<&str> {
        match self {
            Self::GetTag { bucket }
            | Self::PutTag { bucket, .. }
            | Self::GetConsistency { bucket }
            | Self::SetConsistency { bucket, .. } => Some(bucket),
            Self::Authorize { .. } | Self::ListBuckets { .. } => None,
        }
    }
}

#[derive(Default)]
struct GridState {
    buckets: BTreeMap<String, Vec<String>>,
    tags: BTreeMap<String, PolicyTag>,
    consistency: BTreeMap<String, ConsistencyLevel>,
    rejected_accounts: BTreeSet<String>,
    failing_listings: BTreeSet<String>,
    failing_tag_reads: BTreeSet<String>,
    failing_consistency_reads: BTreeSet<String>,
    write_status: Option<String>,
    drift_on_tag_write: BTreeMap<String, ConsistencyLevel>,
    drop_tag_writes: bool,
    reject_consistency_writes: bool,
    calls: Vec<Call>,
}

/// Grid fake. Bucket names are unique across accounts; tokens are
/// `tok-{account_id}`.
#[derive(Default)]
pub struct FakeGrid {
    state: RefCell<GridState>,
}

impl FakeGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, account_id: &str, buckets: &[&str]) -> Self {
        self.state.borrow_mut().buckets.insert(
            account_id.to_owned(),
            buckets.iter().map(|b| (*b).to_owned()).collect(),
        );
        self
    }

    pub fn with_tag(self, bucket: &str, tag: &str) -> Self {
        self.state
            .borrow_mut()
            .tags
            .insert(bucket.to_owned(), PolicyTag::from_name(tag));
        self
    }

    pub fn with_consistency(self, bucket: &str, level: &str) -> Self {
        self.state
            .borrow_mut()
            .consistency
            .insert(bucket.to_owned(), ConsistencyLevel::new(level));
        self
    }

    pub fn rejecting_auth(self, account_id: &str) -> Self {
        self.state
            .borrow_mut()
            .rejected_accounts
            .insert(account_id.to_owned());
        self
    }

    pub fn failing_listing(self, account_id: &str) -> Self {
        self.state
            .borrow_mut()
            .failing_listings
            .insert(account_id.to_owned());
        self
    }

    pub fn failing_tag_read(self, bucket: &str) -> Self {
        self.state
            .borrow_mut()
            .failing_tag_reads
            .insert(bucket.to_owned());
        self
    }

    pub fn failing_consistency_read(self, bucket: &str) -> Self {
        self.state
            .borrow_mut()
            .failing_consistency_reads
            .insert(bucket.to_owned());
        self
    }

    /// Every write answers with `status` and a non-success status leaves
    /// the bucket untouched.
    pub fn answering_writes_with(self, status: &str) -> Self {
        self.state.borrow_mut().write_status = Some(status.to_owned());
        self
    }

    /// A successful tag write on `bucket` also moves its consistency.
    pub fn drifting_consistency_on_tag_write(self, bucket: &str, level: &str) -> Self {
        self.state
            .borrow_mut()
            .drift_on_tag_write
            .insert(bucket.to_owned(), ConsistencyLevel::new(level));
        self
    }

    /// Tag writes report success but change nothing.
    pub fn dropping_tag_writes(self) -> Self {
        self.state.borrow_mut().drop_tag_writes = true;
        self
    }

    /// Consistency writes answer `failure` and change nothing.
    pub fn rejecting_consistency_writes(self) -> Self {
        self.state.borrow_mut().reject_consistency_writes = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn tag(&self, bucket: &str) -> Option<PolicyTag> {
        self.state.borrow().tags.get(bucket).cloned()
    }

    pub fn consistency(&self, bucket: &str) -> Option<ConsistencyLevel> {
        self.state.borrow().consistency.get(bucket).cloned()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    fn account_of(token: &Token) -> Result<String> {
        token
            .expose()
            .strip_prefix("tok-")
            .map(str::to_owned)
            .ok_or_else(|| SgError::HttpStatus {
                endpoint: "fake".to_owned(),
                status: 401,
            })
    }

    fn write_status(&self) -> ApiStatus {
        self.state
            .borrow()
            .write_status
            .clone()
            .map_or_else(ApiStatus::success, ApiStatus)
    }
}

fn refused(path: &str) -> SgError {
    SgError::transport(format!("https://fake.grid/api/v4{path}"), "connection refused")
}

impl GridApi for FakeGrid {
    fn authorize(&self, request: &AuthRequest<'_>, account_name: Option<&str>) -> Result<Token> {
        self.record(Call::Authorize {
            account_id: request.account_id.map(str::to_owned),
        });
        let Some(account_id) = request.account_id else {
            return Ok(Token::new("tok-grid"));
        };
        if self.state.borrow().rejected_accounts.contains(account_id) {
            return Err(SgError::AuthRejected {
                account: account_name.unwrap_or(account_id).to_owned(),
                status: 401,
            });
        }
        Ok(Token::new(format!("tok-{account_id}")))
    }

    fn list_buckets(&self, token: &Token) -> Result<Vec<BucketSummary>> {
        let account_id = Self::account_of(token)?;
        self.record(Call::ListBuckets {
            account_id: account_id.clone(),
        });
        let state = self.state.borrow();
        if state.failing_listings.contains(&account_id) {
            return Err(refused("/org/containers"));
        }
        Ok(state
            .buckets
            .get(&account_id)
            .map(|names| {
                names
                    .iter()
                    .map(|name| BucketSummary { name: name.clone() })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_policy_tag(&self, _token: &Token, bucket: &str) -> Result<Option<PolicyTag>> {
        self.record(Call::GetTag {
            bucket: bucket.to_owned(),
        });
        let state = self.state.borrow();
        if state.failing_tag_reads.contains(bucket) {
            return Err(refused("/org/containers/{bucket}/ilm-policy-tag"));
        }
        Ok(state.tags.get(bucket).cloned())
    }

    fn put_policy_tag(&self, _token: &Token, bucket: &str, tag: &PolicyTag) -> Result<ApiStatus> {
        self.record(Call::PutTag {
            bucket: bucket.to_owned(),
            tag: tag.as_str().to_owned(),
        });
        let status = self.write_status();
        if status.is_success() {
            let mut state = self.state.borrow_mut();
            if !state.drop_tag_writes {
                state.tags.insert(bucket.to_owned(), tag.clone());
            }
            if let Some(level) = state.drift_on_tag_write.remove(bucket) {
                state.consistency.insert(bucket.to_owned(), level);
            }
        }
        Ok(status)
    }

    fn get_consistency(&self, _token: &Token, bucket: &str) -> Result<Option<ConsistencyLevel>> {
        self.record(Call::GetConsistency {
            bucket: bucket.to_owned(),
        });
        let state = self.state.borrow();
        if state.failing_consistency_reads.contains(bucket) {
            return Err(refused("/org/containers/{bucket}/consistency"));
        }
        Ok(state.consistency.get(bucket).cloned())
    }

    fn set_consistency(
        &self,
        _token: &Token,
        bucket: &str,
        level: &ConsistencyLevel,
    ) -> Result<ApiStatus> {
        self.record(Call::SetConsistency {
            bucket: bucket.to_owned(),
            level: level.as_str().to_owned(),
        });
        if self.state.borrow().reject_consistency_writes {
            return Ok(ApiStatus("failure".to_owned()));
        }
        let status = self.write_status();
        if status.is_success() {
            self.state
                .borrow_mut()
                .consistency
                .insert(bucket.to_owned(), level.clone());
        }
        Ok(status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: RefCell<Vec<SentMail>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.borrow().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent.borrow().iter().map(|m| m.subject.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        self.sent.borrow_mut().push(SentMail {
            subject: subject.to_owned(),
            body: body.to_owned(),
            recipient: recipient.to_owned(),
        });
        Ok(())
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "svc-tiering".to_owned(),
        password: Secret::new("test-only-password"),
    }
}

pub const RECIPIENT: &str = "storage-team@example.com";

/// A configuration tree written into a temp dir.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// `accounts` maps id -> name in visiting order.
    pub fn new(accounts: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let fixture = Self { dir };

        let mut mapping = serde_json::Map::new();
        for (id, name) in accounts {
            mapping.insert((*id).to_owned(), json!(name));
        }
        fixture.write("accounts.json", &Value::Object(mapping));
        for file in ["gold.json", "silver.json", "bronze.json", "notier.json"] {
            fixture.write(&format!("tiers/{file}"), &json!([]));
        }
        fixture.write("exceptions.json", &json!({}));
        fixture.write_config(&json!({}));
        fixture
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, value: &Value) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dir");
        }
        std::fs::write(&path, serde_json::to_string_pretty(value).expect("json"))
            .expect("write fixture");
    }

    pub fn with_tier(self, file: &str, names: &[&str]) -> Self {
        self.write(&format!("tiers/{file}.json"), &json!(names));
        self
    }

    pub fn with_exceptions(self, exceptions: &Value) -> Self {
        self.write("exceptions.json", exceptions);
        self
    }

    /// Rewrite `run.json`; top-level keys in `overrides` replace the defaults.
    pub fn write_config(&self, overrides: &Value) {
        let mut config = json!({
            "grid": {"hostname": "grid.example.com"},
            "account_mapping": "accounts.json",
            "tiers": {
                "gold_tier": "tiers/gold.json",
                "silver_tier": "tiers/silver.json",
                "bronze_tier": "tiers/bronze.json",
                "notier": "tiers/notier.json"
            },
            "exceptions": "exceptions.json",
            "email": {"recipient": RECIPIENT}
        });
        if let (Some(base), Some(extra)) = (config.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        self.write("run.json", &config);
    }

    pub fn config_path(&self) -> PathBuf {
        self.path("run.json")
    }

    pub fn config(&self) -> RunConfig {
        load_run_config(&self.config_path()).expect("run config")
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
