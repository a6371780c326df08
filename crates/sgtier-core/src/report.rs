use std::collections::BTreeMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sgtier_error::{Result, SgError};

use crate::ledger::{OutcomeCounts, RunLedger, TrackedBuckets};

/// JSON schema version for the run report format.
pub const REPORT_SCHEMA_V1: &str = "sgtier.report.v1";

/// Machine-readable summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: String,
    /// Milliseconds since Unix epoch, captured at run start.
    pub started_unix_ms: u64,
    /// Milliseconds since Unix epoch, captured when the pass ended.
    pub finished_unix_ms: u64,
    /// Accounts skipped because they matched the exceptions file.
    pub accounts_excluded: usize,
    pub accounts_auth_failed: Vec<String>,
    pub counts: OutcomeCounts,
    pub tracked: TrackedBuckets,
    pub failed_tag_assignments: Vec<String>,
    pub failed_consistency_assignments: Vec<String>,
    pub default_tag_buckets: BTreeMap<String, Vec<String>>,
    /// Summary emails handed to the transport without error.
    pub notifications_sent: usize,
    /// Set when the pass stopped early.
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn from_ledger(ledger: RunLedger, started_unix_ms: u64, accounts_excluded: usize) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_V1.to_owned(),
            started_unix_ms,
            finished_unix_ms: unix_ms_now(),
            accounts_excluded,
            accounts_auth_failed: ledger.auth_failures,
            counts: ledger.counts,
            tracked: ledger.tracked,
            failed_tag_assignments: ledger.failed_tag_assignments,
            failed_consistency_assignments: ledger.failed_consistency_assignments,
            default_tag_buckets: ledger.default_tag_buckets,
            notifications_sent: 0,
            aborted: None,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| SgError::internal(format!("failed to serialize run report: {err}")))
    }
}

/// Write `report` as pretty JSON, creating parent directories.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut text = report.to_json_pretty()?;
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}

pub fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
