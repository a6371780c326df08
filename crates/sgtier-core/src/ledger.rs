//! Run-scoped accumulators.
//!
//! A ledger is created empty at the start of each pass and drained into
//! notifications and the run report at the end. Nothing persists across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sgtier_types::{PolicyTag, Tier};

/// Buckets whose tag already satisfied their account, per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBuckets {
    pub gold: Vec<String>,
    pub silver: Vec<String>,
    pub bronze: Vec<String>,
}

impl TrackedBuckets {
    pub fn list(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::Gold => &self.gold,
            Tier::Silver => &self.silver,
            Tier::Bronze => &self.bronze,
        }
    }

    fn list_mut(&mut self, tier: Tier) -> &mut Vec<String> {
        match tier {
            Tier::Gold => &mut self.gold,
            Tier::Silver => &mut self.silver,
            Tier::Bronze => &mut self.bronze,
        }
    }
}

/// Per-outcome counters for the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub accounts_visited: u64,
    pub buckets_seen: u64,
    pub already_correct: u64,
    pub corrected: u64,
    pub correction_failed: u64,
    pub anomalous_default: u64,
    pub unclassified: u64,
    pub tag_unreadable: u64,
    pub consistency_reasserted: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLedger {
    /// `"{account}-{bucket}-{tag}"` per failed tag write, in processing order.
    pub failed_tag_assignments: Vec<String>,
    /// `"{bucket}-{account}"` per bucket whose consistency moved.
    pub failed_consistency_assignments: Vec<String>,
    /// Account name -> untagged buckets found on untiered accounts.
    pub default_tag_buckets: BTreeMap<String, Vec<String>>,
    pub tracked: TrackedBuckets,
    /// Accounts whose authorization failed, in processing order.
    pub auth_failures: Vec<String>,
    pub counts: OutcomeCounts,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tag_failure(&mut self, account: &str, bucket: &str, tag: &PolicyTag) {
        self.failed_tag_assignments
            .push(format!("{account}-{bucket}-{tag}"));
        self.counts.correction_failed += 1;
    }

    pub fn record_correction(&mut self) {
        self.counts.corrected += 1;
    }

    pub fn record_consistency_failure(&mut self, bucket: &str, account: &str) {
        self.failed_consistency_assignments
            .push(format!("{bucket}-{account}"));
        self.counts.consistency_reasserted += 1;
    }

    pub fn record_default_tag(&mut self, account: &str, bucket: &str) {
        self.default_tag_buckets
            .entry(account.to_owned())
            .or_default()
            .push(bucket.to_owned());
        self.counts.anomalous_default += 1;
    }

    pub fn record_tracked(&mut self, tier: Tier, bucket: &str) {
        self.tracked.list_mut(tier).push(bucket.to_owned());
        self.counts.already_correct += 1;
    }

    pub fn record_unclassified(&mut self) {
        self.counts.unclassified += 1;
    }

    pub fn record_unreadable_tag(&mut self) {
        self.counts.tag_unreadable += 1;
    }

    pub fn record_auth_failure(&mut self, account: &str) {
        self.auth_failures.push(account.to_owned());
    }

    pub fn record_account_visit(&mut self) {
        self.counts.accounts_visited += 1;
    }

    pub fn record_bucket_seen(&mut self) {
        self.counts.buckets_seen += 1;
    }

    /// True when nothing needs to be reported by email.
    pub fn has_nothing_to_report(&self) -> bool {
        self.failed_tag_assignments.is_empty()
            && self.failed_consistency_assignments.is_empty()
            && self.default_tag_buckets.is_empty()
    }

    /// Whether `needle` appears anywhere in the three reported accumulators.
    pub fn mentions(&self, needle: &str) -> bool {
        self.failed_tag_assignments
            .iter()
            .chain(&self.failed_consistency_assignments)
            .any(|entry| entry.contains(needle))
            || self
                .default_tag_buckets
                .iter()
                .any(|(account, buckets)| account == needle || buckets.iter().any(|b| b == needle))
    }
}
