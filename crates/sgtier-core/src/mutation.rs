//! Corrective writes and their bookkeeping.
//!
//! Neither function returns an error: a failed write is a ledger entry, and
//! one bucket's failure never stops the pass.

use sgtier_grid::{GridApi, Token};
use sgtier_types::{ConsistencyLevel, PolicyTag};
use tracing::{error, info, warn};

use crate::ledger::RunLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    Failed,
}

/// Write `tag` to the bucket, then read it back.
///
/// Records `"{account}-{bucket}-{tag}"` when the call fails, when the status
/// is not `success`, or when the read-back shows a different tag. A read-back
/// that itself fails leaves the write status as the verdict.
pub fn correct_tag<G: GridApi + ?Sized>(
    api: &G,
    token: &Token,
    account: &str,
    bucket: &str,
    tag: &PolicyTag,
    ledger: &mut RunLedger,
) -> WriteOutcome {
    let status = match api.put_policy_tag(token, bucket, tag) {
        Ok(status) => status,
        Err(err) => {
            error!(
                account,
                bucket,
                %tag,
                error = %err,
                "Unable to assign the policy tag to the bucket"
            );
            ledger.record_tag_failure(account, bucket, tag);
            return WriteOutcome::Failed;
        }
    };

    if !status.is_success() {
        error!(
            account,
            bucket,
            %tag,
            status = status.as_str(),
            "Failed to assign the policytag to the bucket"
        );
        ledger.record_tag_failure(account, bucket, tag);
        return WriteOutcome::Failed;
    }
    info!(account, bucket, %tag, "Policy tag assigned to the bucket");

    match api.get_policy_tag(token, bucket) {
        Ok(Some(current)) if current == *tag => {}
        Ok(current) => {
            error!(
                account,
                bucket,
                %tag,
                read_back = current.as_ref().map_or("<none>", PolicyTag::as_str),
                "Policy tag write reported success but read-back disagrees"
            );
            ledger.record_tag_failure(account, bucket, tag);
            return WriteOutcome::Failed;
        }
        Err(err) => {
            warn!(
                account,
                bucket,
                %tag,
                error = %err,
                "Policy tag read-back failed; trusting write status"
            );
        }
    }

    ledger.record_correction();
    WriteOutcome::Applied
}

/// Result of comparing consistency before and after tag handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyCheck {
    Unchanged(ConsistencyLevel),
    Changed {
        before: ConsistencyLevel,
        after: ConsistencyLevel,
    },
    /// One of the reads produced nothing; no comparison possible.
    Unknown,
}

pub fn compare_consistency(
    before: Option<ConsistencyLevel>,
    after: Option<ConsistencyLevel>,
) -> ConsistencyCheck {
    match (before, after) {
        (Some(before), Some(after)) if before == after => ConsistencyCheck::Unchanged(before),
        (Some(before), Some(after)) => ConsistencyCheck::Changed { before, after },
        _ => ConsistencyCheck::Unknown,
    }
}

/// Restore `before` after a tag write moved the bucket's consistency.
///
/// The bucket is recorded whatever the reassertion call returns: the entry
/// flags an unwanted side effect, not a verified fix.
pub fn reassert_consistency<G: GridApi + ?Sized>(
    api: &G,
    token: &Token,
    account: &str,
    bucket: &str,
    before: &ConsistencyLevel,
    after: &ConsistencyLevel,
    ledger: &mut RunLedger,
) {
    warn!(
        account,
        bucket,
        before = %before,
        after = %after,
        "Consistency level changed after the policy tag assignment; reasserting"
    );
    match api.set_consistency(token, bucket, before) {
        Ok(status) if status.is_success() => {
            info!(account, bucket, consistency = %before, "Consistency level reasserted");
        }
        Ok(status) => {
            error!(
                account,
                bucket,
                consistency = %before,
                status = status.as_str(),
                "Consistency reassertion was not accepted"
            );
        }
        Err(err) => {
            error!(
                account,
                bucket,
                consistency = %before,
                error = %err,
                "Unable to reassert the consistency level"
            );
        }
    }
    ledger.record_consistency_failure(bucket, account);
}
