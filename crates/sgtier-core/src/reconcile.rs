//! Sequential account/bucket traversal.
//!
//! One account at a time, one bucket at a time, one HTTP call at a time.
//! Per bucket the order is fixed: read tag, read consistency, classify and
//! correct, read consistency again, reassert if it moved. A tag write is
//! always read back before the second consistency read.

use serde::{Deserialize, Serialize};
use sgtier_error::{Result, SgError};
use sgtier_grid::{AuthRequest, GridApi, Token};
use sgtier_types::{Account, ConsistencyLevel, Credentials, Exceptions, TagLookup};
use tracing::{debug_span, error, info, info_span, warn};

use crate::engine::{Action, classify};
use crate::inventory::BucketInventory;
use crate::ledger::RunLedger;
use crate::loader::AccountTierIndex;
use crate::mutation::{ConsistencyCheck, compare_consistency, correct_tag, reassert_consistency};

/// What a non-fatal grid failure (auth or read) does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportPolicy {
    /// Log it, treat the result as empty, keep going.
    #[default]
    Continue,
    /// Stop the pass at the first failure.
    Abort,
}

pub struct Reconciler<'a, G: GridApi + ?Sized> {
    api: &'a G,
    index: &'a AccountTierIndex,
    exceptions: &'a Exceptions,
    credentials: &'a Credentials,
    policy: TransportPolicy,
    ledger: RunLedger,
}

impl<'a, G: GridApi + ?Sized> Reconciler<'a, G> {
    pub fn new(
        api: &'a G,
        index: &'a AccountTierIndex,
        exceptions: &'a Exceptions,
        credentials: &'a Credentials,
        policy: TransportPolicy,
    ) -> Self {
        Self {
            api,
            index,
            exceptions,
            credentials,
            policy,
            ledger: RunLedger::new(),
        }
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    pub fn into_ledger(self) -> RunLedger {
        self.ledger
    }

    /// Visit every non-excepted account in mapping order.
    pub fn process_accounts(&mut self) -> Result<()> {
        let index = self.index;
        for account in index.accounts() {
            self.process_account(account)?;
        }
        Ok(())
    }

    pub fn process_account(&mut self, account: &Account) -> Result<()> {
        let span = info_span!("account", account = %account.name);
        let _guard = span.enter();
        info!("Processing account");
        self.ledger.record_account_visit();

        let token = match self.authorize(account) {
            Ok(token) => token,
            Err(err) => {
                error!(error = %err, "Failed to get token for account");
                self.ledger.record_auth_failure(&account.name);
                return self.absorb(err);
            }
        };

        let inventory = BucketInventory::new(self.api, self.exceptions);
        let buckets = match inventory.list_buckets(&account.name, &token) {
            Ok(buckets) => buckets,
            Err(err) => {
                error!(error = %err, "Unable to get the list of buckets");
                self.absorb(err)?;
                Vec::new()
            }
        };
        self.process_buckets(&account.name, &buckets, &token)
    }

    pub fn process_buckets(&mut self, account: &str, buckets: &[String], token: &Token) -> Result<()> {
        if buckets.is_empty() {
            warn!(account, "No buckets to process in the account");
            return Ok(());
        }
        for bucket in buckets {
            self.process_bucket(account, bucket, token)?;
        }
        Ok(())
    }

    pub fn process_bucket(&mut self, account: &str, bucket: &str, token: &Token) -> Result<()> {
        let span = debug_span!("bucket", bucket);
        let _guard = span.enter();
        self.ledger.record_bucket_seen();
        let inventory = BucketInventory::new(self.api, self.exceptions);

        let lookup = match inventory.get_tag(bucket, token) {
            Ok(lookup) => lookup,
            Err(err) => {
                error!(account, bucket, error = %err, "Unable to get the policy tag for the bucket");
                self.absorb(err)?;
                TagLookup::FetchFailed
            }
        };
        let before = self.read_consistency(&inventory, account, bucket, token)?;

        self.apply_tag_policy(account, bucket, &lookup, token);

        let after = self.read_consistency(&inventory, account, bucket, token)?;
        match compare_consistency(before, after) {
            ConsistencyCheck::Unchanged(level) => {
                info!(
                    account,
                    bucket,
                    consistency = %level,
                    "Consistency level is unchanged after the policy tag assignment or verification"
                );
            }
            ConsistencyCheck::Changed { before, after } => {
                reassert_consistency(
                    self.api,
                    token,
                    account,
                    bucket,
                    &before,
                    &after,
                    &mut self.ledger,
                );
            }
            ConsistencyCheck::Unknown => {
                warn!(
                    account,
                    bucket,
                    "Consistency level could not be read; skipping the comparison"
                );
            }
        }
        Ok(())
    }

    /// Classify one bucket and carry out the decision. Returns `None` when the
    /// tag could not be read and the bucket was left alone.
    pub fn apply_tag_policy(
        &mut self,
        account: &str,
        bucket: &str,
        lookup: &TagLookup,
        token: &Token,
    ) -> Option<Action> {
        let Some(current) = lookup.classifiable() else {
            warn!(account, bucket, "Policy tag unreadable; bucket left unclassified");
            self.ledger.record_unreadable_tag();
            return None;
        };

        let action = classify(self.index.membership(account), current);
        match action {
            Action::Correct(tier) => {
                info!(
                    account,
                    bucket,
                    current = current.map_or("<none>", |tag| tag.as_str()),
                    "INCORRECT-POLICYTAG-FOUND: Assigning {tier} policy tag to the bucket"
                );
                correct_tag(self.api, token, account, bucket, &tier.tag(), &mut self.ledger);
            }
            Action::AlertDefault => {
                error!(account, bucket, "ALERT!: bucket is assigned to default policy tag");
                self.ledger.record_default_tag(account, bucket);
            }
            Action::Noop(tier) => {
                info!(account, bucket, "{tier} policy tag found for the bucket");
                self.ledger.record_tracked(tier, bucket);
            }
            Action::Unclassified => {
                info!(
                    account,
                    bucket,
                    current = current.map_or("<none>", |tag| tag.as_str()),
                    "Unknown policy tag found for the bucket"
                );
                self.ledger.record_unclassified();
            }
        }
        Some(action)
    }

    fn authorize(&self, account: &Account) -> Result<Token> {
        let request = AuthRequest::for_account(
            &account.id,
            &self.credentials.username,
            self.credentials.password.expose(),
        );
        self.api.authorize(&request, Some(&account.name))
    }

    fn read_consistency(
        &self,
        inventory: &BucketInventory<'_, G>,
        account: &str,
        bucket: &str,
        token: &Token,
    ) -> Result<Option<ConsistencyLevel>> {
        match inventory.get_consistency(account, bucket, token) {
            Ok(level) => Ok(level),
            Err(err) => {
                error!(
                    account,
                    bucket,
                    error = %err,
                    "Unable to get the consistency level for the bucket"
                );
                self.absorb(err)?;
                Ok(None)
            }
        }
    }

    /// Swallow `err` under the continue policy; fatal errors always escape.
    fn absorb(&self, err: SgError) -> Result<()> {
        if err.is_fatal() || self.policy == TransportPolicy::Abort {
            return Err(err);
        }
        Ok(())
    }
}
