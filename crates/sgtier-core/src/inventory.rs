//! Per-account bucket listing and per-bucket attribute reads.
//!
//! Methods return typed results; whether a failure becomes an empty value
//! or stops the run is the traversal's call.

use sgtier_error::Result;
use sgtier_grid::{GridApi, Token};
use sgtier_types::{ConsistencyLevel, Exceptions, PolicyTag, TagLookup};
use tracing::{debug, warn};

pub struct BucketInventory<'a, G: GridApi + ?Sized> {
    api: &'a G,
    exceptions: &'a Exceptions,
}

impl<'a, G: GridApi + ?Sized> BucketInventory<'a, G> {
    pub fn new(api: &'a G, exceptions: &'a Exceptions) -> Self {
        Self { api, exceptions }
    }

    /// Bucket names for the token's account, exception-listed names removed.
    pub fn list_buckets(&self, account: &str, token: &Token) -> Result<Vec<String>> {
        let listing = self.api.list_buckets(token)?;
        if listing.is_empty() {
            warn!(account, "No buckets found in the account");
            return Ok(Vec::new());
        }
        let mut names = Vec::with_capacity(listing.len());
        for bucket in listing {
            if self.exceptions.excludes_bucket(&bucket.name) {
                warn!(
                    account,
                    bucket = %bucket.name,
                    "Skipping the bucket as it is in the exceptions list"
                );
                continue;
            }
            names.push(bucket.name);
        }
        debug!(account, count = names.len(), "buckets listed");
        Ok(names)
    }

    /// Current tag; an unassigned tag is `NoTagAssigned`, not an error.
    pub fn get_tag(&self, bucket: &str, token: &Token) -> Result<TagLookup> {
        let tag: Option<PolicyTag> = self.api.get_policy_tag(token, bucket)?;
        Ok(tag.map_or_else(
            || {
                debug!(bucket, "No policy tag found for the bucket");
                TagLookup::NoTagAssigned
            },
            TagLookup::Assigned,
        ))
    }

    /// Current consistency level, `None` when the grid reports none.
    pub fn get_consistency(
        &self,
        account: &str,
        bucket: &str,
        token: &Token,
    ) -> Result<Option<ConsistencyLevel>> {
        let level = self.api.get_consistency(token, bucket)?;
        if level.is_none() {
            warn!(account, bucket, "No consistency level found for the bucket");
        }
        Ok(level)
    }
}
