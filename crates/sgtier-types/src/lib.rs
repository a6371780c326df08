//! Domain types shared by the grid client and the reconciliation core.
//!
//! Nothing in this crate performs I/O. Tag and tier names are compared
//! case-sensitively, exactly as the grid stores them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tiers and policy tags
// ---------------------------------------------------------------------------

/// A service tier that maps one-to-one onto an ILM policy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Gold,
    Silver,
    Bronze,
}

impl Tier {
    /// All tiers in decision-table precedence order.
    pub const ALL: [Self; 3] = [Self::Gold, Self::Silver, Self::Bronze];

    /// The ILM policy tag name for this tier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gold => "Gold",
            Self::Silver => "Silver",
            Self::Bronze => "Bronze",
        }
    }

    /// The policy tag a bucket must carry to satisfy this tier.
    pub fn tag(self) -> PolicyTag {
        match self {
            Self::Gold => PolicyTag::Gold,
            Self::Silver => PolicyTag::Silver,
            Self::Bronze => PolicyTag::Bronze,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ILM policy tag currently assigned to a bucket.
///
/// Tags the grid knows about but that no tier maps onto are preserved
/// verbatim in `Other` so that they are never silently treated as a tier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PolicyTag {
    Gold,
    Silver,
    Bronze,
    Other(String),
}

impl PolicyTag {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Gold" => Self::Gold,
            "Silver" => Self::Silver,
            "Bronze" => Self::Bronze,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Gold => "Gold",
            Self::Silver => "Silver",
            Self::Bronze => "Bronze",
            Self::Other(name) => name,
        }
    }

    /// The tier this tag belongs to, if any.
    pub const fn tier(&self) -> Option<Tier> {
        match self {
            Self::Gold => Some(Tier::Gold),
            Self::Silver => Some(Tier::Silver),
            Self::Bronze => Some(Tier::Bronze),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for PolicyTag {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Gold" => Self::Gold,
            "Silver" => Self::Silver,
            "Bronze" => Self::Bronze,
            _ => Self::Other(value),
        }
    }
}

impl From<PolicyTag> for String {
    fn from(value: PolicyTag) -> Self {
        match value {
            PolicyTag::Other(name) => name,
            tier_tag => tier_tag.as_str().to_owned(),
        }
    }
}

impl From<Tier> for PolicyTag {
    fn from(value: Tier) -> Self {
        value.tag()
    }
}

impl fmt::Display for PolicyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of reading a bucket's policy tag.
///
/// `NoTagAssigned` is a valid domain value (the bucket runs under the grid's
/// default ILM policy). `FetchFailed` means the grid could not tell us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagLookup {
    Assigned(PolicyTag),
    NoTagAssigned,
    FetchFailed,
}

impl TagLookup {
    /// The tag as seen by the decision table, or `None` when the lookup
    /// failed and the bucket cannot be classified.
    pub const fn classifiable(&self) -> Option<Option<&PolicyTag>> {
        match self {
            Self::Assigned(tag) => Some(Some(tag)),
            Self::NoTagAssigned => Some(None),
            Self::FetchFailed => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tier membership
// ---------------------------------------------------------------------------

/// Which tier lists an account name appears in.
///
/// Tier files are independent, so an account may appear in several. The
/// decision table resolves overlaps by precedence rather than rejecting them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierMembership {
    pub gold: bool,
    pub silver: bool,
    pub bronze: bool,
    pub notier: bool,
}

impl TierMembership {
    pub const NOTIER: Self = Self {
        gold: false,
        silver: false,
        bronze: false,
        notier: true,
    };

    pub const fn only(tier: Tier) -> Self {
        Self {
            gold: matches!(tier, Tier::Gold),
            silver: matches!(tier, Tier::Silver),
            bronze: matches!(tier, Tier::Bronze),
            notier: false,
        }
    }

    pub const fn contains(self, tier: Tier) -> bool {
        match tier {
            Tier::Gold => self.gold,
            Tier::Silver => self.silver,
            Tier::Bronze => self.bronze,
        }
    }

    /// Number of lists this account appears in.
    pub fn listed_count(self) -> usize {
        [self.gold, self.silver, self.bronze, self.notier]
            .into_iter()
            .filter(|listed| *listed)
            .count()
    }

    /// True when the account is in none of the four lists.
    pub fn is_untracked(self) -> bool {
        self.listed_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Accounts, buckets and exceptions
// ---------------------------------------------------------------------------

/// A tenant account as named in the account mapping file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    /// Opaque grid account identifier used for authorization.
    pub id: String,
    /// Display name; tier lists and reports use this.
    pub name: String,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Consistency level of a bucket, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsistencyLevel(pub String);

impl ConsistencyLevel {
    pub fn new(level: impl Into<String>) -> Self {
        Self(level.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accounts and buckets removed from all processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Exceptions {
    #[serde(default)]
    pub accounts: BTreeSet<String>,
    #[serde(default)]
    pub buckets: BTreeSet<String>,
}

impl Exceptions {
    /// An account is excluded when either its id or its name is listed.
    pub fn excludes_account(&self, account: &Account) -> bool {
        self.accounts.contains(&account.id) || self.accounts.contains(&account.name)
    }

    pub fn excludes_bucket(&self, bucket: &str) -> bool {
        self.buckets.contains(bucket)
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// A credential value that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(**redacted**)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("**redacted**")
    }
}

/// Tenant console credentials used for every account's authorization.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}
