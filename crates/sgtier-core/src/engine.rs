//! Tier reconciliation decision table.
//!
//! Rows are evaluated top to bottom and the first match wins:
//!
//! | membership | current tag | action |
//! |---|---|---|
//! | Gold   | not Gold (incl. none)   | `Correct(Gold)` |
//! | Silver | not Silver              | `Correct(Silver)` |
//! | Bronze | not Bronze              | `Correct(Bronze)` |
//! | NoTier | none                    | `AlertDefault` |
//! | Gold   | Gold                    | `Noop(Gold)` |
//! | Silver | Silver                  | `Noop(Silver)` |
//! | Bronze | Bronze                  | `Noop(Bronze)` |
//! | NoTier | Gold / Silver / Bronze  | `Noop(that tier)` |
//! | anything else                   || `Unclassified` |
//!
//! Membership is a set of flags rather than a single tier because tier files
//! are maintained independently; an account listed twice is resolved by row
//! order.

use std::fmt;

use serde::{Deserialize, Serialize};
use sgtier_types::{PolicyTag, Tier, TierMembership};

/// What to do with one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "tier")]
pub enum Action {
    /// The tag disagrees with the account's tier; write the tier's tag.
    Correct(Tier),
    /// Untiered account with an untagged bucket. Report only, never write.
    AlertDefault,
    /// Tag is acceptable; record the bucket under this tier's tracked list.
    Noop(Tier),
    /// Combination not covered by the table. Log only.
    Unclassified,
}

impl Action {
    /// Whether this action issues a write.
    pub const fn writes(self) -> bool {
        matches!(self, Self::Correct(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correct(tier) => write!(f, "correct->{tier}"),
            Self::AlertDefault => f.write_str("alert_default"),
            Self::Noop(tier) => write!(f, "noop({tier})"),
            Self::Unclassified => f.write_str("unclassified"),
        }
    }
}

/// Classify a bucket. Pure: depends only on the two arguments.
pub fn classify(membership: TierMembership, current: Option<&PolicyTag>) -> Action {
    let current_tier = current.and_then(PolicyTag::tier);

    for tier in Tier::ALL {
        if membership.contains(tier) && current_tier != Some(tier) {
            return Action::Correct(tier);
        }
    }

    if membership.notier && current.is_none() {
        return Action::AlertDefault;
    }

    for tier in Tier::ALL {
        if membership.contains(tier) && current_tier == Some(tier) {
            return Action::Noop(tier);
        }
    }

    if membership.notier {
        if let Some(tier) = current_tier {
            return Action::Noop(tier);
        }
    }

    Action::Unclassified
}
