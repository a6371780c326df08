//! Account mapping, tier lists and exception set loading.
//!
//! All three are JSON files maintained by hand next to the run
//! configuration. Any problem here is fatal: a run with partial tier data
//! would write the wrong tags.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sgtier_error::{Result, SgError};
use sgtier_types::{Account, Exceptions, Tier, TierMembership};
use tracing::{debug, info, warn};

/// Paths of the four tier membership lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierFilePaths {
    pub gold_tier: PathBuf,
    pub silver_tier: PathBuf,
    pub bronze_tier: PathBuf,
    pub notier: PathBuf,
}

impl TierFilePaths {
    /// Resolve relative paths against `base`.
    pub fn resolved_against(&self, base: &Path) -> Self {
        Self {
            gold_tier: base.join(&self.gold_tier),
            silver_tier: base.join(&self.silver_tier),
            bronze_tier: base.join(&self.bronze_tier),
            notier: base.join(&self.notier),
        }
    }
}

/// Accounts to visit plus the static tier membership lists.
#[derive(Debug, Clone, Default)]
pub struct AccountTierIndex {
    /// Accounts in mapping-file order, exceptions already removed.
    accounts: Vec<Account>,
    gold: BTreeSet<String>,
    silver: BTreeSet<String>,
    bronze: BTreeSet<String>,
    notier: BTreeSet<String>,
    excluded: usize,
}

impl AccountTierIndex {
    /// Build an index from in-memory parts, applying `exceptions` to the
    /// account list. Tier lists are kept as given.
    pub fn from_parts(
        accounts: Vec<Account>,
        tiers: TierLists,
        exceptions: &Exceptions,
    ) -> Self {
        let before = accounts.len();
        let accounts: Vec<Account> = accounts
            .into_iter()
            .filter(|account| {
                let excluded = exceptions.excludes_account(account);
                if excluded {
                    debug!(account = %account.name, id = %account.id, "account excluded by exception list");
                }
                !excluded
            })
            .collect();
        let excluded = before - accounts.len();

        let index = Self {
            accounts,
            gold: tiers.gold.into_iter().collect(),
            silver: tiers.silver.into_iter().collect(),
            bronze: tiers.bronze.into_iter().collect(),
            notier: tiers.notier.into_iter().collect(),
            excluded,
        };
        index.warn_on_overlaps();
        index
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Number of mapping entries dropped by the exception list.
    pub fn excluded_count(&self) -> usize {
        self.excluded
    }

    pub fn membership(&self, account_name: &str) -> TierMembership {
        TierMembership {
            gold: self.gold.contains(account_name),
            silver: self.silver.contains(account_name),
            bronze: self.bronze.contains(account_name),
            notier: self.notier.contains(account_name),
        }
    }

    pub fn tier_members(&self, tier: Tier) -> &BTreeSet<String> {
        match tier {
            Tier::Gold => &self.gold,
            Tier::Silver => &self.silver,
            Tier::Bronze => &self.bronze,
        }
    }

    pub fn notier_members(&self) -> &BTreeSet<String> {
        &self.notier
    }

    fn warn_on_overlaps(&self) {
        let all = self
            .gold
            .iter()
            .chain(&self.silver)
            .chain(&self.bronze)
            .chain(&self.notier)
            .collect::<BTreeSet<_>>();
        for name in all {
            let membership = self.membership(name);
            if membership.listed_count() > 1 {
                warn!(
                    account = %name,
                    ?membership,
                    "account listed in more than one tier file; decision table precedence applies"
                );
            }
        }
    }
}

/// The raw contents of the four tier files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierLists {
    pub gold: Vec<String>,
    pub silver: Vec<String>,
    pub bronze: Vec<String>,
    pub notier: Vec<String>,
}

/// Load the account mapping and tier lists and drop excepted accounts.
pub fn load(
    account_mapping_path: &Path,
    tier_paths: &TierFilePaths,
    exceptions: &Exceptions,
) -> Result<AccountTierIndex> {
    let accounts = load_account_mapping(account_mapping_path)?;
    let tiers = load_tier_lists(tier_paths)?;
    let index = AccountTierIndex::from_parts(accounts, tiers, exceptions);
    info!(
        accounts = index.accounts().len(),
        excluded = index.excluded_count(),
        "Cleaned up the exceptions from the account mapping"
    );
    Ok(index)
}

/// Parse the id -> name mapping, preserving file order.
pub fn load_account_mapping(path: &Path) -> Result<Vec<Account>> {
    let text = read_config_file(path)?;
    let map: Map<String, Value> = serde_json::from_str(&text)
        .map_err(|e| SgError::malformed(path, format!("expected a JSON object of id -> name: {e}")))?;
    if map.is_empty() {
        return Err(SgError::ConfigEmpty {
            path: path.to_path_buf(),
        });
    }
    map.into_iter()
        .map(|(id, name)| match name {
            Value::String(name) if !name.is_empty() => Ok(Account::new(id, name)),
            other => Err(SgError::malformed(
                path,
                format!("account '{id}' must map to a non-empty name, got {other}"),
            )),
        })
        .collect()
}

pub fn load_tier_lists(paths: &TierFilePaths) -> Result<TierLists> {
    Ok(TierLists {
        gold: load_name_list(&paths.gold_tier)?,
        silver: load_name_list(&paths.silver_tier)?,
        bronze: load_name_list(&paths.bronze_tier)?,
        notier: load_name_list(&paths.notier)?,
    })
}

/// A tier file is a JSON array of account names.
pub fn load_name_list(path: &Path) -> Result<Vec<String>> {
    let text = read_config_file(path)?;
    let names: Vec<String> = serde_json::from_str(&text)
        .map_err(|e| SgError::malformed(path, format!("expected a JSON array of names: {e}")))?;
    debug!(path = %path.display(), count = names.len(), "tier list loaded");
    Ok(names)
}

/// `{"accounts": [...], "buckets": [...]}`; both keys optional.
pub fn load_exceptions(path: &Path) -> Result<Exceptions> {
    let text = read_config_file(path)?;
    let exceptions: Exceptions =
        serde_json::from_str(&text).map_err(|e| SgError::malformed(path, e.to_string()))?;
    debug!(
        accounts = exceptions.accounts.len(),
        buckets = exceptions.buckets.len(),
        "exception list loaded"
    );
    Ok(exceptions)
}

/// Read a configuration file, mapping "not found" and "blank" onto their
/// dedicated config errors.
pub(crate) fn read_config_file(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => SgError::ConfigMissing {
            path: path.to_path_buf(),
        },
        _ => SgError::malformed(path, err.to_string()),
    })?;
    if text.trim().is_empty() {
        return Err(SgError::ConfigEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn tier_files(dir: &TempDir) -> TierFilePaths {
        TierFilePaths {
            gold_tier: write(dir, "gold.json", r#"["G1"]"#),
            silver_tier: write(dir, "silver.json", r#"["S1"]"#),
            bronze_tier: write(dir, "bronze.json", "[]"),
            notier: write(dir, "notier.json", r#"["N1","X"]"#),
        }
    }

    #[test]
    fn mapping_preserves_file_order() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "map.json", r#"{"300":"zulu","100":"alpha","200":"mike"}"#);
        let names: Vec<String> = load_account_mapping(&path)
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn missing_mapping_is_config_missing() {
        let dir = tempdir().unwrap();
        let err = load_account_mapping(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SgError::ConfigMissing { .. }), "{err}");
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_mapping_is_config_empty() {
        let dir = tempdir().unwrap();
        for (name, contents) in [("zero.json", ""), ("blank.json", "  \n"), ("obj.json", "{}")] {
            let err = load_account_mapping(&write(&dir, name, contents)).unwrap_err();
            assert!(matches!(err, SgError::ConfigEmpty { .. }), "{name}: {err}");
        }
    }

    #[test]
    fn mapping_values_must_be_names() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "map.json", r#"{"1":"ok","2":7}"#);
        let err = load_account_mapping(&path).unwrap_err();
        assert!(matches!(err, SgError::ConfigMalformed { .. }), "{err}");
        assert!(err.to_string().contains("'2'"));
    }

    #[test]
    fn malformed_tier_file_is_fatal() {
        let dir = tempdir().unwrap();
        let mut paths = tier_files(&dir);
        paths.silver_tier = write(&dir, "silver_bad.json", r#"{"S1":true}"#);
        let err = load_tier_lists(&paths).unwrap_err();
        assert!(matches!(err, SgError::ConfigMalformed { .. }), "{err}");

        paths.silver_tier = dir.path().join("nope.json");
        let err = load_tier_lists(&paths).unwrap_err();
        assert!(matches!(err, SgError::ConfigMissing { .. }), "{err}");
    }

    #[test]
    fn excepted_accounts_are_removed_but_tier_lists_are_not() {
        let dir = tempdir().unwrap();
        let mapping = write(
            &dir,
            "map.json",
            r#"{"acct-G":"G1","acct-X":"X","acct-N":"N1"}"#,
        );
        let exceptions = Exceptions {
            accounts: ["acct-X".to_owned()].into_iter().collect(),
            buckets: BTreeSet::new(),
        };
        let index = load(&mapping, &tier_files(&dir), &exceptions).unwrap();

        let names: Vec<&str> = index.accounts().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["G1", "N1"]);
        assert_eq!(index.excluded_count(), 1);
        assert!(index.notier_members().contains("X"));
        assert!(index.membership("X").notier);
    }

    #[test]
    fn membership_lookup() {
        let dir = tempdir().unwrap();
        let mapping = write(&dir, "map.json", r#"{"1":"G1"}"#);
        let index = load(&mapping, &tier_files(&dir), &Exceptions::default()).unwrap();
        assert_eq!(index.membership("G1"), TierMembership::only(Tier::Gold));
        assert_eq!(index.membership("S1"), TierMembership::only(Tier::Silver));
        assert_eq!(index.membership("N1"), TierMembership::NOTIER);
        assert!(index.membership("unknown").is_untracked());
        assert!(index.tier_members(Tier::Bronze).is_empty());
    }

    #[test]
    fn exceptions_file_loading() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "exceptions.json", r#"{"buckets":["b2"]}"#);
        let exceptions = load_exceptions(&path).unwrap();
        assert!(exceptions.accounts.is_empty());
        assert!(exceptions.excludes_bucket("b2"));

        let bad = write(&dir, "bad.json", r#"["b2"]"#);
        assert!(matches!(
            load_exceptions(&bad).unwrap_err(),
            SgError::ConfigMalformed { .. }
        ));
    }

    #[test]
    fn relative_tier_paths_resolve_against_base() {
        let paths = TierFilePaths {
            gold_tier: PathBuf::from("tiers/gold.json"),
            silver_tier: PathBuf::from("/abs/silver.json"),
            bronze_tier: PathBuf::from("bronze.json"),
            notier: PathBuf::from("notier.json"),
        };
        let resolved = paths.resolved_against(Path::new("/etc/sgtier"));
        assert_eq!(resolved.gold_tier, PathBuf::from("/etc/sgtier/tiers/gold.json"));
        assert_eq!(resolved.silver_tier, PathBuf::from("/abs/silver.json"));
    }
}
