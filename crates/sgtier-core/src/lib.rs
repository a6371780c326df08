//! StorageGRID ILM policy-tag tier reconciliation.
//!
//! A pass visits every mapped account, lists its buckets, and makes each
//! bucket's ILM policy tag agree with the account's tier. Anything that
//! cannot be fixed is accumulated in a [`RunLedger`] and mailed out at the
//! end of the pass.

pub mod config;
pub mod engine;
pub mod inventory;
pub mod ledger;
pub mod loader;
pub mod mutation;
pub mod notify;
pub mod reconcile;
pub mod report;
pub mod run;

pub use config::{RunConfig, load_run_config, resolve_credentials};
pub use engine::{Action, classify};
pub use ledger::RunLedger;
pub use loader::{AccountTierIndex, TierFilePaths};
pub use notify::{MailTransport, Notifier};
pub use reconcile::{Reconciler, TransportPolicy};
pub use report::{RunReport, write_report};
pub use run::{RunOutcome, probe_grid, run_once};
