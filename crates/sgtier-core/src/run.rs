//! One complete reconciliation pass: load, traverse, notify, report.

use sgtier_error::{Result, SgError};
use sgtier_grid::{AuthRequest, GridApi};
use sgtier_types::{Credentials, Exceptions};
use tracing::{error, info};

use crate::config::RunConfig;
use crate::loader::{self, load_exceptions};
use crate::notify::{Notifier, send_summaries};
use crate::reconcile::Reconciler;
use crate::report::{RunReport, unix_ms_now};

pub const START_BANNER: &str =
    "<================== Starting the Policy Tag Script ==================>";
pub const END_BANNER: &str = "<================== Policy Tag Script Completed ==================>";

/// What a pass produced. `abort` is set when the traversal stopped early;
/// the report and notifications still cover everything seen up to then.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub abort: Option<SgError>,
}

impl RunOutcome {
    pub fn into_result(self) -> Result<RunReport> {
        match self.abort {
            Some(err) => Err(err),
            None => Ok(self.report),
        }
    }
}

/// Run one pass against `api`.
///
/// Configuration problems return `Err` before any grid call. Grid failures
/// are governed by `config.on_transport_error`.
pub fn run_once<G: GridApi + ?Sized>(
    config: &RunConfig,
    api: &G,
    credentials: &Credentials,
    notifier: &dyn Notifier,
) -> Result<RunOutcome> {
    let started = unix_ms_now();
    info!("{START_BANNER}");

    let exceptions = match &config.exceptions {
        Some(path) => load_exceptions(path)?,
        None => Exceptions::default(),
    };
    let index = loader::load(&config.account_mapping, &config.tiers, &exceptions)?;

    let mut reconciler = Reconciler::new(
        api,
        &index,
        &exceptions,
        credentials,
        config.on_transport_error,
    );
    let traversal = reconciler.process_accounts();
    let ledger = reconciler.into_ledger();

    let sent = send_summaries(&ledger, notifier, &config.email.recipient);
    let mut report = RunReport::from_ledger(ledger, started, index.excluded_count());
    report.notifications_sent = sent;

    let abort = match traversal {
        Ok(()) => None,
        Err(err) => {
            error!(error = %err, "Reconciliation pass stopped early");
            report.aborted = Some(err.to_string());
            Some(err)
        }
    };

    info!(
        accounts = report.counts.accounts_visited,
        buckets = report.counts.buckets_seen,
        corrected = report.counts.corrected,
        failed = report.counts.correction_failed,
        "{END_BANNER}"
    );
    Ok(RunOutcome { report, abort })
}

/// Authenticate at grid level only, without touching any account.
pub fn probe_grid<G: GridApi + ?Sized>(api: &G, credentials: &Credentials) -> Result<()> {
    let request = AuthRequest::for_grid(&credentials.username, credentials.password.expose());
    api.authorize(&request, None)?;
    info!("Grid authentication succeeded");
    Ok(())
}
