//! End-of-run summary emails and the transports that deliver them.
//!
//! Delivery is fire-and-forget: a transport failure is logged and the run
//! outcome is unchanged.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use sgtier_error::{Result, SgError};
use tracing::{error, info};

use crate::ledger::RunLedger;

pub const SUBJECT_TAG_FAILED: &str = "Policy Tag Assignment Failed";
pub const SUBJECT_CONSISTENCY_FAILED: &str = "Consistency Assignment Failed";
pub const SUBJECT_DEFAULT_TAG: &str = "Default Policy Tag Assignment";

/// Delivery capability for one summary email.
pub trait Notifier {
    fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> Result<()>;
}

/// A composed summary email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub subject: String,
    pub body: String,
}

impl Email {
    fn new(subject: &str, body: String) -> Self {
        Self {
            subject: subject.to_owned(),
            body,
        }
    }
}

/// Build the summary emails for `ledger`, one per non-empty accumulator, in
/// the order tag failures, consistency failures, default-tag buckets.
pub fn compose(ledger: &RunLedger) -> Vec<Email> {
    let mut emails = Vec::with_capacity(3);

    if !ledger.failed_tag_assignments.is_empty() {
        let mut body =
            String::from("The following buckets failed to get the policy tag assigned:\n\n");
        body.push_str("*s3accountname-bucket_name-tagname*\n================================\n");
        push_lines(&mut body, &ledger.failed_tag_assignments);
        emails.push(Email::new(SUBJECT_TAG_FAILED, body));
    }

    if !ledger.failed_consistency_assignments.is_empty() {
        let mut body = String::from(
            "The following buckets failed to get the consistency level assigned:\n\n",
        );
        push_lines(&mut body, &ledger.failed_consistency_assignments);
        emails.push(Email::new(SUBJECT_CONSISTENCY_FAILED, body));
    }

    if !ledger.default_tag_buckets.is_empty() {
        let mut body =
            String::from("The following buckets are assigned to the default policy tag:\n\n");
        body.push_str("*s3accountname -- bucket_names*\n====================\n");
        for (account, buckets) in &ledger.default_tag_buckets {
            body.push_str(&format!("{account} -- [{}]\n", buckets.join(", ")));
        }
        emails.push(Email::new(SUBJECT_DEFAULT_TAG, body));
    }

    emails
}

fn push_lines(body: &mut String, entries: &[String]) {
    for entry in entries {
        body.push_str(entry);
        body.push('\n');
    }
}

/// Compose and send every summary email. Returns how many were handed to
/// the transport without error.
pub fn send_summaries(ledger: &RunLedger, notifier: &dyn Notifier, recipient: &str) -> usize {
    if !ledger.failed_tag_assignments.is_empty() {
        error!(
            buckets = ?ledger.failed_tag_assignments,
            "Failed to assign the policy tag to the following buckets"
        );
    }
    if !ledger.failed_consistency_assignments.is_empty() {
        error!(
            buckets = ?ledger.failed_consistency_assignments,
            "Failed to assign the consistency level to the following buckets"
        );
    }
    if !ledger.default_tag_buckets.is_empty() {
        error!(
            buckets = ?ledger.default_tag_buckets,
            "The following buckets are assigned to the default policy tag"
        );
    }

    let mut sent = 0;
    for email in compose(ledger) {
        match notifier.send_mail(&email.subject, &email.body, recipient) {
            Ok(()) => {
                info!(subject = %email.subject, recipient, "Sent email notification");
                sent += 1;
            }
            Err(err) => {
                error!(
                    subject = %email.subject,
                    recipient,
                    error = %err,
                    "Unable to send email notification"
                );
            }
        }
    }
    sent
}

/// Transport selection in the run configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum MailTransport {
    /// Pipe an RFC 5322 message into a `sendmail -t` compatible program.
    Sendmail {
        #[serde(default = "default_sendmail_program")]
        program: PathBuf,
        #[serde(default)]
        from: Option<String>,
    },
    /// Append one JSON line per message to `path`.
    Outbox { path: PathBuf },
    /// Log the subject and drop the message.
    #[default]
    None,
}

fn default_sendmail_program() -> PathBuf {
    PathBuf::from("/usr/sbin/sendmail")
}

impl MailTransport {
    /// Rebase a relative outbox path onto `base`.
    #[must_use]
    pub fn resolved_against(self, base: &Path) -> Self {
        match self {
            Self::Outbox { path } if path.is_relative() => Self::Outbox {
                path: base.join(path),
            },
            other => other,
        }
    }

    pub fn build(&self) -> Box<dyn Notifier> {
        match self {
            Self::Sendmail { program, from } => Box::new(SendmailNotifier {
                program: program.clone(),
                from: from.clone(),
            }),
            Self::Outbox { path } => Box::new(OutboxNotifier::new(path.clone())),
            Self::None => Box::new(LogOnlyNotifier),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    pub program: PathBuf,
    pub from: Option<String>,
}

impl SendmailNotifier {
    fn message(&self, subject: &str, body: &str, recipient: &str) -> String {
        let mut message = format!("To: {recipient}\n");
        if let Some(from) = &self.from {
            message.push_str(&format!("From: {from}\n"));
        }
        message.push_str(&format!("Subject: {subject}\n"));
        message.push_str("Content-Type: text/plain; charset=utf-8\n\n");
        message.push_str(body);
        message
    }
}

impl Notifier for SendmailNotifier {
    fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| SgError::Notify {
                detail: format!("failed to spawn {}: {err}", self.program.display()),
            })?;

        let message = self.message(subject, body, recipient);
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(SgError::Notify {
                detail: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct OutboxRecord<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Appends messages as JSON lines, for hosts without a mail relay.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Notifier for OutboxNotifier {
    fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        let record = OutboxRecord {
            to: recipient,
            subject,
            body,
        };
        let line = serde_json::to_string(&record)
            .map_err(|err| SgError::internal(format!("failed to serialize outbox record: {err}")))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyNotifier;

impl Notifier for LogOnlyNotifier {
    fn send_mail(&self, subject: &str, _body: &str, recipient: &str) -> Result<()> {
        info!(subject, recipient, "mail transport disabled; message not delivered");
        Ok(())
    }
}
