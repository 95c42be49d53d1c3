//! Failure reports and their delivery by mail.
use std::{
    io::Write,
    net::IpAddr,
    path::PathBuf,
    process::{Command, Stdio},
    str::FromStr,
};

use reqwest::blocking::Client;
use strum_macros::AsRefStr;
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    constants::{MAIL_SUBJECT_KEYWORD, MAX_REPORT_BYTES, PUBLIC_IP_TIMEOUT},
    error::NotifyError,
    logs::Diagnostics,
    metrics::HostSnapshot,
};

/// Outgoing mail collaborator.
pub trait Mailer {
    /// Whether enough settings are present to attempt delivery.
    fn is_configured(&self) -> bool;

    /// Delivers one message to every recipient.
    fn send(&self, subject: &str, body: &str, recipients: &[String])
    -> Result<(), NotifyError>;
}

/// Delivers mail by piping it to a sendmail-compatible agent (`sendmail -t -i`).
#[derive(Debug, Clone)]
pub struct SendmailMailer {
    program: PathBuf,
    from: Option<String>,
}

impl SendmailMailer {
    pub fn new(program: PathBuf, from: Option<String>) -> Self {
        Self { program, from }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.mailer.sendmail_path(), settings.mailer.from.clone())
    }

    fn compose(from: &str, subject: &str, body: &str, recipients: &[String]) -> String {
        let recipients: Vec<String> = recipients
            .iter()
            .map(|recipient| header_value(recipient))
            .collect();
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n",
            header_value(from),
            recipients.join(", "),
            header_value(subject)
        )
    }
}

impl Mailer for SendmailMailer {
    fn is_configured(&self) -> bool {
        self.from.as_deref().is_some_and(|from| !from.trim().is_empty())
    }

    fn send(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        let program = self.program.display().to_string();
        let io_error = |source: std::io::Error| NotifyError::MailerIo {
            program: program.clone(),
            source,
        };

        let from = self.from.as_deref().unwrap_or_default();
        let message = Self::compose(from, subject, body, recipients);

        let mut child = Command::new(&self.program)
            .arg("-t")
            .arg("-i")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_error)?;

        if let Some(mut stdin) = child.stdin.take()
            && let Err(err) = stdin.write_all(message.as_bytes())
        {
            drop(stdin);
            if let Err(wait_err) = child.wait() {
                warn!("Failed to reap mailer after write failure: {wait_err}");
            }
            return Err(io_error(err));
        }

        let output = child.wait_with_output().map_err(io_error)?;
        if !output.status.success() {
            debug!(
                "Mailer stderr: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(NotifyError::MailerFailed(output.status.code()));
        }
        Ok(())
    }
}

/// Best-effort lookup of the host's public IP for report subjects.
#[derive(Debug, Clone, Default)]
pub struct PublicIpLookup {
    endpoint: Option<String>,
}

impl PublicIpLookup {
    pub fn new(endpoint: Option<String>) -> Self {
        Self { endpoint }
    }

    /// Returns the public IP, or `unknown` when it cannot be determined.
    pub fn lookup(&self) -> String {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return "unknown".to_string();
        };
        match Self::fetch(endpoint) {
            Ok(reply) => match parse_public_ip(&reply) {
                Some(ip) => ip.to_string(),
                None => {
                    debug!("Public IP endpoint {endpoint} replied with a non-address");
                    "unknown".to_string()
                }
            },
            Err(err) => {
                debug!("Public IP lookup against {endpoint} failed: {err}");
                "unknown".to_string()
            }
        }
    }

    fn fetch(endpoint: &str) -> Result<String, NotifyError> {
        let client = Client::builder().timeout(PUBLIC_IP_TIMEOUT).build()?;
        let text = client.get(endpoint).send()?.error_for_status()?.text()?;
        Ok(text.trim().to_string())
    }
}

/// Accepts only a bare IPv4 or IPv6 address.
fn parse_public_ip(reply: &str) -> Option<IpAddr> {
    IpAddr::from_str(reply.trim()).ok()
}

/// Removes line breaks so a value cannot start a new header.
fn header_value(value: &str) -> String {
    value.chars().filter(|ch| *ch != '\r' && *ch != '\n').collect()
}

/// Everything known about one failed launch attempt.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub cause: String,
    pub flags: Vec<String>,
    pub host: HostSnapshot,
    pub stdout: String,
    pub stderr: String,
}

impl FailureReport {
    /// Gathers host measurements and the latest retained output.
    pub fn capture(cause: &str, flags: &[String], diagnostics: &Diagnostics) -> Self {
        Self {
            cause: cause.to_string(),
            flags: flags.to_vec(),
            host: HostSnapshot::collect(),
            stdout: diagnostics.stdout().snapshot_lossy(),
            stderr: diagnostics.stderr().snapshot_lossy(),
        }
    }

    pub fn subject(&self, public_ip: &str) -> String {
        format!("{MAIL_SUBJECT_KEYWORD}-supervisor has detected a failure on {public_ip}")
    }

    /// Renders the mail body, capped at [`MAX_REPORT_BYTES`].
    pub fn body(&self) -> String {
        let body = format!(
            "\nFailure: {}\nCLI flags: {:?}\n\n{}\n\nLatest stdout: {}\n\nLatest stderr: {}\n",
            self.cause, self.flags, self.host, self.stdout, self.stderr
        );
        lint_report(&body, MAX_REPORT_BYTES)
    }
}

/// Drops control characters other than newline and tab, then truncates to
/// `max_bytes` on a character boundary.
pub fn lint_report(text: &str, max_bytes: usize) -> String {
    let mut linted = String::with_capacity(text.len().min(max_bytes));
    for ch in text.chars() {
        if ch.is_control() && ch != '\n' && ch != '\t' {
            continue;
        }
        if linted.len() + ch.len_utf8() > max_bytes {
            break;
        }
        linted.push(ch);
    }
    linted
}

/// What happened to a failure notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum NotifyOutcome {
    /// No recipients, or the mailer is not configured.
    Skipped,
    Sent,
    /// Delivery was attempted and failed.
    Failed,
}

/// Sends failure reports to the configured recipients.
pub struct Notifier<M: Mailer> {
    mailer: M,
    recipients: Vec<String>,
    public_ip: PublicIpLookup,
}

impl<M: Mailer> Notifier<M> {
    pub fn new(mailer: M, recipients: Vec<String>, public_ip: PublicIpLookup) -> Self {
        Self {
            mailer,
            recipients,
            public_ip,
        }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Reports a launch failure. Delivery problems are logged, never returned.
    pub fn notify_failure(
        &self,
        flags: &[String],
        cause: &str,
        diagnostics: &Diagnostics,
    ) -> NotifyOutcome {
        if !self.mailer.is_configured() || self.recipients.is_empty() {
            warn!(
                "Will not send failure notification due to missing recipients or mailer config"
            );
            return NotifyOutcome::Skipped;
        }

        let report = FailureReport::capture(cause, flags, diagnostics);
        let subject = report.subject(&self.public_ip.lookup());
        match self.mailer.send(&subject, &report.body(), &self.recipients) {
            Ok(()) => {
                info!(
                    "Sent failure notification to {} recipient(s)",
                    self.recipients.len()
                );
                NotifyOutcome::Sent
            }
            Err(err) => {
                warn!("Failed to send failure notification: {err}");
                NotifyOutcome::Failed
            }
        }
    }
}
