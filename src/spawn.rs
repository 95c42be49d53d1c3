//! Launching the main program as a child process.
use std::{
    fmt,
    io::Write,
    os::unix::process::{CommandExt, ExitStatusExt},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
};

use nix::sys::signal::Signal;
use tracing::{debug, warn};

use crate::{error::SupervisorError, logs::Diagnostics};

/// Startup secret handed to every main program instance over stdin.
#[derive(Clone, Default, PartialEq, Eq)]
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
        f.write_str("Secret(<redacted>)")
    }
}

/// A program the supervision loop can start and wait on, one instance at a time.
pub trait MainProgram {
    /// Starts an instance with `flags`, then writes the secret and a line break to
    /// its stdin and closes it.
    fn start(&mut self, flags: &[String], secret: &Secret) -> Result<(), SupervisorError>;

    /// Blocks until the started instance terminates and describes how it ended.
    fn wait(&mut self) -> Result<String, SupervisorError>;
}

/// Runs the main program as a real child process whose output flows through
/// [`Diagnostics`].
pub struct ProcessProgram {
    executable: PathBuf,
    diagnostics: Diagnostics,
    child: Option<Child>,
}

impl ProcessProgram {
    pub fn new(executable: PathBuf, diagnostics: Diagnostics) -> Self {
        Self {
            executable,
            diagnostics,
            child: None,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn deliver_secret(child: &mut Child, secret: &Secret) -> std::io::Result<()> {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("stdin of main program is not piped"))?;
        stdin.write_all(secret.expose().as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()
        // Dropping stdin closes it, so the child sees end of input after one line.
    }
}

impl MainProgram for ProcessProgram {
    fn start(&mut self, flags: &[String], secret: &Secret) -> Result<(), SupervisorError> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(flags)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Ensure the main program gets killed on supervisor death (Linux only)
        #[cfg(target_os = "linux")]
        {
            unsafe {
                cmd.pre_exec(|| {
                    use libc::{PR_SET_PDEATHSIG, SIGTERM, prctl};
                    if prctl(PR_SET_PDEATHSIG, SIGTERM, 0, 0, 0) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        debug!("Executing command: {cmd:?}");
        let mut child = cmd.spawn().map_err(|source| SupervisorError::SpawnError {
            program: self.executable.display().to_string(),
            source,
        })?;
        debug!("Main program started with PID: {}", child.id());

        if let Some(out) = child.stdout.take() {
            self.diagnostics.capture_stdout(out);
        }
        if let Some(err) = child.stderr.take() {
            self.diagnostics.capture_stderr(err);
        }

        if let Err(err) = Self::deliver_secret(&mut child, secret) {
            // A half-started instance must not outlive the failed attempt.
            if let Err(kill_err) = child.kill() {
                warn!("Failed to kill main program after secret delivery failure: {kill_err}");
            }
            if let Err(wait_err) = child.wait() {
                warn!("Failed to reap main program after secret delivery failure: {wait_err}");
            }
            return Err(SupervisorError::SecretDeliveryError(err));
        }

        self.child = Some(child);
        Ok(())
    }

    fn wait(&mut self) -> Result<String, SupervisorError> {
        let mut child = self.child.take().ok_or(SupervisorError::NotRunning)?;
        let status = child.wait().map_err(SupervisorError::WaitError)?;
        Ok(describe_exit(status))
    }
}

/// Describes an exit status, naming the signal when one terminated the process.
pub fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {code}");
    }
    match status.signal() {
        Some(raw) => match Signal::try_from(raw) {
            Ok(signal) => format!("terminated by signal {signal}"),
            Err(_) => format!("terminated by signal {raw}"),
        },
        None => status.to_string(),
    }
}
