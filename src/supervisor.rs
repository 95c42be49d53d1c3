use std::{
    env,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::{
    config::{Settings, SupervisionTiming},
    constants::DAEMONS_FLAG_NAME,
    error::SupervisorError,
    flags::{flag_value, split_daemon_list},
    launch::LaunchPlanner,
    logs::Diagnostics,
    notify::{Mailer, Notifier, NotifyOutcome, PublicIpLookup, SendmailMailer},
    spawn::{MainProgram, ProcessProgram, Secret},
};

const CANCELLATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared stop request, checked once per supervision iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration`, returning early once cancelled.
    pub fn sleep(&self, duration: Duration) {
        let mut slept = Duration::ZERO;
        while slept < duration {
            if self.is_cancelled() {
                return;
            }
            let step = duration.saturating_sub(slept).min(CANCELLATION_POLL_INTERVAL);
            thread::sleep(step);
            slept += step;
        }
    }
}

/// Outcome of one supervision iteration.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    /// Attempt index the launch parameters were resolved for.
    pub attempt: usize,
    /// CLI flags the main program was started with.
    pub flags: Vec<String>,
    /// Why the attempt ended.
    pub cause: String,
    /// Whether the failure came quickly enough to advance the attempt index.
    pub escalated: bool,
    pub notification: NotifyOutcome,
}

/// Keeps the main program running, shedding daemons and flags when it crashes
/// repeatedly within the failure tolerance window.
pub struct Supervisor<P: MainProgram, M: Mailer> {
    planner: LaunchPlanner,
    program: P,
    notifier: Notifier<M>,
    diagnostics: Diagnostics,
    secret: Secret,
    timing: SupervisionTiming,
    cancel: CancellationFlag,
    attempt: usize,
    last_attempt: Instant,
}

impl Supervisor<ProcessProgram, SendmailMailer> {
    /// Builds a supervisor for a real child process from settings and the
    /// original child flags.
    ///
    /// The daemon list is read from the `-daemons` flag. Fails only when the
    /// program path cannot be determined or the settings are invalid.
    pub fn from_settings(
        settings: &Settings,
        cli_flags: &[String],
        secret: Secret,
    ) -> Result<Self, SupervisorError> {
        let executable = match &settings.program {
            Some(path) => path.clone(),
            None => current_executable()?,
        };
        let timing = settings.timing()?;

        let daemons = flag_value(cli_flags, DAEMONS_FLAG_NAME)
            .map(|raw| split_daemon_list(&raw))
            .unwrap_or_default();
        let planner = LaunchPlanner::new(cli_flags, daemons, &settings.shed_order());

        let diagnostics = Diagnostics::new(timing.output_capacity);
        let program = ProcessProgram::new(executable, diagnostics.clone());
        let notifier = Notifier::new(
            SendmailMailer::from_settings(settings),
            settings.recipients.clone(),
            PublicIpLookup::new(settings.public_ip_endpoint.clone()),
        );

        Ok(Self::new(
            planner,
            program,
            notifier,
            diagnostics,
            secret,
            timing,
        ))
    }
}

impl<P: MainProgram, M: Mailer> Supervisor<P, M> {
    pub fn new(
        planner: LaunchPlanner,
        program: P,
        notifier: Notifier<M>,
        diagnostics: Diagnostics,
        secret: Secret,
        timing: SupervisionTiming,
    ) -> Self {
        Self {
            planner,
            program,
            notifier,
            diagnostics,
            secret,
            timing,
            cancel: CancellationFlag::new(),
            attempt: 0,
            last_attempt: Instant::now(),
        }
    }

    /// Replaces the cancellation flag checked before every attempt.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn planner(&self) -> &LaunchPlanner {
        &self.planner
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    /// Runs the supervision loop until cancelled. The main program is restarted
    /// after every termination, clean exits included.
    pub fn run(&mut self) -> Result<(), SupervisorError> {
        info!(
            "Supervising main program with daemons {:?} ({} shedding steps)",
            self.planner.daemons(),
            self.planner.ladder().len()
        );

        while !self.cancel.is_cancelled() {
            self.supervise_once();
        }

        info!("Supervisor cancelled after attempt {}", self.attempt);
        Ok(())
    }

    /// Launches the main program once, waits for it to end and handles the
    /// failure: notify, maybe escalate, then pause before the next attempt.
    pub fn supervise_once(&mut self) -> AttemptReport {
        let attempt = self.attempt;
        let params = self.planner.resolve(attempt);
        info!(
            "Attempt {attempt}: starting main program with CLI flags {:?}",
            params.flags
        );

        let cause = match self.program.start(&params.flags, &self.secret) {
            Err(err) => {
                warn!("Attempt {attempt}: failed to start main program: {err}");
                err.to_string()
            }
            Ok(()) => {
                self.last_attempt = Instant::now();
                match self.program.wait() {
                    Ok(exit) => {
                        let err = SupervisorError::Exited(exit);
                        warn!("Attempt {attempt}: {err}");
                        err.to_string()
                    }
                    Err(err) => {
                        error!("Attempt {attempt}: {err}");
                        err.to_string()
                    }
                }
            }
        };

        // Give trailing output (e.g. a stack trace) time to reach the buffers.
        thread::sleep(self.timing.flush_delay);
        let notification = self
            .notifier
            .notify_failure(&params.flags, &cause, &self.diagnostics);
        debug!("Attempt {attempt}: notification {}", notification.as_ref());

        let since_last_attempt = self.last_attempt.elapsed();
        let escalated = since_last_attempt < self.timing.failure_tolerance;
        if escalated {
            self.attempt += 1;
            info!(
                "Main program failed {:?} after launch; escalating to attempt {}",
                since_last_attempt, self.attempt
            );
        }

        self.cancel.sleep(self.timing.restart_interval);

        AttemptReport {
            attempt,
            flags: params.flags,
            cause,
            escalated,
            notification,
        }
    }
}

/// Path of the running executable, which is the default program to supervise.
pub fn current_executable() -> Result<PathBuf, SupervisorError> {
    env::current_exe().map_err(SupervisorError::ExecutablePath)
}
