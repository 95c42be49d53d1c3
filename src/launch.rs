//! Resolution of the CLI flags and daemon set used for each launch attempt.
use crate::{
    constants::{CONFIG_FLAG_NAME, DAEMONS_FLAG_NAME, SUPERVISOR_FLAG_NAME},
    flags::{flag_has_name, remove_from_flags},
    shed::ShedLadder,
};

/// Flags and daemons handed to the main program for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParameters {
    /// Complete CLI flags, ending with the supervisor and daemons flags.
    pub flags: Vec<String>,
    /// Daemons the main program is asked to start.
    pub daemons: Vec<String>,
}

/// Maps an attempt index to its [`LaunchParameters`].
///
/// | attempt        | flags                 | daemons             |
/// |----------------|-----------------------|---------------------|
/// | `0`            | original              | original            |
/// | `1`            | `-config` only        | original            |
/// | `2..=D`        | `-config` only        | ladder step `a - 2` |
/// | `D + 1`        | `-config` only        | original            |
/// | `> D + 1`      | original              | original            |
///
/// `D` is the number of configured daemons. Every attempt also carries
/// `-supervisor=false` and a regenerated `-daemons` flag.
#[derive(Debug, Clone)]
pub struct LaunchPlanner {
    cli_flags: Vec<String>,
    daemons: Vec<String>,
    ladder: ShedLadder,
}

impl LaunchPlanner {
    /// Creates a planner from the original child flags and daemon names.
    ///
    /// Any `-daemons` flag is dropped from `cli_flags`; it is regenerated on
    /// every launch.
    pub fn new<S: AsRef<str>>(
        cli_flags: &[String],
        daemons: Vec<String>,
        shed_order: &[S],
    ) -> Self {
        let cli_flags =
            remove_from_flags(cli_flags, |f| flag_has_name(f, DAEMONS_FLAG_NAME));
        let ladder = ShedLadder::plan(&daemons, shed_order);
        Self {
            cli_flags,
            daemons,
            ladder,
        }
    }

    pub fn ladder(&self) -> &ShedLadder {
        &self.ladder
    }

    pub fn daemons(&self) -> &[String] {
        &self.daemons
    }

    /// Returns the parameters for the zero-based `attempt`.
    pub fn resolve(&self, attempt: usize) -> LaunchParameters {
        let daemon_count = self.daemons.len();

        // The child must never run a supervisor of its own.
        let baseline =
            remove_from_flags(&self.cli_flags, |f| flag_has_name(f, SUPERVISOR_FLAG_NAME));
        let mut flags = baseline.clone();
        let mut daemons = self.daemons.clone();

        if attempt >= 1 {
            // Drop advanced flags such as -gomaxprocs that alter the environment.
            flags = remove_from_flags(&flags, |f| !flag_has_name(f, CONFIG_FLAG_NAME));
        }
        if (2..=daemon_count).contains(&attempt) {
            let step = self
                .ladder
                .step(attempt - 2)
                .or_else(|| self.ladder.last())
                .unwrap_or(self.daemons.as_slice());
            daemons = step.to_vec();
        }
        if attempt > daemon_count + 1 {
            // The ladder is exhausted; go back to the original parameters.
            flags = baseline;
            daemons = self.daemons.clone();
        }

        flags.push(format!("-{SUPERVISOR_FLAG_NAME}=false"));
        flags.push(format!("-{DAEMONS_FLAG_NAME}"));
        flags.push(daemons.join(","));

        LaunchParameters { flags, daemons }
    }
}
