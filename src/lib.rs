//! Shedguard is a self-supervising launcher for a multi-daemon server program. It
//! restarts the program whenever it terminates and, when crashes come in rapid
//! succession, relaunches it with fewer CLI flags and progressively fewer daemons so
//! the most essential daemon stays online for as long as possible.

/// CLI interface.
pub mod cli;

/// Supervisor settings.
pub mod config;

/// Flag names, daemon names, shedding order and timing values.
pub mod constants;

/// Error handling.
pub mod error;

/// CLI token rewriting.
pub mod flags;

/// Launch parameter resolution per attempt.
pub mod launch;

/// Bounded capture of the main program's output.
pub mod logs;

/// Host measurements for failure reports.
pub mod metrics;

/// Failure notification.
pub mod notify;

/// Daemon shedding ladder.
pub mod shed;

/// Child process launching.
pub mod spawn;

/// The supervision loop.
pub mod supervisor;
