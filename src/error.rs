//! Error handling for shedguard.
use thiserror::Error;

/// Defines all possible errors raised while supervising the main program.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The path of the program to supervise could not be determined.
    #[error("Failed to determine path to the program executable: {0}")]
    ExecutablePath(#[source] std::io::Error),

    /// Error spawning the main program.
    #[error("Failed to start main program '{program}': {source}")]
    SpawnError {
        /// The program that failed to start.
        program: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error handing the startup secret to the main program.
    #[error("Failed to deliver secret to main program: {0}")]
    SecretDeliveryError(#[source] std::io::Error),

    /// Error waiting for the main program to terminate.
    #[error("Failed to wait for main program: {0}")]
    WaitError(#[source] std::io::Error),

    /// `wait` was called without a running main program.
    #[error("Main program is not running")]
    NotRunning,

    /// The main program terminated. It is never expected to exit on its own.
    #[error("Main program has exited: {0}")]
    Exited(String),

    /// Supervisor settings are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Error type for loading supervisor settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading or accessing a settings file.
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing YAML settings.
    #[error("Invalid YAML format: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A duration field could not be parsed.
    #[error("Invalid duration value: '{0}'")]
    InvalidDuration(String),

    /// A `${VAR}` reference names an unset environment variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Error type for failure notification delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The mail transfer agent could not be run or written to.
    #[error("Failed to run mailer '{program}': {source}")]
    MailerIo {
        /// The mailer executable.
        program: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The mail transfer agent rejected the message.
    #[error("Mailer exited with status {0:?}")]
    MailerFailed(Option<i32>),

    /// The public IP lookup failed.
    #[error("Public IP lookup failed: {0}")]
    Http(#[from] reqwest::Error),
}
