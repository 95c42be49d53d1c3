//! Supervisor settings.
use regex::Regex;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    constants::{
        DEFAULT_SENDMAIL_PATH, FAILURE_TOLERANCE_WINDOW, OUTPUT_CAPACITY,
        OUTPUT_FLUSH_DELAY, RESTART_INTERVAL, SHED_ORDER,
    },
    error::ConfigError,
};

/// Represents the structure of the settings file.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Program to supervise. Defaults to the running executable.
    pub program: Option<PathBuf>,
    /// Addresses that receive failure reports.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Outgoing mail settings.
    #[serde(default)]
    pub mailer: MailerConfig,
    /// HTTP endpoint answering with the host's public IP as plain text.
    pub public_ip_endpoint: Option<String>,
    /// Maximum interval between failures that still escalates (e.g. "20m").
    pub failure_tolerance: Option<String>,
    /// Pause between a failure and the next launch (e.g. "10s").
    pub restart_interval: Option<String>,
    /// Pause that lets trailing output reach the diagnostics buffers.
    pub flush_delay: Option<String>,
    /// Bytes of stdout/stderr retained for reports.
    pub output_capacity: Option<usize>,
    /// Overrides the built-in shedding order.
    pub shed_order: Option<Vec<String>>,
}

/// Sendmail-compatible mail transfer agent settings.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MailerConfig {
    /// Path to the `sendmail` executable.
    pub sendmail: Option<PathBuf>,
    /// Sender address. The mailer counts as configured only when this is set.
    pub from: Option<String>,
}

impl MailerConfig {
    pub fn sendmail_path(&self) -> PathBuf {
        self.sendmail
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SENDMAIL_PATH))
    }
}

/// Timing and capacity values resolved from [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisionTiming {
    pub failure_tolerance: Duration,
    pub restart_interval: Duration,
    pub flush_delay: Duration,
    pub output_capacity: usize,
}

impl Default for SupervisionTiming {
    fn default() -> Self {
        Self {
            failure_tolerance: FAILURE_TOLERANCE_WINDOW,
            restart_interval: RESTART_INTERVAL,
            flush_delay: OUTPUT_FLUSH_DELAY,
            output_capacity: OUTPUT_CAPACITY,
        }
    }
}

impl Settings {
    /// Resolves durations and capacity, falling back to the built-in defaults.
    pub fn timing(&self) -> Result<SupervisionTiming, ConfigError> {
        let defaults = SupervisionTiming::default();
        Ok(SupervisionTiming {
            failure_tolerance: parse_optional_duration(
                self.failure_tolerance.as_deref(),
                defaults.failure_tolerance,
            )?,
            restart_interval: parse_optional_duration(
                self.restart_interval.as_deref(),
                defaults.restart_interval,
            )?,
            flush_delay: parse_optional_duration(
                self.flush_delay.as_deref(),
                defaults.flush_delay,
            )?,
            output_capacity: self.output_capacity.unwrap_or(defaults.output_capacity),
        })
    }

    /// The configured shedding order, or the built-in one.
    pub fn shed_order(&self) -> Vec<String> {
        match &self.shed_order {
            Some(order) => order.clone(),
            None => SHED_ORDER.iter().map(|name| name.to_string()).collect(),
        }
    }
}

fn parse_optional_duration(
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    raw.map(parse_duration).unwrap_or(Ok(default))
}

/// Parses a user-facing duration string in the format `<number>[s|m|h]`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ConfigError::InvalidDuration(raw.to_string()));
    }

    if let Some(stripped) = value.strip_suffix("ms") {
        let amount: u64 = stripped
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidDuration(raw.to_string()))?;
        return Ok(Duration::from_millis(amount));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(raw.to_string()))?;

    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

/// Expands `$VAR` and `${VAR}` references within a string.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid pattern");

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| var_name.to_string());
            String::new()
        })
    });

    match missing {
        Some(var_name) => Err(ConfigError::MissingEnvVar(var_name)),
        None => Ok(result.into_owned()),
    }
}

/// Loads and parses the settings file, expanding environment variables.
///
/// Without a path the built-in defaults are used.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };

    let content = fs::read_to_string(path).map_err(|e| {
        ConfigError::ReadError(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, path.display()),
        ))
    })?;

    let expanded = expand_env_vars(&content)?;
    let settings: Settings = serde_yaml::from_str(&expanded)?;
    settings.timing()?;
    Ok(settings)
}
