use std::{
    error::Error,
    io::{self, BufRead},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shedguard::{
    cli::{Cli, parse_args},
    config::load_settings,
    spawn::Secret,
    supervisor::{CancellationFlag, Supervisor},
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    let mut settings = match load_settings(args.settings.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            error!("Failed to load settings: {err}");
            return Err(err.into());
        }
    };
    if let Some(program) = args.program.clone() {
        settings.program = Some(program);
    }

    let secret = if args.secret_stdin {
        read_secret()?
    } else {
        Secret::default()
    };

    let cancel = CancellationFlag::new();
    register_signal_handler(cancel.clone())?;

    let supervisor = match Supervisor::from_settings(&settings, &args.child_flags, secret) {
        Ok(supervisor) => supervisor,
        Err(err) => {
            error!("Supervisor aborted: {err}");
            return Err(err.into());
        }
    };

    supervisor.with_cancellation(cancel).run()?;
    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Reads the secret as the first line of stdin, without its line break.
fn read_secret() -> io::Result<Secret> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    if line.is_empty() {
        warn!("stdin closed before a secret was provided; using an empty secret");
    }
    let trimmed = line.trim_end_matches(['\r', '\n']);
    Ok(Secret::new(trimmed))
}

fn register_signal_handler(cancel: CancellationFlag) -> Result<(), Box<dyn Error>> {
    ctrlc::set_handler(move || {
        info!("shedguard is shutting down after the current attempt");
        cancel.cancel();
    })?;

    Ok(())
}
