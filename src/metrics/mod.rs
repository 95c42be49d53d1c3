//! Host and supervisor measurements embedded in failure reports.
use std::{fmt, thread};

use chrono::{DateTime, Local};
use sysinfo::{ProcessesToUpdate, System};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Point-in-time view of the host and the supervisor process.
#[derive(Debug, Clone)]
pub struct HostSnapshot {
    pub taken_at: DateTime<Local>,
    pub system_uptime_secs: u64,
    pub process_uptime_secs: u64,
    pub total_memory_bytes: u64,
    pub used_memory_bytes: u64,
    pub process_memory_bytes: u64,
    pub load_one: f64,
    pub load_five: f64,
    pub load_fifteen: f64,
    pub cpu_count: usize,
    pub available_parallelism: usize,
    pub process_threads: usize,
}

impl HostSnapshot {
    /// Reads the current values. Anything the platform cannot report stays zero.
    pub fn collect() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_all();

        let (process_uptime_secs, process_memory_bytes, process_threads) =
            match sysinfo::get_current_pid() {
                Ok(pid) => {
                    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                    system
                        .process(pid)
                        .map(|process| {
                            let threads = process
                                .tasks()
                                .map(|tasks| tasks.len())
                                .unwrap_or_default();
                            (process.run_time(), process.memory(), threads)
                        })
                        .unwrap_or_default()
                }
                Err(_) => (0, 0, 0),
            };

        let load = System::load_average();

        Self {
            taken_at: Local::now(),
            system_uptime_secs: System::uptime(),
            process_uptime_secs,
            total_memory_bytes: system.total_memory(),
            used_memory_bytes: system.used_memory(),
            process_memory_bytes,
            load_one: load.one,
            load_five: load.five,
            load_fifteen: load.fifteen,
            cpu_count: system.cpus().len(),
            available_parallelism: thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1),
            process_threads,
        }
    }
}

impl fmt::Display for HostSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Clock: {}", self.taken_at.to_rfc2822())?;
        writeln!(
            f,
            "Sys/prog uptime: {} / {}",
            format_uptime(self.system_uptime_secs),
            format_uptime(self.process_uptime_secs)
        )?;
        writeln!(
            f,
            "Total/used/prog mem: {} / {} / {} MB",
            self.total_memory_bytes / BYTES_PER_MB,
            self.used_memory_bytes / BYTES_PER_MB,
            self.process_memory_bytes / BYTES_PER_MB
        )?;
        writeln!(
            f,
            "Sys load: {:.2} {:.2} {:.2}",
            self.load_one, self.load_five, self.load_fifteen
        )?;
        write!(
            f,
            "Num CPU/parallelism/threads: {} / {} / {}",
            self.cpu_count, self.available_parallelism, self.process_threads
        )
    }
}

/// Formats seconds as `1d2h3m4s`, omitting leading zero units.
pub fn format_uptime(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    match (days, hours, minutes) {
        (0, 0, 0) => format!("{seconds}s"),
        (0, 0, _) => format!("{minutes}m{seconds}s"),
        (0, _, _) => format!("{hours}h{minutes}m{seconds}s"),
        _ => format!("{days}d{hours}h{minutes}m{seconds}s"),
    }
}
