//! Constants and configuration values for the shedguard supervisor.
//!
//! This module centralizes flag names, daemon names, the shedding order and the
//! timing values used by the supervision loop.

use std::time::Duration;

// ============================================================================
// Child CLI Flags
// ============================================================================

/// String flag carrying the path to the child's configuration file.
pub const CONFIG_FLAG_NAME: &str = "config";

/// Boolean flag deciding whether the child runs its own supervisor.
pub const SUPERVISOR_FLAG_NAME: &str = "supervisor";

/// String flag carrying the comma separated daemon names the child should launch.
pub const DAEMONS_FLAG_NAME: &str = "daemons";

/// Leading marker of every flag token.
pub const FLAG_MARKER: char = '-';

// ============================================================================
// Daemon Names
// ============================================================================

pub const AUTO_UNLOCK_NAME: &str = "autounlock";
pub const DNSD_NAME: &str = "dnsd";
pub const HTTPD_NAME: &str = "httpd";
pub const INSECURE_HTTPD_NAME: &str = "insecurehttpd";
pub const MAINTENANCE_NAME: &str = "maintenance";
pub const PHONE_HOME_NAME: &str = "phonehome";
pub const PLAIN_SOCKET_NAME: &str = "plainsocket";
pub const SERIAL_PORT_DAEMON_NAME: &str = "serialport";
pub const SIMPLE_IP_SVC_NAME: &str = "simpleipsvcd";
pub const SMTPD_NAME: &str = "smtpd";
pub const SNMPD_NAME: &str = "snmpd";
pub const SOCKD_NAME: &str = "sockd";
pub const TELEGRAM_NAME: &str = "telegram";

/// Every daemon the supervised program knows how to launch, unsorted.
pub const ALL_DAEMONS: [&str; 13] = [
    AUTO_UNLOCK_NAME,
    DNSD_NAME,
    HTTPD_NAME,
    INSECURE_HTTPD_NAME,
    MAINTENANCE_NAME,
    PHONE_HOME_NAME,
    PLAIN_SOCKET_NAME,
    SERIAL_PORT_DAEMON_NAME,
    SIMPLE_IP_SVC_NAME,
    SMTPD_NAME,
    SNMPD_NAME,
    SOCKD_NAME,
    TELEGRAM_NAME,
];

/// The daemon that is never shed. It hands memorised unlock secrets to other
/// instances, so it must stay online for as long as anything does.
pub const LAST_RESORT_DAEMON: &str = AUTO_UNLOCK_NAME;

/// Order in which daemons are taken offline under rapid, repeated crashes.
///
/// Groups, from first to last:
/// 1. System maintenance.
/// 2. Non-essential services without authentication.
/// 3. Non-essential services with authentication.
/// 4. Heavy services.
/// 5. Essential services.
///
/// [`LAST_RESORT_DAEMON`] is intentionally absent.
pub const SHED_ORDER: [&str; 12] = [
    MAINTENANCE_NAME,
    SERIAL_PORT_DAEMON_NAME,
    SIMPLE_IP_SVC_NAME,
    SNMPD_NAME,
    DNSD_NAME,
    SOCKD_NAME,
    SMTPD_NAME,
    HTTPD_NAME,
    INSECURE_HTTPD_NAME,
    PLAIN_SOCKET_NAME,
    TELEGRAM_NAME,
    PHONE_HOME_NAME,
];

// ============================================================================
// Supervision Timing
// ============================================================================

/// Failures closer together than this escalate the attempt index.
pub const FAILURE_TOLERANCE_WINDOW: Duration = Duration::from_secs(20 * 60);

/// Pause between a failure and the next launch attempt.
pub const RESTART_INTERVAL: Duration = Duration::from_secs(10);

/// Pause after a failure so trailing child output reaches the diagnostics buffers.
pub const OUTPUT_FLUSH_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Diagnostics and Notification
// ============================================================================

/// Bytes of child stdout/stderr retained for failure reports.
pub const OUTPUT_CAPACITY: usize = 4 * 1024;

/// Upper bound on the size of a failure report body.
pub const MAX_REPORT_BYTES: usize = 1024 * 1024;

/// Keyword prefixed to the subject of every outgoing report.
pub const MAIL_SUBJECT_KEYWORD: &str = "shedguard";

/// Default location of the sendmail-compatible mail transfer agent.
pub const DEFAULT_SENDMAIL_PATH: &str = "/usr/sbin/sendmail";

/// Timeout applied to the public IP lookup embedded in report subjects.
pub const PUBLIC_IP_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_resort_daemon_is_never_in_shed_order() {
        assert!(!SHED_ORDER.contains(&LAST_RESORT_DAEMON));
    }

    #[test]
    fn shed_order_covers_every_other_daemon() {
        for daemon in ALL_DAEMONS {
            if daemon != LAST_RESORT_DAEMON {
                assert!(SHED_ORDER.contains(&daemon), "{daemon} missing");
            }
        }
    }
}
