#[path = "common/mod.rs"]
mod common;

use std::{fs, thread};

use common::{wait_for_lines, wait_until, write_script};
use shedguard::{
    config::{MailerConfig, Settings},
    notify::NotifyOutcome,
    spawn::Secret,
    supervisor::{CancellationFlag, Supervisor},
};
use tempfile::tempdir;

fn fast_settings(program: std::path::PathBuf) -> Settings {
    Settings {
        program: Some(program),
        failure_tolerance: Some("1h".into()),
        restart_interval: Some("0s".into()),
        flush_delay: Some("50ms".into()),
        ..Settings::default()
    }
}

fn child_flags(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|token| token.to_string()).collect()
}

/// A main program that records its flags and secret, then crashes.
fn crashing_program(dir: &std::path::Path) -> std::path::PathBuf {
    write_script(
        dir,
        "server.sh",
        &format!(
            r#"#!/bin/sh
printf '%s\n' "$*" >> '{args}'
read -r secret
echo "$secret" >> '{secrets}'
echo "daemon crashed" >&2
exit 1
"#,
            args = dir.join("launches.txt").display(),
            secrets = dir.join("secrets.txt").display(),
        ),
    )
}

#[test]
fn rapid_crashes_shed_flags_and_daemons() {
    let temp = tempdir().unwrap();
    let dir = temp.path();
    let program = crashing_program(dir);

    let settings = Settings {
        shed_order: Some(vec!["maintenance".into(), "dnsd".into()]),
        ..fast_settings(program)
    };
    let flags = child_flags(&[
        "-config",
        "server.json",
        "-debug",
        "-daemons",
        "autounlock,dnsd,maintenance",
    ]);

    let mut supervisor =
        Supervisor::from_settings(&settings, &flags, Secret::new("unlock-me")).unwrap();

    let reports: Vec<_> = (0..6).map(|_| supervisor.supervise_once()).collect();

    let launches = wait_for_lines(&dir.join("launches.txt"), 6);
    assert_eq!(
        launches,
        vec![
            "-config server.json -debug -supervisor=false -daemons autounlock,dnsd,maintenance",
            "-config server.json -supervisor=false -daemons autounlock,dnsd,maintenance",
            "-config server.json -supervisor=false -daemons autounlock,dnsd",
            "-config server.json -supervisor=false -daemons autounlock",
            "-config server.json -supervisor=false -daemons autounlock,dnsd,maintenance",
            "-config server.json -debug -supervisor=false -daemons autounlock,dnsd,maintenance",
        ]
    );

    let secrets = fs::read_to_string(dir.join("secrets.txt")).unwrap();
    assert!(secrets.lines().all(|line| line == "unlock-me"));
    assert_eq!(secrets.lines().count(), 6);

    for (index, report) in reports.iter().enumerate() {
        assert_eq!(report.attempt, index);
        assert!(report.escalated);
        assert_eq!(report.cause, "Main program has exited: exit status 1");
        assert_eq!(report.notification, NotifyOutcome::Skipped);
    }
    assert_eq!(supervisor.attempt(), 6);
}

#[test]
fn slow_failures_keep_the_original_parameters() {
    let temp = tempdir().unwrap();
    let dir = temp.path();
    let program = crashing_program(dir);

    let settings = Settings {
        failure_tolerance: Some("0s".into()),
        ..fast_settings(program)
    };
    let flags = child_flags(&["-config", "server.json", "-debug", "-daemons", "dnsd,autounlock"]);

    let mut supervisor =
        Supervisor::from_settings(&settings, &flags, Secret::default()).unwrap();
    let reports: Vec<_> = (0..3).map(|_| supervisor.supervise_once()).collect();

    assert_eq!(supervisor.attempt(), 0);
    for report in &reports {
        assert!(!report.escalated);
        assert_eq!(
            report.flags,
            child_flags(&[
                "-config",
                "server.json",
                "-debug",
                "-supervisor=false",
                "-daemons",
                "dnsd,autounlock",
            ])
        );
    }
}

#[test]
fn failures_are_mailed_through_sendmail() {
    let temp = tempdir().unwrap();
    let dir = temp.path();
    let program = crashing_program(dir);
    let outbox = dir.join("outbox.txt");
    let sendmail = write_script(
        dir,
        "sendmail.sh",
        &format!("#!/bin/sh\ncat >> '{}'\n", outbox.display()),
    );

    let settings = Settings {
        recipients: vec!["ops@example.com".into()],
        mailer: MailerConfig {
            sendmail: Some(sendmail),
            from: Some("shedguard@example.com".into()),
        },
        flush_delay: Some("300ms".into()),
        ..fast_settings(program)
    };
    let flags = child_flags(&["-daemons", "dnsd"]);

    let mut supervisor =
        Supervisor::from_settings(&settings, &flags, Secret::default()).unwrap();
    let report = supervisor.supervise_once();
    assert_eq!(report.notification, NotifyOutcome::Sent);

    let mail = fs::read_to_string(&outbox).unwrap();
    assert!(mail.contains("To: ops@example.com"));
    assert!(mail.contains("Subject: shedguard-supervisor has detected a failure on unknown"));
    assert!(mail.contains("Main program has exited: exit status 1"));
    assert!(mail.contains("daemon crashed"));
}

#[test]
fn run_stops_once_cancelled() {
    let temp = tempdir().unwrap();
    let dir = temp.path();
    let program = crashing_program(dir);

    let settings = fast_settings(program);
    let flags = child_flags(&["-daemons", "dnsd"]);
    let cancel = CancellationFlag::new();

    let watcher = {
        let cancel = cancel.clone();
        let launches = dir.join("launches.txt");
        thread::spawn(move || {
            wait_for_lines(&launches, 3);
            cancel.cancel();
        })
    };

    let mut supervisor = Supervisor::from_settings(&settings, &flags, Secret::default())
        .unwrap()
        .with_cancellation(cancel.clone());
    supervisor.run().unwrap();
    watcher.join().unwrap();

    assert!(cancel.is_cancelled());
    assert!(supervisor.attempt() >= 3);
    assert!(wait_until(|| {
        fs::read_to_string(dir.join("launches.txt"))
            .map(|content| content.lines().count() >= 3)
            .unwrap_or(false)
    }));
}
