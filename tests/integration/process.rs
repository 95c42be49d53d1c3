#[path = "common/mod.rs"]
mod common;

use std::fs;

use common::{wait_until, write_script};
use shedguard::{
    error::SupervisorError,
    logs::Diagnostics,
    spawn::{MainProgram, ProcessProgram, Secret},
};
use tempfile::tempdir;

fn flags(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|token| token.to_string()).collect()
}

#[test]
fn main_program_receives_flags_secret_and_output_is_captured() {
    let temp = tempdir().unwrap();
    let dir = temp.path();
    let args_file = dir.join("args.txt");
    let secret_file = dir.join("secret.txt");

    let script = write_script(
        dir,
        "main.sh",
        &format!(
            r#"#!/bin/sh
printf '%s\n' "$@" > '{}'
read -r secret
printf '%s' "$secret" > '{}'
echo "booting daemons"
echo "panic: out of memory" >&2
exit 3
"#,
            args_file.display(),
            secret_file.display()
        ),
    );

    let diagnostics = Diagnostics::new(4096);
    let mut program = ProcessProgram::new(script, diagnostics.clone());
    program
        .start(
            &flags(&["-supervisor=false", "-daemons", "dnsd,httpd"]),
            &Secret::new("s3cret"),
        )
        .unwrap();

    assert_eq!(program.wait().unwrap(), "exit status 3");

    let args = fs::read_to_string(&args_file).unwrap();
    assert_eq!(args, "-supervisor=false\n-daemons\ndnsd,httpd\n");
    assert_eq!(fs::read_to_string(&secret_file).unwrap(), "s3cret");

    assert!(wait_until(|| diagnostics
        .stdout()
        .snapshot_lossy()
        .contains("booting daemons")));
    assert!(wait_until(|| diagnostics
        .stderr()
        .snapshot_lossy()
        .contains("panic: out of memory")));
}

#[test]
fn output_capture_keeps_only_latest_bytes() {
    let temp = tempdir().unwrap();
    let script = write_script(
        temp.path(),
        "chatty.sh",
        r#"#!/bin/sh
read -r _
i=0
while [ $i -lt 200 ]; do
  echo "line $i"
  i=$((i + 1))
done
echo "final line"
exit 1
"#,
    );

    let diagnostics = Diagnostics::new(64);
    let mut program = ProcessProgram::new(script, diagnostics.clone());
    program.start(&[], &Secret::default()).unwrap();
    assert_eq!(program.wait().unwrap(), "exit status 1");

    assert!(wait_until(|| diagnostics
        .stdout()
        .snapshot_lossy()
        .ends_with("final line\n")));
    assert!(diagnostics.stdout().snapshot().len() <= 64);
    assert!(!diagnostics.stdout().snapshot_lossy().contains("line 0\n"));
}

#[test]
fn signal_termination_is_described() {
    let temp = tempdir().unwrap();
    let script = write_script(
        temp.path(),
        "crash.sh",
        "#!/bin/sh\nread -r _\nkill -s KILL $$\n",
    );

    let mut program = ProcessProgram::new(script, Diagnostics::new(128));
    program.start(&[], &Secret::default()).unwrap();
    assert_eq!(program.wait().unwrap(), "terminated by signal SIGKILL");
}

#[test]
fn missing_program_fails_to_start() {
    let temp = tempdir().unwrap();
    let mut program = ProcessProgram::new(temp.path().join("absent"), Diagnostics::new(128));

    let err = program.start(&[], &Secret::default()).unwrap_err();
    assert!(matches!(err, SupervisorError::SpawnError { .. }));
    assert!(matches!(program.wait(), Err(SupervisorError::NotRunning)));
}
