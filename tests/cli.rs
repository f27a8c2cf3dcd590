//! The `myshell` binary: one-line mode, script arguments and `.`.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::thread;
use std::time::{Duration, Instant};

fn myshell(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_myshell"))
        .args(args)
        .current_dir(cwd)
        .env("MYSHELL_HISTORY", cwd.join("history"))
        .env_remove("MYSHELL_LOG")
        .output()
        .expect("failed to start myshell")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn one_line_mode_exits_with_last_status() {
    let dir = tempfile::tempdir().unwrap();

    let output = myshell(&["-c", "mecho hi | wc -c"], dir.path());
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "3");

    let output = myshell(&["-c", "sh -c 'exit 9'"], dir.path());
    assert_eq!(output.status.code(), Some(9));

    let output = myshell(&["-c", "mexit -s 12"], dir.path());
    assert_eq!(output.status.code(), Some(12));
}

#[test]
fn errors_are_reported_with_their_status() {
    let dir = tempfile::tempdir().unwrap();

    let output = myshell(&["-c", "mecho --bogus"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr(&output), "Error: Unknown option '--bogus'\n");

    let output = myshell(&["-c", "mexit 1 2"], dir.path());
    assert_eq!(output.status.code(), Some(3));

    let output = myshell(&["-c", "mecho 'open"], dir.path());
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).starts_with("Error: Syntax error"));

    let output = myshell(&["-c", "no-such-command-zz"], dir.path());
    assert_eq!(output.status.code(), Some(127));
    assert!(stderr(&output).contains("no-such-command-zz: command not found"));
}

#[test]
fn scripts_run_in_order_and_share_state() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("first.sh"),
        "# set things up\nmexport GREETING=hello\nmcd sub\n",
    )
    .unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(
        dir.path().join("sub").join("second.sh"),
        "mecho $GREETING from $(mpwd)\nmpwd > where.txt\nmerrno\n",
    )
    .unwrap();

    // `mcd` in the first script moves the shell, so the second path is absolute
    let second = dir.path().join("sub").join("second.sh");
    let output = myshell(&["first.sh", second.to_str().unwrap()], dir.path());
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let sub = fs::canonicalize(dir.path().join("sub")).unwrap();
    assert_eq!(stdout(&output), "hello from $(mpwd)\n0\n");
    assert_eq!(
        fs::read_to_string(sub.join("where.txt")).unwrap(),
        format!("{}\n", sub.display())
    );
}

#[test]
fn sourcing_runs_scripts_in_the_current_shell() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("vars.sh"), "mexport NAME=world\n").unwrap();

    let output = myshell(&["-c", ". vars.sh"], dir.path());
    assert!(output.status.success());

    fs::write(
        dir.path().join("main.sh"),
        ". vars.sh\nmecho hello $NAME\n. missing.sh\nmerrno\n",
    )
    .unwrap();
    let output = myshell(&["main.sh"], dir.path());
    assert_eq!(stdout(&output), "hello world\n2\n");
    assert_eq!(stderr(&output), "Error: Cannot open file missing.sh\n");
}

#[test]
fn missing_script_argument_fails_with_status_two() {
    let dir = tempfile::tempdir().unwrap();
    let output = myshell(&["nope.sh"], dir.path());
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stderr(&output), "Error: Cannot open file nope.sh\n");
}

#[test]
fn background_lines_return_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bg.sh");
    fs::write(&script, "sleep 5 &\nmecho done\n").unwrap();

    let started = Instant::now();
    let output = myshell(&["bg.sh"], dir.path());
    assert_eq!(stdout(&output), "done\n");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn background_commands_without_redirection_are_detached() {
    let dir = tempfile::tempdir().unwrap();
    // an attached child would keep the output pipes open and show up here
    let output = myshell(
        &["-c", "sh -c 'sleep 0.2; echo leaked; echo leaked 1>&2' &"],
        dir.path(),
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "");
    assert_eq!(stderr(&output), "");
}

#[test]
fn background_commands_with_redirection_keep_their_target() {
    let dir = tempfile::tempdir().unwrap();
    let output = myshell(&["-c", "sh -c 'echo kept' > kept.txt &"], dir.path());
    assert!(output.status.success());
    assert_eq!(stdout(&output), "");

    let kept = dir.path().join("kept.txt");
    let deadline = Instant::now() + Duration::from_secs(5);
    while fs::read_to_string(&kept).unwrap_or_default() != "kept\n" && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(fs::read_to_string(&kept).unwrap(), "kept\n");
}
