//! Process-level tests of the `jitprobe` binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn jitprobe() -> Command {
    Command::cargo_bin("jitprobe").unwrap()
}

#[test]
fn test_run_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();

    let output = jitprobe()
        .current_dir(dir.path())
        .arg(fixture("fake_sqlite.ll"))
        .output()
        .unwrap();

    assert!(output.status.success(), "status: {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Module generated"));
    assert!(stdout.contains("Time elapsed = "));
    assert!(stdout.contains("Opened Database Successfully!"));
    // The default database path is relative to the working directory.
    assert!(dir.path().join("example.db").exists());
}

#[test]
fn test_module_from_environment() {
    let dir = tempfile::tempdir().unwrap();

    let output = jitprobe()
        .current_dir(dir.path())
        .env("JITPROBE_MODULE", fixture("fake_sqlite.ll"))
        .args(["--wait", "spin", "--opt-level", "O3"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Wait polls = "));
}

#[test]
fn test_malformed_module_aborts() {
    let dir = tempfile::tempdir().unwrap();

    let output = jitprobe()
        .current_dir(dir.path())
        .arg(fixture("malformed.ll"))
        .args(["--label", "PROGNAME"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ERROR"));
    assert!(stdout.contains("PROGNAME: "));
    assert!(!stdout.contains("## Starting optimization"));
}

#[test]
fn test_missing_symbol_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();

    let output = jitprobe()
        .current_dir(dir.path())
        .arg(fixture("no_sqlite.ll"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Symbol not found: sqlite3_open"));
}

#[test]
fn test_invoke_flag() {
    let dir = tempfile::tempdir().unwrap();

    let output = jitprobe()
        .current_dir(dir.path())
        .arg(fixture("fake_sqlite.ll"))
        .args(["--invoke", "foo", "--invoke-arg", "-4"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Running foo(-4) = 16"));
}
