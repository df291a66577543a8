//! Drives the compiled `happl3` binary.
#![cfg(unix)]

use anyhow::Result;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn happl3_command(workdir: &Path) -> Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("happl3")?;
    cmd.current_dir(workdir)
        .env("XDG_CONFIG_HOME", workdir.join("config"))
        .env("HOME", workdir);
    Ok(cmd)
}

#[test]
fn no_plan_prints_usage_and_creates_nothing() -> Result<()> {
    let workdir = TempDir::new()?;

    happl3_command(workdir.path())?
        .assert()
        .success()
        .stdout(contains("PLAN_FILE"));

    assert_eq!(fs::read_dir(workdir.path())?.count(), 0);
    Ok(())
}

#[test]
fn missing_plan_is_an_error_without_side_effects() -> Result<()> {
    let workdir = TempDir::new()?;

    happl3_command(workdir.path())?
        .args(["missing.sh", "--run"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("missing.sh"));

    assert!(!workdir.path().join("missing.sh.index").exists());
    assert!(!workdir.path().join("missing.sh.log").exists());
    Ok(())
}

#[test]
fn run_executes_the_selection_and_records_it() -> Result<()> {
    let workdir = TempDir::new()?;
    fs::write(workdir.path().join("plan.sh"), "echo A\n\n# comment\necho B\n")?;

    happl3_command(workdir.path())?
        .args(["plan.sh", "--select", "all", "--run"])
        .assert()
        .success();

    let index = fs::read_to_string(workdir.path().join("plan.sh.index"))?;
    assert_eq!(index.matches("\"success\"").count(), 2);
    let log = fs::read_to_string(workdir.path().join("plan.sh.log"))?;
    assert!(log.contains("Loaded 3 commands from plan.sh"));
    assert_eq!(log.matches("✔ SUCCESS").count(), 2);
    Ok(())
}

#[test]
fn run_stops_on_the_first_failure() -> Result<()> {
    let workdir = TempDir::new()?;
    fs::write(
        workdir.path().join("plan.sh"),
        "echo A\nfalse\necho never\n",
    )?;

    happl3_command(workdir.path())?
        .args(["plan.sh", "custom.log", "--select", "pending", "--run"])
        .assert()
        .failure()
        .code(1);

    let log = fs::read_to_string(workdir.path().join("custom.log"))?;
    assert!(log.contains("✖ FAILED"));
    assert!(!log.contains("> echo never"));
    assert!(!workdir.path().join("plan.sh.log").exists());

    // Re-selecting the failures retries the failed row alone.
    happl3_command(workdir.path())?
        .args(["plan.sh", "custom.log", "--select", "failed", "--run"])
        .assert()
        .failure()
        .stdout(contains("1 command(s) executed, 1 failed."));
    Ok(())
}

#[test]
fn corrupt_index_aborts_a_non_interactive_run() -> Result<()> {
    let workdir = TempDir::new()?;
    fs::write(workdir.path().join("plan.sh"), "echo A\n")?;
    fs::write(workdir.path().join("plan.sh.index"), "{ broken")?;

    happl3_command(workdir.path())?
        .args(["plan.sh", "--run"])
        .assert()
        .failure()
        .stderr(contains("corrupt"));

    assert_eq!(
        fs::read_to_string(workdir.path().join("plan.sh.index"))?,
        "{ broken"
    );
    Ok(())
}
