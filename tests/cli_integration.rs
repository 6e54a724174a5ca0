use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn cli(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("poe-code").unwrap();
    cmd.env("HOME", home);
    cmd.env_remove("POE_CODE_GLOBAL_SETTINGS");
    cmd
}

#[test]
fn configure_writes_the_agent_config_file() {
    let home = tempfile::tempdir().unwrap();
    cli(home.path())
        .args(["configure", "claude"])
        .assert()
        .success()
        .stdout(predicate::str::contains("changed=true"));

    let contents = fs::read_to_string(home.path().join(".claude.json")).unwrap();
    assert!(contents.contains("api.poe.com"));
}

#[test]
fn configure_dry_run_leaves_no_file_behind() {
    let home = tempfile::tempdir().unwrap();
    cli(home.path())
        .args(["configure", "codex", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"));

    assert!(!home.path().join(".codex/config.toml").exists());
}

#[test]
fn configure_then_unconfigure_round_trips() {
    let home = tempfile::tempdir().unwrap();
    cli(home.path()).args(["configure", "opencode"]).assert().success();
    cli(home.path()).args(["unconfigure", "opencode"]).assert().success();

    let contents = fs::read_to_string(home.path().join(".config/opencode/opencode.json")).unwrap();
    assert!(!contents.contains("api.poe.com"));
}

#[test]
fn configure_isolated_does_not_touch_the_natural_location() {
    let home = tempfile::tempdir().unwrap();
    cli(home.path())
        .args(["configure", "codex", "--isolated"])
        .assert()
        .success();

    assert!(!home.path().join(".codex/config.toml").exists());
    assert!(home.path().join(".poe-code/codex/config.toml").exists());
}

#[test]
fn configure_rejects_an_unknown_agent() {
    let home = tempfile::tempdir().unwrap();
    cli(home.path())
        .args(["configure", "not-a-real-agent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported agent"));
}

#[test]
fn cache_stats_reports_the_configured_cache_dir() {
    let home = tempfile::tempdir().unwrap();
    cli(home.path())
        .args(["cache", "claude", "models", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("memory_cache_max"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    cli(home.path()).assert().failure();
}
