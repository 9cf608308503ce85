use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

/// `idsync` with an empty environment.
fn idsync_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("idsync"));
    cmd.env_clear();
    cmd
}

/// Complete configuration pointing at ports nothing listens on.
fn unreachable_env(cmd: &mut Command) -> &mut Command {
    cmd.env("SYNC_INTERVAL_SECONDS", "60")
        .env("SYNC_HTTP_TIMEOUT_SECONDS", "2")
        .env("KEYCLOAK_URL", "http://127.0.0.1:1")
        .env("KEYCLOAK_REALM", "master")
        .env("KEYCLOAK_USERNAME", "admin")
        .env("KEYCLOAK_PASSWORD", "hunter2")
        .env("GITEA_URL", "http://127.0.0.1:1")
        .env("GITEA_API_KEY", "token-value")
}

#[test]
fn missing_interval_fails_before_any_pass() {
    idsync_cmd()
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("SYNC_INTERVAL_SECONDS"));
}

#[test]
fn daemon_is_the_default_and_validates_config() {
    idsync_cmd()
        .assert()
        .failure()
        .stderr(contains("invalid configuration"))
        .stderr(contains("SYNC_INTERVAL_SECONDS"));
}

#[test]
fn zero_interval_is_rejected() {
    idsync_cmd()
        .args(["daemon", "--json"])
        .env("SYNC_INTERVAL_SECONDS", "0")
        .assert()
        .failure()
        .stderr(contains("must be greater than zero"));
}

#[test]
fn missing_directory_url_is_named() {
    idsync_cmd()
        .arg("plan")
        .env("SYNC_INTERVAL_SECONDS", "30")
        .assert()
        .failure()
        .stderr(contains("KEYCLOAK_URL"));
}

#[test]
fn unreachable_directory_fails_the_pass_without_leaking_secrets() {
    unreachable_env(&mut idsync_cmd())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("reconciliation pass failed"))
        .stderr(contains("directory"))
        .stderr(contains("hunter2").not());
}

#[test]
fn help_lists_subcommands() {
    idsync_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("daemon"))
        .stdout(contains("sync"))
        .stdout(contains("plan"));
}
