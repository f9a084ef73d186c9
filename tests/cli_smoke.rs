//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn help_lists_volume_commands() {
    let mut cmd = cargo_bin_cmd!("qingvol");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("create").and(contains("delete")).and(contains("attach")));
}

#[test]
fn missing_credentials_fail_with_invalid_argument() {
    let mut cmd = cargo_bin_cmd!("qingvol");
    cmd.args(["delete", "--volume-id", "vol-1"])
        .env_remove("QINGVOL_ACCESS_KEY_ID")
        .env_remove("QINGVOL_SECRET_ACCESS_KEY")
        .env_remove("QINGVOL_CONFIG_PATH")
        .env("RUST_LOG", "off")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("INVALID_ARGUMENT"));
}

#[test]
fn unknown_mode_is_rejected_before_any_call() {
    let mut cmd = cargo_bin_cmd!("qingvol");
    cmd.args([
        "validate",
        "--volume-id",
        "vol-1",
        "--mode",
        "EVERYWHERE",
    ])
    .env("QINGVOL_ACCESS_KEY_ID", "AKIDEXAMPLE")
    .env("QINGVOL_SECRET_ACCESS_KEY", "secret-example")
    .env("QINGVOL_API_ENDPOINT", "http://127.0.0.1:9/")
    .env("RUST_LOG", "off")
    .assert()
    .failure()
    .stderr(contains("INVALID_ARGUMENT: unknown access mode"));
}
