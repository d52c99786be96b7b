use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

const ORG_ID: &str = "00Dxx0000000000";

/// Return a `Command` for the `script-exec` binary, isolated from the
/// caller's org configuration.
fn script_exec(state_dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("script-exec");
    cmd.env("SF_STATE_DIR", state_dir)
        .env_remove("SF_TARGET_ORG")
        .env_remove("SF_ORG_API_VERSION")
        .env_remove("SCRIPT_EXEC_LOG");
    cmd
}

/// Create an auth store holding one org, `test@example.com`, aliased `test-org`.
fn auth_store() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("test@example.com.json"),
        format!(
            r#"{{
                "username": "test@example.com",
                "orgId": "{ORG_ID}",
                "instanceUrl": "https://test.my.salesforce.com",
                "accessToken": "00Dxx!token",
                "instanceApiVersion": "61.0"
            }}"#
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join("alias.json"),
        r#"{"orgs": {"test-org": "test@example.com"}}"#,
    )
    .unwrap();
    dir
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

// ── Global flags ────────────────────────────────────────────────────

#[test]
fn help_flag() {
    let store = auth_store();
    script_exec(store.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Execute a Rhai script"))
        .stdout(predicate::str::contains("--target-org"))
        .stdout(predicate::str::contains("--script-file"));
}

#[test]
fn version_flag() {
    let store = auth_store();
    script_exec(store.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn about_flag() {
    let store = auth_store();
    script_exec(store.path())
        .arg("--about")
        .assert()
        .success()
        .stdout(predicate::str::contains("script-exec:"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("licence:"));
}

#[test]
fn no_args_shows_usage() {
    let store = auth_store();
    script_exec(store.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

// ── Flag validation ─────────────────────────────────────────────────

#[test]
fn missing_script_file_is_a_parse_error() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/does_not_exist.rhai"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no file found"));
}

#[test]
fn missing_target_org_is_a_parse_error() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-f", "tests/fixtures/success.rhai"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--target-org"));
}

#[test]
fn malformed_api_version_is_a_parse_error() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/success.rhai", "-a", "sixty"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a valid API version"));
}

#[test]
fn target_org_from_environment() {
    let store = auth_store();
    script_exec(store.path())
        .env("SF_TARGET_ORG", "test-org")
        .args(["-f", "tests/fixtures/no_message.rhai"])
        .assert()
        .success()
        .stdout(predicate::str::contains(ORG_ID));
}

// ── Human output ────────────────────────────────────────────────────

#[test]
fn success_logs_summary_and_script_message() {
    let store = auth_store();
    script_exec(store.path())
        .args(["--target-org", "test-org", "--script-file", "tests/fixtures/success.rhai"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Successfully executed script 'tests/fixtures/success.rhai' against org '{ORG_ID}'."
        )))
        .stdout(predicate::str::contains(
            "Script message: Test script executed successfully",
        ));
}

#[test]
fn legacy_targetusername_flag() {
    let store = auth_store();
    script_exec(store.path())
        .args(["--targetusername", "test@example.com", "-f", "tests/fixtures/success.rhai"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully executed script"));
}

#[test]
fn reported_failure_exits_zero() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/reports_failure.rhai"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Script execution failed for 'tests/fixtures/reports_failure.rhai' against org '{ORG_ID}'."
        )))
        .stdout(predicate::str::contains("Script message: 3 records failed validation"));
}

#[test]
fn thrown_error_exits_zero() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/throws.rhai"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Failed to execute script 'tests/fixtures/throws.rhai' against org '{ORG_ID}'. Error: boom"
        )))
        .stdout(predicate::str::contains("Script message:").not());
}

#[test]
fn script_print_goes_to_stdout() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/prints.rhai"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from the script"))
        .stdout(predicate::str::contains(format!("running against {ORG_ID}")));
}

#[test]
fn import_resolves_relative_to_script() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/uses_import.rhai", "-a", "59.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Script message: api v59.0"));
}

// ── Fatal errors ────────────────────────────────────────────────────

#[test]
fn missing_execute_is_fatal() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/missing_execute.rhai"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "the script 'tests/fixtures/missing_execute.rhai' does not export an execute function",
        ));
}

#[test]
fn syntax_error_is_fatal() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/syntax_error.rhai"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "failed to load script 'tests/fixtures/syntax_error.rhai'",
        ));
}

#[test]
fn unknown_org_is_fatal() {
    let store = auth_store();
    script_exec(store.path())
        .args(["-o", "nobody", "-f", "tests/fixtures/success.rhai"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no authorization information found for nobody"));
}

#[test]
fn expired_org_is_fatal() {
    let store = tempdir().unwrap();
    fs::write(
        store.path().join("scratch@example.com.json"),
        r#"{"orgId":"00D1","instanceUrl":"https://s.example.com","accessToken":"t","expirationDate":"2001-01-01"}"#,
    )
    .unwrap();
    script_exec(store.path())
        .args(["-o", "scratch@example.com", "-f", "tests/fixtures/success.rhai"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("expired on 2001-01-01"));
}

#[test]
fn invalid_env_api_version_is_fatal() {
    let store = auth_store();
    script_exec(store.path())
        .env("SF_ORG_API_VERSION", "latest")
        .args(["-o", "test-org", "-f", "tests/fixtures/success.rhai"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SF_ORG_API_VERSION"));
}

// ── JSON output ─────────────────────────────────────────────────────

#[test]
fn json_success_result() {
    let store = auth_store();
    let v = json_output(script_exec(store.path()).args([
        "-o",
        "test-org",
        "-f",
        "tests/fixtures/success.rhai",
        "--json",
    ]));
    assert_eq!(v["status"], 0);
    assert_eq!(
        v["result"],
        serde_json::json!({
            "executedScript": "tests/fixtures/success.rhai",
            "targetOrg": ORG_ID,
            "success": true,
            "message": format!(
                "Successfully executed script 'tests/fixtures/success.rhai' against org '{ORG_ID}'."
            ),
            "scriptMessage": "Test script executed successfully",
        })
    );
}

#[test]
fn json_without_script_message_omits_key() {
    let store = auth_store();
    let v = json_output(script_exec(store.path()).args([
        "-o",
        "test-org",
        "-f",
        "tests/fixtures/no_message.rhai",
        "--json",
    ]));
    assert_eq!(v["result"]["success"], true);
    assert!(v["result"].get("scriptMessage").is_none());
}

#[test]
fn json_thrown_error_result() {
    let store = auth_store();
    let v = json_output(script_exec(store.path()).args([
        "-o",
        "test-org",
        "-f",
        "tests/fixtures/throws.rhai",
        "--json",
    ]));
    assert_eq!(v["result"]["success"], false);
    assert_eq!(
        v["result"]["message"],
        format!("Failed to execute script 'tests/fixtures/throws.rhai' against org '{ORG_ID}'. Error: boom")
    );
    assert!(v["result"].get("scriptMessage").is_none());
}

#[test]
fn json_suppresses_log_lines() {
    let store = auth_store();
    let output = script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/prints.rhai", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("hello from the script"));
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["result"]["executedScript"], "tests/fixtures/prints.rhai");
}

#[test]
fn json_fatal_error_envelope() {
    let store = auth_store();
    let output = script_exec(store.path())
        .args(["-o", "test-org", "-f", "tests/fixtures/missing_execute.rhai", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["status"], 1);
    assert_eq!(v["exitCode"], 1);
    assert_eq!(v["name"], "ScriptMissingExecuteError");
    assert!(v["message"]
        .as_str()
        .unwrap()
        .contains("tests/fixtures/missing_execute.rhai"));
}
