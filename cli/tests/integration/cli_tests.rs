//! Integration tests for the sprout binary: argument handling, dry-run
//! output, and exit codes.

#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sprout() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sprout"));
    cmd.env("NO_COLOR", "1").env_remove("SPROUT_LOG");
    cmd
}

const LB_VARS: &str = r#"project = "p1"
zone = "z1"
instance_name = "vm-1"
template_image = "img-1"
instance_group = "grp-1"
"#;

/// Write `sprout.yaml` plus any var files into a fresh directory.
fn workspace(config: &str, files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).expect("write var file");
    }
    let path = dir.path().join("sprout.yaml");
    std::fs::write(&path, config).expect("write config");
    (dir, path)
}

fn config_arg(path: &Path) -> String {
    path.display().to_string()
}

// --- Usage ---

#[test]
fn test_missing_config_is_a_usage_error() {
    sprout()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn test_help_lists_flags() {
    sprout()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--var"));
}

#[test]
fn test_malformed_var_is_a_usage_error() {
    sprout()
        .args(["--config", "sprout.yaml", "--var", "novalue"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

// --- Dry-run ---

#[test]
fn test_dry_run_prints_first_command_only() {
    let (_dir, path) = workspace(
        "terraform_sets:\n  - name: lb-prod\n    state-file: tfstate-files/lb-prod.tfstate\n    var-file: lb-prod.tfvars\n    load-balanced: true\n  - name: development\n    state-file: tfstate-files/development.tfstate\n    var-file: development.tfvars\n",
        &[("lb-prod.tfvars", LB_VARS)],
    );

    sprout()
        .args(["--config", &config_arg(&path), "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::eq(
            "terraform destroy -auto-approve -var-file=lb-prod.tfvars -state=tfstate-files/lb-prod.tfstate\n",
        ));
}

#[test]
fn test_dry_run_includes_var_overrides_and_only() {
    let (_dir, path) = workspace(
        "tool: tofu\nterraform_sets:\n  - name: lb-prod\n    state-file: a.tfstate\n    var-file: lb-prod.tfvars\n    load-balanced: true\n  - name: development\n    state-file: d.tfstate\n    var-files: [common.tfvars, development.tfvars]\n",
        &[("lb-prod.tfvars", LB_VARS)],
    );

    sprout()
        .args([
            "--config",
            &config_arg(&path),
            "--dry-run",
            "--only",
            "development",
            "--var",
            "region=eu",
        ])
        .assert()
        .success()
        .stdout(predicate::eq(
            "tofu destroy -auto-approve -var-file=common.tfvars -var-file=development.tfvars -var=region=eu -state=d.tfstate\n",
        ));
}

#[test]
fn test_dry_run_plan_uses_plan_verb() {
    let (_dir, path) = workspace(
        "terraform_sets:\n  - name: development\n    state-file: d.tfstate\n    var-file: development.tfvars\n",
        &[],
    );

    sprout()
        .args(["--config", &config_arg(&path), "--dry-run", "--plan"])
        .assert()
        .success()
        .stdout(predicate::eq(
            "terraform plan -var-file=development.tfvars -state=d.tfstate\n",
        ));
}

// --- Configuration errors ---

#[test]
fn test_missing_swap_variable_aborts_before_any_unit() {
    let (_dir, path) = workspace(
        "terraform_sets:\n  - name: development\n    state-file: d.tfstate\n  - name: lb-prod\n    state-file: a.tfstate\n    var-file: lb-prod.tfvars\n    load-balanced: true\n",
        &[("lb-prod.tfvars", "project = \"p1\"\n")],
    );

    sprout()
        .args(["--config", &config_arg(&path), "--dry-run"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("missing required variable 'zone'"));
}

#[test]
fn test_unknown_only_unit_is_rejected() {
    let (_dir, path) = workspace(
        "terraform_sets:\n  - name: development\n    state-file: d.tfstate\n",
        &[],
    );

    sprout()
        .args(["--config", &config_arg(&path), "--only", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no terraform set named 'nope'"));
}

#[test]
fn test_unreadable_config_names_the_path() {
    sprout()
        .args(["--config", "/nonexistent/sprout.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("/nonexistent/sprout.yaml"));
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let (_dir, path) = workspace(
        "poll:\n  create_image: { timeout_secs: 900, interval_secs: 0 }\nterraform_sets:\n  - name: development\n    state-file: d.tfstate\n",
        &[],
    );

    sprout()
        .args(["--config", &config_arg(&path), "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("poll interval must be greater than zero"));
}

// --- Real runs with a stand-in tool ---

#[cfg(unix)]
#[test]
fn test_successful_tool_exits_zero() {
    let (_dir, path) = workspace(
        "tool: \"true\"\nterraform_sets:\n  - name: development\n    state-file: d.tfstate\n",
        &[],
    );

    sprout()
        .args(["--config", &config_arg(&path)])
        .assert()
        .success()
        .stdout(predicate::str::contains("development: provisioned"));
}

#[cfg(unix)]
#[test]
fn test_failing_tool_exits_one_and_runs_every_unit() {
    let (_dir, path) = workspace(
        "tool: \"false\"\nterraform_sets:\n  - name: first\n    state-file: a.tfstate\n  - name: second\n    state-file: b.tfstate\n",
        &[],
    );

    sprout()
        .args(["--config", &config_arg(&path)])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("first: "))
        .stderr(predicate::str::contains("second: "))
        .stderr(predicate::str::contains("2 of 2 units failed"));
}

#[cfg(unix)]
#[test]
fn test_quiet_suppresses_progress() {
    let (_dir, path) = workspace(
        "tool: \"true\"\nterraform_sets:\n  - name: development\n    state-file: d.tfstate\n",
        &[],
    );

    sprout()
        .args(["--config", &config_arg(&path), "-q"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
