// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Integration tests for the versionyard CLI commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A repository yard with a base directory, a deployment directory and a preferences file
struct Yard {
    dir: TempDir,
}

impl Yard {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("ampt")).unwrap();
        fs::create_dir_all(dir.path().join("opt")).unwrap();
        Self { dir }
    }

    fn base(&self) -> PathBuf {
        self.dir.path().join("ampt")
    }

    fn deploy(&self) -> PathBuf {
        self.dir.path().join("opt")
    }

    fn prefs(&self) -> PathBuf {
        self.dir.path().join("preferences.toml")
    }

    fn repo(&self, name: &str, version: &str) -> &Self {
        let dir = self.base().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), format!(r#"{{"version": "{version}"}}"#)).unwrap();
        self
    }

    fn deployed(&self, file: &str) -> &Self {
        fs::write(self.deploy().join(file), b"war").unwrap();
        self
    }

    /// versionyard with an isolated preferences file
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("versionyard").unwrap();
        cmd.env("VERSIONYARD_CONFIG", self.prefs())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_scan_lists_versions_and_mismatches() {
    let yard = Yard::new();
    yard.repo("opt-orgchart", "3.4.0")
        .repo("opt-billing", "1.2.0")
        .deployed("ampt-orgchart-3.3.0.war")
        .deployed("ampt-billing-1.2.0.war");

    yard.cmd()
        .args(["scan", &arg(&yard.base()), "--deploy", &arg(&yard.deploy())])
        .assert()
        .success()
        .stdout(predicate::str::contains("opt-orgchart  3.4.0"))
        .stdout(predicate::str::contains("Found 2 repositories, 0 selected"))
        .stdout(predicate::str::contains("1 deployed version(s) differ"));
}

#[test]
fn test_scan_persists_paths() {
    let yard = Yard::new();
    yard.repo("opt-a", "1.0");

    yard.cmd()
        .args(["scan", &arg(&yard.base()), "--deploy", &arg(&yard.deploy())])
        .assert()
        .success();

    yard.cmd()
        .args(["config", "repository_path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(arg(&yard.base())));

    yard.cmd()
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("opt-a"));
}

#[test]
fn test_scan_filter_from_stdin_json() {
    let yard = Yard::new();
    yard.repo("opt-orgchart", "3.4.0").repo("opt-billing", "1.2.0");

    let output = yard
        .cmd()
        .args([
            "--json",
            "scan",
            &arg(&yard.base()),
            "--deploy",
            &arg(&yard.deploy()),
            "--filter",
            "-",
        ])
        .write_stdin("orgchart\t3.5.0\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "opt-orgchart");
    assert_eq!(rows[0]["targeted_version"], "3.5.0");
    assert_eq!(rows[0]["mismatch"], false);
    assert!(rows[0]["id"].as_str().unwrap().starts_with("repo:"));
}

#[test]
fn test_scan_mismatches_only() {
    let yard = Yard::new();
    yard.repo("opt-a", "1.0")
        .repo("opt-b", "2.0")
        .deployed("ampt-a-1.0.war")
        .deployed("ampt-b-1.9.war");

    yard.cmd()
        .args([
            "scan",
            &arg(&yard.base()),
            "--deploy",
            &arg(&yard.deploy()),
            "--mismatches-only",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("opt-b"))
        .stdout(predicate::str::contains("opt-a  ").not());
}

#[test]
fn test_scan_missing_base_fails() {
    let yard = Yard::new();

    yard.cmd()
        .args(["scan", &arg(&yard.dir.path().join("nope"))])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Base path does not exist"));
}

#[test]
fn test_scan_reports_unreadable_deployment() {
    let yard = Yard::new();
    yard.repo("opt-a", "1.0").deployed("ampt-a-1.0.war");
    fs::write(yard.prefs(), "[naming]\nextension = \"[\"\n").unwrap();

    yard.cmd()
        .args(["scan", &arg(&yard.base()), "--deploy", &arg(&yard.deploy())])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 repositories"))
        .stderr(predicate::str::contains("warning: Could not read the deployment directory"));
}

#[test]
fn test_deployed_lists_index() {
    let yard = Yard::new();
    yard.deployed("ampt-orgchart-3.4.0.war")
        .deployed("opt-soa-5.0.war")
        .deployed("readme.txt");

    yard.cmd()
        .args(["deployed", &arg(&yard.deploy())])
        .assert()
        .success()
        .stdout(predicate::str::contains("orgchart"))
        .stdout(predicate::str::contains("soa"))
        .stdout(predicate::str::contains("5.0"))
        .stdout(predicate::str::contains("readme").not());
}

#[test]
fn test_build_unknown_repository_fails() {
    let yard = Yard::new();
    yard.repo("opt-a", "1.0");

    yard.cmd()
        .args(["build", "opt-missing", &arg(&yard.base()), "--deploy", &arg(&yard.deploy())])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown repository: opt-missing"));
}

#[test]
fn test_build_requires_git_repository() {
    let yard = Yard::new();
    yard.repo("opt-a", "1.0");

    yard.cmd()
        .args(["build", "opt-a", &arg(&yard.base()), "--deploy", &arg(&yard.deploy())])
        .assert()
        .failure()
        .stdout(predicate::str::contains("==> verify"))
        .stderr(predicate::str::contains("Not a git repository"));
}

#[test]
fn test_config_set_get_and_blank() {
    let yard = Yard::new();

    yard.cmd()
        .args(["config", "build.branch", "  release  "])
        .assert()
        .success()
        .stdout(predicate::str::contains("build.branch = release"));

    yard.cmd()
        .args(["config", "build.branch"])
        .assert()
        .success()
        .stdout(predicate::str::diff("release\n"));

    yard.cmd()
        .args(["config", "deployment_path", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be blank"));

    yard.cmd()
        .args(["config", "colour"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_completions() {
    Command::cargo_bin("versionyard")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("versionyard"));
}
