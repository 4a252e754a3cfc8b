// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Build pipeline tests - deployment steps, single-flight guard, event stream

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::mpsc;
use versionyard::artifact::NamingConvention;
use versionyard::config::Config;
use versionyard::error::PipelineError;
use versionyard::pipeline::{
    cleanup_old_artifacts, copy_artifacts, locate_artifacts, BuildGuard, BuildOptions, BuildPipeline,
    PipelineEvent, Stage, StageStatus,
};
use versionyard::session::{Session, SessionUpdate};
use versionyard::types::Repository;

fn touch(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

// =============================================================================
// Deployment steps
// =============================================================================

#[test]
fn test_redeploy_replaces_old_version() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("target");
    let deploy = dir.path().join("opt");
    fs::create_dir_all(&output).unwrap();
    fs::create_dir_all(&deploy).unwrap();
    touch(&output, "ampt-orgchart-3.4.0.war", "new");
    touch(&deploy, "ampt-orgchart-3.3.0.war", "old");
    touch(&deploy, "AMPT-OrgChart-3.2.0.WAR", "older");
    touch(&deploy, "ampt-billing-1.0.war", "other");
    let naming = NamingConvention::default();

    let artifacts = locate_artifacts(&output, &naming).unwrap();
    let keep: Vec<String> = vec!["ampt-orgchart-3.4.0.war".into()];
    let cleanup = cleanup_old_artifacts(&deploy, "opt-orgchart", &keep, &naming);
    let deployed = copy_artifacts(&artifacts, &deploy, &naming).unwrap();

    assert_eq!(cleanup.removed, vec!["AMPT-OrgChart-3.2.0.WAR", "ampt-orgchart-3.3.0.war"]);
    assert_eq!(deployed.len(), 1);
    assert_eq!(deployed[0].version, "3.4.0");
    assert_eq!(fs::read_to_string(deploy.join("ampt-orgchart-3.4.0.war")).unwrap(), "new");
    assert!(deploy.join("ampt-billing-1.0.war").exists());
}

#[test]
fn test_same_name_redeploy_overwrites() {
    let dir = TempDir::new().unwrap();
    let deploy = dir.path().join("opt");
    fs::create_dir_all(&deploy).unwrap();
    touch(dir.path(), "opt-soa-2.0.war", "fresh");
    touch(&deploy, "opt-soa-2.0.war", "stale");
    let naming = NamingConvention::default();

    let cleanup = cleanup_old_artifacts(&deploy, "opt-soa", &["opt-soa-2.0.war".into()], &naming);
    copy_artifacts(&[dir.path().join("opt-soa-2.0.war")], &deploy, &naming).unwrap();

    assert!(cleanup.removed.is_empty());
    assert_eq!(fs::read_to_string(deploy.join("opt-soa-2.0.war")).unwrap(), "fresh");
}

#[test]
fn test_cleanup_missing_directory_reports_failure() {
    let dir = TempDir::new().unwrap();
    let outcome = cleanup_old_artifacts(
        &dir.path().join("absent"),
        "opt-a",
        &[],
        &NamingConvention::default(),
    );

    assert!(outcome.removed.is_empty());
    assert_eq!(outcome.failures.len(), 1);
}

// =============================================================================
// Guard
// =============================================================================

#[test]
fn test_guard_shared_between_clones() {
    let guard = BuildGuard::new();
    let other = guard.clone();

    let permit = other.try_acquire();
    assert!(permit.is_some());
    assert!(guard.try_acquire().is_none());

    drop(permit);
    assert!(guard.try_acquire().is_some());
}

// =============================================================================
// Pipeline runs
// =============================================================================

#[tokio::test]
async fn test_verify_failure_streams_events() {
    let dir = TempDir::new().unwrap();
    let repo_dir = dir.path().join("opt-a");
    fs::create_dir_all(&repo_dir).unwrap();
    let repository = Repository::new("opt-a", &repo_dir);

    let pipeline = BuildPipeline::new(BuildOptions::default(), NamingConvention::default(), dir.path());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = pipeline.run(&repository, tx).await;

    assert!(matches!(
        result,
        Err(PipelineError::StageFailed { stage: Stage::Verify, .. })
    ));

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert!(matches!(events.first(), Some(PipelineEvent::StageStarted(Stage::Verify))));
    match events.last() {
        Some(PipelineEvent::StageFinished(report)) => {
            assert_eq!(report.stage, Stage::Verify);
            assert!(matches!(report.status, StageStatus::Failed(_)));
            assert!(report.finished_at >= report.started_at);
        }
        other => panic!("unexpected last event: {other:?}"),
    }
}

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(["-c", "user.name=yard", "-c", "user.email=yard@example.org"])
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_full_run_deploys_and_replaces_old_artifact() {
    let dir = TempDir::new().unwrap();
    let repo_dir = dir.path().join("opt-a");
    let deploy = dir.path().join("opt");
    fs::create_dir_all(&repo_dir).unwrap();
    fs::create_dir_all(&deploy).unwrap();
    git(&repo_dir, &["init", "-q", "-b", "master"]);
    git(&repo_dir, &["commit", "-q", "--allow-empty", "-m", "initial"]);
    touch(&deploy, "ampt-a-1.0.war", "old");
    touch(&deploy, "ampt-b-1.0.war", "other");

    let options = BuildOptions {
        build_command: vec![
            "sh".into(),
            "-c".into(),
            "mkdir -p target && echo new > target/ampt-a-2.0.war".into(),
        ],
        required_manifest: None,
        ..BuildOptions::default()
    };
    let pipeline = BuildPipeline::new(options, NamingConvention::default(), &deploy);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = pipeline.run(&Repository::new("opt-a", &repo_dir), tx).await.unwrap();

    let statuses: Vec<(Stage, bool)> = report
        .stages
        .iter()
        .map(|r| (r.stage, matches!(r.status, StageStatus::Succeeded)))
        .collect();
    let stages: Vec<Stage> = statuses.iter().map(|(stage, _)| *stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());
    for (stage, succeeded) in &statuses {
        assert_eq!(*succeeded, *stage != Stage::Pull, "{stage}");
    }
    let warnings: Vec<_> = report.warnings().map(|(stage, _)| stage).collect();
    assert_eq!(warnings, vec![Stage::Pull]);

    assert_eq!(report.removed, vec!["ampt-a-1.0.war"]);
    assert_eq!(report.deployed.len(), 1);
    assert_eq!(report.deployed[0].file_name, "ampt-a-2.0.war");
    assert_eq!(report.deployed[0].version, "2.0");
    assert!(!deploy.join("ampt-a-1.0.war").exists());
    assert!(deploy.join("ampt-b-1.0.war").exists());
    assert_eq!(fs::read_to_string(deploy.join("ampt-a-2.0.war")).unwrap(), "new\n");

    let mut finished = Vec::new();
    while let Some(event) = rx.recv().await {
        if let PipelineEvent::StageFinished(report) = event {
            finished.push(report.stage);
        }
    }
    assert_eq!(finished, Stage::ALL.to_vec());
}

#[tokio::test]
async fn test_session_build_releases_guard_after_failure() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("ampt");
    fs::create_dir_all(base.join("opt-a")).unwrap();
    let config = Config {
        repository_path: base,
        deployment_path: dir.path().join("opt"),
        ..Config::default()
    };

    let mut session = Session::new(config, None);
    assert!(matches!(session.rescan().await, SessionUpdate::Scanned { count: 1, .. }));

    let mut seen = Vec::new();
    let first = session.build("opt-a", |event| seen.push(format!("{event:?}"))).await;
    assert!(first.is_err());
    assert!(!seen.is_empty());
    assert!(!session.is_building());

    let second = session.build("opt-a", |_| {}).await;
    assert!(matches!(
        second,
        Err(PipelineError::StageFailed { stage: Stage::Verify, .. })
    ));
}
