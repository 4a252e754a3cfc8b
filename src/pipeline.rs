// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Staged build-and-deploy pipeline for a single repository
//!
//! Stages run strictly in order. A failed stage ends the run; a warned stage
//! is recorded and the run continues. There is no retry and no rollback.

use crate::artifact::NamingConvention;
use crate::error::PipelineError;
use crate::types::Repository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

// =============================================================================
// Stages and events
// =============================================================================

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Repository directory opens as a git repository
    Verify,
    /// Switch to the build branch
    Checkout,
    /// Fetch and merge upstream changes
    Pull,
    /// Run the build command
    Build,
    /// Find the built artifacts
    LocateArtifact,
    /// Remove the repository's previously deployed artifacts
    CleanupOldArtifacts,
    /// Copy the new artifacts into the deployment directory
    CopyArtifact,
}

impl Stage {
    /// Every stage in execution order
    pub const ALL: [Self; 7] = [
        Self::Verify,
        Self::Checkout,
        Self::Pull,
        Self::Build,
        Self::LocateArtifact,
        Self::CleanupOldArtifacts,
        Self::CopyArtifact,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Verify => "verify",
            Self::Checkout => "checkout",
            Self::Pull => "pull",
            Self::Build => "build",
            Self::LocateArtifact => "locate artifact",
            Self::CleanupOldArtifacts => "cleanup old artifacts",
            Self::CopyArtifact => "copy artifact",
        };
        f.write_str(label)
    }
}

/// How a stage ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StageStatus {
    /// Completed normally
    Succeeded,
    /// Completed with a problem that does not stop the run
    Warned(String),
    /// Ended the run
    Failed(String),
}

/// Outcome of one stage
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    /// Which stage
    pub stage: Stage,
    /// How it ended
    pub status: StageStatus,
    /// When it started
    pub started_at: DateTime<Utc>,
    /// When it ended
    pub finished_at: DateTime<Utc>,
}

/// Progress notifications streamed while the pipeline runs
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A stage began
    StageStarted(Stage),
    /// A line of process output or a progress message
    Output {
        /// Stage that produced it
        stage: Stage,
        /// The line, without its terminator
        line: String,
    },
    /// A stage ended
    StageFinished(StageReport),
}

/// An artifact copied into the deployment directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedFile {
    /// Artifact file name
    pub file_name: String,
    /// Version taken from the file name; empty if none
    pub version: String,
    /// Destination path
    pub target: PathBuf,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Repository that was built
    pub repository: String,
    /// Every stage in order
    pub stages: Vec<StageReport>,
    /// Artifacts now in the deployment directory
    pub deployed: Vec<DeployedFile>,
    /// Previously deployed artifacts that were deleted
    pub removed: Vec<String>,
}

impl PipelineReport {
    /// Warnings raised by any stage
    pub fn warnings(&self) -> impl Iterator<Item = (Stage, &str)> {
        self.stages.iter().filter_map(|report| match &report.status {
            StageStatus::Warned(reason) => Some((report.stage, reason.as_str())),
            _ => None,
        })
    }
}

// =============================================================================
// Options
// =============================================================================

/// Build settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Branch checked out before building
    pub branch: String,
    /// Program and arguments run in the repository directory
    pub build_command: Vec<String>,
    /// File that must exist before the build runs
    pub required_manifest: Option<String>,
    /// Candidate build output directories; the first existing one is used
    pub artifact_dirs: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            branch: "master".into(),
            build_command: vec!["npm".into(), "run".into(), "build".into()],
            required_manifest: Some("package.json".into()),
            artifact_dirs: vec!["target".into(), "dist".into(), "build".into()],
        }
    }
}

// =============================================================================
// Single-flight guard
// =============================================================================

/// Allows at most one pipeline run at a time
#[derive(Debug, Clone, Default)]
pub struct BuildGuard {
    running: Arc<AtomicBool>,
}

impl BuildGuard {
    /// New guard with no run in progress
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard, or `None` when a run is already active
    #[must_use]
    pub fn try_acquire(&self) -> Option<BuildPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BuildPermit {
                running: Arc::clone(&self.running),
            })
    }

    /// Whether a run holds the guard
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of a run; releases the guard on drop
#[derive(Debug)]
pub struct BuildPermit {
    running: Arc<AtomicBool>,
}

impl Drop for BuildPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Builds one repository and deploys its artifacts
#[derive(Debug, Clone)]
pub struct BuildPipeline {
    options: BuildOptions,
    naming: NamingConvention,
    deployment_dir: PathBuf,
}

struct Recorder<'a> {
    events: &'a UnboundedSender<PipelineEvent>,
    stages: Vec<StageReport>,
}

impl<'a> Recorder<'a> {
    fn new(events: &'a UnboundedSender<PipelineEvent>) -> Self {
        Self {
            events,
            stages: Vec::with_capacity(Stage::ALL.len()),
        }
    }

    fn start(&self, stage: Stage) -> DateTime<Utc> {
        debug!(%stage, "Stage started");
        // A dropped receiver only means nobody is watching.
        let _ = self.events.send(PipelineEvent::StageStarted(stage));
        Utc::now()
    }

    fn say(&self, stage: Stage, line: impl Into<String>) {
        let _ = self.events.send(PipelineEvent::Output {
            stage,
            line: line.into(),
        });
    }

    fn finish(&mut self, stage: Stage, started_at: DateTime<Utc>, status: StageStatus) {
        match &status {
            StageStatus::Succeeded => info!(%stage, "Stage succeeded"),
            StageStatus::Warned(reason) => warn!(%stage, %reason, "Stage finished with warning"),
            StageStatus::Failed(reason) => warn!(%stage, %reason, "Stage failed"),
        }
        let report = StageReport {
            stage,
            status,
            started_at,
            finished_at: Utc::now(),
        };
        let _ = self.events.send(PipelineEvent::StageFinished(report.clone()));
        self.stages.push(report);
    }

    fn fail(&mut self, stage: Stage, started_at: DateTime<Utc>, reason: String) -> PipelineError {
        self.finish(stage, started_at, StageStatus::Failed(reason.clone()));
        PipelineError::StageFailed { stage, reason }
    }
}

impl BuildPipeline {
    /// Pipeline deploying into `deployment_dir`
    #[must_use]
    pub fn new(options: BuildOptions, naming: NamingConvention, deployment_dir: impl Into<PathBuf>) -> Self {
        Self {
            options,
            naming,
            deployment_dir: deployment_dir.into(),
        }
    }

    /// Build settings in use
    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Target deployment directory
    #[must_use]
    pub fn deployment_dir(&self) -> &Path {
        &self.deployment_dir
    }

    /// Run every stage for `repository`, streaming progress to `events`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::StageFailed`] naming the first stage that failed.
    pub async fn run(
        &self,
        repository: &Repository,
        events: UnboundedSender<PipelineEvent>,
    ) -> Result<PipelineReport, PipelineError> {
        info!(repository = %repository.name(), "Starting build pipeline");
        let mut rec = Recorder::new(&events);
        let repo_dir = repository.path();

        let started = rec.start(Stage::Verify);
        if let Err(reason) = verify_repository(repo_dir) {
            return Err(rec.fail(Stage::Verify, started, reason));
        }
        rec.finish(Stage::Verify, started, StageStatus::Succeeded);

        let started = rec.start(Stage::Checkout);
        let branch = self.options.branch.clone();
        rec.say(Stage::Checkout, format!("Checking out {branch} branch..."));
        let checkout = ["checkout".to_string(), branch];
        if let Err(reason) = run_process(&rec, Stage::Checkout, repo_dir, "git", &checkout).await {
            return Err(rec.fail(Stage::Checkout, started, reason));
        }
        rec.finish(Stage::Checkout, started, StageStatus::Succeeded);

        let started = rec.start(Stage::Pull);
        rec.say(Stage::Pull, "Pulling latest changes...");
        let status = match run_process(&rec, Stage::Pull, repo_dir, "git", &["pull".to_string()]).await {
            Ok(()) => StageStatus::Succeeded,
            Err(reason) => StageStatus::Warned(reason),
        };
        rec.finish(Stage::Pull, started, status);

        let started = rec.start(Stage::Build);
        if let Err(reason) = self.build(&rec, repo_dir).await {
            return Err(rec.fail(Stage::Build, started, reason));
        }
        rec.finish(Stage::Build, started, StageStatus::Succeeded);

        let started = rec.start(Stage::LocateArtifact);
        let artifacts = match self.locate(&rec, repo_dir) {
            Ok(artifacts) => artifacts,
            Err(reason) => return Err(rec.fail(Stage::LocateArtifact, started, reason)),
        };
        rec.finish(Stage::LocateArtifact, started, StageStatus::Succeeded);

        let started = rec.start(Stage::CleanupOldArtifacts);
        let keep: Vec<String> = artifacts.iter().filter_map(|p| file_name_of(p)).collect();
        let cleanup = cleanup_old_artifacts(&self.deployment_dir, repository.name(), &keep, &self.naming);
        for name in &cleanup.removed {
            rec.say(Stage::CleanupOldArtifacts, format!("Deleted old artifact: {name}"));
        }
        let status = if cleanup.failures.is_empty() {
            StageStatus::Succeeded
        } else {
            StageStatus::Warned(format!(
                "Failed to clean up existing artifacts: {}",
                cleanup.failures.join("; ")
            ))
        };
        rec.finish(Stage::CleanupOldArtifacts, started, status);

        let started = rec.start(Stage::CopyArtifact);
        let deployed = match copy_artifacts(&artifacts, &self.deployment_dir, &self.naming) {
            Ok(deployed) => deployed,
            Err(e) => return Err(rec.fail(Stage::CopyArtifact, started, format!("{e:#}"))),
        };
        for file in &deployed {
            rec.say(Stage::CopyArtifact, format!("Deployed {} to {}", file.file_name, file.target.display()));
        }
        rec.finish(Stage::CopyArtifact, started, StageStatus::Succeeded);

        info!(
            repository = %repository.name(),
            deployed = deployed.len(),
            removed = cleanup.removed.len(),
            "Build pipeline finished"
        );
        Ok(PipelineReport {
            repository: repository.name().to_string(),
            stages: rec.stages,
            deployed,
            removed: cleanup.removed,
        })
    }

    async fn build(&self, rec: &Recorder<'_>, repo_dir: &Path) -> Result<(), String> {
        if let Some(manifest) = &self.options.required_manifest {
            if !repo_dir.join(manifest).is_file() {
                return Err(format!("{manifest} not found in repository"));
            }
        }

        let Some((program, args)) = self.options.build_command.split_first() else {
            return Err("No build command configured".into());
        };
        rec.say(Stage::Build, format!("Running {}...", self.options.build_command.join(" ")));

        if cfg!(windows) {
            let mut wrapped = vec!["/c".to_string()];
            wrapped.extend(self.options.build_command.iter().cloned());
            run_process(rec, Stage::Build, repo_dir, "cmd", &wrapped).await
        } else {
            run_process(rec, Stage::Build, repo_dir, program, args).await
        }
    }

    fn locate(&self, rec: &Recorder<'_>, repo_dir: &Path) -> Result<Vec<PathBuf>, String> {
        if !self.deployment_dir.is_dir() {
            return Err(format!(
                "Deployment directory does not exist: {}",
                self.deployment_dir.display()
            ));
        }

        let artifact_dir = find_artifact_dir(repo_dir, &self.options.artifact_dirs).ok_or_else(|| {
            format!(
                "No build output directory found (tried {})",
                self.options.artifact_dirs.join(", ")
            )
        })?;
        rec.say(
            Stage::LocateArtifact,
            format!("Looking for {} files in: {}", self.naming.glob(), artifact_dir.display()),
        );

        let artifacts = locate_artifacts(&artifact_dir, &self.naming).map_err(|e| format!("{e:#}"))?;
        if artifacts.is_empty() {
            return Err(format!("No {} files found in build output directory", self.naming.glob()));
        }
        Ok(artifacts)
    }
}

fn verify_repository(dir: &Path) -> Result<(), String> {
    if !dir.is_dir() {
        return Err(format!("Repository directory not found: {}", dir.display()));
    }
    gix::open(dir)
        .map(|_| ())
        .map_err(|e| format!("Not a git repository: {e}"))
}

async fn run_process(
    rec: &Recorder<'_>,
    stage: Stage,
    dir: &Path,
    program: &str,
    args: &[String],
) -> Result<(), String> {
    debug!(%stage, program, ?args, dir = %dir.display(), "Spawning process");
    let mut child = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to start {program}: {e}"))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (status, (), ()) = tokio::join!(
        child.wait(),
        forward_lines(stdout, stage, rec.events),
        forward_lines(stderr, stage, rec.events),
    );

    let status = status.map_err(|e| format!("Failed to wait for {program}: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        let code = status
            .code()
            .map_or_else(|| "a signal".to_string(), |c| format!("exit code {c}"));
        Err(format!("{program} {} failed with {code}", args.join(" ")))
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(
    reader: Option<R>,
    stage: Stage,
    events: &UnboundedSender<PipelineEvent>,
) {
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let _ = events.send(PipelineEvent::Output { stage, line });
            }
            Ok(None) => break,
            Err(e) => {
                debug!(%stage, error = %e, "Stopped reading process output");
                break;
            }
        }
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

// =============================================================================
// Deployment steps
// =============================================================================

/// First of `candidates` that exists as a directory under `repo_dir`
#[must_use]
pub fn find_artifact_dir(repo_dir: &Path, candidates: &[String]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|name| repo_dir.join(name))
        .find(|path| path.is_dir())
}

/// Artifact files directly inside `dir`, sorted by name
///
/// # Errors
///
/// Fails when `dir` cannot be listed or the extension makes an invalid glob.
pub fn locate_artifacts(dir: &Path, naming: &NamingConvention) -> anyhow::Result<Vec<PathBuf>> {
    let matcher = naming.glob_matcher()?;
    std::fs::read_dir(dir)?;

    let artifacts = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && matcher.is_match(entry.file_name()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    Ok(artifacts)
}

/// Result of removing previously deployed artifacts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// File names deleted
    pub removed: Vec<String>,
    /// Per-file or listing failures
    pub failures: Vec<String>,
}

/// Delete the artifacts of `repository` from `deployment_dir`.
///
/// Files named in `keep` are left alone so a same-name redeploy is a plain
/// replace.
pub fn cleanup_old_artifacts(
    deployment_dir: &Path,
    repository: &str,
    keep: &[String],
    naming: &NamingConvention,
) -> CleanupOutcome {
    let mut outcome = CleanupOutcome::default();

    let entries = match std::fs::read_dir(deployment_dir) {
        Ok(entries) => entries,
        Err(e) => {
            outcome.failures.push(format!("{}: {e}", deployment_dir.display()));
            return outcome;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();

    for path in candidates {
        let Some(name) = file_name_of(&path) else {
            continue;
        };
        if keep.iter().any(|k| k == &name) || !naming.matches(&name, repository) {
            continue;
        }

        let old_version = naming.extract_version(&name);
        debug!(file = %name, version = %old_version, "Deleting old artifact");
        match std::fs::remove_file(&path) {
            Ok(()) => outcome.removed.push(name),
            Err(e) => {
                warn!(file = %name, error = %e, "Failed to delete old artifact");
                outcome.failures.push(format!("{name}: {e}"));
            }
        }
    }

    outcome
}

/// Copy `artifacts` into `deployment_dir`, replacing same-name files
///
/// # Errors
///
/// Fails on the first artifact that cannot be copied.
pub fn copy_artifacts(
    artifacts: &[PathBuf],
    deployment_dir: &Path,
    naming: &NamingConvention,
) -> anyhow::Result<Vec<DeployedFile>> {
    use anyhow::Context;

    let mut deployed = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let file_name = file_name_of(artifact)
            .with_context(|| format!("Artifact has no file name: {}", artifact.display()))?;
        let target = deployment_dir.join(&file_name);
        std::fs::copy(artifact, &target)
            .with_context(|| format!("Failed to copy {} to {}", artifact.display(), target.display()))?;

        deployed.push(DeployedFile {
            version: naming.extract_version(&file_name),
            file_name,
            target,
        });
    }
    Ok(deployed)
}
