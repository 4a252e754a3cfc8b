// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Session state owned by a single task
//!
//! Scans and builds run in the background and report back over a channel.
//! Their results only touch the catalog inside [`Session::apply`], which the
//! owning task calls; background work never mutates shared state directly.
//!
//! Must be driven from inside a tokio runtime.

use crate::catalog::{self, RepositoryCatalog};
use crate::config::Config;
use crate::error::{CatalogError, ConfigError, PipelineError, SelectionError};
use crate::pipeline::{BuildGuard, BuildPipeline, PipelineEvent, PipelineReport};
use crate::reconcile::ReconcileOutcome;
use crate::types::Repository;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Background results posted to the owning task
#[derive(Debug)]
pub enum SessionEvent {
    /// A scan completed
    ScanFinished {
        /// Scan request this answers
        generation: u64,
        /// Discovered repositories or the failure
        result: Result<Vec<Repository>, CatalogError>,
    },
    /// Progress from the running build
    Pipeline(PipelineEvent),
    /// The running build ended
    PipelineFinished(Result<PipelineReport, PipelineError>),
}

/// What applying an event changed
#[derive(Debug)]
pub enum SessionUpdate {
    /// The catalog holds a fresh scan
    Scanned {
        /// Repositories found
        count: usize,
        /// Deployment reconciliation that followed
        reconcile: ReconcileOutcome,
    },
    /// The newest scan failed and the catalog was emptied
    ScanFailed(CatalogError),
    /// An outdated scan result was dropped
    StaleScan,
    /// Build progress, passed through
    Pipeline(PipelineEvent),
    /// The build succeeded and deployed versions were refreshed
    BuildFinished(PipelineReport),
    /// The build failed
    BuildFailed(PipelineError),
}

/// Catalog, preferences and background work for one operator
#[derive(Debug)]
pub struct Session {
    config: Config,
    config_path: Option<PathBuf>,
    catalog: RepositoryCatalog,
    filter_text: String,
    guard: BuildGuard,
    generation: u64,
    sender: UnboundedSender<SessionEvent>,
    receiver: UnboundedReceiver<SessionEvent>,
}

impl Session {
    /// New session; preference changes are saved to `config_path` when given
    #[must_use]
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            catalog: RepositoryCatalog::new(config.naming.clone()),
            config,
            config_path,
            filter_text: String::new(),
            guard: BuildGuard::new(),
            generation: 0,
            sender,
            receiver,
        }
    }

    /// Current preferences
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The repository catalog
    #[must_use]
    pub fn catalog(&self) -> &RepositoryCatalog {
        &self.catalog
    }

    /// The repository catalog, for selection changes
    pub fn catalog_mut(&mut self) -> &mut RepositoryCatalog {
        &mut self.catalog
    }

    /// Raw filter text as last set
    #[must_use]
    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    /// Whether a build holds the guard
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.guard.is_running()
    }

    /// Generation of the newest scan request
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the filter text and recompute the visible view
    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.filter_text = text.into();
        self.catalog.apply_filter(&self.filter_text);
        debug!(fragments = self.catalog.manifest().len(), "Filter applied");
    }

    /// Change the repository base path and save it.
    ///
    /// Blank input is ignored and returns `false`. Callers rescan.
    ///
    /// # Errors
    ///
    /// Fails when saving the preferences fails.
    pub fn set_repository_path(&mut self, path: &str) -> Result<bool, ConfigError> {
        let path = path.trim();
        if path.is_empty() {
            return Ok(false);
        }
        self.config.repository_path = PathBuf::from(path);
        self.persist()?;
        Ok(true)
    }

    /// Change the deployment path, save it and reconcile against it.
    ///
    /// Blank input is ignored and returns `false`.
    ///
    /// # Errors
    ///
    /// Fails when saving the preferences fails.
    pub fn set_deployment_path(&mut self, path: &str) -> Result<bool, ConfigError> {
        let path = path.trim();
        if path.is_empty() {
            return Ok(false);
        }
        self.config.deployment_path = PathBuf::from(path);
        self.persist()?;
        self.catalog.reconcile(&self.config.deployment_path);
        Ok(true)
    }

    /// Change the extra repository location for this session only
    pub fn set_extra_repository_path(&mut self, path: &Path) {
        self.config.extra_repository_path = Some(path.to_path_buf());
    }

    fn persist(&self) -> Result<(), ConfigError> {
        match &self.config_path {
            Some(path) => self.config.save(path),
            None => Ok(()),
        }
    }

    /// Start a background scan; its result supersedes every earlier request
    pub fn request_scan(&mut self) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let base = self.config.repository_path.clone();
        let extra = self.config.extra_repository();
        let sender = self.sender.clone();

        info!(generation, path = %base.display(), "Scan requested");
        tokio::task::spawn_blocking(move || {
            let result = catalog::scan(&base, extra.as_ref());
            let _ = sender.send(SessionEvent::ScanFinished { generation, result });
        });
        generation
    }

    /// Name of the single selected repository
    ///
    /// # Errors
    ///
    /// [`SelectionError`] unless exactly one repository is selected.
    pub fn build_target(&self) -> Result<String, SelectionError> {
        self.catalog.single_selection().map(|r| r.name().to_string())
    }

    /// Pipeline configured from the current preferences
    #[must_use]
    pub fn pipeline(&self) -> BuildPipeline {
        BuildPipeline::new(
            self.config.build.clone(),
            self.config.naming.clone(),
            self.config.deployment_path.clone(),
        )
    }

    /// Start building `name` in the background.
    ///
    /// # Errors
    ///
    /// [`PipelineError::AlreadyRunning`] while another build holds the guard,
    /// [`PipelineError::UnknownRepository`] when `name` is not in the catalog.
    pub fn request_build(&mut self, name: &str) -> Result<(), PipelineError> {
        let permit = self.guard.try_acquire().ok_or(PipelineError::AlreadyRunning)?;
        let repository = self
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownRepository(name.to_string()))?;

        info!(repository = %repository.name(), "Build requested");
        let pipeline = self.pipeline();
        let sender = self.sender.clone();

        tokio::spawn(async move {
            let (events, mut progress) = mpsc::unbounded_channel();
            let forwarder = sender.clone();
            let forward = async move {
                while let Some(event) = progress.recv().await {
                    let _ = forwarder.send(SessionEvent::Pipeline(event));
                }
            };

            let (result, ()) = tokio::join!(pipeline.run(&repository, events), forward);
            drop(permit);
            let _ = sender.send(SessionEvent::PipelineFinished(result));
        });
        Ok(())
    }

    /// Apply a background result to the session state
    pub fn apply(&mut self, event: SessionEvent) -> SessionUpdate {
        match event {
            SessionEvent::ScanFinished { generation, .. } if generation != self.generation => {
                debug!(generation, current = self.generation, "Dropping stale scan result");
                SessionUpdate::StaleScan
            }
            SessionEvent::ScanFinished { result: Ok(repositories), .. } => {
                let count = repositories.len();
                self.catalog.replace(repositories);
                let reconcile = self.catalog.reconcile(&self.config.deployment_path);
                info!(count, "Catalog updated");
                SessionUpdate::Scanned { count, reconcile }
            }
            SessionEvent::ScanFinished { result: Err(e), .. } => {
                warn!(error = %e, "Scan failed");
                self.catalog.clear();
                SessionUpdate::ScanFailed(e)
            }
            SessionEvent::Pipeline(event) => SessionUpdate::Pipeline(event),
            SessionEvent::PipelineFinished(Ok(report)) => {
                self.catalog.reconcile(&self.config.deployment_path);
                SessionUpdate::BuildFinished(report)
            }
            SessionEvent::PipelineFinished(Err(e)) => SessionUpdate::BuildFailed(e),
        }
    }

    /// Wait for the next background result
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    /// Next background result, if one is waiting
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }

    /// Scan and wait until that scan has been applied
    pub async fn rescan(&mut self) -> SessionUpdate {
        let generation = self.request_scan();
        while let Some(event) = self.receiver.recv().await {
            let answers = matches!(
                &event,
                SessionEvent::ScanFinished { generation: g, .. } if *g == generation
            );
            let update = self.apply(event);
            if answers {
                return update;
            }
        }
        SessionUpdate::StaleScan
    }

    /// Build `name` and wait for the result, passing progress to `observer`
    ///
    /// # Errors
    ///
    /// Any [`PipelineError`] from starting or running the build.
    pub async fn build(
        &mut self,
        name: &str,
        mut observer: impl FnMut(&PipelineEvent),
    ) -> Result<PipelineReport, PipelineError> {
        self.request_build(name)?;
        while let Some(event) = self.receiver.recv().await {
            match self.apply(event) {
                SessionUpdate::Pipeline(event) => observer(&event),
                SessionUpdate::BuildFinished(report) => return Ok(report),
                SessionUpdate::BuildFailed(e) => return Err(e),
                _ => {}
            }
        }
        Err(PipelineError::Interrupted)
    }
}
