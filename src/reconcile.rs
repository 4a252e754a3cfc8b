// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Deployed-version reconciliation from artifact filenames
//!
//! Reconciliation never fails: an unreadable deployment directory is logged
//! and simply means "no deployment information".

use crate::artifact::NamingConvention;
use crate::types::Repository;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// An artifact found in the deployment directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedArtifact {
    /// Index key (`orgchart`)
    pub key: String,
    /// Version from the filename
    pub version: String,
    /// Artifact file name
    pub file_name: String,
}

/// Deployed versions keyed by artifact key, rebuilt on every scan
#[derive(Debug, Clone, Default)]
pub struct DeployedVersionIndex {
    artifacts: HashMap<String, DeployedArtifact>,
    files: Vec<String>,
}

impl DeployedVersionIndex {
    /// List the artifacts directly inside `dir`.
    ///
    /// When two files share a key the later one in directory order wins;
    /// that order is filesystem-defined.
    ///
    /// # Errors
    ///
    /// Fails if `dir` cannot be listed or the extension makes an invalid glob.
    pub fn scan(dir: &Path, naming: &NamingConvention) -> anyhow::Result<Self> {
        let matcher = naming.glob_matcher()?;
        std::fs::read_dir(dir)?;

        let mut index = Self::default();
        let entries = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable deployment entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file());

        for entry in entries {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !matcher.is_match(&file_name) {
                continue;
            }
            index.files.push(file_name.clone());

            match naming.artifact_key(&file_name) {
                Some(name) => {
                    debug!(file = %file_name, key = %name.key, version = %name.version, "Detected deployment");
                    index.artifacts.insert(
                        name.key.clone(),
                        DeployedArtifact {
                            key: name.key,
                            version: name.version,
                            file_name,
                        },
                    );
                }
                None => debug!(file = %file_name, "Artifact does not match naming convention"),
            }
        }

        info!(files = index.files.len(), keys = index.artifacts.len(), "Indexed deployment directory");
        Ok(index)
    }

    /// Deployed version under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.artifacts.get(key).map(|a| a.version.as_str())
    }

    /// Artifacts sorted by key
    #[must_use]
    pub fn artifacts(&self) -> Vec<&DeployedArtifact> {
        let mut artifacts: Vec<_> = self.artifacts.values().collect();
        artifacts.sort_by(|a, b| a.key.cmp(&b.key));
        artifacts
    }

    /// Number of distinct keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// True when no artifact was recognised
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Artifact files seen, recognised or not
    #[must_use]
    pub fn files_seen(&self) -> usize {
        self.files.len()
    }

    /// Deployed version of `repository`.
    ///
    /// Ownership follows [`NamingConvention::owned_version`], the same rule
    /// cleanup deletes by. The later file in directory order wins.
    #[must_use]
    pub fn version_for(&self, repository: &str, naming: &NamingConvention) -> Option<String> {
        self.files
            .iter()
            .rev()
            .find_map(|file| naming.owned_version(file, repository))
    }
}

/// What a reconcile pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The deployment path was missing or not a directory; nothing touched
    Skipped,
    /// Listing failed after versions were cleared
    Failed,
    /// Versions were refreshed
    Applied {
        /// Artifact files seen
        artifacts: usize,
        /// Repositories that received a deployed version
        matched: usize,
    },
}

impl ReconcileOutcome {
    /// User-facing notice for outcomes worth reporting
    #[must_use]
    pub fn notice(self) -> Option<&'static str> {
        match self {
            Self::Failed => Some("Could not read the deployment directory"),
            Self::Skipped | Self::Applied { .. } => None,
        }
    }
}

/// Refresh every repository's deployed version from `deployment_path`.
///
/// A missing or non-directory path leaves the fields untouched. Otherwise
/// all deployed versions are cleared before the directory is read.
pub fn reconcile(
    repositories: &mut [Repository],
    deployment_path: &Path,
    naming: &NamingConvention,
) -> ReconcileOutcome {
    if !deployment_path.is_dir() {
        debug!(path = %deployment_path.display(), "No deployment directory, skipping reconcile");
        return ReconcileOutcome::Skipped;
    }

    for repository in repositories.iter_mut() {
        repository.set_deployment_version("");
    }

    let index = match DeployedVersionIndex::scan(deployment_path, naming) {
        Ok(index) => index,
        Err(e) => {
            error!(path = %deployment_path.display(), error = %e, "Error updating deployment versions");
            return ReconcileOutcome::Failed;
        }
    };

    let mut matched = 0;
    for repository in repositories.iter_mut() {
        if let Some(version) = index.version_for(repository.name(), naming) {
            repository.set_deployment_version(&version);
            matched += 1;
        }
    }

    info!(
        matched,
        artifacts = index.files_seen(),
        "Updated deployment versions"
    );
    ReconcileOutcome::Applied {
        artifacts: index.files_seen(),
        matched,
    }
}
