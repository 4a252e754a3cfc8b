// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Versionyard library - reconcile repository, targeted and deployed versions
//!
//! This crate discovers repositories under a base directory, extracts their
//! declared versions, matches them against a pasted version manifest and
//! against the artifacts sitting in a deployment directory, and can build and
//! deploy a single repository through a staged pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod artifact;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod pipeline;
pub mod reconcile;
pub mod session;
pub mod tui;

/// Core data types shared by every component
pub mod types {
    use serde::{Deserialize, Serialize};
    use sha2::{Digest, Sha256};
    use std::cmp::Ordering;
    use std::hash::{Hash, Hasher};
    use std::path::{Path, PathBuf};

    // =========================================================================
    // Repository
    // =========================================================================

    /// One discovered top-level directory under the base path.
    ///
    /// Identity is `(name, path)`: two entries with the same pair compare equal
    /// no matter what their version or selection fields hold.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Repository {
        name: String,
        path: PathBuf,
        selected: bool,
        repo_version: String,
        targeted_version: String,
        deployment_version: String,
    }

    impl Repository {
        /// Create a repository with empty version fields and no selection
        #[must_use]
        pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
            Self {
                name: name.into(),
                path: path.into(),
                selected: false,
                repo_version: String::new(),
                targeted_version: String::new(),
                deployment_version: String::new(),
            }
        }

        /// Directory base name, case preserved
        #[must_use]
        pub fn name(&self) -> &str {
            &self.name
        }

        /// Filesystem location
        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Whether the operator selected this repository
        #[must_use]
        pub fn is_selected(&self) -> bool {
            self.selected
        }

        /// Version declared in the repository's own metadata; empty if undetected
        #[must_use]
        pub fn repo_version(&self) -> &str {
            &self.repo_version
        }

        /// Version requested by the filter manifest; empty if nothing matched
        #[must_use]
        pub fn targeted_version(&self) -> &str {
            &self.targeted_version
        }

        /// Version inferred from the deployment directory; empty if not deployed
        #[must_use]
        pub fn deployment_version(&self) -> &str {
            &self.deployment_version
        }

        /// Set the selection flag
        pub fn set_selected(&mut self, selected: bool) {
            self.selected = selected;
        }

        /// Set the declared version
        pub fn set_repo_version(&mut self, version: impl Into<String>) {
            self.repo_version = version.into();
        }

        /// Set the targeted version
        pub fn set_targeted_version(&mut self, version: impl Into<String>) {
            self.targeted_version = version.into();
        }

        /// Set the deployed version
        pub fn set_deployment_version(&mut self, version: impl Into<String>) {
            self.deployment_version = version.into();
        }

        /// Deterministic identifier derived from `(name, path)`
        #[must_use]
        pub fn id(&self) -> String {
            let mut hasher = Sha256::new();
            hasher.update(self.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(self.path.to_string_lossy().as_bytes());
            let hash = hex::encode(hasher.finalize());
            format!("repo:{}", &hash[..12])
        }

        /// Whether the deployed version disagrees with the declared or targeted one.
        ///
        /// Plain string comparison: `1.0` and `1.0.0` are a mismatch.
        #[must_use]
        pub fn has_mismatch(&self) -> bool {
            let deployed = self.deployment_version.as_str();
            if deployed.trim().is_empty() {
                return false;
            }

            let differs = |other: &str| !other.trim().is_empty() && other != deployed;
            differs(&self.repo_version) || differs(&self.targeted_version)
        }

        /// Case-insensitive ordering by name, used for the catalog sort
        #[must_use]
        pub fn cmp_by_name(&self, other: &Self) -> Ordering {
            self.name.to_lowercase().cmp(&other.name.to_lowercase())
        }
    }

    impl PartialEq for Repository {
        fn eq(&self, other: &Self) -> bool {
            self.name == other.name && self.path == other.path
        }
    }

    impl Eq for Repository {}

    impl Hash for Repository {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.name.hash(state);
            self.path.hash(state);
        }
    }

    /// Free-function form of [`Repository::has_mismatch`]
    #[must_use]
    pub fn has_mismatch(repository: &Repository) -> bool {
        repository.has_mismatch()
    }

    // =========================================================================
    // Selection summary
    // =========================================================================

    /// Counts shown in the status line
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct CatalogSummary {
        /// Repositories in the catalog
        pub total: usize,
        /// Repositories passing the current filter
        pub visible: usize,
        /// Selected repositories (visible or not)
        pub selected: usize,
    }

    impl std::fmt::Display for CatalogSummary {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            if self.total == 0 {
                write!(f, "No repositories found")
            } else if self.visible == self.total {
                write!(f, "Found {} repositories, {} selected", self.total, self.selected)
            } else {
                write!(
                    f,
                    "Showing {} of {} repositories, {} selected",
                    self.visible, self.total, self.selected
                )
            }
        }
    }

    /// Tri-state of the "select all" toggle over the visible rows
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum HeaderState {
        /// No visible row selected (or nothing visible)
        Unchecked,
        /// Every visible row selected
        Checked,
        /// Some but not all visible rows selected
        Indeterminate,
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::types::*;
    pub use anyhow::{Context, Result};
}
