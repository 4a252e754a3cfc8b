// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Pasted version manifests and the repository filter they drive
//!
//! A manifest is free-form text, one `<name>` or `<name> <version>` per line,
//! typically copied out of a release page.

use crate::types::Repository;
use std::collections::HashMap;

/// Name fragments and their optional targeted versions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterManifest {
    /// Fragments in first-appearance order
    fragments: Vec<String>,
    /// Fragment to version; fragments without a version are absent
    versions: HashMap<String, String>,
}

impl FilterManifest {
    /// Parse pasted text.
    ///
    /// Lines are trimmed and split on whitespace runs; the first token is the
    /// lower-cased name fragment, the second (if any) the version, verbatim.
    /// A repeated fragment overwrites an earlier version; a bare repeat keeps it.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut manifest = Self::default();

        for line in raw.lines() {
            let mut tokens = line.split_whitespace();
            let Some(name) = tokens.next() else {
                continue;
            };
            let name = name.to_lowercase();

            if !manifest.fragments.contains(&name) {
                manifest.fragments.push(name.clone());
            }
            if let Some(version) = tokens.next() {
                manifest.versions.insert(name, version.to_string());
            }
        }

        manifest
    }

    /// True when the text held no fragments: show everything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of distinct fragments
    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Fragments in first-appearance order
    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(String::as_str)
    }

    /// Targeted version of a fragment, if the line carried one
    #[must_use]
    pub fn version(&self, fragment: &str) -> Option<&str> {
        self.versions.get(fragment).map(String::as_str)
    }

    /// First fragment that matches `repository_name` in either direction
    #[must_use]
    pub fn matching_fragment(&self, repository_name: &str) -> Option<&str> {
        let name = repository_name.to_lowercase();
        self.fragments()
            .find(|fragment| name.contains(fragment) || fragment.contains(name.as_str()))
    }
}

/// Apply `manifest` to `repositories`, returning the indices of visible entries.
///
/// Every targeted version is cleared first. An empty manifest shows every
/// repository; otherwise a repository is shown when a fragment matches its
/// name, and takes that fragment's version (empty when it had none). The
/// first matching fragment wins and output keeps the input order.
pub fn apply(repositories: &mut [Repository], manifest: &FilterManifest) -> Vec<usize> {
    for repository in repositories.iter_mut() {
        repository.set_targeted_version("");
    }

    if manifest.is_empty() {
        return (0..repositories.len()).collect();
    }

    let mut visible = Vec::new();
    for (index, repository) in repositories.iter_mut().enumerate() {
        let Some(fragment) = manifest.matching_fragment(repository.name()) else {
            continue;
        };
        let version = manifest.version(fragment).unwrap_or_default().to_string();
        repository.set_targeted_version(version);
        visible.push(index);
    }

    visible
}
