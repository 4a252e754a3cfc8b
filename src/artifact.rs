// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Artifact filename conventions
//!
//! Deployment artifacts are named `<artifact_prefix><suffix>-<version>.<ext>`
//! (e.g. `ampt-orgchart-3.4.0.war` for repository `opt-orgchart`),
//! `<suffix>-<version>.<ext>`, or after an alias (`opt-soa-<version>.war`).
//! All filename comparisons are ASCII case-insensitive.

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// `<key>-<version>`; the key is greedy so the version is the last segment
/// that starts with a digit and lets the rest match.
static KEY_AND_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z0-9-]+)-([0-9][a-z0-9.-]*)$").expect("valid regex")
});

static VERSION_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9][a-z0-9.-]*$").expect("valid regex"));

static TRAILING_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^.*-([0-9][a-z0-9.-]*)$").expect("valid regex"));

/// A repository whose artifacts use a fixed key instead of a derived suffix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactAlias {
    /// Repository name, also the artifact filename prefix (`opt-soa`)
    pub repository: String,
    /// Deployment index key (`soa`)
    pub key: String,
}

/// Naming rules linking repositories to deployment artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    /// Organisational prefix on repository names
    pub repository_prefix: String,
    /// Prefix on artifact filenames
    pub artifact_prefix: String,
    /// Artifact file extension, without the dot
    pub extension: String,
    /// Special-cased repositories
    pub aliases: Vec<ArtifactAlias>,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            repository_prefix: "opt-".into(),
            artifact_prefix: "ampt-".into(),
            extension: "war".into(),
            aliases: vec![ArtifactAlias {
                repository: "opt-soa".into(),
                key: "soa".into(),
            }],
        }
    }
}

/// A deployment artifact decoded from its filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactName {
    /// Lower-cased index key (`orgchart`)
    pub key: String,
    /// Version with the filename's original case (`3.4.0-SNAPSHOT`)
    pub version: String,
}

impl NamingConvention {
    /// Glob matching artifact files, e.g. `*.war`
    #[must_use]
    pub fn glob(&self) -> String {
        format!("*.{}", self.extension)
    }

    /// Case-insensitive matcher for [`Self::glob`]
    ///
    /// # Errors
    ///
    /// Fails when the configured extension makes an invalid glob.
    pub fn glob_matcher(&self) -> Result<GlobMatcher, globset::Error> {
        Ok(GlobBuilder::new(&self.glob())
            .case_insensitive(true)
            .literal_separator(true)
            .build()?
            .compile_matcher())
    }

    /// Whether `file_name` carries the artifact extension
    #[must_use]
    pub fn has_extension(&self, file_name: &str) -> bool {
        self.strip_extension(file_name).is_some()
    }

    fn strip_extension<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let suffix_len = self.extension.len() + 1;
        if file_name.len() <= suffix_len || !file_name.is_char_boundary(file_name.len() - suffix_len) {
            return None;
        }

        let (stem, ext) = file_name.split_at(file_name.len() - suffix_len);
        let dotted = format!(".{}", self.extension);
        ext.eq_ignore_ascii_case(&dotted).then_some(stem)
    }

    fn alias_for_repository(&self, lower_name: &str) -> Option<&ArtifactAlias> {
        self.aliases
            .iter()
            .find(|alias| alias.repository.eq_ignore_ascii_case(lower_name))
    }

    /// Filename prefixes that identify artifacts of `repository`
    ///
    /// Derived prefix, alias, bare index key, then the raw repository name.
    #[must_use]
    pub fn artifact_prefixes(&self, repository: &str) -> Vec<String> {
        let name = repository.to_ascii_lowercase();
        let mut candidates = Vec::with_capacity(4);

        if let Some(suffix) = name.strip_prefix(&self.repository_prefix.to_ascii_lowercase()) {
            candidates.push(format!("{}{suffix}-", self.artifact_prefix.to_ascii_lowercase()));
        }
        if let Some(alias) = self.alias_for_repository(&name) {
            candidates.push(format!("{}-", alias.repository.to_ascii_lowercase()));
        }
        candidates.push(format!("{}-", self.repository_key(&name)));
        candidates.push(format!("{name}-"));

        let mut prefixes: Vec<String> = Vec::with_capacity(candidates.len());
        for prefix in candidates {
            if !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }
        prefixes
    }

    /// Whether `file_name` is an artifact built from `repository`
    #[must_use]
    pub fn matches(&self, file_name: &str, repository: &str) -> bool {
        self.owned_version(file_name, repository).is_some()
    }

    /// Version of `file_name` when it is an artifact of `repository`.
    ///
    /// The name must be one of [`Self::artifact_prefixes`] followed directly
    /// by a version, so `ampt-org-chart-1.0.war` is not an artifact of `opt-org`.
    /// Cleanup and reconciliation both decide ownership here.
    #[must_use]
    pub fn owned_version(&self, file_name: &str, repository: &str) -> Option<String> {
        let stem = self.strip_extension(file_name)?;
        let lower = stem.to_ascii_lowercase();

        self.artifact_prefixes(repository).iter().find_map(|prefix| {
            if !lower.starts_with(prefix.as_str()) {
                return None;
            }
            let version = stem.get(prefix.len()..)?;
            VERSION_ONLY.is_match(version).then(|| version.to_string())
        })
    }

    /// Trailing version segment of an artifact filename, or empty
    #[must_use]
    pub fn extract_version(&self, file_name: &str) -> String {
        let stem = self
            .strip_extension(file_name)
            .or_else(|| file_name.rsplit_once('.').map(|(stem, _)| stem))
            .unwrap_or(file_name);

        TRAILING_VERSION
            .captures(stem)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    /// Decode the index key and version of a deployment artifact.
    ///
    /// Alias form first, then the prefixed form, then the bare form.
    #[must_use]
    pub fn artifact_key(&self, file_name: &str) -> Option<ArtifactName> {
        let stem = self.strip_extension(file_name)?;
        let lower = stem.to_ascii_lowercase();

        for alias in &self.aliases {
            let prefix = format!("{}-", alias.repository.to_ascii_lowercase());
            if lower.starts_with(&prefix) {
                let version = &stem[prefix.len()..];
                if VERSION_ONLY.is_match(version) {
                    return Some(ArtifactName {
                        key: alias.key.to_ascii_lowercase(),
                        version: version.to_string(),
                    });
                }
            }
        }

        let artifact_prefix = self.artifact_prefix.to_ascii_lowercase();
        if !artifact_prefix.is_empty() && lower.starts_with(&artifact_prefix) {
            return split_key_and_version(&stem[artifact_prefix.len()..]);
        }

        split_key_and_version(stem)
    }

    /// Index key a repository's deployment is recorded under
    #[must_use]
    pub fn repository_key(&self, repository: &str) -> String {
        let name = repository.to_ascii_lowercase();
        if let Some(alias) = self.alias_for_repository(&name) {
            return alias.key.to_ascii_lowercase();
        }
        let prefix = self.repository_prefix.to_ascii_lowercase();
        if let Some(suffix) = name.strip_prefix(prefix.as_str()) {
            if !suffix.is_empty() {
                return suffix.to_string();
            }
        }
        name
    }
}

fn split_key_and_version(rest: &str) -> Option<ArtifactName> {
    let caps = KEY_AND_VERSION.captures(rest)?;
    Some(ArtifactName {
        key: caps.get(1)?.as_str().to_ascii_lowercase(),
        version: caps.get(2)?.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convention() -> NamingConvention {
        NamingConvention::default()
    }

    #[test]
    fn test_matches_prefixed_artifact() {
        let naming = convention();
        assert!(naming.matches("ampt-orgchart-3.4.0.war", "opt-orgchart"));
        assert!(naming.matches("AMPT-OrgChart-3.4.0.WAR", "opt-orgchart"));
        assert!(!naming.matches("ampt-orgchart-3.4.0.jar", "opt-orgchart"));
        assert!(!naming.matches("ampt-billing-1.0.war", "opt-orgchart"));
        assert!(!naming.matches("ampt-orgchart.war", "opt-orgchart"));
    }

    #[test]
    fn test_matches_bare_suffix_form() {
        let naming = convention();
        assert!(naming.matches("orgchart-3.4.0.war", "opt-orgchart"));
        assert!(naming.matches("soa-5.0.war", "opt-soa"));
        assert_eq!(
            naming.owned_version("OrgChart-3.4.0-SNAPSHOT.war", "opt-orgchart").as_deref(),
            Some("3.4.0-SNAPSHOT")
        );
    }

    #[test]
    fn test_matches_requires_version_after_prefix() {
        let naming = convention();
        assert!(!naming.matches("ampt-org-chart-1.0.war", "opt-org"));
        assert!(naming.matches("ampt-org-chart-1.0.war", "opt-org-chart"));
        assert!(!naming.matches("opt-orgchart-latest.war", "opt-orgchart"));
        assert_eq!(naming.owned_version("ampt-org-chart-1.0.war", "opt-org"), None);
    }

    #[test]
    fn test_matches_raw_name_and_alias() {
        let naming = convention();
        assert!(naming.matches("opt-soa-2.1.war", "opt-soa"));
        assert!(naming.matches("reports-1.0.war", "reports"));
        assert!(naming.matches("Reports-1.0.war", "REPORTS"));
    }

    #[test]
    fn test_artifact_prefixes() {
        let naming = convention();
        assert_eq!(
            naming.artifact_prefixes("opt-orgchart"),
            vec![
                "ampt-orgchart-".to_string(),
                "orgchart-".to_string(),
                "opt-orgchart-".to_string()
            ]
        );
        assert_eq!(
            naming.artifact_prefixes("opt-soa"),
            vec![
                "ampt-soa-".to_string(),
                "opt-soa-".to_string(),
                "soa-".to_string()
            ]
        );
        assert_eq!(naming.artifact_prefixes("tools"), vec!["tools-".to_string()]);
    }

    #[test]
    fn test_extract_version() {
        let naming = convention();
        assert_eq!(naming.extract_version("ampt-orgchart-3.4.0.war"), "3.4.0");
        assert_eq!(naming.extract_version("ampt-orgchart-3.4.0-SNAPSHOT.war"), "3.4.0-SNAPSHOT");
        assert_eq!(naming.extract_version("opt-soa-12.war"), "12");
        assert_eq!(naming.extract_version("orgchart.war"), "");
        assert_eq!(naming.extract_version("ampt-orgchart-latest.war"), "");
    }

    #[test]
    fn test_extract_version_agrees_with_artifact_key() {
        let naming = convention();
        for file in ["ampt-x-3.4.0.RELEASE.war", "ampt-x-2.0-rc.1.war", "opt-soa-5.0b.war"] {
            let decoded = naming.artifact_key(file).unwrap();
            assert_eq!(naming.extract_version(file), decoded.version, "{file}");
        }
        assert_eq!(naming.extract_version("ampt-x-3.4.0.RELEASE.war"), "3.4.0.RELEASE");
    }

    #[test]
    fn test_artifact_key_prefixed() {
        let naming = convention();
        let name = naming.artifact_key("ampt-orgchart-3.4.0.war").unwrap();
        assert_eq!(name.key, "orgchart");
        assert_eq!(name.version, "3.4.0");

        let name = naming.artifact_key("ampt-org-chart-3.4.0-SNAPSHOT.war").unwrap();
        assert_eq!(name.key, "org-chart");
        assert_eq!(name.version, "3.4.0-SNAPSHOT");
    }

    #[test]
    fn test_artifact_key_alias_and_bare() {
        let naming = convention();
        let soa = naming.artifact_key("opt-soa-5.0.1.war").unwrap();
        assert_eq!(soa.key, "soa");
        assert_eq!(soa.version, "5.0.1");

        let bare = naming.artifact_key("reports-2.0.war").unwrap();
        assert_eq!(bare.key, "reports");
        assert_eq!(bare.version, "2.0");
    }

    #[test]
    fn test_artifact_key_rejects_non_artifacts() {
        let naming = convention();
        assert!(naming.artifact_key("ampt-orgchart.war").is_none());
        assert!(naming.artifact_key("ampt-orgchart-3.4.0.jar").is_none());
        assert!(naming.artifact_key("README").is_none());
    }

    #[test]
    fn test_repository_key() {
        let naming = convention();
        assert_eq!(naming.repository_key("opt-orgchart"), "orgchart");
        assert_eq!(naming.repository_key("OPT-Billing"), "billing");
        assert_eq!(naming.repository_key("opt-soa"), "soa");
        assert_eq!(naming.repository_key("reports"), "reports");
    }
}
