// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Declared-version detection from project metadata files
//!
//! Absence of version metadata is an expected outcome, so nothing here returns
//! an error: an empty string means "undetected".

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

static PACKAGE_JSON_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""version"\s*:\s*"([^"]+)""#).expect("valid regex"));

static POM_XML_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<version>([^<]+)</version>").expect("valid regex"));

static BUILD_GRADLE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"version\s*[=:]\s*['"]([^'"]+)['"]"#).expect("valid regex"));

static MARKER_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)version[=:\s]+([0-9]+(?:\.[0-9]+)*(?:-[a-z0-9]+)?)").expect("valid regex")
});

/// Files checked, in order, for a loose `version=<value>` marker.
pub const VERSION_MARKER_FILES: &[&str] = &["version.properties", "version.txt", "VERSION", ".version"];

/// Project metadata formats, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    /// npm `package.json`
    PackageJson,
    /// Maven `pom.xml`
    PomXml,
    /// Gradle `build.gradle`
    BuildGradle,
}

impl MetadataFormat {
    /// All formats in the order they are tried
    pub const ALL: [Self; 3] = [Self::PackageJson, Self::PomXml, Self::BuildGradle];

    /// File name looked up inside the repository directory
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::PackageJson => "package.json",
            Self::PomXml => "pom.xml",
            Self::BuildGradle => "build.gradle",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::PackageJson => &PACKAGE_JSON_VERSION,
            Self::PomXml => &POM_XML_VERSION,
            Self::BuildGradle => &BUILD_GRADLE_VERSION,
        }
    }

    /// First version captured from `content`, in file order
    #[must_use]
    pub fn capture(self, content: &str) -> Option<String> {
        self.pattern()
            .captures(content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Extract the declared version of the repository at `dir`.
///
/// The first format whose file exists and yields a match wins; within a file
/// the first match wins, so a Maven parent `<version>` shadows the project's
/// own one.
#[must_use]
pub fn extract(dir: &Path) -> String {
    for format in MetadataFormat::ALL {
        let file = dir.join(format.file_name());
        if !file.is_file() {
            continue;
        }

        match fs::read_to_string(&file) {
            Ok(content) => {
                if let Some(version) = format.capture(&content) {
                    return version;
                }
            }
            Err(e) => {
                debug!(path = %file.display(), error = %e, "Unreadable metadata file");
            }
        }
    }

    String::new()
}

/// Extract the version of the extra repository, which may be laid out differently.
///
/// Tries the directory itself, then each immediate subdirectory in name order,
/// then the loose version marker files.
#[must_use]
pub fn extract_nested(dir: &Path) -> String {
    let version = extract(dir);
    if !version.is_empty() {
        return version;
    }

    let subdirs = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir());

    for entry in subdirs {
        let version = extract(entry.path());
        if !version.is_empty() {
            debug!(subdir = %entry.path().display(), %version, "Found version in subdirectory");
            return version;
        }
    }

    extract_from_markers(dir)
}

/// Look for `version[=: ]<value>` in the marker files directly inside `dir`.
#[must_use]
pub fn extract_from_markers(dir: &Path) -> String {
    for name in VERSION_MARKER_FILES {
        let file = dir.join(name);
        if !file.is_file() {
            continue;
        }

        let Ok(content) = fs::read_to_string(&file) else {
            debug!(path = %file.display(), "Unreadable version marker");
            continue;
        };

        if let Some(m) = MARKER_VERSION.captures(&content).and_then(|caps| caps.get(1)) {
            return m.as_str().to_string();
        }
    }

    String::new()
}
