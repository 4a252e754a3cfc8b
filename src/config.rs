// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Preferences are layered: built-in defaults, then the TOML preferences file,
//! then `VERSIONYARD_*` environment variables (`__` separates nested keys).

use crate::artifact::NamingConvention;
use crate::catalog::ExtraRepository;
use crate::error::ConfigError;
use crate::pipeline::BuildOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the preferences file inside the platform config directory
pub const PREFERENCES_FILE: &str = "preferences.toml";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory whose children are the repositories
    pub repository_path: PathBuf,
    /// Directory holding deployed artifacts
    pub deployment_path: PathBuf,
    /// Location of the extra repository, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_repository_path: Option<PathBuf>,
    /// Name the extra repository is listed under
    pub extra_repository_name: String,
    /// Artifact naming rules
    pub naming: NamingConvention,
    /// Build pipeline settings
    pub build: BuildOptions,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository_path: default_location(r"C:\AMPT", "ampt"),
            deployment_path: default_location(r"C:\OPT", "opt"),
            extra_repository_path: None,
            extra_repository_name: "opt-soa".to_string(),
            naming: NamingConvention::default(),
            build: BuildOptions::default(),
            log_level: "info".to_string(),
        }
    }
}

fn default_location(windows: &str, home_relative: &str) -> PathBuf {
    if cfg!(windows) {
        return PathBuf::from(windows);
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(home_relative))
        .unwrap_or_else(|| PathBuf::from(home_relative))
}

/// Keys accepted by [`Config::get`] and [`Config::set`]
pub const KEYS: &[&str] = &[
    "repository_path",
    "deployment_path",
    "extra_repository_path",
    "extra_repository_name",
    "log_level",
    "build.branch",
    "build.build_command",
    "naming.repository_prefix",
    "naming.artifact_prefix",
    "naming.extension",
];

impl Config {
    /// Platform location of the preferences file
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "hyperpolymath", "versionyard")
            .map(|dirs| dirs.config_dir().join(PREFERENCES_FILE))
    }

    /// Load configuration from `path` (or the default location) and the environment.
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Fails when the file or an environment override cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(file) = &file {
            debug!(path = %file.display(), "Loading preferences");
            builder = builder.add_source(config::File::from(file.as_path()).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("VERSIONYARD")
                .prefix_separator("_")
                .separator("__"),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Write the preferences as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails when serialisation or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io)?;
        info!(path = %path.display(), "Saved preferences");
        Ok(())
    }

    /// The extra repository, when a path is configured
    #[must_use]
    pub fn extra_repository(&self) -> Option<ExtraRepository> {
        self.extra_repository_path.as_ref().map(|path| ExtraRepository {
            name: self.extra_repository_name.clone(),
            path: path.clone(),
        })
    }

    /// Read a value by key
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownKey`] for keys not in [`KEYS`].
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "repository_path" => self.repository_path.display().to_string(),
            "deployment_path" => self.deployment_path.display().to_string(),
            "extra_repository_path" => self
                .extra_repository_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "extra_repository_name" => self.extra_repository_name.clone(),
            "log_level" => self.log_level.clone(),
            "build.branch" => self.build.branch.clone(),
            "build.build_command" => self.build.build_command.join(" "),
            "naming.repository_prefix" => self.naming.repository_prefix.clone(),
            "naming.artifact_prefix" => self.naming.artifact_prefix.clone(),
            "naming.extension" => self.naming.extension.clone(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Set a value by key. Values are trimmed.
    ///
    /// An empty `extra_repository_path` clears it; other keys reject blanks.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownKey`] or [`ConfigError::Blank`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if key == "extra_repository_path" {
            self.extra_repository_path = (!value.is_empty()).then(|| PathBuf::from(value));
            return Ok(());
        }
        if !KEYS.contains(&key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        if value.is_empty() {
            return Err(ConfigError::Blank(key.to_string()));
        }

        match key {
            "repository_path" => self.repository_path = PathBuf::from(value),
            "deployment_path" => self.deployment_path = PathBuf::from(value),
            "extra_repository_name" => self.extra_repository_name = value.to_string(),
            "log_level" => self.log_level = value.to_string(),
            "build.branch" => self.build.branch = value.to_string(),
            "build.build_command" => {
                self.build.build_command = value.split_whitespace().map(str::to_string).collect();
            }
            "naming.repository_prefix" => self.naming.repository_prefix = value.to_string(),
            "naming.artifact_prefix" => self.naming.artifact_prefix = value.to_string(),
            "naming.extension" => self.naming.extension = value.trim_start_matches('.').to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}
