// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error types for the library layer

use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while scanning the repository base directory.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The base path does not exist.
    #[error("Base path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    /// The base path exists but is not a directory.
    #[error("Base path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The base directory could not be listed.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// Directory that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised when an action needs exactly one selected repository.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// Nothing is selected.
    #[error("Please select at least one repository to build")]
    Empty,

    /// More than one repository is selected.
    #[error("Please select only one repository to build ({0} selected)")]
    Multiple(usize),
}

/// Errors raised by the build pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Another pipeline is still running.
    #[error("A build is already in progress")]
    AlreadyRunning,

    /// The named repository is not in the catalog.
    #[error("Unknown repository: {0}")]
    UnknownRepository(String),

    /// The run ended without reporting a result.
    #[error("The build ended without reporting a result")]
    Interrupted,

    /// A stage ended the pipeline.
    #[error("{stage} failed: {reason}")]
    StageFailed {
        /// Stage that failed
        stage: Stage,
        /// Operator-facing reason
        reason: String,
    },
}

/// Errors raised while loading or saving preferences.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Layered loading failed.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Serialising the preferences failed.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Reading or writing the preferences file failed.
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// `config get/set` was given a key that does not exist.
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// A required value was empty after trimming.
    #[error("Value for {0} must not be blank")]
    Blank(String),
}
