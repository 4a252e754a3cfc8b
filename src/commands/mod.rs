// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod build;
pub mod completions;
pub mod config;
pub mod deployed;
pub mod scan;
pub mod view;

use crate::config::Config;
use std::path::PathBuf;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Loaded preferences
    pub config: Config,
    /// Where preference changes are saved
    pub config_path: Option<PathBuf>,
    /// Emit JSON instead of text
    pub json: bool,
    /// Colour text output
    pub color: bool,
}

/// Text for an empty version cell
pub(crate) fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}
