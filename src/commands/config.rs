// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Config command - reads or writes a single preference

use super::CommandContext;
use crate::config::KEYS;
use anyhow::{Context, Result};

/// Run the config command
pub fn run(ctx: &CommandContext, key: &str, value: Option<String>) -> Result<()> {
    if key == "keys" {
        for key in KEYS {
            println!("{key}");
        }
        return Ok(());
    }

    let Some(value) = value else {
        println!("{}", ctx.config.get(key)?);
        return Ok(());
    };

    let path = ctx
        .config_path
        .as_ref()
        .context("No location available for the preferences file; pass --config")?;

    let mut config = ctx.config.clone();
    config.set(key, &value)?;
    config
        .save(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;

    tracing::info!(key, "Preference updated");
    println!("{key} = {}", config.get(key)?);
    Ok(())
}
