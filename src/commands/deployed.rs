// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Deployed command - lists the versions recorded in the deployment directory

use super::CommandContext;
use crate::reconcile::DeployedVersionIndex;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Run the deployed command
pub fn run(ctx: &CommandContext, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| ctx.config.deployment_path.clone());
    let index = DeployedVersionIndex::scan(&dir, &ctx.config.naming)
        .with_context(|| format!("Failed to read deployment directory {}", dir.display()))?;
    let artifacts = index.artifacts();

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
        return Ok(());
    }

    if artifacts.is_empty() {
        println!("No {} artifacts found in {}", ctx.config.naming.glob(), dir.display());
        return Ok(());
    }

    let key_width = artifacts.iter().map(|a| a.key.len()).max().unwrap_or(0).max(3);
    let version_width = artifacts.iter().map(|a| a.version.len()).max().unwrap_or(0).max(7);

    println!("{:<key_width$}  {:<version_width$}  FILE", "KEY", "VERSION");
    for artifact in &artifacts {
        println!(
            "{:<key_width$}  {:<version_width$}  {}",
            artifact.key, artifact.version, artifact.file_name
        );
    }
    println!();
    println!(
        "{} deployed, {} artifact file(s) in {}",
        index.len(),
        index.files_seen(),
        dir.display()
    );

    Ok(())
}
