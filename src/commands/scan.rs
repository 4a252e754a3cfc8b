// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Scan command - lists repositories with their declared, targeted and deployed versions

use super::{or_dash, CommandContext};
use crate::session::{Session, SessionUpdate};
use crate::types::Repository;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments for the scan command
#[derive(Debug, Default)]
pub struct ScanArgs {
    /// Repository base directory; saved as the new default
    pub path: Option<PathBuf>,
    /// Deployment directory; saved as the new default
    pub deploy: Option<PathBuf>,
    /// Extra repository location for this run
    pub extra: Option<PathBuf>,
    /// Manifest file, or `-` for stdin
    pub filter: Option<PathBuf>,
    /// Only list rows whose deployed version disagrees
    pub mismatches_only: bool,
}

#[derive(Serialize)]
struct JsonRow<'a> {
    id: String,
    name: &'a str,
    path: &'a Path,
    repo_version: &'a str,
    targeted_version: &'a str,
    deployment_version: &'a str,
    selected: bool,
    mismatch: bool,
}

impl<'a> From<&'a Repository> for JsonRow<'a> {
    fn from(repo: &'a Repository) -> Self {
        Self {
            id: repo.id(),
            name: repo.name(),
            path: repo.path(),
            repo_version: repo.repo_version(),
            targeted_version: repo.targeted_version(),
            deployment_version: repo.deployment_version(),
            selected: repo.is_selected(),
            mismatch: repo.has_mismatch(),
        }
    }
}

/// Run the scan command
pub async fn run(ctx: &CommandContext, args: ScanArgs) -> Result<()> {
    let mut session = Session::new(ctx.config.clone(), ctx.config_path.clone());

    if let Some(path) = &args.path {
        session
            .set_repository_path(&path.to_string_lossy())
            .context("Failed to save repository path")?;
    }
    if let Some(deploy) = &args.deploy {
        session
            .set_deployment_path(&deploy.to_string_lossy())
            .context("Failed to save deployment path")?;
    }
    if let Some(extra) = &args.extra {
        session.set_extra_repository_path(extra);
    }
    if let Some(filter) = &args.filter {
        session.set_filter(read_manifest(filter)?);
    }

    info!(path = %session.config().repository_path.display(), "Scanning");
    match session.rescan().await {
        SessionUpdate::ScanFailed(e) => return Err(e).context("Error scanning repositories"),
        SessionUpdate::Scanned { reconcile, .. } => {
            if let Some(notice) = reconcile.notice() {
                eprintln!("warning: {notice}: {}", session.config().deployment_path.display());
            }
        }
        _ => {}
    }

    let catalog = session.catalog();
    let rows: Vec<&Repository> = if args.mismatches_only {
        catalog.mismatches().collect()
    } else {
        catalog.visible().collect()
    };

    if ctx.json {
        let rows: Vec<JsonRow<'_>> = rows.into_iter().map(JsonRow::from).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if !rows.is_empty() {
        print!("{}", render_table(&rows, ctx.color));
        println!();
    }
    println!("{}", catalog.summary());

    let mismatches = catalog.mismatches().count();
    if mismatches > 0 {
        let line = format!("{mismatches} deployed version(s) differ");
        if ctx.color {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }

    Ok(())
}

fn read_manifest(source: &Path) -> Result<String> {
    if source == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read filter from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(source).with_context(|| format!("Failed to read filter file {}", source.display()))
}

/// Plain-text table of `rows`; mismatched rows end with `!` and are red when `color` is set
#[must_use]
pub fn render_table(rows: &[&Repository], color: bool) -> String {
    const HEADERS: [&str; 4] = ["REPOSITORY", "REPO", "TARGETED", "DEPLOYED"];

    let cells: Vec<[&str; 4]> = rows
        .iter()
        .map(|r| {
            [
                r.name(),
                or_dash(r.repo_version()),
                or_dash(r.targeted_version()),
                or_dash(r.deployment_version()),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |row: &[&str; 4]| {
        format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}",
            row[0],
            row[1],
            row[2],
            row[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        )
    };

    let mut out = String::new();
    out.push_str(format_row(&HEADERS).trim_end());
    out.push('\n');
    for (repo, row) in rows.iter().zip(&cells) {
        let mut line = format_row(row);
        if repo.has_mismatch() {
            line.push_str("  !");
        }
        let line = line.trim_end();
        if color && repo.has_mismatch() {
            out.push_str(&line.red().to_string());
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}
