// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Build command - builds one repository and deploys its artifacts

use super::CommandContext;
use crate::pipeline::{PipelineEvent, PipelineReport, StageStatus};
use crate::session::{Session, SessionUpdate};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Arguments for the build command
#[derive(Debug)]
pub struct BuildArgs {
    /// Repository name as listed by `scan`
    pub repository: String,
    /// Repository base directory for this run
    pub path: Option<PathBuf>,
    /// Deployment directory for this run
    pub deploy: Option<PathBuf>,
    /// Branch to check out instead of the configured one
    pub branch: Option<String>,
}

/// Run the build command
pub async fn run(ctx: &CommandContext, args: BuildArgs) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(path) = args.path {
        config.repository_path = path;
    }
    if let Some(deploy) = args.deploy {
        config.deployment_path = deploy;
    }
    if let Some(branch) = args.branch {
        config.build.branch = branch;
    }

    let mut session = Session::new(config, None);
    if let SessionUpdate::ScanFailed(e) = session.rescan().await {
        return Err(e).context("Error scanning repositories");
    }

    let json = ctx.json;
    let color = ctx.color;
    let report = session
        .build(&args.repository, |event| {
            if !json {
                print_event(event, color);
            }
        })
        .await
        .with_context(|| format!("Build of {} failed", args.repository))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, color);
    }
    Ok(())
}

fn print_event(event: &PipelineEvent, color: bool) {
    match event {
        PipelineEvent::StageStarted(stage) => {
            let line = format!("==> {stage}");
            if color {
                println!("{}", line.bold());
            } else {
                println!("{line}");
            }
        }
        PipelineEvent::Output { line, .. } => println!("    {line}"),
        PipelineEvent::StageFinished(report) => match &report.status {
            StageStatus::Succeeded => {}
            StageStatus::Warned(reason) => {
                let line = format!("    warning: {reason}");
                if color {
                    println!("{}", line.yellow());
                } else {
                    println!("{line}");
                }
            }
            StageStatus::Failed(reason) => {
                let line = format!("    error: {reason}");
                if color {
                    println!("{}", line.red());
                } else {
                    println!("{line}");
                }
            }
        },
    }
}

fn print_summary(report: &PipelineReport, color: bool) {
    println!();
    for name in &report.removed {
        println!("Removed {name}");
    }
    for file in &report.deployed {
        let version = if file.version.is_empty() { "unknown" } else { file.version.as_str() };
        println!("Deployed {} (version {version})", file.file_name);
    }

    let warnings = report.warnings().count();
    let line = if warnings == 0 {
        format!("Build and deployment of {} completed successfully", report.repository)
    } else {
        format!(
            "Build and deployment of {} completed with {warnings} warning(s)",
            report.repository
        )
    };
    if color {
        println!("{}", line.green());
    } else {
        println!("{line}");
    }
}
