// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Versionyard CLI - reconcile repository, targeted and deployed versions

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use versionyard::commands::{self, build::BuildArgs, scan::ScanArgs, CommandContext};
use versionyard::config::Config;

#[derive(Parser)]
#[command(name = "versionyard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "VERSIONYARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true, value_parser = clap::builder::FalseyValueParser::new())]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan repositories and compare declared, targeted and deployed versions
    Scan {
        /// Repository base directory (saved as the default)
        path: Option<PathBuf>,

        /// Deployment directory (saved as the default)
        #[arg(long)]
        deploy: Option<PathBuf>,

        /// Extra repository location for this run
        #[arg(long)]
        extra: Option<PathBuf>,

        /// Version manifest file, or - for stdin
        #[arg(long)]
        filter: Option<PathBuf>,

        /// Only list repositories whose deployed version differs
        #[arg(long)]
        mismatches_only: bool,
    },

    /// List the versions found in the deployment directory
    Deployed {
        /// Deployment directory
        dir: Option<PathBuf>,
    },

    /// Build one repository and deploy its artifacts
    Build {
        /// Repository name
        repository: String,

        /// Repository base directory
        path: Option<PathBuf>,

        /// Deployment directory
        #[arg(long)]
        deploy: Option<PathBuf>,

        /// Branch to check out
        #[arg(long)]
        branch: Option<String>,
    },

    /// Launch interactive TUI
    View,

    /// Get or set configuration
    Config {
        /// Configuration key (`keys` lists them)
        key: String,

        /// Value to set (omit to get)
        value: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&cli, &config);

    let ctx = CommandContext {
        config,
        config_path: cli.config.clone().or_else(Config::default_path),
        json: cli.json,
        color: !cli.no_color && std::io::stdout().is_terminal(),
    };

    match cli.command {
        Commands::Scan {
            path,
            deploy,
            extra,
            filter,
            mismatches_only,
        } => {
            let args = ScanArgs {
                path,
                deploy,
                extra,
                filter,
                mismatches_only,
            };
            commands::scan::run(&ctx, args).await
        }
        Commands::Deployed { dir } => commands::deployed::run(&ctx, dir),
        Commands::Build {
            repository,
            path,
            deploy,
            branch,
        } => {
            let args = BuildArgs {
                repository,
                path,
                deploy,
                branch,
            };
            commands::build::run(&ctx, args).await
        }
        Commands::View => commands::view::run(&ctx),
        Commands::Config { key, value } => commands::config::run(&ctx, &key, value),
        Commands::Completions { shell } => commands::completions::run(Cli::command(), shell),
    }
}

fn init_logging(cli: &Cli, config: &Config) {
    let filter = match cli.verbose {
        0 if cli.quiet => EnvFilter::new("error"),
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // The terminal view owns the screen, so its logs go to a file.
    if matches!(cli.command, Commands::View) {
        let file = log_file_path().and_then(|path| {
            std::fs::create_dir_all(path.parent()?).ok()?;
            std::fs::File::create(path).ok()
        });
        match file {
            Some(file) => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init(),
            None => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::sink)
                .init(),
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();
}

fn log_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "hyperpolymath", "versionyard")
        .map(|dirs| dirs.data_local_dir().join("versionyard.log"))
}
