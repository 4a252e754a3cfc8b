// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Completions command - prints shell completion scripts

use anyhow::Result;
use clap_complete::Shell;

/// Write completions for `command` to stdout
pub fn run(mut command: clap::Command, shell: Shell) -> Result<()> {
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
    Ok(())
}
