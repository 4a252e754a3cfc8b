// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! View command - opens the interactive terminal view

use super::CommandContext;
use crate::session::Session;
use anyhow::Result;

/// Run the view command
pub fn run(ctx: &CommandContext) -> Result<()> {
    tracing::info!("Launching TUI...");
    let session = Session::new(ctx.config.clone(), ctx.config_path.clone());
    tokio::task::block_in_place(|| crate::tui::run(session))
}
