// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Terminal user interface
//!
//! Runs on the thread that owns the [`Session`]; background results are
//! drained and applied between frames.

use crate::pipeline::{PipelineEvent, StageStatus};
use crate::session::{Session, SessionUpdate};
use crate::types::HeaderState;
use anyhow::Result;
use ratatui::crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
};
use ratatui::crossterm::execute;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Text};
use ratatui::widgets::{Block, Paragraph, Row, Table, TableState};
use ratatui::Frame;
use std::time::Duration;

const LOG_LIMIT: usize = 5000;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    EditFilter,
    BuildLog,
}

struct App {
    session: Session,
    table: TableState,
    mode: Mode,
    log: Vec<String>,
    notice: Option<String>,
    quit: bool,
}

/// Run the interactive view until the operator quits
pub fn run(session: Session) -> Result<()> {
    let mut app = App::new(session);
    app.session.request_scan();
    app.notice = Some("Scanning...".into());

    let mut terminal = ratatui::init();
    execute!(std::io::stdout(), EnableBracketedPaste)?;
    let result = app.event_loop(&mut terminal);
    let _ = execute!(std::io::stdout(), DisableBracketedPaste);
    ratatui::restore();
    result
}

impl App {
    fn new(session: Session) -> Self {
        Self {
            session,
            table: TableState::default(),
            mode: Mode::Browse,
            log: Vec::new(),
            notice: None,
            quit: false,
        }
    }

    fn event_loop(&mut self, terminal: &mut ratatui::DefaultTerminal) -> Result<()> {
        while !self.quit {
            self.drain_events();
            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(POLL_INTERVAL)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key(key),
                    Event::Paste(text) => self.on_paste(&text),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.session.try_next_event() {
            let update = self.session.apply(event);
            self.on_update(update);
        }
    }

    fn on_update(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Scanned { reconcile, .. } => {
                self.notice = reconcile.notice().map(String::from);
                self.clamp_cursor();
            }
            SessionUpdate::ScanFailed(e) => {
                self.notice = Some(format!("Error scanning repositories: {e}"));
                self.clamp_cursor();
            }
            SessionUpdate::StaleScan => {}
            SessionUpdate::Pipeline(event) => self.push_event(&event),
            SessionUpdate::BuildFinished(report) => {
                self.push_log("Build and deployment completed successfully");
                self.notice = Some(format!(
                    "Deployed {} artifact(s) from {}",
                    report.deployed.len(),
                    report.repository
                ));
            }
            SessionUpdate::BuildFailed(e) => {
                self.push_log(format!("ERROR: {e}"));
                self.notice = Some(e.to_string());
            }
        }
    }

    fn push_event(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StageStarted(stage) => self.push_log(format!("==> {stage}")),
            PipelineEvent::Output { line, .. } => self.push_log(line.clone()),
            PipelineEvent::StageFinished(report) => match &report.status {
                StageStatus::Succeeded => {}
                StageStatus::Warned(reason) => self.push_log(format!("Warning: {reason}")),
                StageStatus::Failed(reason) => self.push_log(format!("Failed: {reason}")),
            },
        }
    }

    fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
        if self.log.len() > LOG_LIMIT {
            let excess = self.log.len() - LOG_LIMIT;
            self.log.drain(..excess);
        }
    }

    fn clamp_cursor(&mut self) {
        let len = self.session.catalog().visible_len();
        let selected = match self.table.selected() {
            _ if len == 0 => None,
            Some(row) => Some(row.min(len - 1)),
            None => Some(0),
        };
        self.table.select(selected);
    }

    fn on_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Browse => {
                self.notice = None;
                self.on_browse_key(key);
            }
            Mode::EditFilter => self.on_filter_key(key),
            Mode::BuildLog => {
                let done = !self.session.is_building();
                if done && matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
                    self.mode = Mode::Browse;
                }
            }
        }
    }

    fn on_browse_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Char(' ') => self.toggle_current(),
            KeyCode::Char('a') => self.session.catalog_mut().toggle_all_visible(),
            KeyCode::Char('/') => self.mode = Mode::EditFilter,
            KeyCode::Char('c') => self.set_filter(String::new()),
            KeyCode::Char('r') => {
                self.session.request_scan();
                self.notice = Some("Scanning...".into());
            }
            KeyCode::Char('b') => self.start_build(),
            _ => {}
        }
    }

    fn on_filter_key(&mut self, key: KeyEvent) {
        let mut text = self.session.filter_text().to_string();
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                return;
            }
            KeyCode::Enter => text.push('\n'),
            KeyCode::Backspace => {
                text.pop();
            }
            KeyCode::Tab => text.push('\t'),
            KeyCode::Char(c) => text.push(c),
            _ => return,
        }
        self.set_filter(text);
    }

    fn on_paste(&mut self, text: &str) {
        if self.mode == Mode::BuildLog {
            return;
        }
        self.set_filter(text.replace("\r\n", "\n"));
    }

    fn set_filter(&mut self, text: String) {
        self.session.set_filter(text);
        self.clamp_cursor();
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.session.catalog().visible_len();
        if len == 0 {
            return;
        }
        let current = self.table.selected().unwrap_or(0);
        let next = current.saturating_add_signed(delta).min(len - 1);
        self.table.select(Some(next));
    }

    fn toggle_current(&mut self) {
        let Some(row) = self.table.selected() else {
            return;
        };
        let Some(name) = self
            .session
            .catalog()
            .visible_at(row)
            .map(|r| r.name().to_string())
        else {
            return;
        };
        self.session.catalog_mut().toggle(&name);
    }

    fn start_build(&mut self) {
        let name = match self.session.build_target() {
            Ok(name) => name,
            Err(e) => {
                self.notice = Some(e.to_string());
                return;
            }
        };

        match self.session.request_build(&name) {
            Ok(()) => {
                self.log.clear();
                self.push_log(format!("Starting build for repository: {name}"));
                self.mode = Mode::BuildLog;
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    fn draw(&mut self, frame: &mut Frame) {
        let filter_lines = self.session.filter_text().lines().count().clamp(1, 6);
        let filter_height = u16::try_from(filter_lines).unwrap_or(6) + 2;
        let [main, filter, status] = Layout::vertical([
            Constraint::Min(3),
            Constraint::Length(filter_height),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        if self.mode == Mode::BuildLog {
            self.draw_log(frame, main);
        } else {
            self.draw_table(frame, main);
        }
        self.draw_filter(frame, filter);
        self.draw_status(frame, status);
    }

    fn draw_table(&mut self, frame: &mut Frame, area: Rect) {
        let catalog = self.session.catalog();
        let header_mark = match catalog.header_state() {
            HeaderState::Unchecked => "[ ]",
            HeaderState::Checked => "[x]",
            HeaderState::Indeterminate => "[-]",
        };
        let header = Row::new(vec![header_mark, "Repository", "Repo version", "Targeted", "Deployed"])
            .style(Style::new().add_modifier(Modifier::BOLD));

        let rows: Vec<Row> = catalog
            .visible()
            .map(|repo| {
                let mut style = Style::new();
                if repo.has_mismatch() {
                    style = style.fg(Color::Red);
                }
                if repo.is_selected() {
                    style = style.add_modifier(Modifier::BOLD);
                }
                Row::new(vec![
                    if repo.is_selected() { "[x]" } else { "[ ]" }.to_string(),
                    repo.name().to_string(),
                    repo.repo_version().to_string(),
                    repo.targeted_version().to_string(),
                    repo.deployment_version().to_string(),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(3),
            Constraint::Fill(1),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(16),
        ];
        let title = format!(" Repositories - {} ", self.session.config().repository_path.display());
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::bordered().title(title))
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        frame.render_stateful_widget(table, area, &mut self.table);
    }

    fn draw_log(&self, frame: &mut Frame, area: Rect) {
        let title = if self.session.is_building() {
            " Build log (running) "
        } else {
            " Build log (Esc to return) "
        };
        let visible = usize::from(area.height.saturating_sub(2));
        let offset = u16::try_from(self.log.len().saturating_sub(visible)).unwrap_or(u16::MAX);
        let text = Text::from(self.log.iter().map(|l| Line::from(l.as_str())).collect::<Vec<_>>());

        frame.render_widget(
            Paragraph::new(text)
                .block(Block::bordered().title(title))
                .scroll((offset, 0)),
            area,
        );
    }

    fn draw_filter(&self, frame: &mut Frame, area: Rect) {
        let title = if self.mode == Mode::EditFilter {
            " Filter (editing, Esc to finish) "
        } else {
            " Filter (/ edit, c clear) "
        };
        let mut block = Block::bordered().title(title);
        if self.mode == Mode::EditFilter {
            block = block.border_style(Style::new().fg(Color::Yellow));
        }
        frame.render_widget(Paragraph::new(self.session.filter_text()).block(block), area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let line = match &self.notice {
            Some(notice) => Line::styled(notice.clone(), Style::new().fg(Color::Yellow)),
            None => Line::from(format!(
                "{}  |  space select  a all  b build  r rescan  q quit",
                self.session.catalog().summary()
            )),
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}
