mod helpers;
mod navigation;
pub mod render;
mod types;

use std::io::Stdout;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::api::CommentApi;
use crate::config::Config;
use crate::controller::{ThreadController, ThreadStatus};
use crate::store::ThreadRow;
use crate::types::{Comment, VoteType};

use helpers::{fill_area, restore_terminal, setup_terminal, truncate_with_ellipsis, wrap_text};
use render::{row_lines, RowStyle};
use types::{InputMode, LoadingState};

const POPUP_BG: Color = Color::Rgb(40, 40, 50);
const HELP_BG: Color = Color::Rgb(30, 30, 40);

/// Split the screen into header, thread list and footer
fn screen_layout(area: Rect) -> [Rect; 3] {
    Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(area)
}

/// Interactive thread viewer.
///
/// All backend work is spawned onto the tokio runtime through cloned
/// controllers; the event loop only reads the store between key presses.
pub struct App<A: CommentApi + 'static> {
    controller: ThreadController<A>,
    runtime: Handle,
    config: Config,
    style: RowStyle,
    title: String,

    // Thread view state
    rows: Vec<ThreadRow>,
    status: ThreadStatus,
    notice: Option<String>,
    selected_id: Option<String>,
    selected_index: usize,
    scroll: usize,

    // Modal state
    input: InputMode,
    show_help: bool,
    loading: LoadingState,
    should_quit: bool,

    // Result of the comment submission in flight: the created comment
    create_receiver: Option<mpsc::Receiver<Result<Comment, String>>>,
}

impl<A: CommentApi + 'static> App<A> {
    pub fn new(
        controller: ThreadController<A>,
        title: impl Into<String>,
        config: Config,
        runtime: Handle,
    ) -> Self {
        let status = controller.status();
        Self {
            style: RowStyle::from_config(&config),
            controller,
            runtime,
            config,
            title: title.into(),
            rows: Vec::new(),
            status,
            notice: None,
            selected_id: None,
            selected_index: 0,
            scroll: 0,
            input: InputMode::None,
            show_help: false,
            loading: LoadingState::Idle,
            should_quit: false,
            create_receiver: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        if self.controller.comment_count() == 0 {
            self.spawn_refetch();
        }
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        self.controller.shutdown();
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.poll_create_result();
            self.refresh_rows();

            terminal.draw(|frame| {
                let [_, list, _] = screen_layout(frame.area());
                self.ensure_visible(list);
                self.render(frame);
            })?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    /// Check for async comment submission completion
    fn poll_create_result(&mut self) {
        let Some(receiver) = &self.create_receiver else {
            return;
        };
        let Ok(result) = receiver.try_recv() else {
            return;
        };
        self.create_receiver = None;

        match result {
            Ok(comment) => {
                // Unfold the parent so the new reply is visible
                if let Some(parent) = &comment.parent_comment_id {
                    let folded = self
                        .rows
                        .iter()
                        .any(|r| &r.item.id == parent && r.item.is_collapsed);
                    if folded {
                        self.controller.toggle_collapse(parent);
                    }
                }
                self.selected_id = Some(comment.id);
                self.loading = LoadingState::Idle;
            }
            Err(e) => {
                self.loading = LoadingState::Error(format!("Failed to post: {}", e));
            }
        }
    }

    // ------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------

    fn spawn_refetch(&self) {
        let controller = self.controller.clone();
        self.runtime.spawn(async move {
            if let Err(e) = controller.refetch().await {
                debug!(error = %e, "refetch did not complete");
            }
        });
    }

    fn spawn_load_more(&self) {
        let controller = self.controller.clone();
        self.runtime.spawn(async move {
            if let Err(e) = controller.load_more().await {
                debug!(error = %e, "load_more did not complete");
            }
        });
    }

    fn spawn_vote(&self, id: String, vote_type: VoteType, reason: Option<String>) {
        let controller = self.controller.clone();
        self.runtime.spawn(async move {
            if let Err(e) = controller.handle_vote(&id, vote_type, reason).await {
                debug!(comment = %id, error = %e, "vote not applied");
            }
        });
    }

    fn spawn_toggle_role(&self, id: String, show: bool) {
        let controller = self.controller.clone();
        self.runtime.spawn(async move {
            if let Err(e) = controller.handle_toggle_role(&id, show).await {
                debug!(comment = %id, error = %e, "role toggle not applied");
            }
        });
    }

    fn submit_comment(&mut self, parent_id: Option<String>, text: String) {
        if text.trim().is_empty() {
            self.loading = LoadingState::Error("Comment is empty".to_string());
            return;
        }

        let message = if parent_id.is_some() {
            "Posting reply..."
        } else {
            "Posting comment..."
        };
        self.loading = LoadingState::Loading(message.to_string());

        let (tx, rx) = mpsc::channel();
        self.create_receiver = Some(rx);
        let controller = self.controller.clone();
        self.runtime.spawn(async move {
            let result = controller
                .handle_create_comment(&text, parent_id.as_deref())
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(result);
        });
    }

    // ------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------

    fn quit(&mut self) {
        info!("quitting");
        self.controller.shutdown();
        self.should_quit = true;
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        // If loading, only allow quit
        if matches!(self.loading, LoadingState::Loading(_)) {
            if key.code == KeyCode::Char('q') || (ctrl && key.code == KeyCode::Char('c')) {
                self.quit();
            }
            return;
        }

        // Clear error on any key
        if matches!(self.loading, LoadingState::Error(_)) {
            self.loading = LoadingState::Idle;
            return;
        }

        if self.show_help {
            self.show_help = false;
            return;
        }

        if self.input.is_active() {
            self.handle_input_key(key);
            return;
        }

        let page = self.config.navigation.scroll_lines;
        match key.code {
            KeyCode::Char('c') if ctrl => self.quit(),
            KeyCode::Char('d') if ctrl => self.move_down(page),
            KeyCode::Char('u') if ctrl => self.move_up(page),
            KeyCode::Char('q') | KeyCode::Esc => self.quit(),
            KeyCode::Char('j') | KeyCode::Down => self.move_down(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(1),
            KeyCode::PageDown => self.move_down(page),
            KeyCode::PageUp => self.move_up(page),
            KeyCode::Char('g') | KeyCode::Home => self.go_top(),
            KeyCode::Char('G') | KeyCode::End => self.go_bottom(),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('s') => {
                let sort = self.controller.sort().next();
                self.controller.set_sort(sort);
            }
            KeyCode::Char('u') => self.vote_selected(VoteType::Upvote),
            KeyCode::Char('d') => self.vote_selected(VoteType::Downvote),
            KeyCode::Char('D') => {
                if let Some(row) = self.selected_row() {
                    self.input = InputMode::DownvoteReason {
                        comment_id: row.item.id.clone(),
                        text: String::new(),
                    };
                }
            }
            KeyCode::Char('c') => {
                self.input = InputMode::Composing {
                    parent_id: None,
                    text: String::new(),
                };
            }
            KeyCode::Char('r') => {
                if let Some(row) = self.selected_row() {
                    self.input = InputMode::Composing {
                        parent_id: Some(row.item.id.clone()),
                        text: String::new(),
                    };
                }
            }
            KeyCode::Char('p') => self.toggle_role_selected(),
            KeyCode::Char('m') => self.spawn_load_more(),
            KeyCode::Char('R') => self.spawn_refetch(),
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.input = InputMode::None,
            KeyCode::Char('s') if ctrl => self.submit_input(),
            KeyCode::Enter => {
                if matches!(self.input, InputMode::DownvoteReason { .. }) {
                    self.submit_input();
                } else if let Some(text) = self.input.text_mut() {
                    text.push('\n');
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = self.input.text_mut() {
                    text.pop();
                }
            }
            KeyCode::Char(c) if !ctrl => {
                if let Some(text) = self.input.text_mut() {
                    text.push(c);
                }
            }
            _ => {}
        }
    }

    fn submit_input(&mut self) {
        match std::mem::replace(&mut self.input, InputMode::None) {
            InputMode::Composing { parent_id, text } => self.submit_comment(parent_id, text),
            InputMode::DownvoteReason { comment_id, text } => {
                let reason = Some(text.trim().to_string()).filter(|r| !r.is_empty());
                self.spawn_vote(comment_id, VoteType::Downvote, reason);
            }
            InputMode::None => {}
        }
    }

    fn toggle_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.item.child_count > 0 {
            let id = row.item.id.clone();
            self.controller.toggle_collapse(&id);
        }
    }

    fn vote_selected(&mut self, vote_type: VoteType) {
        if let Some(row) = self.selected_row() {
            self.spawn_vote(row.item.id.clone(), vote_type, None);
        }
    }

    fn toggle_role_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.comment.creator_role.is_none() {
            self.loading = LoadingState::Error("This comment has no role label".to_string());
            return;
        }
        self.spawn_toggle_role(row.item.id.clone(), !row.comment.show_creator_role);
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    fn render(&self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        fill_area(frame.buffer_mut(), area, self.config.colors.background.to_color());

        let [header, list, footer] = screen_layout(area);
        self.render_header(frame, header);
        self.render_thread(frame, list);
        self.render_footer(frame, footer);

        match &self.input {
            InputMode::Composing { parent_id, text } => {
                let title = match parent_id
                    .as_deref()
                    .and_then(|id| self.rows.iter().find(|r| r.item.id == id))
                {
                    Some(parent) => format!(" Reply to {} (Ctrl+S, Esc) ", parent.comment.author),
                    None => " New Comment (Ctrl+S, Esc) ".to_string(),
                };
                self.render_input(frame, area, &title, text, 12);
            }
            InputMode::DownvoteReason { text, .. } => {
                self.render_input(frame, area, " Downvote reason, optional (Enter, Esc) ", text, 3);
            }
            InputMode::None => {}
        }

        if self.show_help {
            self.render_help(frame);
        }

        match &self.loading {
            LoadingState::Loading(msg) => self.render_loading(frame, msg),
            LoadingState::Error(msg) => self.render_error(frame, msg),
            LoadingState::Idle => {}
        }
    }

    fn render_header(&self, frame: &mut ratatui::Frame, area: Rect) {
        let accent = self.config.colors.accent.to_color();
        let bar = Style::default().bg(accent).fg(Color::White);
        let count = self.status.comment_count;
        let counts = if count == 1 {
            "1 comment".to_string()
        } else {
            format!("{} comments", count)
        };

        let fixed = format!("  │ {} │ sort: {} ", counts, self.status.sort);
        let room = (area.width as usize).saturating_sub(fixed.chars().count() + 9);
        let title = truncate_with_ellipsis(&self.title, room);

        let line = Line::from(vec![
            Span::styled(" kaiwa ", bar.add_modifier(Modifier::BOLD)),
            Span::styled(format!("│ {}", title), bar),
            Span::styled(fixed, bar),
        ]);
        frame.render_widget(Paragraph::new(line).style(bar), area);
    }

    fn render_thread(&self, frame: &mut ratatui::Frame, area: Rect) {
        let bg = Style::default().bg(self.config.colors.background.to_color());
        let height = area.height as usize;

        if self.rows.is_empty() {
            let message = if self.status.loading {
                "Loading comments...".to_string()
            } else if let Some(e) = &self.status.error {
                format!("Could not load comments: {}\n\nPress R to retry", e)
            } else {
                "No comments yet. Press c to start the discussion.".to_string()
            };
            let text = Paragraph::new(message)
                .alignment(Alignment::Center)
                .style(bg.fg(Color::DarkGray));
            let centered = Rect {
                y: area.y + area.height / 3,
                height: area.height - area.height / 3,
                ..area
            };
            frame.render_widget(text, centered);
            return;
        }

        let now = Utc::now();
        let width = area.width as usize;
        let mut lines: Vec<Line<'static>> = Vec::new();
        for (i, row) in self.rows.iter().enumerate().skip(self.scroll) {
            if lines.len() >= height {
                break;
            }
            lines.extend(row_lines(row, width, &self.style, i == self.selected_index, now));
        }

        if self.status.has_more && lines.len() < height {
            let loaded = self.rows.iter().filter(|r| r.item.depth == 0).count();
            let label = if self.status.loading_more {
                "── loading more... ──".to_string()
            } else {
                format!(
                    "── m: load more ({} of {} threads) ──",
                    loaded, self.status.total_root_count
                )
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(self.config.colors.accent.to_color()),
            )));
        }

        frame.render_widget(Paragraph::new(lines).style(bg), area);
    }

    fn render_footer(&self, frame: &mut ratatui::Frame, area: Rect) {
        let base = Style::default().bg(HELP_BG);
        let (text, style) = if let Some(notice) = &self.notice {
            (notice.clone(), base.fg(Color::Red))
        } else if self.status.loading {
            ("Loading comments...".to_string(), base.fg(Color::Yellow))
        } else if self.status.loading_more {
            ("Loading more...".to_string(), base.fg(Color::Yellow))
        } else if let Some(e) = &self.status.error {
            (format!("Error: {} (R to retry)", e), base.fg(Color::Red))
        } else {
            (
                "j/k move · u/d vote · r reply · c comment · s sort · ? help · q quit".to_string(),
                base.fg(Color::DarkGray),
            )
        };
        let text = truncate_with_ellipsis(&format!(" {}", text), area.width as usize);
        frame.render_widget(Paragraph::new(text).style(style), area);
    }

    fn render_input(
        &self,
        frame: &mut ratatui::Frame,
        area: Rect,
        title: &str,
        text: &str,
        height: u16,
    ) {
        let popup_width = (area.width * 2 / 3).min(80);
        let popup_height = (height + 2).min(area.height);
        let popup_area = Rect {
            x: area.x + (area.width - popup_width) / 2,
            y: area.y + (area.height - popup_height) / 2,
            width: popup_width,
            height: popup_height,
        };

        let block = Block::default()
            .title(truncate_with_ellipsis(title, popup_width as usize))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner_area = block.inner(popup_area);

        fill_area(frame.buffer_mut(), popup_area, POPUP_BG);
        frame.render_widget(block, popup_area);

        let wrap_width = inner_area.width.saturating_sub(1) as usize;
        let mut lines = wrap_text(text, wrap_width);
        if let Some(last) = lines.last_mut() {
            last.push('_');
        }
        // Keep the cursor line in view
        let skip = lines.len().saturating_sub(inner_area.height as usize);

        let buf = frame.buffer_mut();
        for (i, line) in lines.iter().skip(skip).enumerate() {
            buf.set_string(
                inner_area.x,
                inner_area.y + i as u16,
                line,
                Style::default().fg(Color::White).bg(POPUP_BG),
            );
        }
    }

    fn render_help(&self, frame: &mut ratatui::Frame) {
        let commands: [(&str, &str); 16] = [
            ("j / ↓", "Next comment"),
            ("k / ↑", "Previous comment"),
            ("g / G", "First / last comment"),
            ("Ctrl+d / Ctrl+u", "Page down / up"),
            ("Enter / Space", "Fold or unfold replies"),
            ("s", "Cycle sort mode"),
            ("u", "Upvote (again to retract)"),
            ("d", "Downvote (again to retract)"),
            ("D", "Downvote with a reason"),
            ("c", "New top-level comment"),
            ("r", "Reply to selected comment"),
            ("p", "Show or hide author role"),
            ("m", "Load more threads"),
            ("R", "Reload the discussion"),
            ("q", "Quit"),
            ("?", "Show this help"),
        ];

        let area = frame.area();
        let popup_width = 60.min(area.width.saturating_sub(4));
        let popup_height = (commands.len() as u16 + 2).min(area.height.saturating_sub(2));
        let popup_area = Rect {
            x: area.x + (area.width - popup_width) / 2,
            y: area.y + (area.height - popup_height) / 2,
            width: popup_width,
            height: popup_height,
        };

        fill_area(frame.buffer_mut(), popup_area, HELP_BG);

        let block = Block::default()
            .title(" Keyboard Shortcuts (press any key to close) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner_area = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let key_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
            .bg(HELP_BG);
        let desc_style = Style::default().fg(Color::White).bg(HELP_BG);

        let buf = frame.buffer_mut();
        for (i, (key, desc)) in commands.iter().enumerate() {
            if i as u16 >= inner_area.height {
                break;
            }
            let y = inner_area.y + i as u16;
            buf.set_string(inner_area.x, y, format!("{:>16}  ", key), key_style);

            let available = (inner_area.width as usize).saturating_sub(18);
            buf.set_string(
                inner_area.x + 18,
                y,
                truncate_with_ellipsis(desc, available),
                desc_style,
            );
        }
    }

    fn render_loading(&self, frame: &mut ratatui::Frame, message: &str) {
        let area = frame.area();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let text = Paragraph::new(message)
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Yellow).bg(POPUP_BG));

        let popup_area = Rect {
            x: area.width / 4,
            y: (area.height / 2).saturating_sub(1),
            width: area.width / 2,
            height: 3.min(area.height),
        };

        frame.render_widget(text, popup_area);
    }

    fn render_error(&self, frame: &mut ratatui::Frame, message: &str) {
        let area = frame.area();
        let block = Block::default()
            .title(" Error ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red));

        let text = Paragraph::new(format!("{}\n\nPress any key to continue", message))
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Red).bg(POPUP_BG));

        let popup_area = Rect {
            x: area.width / 6,
            y: (area.height / 2).saturating_sub(2),
            width: area.width * 2 / 3,
            height: 5.min(area.height),
        };

        frame.render_widget(text, popup_area);
    }
}
