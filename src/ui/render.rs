//! Turns thread rows into styled terminal lines.

use chrono::{DateTime, Utc};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use super::helpers::{format_relative_time, wrap_text};
use crate::config::Config;
use crate::store::ThreadRow;
use crate::thread::LineState;
use crate::types::VoteType;

/// Each connector column is two cells wide
pub const COLUMN_WIDTH: usize = 2;

fn own_glyph(state: LineState) -> &'static str {
    match state {
        LineState::Full => "├─",
        LineState::Start => "┌─",
        LineState::End => "└─",
        LineState::Stub | LineState::None => "╶─",
    }
}

fn ancestor_glyph(state: LineState) -> &'static str {
    match state {
        LineState::Full => "│ ",
        LineState::Start => "╷ ",
        LineState::End => "╵ ",
        LineState::Stub | LineState::None => "  ",
    }
}

/// Connector prefix for the header line of a row
pub fn connector_prefix(states: &[LineState]) -> String {
    let last = states.len().saturating_sub(1);
    states
        .iter()
        .enumerate()
        .map(|(p, &state)| {
            if p == last {
                own_glyph(state)
            } else {
                ancestor_glyph(state)
            }
        })
        .collect()
}

/// Prefix for the body lines under a header: lines that continue stay drawn
pub fn continuation_prefix(states: &[LineState]) -> String {
    states
        .iter()
        .map(|state| if state.continues() { "│ " } else { "  " })
        .collect()
}

/// Colors and switches used while rendering rows
pub struct RowStyle {
    pub accent: Color,
    pub connector: Color,
    pub upvote: Color,
    pub downvote: Color,
    pub selected_bg: Color,
    pub show_scores: bool,
    pub relative_times: bool,
    pub max_body_lines: usize,
}

impl RowStyle {
    pub fn from_config(config: &Config) -> Self {
        Self {
            accent: config.colors.accent.to_color(),
            connector: config.colors.connector.to_color(),
            upvote: config.colors.upvote.to_color(),
            downvote: config.colors.downvote.to_color(),
            selected_bg: config.colors.selected_bg.to_color(),
            show_scores: config.display.show_scores,
            relative_times: config.display.relative_times,
            max_body_lines: config.display.max_body_lines,
        }
    }
}

fn format_time(time: DateTime<Utc>, now: DateTime<Utc>, relative: bool) -> String {
    if relative {
        format_relative_time(time, now)
    } else {
        time.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Header text after the connector: author, role, score, time, fold marker
fn header_spans(row: &ThreadRow, style: &RowStyle, now: DateTime<Utc>) -> Vec<Span<'static>> {
    let comment = &row.comment;
    let author = if comment.author.is_empty() {
        "anonymous".to_string()
    } else {
        comment.author.clone()
    };

    let mut spans = vec![Span::styled(
        author,
        Style::default().fg(style.accent).add_modifier(Modifier::BOLD),
    )];

    if let Some(role) = comment.visible_role() {
        spans.push(Span::styled(
            format!(" [{}]", role),
            Style::default().fg(Color::Yellow),
        ));
    }

    if style.show_scores {
        let (marker, color) = match comment.user_vote.as_ref().map(|v| v.vote_type) {
            Some(VoteType::Upvote) => ("▲", style.upvote),
            Some(VoteType::Downvote) => ("▼", style.downvote),
            None => ("·", Color::DarkGray),
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(marker, Style::default().fg(color)));
        spans.push(Span::styled(
            format!(" {} ", comment.score),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!("(+{}/-{})", comment.upvote_count, comment.downvote_count),
            Style::default().fg(Color::DarkGray),
        ));
    }

    spans.push(Span::styled(
        format!(" {}", format_time(comment.created_time, now, style.relative_times)),
        Style::default().fg(Color::DarkGray),
    ));

    if row.item.is_collapsed {
        let hidden = row.item.collapsed_count;
        let label = match hidden {
            0 => " [+]".to_string(),
            1 => " [+1 reply]".to_string(),
            n => format!(" [+{} replies]", n),
        };
        spans.push(Span::styled(label, Style::default().fg(style.accent)));
    }

    spans
}

/// All terminal lines for one row: header, then wrapped body (unless collapsed)
pub fn row_lines(
    row: &ThreadRow,
    width: usize,
    style: &RowStyle,
    selected: bool,
    now: DateTime<Utc>,
) -> Vec<Line<'static>> {
    let states = &row.item.line_states;
    let connector_style = Style::default().fg(style.connector);

    let mut header = vec![Span::styled(connector_prefix(states), connector_style)];
    header.extend(header_spans(row, style, now));
    let mut lines = vec![Line::from(header)];

    if !row.item.is_collapsed {
        let prefix = continuation_prefix(states);
        let indent = states.len() * COLUMN_WIDTH;
        let body_width = width.saturating_sub(indent).max(10);
        let mut body = wrap_text(&row.comment.body, body_width);
        if style.max_body_lines > 0 && body.len() > style.max_body_lines {
            body.truncate(style.max_body_lines);
            if let Some(last) = body.last_mut() {
                last.push('…');
            }
        }
        for text in body {
            lines.push(Line::from(vec![
                Span::styled(prefix.clone(), connector_style),
                Span::raw(text),
            ]));
        }
    }

    if selected {
        lines = lines
            .into_iter()
            .map(|line| line.style(Style::default().bg(style.selected_bg)))
            .collect();
    }

    lines
}

/// Plain-text rendering of the whole thread, used by `--print`
pub fn plain_lines(rows: &[ThreadRow], width: usize, now: DateTime<Utc>) -> Vec<String> {
    let style = RowStyle {
        accent: Color::Reset,
        connector: Color::Reset,
        upvote: Color::Reset,
        downvote: Color::Reset,
        selected_bg: Color::Reset,
        show_scores: true,
        relative_times: false,
        max_body_lines: 0,
    };
    rows.iter()
        .flat_map(|row| row_lines(row, width, &style, false, now))
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
        })
        .collect()
}
