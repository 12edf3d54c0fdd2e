//! Main fact view
//!
//! Renders the current fact entry snapshot: a loading indicator while a
//! fetch is in flight, the fact with its age once fetched, and the failure
//! message on error. A previously fetched fact stays on screen through
//! both refreshes and errors.

use chrono::Utc;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::cache::{EntrySnapshot, FetchStatus};
use crate::data::Fact;

/// Renders the fact view
pub fn render(frame: &mut Frame, app: &App) {
    let snapshot = app.snapshot();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)])
        .split(frame.area());

    let body = Paragraph::new(body_lines(&snapshot, app.is_stale()))
        .block(
            Block::default()
                .title(" Cat Facts ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    frame.render_widget(body, chunks[0]);

    let footer = Paragraph::new(Line::from(vec![
        key_hint("r", "refresh"),
        key_hint("R", "force refresh"),
        key_hint("?", "help"),
        key_hint("q", "quit"),
    ]))
    .alignment(Alignment::Center);
    frame.render_widget(footer, chunks[1]);
}

/// Builds the body lines for the current snapshot
fn body_lines(snapshot: &EntrySnapshot<Fact>, is_stale: bool) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    lines.push(Line::from(""));

    match snapshot.status {
        FetchStatus::Idle | FetchStatus::Loading => {
            lines.push(Line::from(Span::styled(
                "Fetching a cat fact...",
                Style::default().fg(Color::Cyan),
            )));
            // Keep the previous fact visible while refreshing
            if let Some(fact) = &snapshot.value {
                lines.push(Line::from(""));
                lines.extend(fact_lines(fact));
            }
        }
        FetchStatus::Success => {
            if let Some(fact) = &snapshot.value {
                lines.extend(fact_lines(fact));
            }
            lines.push(Line::from(""));
            lines.push(age_line(snapshot, is_stale));
        }
        FetchStatus::Error => {
            let message = snapshot
                .error
                .as_ref()
                .map(|error| error.to_string())
                .unwrap_or_else(|| "fetch failed".to_string());
            lines.push(Line::from(Span::styled(
                format!("Could not fetch a fact: {}", message),
                Style::default().fg(Color::Red),
            )));
            if let Some(fact) = &snapshot.value {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    "Showing the last fetched fact:",
                    Style::default().fg(Color::DarkGray),
                )));
                lines.push(Line::from(""));
                lines.extend(fact_lines(fact));
                lines.push(Line::from(""));
                lines.push(age_line(snapshot, is_stale));
            }
        }
    }

    lines
}

fn fact_lines(fact: &Fact) -> Vec<Line<'static>> {
    vec![Line::from(Span::styled(
        fact.text.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ))]
}

/// Line showing how old the displayed fact is, with a staleness marker
fn age_line(snapshot: &EntrySnapshot<Fact>, is_stale: bool) -> Line<'static> {
    let age_text = match snapshot.fetched_at {
        Some(fetched_at) => {
            let seconds = Utc::now().signed_duration_since(fetched_at).num_seconds();
            format!("fetched {}s ago", seconds.max(0))
        }
        None => "never fetched".to_string(),
    };
    let mut spans = vec![Span::styled(age_text, Style::default().fg(Color::DarkGray))];
    if let Some(fact) = &snapshot.value {
        spans.push(Span::styled(
            format!(" · {} chars", fact.length),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if is_stale {
        spans.push(Span::styled(
            " (stale)",
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

fn key_hint(key: &str, action: &str) -> Span<'static> {
    Span::styled(
        format!(" {} {} ", key, action),
        Style::default().fg(Color::DarkGray),
    )
}
