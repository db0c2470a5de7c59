//! Rendering for the chat shell.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use super::app::{ChatApp, Phase, Speaker, TranscriptLine};

const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

/// Sender label color (ANSI magenta).
const SENDER_COLOR: Color = Color::Magenta;

pub fn render(frame: &mut Frame, app: &ChatApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.size());

    render_transcript(frame, app, chunks[0]);
    render_input(frame, app, chunks[1]);
}

fn transcript_lines(transcript: &[TranscriptLine]) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for entry in transcript {
        let (label, label_style) = match entry.speaker {
            Speaker::Info => (None, Style::default()),
            Speaker::You => (Some("You: "), Style::default().fg(SENDER_COLOR)),
            Speaker::Bot => (Some("Bot: "), Style::default().fg(SENDER_COLOR)),
            Speaker::Error => (Some("Error: "), Style::default().fg(Color::Red)),
            Speaker::Hint => (None, Style::default().add_modifier(Modifier::DIM)),
        };

        for (i, text) in entry.text.split('\n').enumerate() {
            let mut spans = Vec::with_capacity(2);
            if i == 0 {
                if let Some(label) = label {
                    spans.push(Span::styled(label, label_style.add_modifier(Modifier::BOLD)));
                }
            }
            let body_style = match entry.speaker {
                Speaker::Hint => label_style,
                _ => Style::default(),
            };
            spans.push(Span::styled(text, body_style));
            lines.push(Line::from(spans));
        }
    }
    lines
}

/// Rows `lines` take once wrapped to `width` columns.
fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| {
            let w = line.width();
            if w == 0 {
                1
            } else {
                w.div_ceil(width)
            }
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

/// Top row to scroll to so the view ends `from_bottom` rows above the end.
fn scroll_offset(total: u16, visible: u16, from_bottom: u16) -> u16 {
    total.saturating_sub(visible).saturating_sub(from_bottom)
}

fn render_transcript(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let lines = transcript_lines(&app.transcript);
    let total = wrapped_height(&lines, area.width);
    let top = scroll_offset(total, area.height, app.scroll_from_bottom);

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((top, 0));
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let block = Block::default().borders(Borders::TOP);

    let line = match app.phase {
        Phase::Idle => Line::from(vec![
            Span::styled("┃ ", Style::default().fg(SENDER_COLOR)),
            if app.input.is_empty() {
                Span::styled("Send a message...", Style::default().add_modifier(Modifier::DIM))
            } else {
                Span::raw(app.input.as_str())
            },
        ]),
        Phase::AwaitingResponse | Phase::Condensing => {
            let frame_char = SPINNER_FRAMES[app.spinner_tick % SPINNER_FRAMES.len()];
            let label = if app.phase == Phase::Condensing {
                " Condensing..."
            } else {
                " Thinking..."
            };
            Line::from(vec![
                Span::styled(frame_char, Style::default().fg(Color::LightMagenta)),
                Span::raw(label),
            ])
        }
    };

    frame.render_widget(Paragraph::new(line).block(block).wrap(Wrap { trim: false }), area);

    if app.phase == Phase::Idle {
        let cursor_x = area.x + 2 + u16::try_from(app.input.chars().count()).unwrap_or(0);
        frame.set_cursor(cursor_x.min(area.right().saturating_sub(1)), area.y + 1);
    }
}
