use crate::app::{App, PaneFocus};
use crate::connection::ConnectionStatus;
use crate::error::ErrorNotice;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),      // Title
            Constraint::Min(10),        // Ports and keyboard
            Constraint::Length(3),      // Connection status
            Constraint::Length(6),      // Log
            Constraint::Length(1),      // Help
        ])
        .split(f.area());

    render_title(f, chunks[0]);
    render_main(f, chunks[1], app);
    render_status(f, chunks[2], app);
    render_log(f, chunks[3], app);
    render_help(f, chunks[4], app);

    if let Some(notice) = &app.dialog {
        render_dialog(f, notice);
    }
}

fn render_title(f: &mut Frame, area: Rect) {
    let title = Paragraph::new("vkeys - Virtual MIDI Keyboard")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn border_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn render_main(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_ports(f, chunks[0], app);
    render_keyboard(f, chunks[1], app);
}

fn render_ports(f: &mut Frame, area: Rect, app: &App) {
    let bound = app.bound_row();
    let labels = std::iter::once("Disconnected".to_string())
        .chain(app.ports.iter().map(|entry| entry.descriptor.to_string()));

    let items: Vec<ListItem> = labels
        .enumerate()
        .map(|(row, label)| {
            let is_cursor = app.focus == PaneFocus::Ports && app.selected_row == row;
            let cursor = if is_cursor { "> " } else { "  " };
            let mark = if bound == row { "(•) " } else { "( ) " };

            let style = if bound == row && row != 0 {
                Style::default().fg(Color::LightGreen)
            } else {
                Style::default()
            };

            let style = if is_cursor {
                style.add_modifier(Modifier::BOLD)
            } else {
                style
            };

            ListItem::new(format!("{}{}{}", cursor, mark, label)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("MIDI OUTPUT")
            .border_style(border_style(app.focus == PaneFocus::Ports)),
    );

    f.render_widget(list, area);
}

fn note_name(note: u8) -> String {
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], note as i16 / 12 - 1)
}

fn render_keyboard(f: &mut Frame, area: Rect, app: &App) {
    let perf = &app.perf;
    let base = perf.octave as u16 * 12;

    let held: Vec<String> = app.held_notes.iter().map(|(n, _)| note_name(*n)).collect();
    let held = if held.is_empty() {
        "-".to_string()
    } else {
        held.join(" ")
    };

    let on_off = |on: bool| if on { "on" } else { "off" };

    let lines = vec![
        Line::from(" s d   g h j   l ;"),
        Line::from("z x c v b n m , . /"),
        Line::from(""),
        Line::from(vec![
            Span::styled("Base:     ", Style::default().fg(Color::DarkGray)),
            Span::raw(note_name(base.min(127) as u8)),
        ]),
        Line::from(vec![
            Span::styled("Velocity: ", Style::default().fg(Color::DarkGray)),
            Span::raw(perf.velocity.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Program:  ", Style::default().fg(Color::DarkGray)),
            Span::raw((perf.program as u16 + 1).to_string()),
        ]),
        Line::from(vec![
            Span::styled("Bend:     ", Style::default().fg(Color::DarkGray)),
            Span::raw(perf.bend.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Sustain:  ", Style::default().fg(Color::DarkGray)),
            Span::raw(on_off(perf.sustain)),
        ]),
        Line::from(vec![
            Span::styled("Playing:  ", Style::default().fg(Color::DarkGray)),
            Span::styled(held, Style::default().fg(Color::LightGreen)),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("KEYBOARD (ch {})", perf.channel + 1))
            .border_style(border_style(app.focus == PaneFocus::Keyboard)),
    );

    f.render_widget(paragraph, area);
}

fn render_status(f: &mut Frame, area: Rect, app: &App) {
    let (tag, color) = match &app.status {
        ConnectionStatus::Disconnected => ("[--]", Color::DarkGray),
        ConnectionStatus::Pending(_) => ("[..]", Color::Yellow),
        ConnectionStatus::Open(_) => ("[OK]", Color::Green),
        ConnectionStatus::Failed(_, _) => ("[ERR]", Color::Red),
    };

    let line = Line::from(vec![
        Span::styled(tag, Style::default().fg(color)),
        Span::raw(format!(" {}", app.status)),
    ]);

    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title("CONNECTION"),
    );

    f.render_widget(paragraph, area);
}

fn render_log(f: &mut Frame, area: Rect, app: &App) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = app.log_messages.len().saturating_sub(visible);

    let log_lines: Vec<Line> = app
        .log_messages
        .iter()
        .skip(skip)
        .map(|msg| {
            if msg.starts_with("ERROR") {
                Line::styled(msg.clone(), Style::default().fg(Color::Red))
            } else {
                Line::from(msg.clone())
            }
        })
        .collect();

    let paragraph = Paragraph::new(log_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("LOG"),
    );

    f.render_widget(paragraph, area);
}

fn render_help(f: &mut Frame, area: Rect, app: &App) {
    let help_text = if app.dialog.is_some() {
        "[Enter/Esc] Dismiss"
    } else {
        match app.focus {
            PaneFocus::Ports => {
                "[↑↓] Navigate | [Enter] Connect | [d] Disconnect | [Tab] Keyboard | [p] Panic | [r] Reset | [F5] Reload | [q] Quit"
            }
            PaneFocus::Keyboard => {
                "[z-/] Play | [←→] Octave | [↑↓] Velocity | [+-] Program | [[]\\] Bend | [Space] Sustain | [p] Panic | [r] Reset | [Tab] Ports | [q] Quit"
            }
        }
    };

    let paragraph = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray));

    f.render_widget(paragraph, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_dialog(f: &mut Frame, notice: &ErrorNotice) {
    let area = centered(f.area(), 50, 7);

    let paragraph = Paragraph::new(vec![
        Line::from(notice.message),
        Line::from(""),
        Line::styled("[Enter] OK", Style::default().fg(Color::DarkGray)),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(notice.title)
            .border_style(Style::default().fg(Color::Red)),
    );

    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
    }

    #[test]
    fn test_centered_fits_small_area() {
        let area = Rect::new(0, 0, 20, 4);
        let rect = centered(area, 50, 7);
        assert_eq!(rect, Rect::new(0, 0, 20, 4));

        let rect = centered(Rect::new(0, 0, 100, 40), 50, 7);
        assert_eq!(rect, Rect::new(25, 16, 50, 7));
    }
}
