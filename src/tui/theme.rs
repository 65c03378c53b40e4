// SPDX-License-Identifier: MIT
use ratatui::style::{Color, Modifier, Style};

pub struct Theme {
    pub rate_ok: Style,
    pub rate_low: Style,
    pub error: Style,
    pub border_normal: Style,
    pub border_selected: Style,
    pub title: Style,
    pub status_bar: Style,
    pub recording_indicator: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            rate_ok: Style::default().fg(Color::Green),
            rate_low: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),
            border_normal: Style::default().fg(Color::White),
            border_selected: Style::default().fg(Color::Cyan),
            title: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            status_bar: Style::default().fg(Color::Black).bg(Color::White),
            recording_indicator: Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        }
    }
}

pub const SELECTED_MARKER: [char; 2] = ['\u{2610}', '\u{2611}'];
pub const COLLAPSED_MARKER: [char; 2] = ['\u{25BC}', '\u{25BA}'];
