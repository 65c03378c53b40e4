// SPDX-License-Identifier: MIT
use std::path::Path;

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::theme::Theme;

pub fn render(frame: &mut ratatui::Frame, area: Rect, session_dir: Option<&Path>, theme: &Theme) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let version = env!("CARGO_PKG_VERSION");
    let spans = match session_dir {
        Some(dir) => {
            let state = " REC ";
            let text = format!(" camimu v{version} | {} | c: stop  q: quit", dir.display());
            let width = (area.width as usize).saturating_sub(state.len());
            vec![
                Span::styled(state, theme.recording_indicator),
                Span::styled(format!("{text:<width$}"), theme.status_bar),
            ]
        }
        None => {
            let text = format!("camimu v{version} | IDLE | c: start capture  q: quit");
            vec![Span::styled(
                format!("{text:<width$}", width = area.width as usize),
                theme.status_bar,
            )]
        }
    };

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
