// SPDX-License-Identifier: MIT
use num_format::{Locale, ToFormattedString};
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use camimu::WriterStats;

use crate::tui::theme::Theme;

pub fn render(
    frame: &mut ratatui::Frame,
    area: Rect,
    stats: &WriterStats,
    rejected: u64,
    theme: &Theme,
) {
    if area.height < 1 || area.width < 10 {
        return;
    }

    let failed_style = if stats.failed > 0 {
        theme.error
    } else {
        theme.rate_ok
    };

    let mut lines = vec![
        Line::from(format!(
            "sequences: {} dispatched, {} written, {} pending",
            stats.dispatched.to_formatted_string(&Locale::en),
            stats.completed.to_formatted_string(&Locale::en),
            stats.pending.to_formatted_string(&Locale::en),
        )),
        Line::from(vec![
            Span::raw("failed: "),
            Span::styled(stats.failed.to_formatted_string(&Locale::en), failed_style),
            Span::raw(format!(
                "   rejected samples: {}",
                rejected.to_formatted_string(&Locale::en)
            )),
        ]),
    ];
    if let Some(ref err) = stats.last_error {
        lines.push(Line::from(Span::styled(format!("last error: {err}"), theme.error)));
    }

    frame.render_widget(Paragraph::new(lines), area);
}
