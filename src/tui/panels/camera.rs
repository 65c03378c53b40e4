// SPDX-License-Identifier: MIT
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;

use camimu::{CaptureSession, Channel, Reading};

pub fn render(frame: &mut ratatui::Frame, area: Rect, session: &CaptureSession) {
    if area.height < 1 || area.width < 10 {
        return;
    }

    let Some(Reading::Frame { width, height, .. }) = session.latest(Channel::Frame) else {
        frame.render_widget(Paragraph::new("Waiting for preview frames..."), area);
        return;
    };

    let mut lines = vec![
        Line::from(format!("preview: {width}x{height}")),
        Line::from(format!("fps: {:.2}", session.rate(Channel::Frame))),
    ];
    if session.is_capturing() {
        if session.config().record_frames {
            lines.push(Line::from(format!(
                "frames recorded: {}",
                session.sequences(Channel::Frame)
            )));
        } else {
            lines.push(Line::from("frames not recorded"));
        }
    }

    frame.render_widget(Paragraph::new(lines), area);
}
