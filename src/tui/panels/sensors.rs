// SPDX-License-Identifier: MIT
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use camimu::{CaptureSession, Channel, Reading};

use crate::tui::theme::Theme;

fn reading_line(channel: Channel, reading: Option<Reading>) -> String {
    match reading {
        Some(Reading::Inertial(s)) => {
            format!("{channel}: {:6.2}\t{:6.2}\t{:6.2}", s.x, s.y, s.z)
        }
        _ => format!("{channel}: waiting for data..."),
    }
}

pub fn render(frame: &mut ratatui::Frame, area: Rect, session: &CaptureSession, theme: &Theme) {
    if area.height < 1 || area.width < 10 {
        return;
    }

    let mut lines = Vec::with_capacity(6);
    let mut newest: Option<i64> = None;

    for channel in Channel::INERTIAL {
        let reading = session.latest(channel);
        if let Some(Reading::Inertial(s)) = reading {
            newest = Some(newest.map_or(s.timestamp_ns, |t| t.max(s.timestamp_ns)));
        }
        let rate = session.rate(channel);
        let style = if rate > 0.0 {
            theme.rate_ok
        } else {
            theme.rate_low
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{:<40}", reading_line(channel, reading))),
            Span::styled(format!("{rate:8.1} Hz"), style),
        ]));
    }

    lines.push(Line::from(format!(
        "nanos: {}",
        newest.map_or_else(|| "-".to_string(), |t| t.to_string())
    )));

    if session.is_capturing() {
        lines.push(Line::from(format!(
            "buffered: gyro {} / acce {} of {}",
            session.buffered(Channel::Gyro),
            session.buffered(Channel::Acce),
            session.config().inertial_capacity,
        )));
    }

    frame.render_widget(Paragraph::new(lines), area);
}
