// SPDX-License-Identifier: MIT
use std::path::PathBuf;
use std::sync::Arc;

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::widgets::{Block, Borders, Paragraph};

use camimu::{CaptureSession, StartOutcome, StopOutcome};

use super::input::Action;
use super::layout::{PanelState, build_layout};
use super::panels::{camera, header, sensors, writer};
use super::theme::{COLLAPSED_MARKER, SELECTED_MARKER, Theme};

pub struct App {
    pub panels: Vec<PanelState>,
    pub selected_panel: usize,
    pub should_quit: bool,
    pub theme: Theme,
    /// Last start/stop result, shown in the writer panel.
    pub status: Option<String>,
    session: Arc<CaptureSession>,
    root: PathBuf,
}

impl App {
    #[must_use]
    pub fn new(session: Arc<CaptureSession>, root: PathBuf) -> Self {
        let panels = vec![
            PanelState {
                name: "Sensor info",
                collapsed: false,
                min_height: 6,
            },
            PanelState {
                name: "Camera",
                collapsed: false,
                min_height: 5,
            },
            PanelState {
                name: "Writer",
                collapsed: false,
                min_height: 6,
            },
        ];

        Self {
            panels,
            selected_panel: 0,
            should_quit: false,
            theme: Theme::default(),
            status: None,
            session,
            root,
        }
    }

    pub fn handle_action(&mut self, action: &Action) {
        match *action {
            Action::Quit => self.should_quit = true,
            Action::PanelUp => {
                if self.selected_panel > 0 {
                    self.selected_panel -= 1;
                }
            }
            Action::PanelDown => {
                if self.selected_panel + 1 < self.panels.len() {
                    self.selected_panel += 1;
                }
            }
            Action::ToggleCollapse => {
                if let Some(panel) = self.panels.get_mut(self.selected_panel) {
                    panel.collapsed = !panel.collapsed;
                }
            }
            Action::ToggleCapture => self.toggle_capture(),
            Action::None => {}
        }
    }

    fn toggle_capture(&mut self) {
        if self.session.is_capturing() {
            self.status = Some(match self.session.stop() {
                StopOutcome::Stopped { dir, sequences } => {
                    format!("stopped: {sequences} sequences in {}", dir.display())
                }
                StopOutcome::AlreadyIdle => "already idle".to_string(),
            });
            return;
        }

        let dir = crate::new_session_dir(&self.root);
        self.status = Some(match self.session.start(&dir) {
            Ok(StartOutcome::Started(dir)) => format!("capturing to {}", dir.display()),
            Ok(StartOutcome::AlreadyCapturing(dir)) => {
                format!("already capturing to {}", dir.display())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start capture");
                format!("start failed: {e}")
            }
        });
    }

    pub fn render(&self, frame: &mut ratatui::Frame) {
        let outer = frame.area();
        if outer.height < 2 || outer.width < 5 {
            return;
        }

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(outer);

        let session_dir = self.session.session_dir();
        header::render(frame, vertical[0], session_dir.as_deref(), &self.theme);

        let areas = build_layout(&self.panels, vertical[1]);
        let stats = self.session.writer_stats();

        for (i, (panel, area)) in self.panels.iter().zip(areas.iter()).enumerate() {
            let is_selected = i == self.selected_panel;

            let sel_mark = if is_selected {
                SELECTED_MARKER[1]
            } else {
                SELECTED_MARKER[0]
            };
            let col_mark = if panel.collapsed {
                COLLAPSED_MARKER[1]
            } else {
                COLLAPSED_MARKER[0]
            };

            let title = format!("{sel_mark} {col_mark} {}", panel.name);

            let border_style = if is_selected {
                self.theme.border_selected
            } else {
                self.theme.border_normal
            };

            let block = Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(border_style)
                .title_style(self.theme.title);

            if panel.collapsed {
                frame.render_widget(block, *area);
                continue;
            }

            let inner = block.inner(*area);
            frame.render_widget(block, *area);

            if inner.width < 2 || inner.height < 1 {
                continue;
            }

            match i {
                0 => sensors::render(frame, inner, &self.session, &self.theme),
                1 => camera::render(frame, inner, &self.session),
                2 => {
                    let rows = Layout::default()
                        .direction(Direction::Vertical)
                        .constraints([Constraint::Min(1), Constraint::Length(1)])
                        .split(inner);
                    writer::render(
                        frame,
                        rows[0],
                        &stats,
                        self.session.rejected(),
                        &self.theme,
                    );
                    if let Some(ref status) = self.status {
                        frame.render_widget(Paragraph::new(status.as_str()), rows[1]);
                    }
                }
                _ => {}
            }
        }
    }
}
