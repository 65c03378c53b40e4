// SPDX-License-Identifier: MIT
use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub struct PanelState {
    pub name: &'static str,
    pub collapsed: bool,
    pub min_height: u16,
}

/// Collapsed panels shrink to their title line. Expanded panels keep their
/// own height, and the last expanded one takes whatever is left.
pub fn build_layout(panels: &[PanelState], area: Rect) -> Vec<Rect> {
    let last_expanded = panels.iter().rposition(|p| !p.collapsed);

    let constraints: Vec<Constraint> = panels
        .iter()
        .enumerate()
        .map(|(i, p)| match (p.collapsed, Some(i) == last_expanded) {
            (true, _) => Constraint::Length(1),
            (false, true) => Constraint::Min(p.min_height),
            (false, false) => Constraint::Length(p.min_height),
        })
        .collect();

    Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area)
        .to_vec()
}
