// SPDX-License-Identifier: MIT
use crossterm::event::KeyCode;

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    PanelUp,
    PanelDown,
    ToggleCollapse,
    ToggleCapture,
    None,
}

pub fn handle_key(key: KeyCode) -> Action {
    match key {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Up => Action::PanelUp,
        KeyCode::Down => Action::PanelDown,
        KeyCode::Right | KeyCode::Left => Action::ToggleCollapse,
        KeyCode::Char('c' | ' ') => Action::ToggleCapture,
        _ => Action::None,
    }
}
