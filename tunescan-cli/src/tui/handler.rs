use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{Action, RunMode};

/// Map key events to actions based on the current run mode
pub fn handle_key(key: KeyEvent, mode: RunMode) -> Action {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Stop,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Stop,
        KeyCode::Char('p') | KeyCode::Char(' ') => match mode {
            RunMode::Running => Action::Pause,
            RunMode::Paused => Action::Resume,
            RunMode::Stopping | RunMode::Done => Action::Tick,
        },
        _ => Action::Tick,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_pause_toggles_with_mode() {
        assert_eq!(handle_key(key(KeyCode::Char('p')), RunMode::Running), Action::Pause);
        assert_eq!(handle_key(key(KeyCode::Char('p')), RunMode::Paused), Action::Resume);
        assert_eq!(handle_key(key(KeyCode::Char('p')), RunMode::Done), Action::Tick);
    }

    #[test]
    fn test_stop_keys() {
        assert_eq!(handle_key(key(KeyCode::Char('q')), RunMode::Paused), Action::Stop);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key(ctrl_c, RunMode::Running), Action::Stop);
        assert_eq!(handle_key(key(KeyCode::Char('c')), RunMode::Running), Action::Tick);
    }
}
