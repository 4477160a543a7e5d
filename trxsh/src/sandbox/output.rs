//! Program output: live terminal forwarding plus a capture buffer

use crate::terminal::Terminal;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything a program writes lands in the capture buffer. When a terminal
/// is attached the same text is also written to it as it happens.
pub(super) struct Output {
    terminal: Option<Arc<dyn Terminal>>,
    captured: Mutex<String>,
}

impl Output {
    pub(super) fn new(terminal: Option<Arc<dyn Terminal>>) -> Self {
        Self {
            terminal,
            captured: Mutex::new(String::new()),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, String> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn is_live(&self) -> bool {
        self.terminal.is_some()
    }

    pub(super) fn write(&self, text: &str) {
        self.buffer().push_str(text);
        if let Some(terminal) = &self.terminal {
            terminal.write(text);
        }
    }

    pub(super) fn clear(&self) {
        match &self.terminal {
            Some(terminal) => terminal.clear(),
            None => self.buffer().clear(),
        }
    }

    pub(super) fn clear_line(&self) {
        match &self.terminal {
            Some(terminal) => terminal.clear_line(),
            None => {
                let mut buffer = self.buffer();
                let keep = buffer.rfind('\n').map_or(0, |i| i + 1);
                buffer.truncate(keep);
            }
        }
    }

    pub(super) fn take(&self) -> String {
        std::mem::take(&mut *self.buffer())
    }
}
