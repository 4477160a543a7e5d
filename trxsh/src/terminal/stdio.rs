use super::{offset, CursorPosition, Key, KeyEvent, Terminal, TerminalEvent, TerminalSize};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Terminal over the process's stdin/stdout using ANSI escape sequences.
///
/// stdin is read a line at a time; each line is replayed as one key event per
/// character followed by Enter, so line-oriented programs work unchanged.
#[derive(Debug, Default)]
pub struct StdioTerminal {
    pending: Mutex<VecDeque<TerminalEvent>>,
    cursor: Mutex<CursorPosition>,
}

impl StdioTerminal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<TerminalEvent>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cursor_mut(&self) -> MutexGuard<'_, CursorPosition> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            tracing::warn!(error = %e, "failed to write to stdout");
        }
    }

    fn sync_cursor(&self) {
        let pos = *self.cursor_mut();
        Self::emit(&format!("\x1b[{};{}H", pos.y + 1, pos.x + 1));
    }
}

#[async_trait]
impl Terminal for StdioTerminal {
    fn write(&self, text: &str) {
        {
            let size = self.size();
            let mut cursor = self.cursor_mut();
            for c in text.chars() {
                if c == '\n' {
                    cursor.x = 0;
                    cursor.y = offset(cursor.y, 1, size.rows);
                } else {
                    cursor.x = offset(cursor.x, 1, size.cols);
                }
            }
        }
        Self::emit(&text.replace('\n', "\r\n"));
    }

    fn write_error(&self, text: &str) {
        let mut stderr = std::io::stderr().lock();
        if let Err(e) = stderr
            .write_all(text.replace('\n', "\r\n").as_bytes())
            .and_then(|()| stderr.flush())
        {
            tracing::warn!(error = %e, "failed to write to stderr");
        }
    }

    fn clear(&self) {
        *self.cursor_mut() = CursorPosition::default();
        Self::emit("\x1b[2J\x1b[H");
    }

    fn clear_line(&self) {
        self.cursor_mut().x = 0;
        Self::emit("\r\x1b[2K");
    }

    fn move_to(&self, x: u16, y: u16) {
        *self.cursor_mut() = CursorPosition { x, y };
        self.sync_cursor();
    }

    fn move_by(&self, dx: i32, dy: i32) {
        let size = self.size();
        {
            let mut cursor = self.cursor_mut();
            cursor.x = offset(cursor.x, dx, size.cols);
            cursor.y = offset(cursor.y, dy, size.rows);
        }
        self.sync_cursor();
    }

    fn cursor(&self) -> CursorPosition {
        *self.cursor_mut()
    }

    fn size(&self) -> TerminalSize {
        window_size()
    }

    async fn next_event(&self) -> Option<TerminalEvent> {
        if let Some(event) = self.pending().pop_front() {
            return Some(event);
        }

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|n| (n, line))
        })
        .await;

        let line = match line {
            Ok(Ok((0, _))) => return None,
            Ok(Ok((_, line))) => line,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to read stdin");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "stdin reader task failed");
                return None;
            }
        };

        let mut pending = self.pending();
        for c in line.trim_end_matches(['\r', '\n']).chars() {
            pending.push_back(TerminalEvent::Key(KeyEvent::plain(Key::Char(c))));
        }
        pending.push_back(TerminalEvent::Key(KeyEvent::plain(Key::Enter)));
        pending.pop_front()
    }

    fn has_pending_input(&self) -> bool {
        !self.pending().is_empty()
    }
}

/// Size advertised by the `COLUMNS` and `LINES` variables, 80x24 otherwise.
fn window_size() -> TerminalSize {
    size_from(
        std::env::var("COLUMNS").ok().as_deref(),
        std::env::var("LINES").ok().as_deref(),
    )
}

fn size_from(cols: Option<&str>, rows: Option<&str>) -> TerminalSize {
    let fallback = TerminalSize::default();
    let parse = |value: Option<&str>| {
        value
            .and_then(|v| v.trim().parse::<u16>().ok())
            .filter(|n| *n > 0)
    };
    TerminalSize {
        cols: parse(cols).unwrap_or(fallback.cols),
        rows: parse(rows).unwrap_or(fallback.rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_from_environment_values() {
        assert_eq!(
            size_from(Some("120"), Some("40")),
            TerminalSize { cols: 120, rows: 40 }
        );
        assert_eq!(size_from(None, None), TerminalSize::default());
        assert_eq!(size_from(Some("0"), Some("wide")), TerminalSize::default());
        assert_eq!(
            size_from(Some("100000"), Some(" 30 ")),
            TerminalSize { cols: 80, rows: 30 }
        );
    }
}
