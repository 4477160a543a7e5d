use super::{offset, CursorPosition, Key, KeyEvent, Terminal, TerminalEvent, TerminalSize};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct BufferState {
    output: String,
    errors: String,
    clears: usize,
    cursor: CursorPosition,
    events: VecDeque<TerminalEvent>,
    selection: String,
}

/// Headless terminal that records output and replays queued input events.
///
/// Used by hosts without a display and throughout the tests. Input is closed
/// once the queue is drained.
#[derive(Debug, Default)]
pub struct BufferTerminal {
    state: Mutex<BufferState>,
    size: TerminalSize,
}

impl BufferTerminal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_size(cols: u16, rows: u16) -> Self {
        Self {
            state: Mutex::default(),
            size: TerminalSize { cols, rows },
        }
    }

    fn state(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything written since creation (or the last `take_output`).
    #[must_use]
    pub fn output(&self) -> String {
        self.state().output.clone()
    }

    pub fn take_output(&self) -> String {
        std::mem::take(&mut self.state().output)
    }

    /// Everything written through `write_error`.
    #[must_use]
    pub fn errors(&self) -> String {
        self.state().errors.clone()
    }

    /// Number of `clear` calls received.
    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.state().clears
    }

    pub fn select(&self, text: &str) {
        self.state().selection = text.to_string();
    }

    pub fn push_event(&self, event: TerminalEvent) {
        self.state().events.push_back(event);
    }

    pub fn push_key(&self, event: KeyEvent) {
        self.push_event(TerminalEvent::Key(event));
    }

    /// Queue one key event per character.
    pub fn push_keys(&self, text: &str) {
        for c in text.chars() {
            self.push_key(KeyEvent::plain(Key::Char(c)));
        }
    }

    /// Queue the characters of `text` followed by Enter.
    pub fn push_line(&self, text: &str) {
        self.push_keys(text);
        self.push_key(KeyEvent::plain(Key::Enter));
    }

    pub fn push_paste(&self, text: &str) {
        self.push_event(TerminalEvent::Data(text.to_string()));
    }
}

#[async_trait]
impl Terminal for BufferTerminal {
    fn write(&self, text: &str) {
        let mut state = self.state();
        state.output.push_str(text);
        for c in text.chars() {
            match c {
                '\n' => {
                    state.cursor.x = 0;
                    state.cursor.y = offset(state.cursor.y, 1, self.size.rows);
                }
                '\r' => state.cursor.x = 0,
                _ => state.cursor.x = offset(state.cursor.x, 1, self.size.cols),
            }
        }
    }

    fn write_error(&self, text: &str) {
        self.state().errors.push_str(text);
    }

    fn clear(&self) {
        let mut state = self.state();
        state.clears += 1;
        state.cursor = CursorPosition::default();
    }

    fn clear_line(&self) {
        self.state().cursor.x = 0;
    }

    fn move_to(&self, x: u16, y: u16) {
        self.state().cursor = CursorPosition {
            x: x.min(self.size.cols.saturating_sub(1)),
            y: y.min(self.size.rows.saturating_sub(1)),
        };
    }

    fn move_by(&self, dx: i32, dy: i32) {
        let mut state = self.state();
        state.cursor.x = offset(state.cursor.x, dx, self.size.cols);
        state.cursor.y = offset(state.cursor.y, dy, self.size.rows);
    }

    fn cursor(&self) -> CursorPosition {
        self.state().cursor
    }

    fn size(&self) -> TerminalSize {
        self.size
    }

    async fn next_event(&self) -> Option<TerminalEvent> {
        self.state().events.pop_front()
    }

    fn has_pending_input(&self) -> bool {
        !self.state().events.is_empty()
    }

    fn has_selection(&self) -> bool {
        !self.state().selection.is_empty()
    }

    fn selection(&self) -> String {
        self.state().selection.clone()
    }

    fn clear_selection(&self) {
        self.state().selection.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_output_and_cursor() {
        let term = BufferTerminal::new();
        term.write("ab");
        term.writeln("c");
        term.write("d");
        assert_eq!(term.output(), "abc\nd");
        assert_eq!(term.cursor(), CursorPosition { x: 1, y: 1 });
    }

    #[test]
    fn test_move_clamps_to_size() {
        let term = BufferTerminal::with_size(10, 5);
        term.move_to(50, 50);
        assert_eq!(term.cursor(), CursorPosition { x: 9, y: 4 });
        term.move_by(-20, -1);
        assert_eq!(term.cursor(), CursorPosition { x: 0, y: 3 });
    }

    #[tokio::test]
    async fn test_event_queue_drains() {
        let term = BufferTerminal::new();
        term.push_line("x");
        assert!(term.has_pending_input());
        assert_eq!(
            term.next_event().await,
            Some(TerminalEvent::Key(KeyEvent::plain(Key::Char('x'))))
        );
        assert_eq!(
            term.next_event().await,
            Some(TerminalEvent::Key(KeyEvent::plain(Key::Enter)))
        );
        assert_eq!(term.next_event().await, None);
        assert!(!term.has_pending_input());
    }
}
