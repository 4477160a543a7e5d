//! Keyboard input for sandboxed programs
//!
//! Everything here suspends on [`Terminal::next_event`]. A closed input stream
//! ends the read with whatever was collected so far.

use crate::terminal::{Key, KeyEvent, Modifiers, Terminal, TerminalEvent};

/// Single-line editor state for `readLine`.
#[derive(Debug, Default)]
struct LineEditor {
    chars: Vec<char>,
    cursor: usize,
}

enum Edit {
    Continue,
    Submit,
    Cancel,
}

impl LineEditor {
    fn insert(&mut self, text: &str) {
        for c in text.chars() {
            let c = if c == '\n' || c == '\r' { ' ' } else { c };
            self.chars.insert(self.cursor, c);
            self.cursor += 1;
        }
    }

    fn key(&mut self, event: KeyEvent) -> Edit {
        if event.modifiers.contains(Modifiers::CTRL) {
            if let Key::Char(c) = event.key {
                match c.to_ascii_lowercase() {
                    'a' => self.cursor = 0,
                    'e' => self.cursor = self.chars.len(),
                    'u' => {
                        self.chars.drain(..self.cursor);
                        self.cursor = 0;
                    }
                    'k' => self.chars.truncate(self.cursor),
                    'c' => return Edit::Cancel,
                    _ => {}
                }
            }
            return Edit::Continue;
        }
        match event.key {
            Key::Enter => return Edit::Submit,
            Key::Left => self.cursor = self.cursor.saturating_sub(1),
            Key::Right => self.cursor = (self.cursor + 1).min(self.chars.len()),
            Key::Home => self.cursor = 0,
            Key::End => self.cursor = self.chars.len(),
            Key::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.chars.remove(self.cursor);
            }
            Key::Delete if self.cursor < self.chars.len() => {
                self.chars.remove(self.cursor);
            }
            Key::Char(c) if !event.modifiers.intersects(Modifiers::ALT | Modifiers::META) => {
                self.chars.insert(self.cursor, c);
                self.cursor += 1;
            }
            _ => {}
        }
        Edit::Continue
    }

    fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Redraw the line in place and park the terminal cursor on the edit point.
    fn render(&self, terminal: &dyn Terminal, prompt: &str) {
        terminal.write("\r\x1b[K");
        terminal.write(prompt);
        terminal.write(&self.text());
        let behind = self.chars.len() - self.cursor;
        if behind > 0 {
            terminal.write(&format!("\x1b[{behind}D"));
        }
    }
}

/// Read an edited line. Ctrl-C abandons it and returns an empty string.
pub(super) async fn read_line(terminal: &dyn Terminal, prompt: &str) -> String {
    let mut editor = LineEditor::default();
    terminal.write(prompt);
    while let Some(event) = terminal.next_event().await {
        match event {
            TerminalEvent::Data(text) => editor.insert(&text),
            TerminalEvent::Key(key) => match editor.key(key) {
                Edit::Continue => {}
                Edit::Submit => {
                    terminal.write("\r\n");
                    return editor.text();
                }
                Edit::Cancel => {
                    terminal.write("^C\r\n");
                    return String::new();
                }
            },
        }
        editor.render(terminal, prompt);
    }
    editor.text()
}

/// Name of the next key, or the first character of pasted text.
pub(super) async fn read_key(terminal: &dyn Terminal) -> String {
    while let Some(event) = terminal.next_event().await {
        match event {
            TerminalEvent::Key(key) => return key.key.name(),
            TerminalEvent::Data(text) => {
                if let Some(c) = text.chars().next() {
                    return c.to_string();
                }
            }
        }
    }
    String::new()
}

/// Next printable character typed without modifiers.
pub(super) async fn read_char(terminal: &dyn Terminal) -> String {
    while let Some(event) = terminal.next_event().await {
        match event {
            TerminalEvent::Key(KeyEvent {
                key: Key::Char(c),
                modifiers,
            }) if modifiers.is_empty() && !c.is_control() => return c.to_string(),
            TerminalEvent::Data(text) => {
                if let Some(c) = text.chars().find(|c| !c.is_control()) {
                    return c.to_string();
                }
            }
            TerminalEvent::Key(_) => {}
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::BufferTerminal;

    #[tokio::test]
    async fn test_read_line_editing() {
        let term = BufferTerminal::new();
        term.push_keys("helo");
        term.push_key(KeyEvent::plain(Key::Left));
        term.push_keys("l");
        term.push_key(KeyEvent::ctrl('e'));
        term.push_keys("!");
        term.push_key(KeyEvent::plain(Key::Enter));
        assert_eq!(read_line(&term, "> ").await, "hello!");
        assert!(term.output().starts_with("> "));
    }

    #[tokio::test]
    async fn test_read_line_kill_commands() {
        let term = BufferTerminal::new();
        term.push_keys("abc def");
        term.push_key(KeyEvent::ctrl('a'));
        term.push_key(KeyEvent::plain(Key::Right));
        term.push_key(KeyEvent::ctrl('k'));
        term.push_keys("x");
        term.push_key(KeyEvent::plain(Key::Enter));
        assert_eq!(read_line(&term, "").await, "ax");

        term.push_keys("gone");
        term.push_key(KeyEvent::ctrl('u'));
        term.push_keys("kept");
        term.push_key(KeyEvent::plain(Key::Enter));
        assert_eq!(read_line(&term, "").await, "kept");
    }

    #[tokio::test]
    async fn test_read_line_cancel_and_paste() {
        let term = BufferTerminal::new();
        term.push_keys("abc");
        term.push_key(KeyEvent::ctrl('c'));
        assert_eq!(read_line(&term, "").await, "");

        term.push_keys("<");
        term.push_paste("a\nb");
        term.push_line(">");
        assert_eq!(read_line(&term, "").await, "<a b>");
    }

    #[tokio::test]
    async fn test_read_key_and_char() {
        let term = BufferTerminal::new();
        term.push_key(KeyEvent::plain(Key::Up));
        assert_eq!(read_key(&term).await, "ArrowUp");
        term.push_paste("xyz");
        assert_eq!(read_key(&term).await, "x");

        term.push_key(KeyEvent::ctrl('x'));
        term.push_key(KeyEvent::plain(Key::Enter));
        term.push_keys("q");
        assert_eq!(read_char(&term).await, "q");
        assert_eq!(read_char(&term).await, "");
    }
}
