//! Terminal collaborator
//!
//! The shell and sandboxed programs never talk to a TTY directly. They write
//! through [`Terminal`] and receive input as [`TerminalEvent`]s, which lets the
//! same engine run behind a real terminal, a browser bridge or a test buffer.

mod buffer;
mod stdio;

pub use buffer::BufferTerminal;
pub use stdio::StdioTerminal;

use async_trait::async_trait;
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const CTRL  = 1 << 0;
        const ALT   = 1 << 1;
        const SHIFT = 1 << 2;
        const META  = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    Escape,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
}

impl Key {
    /// Name reported to scripts: the character itself or a DOM-style key name.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Char(c) => c.to_string(),
            Self::Enter => "Enter".to_string(),
            Self::Backspace => "Backspace".to_string(),
            Self::Delete => "Delete".to_string(),
            Self::Tab => "Tab".to_string(),
            Self::Escape => "Escape".to_string(),
            Self::Left => "ArrowLeft".to_string(),
            Self::Right => "ArrowRight".to_string(),
            Self::Up => "ArrowUp".to_string(),
            Self::Down => "ArrowDown".to_string(),
            Self::Home => "Home".to_string(),
            Self::End => "End".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    #[must_use]
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::empty(),
        }
    }

    #[must_use]
    pub fn ctrl(c: char) -> Self {
        Self {
            key: Key::Char(c),
            modifiers: Modifiers::CTRL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    Key(KeyEvent),
    /// Pasted or bulk-delivered text
    Data(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub x: u16,
    pub y: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

#[async_trait]
pub trait Terminal: Send + Sync {
    fn write(&self, text: &str);

    fn writeln(&self, text: &str) {
        self.write(text);
        self.write("\n");
    }

    /// Diagnostic output. Defaults to the normal output stream.
    fn write_error(&self, text: &str) {
        self.write(text);
    }

    fn clear(&self);

    fn clear_line(&self);

    fn move_to(&self, x: u16, y: u16);

    fn move_by(&self, dx: i32, dy: i32);

    fn cursor(&self) -> CursorPosition;

    fn size(&self) -> TerminalSize;

    /// Wait for the next input event. `None` once input is closed.
    async fn next_event(&self) -> Option<TerminalEvent>;

    fn has_pending_input(&self) -> bool;

    fn has_selection(&self) -> bool {
        false
    }

    /// Currently selected text, empty when nothing is selected.
    fn selection(&self) -> String {
        String::new()
    }

    fn clear_selection(&self) {}
}

/// Offset a cursor coordinate, clamping at zero and `max - 1`.
pub(crate) fn offset(value: u16, delta: i32, max: u16) -> u16 {
    let moved = i32::from(value).saturating_add(delta);
    let upper = i32::from(max.saturating_sub(1));
    u16::try_from(moved.clamp(0, upper)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(Key::Char('q').name(), "q");
        assert_eq!(Key::Left.name(), "ArrowLeft");
        assert_eq!(Key::Enter.name(), "Enter");
    }

    #[test]
    fn test_offset_clamps() {
        assert_eq!(offset(5, -10, 80), 0);
        assert_eq!(offset(5, 3, 80), 8);
        assert_eq!(offset(78, 10, 80), 79);
    }
}
