//! ANSI styling helpers exposed as `style.*`

const STYLES: [(&str, u8); 15] = [
    ("bold", 1),
    ("dim", 2),
    ("italic", 3),
    ("underline", 4),
    ("inverse", 7),
    ("hidden", 8),
    ("strikethrough", 9),
    ("black", 30),
    ("red", 31),
    ("green", 32),
    ("yellow", 33),
    ("blue", 34),
    ("magenta", 35),
    ("cyan", 36),
    ("white", 37),
];

pub(super) fn is_style(name: &str) -> bool {
    name == "reset" || STYLES.iter().any(|(n, _)| *n == name)
}

/// Wrap `text` in the SGR code for `name`. `reset` only prefixes a reset.
pub(super) fn apply(name: &str, text: &str) -> Option<String> {
    if name == "reset" {
        return Some(format!("\x1b[0m{text}"));
    }
    STYLES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| format!("\x1b[{code}m{text}\x1b[0m"))
}
