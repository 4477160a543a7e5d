//! Tokenizer for trxsh command lines
//!
//! Turns a raw line into a flat stream of words, quoted strings and operators.
//! Quoting is preserved on the token so the expansion stages know which
//! tokens are eligible for variable substitution.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Word,
    SingleQuoted,
    DoubleQuoted,

    // Operators
    Pipe,      // |
    Redirect,  // >
    Append,    // >>
    And,       // &&
    Or,        // ||
    Semicolon, // ;
}

impl TokenKind {
    /// Word-like tokens that can be a command name, argument or redirect target.
    pub fn is_word(self) -> bool {
        matches!(self, Self::Word | Self::SingleQuoted | Self::DoubleQuoted)
    }

    /// Tokens after which the next token is in command position.
    pub fn starts_command(self) -> bool {
        matches!(self, Self::Pipe | Self::Semicolon | Self::And | Self::Or)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn word(value: impl Into<String>) -> Self {
        Self::new(TokenKind::Word, value)
    }

    fn op(kind: TokenKind) -> Self {
        let value = match kind {
            TokenKind::Pipe => "|",
            TokenKind::Redirect => ">",
            TokenKind::Append => ">>",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Semicolon => ";",
            TokenKind::Word | TokenKind::SingleQuoted | TokenKind::DoubleQuoted => "",
        };
        Self::new(kind, value)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::SingleQuoted => write!(f, "'{}'", self.value),
            TokenKind::DoubleQuoted => write!(f, "\"{}\"", self.value),
            _ => write!(f, "{}", self.value),
        }
    }
}

/// Split a command line into tokens.
///
/// Operators need no surrounding whitespace, so `ls|grep x` and `ls | grep x`
/// produce the same stream. A quote at the start of a token opens a quoted
/// string; a quote in the middle of a word is kept literally together with
/// everything up to its matching quote.
pub fn tokenize(line: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        match c {
            '&' if next == Some('&') => {
                tokens.push(Token::op(TokenKind::And));
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::op(TokenKind::Or));
                i += 2;
            }
            '|' => {
                tokens.push(Token::op(TokenKind::Pipe));
                i += 1;
            }
            '>' if next == Some('>') => {
                tokens.push(Token::op(TokenKind::Append));
                i += 2;
            }
            '>' => {
                tokens.push(Token::op(TokenKind::Redirect));
                i += 1;
            }
            ';' => {
                tokens.push(Token::op(TokenKind::Semicolon));
                i += 1;
            }
            '"' | '\'' => {
                let (token, end) = read_quoted(&chars, i)?;
                tokens.push(token);
                i = end;
            }
            _ => {
                let (token, end) = read_word(&chars, i);
                tokens.push(token);
                i = end;
            }
        }
    }

    Ok(tokens)
}

fn is_operator_start(chars: &[char], i: usize) -> bool {
    match chars[i] {
        '|' | '>' | ';' => true,
        '&' => chars.get(i + 1) == Some(&'&'),
        _ => false,
    }
}

/// Read a quoted string starting at `start` (which holds the quote).
/// Returns the token and the index just past the closing quote.
fn read_quoted(chars: &[char], start: usize) -> Result<(Token, usize), ParseError> {
    let quote = chars[start];
    let mut value = String::new();
    let mut i = start + 1;

    loop {
        let Some(&c) = chars.get(i) else {
            return Err(ParseError::UnterminatedString { quote });
        };
        if c == quote {
            i += 1;
            break;
        }
        if quote == '"' && c == '\\' {
            if let Some(&escaped @ ('"' | '\\')) = chars.get(i + 1) {
                value.push(escaped);
                i += 2;
                continue;
            }
        }
        value.push(c);
        i += 1;
    }

    let kind = if quote == '"' {
        TokenKind::DoubleQuoted
    } else {
        TokenKind::SingleQuoted
    };
    Ok((Token::new(kind, value), i))
}

/// Read a bare word. Embedded quotes are copied verbatim along with their
/// contents; an embedded quote with no partner is an ordinary character.
fn read_word(chars: &[char], start: usize) -> (Token, usize) {
    let mut value = String::new();
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || is_operator_start(chars, i) {
            break;
        }
        if c == '"' || c == '\'' {
            if let Some(offset) = chars[i + 1..].iter().position(|&ch| ch == c) {
                let close = i + 1 + offset;
                value.extend(&chars[i..=close]);
                i = close + 1;
                continue;
            }
        }
        value.push(c);
        i += 1;
    }

    (Token::word(value), i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        tokenize(input).unwrap()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(lex("echo hello"), vec![Token::word("echo"), Token::word("hello")]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(lex("").is_empty());
        assert!(lex("   \t  ").is_empty());
    }

    #[test]
    fn test_double_quoted() {
        let tokens = lex("echo \"hello world\"");
        assert_eq!(tokens[1], Token::new(TokenKind::DoubleQuoted, "hello world"));
    }

    #[test]
    fn test_double_quote_escapes() {
        let tokens = lex(r#"echo "say \"hi\" \\ \n""#);
        assert_eq!(tokens[1].value, r#"say "hi" \ \n"#);
    }

    #[test]
    fn test_single_quoted_is_raw() {
        let tokens = lex(r"echo 'a $b \' ");
        assert_eq!(tokens[1], Token::new(TokenKind::SingleQuoted, r"a $b \"));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokenize("echo \"oops"),
            Err(ParseError::UnterminatedString { quote: '"' })
        );
        assert_eq!(
            tokenize("echo 'oops"),
            Err(ParseError::UnterminatedString { quote: '\'' })
        );
    }

    #[test]
    fn test_operators_without_spaces() {
        assert_eq!(lex("ls|grep x"), lex("ls | grep x"));
        assert_eq!(
            kinds("a&&b||c;d>e>>f"),
            vec![
                TokenKind::Word,
                TokenKind::And,
                TokenKind::Word,
                TokenKind::Or,
                TokenKind::Word,
                TokenKind::Semicolon,
                TokenKind::Word,
                TokenKind::Redirect,
                TokenKind::Word,
                TokenKind::Append,
                TokenKind::Word,
            ]
        );
    }

    #[test]
    fn test_append_is_greedy() {
        assert_eq!(kinds("echo x >> f"), vec![
            TokenKind::Word,
            TokenKind::Word,
            TokenKind::Append,
            TokenKind::Word,
        ]);
    }

    #[test]
    fn test_embedded_quote_stays_in_word() {
        let tokens = lex("alias ll='ls -l' x");
        assert_eq!(
            tokens,
            vec![Token::word("alias"), Token::word("ll='ls -l'"), Token::word("x")]
        );
    }

    #[test]
    fn test_lone_embedded_quote_is_literal() {
        assert_eq!(lex("echo don't"), vec![Token::word("echo"), Token::word("don't")]);
    }

    #[test]
    fn test_single_ampersand_is_word_text() {
        assert_eq!(lex("echo a&b"), vec![Token::word("echo"), Token::word("a&b")]);
    }

    #[test]
    fn test_input_redirect_is_a_word() {
        assert_eq!(lex("cat <in.txt"), vec![Token::word("cat"), Token::word("<in.txt")]);
    }
}
