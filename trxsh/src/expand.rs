//! Alias and variable expansion over token streams
//!
//! Both passes run between tokenizing and AST building. Alias expansion only
//! touches unquoted words in command position; variable expansion touches
//! unquoted words and double-quoted strings.

use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};
use std::collections::{HashMap, HashSet, VecDeque};

/// Replace aliased command names with their tokenized values.
///
/// The first token produced by an expansion is itself eligible, so chains like
/// `ll -> l -l -> ls -l` resolve fully. Each spliced token remembers which
/// aliases produced it; a name that reappears on its own chain is left as a
/// literal word, which keeps `alias ll='ll -a'` from looping.
pub fn expand_aliases(
    tokens: Vec<Token>,
    aliases: &HashMap<String, String>,
) -> Result<Vec<Token>, ParseError> {
    if aliases.is_empty() {
        return Ok(tokens);
    }

    let mut pending: VecDeque<(Token, HashSet<String>)> =
        tokens.into_iter().map(|t| (t, HashSet::new())).collect();
    let mut out = Vec::with_capacity(pending.len());
    let mut command_position = true;

    while let Some((token, chain)) = pending.pop_front() {
        if command_position && token.kind == TokenKind::Word && !chain.contains(&token.value) {
            if let Some(value) = aliases.get(&token.value) {
                let mut chain = chain;
                chain.insert(token.value.clone());
                for replacement in tokenize(value)?.into_iter().rev() {
                    pending.push_front((replacement, chain.clone()));
                }
                continue;
            }
        }

        command_position = token.kind.starts_command();
        out.push(token);
    }

    Ok(out)
}

/// Substitute `$NAME` and `${NAME}` in words and double-quoted strings.
pub fn expand_variables(
    tokens: Vec<Token>,
    env: &HashMap<String, String>,
) -> Result<Vec<Token>, ParseError> {
    tokens
        .into_iter()
        .map(|token| match token.kind {
            TokenKind::Word | TokenKind::DoubleQuoted => Ok(Token {
                value: expand_text(&token.value, env)?,
                ..token
            }),
            _ => Ok(token),
        })
        .collect()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Expand variable references inside a single piece of text.
///
/// Undefined names expand to nothing. `$?` reads the last exit status when the
/// caller provides it under the `?` key.
pub fn expand_text(text: &str, env: &HashMap<String, String>) -> Result<String, ParseError> {
    let lookup = |name: &str| env.get(name).map_or("", String::as_str);
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '$' {
            result.push(c);
            i += 1;
            continue;
        }

        match chars.get(i + 1) {
            Some('{') => {
                let start = i + 2;
                let Some(len) = chars[start..].iter().position(|&ch| ch == '}') else {
                    let rest: String = chars[start..].iter().collect();
                    return Err(ParseError::UnterminatedVariableExpansion(rest));
                };
                let name: String = chars[start..start + len].iter().collect();
                result.push_str(lookup(&name));
                i = start + len + 1;
            }
            Some('?') => {
                result.push_str(lookup("?"));
                i += 2;
            }
            Some(&next) if is_name_char(next) => {
                let start = i + 1;
                let len = chars[start..]
                    .iter()
                    .take_while(|&&ch| is_name_char(ch))
                    .count();
                let name: String = chars[start..start + len].iter().collect();
                result.push_str(lookup(&name));
                i = start + len;
            }
            _ => {
                result.push('$');
                i += 1;
            }
        }
    }

    Ok(result)
}
