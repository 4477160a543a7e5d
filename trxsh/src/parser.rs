//! AST builder for trxsh
//!
//! Recursive descent over the expanded token stream. Precedence from loosest
//! to tightest: `;`, then `&&`/`||` (left-associative), then `|`, then a
//! simple command with its redirects.

use crate::ast::{LogicalOp, Node, Pipeline, Redirect, RedirectMode, SimpleCommand};
use crate::error::ParseError;
use crate::expand::{expand_aliases, expand_variables};
use crate::lexer::{tokenize, Token, TokenKind};
use std::collections::HashMap;

/// Run the full parse pipeline: tokenize, expand aliases, expand variables,
/// build the AST.
pub fn parse_line(
    line: &str,
    aliases: &HashMap<String, String>,
    env: &HashMap<String, String>,
) -> Result<Vec<Node>, ParseError> {
    let tokens = tokenize(line)?;
    let tokens = expand_aliases(tokens, aliases)?;
    let tokens = expand_variables(tokens, env)?;
    build_ast(tokens)
}

/// Build the top-level node sequence for a token stream.
pub fn build_ast(tokens: Vec<Token>) -> Result<Vec<Node>, ParseError> {
    Parser::new(tokens).parse_sequence()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self) -> ParseError {
        ParseError::UnexpectedToken(
            self.peek()
                .map_or_else(|| "end of input".to_string(), |t| t.value.clone()),
        )
    }

    fn parse_sequence(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            while self.peek_kind() == Some(TokenKind::Semicolon) {
                self.advance();
            }
            if self.peek().is_none() {
                break;
            }
            nodes.push(self.parse_logical()?);
            match self.peek_kind() {
                None | Some(TokenKind::Semicolon) => {}
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(nodes)
    }

    fn parse_logical(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_pipeline()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::And) => LogicalOp::And,
                Some(TokenKind::Or) => LogicalOp::Or,
                _ => break,
            };
            self.advance();
            let right = self.parse_pipeline()?;
            left = Node::Logical {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_pipeline(&mut self) -> Result<Node, ParseError> {
        let mut stages = vec![self.parse_simple()?];
        while self.peek_kind() == Some(TokenKind::Pipe) {
            self.advance();
            stages.push(self.parse_simple()?);
        }
        if stages.len() == 1 {
            Ok(Node::Simple(stages.remove(0)))
        } else {
            Ok(Node::Pipeline(Pipeline { stages }))
        }
    }

    fn parse_simple(&mut self) -> Result<SimpleCommand, ParseError> {
        let mut words: Vec<Token> = Vec::new();
        let mut redirects = Vec::new();

        while let Some(kind) = self.peek_kind() {
            match kind {
                k if k.is_word() => {
                    if let Some(token) = self.advance() {
                        words.push(token);
                    }
                }
                TokenKind::Redirect | TokenKind::Append => {
                    let operator = self.advance().map(|t| t.value).unwrap_or_default();
                    let target = match self.peek() {
                        Some(t) if t.kind.is_word() => t.value.clone(),
                        _ => return Err(ParseError::ExpectedRedirectTarget(operator)),
                    };
                    self.advance();
                    let mode = if kind == TokenKind::Append {
                        RedirectMode::Append
                    } else {
                        RedirectMode::Overwrite
                    };
                    redirects.push(Redirect { mode, target });
                }
                _ => break,
            }
        }

        let (words, input) = lift_input_redirect(words)?;
        let mut words = words.into_iter();
        let Some(name) = words.next() else {
            return Err(self.unexpected());
        };

        Ok(SimpleCommand {
            name,
            args: words.collect(),
            redirects,
            input,
        })
    }
}

/// Pull `<file` and `< file` out of a command's words.
///
/// Only unquoted words are considered, so `echo '<'` still prints `<`. The
/// last input redirect wins.
fn lift_input_redirect(words: Vec<Token>) -> Result<(Vec<String>, Option<String>), ParseError> {
    let mut kept = Vec::with_capacity(words.len());
    let mut input = None;
    let mut iter = words.into_iter();

    while let Some(token) = iter.next() {
        if token.kind != TokenKind::Word || !token.value.starts_with('<') {
            kept.push(token.value);
            continue;
        }
        if token.value == "<" {
            match iter.next() {
                Some(target) => input = Some(target.value),
                None => return Err(ParseError::ExpectedRedirectTarget("<".to_string())),
            }
        } else {
            input = Some(token.value[1..].to_string());
        }
    }

    Ok((kept, input))
}
