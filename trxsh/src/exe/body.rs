//! Body extraction for executable files
//!
//! Accepted shapes, each with an optional trailing `;`:
//!
//! ```text
//! (async function(p) { ... })
//! async function(p) { ... }
//! async function anyName(p) { ... }
//! ```

use super::ExeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExeBody {
    /// Name the capability object is bound to inside the code
    pub param: String,
    pub code: String,
}

const EXPECTED: &str = "expected `async function(param) { ... }`";

fn invalid(detail: &str) -> ExeError {
    ExeError::InvalidFormat(format!("{EXPECTED}: {detail}"))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Split a leading identifier off `s`, returning it and the remainder.
fn take_ident(s: &str) -> Option<(&str, &str)> {
    if !s.starts_with(is_ident_start) {
        return None;
    }
    let end = s.find(|c: char| !is_ident_char(c)).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

/// Extract the parameter name and inner code from an executable body.
pub fn extract_body(body: &str) -> Result<ExeBody, ExeError> {
    let mut s = body.trim();
    s = s.strip_suffix(';').map_or(s, str::trim_end);

    if let Some(inner) = s.strip_prefix('(') {
        s = inner
            .strip_suffix(')')
            .ok_or_else(|| invalid("unbalanced parentheses"))?
            .trim();
    }

    let rest = s
        .strip_prefix("async")
        .filter(|r| r.starts_with(char::is_whitespace))
        .ok_or_else(|| invalid("missing `async`"))?
        .trim_start();
    let mut rest = rest
        .strip_prefix("function")
        .ok_or_else(|| invalid("missing `function`"))?
        .trim_start();

    if let Some((_name, after)) = take_ident(rest) {
        rest = after.trim_start();
    }

    let rest = rest
        .strip_prefix('(')
        .ok_or_else(|| invalid("missing parameter list"))?
        .trim_start();
    let (param, rest) = take_ident(rest).ok_or_else(|| invalid("missing parameter"))?;
    let rest = rest
        .trim_start()
        .strip_prefix(')')
        .ok_or_else(|| invalid("exactly one parameter is allowed"))?
        .trim_start();

    let code = rest
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .ok_or_else(|| invalid("missing function body"))?;

    Ok(ExeBody {
        param: param.to_string(),
        code: code.trim().to_string(),
    })
}
