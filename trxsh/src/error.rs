//! Error types for trxsh

use thiserror::Error;

/// Result type alias for shell-level operations
pub type ShellResult<T> = Result<T, ShellError>;

/// Errors raised while turning a command line into an AST.
///
/// These are the only errors the parse stage produces; the shell loop renders
/// them as syntax errors before anything is executed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// End of input reached inside a quoted string
    #[error("unterminated string: missing closing {quote}")]
    UnterminatedString { quote: char },

    /// `${NAME` without the closing brace
    #[error("unterminated variable expansion: ${{{0}")]
    UnterminatedVariableExpansion(String),

    /// `>` or `>>` not followed by a file name
    #[error("expected redirect target after '{0}'")]
    ExpectedRedirectTarget(String),

    /// An operator where a command name was expected
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
}

/// Errors the host binary hits outside the executor.
#[derive(Error, Debug)]
pub enum ShellError {
    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(#[from] trx_config::ConfigError),

    /// IO error on the host side (terminal, history file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: ShellError =
            trx_config::ConfigError::InvalidOrigin("localhost".to_string()).into();
        assert!(matches!(err, ShellError::Config(_)));
        assert_eq!(
            err.to_string(),
            "config error: sandbox.origin must be an http(s) URL, got 'localhost'"
        );
    }

    #[test]
    fn test_parse_error_messages() {
        assert_eq!(
            ParseError::ExpectedRedirectTarget(">>".to_string()).to_string(),
            "expected redirect target after '>>'"
        );
        assert_eq!(
            ParseError::UnterminatedString { quote: '"' }.to_string(),
            "unterminated string: missing closing \""
        );
    }
}
