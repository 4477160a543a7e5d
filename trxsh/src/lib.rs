//! trxsh - Shell engine and executable sandbox for the TRX virtual filesystem
//!
//! This crate provides:
//! - A POSIX-like command language: pipelines, `&&`/`||`, `;`, redirects,
//!   quoting, `$VAR` expansion and aliases
//! - Built-in commands (ls, cat, grep, etc.) over a [`trx_vfs::Vfs`]
//! - Executables: `.trx`/`.exe` files with a metadata header and an async
//!   function body, run by an embedded interpreter against a capability object
//! - A [`Shell`] that owns session state and applies command mutations

pub mod ast;
pub mod builtins;
pub mod context;
pub mod error;
pub mod exe;
pub mod exec;
pub mod expand;
pub mod help;
pub mod lexer;
pub mod parser;
pub mod sandbox;
pub mod script;
pub mod shell;
pub mod terminal;

pub use context::{CommandResult, ExecutionContext, ShellMutation};
pub use error::{ParseError, ShellError, ShellResult};
pub use exe::{ExeError, ExeServices};
pub use exec::Executor;
pub use parser::{build_ast, parse_line};
pub use shell::{Shell, ShellBuilder};
