//! Embedded interpreter for executable bodies
//!
//! Executables are written in a small JavaScript-like language: `let`/`const`
//! bindings, functions and arrow functions, `if`/`while`/`for`/`for..of`,
//! `try`/`catch`, template strings, arrays and objects. Values have copy
//! semantics. The only way out of the interpreter is the [`Host`] object bound
//! to the body's parameter; the global scope holds nothing but pure helpers
//! (`Math`, `JSON`, `parseInt`, ...).

mod ast;
mod globals;
mod interp;
mod lexer;
mod limits;
mod methods;
mod parser;
mod value;

pub use ast::{Expr, FunctionDef, Program, Stmt};
pub use interp::Interpreter;
pub use limits::{MAX_ARRAY_LENGTH, MAX_STRING_LENGTH};
pub use parser::{parse_expression, parse_program};
pub use value::{HostObject, Native, Value};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ReferenceError: {0}")]
    Reference(String),

    #[error("RangeError: {0}")]
    Range(String),

    /// A value raised with `throw` or by a host capability
    #[error("Uncaught {}", .0.error_message())]
    Thrown(Value),

    /// The program asked to stop with an exit code. Not catchable by scripts.
    #[error("exit {0}")]
    Exit(i32),
}

impl ScriptError {
    /// Raise a plain `Error` object with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Thrown(Value::error_object("Error", message))
    }

    /// The message reported when the error escapes the program.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Syntax(m) | Self::Type(m) | Self::Reference(m) | Self::Range(m) => m.clone(),
            Self::Thrown(value) => value.error_message(),
            Self::Exit(code) => format!("exit {code}"),
        }
    }

    /// Value bound to a `catch (e)` parameter, or `None` for uncatchable errors.
    #[must_use]
    pub fn to_catch_value(&self) -> Option<Value> {
        let (name, message) = match self {
            Self::Exit(_) => return None,
            Self::Thrown(value) => return Some(value.clone()),
            Self::Syntax(m) => ("SyntaxError", m),
            Self::Type(m) => ("TypeError", m),
            Self::Reference(m) => ("ReferenceError", m),
            Self::Range(m) => ("RangeError", m),
        };
        Some(Value::error_object(name, message.clone()))
    }
}

pub type ScriptResult<T> = Result<T, ScriptError>;

/// The capability surface a program can reach.
///
/// Host objects are addressed by path: `""` is the object bound to the body's
/// parameter, `"fs"` its `fs` group and so on.
#[async_trait]
pub trait Host: Send + Sync {
    /// Read a non-method property. `None` when the name is not a property.
    fn get(&self, object: &str, name: &str) -> Option<Value>;

    /// Whether `object.name` is a callable method.
    fn has_method(&self, object: &str, name: &str) -> bool;

    async fn call(&self, object: &str, method: &str, args: Vec<Value>) -> ScriptResult<Value>;
}

/// Run an executable body with `param` bound to the host's root object.
pub async fn run(code: &str, param: &str, host: Arc<dyn Host>) -> ScriptResult<Value> {
    let program = parse_program(code)?;
    let mut interp = Interpreter::new(host);
    interp.bind(param, Value::Host(HostObject::root()));
    interp.run(&program).await
}
