//! Execution context and command results

use crate::terminal::{Terminal, TerminalSize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use trx_vfs::Vfs;

/// A state change requested by a command.
///
/// Builtins and executables never touch shell state directly. They return
/// mutations on their [`CommandResult`] and the owning [`Shell`](crate::Shell)
/// applies them after the top-level node finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMutation {
    ChangeDirectory(String),
    SetEnv { name: String, value: String },
    UnsetEnv(String),
    AddAlias { name: String, value: String },
    RemoveAlias(String),
    /// Lines to run in the current shell, in order (`source`)
    SourceLines(Vec<String>),
    RequestExit(i32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Request for the host UI, e.g. `"clear"`
    pub ui_request: Option<String>,
    /// stdout was already streamed to the terminal
    pub direct_output: bool,
    pub mutations: Vec<ShellMutation>,
}

impl CommandResult {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failure(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    #[must_use]
    pub fn with_mutation(mut self, mutation: ShellMutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Per-invocation bag handed to every command.
///
/// Created by the shell for each top-level node and cloned for each pipeline
/// stage. The env and alias maps are snapshots; changes go back through
/// [`ShellMutation`].
#[derive(Clone)]
pub struct ExecutionContext {
    pub stdin: String,
    pub env: HashMap<String, String>,
    pub aliases: HashMap<String, String>,
    pub history: Arc<[String]>,
    pub terminal_size: TerminalSize,
    pub vfs: Arc<dyn Vfs>,
    pub terminal: Option<Arc<dyn Terminal>>,
    /// How many `exec` calls deep this command runs
    pub depth: usize,
}

impl ExecutionContext {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self {
            stdin: String::new(),
            env: HashMap::new(),
            aliases: HashMap::new(),
            history: Arc::from(Vec::new()),
            terminal_size: TerminalSize::default(),
            vfs,
            terminal: None,
            depth: 0,
        }
    }

    #[must_use]
    pub fn with_terminal(mut self, terminal: Arc<dyn Terminal>) -> Self {
        self.terminal_size = terminal.size();
        self.terminal = Some(terminal);
        self
    }

    #[must_use]
    pub fn with_stdin(&self, stdin: impl Into<String>) -> Self {
        Self {
            stdin: stdin.into(),
            ..self.clone()
        }
    }

    /// Same context with output captured instead of streamed.
    #[must_use]
    pub fn without_terminal(&self) -> Self {
        Self {
            terminal: None,
            ..self.clone()
        }
    }

    pub fn cwd(&self) -> String {
        self.vfs.cwd()
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("stdin_len", &self.stdin.len())
            .field("env", &self.env)
            .field("aliases", &self.aliases)
            .field("history_len", &self.history.len())
            .field("terminal_size", &self.terminal_size)
            .field("cwd", &self.vfs.cwd())
            .field("has_terminal", &self.terminal.is_some())
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trx_vfs::MemoryVfs;

    #[test]
    fn test_result_builders() {
        let r = CommandResult::failure("boom", 3).with_mutation(ShellMutation::RequestExit(3));
        assert_eq!(r.stderr, "boom");
        assert_eq!(r.exit_code, 3);
        assert!(!r.is_success());
        assert_eq!(r.mutations, vec![ShellMutation::RequestExit(3)]);
        assert!(CommandResult::ok("x").is_success());
    }

    #[test]
    fn test_stage_clone_keeps_env() {
        let mut ctx = ExecutionContext::new(Arc::new(MemoryVfs::default()));
        ctx.env.insert("A".to_string(), "1".to_string());
        let stage = ctx.with_stdin("data");
        assert_eq!(stage.stdin, "data");
        assert_eq!(stage.var("A"), Some("1"));
        assert!(ctx.stdin.is_empty());
    }
}
