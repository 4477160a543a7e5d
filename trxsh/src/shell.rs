//! Shell state and the line loop

use crate::context::{CommandResult, ExecutionContext, ShellMutation};
use crate::exe::ExeServices;
use crate::exec::Executor;
use crate::parser::parse_line;
use crate::terminal::Terminal;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trx_config::ShellConfig;
use trx_vfs::Vfs;

/// How deeply `source` may nest before giving up.
const MAX_SOURCE_DEPTH: usize = 16;

/// Exit status reported for parse errors.
pub const SYNTAX_ERROR_STATUS: i32 = 2;

/// A shell session: owns env, aliases, history and the last exit status.
///
/// Commands never change this state themselves. Each top-level node returns
/// [`ShellMutation`]s that [`Shell::execute`] applies once the node finishes.
pub struct Shell {
    env: HashMap<String, String>,
    aliases: HashMap<String, String>,
    history: Vec<String>,
    last_exit_code: i32,
    exit_requested: Option<i32>,
    source_depth: usize,
    vfs: Arc<dyn Vfs>,
    terminal: Arc<dyn Terminal>,
    executor: Executor,
}

pub struct ShellBuilder {
    vfs: Arc<dyn Vfs>,
    terminal: Arc<dyn Terminal>,
    config: ShellConfig,
    services: ExeServices,
    env: Vec<(String, String)>,
}

impl ShellBuilder {
    #[must_use]
    pub fn config(mut self, config: ShellConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn services(mut self, services: ExeServices) -> Self {
        self.services = services;
        self
    }

    /// Extra variable set after the defaults.
    #[must_use]
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Shell {
        if self.vfs.is_directory(&self.config.home) {
            if let Err(e) = self.vfs.set_cwd(&self.config.home) {
                warn!(home = %self.config.home, error = %e, "cannot enter home directory");
            }
        }

        let mut env = HashMap::new();
        env.insert("PATH".to_string(), self.config.path.clone());
        env.insert("HOME".to_string(), self.config.home.clone());
        env.insert("USER".to_string(), self.config.user.clone());
        env.insert("PWD".to_string(), self.vfs.cwd());
        env.insert("?".to_string(), "0".to_string());
        env.extend(self.env);

        info!(namespace = self.vfs.namespace(), cwd = %self.vfs.cwd(), "shell started");
        Shell {
            env,
            aliases: HashMap::new(),
            history: Vec::new(),
            last_exit_code: 0,
            exit_requested: None,
            source_depth: 0,
            vfs: self.vfs,
            terminal: self.terminal,
            executor: Executor::new(self.services),
        }
    }
}

impl Shell {
    pub fn builder(vfs: Arc<dyn Vfs>, terminal: Arc<dyn Terminal>) -> ShellBuilder {
        ShellBuilder {
            vfs,
            terminal,
            config: ShellConfig::default(),
            services: ExeServices::default(),
            env: Vec::new(),
        }
    }

    /// Run one input line and return its exit status.
    ///
    /// The line is recorded in history. Output goes to the terminal, stdout
    /// only when it was not already streamed.
    pub async fn execute(&mut self, line: &str) -> i32 {
        let line = line.trim();
        if line.is_empty() {
            return self.last_exit_code;
        }
        self.history.push(line.to_string());
        self.run_line(line).await
    }

    /// Source a VFS script (e.g. `~/.trxrc`) if it exists.
    pub async fn source_file(&mut self, path: &str) -> Option<i32> {
        if !self.vfs.is_file(path) {
            return None;
        }
        debug!(path, "sourcing startup file");
        Some(self.run_line(&format!("source {path}")).await)
    }

    fn run_line_boxed<'a>(&'a mut self, line: &'a str) -> Pin<Box<dyn Future<Output = i32> + Send + 'a>> {
        Box::pin(self.run_line(line))
    }

    async fn run_line(&mut self, line: &str) -> i32 {
        let nodes = match parse_line(line, &self.aliases, &self.env) {
            Ok(nodes) => nodes,
            Err(e) => {
                self.terminal.write_error(&format!("trxsh: syntax error: {e}\n"));
                self.set_status(SYNTAX_ERROR_STATUS);
                return SYNTAX_ERROR_STATUS;
            }
        };

        for node in &nodes {
            debug!(node = %node, "executing");
            let ctx = self.context();
            let result = self.executor.execute(node, &ctx).await;
            self.emit(&result);
            self.set_status(result.exit_code);
            if result.ui_request.as_deref() == Some("clear") {
                self.terminal.clear();
            }
            self.apply(result.mutations).await;
            if self.exit_requested.is_some() {
                break;
            }
        }
        self.last_exit_code
    }

    fn context(&self) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(Arc::clone(&self.vfs))
            .with_terminal(Arc::clone(&self.terminal));
        ctx.env = self.env.clone();
        ctx.aliases = self.aliases.clone();
        ctx.history = Arc::from(self.history.as_slice());
        ctx
    }

    fn emit(&self, result: &CommandResult) {
        if !result.direct_output && !result.stdout.is_empty() {
            self.terminal.write(&result.stdout);
        }
        if !result.stderr.is_empty() {
            self.terminal.write_error(&result.stderr);
            if !result.stderr.ends_with('\n') {
                self.terminal.write_error("\n");
            }
        }
    }

    fn set_status(&mut self, code: i32) {
        self.last_exit_code = code;
        self.env.insert("?".to_string(), code.to_string());
    }

    async fn apply(&mut self, mutations: Vec<ShellMutation>) {
        for mutation in mutations {
            match mutation {
                ShellMutation::ChangeDirectory(dir) => {
                    let previous = self.vfs.cwd();
                    match self.vfs.set_cwd(&dir) {
                        Ok(()) => {
                            self.env.insert("OLDPWD".to_string(), previous);
                            self.env.insert("PWD".to_string(), self.vfs.cwd());
                        }
                        Err(e) => {
                            self.terminal.write_error(&format!("cd: {e}\n"));
                            self.set_status(1);
                        }
                    }
                }
                ShellMutation::SetEnv { name, value } => {
                    self.env.insert(name, value);
                }
                ShellMutation::UnsetEnv(name) => {
                    self.env.remove(&name);
                }
                ShellMutation::AddAlias { name, value } => {
                    self.aliases.insert(name, value);
                }
                ShellMutation::RemoveAlias(name) => {
                    self.aliases.remove(&name);
                }
                ShellMutation::SourceLines(lines) => {
                    if self.source_depth >= MAX_SOURCE_DEPTH {
                        self.terminal
                            .write_error("source: maximum nesting depth exceeded\n");
                        self.set_status(1);
                        continue;
                    }
                    self.source_depth += 1;
                    for line in &lines {
                        self.run_line_boxed(line).await;
                        if self.exit_requested.is_some() {
                            break;
                        }
                    }
                    self.source_depth -= 1;
                }
                ShellMutation::RequestExit(code) => {
                    self.exit_requested = Some(code);
                    self.set_status(code);
                }
            }
        }
    }

    /// Exit status requested by `exit`, once the shell should stop.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_requested
    }

    pub fn is_finished(&self) -> bool {
        self.exit_requested.is_some()
    }

    pub fn last_exit_code(&self) -> i32 {
        self.last_exit_code
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn cwd(&self) -> String {
        self.vfs.cwd()
    }

    pub fn vfs(&self) -> &Arc<dyn Vfs> {
        &self.vfs
    }

    /// Fill a prompt template: `{cwd}`, `{user}`, `{status}` and colors.
    ///
    /// The home directory in `{cwd}` is shown as `~`.
    pub fn render_prompt(&self, template: &str) -> String {
        let cwd = self.cwd();
        let home = self.var("HOME").unwrap_or_default();
        let cwd = match cwd.strip_prefix(home) {
            Some(rest) if !home.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                format!("~{rest}")
            }
            _ => cwd,
        };
        template
            .replace("{cwd}", &cwd)
            .replace("{user}", self.var("USER").unwrap_or("user"))
            .replace("{status}", &self.last_exit_code.to_string())
            .replace("{red}", "\x1b[31m")
            .replace("{green}", "\x1b[32m")
            .replace("{blue}", "\x1b[34m")
            .replace("{yellow}", "\x1b[33m")
            .replace("{cyan}", "\x1b[36m")
            .replace("{bold}", "\x1b[1m")
            .replace("{reset}", "\x1b[0m")
    }
}
