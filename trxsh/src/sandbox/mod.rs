//! Capability object for sandboxed executables
//!
//! A [`Sandbox`] is built fresh for each executable run and bound to the
//! body's parameter. It is the program's only route to the terminal, the VFS,
//! the network and the shell. Groups are exposed as nested host objects:
//!
//! ```text
//! api.writeln("hi")          api.fs.read("notes.txt")
//! api.style.bold("x")        api.net.proxyFetch(url)
//! api.config.get("key")      api.timewarp.list("notes.txt")
//! ```

mod fs;
mod input;
mod net;
mod output;
mod store;
mod style;

pub use net::{proxy_url, FetchRequest, FetchResponse, HttpFetcher, ReqwestFetcher};
pub use store::{
    FileVersion, MemoryPackageConfigStore, MemoryVersionStore, PackageConfigStore, VersionStore,
};

use crate::context::CommandResult;
use crate::script::{Host, HostObject, ScriptError, ScriptResult, Value};
use crate::terminal::{CursorPosition, Terminal, TerminalSize};
use async_trait::async_trait;
use output::Output;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use trx_config::{FeatureConfig, SandboxConfig};
use trx_vfs::Vfs;

const ROOT_METHODS: [&str; 18] = [
    "write",
    "writeln",
    "clear",
    "clearLine",
    "moveTo",
    "moveBy",
    "getCursor",
    "getSize",
    "readLine",
    "readKey",
    "readChar",
    "hasInput",
    "hasSelection",
    "getSelection",
    "clearSelection",
    "exit",
    "sleep",
    "exec",
];

const GROUPS: [&str; 5] = ["fs", "style", "net", "config", "timewarp"];

/// Runs a full shell line on behalf of `exec(line)`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run_line(&self, line: &str) -> CommandResult;
}

pub struct Sandbox {
    output: Output,
    terminal: Option<Arc<dyn Terminal>>,
    vfs: Arc<dyn Vfs>,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: String,
    features: FeatureConfig,
    origin: String,
    proxy_endpoint: String,
    package: Option<String>,
    fetcher: Arc<dyn HttpFetcher>,
    package_config: Arc<dyn PackageConfigStore>,
    versions: Arc<dyn VersionStore>,
    runner: Option<Arc<dyn CommandRunner>>,
}

pub struct SandboxBuilder {
    terminal: Option<Arc<dyn Terminal>>,
    vfs: Arc<dyn Vfs>,
    args: Vec<String>,
    env: HashMap<String, String>,
    features: FeatureConfig,
    origin: String,
    proxy_endpoint: String,
    package: Option<String>,
    fetcher: Option<Arc<dyn HttpFetcher>>,
    package_config: Option<Arc<dyn PackageConfigStore>>,
    versions: Option<Arc<dyn VersionStore>>,
    runner: Option<Arc<dyn CommandRunner>>,
}

impl SandboxBuilder {
    #[must_use]
    pub fn terminal(mut self, terminal: Option<Arc<dyn Terminal>>) -> Self {
        self.terminal = terminal;
        self
    }

    #[must_use]
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub const fn features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    /// Origin that relative proxy endpoints resolve against.
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    #[must_use]
    pub fn proxy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.proxy_endpoint = endpoint.into();
        self
    }

    /// Package the executable belongs to. Enables `config.get`/`config.set`.
    #[must_use]
    pub fn package(mut self, package: Option<String>) -> Self {
        self.package = package;
        self
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[must_use]
    pub fn package_config(mut self, store: Arc<dyn PackageConfigStore>) -> Self {
        self.package_config = Some(store);
        self
    }

    #[must_use]
    pub fn versions(mut self, store: Arc<dyn VersionStore>) -> Self {
        self.versions = Some(store);
        self
    }

    #[must_use]
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn build(self) -> Sandbox {
        Sandbox {
            output: Output::new(self.terminal.clone()),
            terminal: self.terminal,
            cwd: self.vfs.cwd(),
            vfs: self.vfs,
            args: self.args,
            env: self.env,
            features: self.features,
            origin: self.origin,
            proxy_endpoint: self.proxy_endpoint,
            package: self.package,
            fetcher: self
                .fetcher
                .unwrap_or_else(|| Arc::new(ReqwestFetcher::new())),
            package_config: self
                .package_config
                .unwrap_or_else(|| Arc::new(MemoryPackageConfigStore::new())),
            versions: self
                .versions
                .unwrap_or_else(|| Arc::new(MemoryVersionStore::new())),
            runner: self.runner,
        }
    }
}

impl Sandbox {
    pub fn builder(vfs: Arc<dyn Vfs>) -> SandboxBuilder {
        SandboxBuilder {
            terminal: None,
            vfs,
            args: Vec::new(),
            env: HashMap::new(),
            features: FeatureConfig::default(),
            origin: SandboxConfig::default().origin,
            proxy_endpoint: SandboxConfig::default().proxy_endpoint,
            package: None,
            fetcher: None,
            package_config: None,
            versions: None,
            runner: None,
        }
    }

    /// Everything the program wrote so far. Drains the capture buffer.
    pub fn take_output(&self) -> String {
        self.output.take()
    }

    /// Whether writes were already shown on a terminal.
    pub fn is_live(&self) -> bool {
        self.output.is_live()
    }

    fn cursor(&self) -> CursorPosition {
        self.terminal
            .as_ref()
            .map_or_else(CursorPosition::default, |t| t.cursor())
    }

    fn size(&self) -> TerminalSize {
        self.terminal
            .as_ref()
            .map_or_else(TerminalSize::default, |t| t.size())
    }

    async fn call_root(&self, method: &str, args: &[Value]) -> ScriptResult<Value> {
        match method {
            "write" => self.output.write(&text_arg(args, 0)),
            "writeln" => self.output.write(&format!("{}\n", text_arg(args, 0))),
            "clear" => self.output.clear(),
            "clearLine" => self.output.clear_line(),
            "moveTo" => {
                if let Some(terminal) = &self.terminal {
                    terminal.move_to(coordinate(args, 0), coordinate(args, 1));
                }
            }
            "moveBy" => {
                if let Some(terminal) = &self.terminal {
                    terminal.move_by(delta(args, 0), delta(args, 1));
                }
            }
            "getCursor" => {
                let pos = self.cursor();
                return Ok(Value::object([
                    ("x", Value::Number(f64::from(pos.x))),
                    ("y", Value::Number(f64::from(pos.y))),
                ]));
            }
            "getSize" => {
                let size = self.size();
                return Ok(Value::object([
                    ("cols", Value::Number(f64::from(size.cols))),
                    ("rows", Value::Number(f64::from(size.rows))),
                ]));
            }
            "readLine" => {
                let Some(terminal) = &self.terminal else {
                    return Ok(Value::string(""));
                };
                let prompt = text_arg(args, 0);
                return Ok(Value::String(input::read_line(terminal.as_ref(), &prompt).await));
            }
            "readKey" | "readChar" => {
                let Some(terminal) = &self.terminal else {
                    return Ok(Value::string(""));
                };
                let text = if method == "readKey" {
                    input::read_key(terminal.as_ref()).await
                } else {
                    input::read_char(terminal.as_ref()).await
                };
                return Ok(Value::String(text));
            }
            "hasInput" => {
                return Ok(Value::Bool(
                    self.terminal.as_ref().is_some_and(|t| t.has_pending_input()),
                ));
            }
            "hasSelection" => {
                return Ok(Value::Bool(
                    self.terminal.as_ref().is_some_and(|t| t.has_selection()),
                ));
            }
            "getSelection" => {
                let text = self.terminal.as_ref().map(|t| t.selection()).unwrap_or_default();
                return Ok(Value::String(text));
            }
            "clearSelection" => {
                if let Some(terminal) = &self.terminal {
                    terminal.clear_selection();
                }
            }
            "exit" => {
                let code = args.first().map_or(0, Value::to_integer);
                return Err(ScriptError::Exit(i32::try_from(code).unwrap_or(1)));
            }
            "sleep" => {
                let ms = args.first().map_or(0, Value::to_integer).max(0);
                tokio::time::sleep(Duration::from_millis(ms.unsigned_abs())).await;
            }
            "exec" => return Ok(self.exec(&text_arg(args, 0)).await),
            _ => return Err(not_a_function("", method)),
        }
        Ok(Value::Undefined)
    }

    async fn exec(&self, line: &str) -> Value {
        let result = match &self.runner {
            Some(runner) => runner.run_line(line).await,
            None => CommandResult::failure("exec: no command runner available", 127),
        };
        Value::object([
            ("stdout", Value::String(result.stdout)),
            ("stderr", Value::String(result.stderr)),
            ("exitCode", Value::Number(f64::from(result.exit_code))),
        ])
    }

    async fn call_net(&self, method: &str, args: &[Value]) -> ScriptResult<Value> {
        if !self.features.network {
            return Err(ScriptError::error("network access is not available"));
        }
        let target = text_arg(args, 0);
        let url = match method {
            "fetch" => target,
            "proxyFetch" => proxy_url(&self.origin, &self.proxy_endpoint, &target)
                .map_err(ScriptError::error)?,
            _ => return Err(not_a_function("net", method)),
        };
        let request = FetchRequest::from_script(&url, args.get(1));
        debug!(method = %request.method, url = %request.url, "sandbox fetch");
        self.fetcher
            .fetch(request)
            .await
            .map(|resp| resp.to_value())
            .map_err(ScriptError::error)
    }

    async fn call_config(&self, method: &str, args: &[Value]) -> ScriptResult<Value> {
        let key = text_arg(args, 0);
        match method {
            "get" => {
                let Some(package) = &self.package else {
                    return Ok(Value::Undefined);
                };
                let value = self
                    .package_config
                    .get(package, &key)
                    .await
                    .map_err(ScriptError::error)?;
                Ok(value.map_or(Value::Undefined, Value::from_json))
            }
            "set" => {
                let Some(package) = &self.package else {
                    return Ok(Value::Bool(false));
                };
                let value = args
                    .get(1)
                    .and_then(Value::to_json)
                    .unwrap_or(serde_json::Value::Null);
                self.package_config
                    .set(package, &key, value)
                    .await
                    .map_err(ScriptError::error)?;
                Ok(Value::Bool(true))
            }
            _ => Err(not_a_function("config", method)),
        }
    }

    async fn call_timewarp(&self, method: &str, args: &[Value]) -> ScriptResult<Value> {
        let path = self.vfs.resolve(&text_arg(args, 0));
        let namespace = self.vfs.namespace();
        match method {
            "list" => {
                let versions = self
                    .versions
                    .list(namespace, &path)
                    .await
                    .map_err(ScriptError::error)?;
                Ok(Value::Array(versions.iter().map(version_value).collect()))
            }
            "get" => {
                let content = self
                    .versions
                    .get(namespace, &path, &text_arg(args, 1))
                    .await
                    .map_err(ScriptError::error)?;
                Ok(content.map_or(Value::Undefined, Value::String))
            }
            "save" => {
                let content = self
                    .vfs
                    .read(&path)
                    .await
                    .map_err(|e| ScriptError::error(e.to_string()))?;
                let message = args.get(1).filter(|m| !m.is_nullish()).map(ToString::to_string);
                let id = self
                    .versions
                    .save(namespace, &path, &content, message.as_deref())
                    .await
                    .map_err(ScriptError::error)?;
                Ok(Value::String(id))
            }
            "hasHistory" => self
                .versions
                .has_history(namespace, &path)
                .await
                .map(Value::Bool)
                .map_err(ScriptError::error),
            _ => Err(not_a_function("timewarp", method)),
        }
    }
}

#[async_trait]
impl Host for Sandbox {
    fn get(&self, object: &str, name: &str) -> Option<Value> {
        if !object.is_empty() {
            return None;
        }
        match name {
            "args" => Some(Value::Array(
                self.args.iter().map(|a| Value::string(a)).collect(),
            )),
            "env" => Some(Value::object(
                self.env.iter().map(|(k, v)| (k.clone(), Value::string(v))),
            )),
            "cwd" => Some(Value::string(&self.cwd)),
            group if GROUPS.contains(&group) => Some(Value::Host(HostObject::new(group))),
            _ => None,
        }
    }

    fn has_method(&self, object: &str, name: &str) -> bool {
        match object {
            "" => ROOT_METHODS.contains(&name),
            "fs" => fs::METHODS.contains(&name),
            "style" => style::is_style(name),
            "net" => matches!(name, "fetch" | "proxyFetch"),
            "config" => matches!(name, "get" | "set"),
            "timewarp" => matches!(name, "list" | "get" | "save" | "hasHistory"),
            _ => false,
        }
    }

    async fn call(&self, object: &str, method: &str, args: Vec<Value>) -> ScriptResult<Value> {
        match object {
            "" => self.call_root(method, &args).await,
            "fs" => fs::call(self.vfs.as_ref(), method, &args).await,
            "style" => style::apply(method, &text_arg(&args, 0))
                .map(Value::String)
                .ok_or_else(|| not_a_function("style", method)),
            "net" => self.call_net(method, &args).await,
            "config" => self.call_config(method, &args).await,
            "timewarp" => self.call_timewarp(method, &args).await,
            _ => Err(not_a_function(object, method)),
        }
    }
}

fn not_a_function(object: &str, method: &str) -> ScriptError {
    if object.is_empty() {
        ScriptError::Type(format!("{method} is not a function"))
    } else {
        ScriptError::Type(format!("{object}.{method} is not a function"))
    }
}

/// String form of an argument; missing or `undefined` is empty.
fn text_arg(args: &[Value], index: usize) -> String {
    match args.get(index) {
        None | Some(Value::Undefined) => String::new(),
        Some(value) => value.to_string(),
    }
}

fn coordinate(args: &[Value], index: usize) -> u16 {
    let n = args.get(index).map_or(0, Value::to_integer);
    u16::try_from(n.clamp(0, i64::from(u16::MAX))).unwrap_or(0)
}

fn delta(args: &[Value], index: usize) -> i32 {
    let n = args.get(index).map_or(0, Value::to_integer);
    i32::try_from(n.clamp(i64::from(i32::MIN), i64::from(i32::MAX))).unwrap_or(0)
}

#[allow(clippy::cast_precision_loss)]
fn version_value(version: &FileVersion) -> Value {
    Value::object([
        ("id", Value::string(&version.id)),
        ("timestamp", Value::Number(version.timestamp as f64)),
        ("size", Value::Number(version.size as f64)),
        (
            "message",
            version
                .message
                .as_ref()
                .map_or(Value::Null, |m| Value::string(m)),
        ),
    ])
}
