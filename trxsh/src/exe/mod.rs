//! Executable files: header parsing, requirement checks and sandboxed runs
//!
//! An executable is a VFS text file ending in `.trx` or `.exe`:
//!
//! ```text
//! #!/usr/bin/env trx
//! // @name: greet
//! // @requires: network
//! async function(api) {
//!   api.writeln(`hello ${api.args[0]}`);
//! }
//! ```

pub mod body;
pub mod features;
pub mod metadata;

pub use body::{extract_body, ExeBody};
pub use features::{is_feature_available, missing_features};
pub use metadata::{parse_metadata, ExecutableMetadata, ParsedExecutable};

use crate::context::{CommandResult, ExecutionContext};
use crate::sandbox::{
    CommandRunner, HttpFetcher, MemoryPackageConfigStore, MemoryVersionStore, PackageConfigStore,
    ReqwestFetcher, Sandbox, VersionStore,
};
use crate::script::{self, ScriptError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use trx_config::SandboxConfig;
use trx_vfs::path;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExeError {
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("invalid executable format: {0}")]
    InvalidFormat(String),
}

/// Long-lived services shared by every executable run.
#[derive(Clone)]
pub struct ExeServices {
    pub config: SandboxConfig,
    pub fetcher: Arc<dyn HttpFetcher>,
    pub package_config: Arc<dyn PackageConfigStore>,
    pub versions: Arc<dyn VersionStore>,
}

impl ExeServices {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            fetcher: Arc::new(ReqwestFetcher::new()),
            package_config: Arc::new(MemoryPackageConfigStore::new()),
            versions: Arc::new(MemoryVersionStore::new()),
        }
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }
}

impl Default for ExeServices {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

/// Package owning an executable: the first directory below `packages_dir`.
///
/// `/usr/lib/trx/weather/weather.trx` belongs to `weather`; files directly in
/// `packages_dir` belong to no package.
pub fn package_name(exe_path: &str, packages_dir: &str) -> Option<String> {
    let root = path::normalize(packages_dir);
    let rest = exe_path
        .strip_prefix(root.trim_end_matches('/'))?
        .strip_prefix('/')?;
    let (package, _) = rest.split_once('/')?;
    (!package.is_empty()).then(|| package.to_string())
}

/// Run the executable at `exe_path` with `args`.
///
/// Every failure is reported on the result: unreadable files, bad headers,
/// unmet requirements and uncaught script errors exit 1. `exit(code)` inside
/// the program ends it with that code.
pub async fn run_executable(
    exe_path: &str,
    args: &[String],
    ctx: &ExecutionContext,
    services: &ExeServices,
    runner: Arc<dyn CommandRunner>,
) -> CommandResult {
    let display = path::file_name(exe_path);
    let source = match ctx.vfs.read(exe_path).await {
        Ok(source) => source,
        Err(e) => return CommandResult::failure(format!("{display}: {e}"), 1),
    };

    let parsed = match parse_metadata(&source) {
        Ok(parsed) => parsed,
        Err(e) => return CommandResult::failure(format!("{display}: {e}"), 1),
    };
    let name = parsed.metadata.name.as_str();

    let missing = missing_features(&parsed.metadata.requires, &services.config.features);
    if !missing.is_empty() {
        return CommandResult::failure(
            format!("{name}: missing required features: {}", missing.join(", ")),
            1,
        );
    }

    let body = match extract_body(&parsed.body) {
        Ok(body) => body,
        Err(e) => return CommandResult::failure(format!("{name}: {e}"), 1),
    };

    let package = package_name(exe_path, &services.config.packages_dir);
    debug!(path = exe_path, name, ?package, "running executable");

    let sandbox = Arc::new(
        Sandbox::builder(Arc::clone(&ctx.vfs))
            .terminal(ctx.terminal.clone())
            .args(args.to_vec())
            .env(ctx.env.clone())
            .features(services.config.features)
            .origin(services.config.origin.clone())
            .proxy_endpoint(services.config.proxy_endpoint.clone())
            .package(package)
            .fetcher(Arc::clone(&services.fetcher))
            .package_config(Arc::clone(&services.package_config))
            .versions(Arc::clone(&services.versions))
            .runner(runner)
            .build(),
    );

    let outcome = script::run(&body.code, &body.param, sandbox.clone()).await;
    let mut result = CommandResult::ok(sandbox.take_output());
    result.direct_output = sandbox.is_live();
    match outcome {
        Ok(_) => {}
        Err(ScriptError::Exit(code)) => result.exit_code = code,
        Err(e) => {
            debug!(name, error = %e, "executable failed");
            result.stderr = format!("{name}: {e}");
            result.exit_code = 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::BufferTerminal;
    use async_trait::async_trait;
    use trx_config::FeatureConfig;
    use trx_vfs::MemoryVfs;

    struct NoRunner;

    #[async_trait]
    impl CommandRunner for NoRunner {
        async fn run_line(&self, _line: &str) -> CommandResult {
            CommandResult::failure("unavailable", 127)
        }
    }

    fn context() -> ExecutionContext {
        let vfs = MemoryVfs::new("test").with_dirs(&["/bin", "/usr/lib/trx/weather"]);
        ExecutionContext::new(Arc::new(vfs))
    }

    async fn run(ctx: &ExecutionContext, path: &str, source: &str, args: &[&str]) -> CommandResult {
        run_with(ctx, path, source, args, &ExeServices::default()).await
    }

    async fn run_with(
        ctx: &ExecutionContext,
        path: &str,
        source: &str,
        args: &[&str],
        services: &ExeServices,
    ) -> CommandResult {
        ctx.vfs.write(path, source).await.unwrap();
        let args: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();
        run_executable(path, &args, ctx, services, Arc::new(NoRunner)).await
    }

    #[test]
    fn test_package_name() {
        assert_eq!(
            package_name("/usr/lib/trx/weather/weather.trx", "/usr/lib/trx"),
            Some("weather".to_string())
        );
        assert_eq!(
            package_name("/usr/lib/trx/weather/bin/w.trx", "/usr/lib/trx/"),
            Some("weather".to_string())
        );
        assert_eq!(package_name("/usr/lib/trx/loose.trx", "/usr/lib/trx"), None);
        assert_eq!(package_name("/usr/lib/trxx/a/b.trx", "/usr/lib/trx"), None);
        assert_eq!(package_name("/bin/x.trx", "/usr/lib/trx"), None);
    }

    #[tokio::test]
    async fn test_hello_program() {
        let ctx = context();
        let source = "// @name: hello\nasync function(api) { api.writeln(`hi ${api.args[0]}`); }";
        let result = run(&ctx, "/bin/hello.trx", source, &["bob"]).await;
        assert_eq!(result.stdout, "hi bob\n");
        assert_eq!(result.exit_code, 0);
        assert!(!result.direct_output);
    }

    #[tokio::test]
    async fn test_live_output_with_terminal() {
        let term = Arc::new(BufferTerminal::new());
        let ctx = context().with_terminal(term.clone());
        let source = "// @name: live\nasync function(api) { api.write('streamed'); }";
        let result = run(&ctx, "/bin/live.trx", source, &[]).await;
        assert!(result.direct_output);
        assert_eq!(result.stdout, "streamed");
        assert_eq!(term.output(), "streamed");
    }

    #[tokio::test]
    async fn test_exit_code_and_output_before_exit() {
        let ctx = context();
        let source = "// name: quit\n(async function(t) { t.write('partial'); t.exit(3); t.write('never'); });";
        let result = run(&ctx, "/bin/quit.exe", source, &[]).await;
        assert_eq!(result.stdout, "partial");
        assert_eq!(result.exit_code, 3);
        assert!(result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_missing_name() {
        let ctx = context();
        let result = run(&ctx, "/bin/anon.trx", "// @version: 1\nasync function(a) {}", &[]).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("missing required field: name"));
    }

    #[tokio::test]
    async fn test_unmet_requirement() {
        let ctx = context();
        let mut services = ExeServices::default();
        services.config.features = FeatureConfig {
            network: false,
            ..FeatureConfig::default()
        };
        let source = "// @name: net\n// @requires: network\nasync function(a) { a.write('x'); }";
        let result = run_with(&ctx, "/bin/net.trx", source, &[], &services).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.contains("network"));
    }

    #[tokio::test]
    async fn test_uncaught_error() {
        let ctx = context();
        let source = "// @name: boom\nasync function(a) { a.write('x'); throw new Error('kaput'); }";
        let result = run(&ctx, "/bin/boom.trx", source, &[]).await;
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stdout, "x");
        assert!(result.stderr.contains("kaput"));
    }

    #[tokio::test]
    async fn test_oversized_allocations_exit_with_range_error() {
        let ctx = context();
        let cases = [
            ("a.write('ab'.repeat(1e18));", "Invalid string length"),
            ("a.write('x'.padStart(1e15));", "Invalid string length"),
            ("const x = []; x.length = 1e18;", "Invalid array length"),
            ("const x = []; x[1e15] = 1;", "Invalid array length"),
            ("const x = new Array(1e12);", "Invalid array length"),
            ("const x = Array.from({ length: 1e12 });", "Invalid array length"),
        ];
        for (body, message) in cases {
            let source = format!("// @name: big\nasync function(a) {{ {body} a.write('unreachable'); }}");
            let result = run(&ctx, "/bin/big.trx", &source, &[]).await;
            assert_eq!(result.exit_code, 1, "{body}");
            assert!(result.stdout.is_empty(), "{body}");
            assert!(
                result.stderr.contains(&format!("RangeError: {message}")),
                "{body}: {}",
                result.stderr
            );
        }
    }

    #[tokio::test]
    async fn test_const_array_methods_mutate() {
        let ctx = context();
        let source = "// @name: list\nasync function(a) {\n  const items = [3, 1];\n  items.push(2);\n  items.sort();\n  a.write(items.join(','));\n}";
        let result = run(&ctx, "/bin/list.trx", source, &[]).await;
        assert_eq!(result.exit_code, 0, "{}", result.stderr);
        assert_eq!(result.stdout, "1,2,3");
    }

    #[tokio::test]
    async fn test_bad_body() {
        let ctx = context();
        let result = run(&ctx, "/bin/bad.trx", "// @name: bad\nconsole.log(1)", &[]).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("invalid executable format"));
    }

    #[tokio::test]
    async fn test_package_config_persists_across_runs() {
        let ctx = context();
        let services = ExeServices::default();
        let path = "/usr/lib/trx/weather/weather.trx";
        let source = "// @name: weather\nasync function(a) {\n  const n = (a.config.get('runs') || 0) + 1;\n  a.config.set('runs', n);\n  a.write(`${n}`);\n}";
        assert_eq!(run_with(&ctx, path, source, &[], &services).await.stdout, "1");
        assert_eq!(run_with(&ctx, path, source, &[], &services).await.stdout, "2");
    }
}
