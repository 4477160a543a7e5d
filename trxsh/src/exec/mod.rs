//! AST executor
//!
//! Walks parsed [`Node`]s and always produces a [`CommandResult`]. Nothing in
//! here touches shell state: env, alias and directory changes travel back as
//! [`ShellMutation`](crate::ShellMutation)s for the shell to apply.

pub mod resolve;

use crate::ast::{LogicalOp, Node, Pipeline, Redirect, RedirectMode, SimpleCommand};
use crate::builtins::BuiltinName;
use crate::context::{CommandResult, ExecutionContext};
use crate::exe::{run_executable, ExeServices};
use crate::parser::parse_line;
use crate::sandbox::CommandRunner;
use async_trait::async_trait;
use resolve::resolve_executable;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Deepest chain of `exec` calls an executable may start.
pub const MAX_EXEC_DEPTH: usize = 8;

#[derive(Clone, Default)]
pub struct Executor {
    services: ExeServices,
}

impl Executor {
    pub fn new(services: ExeServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &ExeServices {
        &self.services
    }

    fn execute_boxed<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = CommandResult> + Send + 'a>> {
        Box::pin(self.execute(node, ctx))
    }

    pub async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> CommandResult {
        match node {
            Node::Simple(cmd) => self.execute_command(cmd, ctx).await,
            Node::Pipeline(pipeline) => self.execute_pipeline(pipeline, ctx).await,
            Node::Logical { left, op, right } => {
                let left = self.execute_boxed(left, ctx).await;
                let run_right = match op {
                    LogicalOp::And => left.exit_code == 0,
                    LogicalOp::Or => left.exit_code != 0,
                };
                if !run_right {
                    return left;
                }
                let right = self.execute_boxed(right, ctx).await;
                merge(left, right)
            }
        }
    }

    /// Parse and run a full line in `ctx`, the way `exec(line)` does.
    ///
    /// Top-level nodes run in order and their results are merged. Mutations
    /// are carried on the result but nothing applies them.
    pub async fn run_line(&self, line: &str, ctx: &ExecutionContext) -> CommandResult {
        if ctx.depth > MAX_EXEC_DEPTH {
            return CommandResult::failure("trxsh: maximum exec depth exceeded", 1);
        }
        let nodes = match parse_line(line, &ctx.aliases, &ctx.env) {
            Ok(nodes) => nodes,
            Err(e) => return CommandResult::failure(format!("trxsh: syntax error: {e}"), 2),
        };
        let mut combined: Option<CommandResult> = None;
        for node in &nodes {
            let result = self.execute(node, ctx).await;
            combined = Some(match combined {
                Some(previous) => merge(previous, result),
                None => result,
            });
        }
        combined.unwrap_or_default()
    }

    async fn execute_pipeline(&self, pipeline: &Pipeline, ctx: &ExecutionContext) -> CommandResult {
        let mut stdin = ctx.stdin.clone();
        let mut stderr = Vec::new();
        let mut mutations = Vec::new();
        let mut last = CommandResult::success();

        for (i, stage) in pipeline.stages.iter().enumerate() {
            let mut stage_ctx = ctx.with_stdin(std::mem::take(&mut stdin));
            if i + 1 < pipeline.stages.len() {
                stage_ctx.terminal = None;
            }
            let mut result = self.execute_command(stage, &stage_ctx).await;
            debug!(stage = i, command = %stage.name, exit_code = result.exit_code, "pipeline stage");

            if !result.stderr.is_empty() {
                stderr.push(result.stderr.trim_end_matches('\n').to_string());
            }
            mutations.append(&mut result.mutations);
            if i + 1 < pipeline.stages.len() && result.is_success() {
                stdin = std::mem::take(&mut result.stdout);
            }
            last = result;
        }

        last.stderr = stderr.join("\n");
        last.mutations = mutations;
        last
    }

    pub async fn execute_command(&self, cmd: &SimpleCommand, ctx: &ExecutionContext) -> CommandResult {
        let mut ctx = match &cmd.input {
            Some(file) => match read_input(file, ctx).await {
                Ok(stdin) => ctx.with_stdin(stdin),
                Err(result) => return result,
            },
            None => ctx.clone(),
        };
        // Redirected output must not reach the terminal.
        if !cmd.redirects.is_empty() {
            ctx.terminal = None;
        }
        let ctx = &ctx;

        let result = self.dispatch(cmd, ctx).await;
        apply_redirects(&cmd.redirects, result, ctx).await
    }

    async fn dispatch(&self, cmd: &SimpleCommand, ctx: &ExecutionContext) -> CommandResult {
        if let Some(builtin) = BuiltinName::lookup(&cmd.name) {
            debug!(command = %cmd.name, "builtin");
            return (builtin.handler())(&cmd.args, ctx).await;
        }

        let Some(path) = resolve_executable(&cmd.name, ctx.vfs.as_ref(), ctx.var("PATH")) else {
            debug!(command = %cmd.name, "command not found");
            return CommandResult::failure(format!("{}: command not found", cmd.name), 127);
        };
        let runner = Arc::new(LineRunner {
            executor: self.clone(),
            ctx: nested(ctx),
        });
        run_executable(&path, &cmd.args, ctx, &self.services, runner).await
    }
}

/// `exec(line)` target: runs lines one level deeper, without a terminal.
struct LineRunner {
    executor: Executor,
    ctx: ExecutionContext,
}

#[async_trait]
impl CommandRunner for LineRunner {
    async fn run_line(&self, line: &str) -> CommandResult {
        self.executor.run_line(line, &self.ctx).await
    }
}

fn nested(ctx: &ExecutionContext) -> ExecutionContext {
    let mut nested = ctx.without_terminal().with_stdin(String::new());
    nested.depth += 1;
    nested
}

/// Combine two results that ran one after the other.
///
/// Text already streamed to the terminal is not repeated: when only one side
/// streamed, the combined stdout holds the other side's text.
fn merge(first: CommandResult, second: CommandResult) -> CommandResult {
    let stdout = match (first.direct_output, second.direct_output) {
        (true, false) => second.stdout,
        (false, true) => first.stdout,
        _ => first.stdout + &second.stdout,
    };
    let stderr = match (first.stderr.is_empty(), second.stderr.is_empty()) {
        (true, _) => second.stderr,
        (false, true) => first.stderr,
        (false, false) => format!("{}\n{}", first.stderr.trim_end_matches('\n'), second.stderr),
    };
    let mut mutations = first.mutations;
    mutations.extend(second.mutations);
    CommandResult {
        stdout,
        stderr,
        exit_code: second.exit_code,
        ui_request: second.ui_request.or(first.ui_request),
        direct_output: first.direct_output && second.direct_output,
        mutations,
    }
}

async fn read_input(file: &str, ctx: &ExecutionContext) -> Result<String, CommandResult> {
    ctx.vfs.read(file).await.map_err(|e| {
        let reason = if e.is_directory_error() {
            "Is a directory"
        } else if e.is_not_found() {
            "No such file or directory"
        } else {
            return CommandResult::failure(format!("trxsh: {file}: {e}"), 1);
        };
        CommandResult::failure(format!("trxsh: {file}: {reason}"), 1)
    })
}

/// Send stdout to the redirect targets and blank it.
///
/// Every target is created or truncated in order; the last one receives the
/// output.
async fn apply_redirects(
    redirects: &[Redirect],
    mut result: CommandResult,
    ctx: &ExecutionContext,
) -> CommandResult {
    let Some((last, earlier)) = redirects.split_last() else {
        return result;
    };
    let stdout = std::mem::take(&mut result.stdout);
    for (redirect, content) in earlier
        .iter()
        .map(|r| (r, ""))
        .chain(std::iter::once((last, stdout.as_str())))
    {
        let written = match redirect.mode {
            RedirectMode::Overwrite => ctx.vfs.write(&redirect.target, content).await,
            RedirectMode::Append => ctx.vfs.append(&redirect.target, content).await,
        };
        if let Err(e) = written {
            warn!(target = %redirect.target, error = %e, "redirect failed");
            let message = format!("trxsh: {}: {e}", redirect.target);
            result.stderr = if result.stderr.is_empty() {
                message
            } else {
                format!("{}\n{message}", result.stderr.trim_end_matches('\n'))
            };
            result.exit_code = 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ShellMutation;
    use trx_vfs::{MemoryVfs, Vfs};

    fn context() -> ExecutionContext {
        let vfs = MemoryVfs::new("test").with_dirs(&["/bin", "/usr/bin", "/home/user", "/tmp"]);
        vfs.set_cwd("/home/user").unwrap();
        let mut ctx = ExecutionContext::new(Arc::new(vfs));
        ctx.env.insert("PATH".to_string(), "/bin:/usr/bin".to_string());
        ctx
    }

    async fn run(ctx: &ExecutionContext, line: &str) -> CommandResult {
        Executor::default().run_line(line, ctx).await
    }

    async fn install(ctx: &ExecutionContext, path: &str, name: &str, body: &str) {
        let source = format!("// @name: {name}\nasync function(api) {{ {body} }}");
        ctx.vfs.write(path, &source).await.unwrap();
    }

    #[tokio::test]
    async fn test_simple_builtin() {
        let ctx = context();
        let result = run(&ctx, "echo hello world").await;
        assert_eq!(result.stdout, "hello world\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_command_not_found() {
        let ctx = context();
        let result = run(&ctx, "nosuch arg").await;
        assert_eq!(result.exit_code, 127);
        assert_eq!(result.stderr, "nosuch: command not found");
    }

    #[tokio::test]
    async fn test_pipeline_threads_stdout() {
        let ctx = context();
        let result = run(&ctx, "echo a b c | wc -w").await;
        assert_eq!(result.stdout.trim(), "3");
    }

    #[tokio::test]
    async fn test_pipeline_exit_code_is_last_stage() {
        let ctx = context();
        assert_eq!(run(&ctx, "false | true").await.exit_code, 0);
        assert_eq!(run(&ctx, "true | false").await.exit_code, 1);
    }

    #[tokio::test]
    async fn test_pipeline_joins_stderr() {
        let ctx = context();
        let result = run(&ctx, "cat /nope1 | cat /nope2").await;
        let lines: Vec<&str> = result.stderr.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("/nope1"));
        assert!(lines[1].contains("/nope2"));
    }

    #[tokio::test]
    async fn test_failed_stage_passes_empty_stdin() {
        let ctx = context();
        install(&ctx, "/bin/half.trx", "half", "api.write('partial'); api.exit(1);").await;
        let result = run(&ctx, "half | wc -c").await;
        assert_eq!(result.stdout.trim(), "0");
    }

    #[tokio::test]
    async fn test_only_final_stage_streams() {
        let term = Arc::new(crate::terminal::BufferTerminal::new());
        let ctx = context().with_terminal(term.clone());
        install(&ctx, "/bin/two.trx", "two", "api.writeln('a'); api.writeln('b');").await;

        let piped = run(&ctx, "two | grep b").await;
        assert_eq!(term.take_output(), "");
        assert_eq!(piped.stdout, "b\n");

        let redirected = run(&ctx, "two > out.txt").await;
        assert_eq!(term.take_output(), "");
        assert!(redirected.stdout.is_empty());
        assert_eq!(ctx.vfs.read("out.txt").await.unwrap(), "a\nb\n");

        let live = run(&ctx, "two").await;
        assert!(live.direct_output);
        assert_eq!(term.take_output(), "a\nb\n");
    }

    #[tokio::test]
    async fn test_logical_short_circuit() {
        let ctx = context();
        assert_eq!(run(&ctx, "false && echo x").await.stdout, "");
        assert_eq!(run(&ctx, "true || echo x").await.stdout, "");
        assert_eq!(run(&ctx, "false || echo y").await.stdout, "y\n");
        let result = run(&ctx, "echo a && echo b").await;
        assert_eq!(result.stdout, "a\nb\n");
    }

    #[tokio::test]
    async fn test_logical_keeps_both_mutations() {
        let ctx = context();
        let result = run(&ctx, "export A=1 && alias g=grep").await;
        assert_eq!(
            result.mutations,
            vec![
                ShellMutation::SetEnv {
                    name: "A".to_string(),
                    value: "1".to_string()
                },
                ShellMutation::AddAlias {
                    name: "g".to_string(),
                    value: "grep".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_redirects() {
        let ctx = context();
        let result = run(&ctx, "echo hello > f.txt").await;
        assert_eq!(result.stdout, "");
        assert_eq!(ctx.vfs.read("/home/user/f.txt").await.unwrap(), "hello\n");

        run(&ctx, "echo again >> f.txt").await;
        assert_eq!(ctx.vfs.read("f.txt").await.unwrap(), "hello\nagain\n");

        run(&ctx, "echo last > a.txt > b.txt").await;
        assert_eq!(ctx.vfs.read("a.txt").await.unwrap(), "");
        assert_eq!(ctx.vfs.read("b.txt").await.unwrap(), "last\n");
    }

    #[tokio::test]
    async fn test_pipeline_redirect_applies_to_output() {
        let ctx = context();
        let result = run(&ctx, "echo one two | wc -w > count.txt").await;
        assert_eq!(result.stdout, "");
        assert_eq!(ctx.vfs.read("count.txt").await.unwrap().trim(), "2");
    }

    #[tokio::test]
    async fn test_redirect_into_directory_fails() {
        let ctx = context();
        let result = run(&ctx, "echo x > /tmp").await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("/tmp"));
    }

    #[tokio::test]
    async fn test_input_redirect() {
        let ctx = context();
        ctx.vfs.write("in.txt", "l1\nl2\nl3\n").await.unwrap();
        assert_eq!(run(&ctx, "wc -l <in.txt").await.stdout.trim(), "3");
        assert_eq!(run(&ctx, "head -n 1 < in.txt").await.stdout, "l1\n");

        let missing = run(&ctx, "cat <nope.txt").await;
        assert_eq!(missing.exit_code, 1);
        assert!(missing.stderr.contains("No such file or directory"));

        let dir = run(&ctx, "cat </tmp").await;
        assert_eq!(dir.exit_code, 1);
        assert!(dir.stderr.contains("Is a directory"));
    }

    #[tokio::test]
    async fn test_builtin_wins_over_path() {
        let ctx = context();
        install(&ctx, "/bin/echo.trx", "fake", "api.write('fake');").await;
        assert_eq!(run(&ctx, "echo real").await.stdout, "real\n");
    }

    #[tokio::test]
    async fn test_path_order() {
        let ctx = context();
        install(&ctx, "/bin/tool.exe", "first", "api.write('bin');").await;
        install(&ctx, "/usr/bin/tool.trx", "second", "api.write('usr');").await;
        assert_eq!(run(&ctx, "tool").await.stdout, "bin");
        assert_eq!(run(&ctx, "/usr/bin/tool.trx").await.stdout, "usr");
    }

    #[tokio::test]
    async fn test_executable_reads_stdin_via_exec() {
        let ctx = context();
        install(
            &ctx,
            "/bin/count.trx",
            "count",
            "const r = await api.exec('echo x y | wc -w'); api.write(r.stdout.trim());",
        )
        .await;
        assert_eq!(run(&ctx, "count").await.stdout, "2");
    }

    #[tokio::test]
    async fn test_exec_depth_is_bounded() {
        let ctx = context();
        install(
            &ctx,
            "/bin/loop.trx",
            "loop",
            "const r = await api.exec('loop'); api.write(r.stdout + r.stderr); api.exit(r.exitCode);",
        )
        .await;
        let result = run(&ctx, "loop").await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stdout.contains("maximum exec depth exceeded"));
    }

    #[tokio::test]
    async fn test_syntax_error() {
        let ctx = context();
        let result = run(&ctx, "echo 'open").await;
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.starts_with("trxsh: syntax error:"));
    }

    #[test]
    fn test_merge_skips_streamed_text() {
        let streamed = CommandResult {
            stdout: "live".to_string(),
            direct_output: true,
            ..CommandResult::default()
        };
        let merged = merge(streamed, CommandResult::ok("buffered"));
        assert_eq!(merged.stdout, "buffered");
        assert!(!merged.direct_output);
    }
}
