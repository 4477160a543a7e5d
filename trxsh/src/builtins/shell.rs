use super::{describe, lines_output, ready, split_flags, BuiltinFuture, BuiltinName};
use crate::context::{CommandResult, ExecutionContext, ShellMutation};
use crate::exec::resolve::resolve_executable;
use crate::help;
use std::time::Duration;

pub(super) fn cmd_true<'a>(_args: &'a [String], _ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    ready(CommandResult::success())
}

pub(super) fn cmd_false<'a>(_args: &'a [String], _ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    ready(CommandResult::success().with_exit_code(1))
}

pub(super) fn cmd_echo<'a>(args: &'a [String], _ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let mut newline = true;
    let mut escapes = false;
    let mut start = 0;
    for arg in args {
        let Some(flags) = arg.strip_prefix('-') else {
            break;
        };
        if flags.is_empty() || !flags.chars().all(|c| c == 'n' || c == 'e') {
            break;
        }
        newline &= !flags.contains('n');
        escapes |= flags.contains('e');
        start += 1;
    }

    let text = args[start..].join(" ");
    let mut out = if escapes { unescape(&text) } else { text };
    if newline {
        out.push('\n');
    }
    ready(CommandResult::ok(out))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('e') => out.push('\x1b'),
            Some('a') => out.push('\x07'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub(super) fn cmd_pwd<'a>(_args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    ready(CommandResult::ok(format!("{}\n", ctx.cwd())))
}

pub(super) fn cmd_cd<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let home = ctx.var("HOME").unwrap_or("/");
    let mut echo_target = false;
    let target = match args.first().map(String::as_str) {
        None | Some("~") => home.to_string(),
        Some("-") => match ctx.var("OLDPWD") {
            Some(old) => {
                echo_target = true;
                old.to_string()
            }
            None => return ready(CommandResult::failure("cd: OLDPWD not set", 1)),
        },
        Some(dir) => match dir.strip_prefix("~/") {
            Some(rest) => format!("{}/{rest}", home.trim_end_matches('/')),
            None => dir.to_string(),
        },
    };

    let resolved = ctx.vfs.resolve(&target);
    let result = match ctx.vfs.stat(&resolved) {
        Ok(info) if info.is_dir() => {
            let stdout = if echo_target { format!("{resolved}\n") } else { String::new() };
            CommandResult::ok(stdout).with_mutation(ShellMutation::ChangeDirectory(resolved))
        }
        Ok(_) => CommandResult::failure(format!("cd: {target}: Not a directory"), 1),
        Err(e) => CommandResult::failure(format!("cd: {target}: {}", describe(&e)), 1),
    };
    ready(result)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches(|c| c == '\'' || c == '"')
}

fn sorted_pairs(map: &std::collections::HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut pairs: Vec<_> = map.iter().collect();
    pairs.sort_by_key(|(k, _)| k.as_str());
    pairs
}

pub(super) fn cmd_export<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    if args.is_empty() {
        return cmd_env(args, ctx);
    }

    let mut result = CommandResult::success();
    let mut errors = Vec::new();
    for arg in args {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (arg.as_str(), None),
        };
        if !is_valid_name(name) {
            errors.push(format!("export: `{arg}': not a valid identifier"));
            continue;
        }
        if let Some(value) = value {
            result.mutations.push(ShellMutation::SetEnv {
                name: name.to_string(),
                value: strip_quotes(value).to_string(),
            });
        }
    }
    if !errors.is_empty() {
        result.stderr = errors.join("\n");
        result.exit_code = 1;
    }
    ready(result)
}

pub(super) fn cmd_unset<'a>(args: &'a [String], _ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let mut result = CommandResult::success();
    result
        .mutations
        .extend(args.iter().map(|name| ShellMutation::UnsetEnv(name.clone())));
    ready(result)
}

pub(super) fn cmd_env<'a>(_args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let lines = sorted_pairs(&ctx.env)
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"));
    ready(CommandResult::ok(lines_output(lines)))
}

pub(super) fn cmd_alias<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    if args.is_empty() {
        let lines = sorted_pairs(&ctx.aliases)
            .into_iter()
            .map(|(name, value)| format!("alias {name}='{value}'"));
        return ready(CommandResult::ok(lines_output(lines)));
    }

    let mut result = CommandResult::success();
    let mut errors = Vec::new();
    for arg in args {
        if let Some((name, value)) = arg.split_once('=') {
            if name.is_empty() {
                errors.push(format!("alias: `{arg}': invalid alias name"));
                continue;
            }
            result.mutations.push(ShellMutation::AddAlias {
                name: name.to_string(),
                value: strip_quotes(value).to_string(),
            });
        } else if let Some(value) = ctx.aliases.get(arg) {
            result.stdout.push_str(&format!("alias {arg}='{value}'\n"));
        } else {
            errors.push(format!("alias: {arg}: not found"));
        }
    }
    if !errors.is_empty() {
        result.stderr = errors.join("\n");
        result.exit_code = 1;
    }
    ready(result)
}

pub(super) fn cmd_unalias<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    if args.is_empty() {
        return ready(CommandResult::failure("unalias: usage: unalias [-a] name [name ...]", 2));
    }

    let mut result = CommandResult::success();
    if args.iter().any(|a| a == "-a") {
        let mut names: Vec<_> = ctx.aliases.keys().cloned().collect();
        names.sort();
        result
            .mutations
            .extend(names.into_iter().map(ShellMutation::RemoveAlias));
        return ready(result);
    }

    let mut errors = Vec::new();
    for name in args {
        if ctx.aliases.contains_key(name) {
            result.mutations.push(ShellMutation::RemoveAlias(name.clone()));
        } else {
            errors.push(format!("unalias: {name}: not found"));
        }
    }
    if !errors.is_empty() {
        result.stderr = errors.join("\n");
        result.exit_code = 1;
    }
    ready(result)
}

pub(super) fn cmd_source<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    Box::pin(async move {
        let Some(file) = args.first() else {
            return CommandResult::failure("source: filename argument required", 2);
        };
        match ctx.vfs.read(file).await {
            Ok(content) => {
                let lines = content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(ToString::to_string)
                    .collect();
                CommandResult::success().with_mutation(ShellMutation::SourceLines(lines))
            }
            Err(e) => CommandResult::failure(format!("source: {file}: {}", describe(&e)), 1),
        }
    })
}

pub(super) fn cmd_exit<'a>(args: &'a [String], _ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let result = match args.first() {
        None => CommandResult::success().with_mutation(ShellMutation::RequestExit(0)),
        Some(arg) => match arg.parse::<i32>() {
            Ok(code) => CommandResult::success()
                .with_exit_code(code)
                .with_mutation(ShellMutation::RequestExit(code)),
            Err(_) => CommandResult::failure(format!("exit: {arg}: numeric argument required"), 2)
                .with_mutation(ShellMutation::RequestExit(2)),
        },
    };
    ready(result)
}

pub(super) fn cmd_clear<'a>(_args: &'a [String], _ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    ready(CommandResult {
        ui_request: Some("clear".to_string()),
        ..CommandResult::default()
    })
}

pub(super) fn cmd_history<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let total = ctx.history.len();
    let limit = match args.first().map(|a| a.parse::<usize>()) {
        None => total,
        Some(Ok(n)) => n.min(total),
        Some(Err(_)) => {
            return ready(CommandResult::failure(
                format!("history: {}: numeric argument required", args[0]),
                1,
            ))
        }
    };
    let lines = ctx
        .history
        .iter()
        .enumerate()
        .skip(total - limit)
        .map(|(i, line)| format!("{:5}  {line}", i + 1));
    ready(CommandResult::ok(lines_output(lines)))
}

pub(super) fn cmd_sleep<'a>(args: &'a [String], _ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    Box::pin(async move {
        let Some(arg) = args.first() else {
            return CommandResult::failure("sleep: missing operand", 1);
        };
        let interval = arg
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        match interval {
            Some(interval) => {
                tokio::time::sleep(interval).await;
                CommandResult::success()
            }
            None => CommandResult::failure(format!("sleep: invalid time interval '{arg}'"), 1),
        }
    })
}

pub(super) fn cmd_which<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let mut result = CommandResult::success();
    for name in args {
        if BuiltinName::lookup(name).is_some() {
            result.stdout.push_str(&format!("{name}: shell builtin\n"));
        } else if let Some(path) = resolve_executable(name, ctx.vfs.as_ref(), ctx.var("PATH")) {
            result.stdout.push_str(&format!("{path}\n"));
        } else {
            result.exit_code = 1;
        }
    }
    ready(result)
}

pub(super) fn cmd_type<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let mut result = CommandResult::success();
    let mut errors = Vec::new();
    for name in args {
        if let Some(value) = ctx.aliases.get(name) {
            result.stdout.push_str(&format!("{name} is aliased to `{value}'\n"));
        } else if BuiltinName::lookup(name).is_some() {
            result.stdout.push_str(&format!("{name} is a shell builtin\n"));
        } else if let Some(path) = resolve_executable(name, ctx.vfs.as_ref(), ctx.var("PATH")) {
            result.stdout.push_str(&format!("{name} is {path}\n"));
        } else {
            errors.push(format!("type: {name}: not found"));
        }
    }
    if !errors.is_empty() {
        result.stderr = errors.join("\n");
        result.exit_code = 1;
    }
    ready(result)
}

pub(super) fn cmd_help<'a>(args: &'a [String], _ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let (_, topics) = split_flags(args);
    let result = match topics.first() {
        None => CommandResult::ok(help::format_help_list()),
        Some(topic) => match help::get_help(topic) {
            Some(cmd) => CommandResult::ok(help::format_help(cmd)),
            None => CommandResult::failure(format!("help: no help topics match '{topic}'"), 1),
        },
    };
    ready(result)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, run, write};
    use crate::context::ShellMutation;

    #[tokio::test]
    async fn test_echo_flags() {
        let ctx = context();
        assert_eq!(run(&ctx, &["echo", "a", "b"]).await.stdout, "a b\n");
        assert_eq!(run(&ctx, &["echo", "-n", "a"]).await.stdout, "a");
        assert_eq!(run(&ctx, &["echo", "-e", "a\\tb"]).await.stdout, "a\tb\n");
        assert_eq!(run(&ctx, &["echo", "-x"]).await.stdout, "-x\n");
        assert_eq!(run(&ctx, &["echo"]).await.stdout, "\n");
    }

    #[tokio::test]
    async fn test_true_false() {
        let ctx = context();
        assert_eq!(run(&ctx, &["true"]).await.exit_code, 0);
        assert_eq!(run(&ctx, &["false"]).await.exit_code, 1);
    }

    #[tokio::test]
    async fn test_cd_returns_mutation_only() {
        let ctx = context();
        let r = run(&ctx, &["cd", "/tmp"]).await;
        assert_eq!(r.exit_code, 0);
        assert_eq!(r.mutations, vec![ShellMutation::ChangeDirectory("/tmp".to_string())]);
        assert_eq!(ctx.cwd(), "/");
    }

    #[tokio::test]
    async fn test_cd_errors() {
        let ctx = context();
        write(&ctx, "/tmp/f", "x").await;
        let r = run(&ctx, &["cd", "/nope"]).await;
        assert_eq!(r.exit_code, 1);
        assert_eq!(r.stderr, "cd: /nope: No such file or directory");
        let r = run(&ctx, &["cd", "/tmp/f"]).await;
        assert_eq!(r.stderr, "cd: /tmp/f: Not a directory");
        assert!(r.mutations.is_empty());
    }

    #[tokio::test]
    async fn test_cd_home() {
        let mut ctx = context();
        ctx.env.insert("HOME".to_string(), "/home/user".to_string());
        let r = run(&ctx, &["cd"]).await;
        assert_eq!(r.mutations, vec![ShellMutation::ChangeDirectory("/home/user".to_string())]);
    }

    #[tokio::test]
    async fn test_export_and_unset() {
        let ctx = context();
        let r = run(&ctx, &["export", "A=1", "B='x y'", "C"]).await;
        assert_eq!(r.mutations, vec![
            ShellMutation::SetEnv { name: "A".to_string(), value: "1".to_string() },
            ShellMutation::SetEnv { name: "B".to_string(), value: "x y".to_string() },
        ]);
        let r = run(&ctx, &["export", "1X=2"]).await;
        assert_eq!(r.exit_code, 1);
        let r = run(&ctx, &["unset", "A"]).await;
        assert_eq!(r.mutations, vec![ShellMutation::UnsetEnv("A".to_string())]);
    }

    #[tokio::test]
    async fn test_env_sorted() {
        let mut ctx = context();
        ctx.env.insert("B".to_string(), "2".to_string());
        ctx.env.insert("A".to_string(), "1".to_string());
        assert_eq!(run(&ctx, &["env"]).await.stdout, "A=1\nB=2\n");
    }

    #[tokio::test]
    async fn test_alias_forms() {
        let mut ctx = context();
        let r = run(&ctx, &["alias", "ll='ls -l'"]).await;
        assert_eq!(r.mutations, vec![ShellMutation::AddAlias {
            name: "ll".to_string(),
            value: "ls -l".to_string()
        }]);
        ctx.aliases.insert("ll".to_string(), "ls -l".to_string());
        assert_eq!(run(&ctx, &["alias"]).await.stdout, "alias ll='ls -l'\n");
        assert_eq!(run(&ctx, &["alias", "zz"]).await.exit_code, 1);
        let r = run(&ctx, &["unalias", "ll"]).await;
        assert_eq!(r.mutations, vec![ShellMutation::RemoveAlias("ll".to_string())]);
        assert_eq!(run(&ctx, &["unalias", "zz"]).await.exit_code, 1);
    }

    #[tokio::test]
    async fn test_source_reads_lines() {
        let ctx = context();
        write(&ctx, "/tmp/rc", "# comment\nexport A=1\n\necho hi\n").await;
        let r = run(&ctx, &["source", "/tmp/rc"]).await;
        assert_eq!(r.mutations, vec![ShellMutation::SourceLines(vec![
            "export A=1".to_string(),
            "echo hi".to_string()
        ])]);
        assert_eq!(run(&ctx, &["source", "/tmp/none"]).await.exit_code, 1);
    }

    #[tokio::test]
    async fn test_exit_codes() {
        let ctx = context();
        let r = run(&ctx, &["exit", "3"]).await;
        assert_eq!(r.exit_code, 3);
        assert_eq!(r.mutations, vec![ShellMutation::RequestExit(3)]);
        let r = run(&ctx, &["exit", "abc"]).await;
        assert_eq!(r.mutations, vec![ShellMutation::RequestExit(2)]);
    }

    #[tokio::test]
    async fn test_clear_requests_ui() {
        let ctx = context();
        assert_eq!(run(&ctx, &["clear"]).await.ui_request.as_deref(), Some("clear"));
    }

    #[tokio::test]
    async fn test_history_tail() {
        let mut ctx = context();
        ctx.history = vec!["a".to_string(), "b".to_string(), "c".to_string()].into();
        assert_eq!(run(&ctx, &["history", "2"]).await.stdout, "    2  b\n    3  c\n");
    }

    #[tokio::test]
    async fn test_which_and_type() {
        let mut ctx = context();
        ctx.env.insert("PATH".to_string(), "/bin".to_string());
        ctx.aliases.insert("ll".to_string(), "ls -l".to_string());
        write(&ctx, "/bin/hello.trx", "// name: hello").await;
        assert_eq!(run(&ctx, &["which", "hello"]).await.stdout, "/bin/hello.trx\n");
        assert_eq!(run(&ctx, &["which", "nope"]).await.exit_code, 1);
        let r = run(&ctx, &["type", "ll", "echo", "hello"]).await;
        assert_eq!(
            r.stdout,
            "ll is aliased to `ls -l'\necho is a shell builtin\nhello is /bin/hello.trx\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep() {
        let ctx = context();
        assert_eq!(run(&ctx, &["sleep", "1.5"]).await.exit_code, 0);
        assert_eq!(run(&ctx, &["sleep", "x"]).await.exit_code, 1);
    }

    #[tokio::test]
    async fn test_sleep_rejects_unrepresentable_intervals() {
        let ctx = context();
        for interval in ["1e30", "-1", "inf", "NaN"] {
            let r = run(&ctx, &["sleep", interval]).await;
            assert_eq!(r.exit_code, 1, "{interval}");
            assert_eq!(r.stderr, format!("sleep: invalid time interval '{interval}'"));
        }
        assert_eq!(run(&ctx, &["sleep"]).await.stderr, "sleep: missing operand");
    }

    #[tokio::test]
    async fn test_help() {
        let ctx = context();
        assert!(run(&ctx, &["help"]).await.stdout.contains("Available commands"));
        assert!(run(&ctx, &["help", "cd"]).await.stdout.starts_with("cd - "));
        assert_eq!(run(&ctx, &["help", "zz"]).await.exit_code, 1);
    }
}
