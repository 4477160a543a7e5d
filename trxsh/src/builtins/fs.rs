use super::{describe, lines_output, read_inputs, ready, split_flags, BuiltinFuture};
use crate::context::{CommandResult, ExecutionContext};
use trx_vfs::FileInfo;

pub(super) fn cmd_cat<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    Box::pin(async move {
        match read_inputs("cat", args, ctx).await {
            Ok(content) => CommandResult::ok(content),
            Err(result) => result,
        }
    })
}

fn format_entry(info: &FileInfo, long: bool) -> String {
    let name = if info.is_dir() {
        format!("{}/", info.name)
    } else {
        info.name.clone()
    };
    if long {
        let kind = if info.is_dir() { 'd' } else { '-' };
        format!("{kind} {:>8} {name}", info.size)
    } else {
        name
    }
}

pub(super) fn cmd_ls<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let (flags, mut paths) = split_flags(args);
    let all = flags.contains(&'a');
    let long = flags.contains(&'l');
    if paths.is_empty() {
        paths.push(ctx.cwd());
    }

    let mut result = CommandResult::success();
    let mut errors = Vec::new();
    let mut sections = Vec::new();
    for path in &paths {
        let info = match ctx.vfs.stat(path) {
            Ok(info) => info,
            Err(e) => {
                errors.push(format!("ls: cannot access '{path}': {}", describe(&e)));
                continue;
            }
        };
        if !info.is_dir() {
            sections.push((None, vec![format_entry(&info, long)]));
            continue;
        }
        match ctx.vfs.list(path) {
            Ok(entries) => {
                let lines = entries
                    .iter()
                    .filter(|e| all || !e.name.starts_with('.'))
                    .map(|e| format_entry(e, long))
                    .collect();
                sections.push((Some(path.clone()), lines));
            }
            Err(e) => errors.push(format!("ls: cannot open directory '{path}': {}", describe(&e))),
        }
    }

    let headed = paths.len() > 1;
    for (i, (header, lines)) in sections.into_iter().enumerate() {
        if headed {
            if i > 0 {
                result.stdout.push('\n');
            }
            if let Some(header) = header {
                result.stdout.push_str(&format!("{header}:\n"));
            }
        }
        result.stdout.push_str(&lines_output(lines));
    }
    if !errors.is_empty() {
        result.stderr = errors.join("\n");
        result.exit_code = 2;
    }
    ready(result)
}

pub(super) fn cmd_mkdir<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let (flags, dirs) = split_flags(args);
    let parents = flags.contains(&'p');
    if dirs.is_empty() {
        return ready(CommandResult::failure("mkdir: missing operand", 1));
    }

    let errors: Vec<String> = dirs
        .iter()
        .filter_map(|dir| {
            ctx.vfs.mkdir(dir, parents).err().map(|e| {
                format!("mkdir: cannot create directory '{dir}': {}", describe(&e))
            })
        })
        .collect();
    ready(if errors.is_empty() {
        CommandResult::success()
    } else {
        CommandResult::failure(errors.join("\n"), 1)
    })
}

pub(super) fn cmd_rm<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    let (flags, targets) = split_flags(args);
    let recursive = flags.iter().any(|f| matches!(f, 'r' | 'R'));
    let force = flags.contains(&'f');
    if targets.is_empty() && !force {
        return ready(CommandResult::failure("rm: missing operand", 1));
    }

    let mut errors = Vec::new();
    for target in &targets {
        let info = match ctx.vfs.stat(target) {
            Ok(info) => info,
            Err(_) if force => continue,
            Err(e) => {
                errors.push(format!("rm: cannot remove '{target}': {}", describe(&e)));
                continue;
            }
        };
        if info.is_dir() && !recursive {
            errors.push(format!("rm: cannot remove '{target}': Is a directory"));
            continue;
        }
        if let Err(e) = ctx.vfs.remove(target, recursive) {
            errors.push(format!("rm: cannot remove '{target}': {}", describe(&e)));
        }
    }
    ready(if errors.is_empty() {
        CommandResult::success()
    } else {
        CommandResult::failure(errors.join("\n"), 1)
    })
}

pub(super) fn cmd_touch<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    Box::pin(async move {
        if args.is_empty() {
            return CommandResult::failure("touch: missing file operand", 1);
        }
        let mut errors = Vec::new();
        for file in args {
            if let Err(e) = ctx.vfs.append(file, "").await {
                errors.push(format!("touch: cannot touch '{file}': {}", describe(&e)));
            }
        }
        if errors.is_empty() {
            CommandResult::success()
        } else {
            CommandResult::failure(errors.join("\n"), 1)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, run, write};

    #[tokio::test]
    async fn test_cat_files_and_stdin() {
        let ctx = context();
        write(&ctx, "/tmp/a", "one\n").await;
        write(&ctx, "/tmp/b", "two\n").await;
        assert_eq!(run(&ctx, &["cat", "/tmp/a", "/tmp/b"]).await.stdout, "one\ntwo\n");
        let piped = ctx.with_stdin("from pipe");
        assert_eq!(run(&piped, &["cat"]).await.stdout, "from pipe");
        let r = run(&ctx, &["cat", "/tmp/none"]).await;
        assert_eq!(r.exit_code, 1);
        assert_eq!(r.stderr, "cat: /tmp/none: No such file or directory");
    }

    #[tokio::test]
    async fn test_ls_dir() {
        let ctx = context();
        write(&ctx, "/tmp/b.txt", "x").await;
        write(&ctx, "/tmp/.hidden", "x").await;
        ctx.vfs.mkdir("/tmp/a", false).unwrap();
        assert_eq!(run(&ctx, &["ls", "/tmp"]).await.stdout, "a/\nb.txt\n");
        assert_eq!(run(&ctx, &["ls", "-a", "/tmp"]).await.stdout, ".hidden\na/\nb.txt\n");
        assert_eq!(run(&ctx, &["ls", "/nope"]).await.exit_code, 2);
    }

    #[tokio::test]
    async fn test_mkdir_and_rm() {
        let ctx = context();
        assert_eq!(run(&ctx, &["mkdir", "/tmp/x/y"]).await.exit_code, 1);
        assert_eq!(run(&ctx, &["mkdir", "-p", "/tmp/x/y"]).await.exit_code, 0);
        assert!(ctx.vfs.is_directory("/tmp/x/y"));

        let r = run(&ctx, &["rm", "/tmp/x"]).await;
        assert_eq!(r.stderr, "rm: cannot remove '/tmp/x': Is a directory");
        assert_eq!(run(&ctx, &["rm", "-r", "/tmp/x"]).await.exit_code, 0);
        assert!(!ctx.vfs.exists("/tmp/x"));
        assert_eq!(run(&ctx, &["rm", "-f", "/tmp/x"]).await.exit_code, 0);
        assert_eq!(run(&ctx, &["rm", "/tmp/x"]).await.exit_code, 1);
    }

    #[tokio::test]
    async fn test_touch_creates_and_keeps_content() {
        let ctx = context();
        write(&ctx, "/tmp/keep", "data").await;
        assert_eq!(run(&ctx, &["touch", "/tmp/new", "/tmp/keep"]).await.exit_code, 0);
        assert_eq!(ctx.vfs.read("/tmp/new").await.unwrap(), "");
        assert_eq!(ctx.vfs.read("/tmp/keep").await.unwrap(), "data");
    }
}
