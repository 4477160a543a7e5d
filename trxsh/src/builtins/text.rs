use super::{lines_output, parse_count, read_inputs, BuiltinFuture};
use crate::context::{CommandResult, ExecutionContext};
use regex::RegexBuilder;

#[derive(Debug, Default)]
struct GrepOptions {
    ignore_case: bool,
    invert: bool,
    line_numbers: bool,
    count: bool,
}

fn parse_grep_args(args: &[String]) -> Result<(GrepOptions, String, Vec<String>), CommandResult> {
    let mut opts = GrepOptions::default();
    let mut pattern = None;
    let mut files = Vec::new();

    for arg in args {
        if pattern.is_none() && arg.len() > 1 && arg.starts_with('-') {
            for flag in arg.chars().skip(1) {
                match flag {
                    'i' => opts.ignore_case = true,
                    'v' => opts.invert = true,
                    'n' => opts.line_numbers = true,
                    'c' => opts.count = true,
                    other => {
                        return Err(CommandResult::failure(
                            format!("grep: invalid option -- '{other}'"),
                            2,
                        ))
                    }
                }
            }
        } else if pattern.is_none() {
            pattern = Some(arg.clone());
        } else {
            files.push(arg.clone());
        }
    }

    match pattern {
        Some(p) => Ok((opts, p, files)),
        None => Err(CommandResult::failure("grep: usage: grep [-ivnc] PATTERN [FILE]...", 2)),
    }
}

pub(super) fn cmd_grep<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    Box::pin(async move {
        let (opts, pattern, files) = match parse_grep_args(args) {
            Ok(parsed) => parsed,
            Err(result) => return result,
        };
        let re = match RegexBuilder::new(&pattern)
            .case_insensitive(opts.ignore_case)
            .build()
        {
            Ok(re) => re,
            Err(e) => return CommandResult::failure(format!("grep: invalid pattern: {e}"), 2),
        };
        let input = match read_inputs("grep", &files, ctx).await {
            Ok(input) => input,
            Err(mut result) => {
                result.exit_code = 2;
                return result;
            }
        };

        let matches: Vec<String> = input
            .lines()
            .enumerate()
            .filter(|(_, line)| re.is_match(line) != opts.invert)
            .map(|(i, line)| {
                if opts.line_numbers {
                    format!("{}:{line}", i + 1)
                } else {
                    line.to_string()
                }
            })
            .collect();

        let found = !matches.is_empty();
        let stdout = if opts.count {
            format!("{}\n", matches.len())
        } else {
            lines_output(matches)
        };
        CommandResult::ok(stdout).with_exit_code(if found { 0 } else { 1 })
    })
}

pub(super) fn cmd_head<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    Box::pin(async move {
        let (count, files) = match parse_count("head", args) {
            Ok(parsed) => parsed,
            Err(result) => return result,
        };
        match read_inputs("head", &files, ctx).await {
            Ok(input) => CommandResult::ok(lines_output(input.lines().take(count))),
            Err(result) => result,
        }
    })
}

pub(super) fn cmd_tail<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    Box::pin(async move {
        let (count, files) = match parse_count("tail", args) {
            Ok(parsed) => parsed,
            Err(result) => return result,
        };
        match read_inputs("tail", &files, ctx).await {
            Ok(input) => {
                let lines: Vec<&str> = input.lines().collect();
                let start = lines.len().saturating_sub(count);
                CommandResult::ok(lines_output(&lines[start..]))
            }
            Err(result) => result,
        }
    })
}

pub(super) fn cmd_wc<'a>(args: &'a [String], ctx: &'a ExecutionContext) -> BuiltinFuture<'a> {
    Box::pin(async move {
        let (flags, files) = super::split_flags(args);
        let (mut lines, mut words, mut bytes) = (
            flags.contains(&'l'),
            flags.contains(&'w'),
            flags.contains(&'c'),
        );
        if !(lines || words || bytes) {
            (lines, words, bytes) = (true, true, true);
        }

        let input = match read_inputs("wc", &files, ctx).await {
            Ok(input) => input,
            Err(result) => return result,
        };

        let mut counts = Vec::new();
        if lines {
            counts.push(input.matches('\n').count().to_string());
        }
        if words {
            counts.push(input.split_whitespace().count().to_string());
        }
        if bytes {
            counts.push(input.len().to_string());
        }
        if files.len() == 1 {
            counts.push(files[0].clone());
        }
        CommandResult::ok(format!("{}\n", counts.join(" ")))
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, run, write};

    #[tokio::test]
    async fn test_grep_stdin() {
        let ctx = context().with_stdin("apple\nBanana\ncherry\n");
        let r = run(&ctx, &["grep", "an"]).await;
        assert_eq!(r.stdout, "Banana\n");
        assert_eq!(r.exit_code, 0);
        assert_eq!(run(&ctx, &["grep", "-i", "APPLE"]).await.stdout, "apple\n");
        assert_eq!(run(&ctx, &["grep", "-v", "an"]).await.stdout, "apple\ncherry\n");
        assert_eq!(run(&ctx, &["grep", "-n", "cherry"]).await.stdout, "3:cherry\n");
        assert_eq!(run(&ctx, &["grep", "-c", "e"]).await.stdout, "2\n");
        assert_eq!(run(&ctx, &["grep", "-in", "b"]).await.stdout, "2:Banana\n");
    }

    #[tokio::test]
    async fn test_grep_no_match_exits_one() {
        let ctx = context().with_stdin("hi\n");
        let r = run(&ctx, &["grep", "x"]).await;
        assert_eq!(r.stdout, "");
        assert_eq!(r.exit_code, 1);
    }

    #[tokio::test]
    async fn test_grep_errors() {
        let ctx = context();
        assert_eq!(run(&ctx, &["grep"]).await.exit_code, 2);
        assert_eq!(run(&ctx, &["grep", "("]).await.exit_code, 2);
        assert_eq!(run(&ctx, &["grep", "x", "/missing"]).await.exit_code, 2);
    }

    #[tokio::test]
    async fn test_head_tail() {
        let ctx = context();
        write(&ctx, "/tmp/n", "1\n2\n3\n4\n").await;
        assert_eq!(run(&ctx, &["head", "-n", "2", "/tmp/n"]).await.stdout, "1\n2\n");
        assert_eq!(run(&ctx, &["tail", "-2", "/tmp/n"]).await.stdout, "3\n4\n");
        assert_eq!(run(&ctx, &["tail", "-n", "9", "/tmp/n"]).await.stdout, "1\n2\n3\n4\n");
    }

    #[tokio::test]
    async fn test_wc() {
        let ctx = context().with_stdin("one two\nthree\n");
        assert_eq!(run(&ctx, &["wc"]).await.stdout, "2 3 14\n");
        assert_eq!(run(&ctx, &["wc", "-l"]).await.stdout, "2\n");
    }
}
