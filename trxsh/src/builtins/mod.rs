//! Builtin commands
//!
//! Builtins are plain functions keyed by [`BuiltinName`]. They read the
//! [`ExecutionContext`] and report state changes through
//! [`ShellMutation`](crate::ShellMutation)s on their result; none of them hold
//! a reference to the shell.

mod fs;
mod shell;
mod text;

use crate::context::{CommandResult, ExecutionContext};
use std::future::Future;
use std::pin::Pin;

pub type BuiltinFuture<'a> = Pin<Box<dyn Future<Output = CommandResult> + Send + 'a>>;

/// Signature shared by every builtin.
pub type BuiltinFn = for<'a> fn(&'a [String], &'a ExecutionContext) -> BuiltinFuture<'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinName {
    Alias,
    Cat,
    Cd,
    Clear,
    Echo,
    Env,
    Exit,
    Export,
    False,
    Grep,
    Head,
    Help,
    History,
    Ls,
    Mkdir,
    Pwd,
    Rm,
    Sleep,
    Source,
    Tail,
    Touch,
    True,
    Type,
    Unalias,
    Unset,
    Wc,
    Which,
}

impl BuiltinName {
    pub const ALL: &'static [Self] = &[
        Self::Alias,
        Self::Cat,
        Self::Cd,
        Self::Clear,
        Self::Echo,
        Self::Env,
        Self::Exit,
        Self::Export,
        Self::False,
        Self::Grep,
        Self::Head,
        Self::Help,
        Self::History,
        Self::Ls,
        Self::Mkdir,
        Self::Pwd,
        Self::Rm,
        Self::Sleep,
        Self::Source,
        Self::Tail,
        Self::Touch,
        Self::True,
        Self::Type,
        Self::Unalias,
        Self::Unset,
        Self::Wc,
        Self::Which,
    ];

    /// Exact, case-sensitive lookup. `.` is an alias for `source`.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        if name == "." {
            return Some(Self::Source);
        }
        Self::ALL.iter().copied().find(|b| b.as_str() == name)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alias => "alias",
            Self::Cat => "cat",
            Self::Cd => "cd",
            Self::Clear => "clear",
            Self::Echo => "echo",
            Self::Env => "env",
            Self::Exit => "exit",
            Self::Export => "export",
            Self::False => "false",
            Self::Grep => "grep",
            Self::Head => "head",
            Self::Help => "help",
            Self::History => "history",
            Self::Ls => "ls",
            Self::Mkdir => "mkdir",
            Self::Pwd => "pwd",
            Self::Rm => "rm",
            Self::Sleep => "sleep",
            Self::Source => "source",
            Self::Tail => "tail",
            Self::Touch => "touch",
            Self::True => "true",
            Self::Type => "type",
            Self::Unalias => "unalias",
            Self::Unset => "unset",
            Self::Wc => "wc",
            Self::Which => "which",
        }
    }

    #[must_use]
    pub fn handler(self) -> BuiltinFn {
        match self {
            Self::Alias => shell::cmd_alias,
            Self::Cat => fs::cmd_cat,
            Self::Cd => shell::cmd_cd,
            Self::Clear => shell::cmd_clear,
            Self::Echo => shell::cmd_echo,
            Self::Env => shell::cmd_env,
            Self::Exit => shell::cmd_exit,
            Self::Export => shell::cmd_export,
            Self::False => shell::cmd_false,
            Self::Grep => text::cmd_grep,
            Self::Head => text::cmd_head,
            Self::Help => shell::cmd_help,
            Self::History => shell::cmd_history,
            Self::Ls => fs::cmd_ls,
            Self::Mkdir => fs::cmd_mkdir,
            Self::Pwd => shell::cmd_pwd,
            Self::Rm => fs::cmd_rm,
            Self::Sleep => shell::cmd_sleep,
            Self::Source => shell::cmd_source,
            Self::Tail => text::cmd_tail,
            Self::Touch => fs::cmd_touch,
            Self::True => shell::cmd_true,
            Self::Type => shell::cmd_type,
            Self::Unalias => shell::cmd_unalias,
            Self::Unset => shell::cmd_unset,
            Self::Wc => text::cmd_wc,
            Self::Which => shell::cmd_which,
        }
    }
}

pub fn is_builtin(name: &str) -> bool {
    BuiltinName::lookup(name).is_some()
}

fn ready<'a>(result: CommandResult) -> BuiltinFuture<'a> {
    Box::pin(std::future::ready(result))
}

/// Collect the text a filter command works on: the named files in order, or
/// stdin when no file (or `-`) is given.
async fn read_inputs(
    cmd: &str,
    files: &[String],
    ctx: &ExecutionContext,
) -> Result<String, CommandResult> {
    if files.is_empty() {
        return Ok(ctx.stdin.clone());
    }
    let mut content = String::new();
    for file in files {
        if file == "-" {
            content.push_str(&ctx.stdin);
            continue;
        }
        match ctx.vfs.read(file).await {
            Ok(text) => content.push_str(&text),
            Err(e) => return Err(CommandResult::failure(format!("{cmd}: {file}: {}", describe(&e)), 1)),
        }
    }
    Ok(content)
}

/// Short POSIX-style reason for a VFS error, without the path.
fn describe(err: &trx_vfs::VfsError) -> &'static str {
    use trx_vfs::VfsError;
    match err {
        VfsError::NotFound(_) => "No such file or directory",
        VfsError::AlreadyExists(_) => "File exists",
        VfsError::NotDirectory(_) => "Not a directory",
        VfsError::IsDirectory(_) => "Is a directory",
        VfsError::DirectoryNotEmpty(_) => "Directory not empty",
        VfsError::InvalidArgument(_) => "Invalid argument",
        VfsError::PermissionDenied(_) => "Permission denied",
        VfsError::Internal(_) => "Input/output error",
    }
}

/// Join lines with a trailing newline, or nothing for no lines.
fn lines_output<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for line in lines {
        out.push_str(line.as_ref());
        out.push('\n');
    }
    out
}

/// Split leading single-dash flag clusters (`-rf`, `-n`) from operands.
/// `--` ends flag parsing.
fn split_flags(args: &[String]) -> (Vec<char>, Vec<String>) {
    let mut flags = Vec::new();
    let mut operands = Vec::new();
    let mut parsing = true;
    for arg in args {
        if parsing && arg == "--" {
            parsing = false;
        } else if parsing && arg.len() > 1 && arg.starts_with('-') {
            flags.extend(arg.chars().skip(1));
        } else {
            operands.push(arg.clone());
        }
    }
    (flags, operands)
}

/// Parse `-n NUM` / `-NUM` line counts for head and tail.
fn parse_count(cmd: &str, args: &[String]) -> Result<(usize, Vec<String>), CommandResult> {
    let mut count = 10;
    let mut files = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let value = if arg == "-n" {
            match iter.next() {
                Some(v) => Some(v.as_str()),
                None => return Err(CommandResult::failure(format!("{cmd}: option requires an argument -- 'n'"), 1)),
            }
        } else if let Some(v) = arg.strip_prefix("-n") {
            Some(v)
        } else if arg.len() > 1 && arg.starts_with('-') {
            Some(&arg[1..])
        } else {
            files.push(arg.clone());
            None
        };
        if let Some(v) = value {
            count = v.parse().map_err(|_| {
                CommandResult::failure(format!("{cmd}: invalid number of lines: '{v}'"), 1)
            })?;
        }
    }
    Ok((count, files))
}
