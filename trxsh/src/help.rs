//! Help text for trxsh builtins

pub struct CommandHelp {
    pub name: &'static str,
    pub summary: &'static str,
    pub usage: &'static str,
    pub options: &'static [(&'static str, &'static str)],
}

pub const COMMANDS: &[CommandHelp] = &[
    CommandHelp {
        name: "alias",
        summary: "Define or display aliases",
        usage: "alias [name[=value] ...]",
        options: &[],
    },
    CommandHelp {
        name: "cat",
        summary: "Concatenate and print files",
        usage: "cat [FILE]...",
        options: &[("-", "Read from stdin")],
    },
    CommandHelp {
        name: "cd",
        summary: "Change the current directory",
        usage: "cd [DIR | -]",
        options: &[("-", "Return to the previous directory")],
    },
    CommandHelp {
        name: "clear",
        summary: "Clear the terminal screen",
        usage: "clear",
        options: &[],
    },
    CommandHelp {
        name: "echo",
        summary: "Display a line of text",
        usage: "echo [-en] [STRING]...",
        options: &[
            ("-e", "Interpret escape sequences (\\n, \\t, etc.)"),
            ("-n", "Do not output trailing newline"),
        ],
    },
    CommandHelp {
        name: "env",
        summary: "Display environment variables",
        usage: "env",
        options: &[],
    },
    CommandHelp {
        name: "exit",
        summary: "Exit the shell",
        usage: "exit [CODE]",
        options: &[],
    },
    CommandHelp {
        name: "export",
        summary: "Set environment variables",
        usage: "export [NAME=VALUE]...",
        options: &[],
    },
    CommandHelp {
        name: "false",
        summary: "Return a failure exit status",
        usage: "false",
        options: &[],
    },
    CommandHelp {
        name: "grep",
        summary: "Search for patterns in text",
        usage: "grep [OPTION]... PATTERN [FILE]...",
        options: &[
            ("-i", "Ignore case distinctions"),
            ("-v", "Select non-matching lines"),
            ("-n", "Prefix each line with its line number"),
            ("-c", "Print only a count of matching lines"),
        ],
    },
    CommandHelp {
        name: "head",
        summary: "Output the first part of files",
        usage: "head [-n NUM] [FILE]",
        options: &[("-n NUM", "Print the first NUM lines (default 10)")],
    },
    CommandHelp {
        name: "help",
        summary: "Show help for commands",
        usage: "help [COMMAND]",
        options: &[],
    },
    CommandHelp {
        name: "history",
        summary: "Display command history",
        usage: "history [N]",
        options: &[],
    },
    CommandHelp {
        name: "ls",
        summary: "List directory contents",
        usage: "ls [-la] [PATH]...",
        options: &[
            ("-a", "Include entries starting with ."),
            ("-l", "Use long listing format"),
        ],
    },
    CommandHelp {
        name: "mkdir",
        summary: "Create directories",
        usage: "mkdir [-p] DIR...",
        options: &[("-p", "Create parent directories as needed")],
    },
    CommandHelp {
        name: "pwd",
        summary: "Print working directory",
        usage: "pwd",
        options: &[],
    },
    CommandHelp {
        name: "rm",
        summary: "Remove files or directories",
        usage: "rm [-rf] PATH...",
        options: &[
            ("-r", "Remove directories and their contents"),
            ("-f", "Ignore nonexistent files"),
        ],
    },
    CommandHelp {
        name: "sleep",
        summary: "Delay for a specified time",
        usage: "sleep SECONDS",
        options: &[],
    },
    CommandHelp {
        name: "source",
        summary: "Execute commands from a file in the current shell",
        usage: "source FILE",
        options: &[],
    },
    CommandHelp {
        name: "tail",
        summary: "Output the last part of files",
        usage: "tail [-n NUM] [FILE]",
        options: &[("-n NUM", "Print the last NUM lines (default 10)")],
    },
    CommandHelp {
        name: "touch",
        summary: "Create empty files",
        usage: "touch FILE...",
        options: &[],
    },
    CommandHelp {
        name: "true",
        summary: "Return a success exit status",
        usage: "true",
        options: &[],
    },
    CommandHelp {
        name: "type",
        summary: "Describe how a command name would be interpreted",
        usage: "type NAME...",
        options: &[],
    },
    CommandHelp {
        name: "unalias",
        summary: "Remove aliases",
        usage: "unalias NAME...",
        options: &[],
    },
    CommandHelp {
        name: "unset",
        summary: "Remove environment variables",
        usage: "unset NAME...",
        options: &[],
    },
    CommandHelp {
        name: "wc",
        summary: "Print line, word, and byte counts",
        usage: "wc [-lwc] [FILE]",
        options: &[
            ("-l", "Print line count"),
            ("-w", "Print word count"),
            ("-c", "Print byte count"),
        ],
    },
    CommandHelp {
        name: "which",
        summary: "Locate the executable for a command",
        usage: "which NAME...",
        options: &[],
    },
];

pub fn get_help(name: &str) -> Option<&'static CommandHelp> {
    let name = if name == "." { "source" } else { name };
    COMMANDS.iter().find(|c| c.name == name)
}

pub fn format_help(cmd: &CommandHelp) -> String {
    let mut out = format!("{} - {}\n\nUsage: {}\n", cmd.name, cmd.summary, cmd.usage);
    if !cmd.options.is_empty() {
        out.push_str("\nOptions:\n");
        for (opt, desc) in cmd.options {
            out.push_str(&format!("  {opt:16} {desc}\n"));
        }
    }
    out
}

pub fn format_help_list() -> String {
    let mut out = String::from("trxsh - TRX Shell Commands\n\nAvailable commands:\n\n");
    for cmd in COMMANDS {
        out.push_str(&format!("  {:12} {}\n", cmd.name, cmd.summary));
    }
    out.push_str("\nUse 'help COMMAND' or 'COMMAND --help' for more information.\n");
    out
}

pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinName;

    #[test]
    fn test_every_builtin_has_help() {
        for builtin in BuiltinName::ALL {
            assert!(
                get_help(builtin.as_str()).is_some(),
                "missing help for {}",
                builtin.as_str()
            );
        }
    }

    #[test]
    fn test_format_help_lists_options() {
        let text = format_help(get_help("grep").unwrap());
        assert!(text.starts_with("grep - Search for patterns"));
        assert!(text.contains("-i"));
    }
}
