use clap::Parser;
use std::sync::Arc;
use tracing::info;
use trx_config::{LogFormat, TrxConfig};
use trx_vfs::{MemoryVfs, Vfs};
use trxsh::terminal::StdioTerminal;
use trxsh::{ExeServices, Shell, ShellError, ShellResult};

/// trxsh - Shell for the TRX virtual filesystem
#[derive(Parser, Debug)]
#[command(name = "trxsh", version, about)]
struct Args {
    /// Execute command and exit
    #[arg(short = 'c')]
    command: Option<String>,

    /// Host script file to execute line by line
    script: Option<String>,

    /// Configuration file (YAML)
    #[arg(long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Warning: {e}, using defaults");
        TrxConfig::default()
    });
    init_logging(&config, args.debug);

    let mut shell = build_shell(&config);
    shell.source_file(&config.shell.rc_file).await;

    let code = if let Some(command) = args.command {
        shell.execute(&command).await
    } else if let Some(script_path) = args.script {
        match run_script(&mut shell, &script_path).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("trxsh: cannot read '{script_path}': {e}");
                1
            }
        }
    } else {
        run_repl(&mut shell, &config).await?
    };

    std::process::exit(code);
}

/// Explicit file when given, otherwise the default search path.
fn load_config(path: Option<&str>) -> ShellResult<TrxConfig> {
    let config = match path {
        Some(path) => trx_config::load_from_file(path)?,
        None => trx_config::load()?,
    };
    Ok(config)
}

fn init_logging(config: &TrxConfig, debug: bool) {
    let filter = if debug {
        "debug".to_string()
    } else if config.logging.filter.is_empty() {
        config.logging.level.as_str().to_string()
    } else {
        config.logging.filter.clone()
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// In-memory tree with the directories the shell expects.
fn build_shell(config: &TrxConfig) -> Shell {
    let mut dirs = vec!["/bin", "/usr/bin", "/tmp"];
    dirs.push(&config.shell.home);
    dirs.push(&config.sandbox.packages_dir);
    let vfs: Arc<dyn Vfs> = Arc::new(MemoryVfs::new("local").with_dirs(&dirs));

    Shell::builder(vfs, Arc::new(StdioTerminal::new()))
        .config(config.shell.clone())
        .services(ExeServices::new(config.sandbox.clone()))
        .build()
}

/// Run a host file one line at a time, stopping at `exit`.
async fn run_script(shell: &mut Shell, path: &str) -> ShellResult<i32> {
    let content = std::fs::read_to_string(path).map_err(ShellError::Io)?;
    let mut code = 0;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        code = shell.execute(line).await;
        if let Some(exit) = shell.exit_code() {
            return Ok(exit);
        }
    }
    Ok(code)
}

async fn run_repl(shell: &mut Shell, config: &TrxConfig) -> Result<i32, Box<dyn std::error::Error>> {
    use rustyline::error::ReadlineError;
    use rustyline::{Config, DefaultEditor};

    let history = &config.shell.history;
    let rl_config = Config::builder()
        .max_history_size(history.max_entries)?
        .history_ignore_dups(true)?
        .history_ignore_space(true)
        .build();
    let mut rl = DefaultEditor::with_config(rl_config)?;

    let history_path = history.expanded_file();
    if history.enabled && rl.load_history(&history_path).is_err() {
        info!(path = %history_path, "no previous history");
    }

    println!("trxsh v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' to quit, 'help' for help.");
    println!();

    loop {
        let prompt = shell.render_prompt(&config.shell.prompt);
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if history.enabled {
                    rl.add_history_entry(line)?;
                }
                shell.execute(line).await;
                if shell.is_finished() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }

    if history.enabled {
        if let Err(e) = rl.save_history(&history_path) {
            tracing::warn!(path = %history_path, error = %e, "failed to save history");
        }
    }

    Ok(shell.exit_code().unwrap_or_else(|| shell.last_exit_code()))
}
