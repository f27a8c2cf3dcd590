use anyhow::{Context, Result};
use argh::FromArgs;
use myshell::{Environment, Shell, ShellConfig, ShellError, reaper, repl};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// A small Unix command shell.
struct Args {
    #[argh(option, short = 'c')]
    /// execute this line and exit with its status
    command: Option<String>,

    #[argh(option)]
    /// history file for the interactive session
    history: Option<PathBuf>,

    #[argh(positional, greedy)]
    /// scripts to run, in order, instead of an interactive session
    scripts: Vec<PathBuf>,
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args, config: ShellConfig) -> Result<i32> {
    reaper::install().context("installing SIGCHLD handler")?;

    let mut env = Environment::new();
    if config.prefix_path {
        let exe = std::env::current_exe().context("locating the shell executable")?;
        if let Some(dir) = exe.parent() {
            env.prepend_path(dir);
        }
    }
    let mut shell = Shell::new(env);

    if let Some(line) = args.command {
        return Ok(match shell.execute_line(&line) {
            Err(ShellError::Exit(code)) => code,
            _ => shell.state.last_status,
        });
    }

    if !args.scripts.is_empty() {
        for script in &args.scripts {
            let result = shell.run_script(script);
            if let Err(ShellError::Exit(code)) = shell.report(result) {
                return Ok(code);
            }
        }
        return Ok(shell.state.last_status);
    }

    let history = args.history.unwrap_or(config.history_file);
    debug!(history = %history.display(), "starting interactive session");
    repl::run(&mut shell, &history).context("reading input")
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let config = ShellConfig::from_env();
    init_tracing(&config.log_filter);

    let code = run(args, config)?;
    std::process::exit(code)
}
