//! Argument validation for built-ins.
//!
//! Every built-in describes its arguments with `#[derive(FromArgs)]`; this
//! module runs argh and sorts its verdict into the shell's error classes.

use crate::error::{ShellError, ShellResult};
use argh::{EarlyExit, FromArgs};

/// Outcome of a successful argument parse.
#[derive(Debug)]
pub enum Parsed<T> {
    /// Arguments are valid; run the command.
    Run(T),
    /// `-h`/`--help` was the only argument. Holds the generated help text.
    Help(String),
}

fn is_help_flag(arg: &str) -> bool {
    arg == "-h" || arg == "--help"
}

/// Parse `args` (without the command name) into `T`.
pub fn parse_args<T: FromArgs>(name: &str, args: &[String]) -> ShellResult<Parsed<T>> {
    let asks_help = args.iter().any(|a| is_help_flag(a));
    if asks_help && args.len() > 1 {
        return Err(ShellError::TooManyArgs);
    }

    let args: Vec<&str> = if asks_help {
        vec!["--help"]
    } else {
        args.iter().map(String::as_str).collect()
    };
    match T::from_args(&[name], &args) {
        Ok(parsed) => Ok(Parsed::Run(parsed)),
        // argh also treats a bare `help` word as a request for help.
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) if args.len() == 1 => Ok(Parsed::Help(output)),
        Err(EarlyExit {
            status: Ok(()), ..
        }) => Err(ShellError::TooManyArgs),
        Err(EarlyExit {
            output,
            status: Err(()),
        }) => Err(classify(&output)),
    }
}

/// Map an argh failure message onto an error class.
fn classify(output: &str) -> ShellError {
    let message = output.lines().next().unwrap_or_default().trim();
    if let Some(arg) = message.strip_prefix("Unrecognized argument: ") {
        if arg.starts_with('-') && arg.len() > 1 {
            ShellError::UnknownOption(arg.to_string())
        } else {
            ShellError::TooManyArgs
        }
    } else if message.starts_with("Required") {
        ShellError::TooFewArgs
    } else {
        ShellError::InvalidArgument(message.to_string())
    }
}
