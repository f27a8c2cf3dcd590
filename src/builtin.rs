use crate::command::ExitCode;
use crate::dispatch::Builtin;
use crate::error::{ShellError, ShellResult};
use crate::io_adapters::Io;
use crate::shell::Shell;
use argh::FromArgs;
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl Builtin for Pwd {
    fn name() -> &'static str {
        "mpwd"
    }

    fn execute(self, shell: &mut Shell, io: &mut Io<'_>) -> ShellResult<ExitCode> {
        writeln!(io.stdout, "{}", shell.env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl Builtin for Cd {
    fn name() -> &'static str {
        "mcd"
    }

    fn execute(self, shell: &mut Shell, _io: &mut Io<'_>) -> ShellResult<ExitCode> {
        let target = match self.target {
            Some(t) if !t.is_empty() => t,
            _ => shell
                .env
                .get_var("HOME")
                .map(str::to_string)
                .ok_or_else(|| ShellError::other("Cannot cd: HOME is not set"))?,
        };

        let requested = Path::new(&target);
        let new_dir = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            shell.env.current_dir.join(requested)
        };

        let canonical = fs::canonicalize(&new_dir)
            .and_then(|dir| env::set_current_dir(&dir).map(|()| dir))
            .map_err(|e| ShellError::other(format!("Cannot cd to {target}: {e}")))?;

        debug!(dir = %canonical.display(), "changed directory");
        shell
            .env
            .set_var("PWD", canonical.to_string_lossy().into_owned());
        shell.env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the exit status of the last command.
pub struct Errno {}

impl Builtin for Errno {
    fn name() -> &'static str {
        "merrno"
    }

    fn execute(self, shell: &mut Shell, io: &mut Io<'_>) -> ShellResult<ExitCode> {
        writeln!(io.stdout, "{}", shell.state.last_status)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(option, short = 's')]
    /// exit status; takes precedence over the positional form
    pub status: Option<ExitCode>,

    #[argh(positional)]
    /// exit status, 0 when omitted
    pub code: Option<ExitCode>,
}

impl Builtin for Exit {
    fn name() -> &'static str {
        "mexit"
    }

    fn execute(self, _shell: &mut Shell, _io: &mut Io<'_>) -> ShellResult<ExitCode> {
        Err(ShellError::Exit(self.status.or(self.code).unwrap_or(0)))
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl Builtin for Echo {
    fn name() -> &'static str {
        "mecho"
    }

    fn execute(self, _shell: &mut Shell, io: &mut Io<'_>) -> ShellResult<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(io.stdout, "{s}")?;
        } else {
            writeln!(io.stdout, "{s}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Run script files in the current shell, one line at a time.
pub struct Source {
    #[argh(positional, greedy)]
    /// scripts to run, in order
    pub files: Vec<PathBuf>,
}

impl Builtin for Source {
    fn name() -> &'static str {
        "."
    }

    fn execute(self, shell: &mut Shell, _io: &mut Io<'_>) -> ShellResult<ExitCode> {
        if self.files.is_empty() {
            return Err(ShellError::TooFewArgs);
        }
        for file in &self.files {
            shell.run_script(file)?;
        }
        Ok(shell.state.last_status)
    }
}

#[derive(FromArgs)]
/// Set a variable for this shell and every command it starts.
/// A $(...) span in the value is replaced by the output of that command line.
pub struct Export {
    #[argh(positional)]
    /// assignment in the form NAME=value
    pub assignment: String,
}

impl Builtin for Export {
    fn name() -> &'static str {
        "mexport"
    }

    fn execute(self, shell: &mut Shell, _io: &mut Io<'_>) -> ShellResult<ExitCode> {
        let Some((name, value)) = self.assignment.split_once('=') else {
            return Err(ShellError::InvalidArgument(format!(
                "expected NAME=value, got '{}'",
                self.assignment
            )));
        };

        let valid_name = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| ShellError::other(e.to_string()))?;
        if !valid_name.is_match(name) {
            return Err(ShellError::InvalidArgument(format!(
                "'{name}' is not a valid variable name"
            )));
        }

        let value = substitute_commands(shell, value)?;
        debug!(name, value = %value, "variable exported");
        shell.env.set_var(name, value);
        Ok(0)
    }
}

/// Replace every `$(line)` span in `value` with the captured output of `line`.
///
/// Spans nest the way the lexer collects them; inner spans are substituted
/// before the line around them runs. An unbalanced `$(` is kept as written.
fn substitute_commands(shell: &mut Shell, value: &str) -> ShellResult<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("$(") {
        out.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let Some(end) = closing_paren(body) else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let line = substitute_commands(shell, &body[..end])?;
        out.push_str(&shell.capture_output(&line)?);
        rest = &body[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Offset of the `)` closing a span whose `$(` comes right before `body`.
fn closing_paren(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
