use crate::builtin::{Cd, Echo, Errno, Exit, Export, Pwd, Source};
use crate::command::ExitCode;
use crate::error::{ShellError, ShellResult};
use crate::io_adapters::Io;
use crate::options::{Parsed, parse_args};
use crate::shell::Shell;
use argh::FromArgs;
use std::collections::HashMap;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Arguments are described with [`argh`] (`FromArgs`) and validated before
/// [`Builtin::execute`] runs, so a body only ever sees well-formed input.
/// Built-ins run inside the shell process (or inside a pipeline stage's
/// child) and write only to the streams in [`Io`].
pub(crate) trait Builtin: Sized + FromArgs {
    /// Canonical name of the command, e.g. "mecho" or "mcd".
    fn name() -> &'static str;

    /// Run the command. Return value follows shell conventions: 0 for success.
    fn execute(self, shell: &mut Shell, io: &mut Io<'_>) -> ShellResult<ExitCode>;
}

/// What happens to a built-in once its arguments have been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Run,
    /// Background line without redirection: nothing to show the output to,
    /// so the body is not run and the last status is kept.
    Skip,
}

/// Type-erased entry point of a built-in: parse, validate and run.
pub type BuiltinFn = fn(&mut Shell, &[String], Body, &mut Io<'_>) -> ShellResult<ExitCode>;

fn invoke<T: Builtin>(
    shell: &mut Shell,
    args: &[String],
    body: Body,
    io: &mut Io<'_>,
) -> ShellResult<ExitCode> {
    match parse_args::<T>(T::name(), args)? {
        Parsed::Run(_) if body == Body::Skip => {
            debug!(name = T::name(), "background built-in skipped");
            Ok(shell.state.last_status)
        }
        Parsed::Run(command) => command.execute(shell, io),
        Parsed::Help(text) => {
            io.stdout.write_all(text.as_bytes())?;
            Ok(0)
        }
    }
}

/// Result of looking a command name up.
#[derive(Clone, Copy)]
pub enum Dispatch {
    Builtin(BuiltinFn),
    External,
}

/// Name → built-in handler map, filled once and never changed afterwards.
pub struct DispatchTable {
    handlers: HashMap<&'static str, BuiltinFn>,
}

impl DispatchTable {
    pub fn new() -> Self {
        let mut table = Self {
            handlers: HashMap::new(),
        };
        table.register::<Pwd>();
        table.register::<Cd>();
        table.register::<Errno>();
        table.register::<Exit>();
        table.register::<Echo>();
        table.register::<Source>();
        table.register::<Export>();
        table
    }

    fn register<T: Builtin>(&mut self) {
        self.handlers.insert(T::name(), invoke::<T>);
    }

    pub fn resolve(&self, name: &str) -> Dispatch {
        match self.handlers.get(name) {
            Some(&handler) => Dispatch::Builtin(handler),
            None => Dispatch::External,
        }
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a built-in handler and turn its failure into a status.
///
/// Errors are reported as `Error: <message>` on the built-in's own stderr.
/// Only an exit request is passed back to the caller.
pub fn call(
    handler: BuiltinFn,
    shell: &mut Shell,
    args: &[String],
    body: Body,
    io: &mut Io<'_>,
) -> ShellResult<ExitCode> {
    match handler(shell, args, body, io) {
        Ok(code) => Ok(code),
        Err(ShellError::Exit(code)) => Err(ShellError::Exit(code)),
        Err(e) => {
            debug!(error = %e, "built-in failed");
            let _ = writeln!(io.stderr, "Error: {e}");
            Ok(e.status())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;

    fn run(shell: &mut Shell, line: &[&str]) -> (ShellResult<ExitCode>, String, String) {
        run_as(shell, line, Body::Run)
    }

    fn run_as(
        shell: &mut Shell,
        line: &[&str],
        body: Body,
    ) -> (ShellResult<ExitCode>, String, String) {
        let args: Vec<String> = line[1..].iter().map(|s| s.to_string()).collect();
        let Dispatch::Builtin(handler) = shell.state.dispatch().resolve(line[0]) else {
            panic!("{} is not a built-in", line[0]);
        };
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = call(handler, shell, &args, body, &mut Io::new(&mut out, &mut err));
        (
            result,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn table_knows_every_builtin() {
        let table = DispatchTable::new();
        for name in [".", "mcd", "mecho", "merrno", "mexit", "mexport", "mpwd"] {
            assert!(
                matches!(table.resolve(name), Dispatch::Builtin(_)),
                "{name} should be a built-in"
            );
        }
        assert!(matches!(table.resolve("ls"), Dispatch::External));
        assert!(matches!(table.resolve("mecho"), Dispatch::Builtin(_)));
    }

    #[test]
    fn help_goes_to_stdout_with_status_zero() {
        let mut shell = Shell::new(Environment::empty("/"));
        let (result, out, err) = run(&mut shell, &["mecho", "--help"]);
        assert_eq!(result.unwrap(), 0);
        assert!(out.starts_with("Usage: mecho"));
        assert!(err.is_empty());
    }

    #[test]
    fn validation_errors_are_reported_on_stderr() {
        let mut shell = Shell::new(Environment::empty("/"));

        let (result, out, err) = run(&mut shell, &["mpwd", "--bogus"]);
        assert_eq!(result.unwrap(), 1);
        assert!(out.is_empty());
        assert_eq!(err, "Error: Unknown option '--bogus'\n");

        let (result, _, err) = run(&mut shell, &["mpwd", "-h", "extra"]);
        assert_eq!(result.unwrap(), 3);
        assert_eq!(err, "Error: Too many arguments\n");

        let (result, _, _) = run(&mut shell, &["mexport"]);
        assert_eq!(result.unwrap(), 4);
    }

    #[test]
    fn exit_request_propagates() {
        let mut shell = Shell::new(Environment::empty("/"));
        let (result, _, err) = run(&mut shell, &["mexit", "7"]);
        assert!(matches!(result, Err(ShellError::Exit(7))));
        assert!(err.is_empty());
    }

    #[test]
    fn skipped_body_still_validates_arguments() {
        let mut shell = Shell::new(Environment::empty("/"));
        shell.state.last_status = 6;

        let (result, out, err) = run_as(&mut shell, &["mecho", "--bogus"], Body::Skip);
        assert_eq!(result.unwrap(), 1);
        assert!(out.is_empty());
        assert_eq!(err, "Error: Unknown option '--bogus'\n");

        let (result, out, err) = run_as(&mut shell, &["mecho", "quiet"], Body::Skip);
        assert_eq!(result.unwrap(), 6);
        assert!(out.is_empty());
        assert!(err.is_empty());

        let (result, _, _) = run_as(&mut shell, &["mexport", "SKIPPED=1"], Body::Skip);
        assert_eq!(result.unwrap(), 6);
        assert_eq!(shell.env.get_var("SKIPPED"), None);
    }
}
