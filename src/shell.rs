//! The shell itself: state that outlives a line, and the line driver.
//!
//! ```no_run
//! use myshell::{Environment, Shell};
//!
//! let mut shell = Shell::new(Environment::new());
//! shell.execute_line("mecho hello > greeting.txt").unwrap();
//! shell.execute_line("cat greeting.txt | wc -c").unwrap();
//! assert_eq!(shell.state.last_status, 0);
//! ```

use crate::command::ExitCode;
use crate::dispatch::DispatchTable;
use crate::env::Environment;
use crate::error::{ShellError, ShellResult};
use crate::io_adapters::FdWriter;
use crate::lexer::split_into_tokens;
use crate::parser::{parse_pipeline, take_background};
use crate::redirect::RedirectionSpec;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// How deep `.` may nest scripts inside scripts.
const MAX_SCRIPT_DEPTH: usize = 64;

/// Process-wide shell state.
pub struct ShellState {
    dispatch: DispatchTable,
    /// Status of the last foreground command; what `merrno` prints.
    pub last_status: ExitCode,
    /// The line being executed ended in `&`.
    pub background: bool,
    /// The line being executed has swapped stdout and/or stderr.
    pub redirecting: bool,
}

impl ShellState {
    pub fn new() -> Self {
        Self {
            dispatch: DispatchTable::new(),
            last_status: 0,
            background: false,
            redirecting: false,
        }
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Shell {
    pub env: Environment,
    pub state: ShellState,
    script_depth: usize,
}

impl Shell {
    /// A shell over `env`. Does not touch signal dispositions; see
    /// [`crate::reaper::install`].
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            state: ShellState::new(),
            script_depth: 0,
        }
    }

    /// Execute one line: a command, a pipeline, or either in the background.
    ///
    /// Failures are reported on stderr and recorded in
    /// [`ShellState::last_status`]; the only error returned is
    /// [`ShellError::Exit`].
    pub fn execute_line(&mut self, line: &str) -> ShellResult<()> {
        let outer = (self.state.background, self.state.redirecting);
        let result = self.run_line(line);
        (self.state.background, self.state.redirecting) = outer;
        self.report(result)
    }

    /// Report a failed step the way a failed line is reported.
    ///
    /// Anything but an exit request is written to stderr as `Error: ...`,
    /// stored as the last status and swallowed.
    pub fn report(&mut self, result: ShellResult<()>) -> ShellResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(ShellError::Exit(code)) => Err(ShellError::Exit(code)),
            Err(e) => {
                let _ = writeln!(FdWriter::stderr(), "Error: {e}");
                self.state.last_status = e.status();
                Ok(())
            }
        }
    }

    fn run_line(&mut self, line: &str) -> ShellResult<()> {
        let tokens = split_into_tokens(line)?;
        if tokens.is_empty() {
            return Ok(());
        }

        let (mut redirection, mut tokens) = RedirectionSpec::resolve(tokens, &self.env)?;
        self.state.redirecting = redirection.is_active();
        self.state.background = take_background(&mut tokens)?;
        if tokens.is_empty() {
            // `> file` on its own only creates the file.
            return Ok(());
        }

        let pipeline = parse_pipeline(tokens, &self.env, self.state.background)?;
        debug!(
            stages = pipeline.stages.len(),
            background = pipeline.background,
            redirecting = self.state.redirecting,
            "executing line"
        );
        let result = self.run_pipeline(&pipeline, &redirection);
        redirection.restore();
        result
    }

    /// Feed every line of `path` to [`Shell::execute_line`].
    pub fn run_script(&mut self, path: &Path) -> ShellResult<()> {
        if self.script_depth >= MAX_SCRIPT_DEPTH {
            return Err(ShellError::other(format!(
                "Scripts nested deeper than {MAX_SCRIPT_DEPTH} levels"
            )));
        }
        let contents = fs::read_to_string(path)
            .map_err(|_| ShellError::FileNotFound(path.display().to_string()))?;

        debug!(script = %path.display(), depth = self.script_depth, "running script");
        self.script_depth += 1;
        let result = contents
            .lines()
            .try_for_each(|line| self.execute_line(line));
        self.script_depth -= 1;
        result
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new(Environment::new())
    }
}
