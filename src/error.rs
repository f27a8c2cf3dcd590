//! Error types for the shell.

use crate::command::ExitCode;
use crate::lexer::LexingError;
use crate::parser::ParsingError;
use thiserror::Error;

/// Result alias used across the crate.
pub type ShellResult<T> = Result<T, ShellError>;

/// Everything that can abort a single command.
///
/// Each variant maps onto the status the shell stores as its last exit status,
/// see [`ShellError::status`]. [`ShellError::Exit`] is the only variant that is
/// not a failure: it carries the request to terminate the shell.
#[derive(Error, Debug)]
pub enum ShellError {
    /// An option the built-in does not know.
    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    /// A script source that cannot be opened.
    #[error("Cannot open file {0}")]
    FileNotFound(String),

    #[error("Too many arguments")]
    TooManyArgs,

    #[error("Too few arguments")]
    TooFewArgs,

    /// Arguments that parse but make no sense (e.g. `mexport FOO`).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed line: unterminated quote, dangling operator, empty stage.
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    #[error("{0}")]
    Other(String),

    /// Exit requested (not really an error)
    #[error("Exit with code {0}")]
    Exit(ExitCode),
}

impl From<LexingError> for ShellError {
    fn from(e: LexingError) -> Self {
        ShellError::Syntax(e.to_string())
    }
}

impl From<ParsingError> for ShellError {
    fn from(e: ParsingError) -> Self {
        ShellError::Syntax(e.to_string())
    }
}

/// Numeric statuses reported for each error class.
pub mod status {
    use crate::command::ExitCode;

    pub const UNKNOWN_OPTION: ExitCode = 1;
    pub const FILE_NOT_FOUND: ExitCode = 2;
    pub const TOO_MANY_ARGS: ExitCode = 3;
    pub const WRONG_ARG_COUNT: ExitCode = 4;
    pub const OTHER: ExitCode = 5;
    pub const NOT_EXECUTABLE: ExitCode = 126;
    pub const NOT_FOUND: ExitCode = 127;
}

impl ShellError {
    /// Status stored in the shell state after this error aborted a command.
    pub fn status(&self) -> ExitCode {
        match self {
            ShellError::UnknownOption(_) => status::UNKNOWN_OPTION,
            ShellError::FileNotFound(_) => status::FILE_NOT_FOUND,
            ShellError::TooManyArgs => status::TOO_MANY_ARGS,
            ShellError::TooFewArgs => status::WRONG_ARG_COUNT,
            ShellError::InvalidArgument(_)
            | ShellError::Syntax(_)
            | ShellError::Io(_)
            | ShellError::Sys(_)
            | ShellError::Other(_) => status::OTHER,
            ShellError::Exit(code) => *code,
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        ShellError::Other(msg.into())
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        ShellError::Syntax(msg.into())
    }
}
