use std::path::PathBuf;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// One stage of a line, ready to be dispatched.
///
/// Arguments are fully expanded: `argv[0]` is the program or built-in name.
/// A command never changes once it has been built for an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub argv: Vec<String>,
    /// File to connect to the command's standard input (`< file`).
    pub input_file: Option<PathBuf>,
}

impl Command {
    /// The program or built-in name.
    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }
}

/// Commands of a single line connected by `|`, in execution order.
///
/// A pipeline with one stage is a plain command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Command>,
    /// Set when the line ended in `&`.
    pub background: bool,
}
