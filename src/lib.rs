//! A small Unix command shell.
//!
//! A line goes through the [`lexer`], output redirections are applied by
//! [`redirect`], the remaining tokens become a [`command::Pipeline`], and each
//! stage is either a built-in from the [`dispatch`] table or a program started
//! with fork and exec. [`Shell::execute_line`] drives all of this; the binary
//! adds an interactive loop, script arguments and a SIGCHLD [`reaper`].

mod builtin;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod expand;
pub mod external;
pub mod io_adapters;
pub mod lexer;
pub mod options;
pub mod parser;
mod process;
pub mod reaper;
pub mod redirect;
pub mod repl;
pub mod shell;

#[cfg(test)]
mod test_util;

pub use config::ShellConfig;
pub use env::Environment;
pub use error::{ShellError, ShellResult};
pub use shell::{Shell, ShellState};
