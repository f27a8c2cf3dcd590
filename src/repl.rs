use crate::command::ExitCode;
use crate::error::ShellError;
use crate::shell::Shell;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::Path;
use tracing::{debug, warn};

/// Read lines from the terminal until end of input or `mexit`.
///
/// Returns the status the process should exit with: the `mexit` argument, or
/// the last status when input ends.
pub fn run(shell: &mut Shell, history: &Path) -> rustyline::Result<ExitCode> {
    let mut rl = DefaultEditor::new()?;
    if let Err(e) = rl.load_history(history) {
        debug!(path = %history.display(), error = %e, "no history loaded");
    }

    let code = loop {
        let prompt = format!("{} $ ", shell.env.current_dir.display());
        match rl.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                if let Err(ShellError::Exit(code)) = shell.execute_line(&line) {
                    break code;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break shell.state.last_status,
            Err(e) => return Err(e),
        }
    };

    if let Err(e) = rl.save_history(history) {
        warn!(path = %history.display(), error = %e, "could not save history");
    }
    Ok(code)
}
