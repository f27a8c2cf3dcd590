//! Output redirection for one input line.
//!
//! Redirections are applied to the shell's own stdout/stderr descriptors for
//! the duration of a line: built-ins write to them directly and every child
//! inherits them. A [`RedirectionSpec`] remembers a duplicate of each original
//! descriptor it replaced and puts it back exactly once, when the line is done
//! or when the `RedirectionSpec` is dropped, whichever comes first.

use crate::env::Environment;
use crate::error::{ShellError, ShellResult};
use crate::expand::expand_text;
use crate::io_adapters::FdWriter;
use crate::lexer::{RedirectOp, Token};
use nix::unistd::dup2;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use tracing::{debug, warn};

/// A standard stream the shell can redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn fd(self) -> RawFd {
        match self {
            Stream::Stdout => libc::STDOUT_FILENO,
            Stream::Stderr => libc::STDERR_FILENO,
        }
    }

    /// Duplicate the descriptor currently behind this stream.
    fn duplicate(self) -> io::Result<OwnedFd> {
        match self {
            Stream::Stdout => io::stdout().as_fd().try_clone_to_owned(),
            Stream::Stderr => io::stderr().as_fd().try_clone_to_owned(),
        }
    }

    fn flush(self) {
        let _ = match self {
            Stream::Stdout => io::stdout().flush(),
            Stream::Stderr => io::stderr().flush(),
        };
    }
}

#[derive(Debug, Default)]
struct Slot {
    /// The original descriptor, present exactly while the stream is redirected.
    backup: Option<OwnedFd>,
    target: Option<String>,
}

/// Which of stdout/stderr a line redirected, and how to undo it.
#[derive(Debug, Default)]
pub struct RedirectionSpec {
    stdout: Slot,
    stderr: Slot,
}

impl RedirectionSpec {
    /// Scan `tokens` left to right, apply every output redirection and return
    /// the tokens that are left.
    ///
    /// A target that cannot be opened is reported on the shell's stderr and the
    /// stream stays where it was; the line still runs. A later operator for a
    /// stream first undoes the earlier one. `2>&1` makes stderr follow the
    /// stdout target, whether that `>` comes before or after it.
    pub fn resolve(tokens: Vec<Token>, env: &Environment) -> ShellResult<(Self, Vec<Token>)> {
        let mut spec = RedirectionSpec::default();
        let mut rest = Vec::with_capacity(tokens.len());
        let mut merge_stderr = false;

        let mut tokens = tokens.into_iter();
        while let Some(token) = tokens.next() {
            let op = match token {
                Token::Redirect(op) => op,
                other => {
                    rest.push(other);
                    continue;
                }
            };

            if op == RedirectOp::StderrToStdout {
                if spec.is_redirected(Stream::Stdout) {
                    spec.merge_stderr_into_stdout();
                } else {
                    merge_stderr = true;
                }
                continue;
            }

            let target = match tokens.next() {
                Some(Token::Word(parts)) => expand_text(&parts, env),
                _ => return Err(ShellError::syntax("missing file name after redirection")),
            };

            match op {
                RedirectOp::Stdout { append } => {
                    spec.redirect_to_file(&[Stream::Stdout], &target, append);
                    if merge_stderr && spec.is_redirected(Stream::Stdout) {
                        spec.merge_stderr_into_stdout();
                        merge_stderr = false;
                    }
                }
                RedirectOp::Stderr { append } => {
                    spec.redirect_to_file(&[Stream::Stderr], &target, append)
                }
                RedirectOp::Both { append } => {
                    spec.redirect_to_file(&[Stream::Stdout, Stream::Stderr], &target, append)
                }
                RedirectOp::StderrToStdout => unreachable!("handled above"),
            }
        }

        Ok((spec, rest))
    }

    pub fn is_redirected(&self, stream: Stream) -> bool {
        self.slot(stream).backup.is_some()
    }

    /// True while any stream of this spec points away from its original.
    pub fn is_active(&self) -> bool {
        self.is_redirected(Stream::Stdout) || self.is_redirected(Stream::Stderr)
    }

    /// The shell's own descriptor for `stream`, saved before redirecting it.
    pub fn original(&self, stream: Stream) -> Option<RawFd> {
        self.slot(stream).backup.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// The shell's own stderr, for diagnostics that must not land in a
    /// redirection target.
    pub fn shell_stderr(&self) -> FdWriter<'_> {
        match &self.stderr.backup {
            Some(backup) => FdWriter::new(backup.as_fd()),
            None => FdWriter::stderr(),
        }
    }

    /// Point every redirected stream back at its original and close the backups.
    ///
    /// Calling it again, or on a spec that redirected nothing, does nothing.
    pub fn restore(&mut self) {
        self.restore_stream(Stream::Stdout);
        self.restore_stream(Stream::Stderr);
    }

    fn slot(&self, stream: Stream) -> &Slot {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }

    fn slot_mut(&mut self, stream: Stream) -> &mut Slot {
        match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        }
    }

    fn redirect_to_file(&mut self, streams: &[Stream], path: &str, append: bool) {
        let file = match open_target(path, append) {
            Ok(file) => file,
            Err(e) => {
                let _ = writeln!(
                    self.shell_stderr(),
                    "Failed to open {path} for redirection: {e}"
                );
                warn!(path, error = %e, "redirection target not opened");
                return;
            }
        };
        for &stream in streams {
            if let Err(e) = self.point(stream, file.as_raw_fd(), path) {
                let _ = writeln!(self.shell_stderr(), "Failed to redirect to {path}: {e}");
                warn!(path, ?stream, error = %e, "redirection not applied");
            }
        }
        // `file` closes here; the stream descriptors keep the file open.
    }

    fn merge_stderr_into_stdout(&mut self) {
        let target = self.stdout.target.clone().unwrap_or_default();
        if let Err(e) = self.point(Stream::Stderr, Stream::Stdout.fd(), &target) {
            let _ = writeln!(self.shell_stderr(), "Failed to redirect stderr to stdout: {e}");
            warn!(error = %e, "2>&1 not applied");
        }
    }

    /// Save the current descriptor of `stream`, then make it refer to `fd`.
    fn point(&mut self, stream: Stream, fd: RawFd, target: &str) -> ShellResult<()> {
        self.restore_stream(stream);
        stream.flush();
        let backup = stream.duplicate()?;
        dup2(fd, stream.fd())?;
        debug!(?stream, target, "stream redirected");
        let slot = self.slot_mut(stream);
        slot.backup = Some(backup);
        slot.target = Some(target.to_string());
        Ok(())
    }

    fn restore_stream(&mut self, stream: Stream) {
        let Some(backup) = self.slot_mut(stream).backup.take() else {
            return;
        };
        self.slot_mut(stream).target = None;
        stream.flush();
        if let Err(e) = dup2(backup.as_raw_fd(), stream.fd()) {
            warn!(?stream, error = %e, "failed to restore stream");
        }
        // dropping `backup` closes the saved duplicate
    }
}

impl Drop for RedirectionSpec {
    fn drop(&mut self) {
        self.restore();
    }
}

fn open_target(path: &str, append: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o644);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    options.open(path)
}
