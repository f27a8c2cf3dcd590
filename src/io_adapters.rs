use std::io::{self, Write};
use std::os::fd::{BorrowedFd, RawFd};

/// Unbuffered writer over a raw descriptor, usually one of the standard ones.
///
/// Built-ins write through this instead of [`std::io::stdout`] so that every
/// byte reaches whatever descriptor 1 or 2 refers to *right now*: a redirected
/// file, a pipe to the next stage, or the terminal. It takes no locks and does
/// not allocate, so it is also safe to use in a freshly forked child.
pub struct FdWriter<'fd> {
    fd: BorrowedFd<'fd>,
}

impl<'fd> FdWriter<'fd> {
    pub fn new(fd: BorrowedFd<'fd>) -> Self {
        Self { fd }
    }
}

impl FdWriter<'static> {
    pub fn stdout() -> Self {
        Self::standard(libc::STDOUT_FILENO)
    }

    pub fn stderr() -> Self {
        Self::standard(libc::STDERR_FILENO)
    }

    fn standard(fd: RawFd) -> Self {
        // SAFETY: descriptors 0-2 stay allocated for the life of the process;
        // redirection only ever replaces them with dup2.
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        Self { fd }
    }
}

impl Write for FdWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(nix::unistd::write(self.fd, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Output streams handed to a built-in.
///
/// In the shell these are [`FdWriter`]s; tests pass in-memory buffers.
pub struct Io<'a> {
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}

impl<'a> Io<'a> {
    pub fn new(stdout: &'a mut dyn Write, stderr: &'a mut dyn Write) -> Self {
        Self { stdout, stderr }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_forwards_to_the_given_writers() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let io = Io::new(&mut out, &mut err);
        writeln!(io.stdout, "to out").unwrap();
        write!(io.stderr, "to err").unwrap();
        assert_eq!(out, b"to out\n");
        assert_eq!(err, b"to err");
    }

    #[test]
    fn fd_writer_writes_to_a_borrowed_descriptor() {
        use std::os::fd::AsFd;

        let file = tempfile::NamedTempFile::new().unwrap();
        FdWriter::new(file.as_file().as_fd())
            .write_all(b"straight through")
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(file.path()).unwrap(),
            "straight through"
        );
    }
}
