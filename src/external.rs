use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::status;
use crate::io_adapters::FdWriter;
use nix::sys::wait::WaitStatus;
use nix::unistd::execve;
use std::borrow::Cow;
use std::ffi::{CString, OsStr};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Everything needed to replace a child's image, prepared before `fork`.
///
/// The child side only calls [`Launch::exec`], which neither allocates nor
/// takes locks.
#[derive(Debug)]
pub enum Launch {
    Program {
        path: CString,
        argv: Vec<CString>,
        envp: Vec<CString>,
        /// `"<name>: "`, prefixed to the errno text if `execve` fails.
        failure_prefix: String,
    },
    /// The command could not be resolved; holds the complete diagnostic.
    Missing(String),
}

impl Launch {
    /// Resolve `argv[0]` against the environment's `PATH` and convert the
    /// arguments and environment to C strings.
    pub fn prepare(argv: &[String], env: &Environment) -> Launch {
        let name = argv.first().map(String::as_str).unwrap_or_default();
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let Some(path) = find_command_path(OsStr::new(search_paths), Path::new(name)) else {
            return Launch::Missing(format!("{name}: command not found\n"));
        };

        let path = CString::new(path.as_os_str().as_encoded_bytes());
        let argv: Result<Vec<CString>, _> = argv.iter().map(|a| CString::new(a.as_str())).collect();
        match (path, argv) {
            (Ok(path), Ok(argv)) => Launch::Program {
                path,
                argv,
                envp: env.to_envp(),
                failure_prefix: format!("{name}: "),
            },
            _ => Launch::Missing(format!("{name}: argument contains a NUL byte\n")),
        }
    }

    /// Replace the current process image. Never returns: if the image cannot
    /// be replaced the process exits with 127 (not found) or 126.
    pub fn exec(&self) -> ! {
        let mut stderr = FdWriter::stderr();
        match self {
            Launch::Program {
                path,
                argv,
                envp,
                failure_prefix,
            } => {
                let errno = match execve(path, argv, envp) {
                    Err(errno) => errno,
                    Ok(never) => match never {},
                };
                let _ = stderr.write_all(failure_prefix.as_bytes());
                let _ = stderr.write_all(errno.desc().as_bytes());
                let _ = stderr.write_all(b"\n");
                terminate(status::NOT_EXECUTABLE)
            }
            Launch::Missing(message) => {
                let _ = stderr.write_all(message.as_bytes());
                terminate(status::NOT_FOUND)
            }
        }
    }
}

/// End a forked child without running any of the parent's exit handlers or
/// flushing buffers it inherited.
pub fn terminate(code: ExitCode) -> ! {
    // SAFETY: `_exit` is async-signal-safe and ends the process immediately.
    unsafe { libc::_exit(code) }
}

/// Shell status of a reaped child: its exit code, or 128 plus the number of
/// the signal that killed it.
pub fn exit_code(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh`): returns it if it exists.
/// - `./foo`: returns it if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    if path.starts_with("./") && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| path.is_file())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
