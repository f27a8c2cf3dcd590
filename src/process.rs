//! Running commands: built-ins in process, programs through fork and exec.
//!
//! Everything a child needs (argument vectors, environment, file names,
//! diagnostics) is prepared before `fork`. After `fork` a child only moves
//! descriptors around and then either replaces its image or, for a built-in
//! stage or a command substitution, runs shell code and leaves through
//! [`terminate`]. It never returns into the caller.

use crate::command::{Command, ExitCode, Pipeline};
use crate::dispatch::{self, Body, BuiltinFn, Dispatch};
use crate::error::{ShellResult, status};
use crate::external::{Launch, exit_code, terminate};
use crate::io_adapters::{FdWriter, Io};
use crate::reaper::{self, DeferReaping};
use crate::redirect::{RedirectionSpec, Stream};
use crate::shell::Shell;
use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, close, dup2, fork, pipe2};
use std::ffi::CString;
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use tracing::{debug, warn};

/// `< file` of a stage, opened by the child.
struct InputFile {
    path: CString,
    /// `"<path>: "`, prefixed to the errno text if the file cannot be opened.
    failure_prefix: String,
}

impl InputFile {
    fn prepare(path: &Path) -> Option<Self> {
        let display = path.display();
        CString::new(path.as_os_str().as_encoded_bytes())
            .ok()
            .map(|c_path| Self {
                path: c_path,
                failure_prefix: format!("{display}: "),
            })
    }

    /// Make the file the child's stdin, or end the child with status 1.
    fn attach(&self) {
        let fd = match open(self.path.as_c_str(), OFlag::O_RDONLY, Mode::empty()) {
            Ok(fd) => fd,
            Err(errno) => fail_child(&self.failure_prefix, errno, 1),
        };
        if let Err(errno) = dup2(fd, libc::STDIN_FILENO) {
            fail_child(&self.failure_prefix, errno, 1);
        }
        let _ = close(fd);
    }
}

fn fail_child(prefix: &str, errno: Errno, code: ExitCode) -> ! {
    let mut stderr = FdWriter::stderr();
    let _ = stderr.write_all(prefix.as_bytes());
    let _ = stderr.write_all(errno.desc().as_bytes());
    let _ = stderr.write_all(b"\n");
    terminate(code)
}

/// What a stage's child will run.
enum Plan {
    Builtin(BuiltinFn),
    Program(Launch),
}

/// Block until `pid` ends and return its status.
///
/// A child that was already collected elsewhere counts as a success.
fn wait_for(pid: Pid) -> ExitCode {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some(code) = exit_code(status) {
                    debug!(%pid, code, "child finished");
                    return code;
                }
            }
            Err(Errno::EINTR) => {}
            Err(e) => {
                warn!(%pid, error = %e, "wait failed");
                return 0;
            }
        }
    }
}

/// Point `target` at `fd` inside a child, or end the child.
fn rewire(fd: RawFd, target: RawFd) {
    if fd != target && dup2(fd, target).is_err() {
        terminate(status::OTHER);
    }
}

impl Shell {
    /// Run a parsed line. `redirection` is the line's already applied
    /// redirection; it is consulted, never changed.
    pub(crate) fn run_pipeline(
        &mut self,
        pipeline: &Pipeline,
        redirection: &RedirectionSpec,
    ) -> ShellResult<()> {
        match pipeline.stages.as_slice() {
            [single] => self.run_single(single, redirection),
            stages => {
                self.run_stages(stages, redirection);
                Ok(())
            }
        }
    }

    fn run_single(&mut self, command: &Command, redirection: &RedirectionSpec) -> ShellResult<()> {
        match self.state.dispatch().resolve(command.name()) {
            Dispatch::Builtin(handler) => {
                let body = if self.state.background && !self.state.redirecting {
                    Body::Skip
                } else {
                    Body::Run
                };
                let mut stdout = FdWriter::stdout();
                let mut stderr = FdWriter::stderr();
                let mut io = Io::new(&mut stdout, &mut stderr);
                self.state.last_status =
                    dispatch::call(handler, self, command.args(), body, &mut io)?;
                Ok(())
            }
            Dispatch::External => {
                self.run_external(command, redirection);
                Ok(())
            }
        }
    }

    fn run_external(&mut self, command: &Command, redirection: &RedirectionSpec) {
        let launch = Launch::prepare(&command.argv, &self.env);
        let input = command.input_file.as_deref().and_then(InputFile::prepare);
        let background = self.state.background;
        let detach = background && !self.state.redirecting;

        let _deferred = (!background).then(DeferReaping::new);
        // SAFETY: the shell is single-threaded; the child only rewires
        // descriptors and calls execve or _exit.
        let pid = match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                reaper::reset_in_child();
                if let Some(input) = &input {
                    input.attach();
                }
                if detach {
                    for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
                        let _ = close(fd);
                    }
                }
                launch.exec()
            }
            Ok(ForkResult::Parent { child }) => child,
            Err(e) => {
                let _ = writeln!(redirection.shell_stderr(), "Failed to fork: {e}");
                warn!(name = command.name(), error = %e, "fork failed");
                self.state.last_status = status::OTHER;
                return;
            }
        };

        if background {
            debug!(%pid, name = command.name(), "started in background");
            return;
        }
        self.state.last_status = wait_for(pid);
    }

    /// Launch every stage left to right, then wait for all of them.
    ///
    /// A stage whose pipe or process cannot be created is reported and
    /// skipped; the rest of the pipeline still runs. The status is the last
    /// stage's, or 5 if it never started.
    fn run_stages(&mut self, stages: &[Command], redirection: &RedirectionSpec) {
        let original_stderr = redirection.original(Stream::Stderr);
        let _deferred = DeferReaping::new();

        let mut upstream: Option<OwnedFd> = None;
        let mut children = Vec::with_capacity(stages.len());
        let mut last_pid = None;
        let last = stages.len() - 1;

        for (i, stage) in stages.iter().enumerate() {
            let is_last = i == last;
            let stdin = match upstream.take() {
                Some(fd) => Some(fd),
                // The producer never started: read nothing rather than the terminal.
                None if i > 0 => File::open("/dev/null").ok().map(OwnedFd::from),
                None => None,
            };
            let downstream = if is_last {
                None
            } else {
                match pipe2(OFlag::O_CLOEXEC) {
                    Ok(ends) => Some(ends),
                    Err(e) => {
                        let _ = writeln!(redirection.shell_stderr(), "Failed to create pipe: {e}");
                        warn!(stage = i, error = %e, "pipe failed, stage skipped");
                        continue;
                    }
                }
            };

            let plan = match self.state.dispatch().resolve(stage.name()) {
                Dispatch::Builtin(handler) => Plan::Builtin(handler),
                Dispatch::External => Plan::Program(Launch::prepare(&stage.argv, &self.env)),
            };
            let input = stage.input_file.as_deref().and_then(InputFile::prepare);

            // SAFETY: see `run_external`; a built-in stage runs shell code in
            // the child and leaves through `terminate`.
            match unsafe { fork() } {
                Ok(ForkResult::Child) => {
                    reaper::reset_in_child();
                    if let Some(fd) = &stdin {
                        rewire(fd.as_raw_fd(), libc::STDIN_FILENO);
                    }
                    if let Some((_, write)) = &downstream {
                        rewire(write.as_raw_fd(), libc::STDOUT_FILENO);
                    }
                    if !is_last {
                        if let Some(fd) = original_stderr {
                            rewire(fd, libc::STDERR_FILENO);
                        }
                    }
                    drop(stdin);
                    drop(downstream);
                    if let Some(input) = &input {
                        input.attach();
                    }
                    self.run_stage_child(stage, plan)
                }
                Ok(ForkResult::Parent { child }) => {
                    debug!(%child, stage = i, name = stage.name(), "stage started");
                    children.push(child);
                    if is_last {
                        last_pid = Some(child);
                    }
                }
                Err(e) => {
                    let _ = writeln!(redirection.shell_stderr(), "Failed to fork: {e}");
                    warn!(stage = i, name = stage.name(), error = %e, "fork failed, stage skipped");
                }
            }

            // Close our copy of the write end now so the consumer sees EOF
            // when the producer exits; keep the read end for the next stage.
            upstream = downstream.map(|(read, _write)| read);
        }

        let mut status = status::OTHER;
        for pid in children {
            let code = wait_for(pid);
            if Some(pid) == last_pid {
                status = code;
            }
        }
        self.state.last_status = status;
    }

    fn run_stage_child(&mut self, stage: &Command, plan: Plan) -> ! {
        match plan {
            Plan::Program(launch) => launch.exec(),
            Plan::Builtin(handler) => {
                let mut stdout = FdWriter::stdout();
                let mut stderr = FdWriter::stderr();
                let mut io = Io::new(&mut stdout, &mut stderr);
                let code = match dispatch::call(handler, self, stage.args(), Body::Run, &mut io) {
                    Ok(code) => code,
                    Err(e) => e.status(),
                };
                terminate(code)
            }
        }
    }

    /// Run `line` in a child with its stdout captured, and return that output
    /// without trailing newlines.
    pub fn capture_output(&mut self, line: &str) -> ShellResult<String> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
        let _deferred = DeferReaping::new();

        // SAFETY: see `run_external`; the child runs the line and leaves
        // through `terminate`.
        match unsafe { fork() }? {
            ForkResult::Child => {
                reaper::reset_in_child();
                drop(read);
                rewire(write.as_raw_fd(), libc::STDOUT_FILENO);
                drop(write);
                self.state.background = false;
                self.state.redirecting = false;
                let code = match self.execute_line(line) {
                    Ok(()) => self.state.last_status,
                    Err(e) => e.status(),
                };
                terminate(code)
            }
            ForkResult::Parent { child } => {
                drop(write);
                let mut raw = Vec::new();
                let read_result = File::from(read).read_to_end(&mut raw);
                let code = wait_for(child);
                read_result?;
                debug!(line, code, bytes = raw.len(), "command substitution finished");

                let mut output = String::from_utf8_lossy(&raw).into_owned();
                output.truncate(output.trim_end_matches('\n').len());
                Ok(output)
            }
        }
    }
}
