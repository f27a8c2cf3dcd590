//! Reaping of background children.
//!
//! The SIGCHLD handler collects every child that has already terminated and
//! throws its status away. It touches nothing but the process table and
//! `errno`. Foreground waits hold a [`DeferReaping`] guard so the handler can
//! never collect a child the control thread is about to wait for; the pending
//! signal is delivered as soon as the guard is dropped.

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, warn};

extern "C" fn reap_children(_signal: libc::c_int) {
    let saved = Errno::last_raw();
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => {}
        }
    }
    Errno::set_raw(saved);
}

/// Install the SIGCHLD handler for the whole process.
///
/// Called once by the binary at start-up. Library users that wait for their
/// children themselves should not call it.
pub fn install() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(reap_children),
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );
    // SAFETY: the handler only calls waitpid and touches errno, both of which
    // are async-signal-safe.
    unsafe { signal::sigaction(Signal::SIGCHLD, &action) }?;
    debug!("SIGCHLD reaper installed");
    Ok(())
}

fn sigchld_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGCHLD);
    set
}

/// Keeps SIGCHLD blocked on the current thread while alive.
///
/// Nested guards are fine: only the guard that actually blocked the signal
/// unblocks it.
#[must_use = "SIGCHLD is unblocked again as soon as the guard is dropped"]
pub struct DeferReaping {
    unblock_on_drop: bool,
}

impl DeferReaping {
    pub fn new() -> Self {
        let mut previous = SigSet::empty();
        match signal::pthread_sigmask(
            SigmaskHow::SIG_BLOCK,
            Some(&sigchld_set()),
            Some(&mut previous),
        ) {
            Ok(()) => Self {
                unblock_on_drop: !previous.contains(Signal::SIGCHLD),
            },
            Err(e) => {
                warn!(error = %e, "could not block SIGCHLD");
                Self {
                    unblock_on_drop: false,
                }
            }
        }
    }
}

impl Default for DeferReaping {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferReaping {
    fn drop(&mut self) {
        if self.unblock_on_drop {
            let _ = sigchld_set().thread_unblock();
        }
    }
}

/// First thing a forked child does: take back the signal mask it inherited
/// from a [`DeferReaping`] in the parent, and let SIGPIPE end it again (the
/// Rust runtime ignores SIGPIPE, and an ignored signal survives `execve`).
pub fn reset_in_child() {
    let _ = sigchld_set().thread_unblock();
    // SAFETY: the default disposition runs no code of ours.
    let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };
}
