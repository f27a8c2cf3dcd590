#![allow(dead_code)]

use myshell::{Environment, Shell};
use std::fs;
use std::os::fd::AsFd;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// A shell seeded from the test process environment.
pub fn shell() -> Shell {
    Shell::new(Environment::new())
}

/// Run `line` and return the resulting last status.
pub fn run(shell: &mut Shell, line: &str) -> i32 {
    shell
        .execute_line(line)
        .unwrap_or_else(|e| panic!("`{line}` ended the shell: {e}"));
    shell.state.last_status
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

/// Identity of the process's standard streams and number of open descriptors.
#[derive(Debug, PartialEq, Eq)]
pub struct FdSnapshot {
    open_descriptors: usize,
    stdout: (u64, u64),
    stderr: (u64, u64),
}

fn identity(fd: std::os::fd::BorrowedFd<'_>) -> (u64, u64) {
    let file = fs::File::from(fd.try_clone_to_owned().unwrap());
    let meta = file.metadata().unwrap();
    (meta.dev(), meta.ino())
}

impl FdSnapshot {
    pub fn take() -> Self {
        Self {
            open_descriptors: fs::read_dir("/proc/self/fd").unwrap().count(),
            stdout: identity(std::io::stdout().as_fd()),
            stderr: identity(std::io::stderr().as_fd()),
        }
    }
}

/// Number of zombie children of this process, from the process table.
pub fn zombie_children() -> usize {
    let me = std::process::id().to_string();
    fs::read_dir("/proc")
        .unwrap()
        .flatten()
        .filter_map(|entry| fs::read_to_string(entry.path().join("stat")).ok())
        .filter(|stat| {
            // "pid (comm) state ppid ..."; comm may itself contain spaces.
            let Some((_, rest)) = stat.rsplit_once(')') else {
                return false;
            };
            let mut fields = rest.split_whitespace();
            fields.next() == Some("Z") && fields.next() == Some(me.as_str())
        })
        .count()
}
