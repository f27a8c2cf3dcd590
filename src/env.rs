use std::collections::BTreeMap;
use std::env as stdenv;
use std::ffi::CString;
use std::path::{Path, PathBuf};

/// The shell's variable table and working directory.
///
/// Seeded from the process environment at start-up. `mexport` is the only
/// writer; `$NAME` expansion, PATH lookup and every launched program read it.
/// Only the control thread touches it, so no locking is involved.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: BTreeMap<String, String>,
    /// The current working directory, kept in sync by `mcd`.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// An environment with no variables, rooted at `current_dir`.
    pub fn empty(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: BTreeMap::new(),
            current_dir: current_dir.into(),
        }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Put `dir` in front of the PATH search list.
    pub fn prepend_path(&mut self, dir: &Path) {
        let dir = dir.to_string_lossy();
        let path = match self.get_var("PATH") {
            Some(old) if !old.is_empty() => format!("{dir}:{old}"),
            _ => dir.into_owned(),
        };
        self.set_var("PATH", path);
    }

    /// `NAME=value` strings for `execve`. Entries containing NUL are skipped.
    pub fn to_envp(&self) -> Vec<CString> {
        self.vars
            .iter()
            .filter_map(|(k, v)| CString::new(format!("{k}={v}")).ok())
            .collect()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
