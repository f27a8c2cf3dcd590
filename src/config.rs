use std::path::PathBuf;

/// Start-up settings of the shell binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Where interactive history is loaded from and saved to.
    pub history_file: PathBuf,
    /// `tracing` filter directive, e.g. `warn` or `myshell=debug`.
    pub log_filter: String,
    /// Put the directory of the shell executable in front of `PATH`.
    pub prefix_path: bool,
}

const DEFAULT_LOG_FILTER: &str = "warn";

impl ShellConfig {
    /// Defaults overlaid with `MYSHELL_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ShellConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let history_file = match lookup("HOME") {
            Some(home) if !home.is_empty() => PathBuf::from(home).join(".myshell_history"),
            _ => PathBuf::from("history.txt"),
        };
        let mut config = Self {
            history_file,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            prefix_path: true,
        };
        config.apply_env_overrides(lookup);
        config
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(history) = lookup("MYSHELL_HISTORY").filter(|h| !h.is_empty()) {
            self.history_file = PathBuf::from(history);
        }
        if let Some(filter) = lookup("MYSHELL_LOG").filter(|f| !f.is_empty()) {
            self.log_filter = filter;
        }
        if let Some(flag) = lookup("MYSHELL_NO_PATH_PREFIX") {
            self.prefix_path = matches!(flag.as_str(), "" | "0" | "false");
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> ShellConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ShellConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_home() {
        let config = ShellConfig::default();
        assert_eq!(config.history_file, PathBuf::from("history.txt"));
        assert_eq!(config.log_filter, "warn");
        assert!(config.prefix_path);
    }

    #[test]
    fn history_lives_in_home() {
        let config = config_with(&[("HOME", "/home/user")]);
        assert_eq!(
            config.history_file,
            PathBuf::from("/home/user/.myshell_history")
        );
    }

    #[test]
    fn env_overrides_config() {
        let config = config_with(&[
            ("HOME", "/home/user"),
            ("MYSHELL_HISTORY", "/tmp/hist"),
            ("MYSHELL_LOG", "myshell=debug"),
            ("MYSHELL_NO_PATH_PREFIX", "1"),
        ]);
        assert_eq!(config.history_file, PathBuf::from("/tmp/hist"));
        assert_eq!(config.log_filter, "myshell=debug");
        assert!(!config.prefix_path);
    }

    #[test]
    fn falsy_no_prefix_keeps_prefixing() {
        assert!(config_with(&[("MYSHELL_NO_PATH_PREFIX", "0")]).prefix_path);
    }
}
