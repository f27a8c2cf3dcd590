//! Word expansion: parameter substitution followed by filename globbing.

use crate::env::Environment;
use crate::lexer::WordPart;
use glob::{MatchOptions, Pattern};

fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expand a word into its text without globbing.
///
/// Used where exactly one string is required: redirection targets and input files.
/// `$(...)` is emitted literally; only `mexport` gives it a meaning.
pub fn expand_text(parts: &[WordPart], env: &Environment) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            WordPart::Literal(s) | WordPart::Quoted(s) => out.push_str(s),
            WordPart::ParamSubst(name) => out.push_str(env.get_var(name).unwrap_or_default()),
            WordPart::CmdSubst(inner) => {
                out.push_str("$(");
                out.push_str(inner);
                out.push(')');
            }
        }
    }
    out
}

/// Expand a word into one or more arguments (glob aware).
///
/// Only unquoted literal text can carry glob metacharacters. When the pattern
/// matches nothing the word is kept as written.
pub fn expand_word(parts: &[WordPart], env: &Environment) -> Vec<String> {
    let text = expand_text(parts, env);
    let globbing = parts
        .iter()
        .any(|p| matches!(p, WordPart::Literal(s) if has_glob_chars(s)));
    if !globbing {
        return vec![text];
    }

    // Everything that did not come from unquoted text is matched literally.
    let mut pattern = String::new();
    for part in parts {
        match part {
            WordPart::Literal(s) => pattern.push_str(s),
            other => pattern.push_str(&Pattern::escape(&expand_text(
                std::slice::from_ref(other),
                env,
            ))),
        }
    }

    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let matches: Vec<String> = match glob::glob_with(&pattern, options) {
        Ok(paths) => paths
            .flatten()
            .map(|p| p.to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };

    if matches.is_empty() {
        vec![text]
    } else {
        matches
    }
}
