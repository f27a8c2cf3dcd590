//! Lexical analysis of a single input line.
//!
//! The lexer only classifies text: words (with their quoted, parameter and
//! command-substitution parts) and the operators the shell understands. It never
//! looks at the environment; expansion happens later, in [`crate::expand`].

use thiserror::Error;

/// A part of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Unquoted text. The only kind of part that takes part in glob expansion.
    Literal(String),
    /// Text that came from quotes or a backslash escape.
    Quoted(String),
    /// `$NAME` or `${NAME}`. Contains the name.
    ParamSubst(String),
    /// `$(...)`. Contains the text inside the parentheses.
    CmdSubst(String),
}

/// Output redirection operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    /// `>`, `1>`, `>>`, `1>>`
    Stdout { append: bool },
    /// `2>`, `2>>`
    Stderr { append: bool },
    /// `&>`, `&>>`
    Both { append: bool },
    /// `2>&1`
    StderrToStdout,
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word token, which may be composed of multiple parts (`WordPart`).
    Word(Vec<WordPart>),
    /// The pipe operator, `|`.
    PipeOp,
    /// The background marker, `&`.
    Background,
    /// Input redirection symbol, `<`.
    RedirectLeft,
    /// One of the output redirection operators.
    Redirect(RedirectOp),
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unterminated quote")]
    UnfinishedQuote,
    /// A closing parenthesis for command substitution `$(...)` was not found.
    #[error("unterminated command substitution")]
    UnfinishedCmdSubst,
    /// A closing brace for parameter substitution `${...}` was not found.
    #[error("unterminated parameter substitution")]
    UnfinishedParamSubst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
    buffer: String,
    out: Vec<Token>,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Vec::new(),
            buffer: String::new(),
            out: Vec::new(),
        }
    }

    fn make_tokens(mut self) -> Result<Vec<Token>, LexingError> {
        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_unquoted(ch)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        if matches!(
            self.state,
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote
        ) {
            return Err(LexingError::UnfinishedQuote);
        }

        self.finish_word();
        Ok(self.out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_n(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).copied()
    }

    /// Consume the next character if it is `expected`.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn handle_unquoted(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            c if c.is_whitespace() => self.finish_word(),
            '#' if self.state == LexingState::Start => {
                // comment to end of line
                self.pos = self.input.len();
            }
            '|' => {
                self.finish_word();
                self.out.push(Token::PipeOp);
            }
            '<' => {
                self.finish_word();
                self.out.push(Token::RedirectLeft);
            }
            '&' => {
                self.finish_word();
                if self.eat('>') {
                    let append = self.eat('>');
                    self.out.push(Token::Redirect(RedirectOp::Both { append }));
                } else {
                    self.out.push(Token::Background);
                }
            }
            '>' => self.handle_output_redirect(),
            '\'' => {
                self.flush_literal();
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.flush_literal();
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => {
                self.flush_literal();
                if let Some(next) = self.read_char() {
                    self.current_word.push(WordPart::Quoted(next.to_string()));
                }
                self.state = LexingState::ReadingWord;
            }
            '$' => {
                self.read_dollar(false)?;
                self.state = LexingState::ReadingWord;
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
        Ok(())
    }

    /// `>` was just read. A word consisting of exactly `1` or `2` right before
    /// it is the descriptor number, not an argument.
    fn handle_output_redirect(&mut self) {
        let fd = if self.current_word.is_empty() && (self.buffer == "1" || self.buffer == "2") {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        };
        self.finish_word();

        let op = match fd.as_deref() {
            Some("2") if self.peek_char() == Some('&') && self.peek_n(1) == Some('1') => {
                self.pos += 2;
                RedirectOp::StderrToStdout
            }
            Some("2") => RedirectOp::Stderr {
                append: self.eat('>'),
            },
            _ => RedirectOp::Stdout {
                append: self.eat('>'),
            },
        };
        self.out.push(Token::Redirect(op));
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => {
                self.current_word
                    .push(WordPart::Quoted(std::mem::take(&mut self.buffer)));
                self.state = LexingState::ReadingWord;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => {
                self.current_word
                    .push(WordPart::Quoted(std::mem::take(&mut self.buffer)));
                self.state = LexingState::ReadingWord;
            }
            '\\' if matches!(self.peek_char(), Some('"' | '\\' | '$')) => {
                if let Some(next) = self.read_char() {
                    self.buffer.push(next);
                }
            }
            '$' => self.read_dollar(true)?,
            c => self.buffer.push(c),
        }
        Ok(())
    }

    /// `$` was just read: parameter, command substitution, or a plain dollar sign.
    fn read_dollar(&mut self, quoted: bool) -> Result<(), LexingError> {
        match self.peek_char() {
            Some('(') => {
                self.read_char();
                self.flush_buffer(quoted);
                let inner = self.collect_cmdsubst(1)?;
                self.current_word.push(WordPart::CmdSubst(inner));
            }
            Some('{') => {
                self.read_char();
                self.flush_buffer(quoted);
                let name = self.collect_paramsubst(1)?;
                self.current_word.push(WordPart::ParamSubst(name));
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.flush_buffer(quoted);
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    self.pos += 1;
                }
                self.current_word.push(WordPart::ParamSubst(name));
            }
            _ => self.buffer.push('$'),
        }
        Ok(())
    }

    /// Collects characters within a command substitution block `$(...)`.
    /// Handles nested parentheses by tracking the `depth`.
    fn collect_cmdsubst(&mut self, mut depth: usize) -> Result<String, LexingError> {
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            match ch {
                '(' => {
                    depth += 1;
                    s.push(ch);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(s);
                    }
                    s.push(ch);
                }
                _ => s.push(ch),
            }
        }
        Err(LexingError::UnfinishedCmdSubst)
    }

    /// Collects characters within a parameter substitution block `${...}`.
    fn collect_paramsubst(&mut self, mut depth: usize) -> Result<String, LexingError> {
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            match ch {
                '{' => {
                    depth += 1;
                    s.push(ch);
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(s);
                    }
                    s.push(ch);
                }
                _ => s.push(ch),
            }
        }
        Err(LexingError::UnfinishedParamSubst)
    }

    fn flush_buffer(&mut self, quoted: bool) {
        if self.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buffer);
        self.current_word.push(if quoted {
            WordPart::Quoted(text)
        } else {
            WordPart::Literal(text)
        });
    }

    fn flush_literal(&mut self) {
        self.flush_buffer(false);
    }

    fn finish_word(&mut self) {
        self.flush_literal();
        if !self.current_word.is_empty() {
            self.out
                .push(Token::Word(std::mem::take(&mut self.current_word)));
        }
        self.state = LexingState::Start;
    }
}

/// The main entry point function to perform lexical analysis.
///
/// # Returns
/// `Result<Vec<Token>, LexingError>`: A vector of tokens on success, or a `LexingError`
/// if an incomplete structure is encountered.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(line).make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Token {
        Token::Word(vec![WordPart::Literal(s.to_string())])
    }

    #[test]
    fn splits_words_on_whitespace() {
        let tokens = split_into_tokens("  ls   -l\t/tmp ").unwrap();
        assert_eq!(tokens, vec![lit("ls"), lit("-l"), lit("/tmp")]);
    }

    #[test]
    fn recognises_pipes_and_background() {
        let tokens = split_into_tokens("mecho hi|wc -c &").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("mecho"),
                lit("hi"),
                Token::PipeOp,
                lit("wc"),
                lit("-c"),
                Token::Background
            ]
        );
    }

    #[test]
    fn recognises_every_output_operator() {
        let tokens = split_into_tokens("a > b >> c 2> d 2>> e &> f &>> g 2>&1 1> h").unwrap();
        let ops: Vec<RedirectOp> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Redirect(op) => Some(*op),
                _ => None,
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                RedirectOp::Stdout { append: false },
                RedirectOp::Stdout { append: true },
                RedirectOp::Stderr { append: false },
                RedirectOp::Stderr { append: true },
                RedirectOp::Both { append: false },
                RedirectOp::Both { append: true },
                RedirectOp::StderrToStdout,
                RedirectOp::Stdout { append: false },
            ]
        );
    }

    #[test]
    fn operators_need_no_surrounding_space() {
        let tokens = split_into_tokens("ls>out.txt 2>&1").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("ls"),
                Token::Redirect(RedirectOp::Stdout { append: false }),
                lit("out.txt"),
                Token::Redirect(RedirectOp::StderrToStdout),
            ]
        );
    }

    #[test]
    fn digit_inside_word_is_not_a_descriptor() {
        let tokens = split_into_tokens("mecho a2>f").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("mecho"),
                lit("a2"),
                Token::Redirect(RedirectOp::Stdout { append: false }),
                lit("f"),
            ]
        );
    }

    #[test]
    fn quotes_protect_operators() {
        let tokens = split_into_tokens("mecho 'a | b' \"c > d\"").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("mecho"),
                Token::Word(vec![WordPart::Quoted("a | b".into())]),
                Token::Word(vec![WordPart::Quoted("c > d".into())]),
            ]
        );
    }

    #[test]
    fn empty_quotes_make_an_empty_word() {
        let tokens = split_into_tokens("mecho ''").unwrap();
        assert_eq!(tokens[1], Token::Word(vec![WordPart::Quoted(String::new())]));
    }

    #[test]
    fn parameters_inside_and_outside_quotes() {
        let tokens = split_into_tokens("mecho $HOME/x \"${USER}!\" $").unwrap();
        assert_eq!(
            tokens[1],
            Token::Word(vec![
                WordPart::ParamSubst("HOME".into()),
                WordPart::Literal("/x".into()),
            ])
        );
        assert_eq!(
            tokens[2],
            Token::Word(vec![
                WordPart::ParamSubst("USER".into()),
                WordPart::Quoted("!".into()),
            ])
        );
        assert_eq!(tokens[3], lit("$"));
    }

    #[test]
    fn command_substitution_keeps_inner_text() {
        let tokens = split_into_tokens("mexport FOO=$(mecho (a) bar)").unwrap();
        assert_eq!(
            tokens[1],
            Token::Word(vec![
                WordPart::Literal("FOO=".into()),
                WordPart::CmdSubst("mecho (a) bar".into()),
            ])
        );
    }

    #[test]
    fn comment_starts_only_at_word_start() {
        let tokens = split_into_tokens("mecho a#b # rest | ignored").unwrap();
        assert_eq!(tokens, vec![lit("mecho"), lit("a#b")]);
    }

    #[test]
    fn backslash_escapes_next_char() {
        let tokens = split_into_tokens(r"mecho a\|b").unwrap();
        assert_eq!(
            tokens[1],
            Token::Word(vec![
                WordPart::Literal("a".into()),
                WordPart::Quoted("|".into()),
                WordPart::Literal("b".into()),
            ])
        );
    }

    #[test]
    fn unfinished_constructs_are_errors() {
        assert_eq!(
            split_into_tokens("mecho 'abc"),
            Err(LexingError::UnfinishedQuote)
        );
        assert_eq!(
            split_into_tokens("mecho \"abc"),
            Err(LexingError::UnfinishedQuote)
        );
        assert_eq!(
            split_into_tokens("mecho $(abc"),
            Err(LexingError::UnfinishedCmdSubst)
        );
        assert_eq!(
            split_into_tokens("mecho ${abc"),
            Err(LexingError::UnfinishedParamSubst)
        );
    }
}
