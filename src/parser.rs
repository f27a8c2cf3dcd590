use crate::command::{Command, Pipeline};
use crate::env::Environment;
use crate::expand::{expand_text, expand_word};
use crate::lexer::Token;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while turning tokens into a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsingError {
    /// A pipeline stage with no words, as in `| wc` or `ls |`.
    #[error("empty command in pipeline")]
    EmptyCommand,
    /// `<` not followed by a file name.
    #[error("missing file name after '<'")]
    MissingInputFile,
    /// `&` anywhere but at the end of the line.
    #[error("'&' is only allowed at the end of a line")]
    MisplacedBackground,
    /// An output redirection the resolver did not consume.
    #[error("unexpected token {0:?}")]
    UnexpectedToken(Token),
}

/// Remove a trailing `&` and report whether it was there.
pub fn take_background(tokens: &mut Vec<Token>) -> Result<bool, ParsingError> {
    let background = matches!(tokens.last(), Some(Token::Background));
    if background {
        tokens.pop();
    }
    if tokens.contains(&Token::Background) {
        return Err(ParsingError::MisplacedBackground);
    }
    Ok(background)
}

struct PipelineBuilder<'a> {
    tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
    env: &'a Environment,
}

impl<'a> PipelineBuilder<'a> {
    fn new(tokens: Vec<Token>, env: &'a Environment) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
            env,
        }
    }

    /// pipeline: command ('|' command)*
    fn parse_pipeline(mut self) -> Result<Vec<Command>, ParsingError> {
        let mut stages = vec![self.parse_command()?];
        while self.tokens.next_if_eq(&Token::PipeOp).is_some() {
            stages.push(self.parse_command()?);
        }
        match self.tokens.next() {
            None => Ok(stages),
            Some(token) => Err(ParsingError::UnexpectedToken(token)),
        }
    }

    /// command: (word | '<' word)+
    fn parse_command(&mut self) -> Result<Command, ParsingError> {
        let mut argv = Vec::new();
        let mut input_file = None;

        loop {
            match self.tokens.peek() {
                Some(Token::Word(_)) => {
                    if let Some(Token::Word(parts)) = self.tokens.next() {
                        argv.extend(expand_word(&parts, self.env));
                    }
                }
                Some(Token::RedirectLeft) => {
                    self.tokens.next();
                    match self.tokens.next() {
                        Some(Token::Word(parts)) => {
                            input_file = Some(PathBuf::from(expand_text(&parts, self.env)));
                        }
                        _ => return Err(ParsingError::MissingInputFile),
                    }
                }
                Some(Token::Redirect(_)) | Some(Token::Background) => {
                    if let Some(token) = self.tokens.next() {
                        return Err(ParsingError::UnexpectedToken(token));
                    }
                }
                Some(Token::PipeOp) | None => break,
            }
        }

        if argv.is_empty() {
            return Err(ParsingError::EmptyCommand);
        }
        Ok(Command { argv, input_file })
    }
}

/// Build a pipeline from tokens that no longer contain output redirections or
/// a trailing `&`. Words are expanded against `env` on the way.
pub fn parse_pipeline(
    tokens: Vec<Token>,
    env: &Environment,
    background: bool,
) -> Result<Pipeline, ParsingError> {
    let stages = PipelineBuilder::new(tokens, env).parse_pipeline()?;
    Ok(Pipeline { stages, background })
}
