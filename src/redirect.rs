//! Extraction of `<` and `>` redirections from stage text.

use crate::env::Environment;
use crate::error::{ShellError, describe_io};
use crate::lexer::{self, TokenKind, Word};
use crate::text::CommandText;
use std::fs::File;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `< FILE`
    Input,
    /// `> FILE`
    Output,
}

impl RedirectKind {
    pub(crate) fn noun(self) -> &'static str {
        match self {
            RedirectKind::Input => "input",
            RedirectKind::Output => "output",
        }
    }

    fn token_kind(self) -> TokenKind {
        match self {
            RedirectKind::Input => TokenKind::RedirIn,
            RedirectKind::Output => TokenKind::RedirOut,
        }
    }
}

/// Where a redirection sits in the text and which file it names.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Located {
    target: String,
    /// From the operator up to the end of the file name.
    span: Range<usize>,
}

fn is_operator(word: &Word, kind: RedirectKind) -> bool {
    word.is_redirection() && word.tokens[0].kind == kind.token_kind()
}

/// Find the single redirection of `kind` in `text`, if any.
fn locate(text: &CommandText, kind: RedirectKind) -> Result<Option<Located>, ShellError> {
    let words = lexer::split_into_words(text.as_str())?;
    let mut found = None;

    for (idx, word) in words.iter().enumerate() {
        if !is_operator(word, kind) {
            continue;
        }
        if found.is_some() {
            return Err(ShellError::DuplicateRedirect(kind));
        }
        let target = match words.get(idx + 1) {
            Some(next) if !next.is_redirection() => next,
            _ => return Err(ShellError::MissingRedirectTarget(kind)),
        };
        if target
            .tokens
            .iter()
            .any(|token| matches!(token.kind, TokenKind::BackQuoted { .. }))
        {
            return Err(ShellError::SubstitutedRedirectTarget(kind));
        }
        let name = target.literal_text();
        if name.is_empty() {
            return Err(ShellError::MissingRedirectTarget(kind));
        }
        found = Some(Located {
            target: name,
            span: word.span().start..target.span().end,
        });
    }
    Ok(found)
}

fn open_input(env: &Environment, target: &str) -> Result<File, ShellError> {
    let path = env.resolve(target);
    if path.is_dir() {
        return Err(ShellError::RedirectOpen {
            file: target.to_string(),
            reason: "Is a directory".to_string(),
        });
    }
    File::open(&path).map_err(|err| ShellError::RedirectOpen {
        file: target.to_string(),
        reason: describe_io(&err),
    })
}

fn open_output(env: &Environment, target: &str) -> Result<File, ShellError> {
    File::create(env.resolve(target)).map_err(|err| ShellError::RedirectOpen {
        file: target.to_string(),
        reason: describe_io(&err),
    })
}

/// Finds, validates and opens the redirections of one stage.
///
/// [`IoRedirection::input_stream`] and [`IoRedirection::output_stream`] are
/// independent: each scans the text it is given and removes only its own
/// operator, so calling one never hides the operator the other is looking for.
#[derive(Debug, Clone)]
pub struct IoRedirection {
    env: Environment,
}

impl IoRedirection {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Open the `<` target of `text`, returning the text without `< FILE`.
    pub fn input_stream(
        &self,
        text: &CommandText,
    ) -> Result<(CommandText, Option<File>), ShellError> {
        match locate(text, RedirectKind::Input)? {
            Some(found) => {
                let file = open_input(&self.env, &found.target)?;
                Ok((text.remove_span(found.span), Some(file)))
            }
            None => Ok((text.clone(), None)),
        }
    }

    /// Create or truncate the `>` target of `text`, returning the text without `> FILE`.
    pub fn output_stream(
        &self,
        text: &CommandText,
    ) -> Result<(CommandText, Option<File>), ShellError> {
        match locate(text, RedirectKind::Output)? {
            Some(found) => {
                let file = open_output(&self.env, &found.target)?;
                Ok((text.remove_span(found.span), Some(file)))
            }
            None => Ok((text.clone(), None)),
        }
    }

    /// Validate both redirections without opening anything.
    ///
    /// Syntax problems in either operator are reported before any file is
    /// touched; the input side is checked first.
    pub fn plan(&self, text: &CommandText) -> Result<RedirectPlan, ShellError> {
        let input = locate(text, RedirectKind::Input)?;
        let output = locate(text, RedirectKind::Output)?;

        let mut spans: Vec<Range<usize>> = input
            .iter()
            .chain(output.iter())
            .map(|found| found.span.clone())
            .collect();
        spans.sort_by_key(|span| std::cmp::Reverse(span.start));
        let stripped = spans
            .into_iter()
            .fold(text.clone(), |acc, span| acc.remove_span(span));

        Ok(RedirectPlan {
            input: input.map(|found| found.target),
            output: output.map(|found| found.target),
            text: stripped,
        })
    }
}

/// Redirections of a stage, validated but not yet opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectPlan {
    pub input: Option<String>,
    pub output: Option<String>,
    /// The stage text with both redirections removed.
    pub text: CommandText,
}

/// Opened redirection streams of a stage.
#[derive(Debug, Default)]
pub struct Redirects {
    pub stdin: Option<File>,
    pub stdout: Option<File>,
}

impl RedirectPlan {
    /// Open the planned files, input first.
    pub fn open(&self, env: &Environment) -> Result<Redirects, ShellError> {
        let stdin = self
            .input
            .as_deref()
            .map(|target| open_input(env, target))
            .transpose()?;
        let stdout = self
            .output
            .as_deref()
            .map(|target| open_output(env, target))
            .transpose()?;
        if self.input.is_some() || self.output.is_some() {
            log::debug!("redirect: < {:?} > {:?}", self.input, self.output);
        }
        Ok(Redirects { stdin, stdout })
    }
}
