//! Quote-aware, immutable command text.

use crate::error::ShellError;
use std::fmt;
use std::ops::Range;

/// Quoting context of the scanner at a given character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Bare,
    Single,
    Double,
    Back,
    /// A backquote opened inside a double-quoted span.
    DoubleBack,
}

/// A character that sits outside every quoted span and is not itself a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BareChar {
    pub offset: usize,
    pub ch: char,
}

/// Walk `text` once, tracking quote nesting, and return the bare characters.
///
/// Inside `'...'` nothing is special. Inside `"..."` only a backquote opens a
/// nested span. Inside `` `...` `` everything up to the closing backquote
/// belongs to the substituted command.
pub(crate) fn scan_bare(text: &str) -> Result<Vec<BareChar>, ShellError> {
    let mut state = QuoteState::Bare;
    // (quote char, char position) of every currently open quote
    let mut openers: Vec<(char, usize)> = Vec::new();
    let mut bare = Vec::new();

    for (position, (offset, ch)) in text.char_indices().enumerate() {
        state = match (state, ch) {
            (QuoteState::Bare, '\'') => {
                openers.push((ch, position));
                QuoteState::Single
            }
            (QuoteState::Bare, '"') => {
                openers.push((ch, position));
                QuoteState::Double
            }
            (QuoteState::Bare, '`') => {
                openers.push((ch, position));
                QuoteState::Back
            }
            (QuoteState::Bare, _) => {
                bare.push(BareChar { offset, ch });
                QuoteState::Bare
            }
            (QuoteState::Single, '\'') | (QuoteState::Double, '"') | (QuoteState::Back, '`') => {
                openers.pop();
                QuoteState::Bare
            }
            (QuoteState::Double, '`') => {
                openers.push((ch, position));
                QuoteState::DoubleBack
            }
            (QuoteState::DoubleBack, '`') => {
                openers.pop();
                QuoteState::Double
            }
            (current, _) => current,
        };
    }

    match openers.pop() {
        Some((quote, position)) => Err(ShellError::UnterminatedQuote { quote, position }),
        None => Ok(bare),
    }
}

/// A command line, or a piece of one.
///
/// `CommandText` never changes in place: splitting, trimming and span removal
/// all return new values, so a text handed to one stage of processing is still
/// intact for the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CommandText(String);

impl CommandText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the text holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn trimmed(&self) -> CommandText {
        CommandText::new(self.0.trim())
    }

    /// Fails with the position of the first quote that is never closed.
    pub fn check_quotes(&self) -> Result<(), ShellError> {
        scan_bare(&self.0).map(|_| ())
    }

    /// Whether `ch` occurs outside of every quoted span.
    pub fn contains_unquoted(&self, ch: char) -> Result<bool, ShellError> {
        Ok(scan_bare(&self.0)?.iter().any(|c| c.ch == ch))
    }

    /// Split on every unquoted `sep`.
    ///
    /// Pieces keep their surrounding whitespace, so joining them with `sep`
    /// gives back the original text.
    pub fn split_unquoted(&self, sep: char) -> Result<Vec<CommandText>, ShellError> {
        let mut pieces = Vec::new();
        let mut start = 0;
        for c in scan_bare(&self.0)?.into_iter().filter(|c| c.ch == sep) {
            pieces.push(CommandText::new(&self.0[start..c.offset]));
            start = c.offset + sep.len_utf8();
        }
        pieces.push(CommandText::new(&self.0[start..]));
        Ok(pieces)
    }

    /// A copy of this text with the bytes in `span` cut out.
    pub fn remove_span(&self, span: Range<usize>) -> CommandText {
        let mut text = String::with_capacity(self.0.len() - span.len());
        text.push_str(&self.0[..span.start]);
        text.push_str(&self.0[span.end..]);
        CommandText(text)
    }
}

impl fmt::Display for CommandText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommandText {
    fn from(value: &str) -> Self {
        CommandText::new(value)
    }
}

impl From<String> for CommandText {
    fn from(value: String) -> Self {
        CommandText(value)
    }
}
