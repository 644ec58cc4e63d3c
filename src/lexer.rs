//! Tokenizer and command-substitution resolver.
//!
//! [`split_into_words`] turns stage text into [`Word`]s made of classified
//! [`Token`]s. [`resolve_words`] then runs backquote substitution through a
//! [`CommandSubstitution`] implementation and produces the [`Field`]s that
//! become argv entries once globbing is done.

use crate::error::ShellError;
use std::ops::Range;

/// Classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Unquoted text without wildcards.
    Plain,
    /// Unquoted text containing `*`.
    Glob,
    /// Text between `'` quotes.
    SingleQuoted,
    /// Text between `"` quotes. A double-quoted span holding backquotes is
    /// split into several tokens around them, some possibly empty.
    DoubleQuoted,
    /// A command between backquotes. `in_double` is set when the span sits
    /// inside a double-quoted span, which keeps its output a single field.
    BackQuoted { in_double: bool },
    /// `<`
    RedirIn,
    /// `>`
    RedirOut,
}

/// One lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token, quotes included.
    pub raw: String,
    /// Text with the quoting removed. For backquoted tokens this is the
    /// command to run.
    pub text: String,
    /// Byte range of `raw` in the tokenized text.
    pub span: Range<usize>,
}

/// Tokens that touch each other without whitespace in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub tokens: Vec<Token>,
}

impl Word {
    /// Byte range covered by the whole word.
    pub fn span(&self) -> Range<usize> {
        match (self.tokens.first(), self.tokens.last()) {
            (Some(first), Some(last)) => first.span.start..last.span.end,
            _ => 0..0,
        }
    }

    pub fn is_redirection(&self) -> bool {
        matches!(
            self.tokens.as_slice(),
            [Token {
                kind: TokenKind::RedirIn | TokenKind::RedirOut,
                ..
            }]
        )
    }

    /// Concatenated text with quotes removed and no substitution performed.
    pub fn literal_text(&self) -> String {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
    ReadingBackQuote,
    ReadingDoubleBackQuote,
}

struct LexingFSM<'a> {
    source: &'a str,
    input: Vec<(usize, char)>,
    pos: usize,
    state: LexingState,
    words: Vec<Word>,
    current_word: Vec<Token>,
    buffer: String,
    /// Byte offset where the token being collected begins.
    token_start: usize,
    /// Open quotes as (quote char, char position).
    openers: Vec<(char, usize)>,
}

impl<'a> LexingFSM<'a> {
    fn new(source: &'a str) -> Self {
        LexingFSM {
            source,
            input: source.char_indices().collect(),
            pos: 0,
            state: LexingState::Start,
            words: Vec::new(),
            current_word: Vec::new(),
            buffer: String::new(),
            token_start: 0,
            openers: Vec::new(),
        }
    }

    fn make_words(mut self) -> Result<Vec<Word>, ShellError> {
        while let Some((offset, ch)) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(offset, ch),
                LexingState::ReadingWord => self.handle_word(offset, ch),
                LexingState::ReadingSingleQuote => self.handle_single_quote(offset, ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(offset, ch),
                LexingState::ReadingBackQuote => self.handle_back_quote(offset, ch),
                LexingState::ReadingDoubleBackQuote => self.handle_double_back_quote(offset, ch),
            }
        }

        if let Some((quote, position)) = self.openers.pop() {
            return Err(ShellError::UnterminatedQuote { quote, position });
        }

        self.flush_plain(self.source.len());
        self.finish_word();
        Ok(self.words)
    }

    fn read_char(&mut self) -> Option<(usize, char)> {
        let item = self.input.get(self.pos).copied();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn handle_start(&mut self, offset: usize, ch: char) {
        if !ch.is_whitespace() {
            self.state = LexingState::ReadingWord;
            self.handle_word(offset, ch);
        }
    }

    fn handle_word(&mut self, offset: usize, ch: char) {
        match ch {
            c if c.is_whitespace() => {
                self.flush_plain(offset);
                self.finish_word();
                self.state = LexingState::Start;
            }
            '<' | '>' => {
                self.flush_plain(offset);
                self.finish_word();
                let kind = if ch == '<' {
                    TokenKind::RedirIn
                } else {
                    TokenKind::RedirOut
                };
                self.push_token(kind, offset..offset + 1, ch.to_string());
                self.finish_word();
                self.state = LexingState::Start;
            }
            '\'' | '"' | '`' => {
                self.flush_plain(offset);
                self.openers.push((ch, self.pos - 1));
                self.token_start = offset;
                self.state = match ch {
                    '\'' => LexingState::ReadingSingleQuote,
                    '"' => LexingState::ReadingDoubleQuote,
                    _ => LexingState::ReadingBackQuote,
                };
            }
            c => {
                if self.buffer.is_empty() {
                    self.token_start = offset;
                }
                self.buffer.push(c);
            }
        }
    }

    fn handle_single_quote(&mut self, offset: usize, ch: char) {
        match ch {
            '\'' => {
                self.openers.pop();
                let text = std::mem::take(&mut self.buffer);
                self.push_token(TokenKind::SingleQuoted, self.token_start..offset + 1, text);
                self.state = LexingState::ReadingWord;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, offset: usize, ch: char) {
        match ch {
            '"' => {
                self.openers.pop();
                let text = std::mem::take(&mut self.buffer);
                self.push_token(TokenKind::DoubleQuoted, self.token_start..offset + 1, text);
                self.state = LexingState::ReadingWord;
            }
            '`' => {
                let text = std::mem::take(&mut self.buffer);
                self.push_token(TokenKind::DoubleQuoted, self.token_start..offset, text);
                self.openers.push((ch, self.pos - 1));
                self.token_start = offset;
                self.state = LexingState::ReadingDoubleBackQuote;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_back_quote(&mut self, offset: usize, ch: char) {
        match ch {
            '`' => {
                self.openers.pop();
                let text = std::mem::take(&mut self.buffer);
                self.push_token(
                    TokenKind::BackQuoted { in_double: false },
                    self.token_start..offset + 1,
                    text,
                );
                self.state = LexingState::ReadingWord;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_double_back_quote(&mut self, offset: usize, ch: char) {
        match ch {
            '`' => {
                self.openers.pop();
                let text = std::mem::take(&mut self.buffer);
                self.push_token(
                    TokenKind::BackQuoted { in_double: true },
                    self.token_start..offset + 1,
                    text,
                );
                self.token_start = offset + 1;
                self.state = LexingState::ReadingDoubleQuote;
            }
            c => self.buffer.push(c),
        }
    }

    /// Emit the unquoted text collected so far, ending at byte `end`.
    fn flush_plain(&mut self, end: usize) {
        if self.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buffer);
        let kind = if text.contains('*') {
            TokenKind::Glob
        } else {
            TokenKind::Plain
        };
        self.push_token(kind, self.token_start..end, text);
    }

    fn push_token(&mut self, kind: TokenKind, span: Range<usize>, text: String) {
        self.current_word.push(Token {
            kind,
            raw: self.source[span.clone()].to_string(),
            text,
            span,
        });
    }

    fn finish_word(&mut self) {
        if !self.current_word.is_empty() {
            self.words.push(Word {
                tokens: std::mem::take(&mut self.current_word),
            });
        }
    }
}

/// Split `text` into words on whitespace outside quotes.
///
/// `<` and `>` outside quotes always form a word of their own.
pub fn split_into_words(text: &str) -> Result<Vec<Word>, ShellError> {
    LexingFSM::new(text).make_words()
}

/// Runs the command inside a backquoted span and returns its captured output.
pub trait CommandSubstitution {
    fn substitute(&self, command: &str) -> Result<String, ShellError>;
}

/// Fold captured output into a single line: trailing newlines are dropped and
/// every remaining newline becomes one space.
pub fn fold_output(output: &str) -> String {
    output
        .trim_end_matches(['\n', '\r'])
        .replace("\r\n", " ")
        .replace('\n', " ")
}

/// A chunk of an argument and whether it came from a quoted span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub text: String,
    pub quoted: bool,
}

/// One argument after quote removal and substitution, before globbing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    pub pieces: Vec<Piece>,
}

impl Field {
    fn push(&mut self, text: impl Into<String>, quoted: bool) {
        self.pieces.push(Piece {
            text: text.into(),
            quoted,
        });
    }

    pub fn text(&self) -> String {
        self.pieces.iter().map(|p| p.text.as_str()).collect()
    }

    /// True when an unquoted piece contains a wildcard.
    pub fn is_glob(&self) -> bool {
        self.pieces.iter().any(|p| !p.quoted && p.text.contains('*'))
    }
}

fn finish_field(current: &mut Option<Field>, fields: &mut Vec<Field>) {
    if let Some(field) = current.take() {
        fields.push(field);
    }
}

/// Resolve quoting and backquote substitution.
///
/// Output of an unquoted substitution is split on whitespace again, so
/// `` echo `echo a b` `` yields two fields; inside double quotes it stays one.
pub fn resolve_words(
    words: &[Word],
    substitution: &dyn CommandSubstitution,
) -> Result<Vec<Field>, ShellError> {
    let mut fields = Vec::new();

    for word in words {
        let mut current: Option<Field> = None;
        for token in &word.tokens {
            match token.kind {
                TokenKind::Plain | TokenKind::Glob | TokenKind::RedirIn | TokenKind::RedirOut => {
                    current.get_or_insert_with(Field::default).push(&token.text, false)
                }
                TokenKind::SingleQuoted | TokenKind::DoubleQuoted => {
                    current.get_or_insert_with(Field::default).push(&token.text, true)
                }
                TokenKind::BackQuoted { in_double: true } => {
                    let output = fold_output(&substitution.substitute(&token.text)?);
                    current.get_or_insert_with(Field::default).push(output, true);
                }
                TokenKind::BackQuoted { in_double: false } => {
                    let output = fold_output(&substitution.substitute(&token.text)?);
                    if output.starts_with(char::is_whitespace) {
                        finish_field(&mut current, &mut fields);
                    }
                    for (i, part) in output.split_whitespace().enumerate() {
                        if i > 0 {
                            finish_field(&mut current, &mut fields);
                        }
                        current.get_or_insert_with(Field::default).push(part, false);
                    }
                    if output.ends_with(char::is_whitespace) {
                        finish_field(&mut current, &mut fields);
                    }
                }
            }
        }
        finish_field(&mut current, &mut fields);
    }

    log::trace!("resolved {} word(s) into {} field(s)", words.len(), fields.len());
    Ok(fields)
}
