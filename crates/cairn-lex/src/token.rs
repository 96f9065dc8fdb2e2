use std::collections::VecDeque;
use std::fmt;

use crate::LexemeSet;

/// One scanned word: its lexeme kind, the matched text and the byte offset
/// where it starts in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<T: LexemeSet> {
    pub kind: T,
    pub text: String,
    pub offset: usize,
}

impl<T: LexemeSet> Token<T> {
    pub fn new(kind: T, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }
}

impl<T: LexemeSet> fmt::Display for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' at {}", self.kind.to_name(), self.text, self.offset)
    }
}

// `None` from advance() is the end-of-input marker; a stream keeps
// returning it once exhausted
pub trait TokenStream<T: LexemeSet> {
    fn advance(&mut self) -> Option<Token<T>>;
}

/// Token stream over an already scanned sequence.
#[derive(Debug, Clone)]
pub struct TokenBuffer<T: LexemeSet> {
    tokens: VecDeque<Token<T>>,
}

impl<T: LexemeSet> TokenBuffer<T> {
    pub fn new(tokens: impl IntoIterator<Item = Token<T>>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len()
    }
}

impl<T: LexemeSet> TokenStream<T> for TokenBuffer<T> {
    fn advance(&mut self) -> Option<Token<T>> {
        self.tokens.pop_front()
    }
}
