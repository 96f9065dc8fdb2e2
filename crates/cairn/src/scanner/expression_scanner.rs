use cairn_lex::Token;
use thiserror::Error;

use super::lexeme_sets::expressions::Expressions;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("unexpected character {character:?} at {offset}")]
    UnexpectedCharacter { character: char, offset: usize },
}

/// Hand scanner for arithmetic expressions.
pub struct ExpressionScanner;

impl ExpressionScanner {
    pub fn scan(input: &str) -> Result<Vec<Token<Expressions>>, ScanError> {
        let mut tokens = Vec::new();
        let mut cursor = 0;
        while let Some((token, next)) = Self::next_word(input, cursor)? {
            tokens.push(token);
            cursor = next;
        }
        Ok(tokens)
    }

    // maximal munch: identifiers and integers take every character that can
    // continue them. Returns the token and the cursor after it, or None at
    // end of input.
    pub fn next_word(
        input: &str,
        start_cursor: usize,
    ) -> Result<Option<(Token<Expressions>, usize)>, ScanError> {
        let rest = &input[start_cursor..];
        let Some(skipped) = rest.find(|c: char| !c.is_whitespace()) else {
            return Ok(None);
        };
        let start = start_cursor + skipped;
        let word = &input[start..];

        // first char exists since find() succeeded
        let first = word.chars().next().unwrap_or(' ');
        let (kind, len) = match first {
            '+' => (Expressions::Plus, 1),
            '-' => (Expressions::Minus, 1),
            '*' => (Expressions::Star, 1),
            '/' => (Expressions::Slash, 1),
            '(' => (Expressions::LeftParen, 1),
            ')' => (Expressions::RightParen, 1),
            '0'..='9' => (
                Expressions::IntegerConstant,
                Self::munch(word, |c| c.is_ascii_digit()),
            ),
            'a'..='z' | 'A'..='Z' | '_' => (
                Expressions::Identifier,
                Self::munch(word, |c| c.is_ascii_alphanumeric() || c == '_'),
            ),
            character => {
                return Err(ScanError::UnexpectedCharacter {
                    character,
                    offset: start,
                })
            }
        };

        let token = Token::new(kind, &word[..len], start);
        Ok(Some((token, start + len)))
    }

    // byte length of the longest prefix made only of `accept` chars
    fn munch(word: &str, accept: impl Fn(char) -> bool) -> usize {
        word.find(|c: char| !accept(c)).unwrap_or(word.len())
    }
}
