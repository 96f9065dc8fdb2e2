mod lexemes;
mod token;

pub use lexemes::LexemeIterator;
pub use lexemes::LexemeSet;
pub use token::Token;
pub use token::TokenBuffer;
pub use token::TokenStream;
