pub mod expression_scanner;
pub mod lexeme_sets;

pub use expression_scanner::{ExpressionScanner, ScanError};
