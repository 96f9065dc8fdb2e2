pub mod ast;
pub mod expression;
pub mod grammar;
pub mod lr;
