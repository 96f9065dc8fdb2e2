use std::fmt;

use cairn_lex::Token;

use crate::scanner::lexeme_sets::expressions::Expressions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditiveOperator {
    Add,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplicativeOperator {
    Multiply,
    Divide,
}

// operands.len() == operators.len() + 1 for both list nodes; operators[i]
// sits between operands[i] and operands[i + 1]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ASTNode {
    // shifted token that no rule has consumed yet
    Terminal(Token<Expressions>),

    Identifier(String),
    IntegerConstant(i64),
    AdditiveExpression {
        operands: Vec<ASTNode>,
        operators: Vec<AdditiveOperator>,
    },
    MultiplicativeExpression {
        operands: Vec<ASTNode>,
        operators: Vec<MultiplicativeOperator>,
    },
}

impl fmt::Display for AdditiveOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdditiveOperator::Add => write!(f, "+"),
            AdditiveOperator::Subtract => write!(f, "-"),
        }
    }
}

impl fmt::Display for MultiplicativeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiplicativeOperator::Multiply => write!(f, "*"),
            MultiplicativeOperator::Divide => write!(f, "/"),
        }
    }
}

/// Fully bracketed rendering, e.g. `(1 + (2 * 3))`. List nodes with a single
/// operand print as the operand alone.
impl fmt::Display for ASTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<O: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            operands: &[ASTNode],
            operators: &[O],
        ) -> fmt::Result {
            if operands.len() == 1 {
                return write!(f, "{}", operands[0]);
            }
            write!(f, "(")?;
            for (i, operand) in operands.iter().enumerate() {
                if i > 0 {
                    match operators.get(i - 1) {
                        Some(op) => write!(f, " {} ", op)?,
                        None => write!(f, " ? ")?,
                    }
                }
                write!(f, "{}", operand)?;
            }
            write!(f, ")")
        }

        match self {
            ASTNode::Terminal(token) => write!(f, "{}", token.text),
            ASTNode::Identifier(name) => write!(f, "{}", name),
            ASTNode::IntegerConstant(value) => write!(f, "{}", value),
            ASTNode::AdditiveExpression { operands, operators } => list(f, operands, operators),
            ASTNode::MultiplicativeExpression { operands, operators } => list(f, operands, operators),
        }
    }
}
