//! Arithmetic expression front end: `grammars/expression.def` with the
//! semantic actions that turn its rules into [`ASTNode`]s.

use cairn_lex::{Token, TokenBuffer};
use thiserror::Error;
use tracing::debug;

use crate::config::BuildConfig;
use crate::scanner::lexeme_sets::expressions::Expressions;
use crate::scanner::{ExpressionScanner, ScanError};

use super::ast::{ASTNode, AdditiveOperator, MultiplicativeOperator};
use super::grammar::{Grammar, GrammarError};
use super::lr::{
    ActionError, ActionTable, Automaton, BuildError, ParseError, ParseTable, Parser, ReduceAction,
    TableError,
};

const EXPRESSION_GRAMMAR: &str = include_str!("grammars/expression.def");

#[derive(Error, Debug)]
pub enum FrontEndError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

fn take<const N: usize>(children: Vec<ASTNode>, label: &str) -> Result<[ASTNode; N], ActionError> {
    let found = children.len();
    children.try_into().map_err(|_| ActionError::Arity {
        action: label.to_string(),
        expected: N,
        found,
    })
}

fn terminal(node: ASTNode, label: &'static str, position: usize) -> Result<Token<Expressions>, ActionError> {
    match node {
        ASTNode::Terminal(token) => Ok(token),
        _ => Err(ActionError::UnexpectedChild { label, position }),
    }
}

fn shift(token: Token<Expressions>) -> Result<ASTNode, ActionError> {
    Ok(ASTNode::Terminal(token))
}

fn expression(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    let [inner] = take::<1>(children, "expression")?;
    Ok(inner)
}

fn add(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    additive(children, AdditiveOperator::Add, "add")
}

fn subtract(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    additive(children, AdditiveOperator::Subtract, "subtract")
}

// left recursion keeps extending the list node built for the left operand
fn additive(
    children: Vec<ASTNode>,
    operator: AdditiveOperator,
    label: &'static str,
) -> Result<ASTNode, ActionError> {
    let [lhs, op, rhs] = take::<3>(children, label)?;
    terminal(op, label, 1)?;

    Ok(match lhs {
        ASTNode::AdditiveExpression {
            mut operands,
            mut operators,
        } => {
            operands.push(rhs);
            operators.push(operator);
            ASTNode::AdditiveExpression { operands, operators }
        }
        other => ASTNode::AdditiveExpression {
            operands: vec![other, rhs],
            operators: vec![operator],
        },
    })
}

// a lone multiplicative operand on the left of + or - stands for itself
fn additive_operand(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    let [operand] = take::<1>(children, "additive_operand")?;
    Ok(match operand {
        ASTNode::MultiplicativeExpression {
            mut operands,
            operators,
        } if operators.is_empty() && operands.len() == 1 => operands.remove(0),
        other => other,
    })
}

fn multiply(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    multiplicative(children, MultiplicativeOperator::Multiply, "multiply")
}

fn divide(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    multiplicative(children, MultiplicativeOperator::Divide, "divide")
}

fn multiplicative(
    children: Vec<ASTNode>,
    operator: MultiplicativeOperator,
    label: &'static str,
) -> Result<ASTNode, ActionError> {
    let [lhs, op, rhs] = take::<3>(children, label)?;
    terminal(op, label, 1)?;

    match lhs {
        ASTNode::MultiplicativeExpression {
            mut operands,
            mut operators,
        } => {
            operands.push(rhs);
            operators.push(operator);
            Ok(ASTNode::MultiplicativeExpression { operands, operators })
        }
        _ => Err(ActionError::UnexpectedChild { label, position: 0 }),
    }
}

fn multiplicative_operand(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    let [operand] = take::<1>(children, "multiplicative_operand")?;
    Ok(ASTNode::MultiplicativeExpression {
        operands: vec![operand],
        operators: Vec::new(),
    })
}

fn identifier(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    let [name] = take::<1>(children, "identifier")?;
    Ok(ASTNode::Identifier(terminal(name, "identifier", 0)?.text))
}

fn integer_constant(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    let [constant] = take::<1>(children, "integer_constant")?;
    let text = terminal(constant, "integer_constant", 0)?.text;
    match text.parse::<i64>() {
        Ok(value) => Ok(ASTNode::IntegerConstant(value)),
        Err(source) => Err(ActionError::InvalidConstant { text, source }),
    }
}

// grouping leaves no node of its own
fn parenthesized(children: Vec<ASTNode>) -> Result<ASTNode, ActionError> {
    let [_, inner, _] = take::<3>(children, "parenthesized")?;
    Ok(inner)
}

const BINDINGS: [(&str, ReduceAction<ASTNode>); 10] = [
    ("expression", expression),
    ("add", add),
    ("subtract", subtract),
    ("additive_operand", additive_operand),
    ("multiply", multiply),
    ("divide", divide),
    ("multiplicative_operand", multiplicative_operand),
    ("identifier", identifier),
    ("integer_constant", integer_constant),
    ("parenthesized", parenthesized),
];

pub struct ExpressionParser {
    grammar: Grammar<Expressions>,
    table: ParseTable,
    actions: ActionTable<Expressions, ASTNode>,
}

impl ExpressionParser {
    pub fn grammar_definition() -> Result<Grammar<Expressions>, GrammarError> {
        Grammar::from_bnf_str(EXPRESSION_GRAMMAR)
    }

    fn bind_actions(grammar: &Grammar<Expressions>) -> Result<ActionTable<Expressions, ASTNode>, GrammarError> {
        ActionTable::bind(grammar, shift, &BINDINGS)
    }

    /// Builds the automaton and parse table from scratch.
    pub fn build(config: &BuildConfig) -> Result<ExpressionParser, BuildError> {
        let grammar = Self::grammar_definition()?;
        let actions = Self::bind_actions(&grammar)?;
        let automaton = Automaton::build(&grammar, config)?;
        let table = ParseTable::compile(&grammar, &automaton, config.conflict_policy)?;
        debug!(states = table.n_states(), "built expression parser");

        Ok(ExpressionParser {
            grammar,
            table,
            actions,
        })
    }

    /// Loads a table written by [`ParseTable::compile_table`], skipping
    /// automaton construction. The table must match the bundled grammar.
    pub fn from_precompiled_table(bytes: &[u8]) -> Result<ExpressionParser, FrontEndError> {
        let grammar = Self::grammar_definition()?;
        let actions = Self::bind_actions(&grammar)?;
        let table = ParseTable::from_precompiled_table(bytes)?;
        table.check_grammar(&grammar)?;
        debug!(states = table.n_states(), "loaded expression parse table");

        Ok(ExpressionParser {
            grammar,
            table,
            actions,
        })
    }

    pub fn parse_tokens(
        &self,
        tokens: impl IntoIterator<Item = Token<Expressions>>,
    ) -> Result<ASTNode, ParseError> {
        let mut stream = TokenBuffer::new(tokens);
        let mut actions = &self.actions;
        Parser::new(&self.table).parse(&mut stream, &mut actions)
    }

    pub fn parse_str(&self, input: &str) -> Result<ASTNode, FrontEndError> {
        let tokens = ExpressionScanner::scan(input)?;
        Ok(self.parse_tokens(tokens)?)
    }

    pub fn table(&self) -> &ParseTable {
        &self.table
    }

    pub fn grammar(&self) -> &Grammar<Expressions> {
        &self.grammar
    }
}
