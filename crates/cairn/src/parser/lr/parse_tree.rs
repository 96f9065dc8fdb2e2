use cairn_lex::{LexemeSet, Token};

use crate::parser::grammar::{RuleId, NT};

use super::actions::ActionError;
use super::engine::SemanticActions;
use super::table::ParseTable;

/// Concrete syntax tree: one leaf per shifted token, one node per reduction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseTree<T: LexemeSet> {
    Leaf(Token<T>),
    Node {
        rule: RuleId,
        lhs: NT,
        children: Vec<ParseTree<T>>,
    },
}

impl<T: LexemeSet> ParseTree<T> {
    /// Tokens at the leaves, left to right.
    pub fn leaves(&self) -> Vec<&Token<T>> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Token<T>>) {
        match self {
            ParseTree::Leaf(token) => leaves.push(token),
            ParseTree::Node { children, .. } => {
                for child in children {
                    child.collect_leaves(leaves);
                }
            }
        }
    }

    /// Rules in the order the parser reduced them.
    pub fn reductions(&self) -> Vec<RuleId> {
        match self {
            ParseTree::Leaf(_) => Vec::new(),
            ParseTree::Node { rule, children, .. } => {
                let mut rules: Vec<RuleId> = children.iter().flat_map(|x| x.reductions()).collect();
                rules.push(*rule);
                rules
            }
        }
    }
}

/// Builds a [`ParseTree`] for any grammar, taking rule shapes from the table.
pub struct ParseTreeBuilder<'t> {
    table: &'t ParseTable,
}

impl<'t> ParseTreeBuilder<'t> {
    pub fn new(table: &'t ParseTable) -> Self {
        Self { table }
    }
}

impl<T: LexemeSet> SemanticActions<T> for ParseTreeBuilder<'_> {
    type Node = ParseTree<T>;

    fn shift(&mut self, token: Token<T>) -> Result<ParseTree<T>, ActionError> {
        Ok(ParseTree::Leaf(token))
    }

    fn reduce(&mut self, rule: RuleId, children: Vec<ParseTree<T>>) -> Result<ParseTree<T>, ActionError> {
        let shape = self.table.rule(rule).ok_or(ActionError::UnknownRule(rule))?;
        Ok(ParseTree::Node {
            rule,
            lhs: shape.lhs,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use cairn_lex::TokenBuffer;

    use super::*;
    use crate::config::{BuildConfig, ConflictPolicy};
    use crate::parser::grammar::Grammar;
    use crate::parser::lr::{Automaton, Parser};
    use crate::scanner::lexeme_sets::expressions::Expressions;

    #[test]
    fn tree_records_rules_and_tokens() {
        let g: Grammar<Expressions> = Grammar::from_bnf_str(
            "
            sum ::= sum Plus IntegerConstant | IntegerConstant
            ",
        )
        .unwrap();
        let automaton = Automaton::build(&g, &BuildConfig::default()).unwrap();
        let table = ParseTable::compile(&g, &automaton, ConflictPolicy::Reject).unwrap();

        let tokens = vec![
            Token::new(Expressions::IntegerConstant, "1", 0),
            Token::new(Expressions::Plus, "+", 2),
            Token::new(Expressions::IntegerConstant, "2", 4),
        ];
        let tree = Parser::new(&table)
            .parse(&mut TokenBuffer::new(tokens.clone()), &mut ParseTreeBuilder::new(&table))
            .unwrap();

        assert_eq!(tree.leaves(), tokens.iter().collect::<Vec<_>>());
        assert_eq!(tree.reductions(), vec![1, 0]);

        let ParseTree::Node { rule, lhs, children } = &tree else {
            panic!("root should be a node");
        };
        assert_eq!((*rule, *lhs, children.len()), (0, 0, 3));
        assert_eq!(
            children[0],
            ParseTree::Node {
                rule: 1,
                lhs: 0,
                children: vec![ParseTree::Leaf(tokens[0].clone())],
            }
        );
    }
}
