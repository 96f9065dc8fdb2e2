use std::collections::{HashMap, HashSet};
use std::num::ParseIntError;

use cairn_lex::{LexemeSet, Token};
use thiserror::Error;

use crate::parser::grammar::{Grammar, GrammarError, RuleId};

use super::engine::SemanticActions;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("action `{action}` expects {expected} children, got {found}")]
    Arity {
        action: String,
        expected: usize,
        found: usize,
    },
    #[error("action `{label}` got an unexpected node at position {position}")]
    UnexpectedChild { label: &'static str, position: usize },
    #[error("invalid integer constant `{text}`")]
    InvalidConstant {
        text: String,
        #[source]
        source: ParseIntError,
    },
    #[error("no action is bound to rule {0}")]
    UnknownRule(RuleId),
}

pub type ShiftAction<T, N> = fn(Token<T>) -> Result<N, ActionError>;
pub type ReduceAction<N> = fn(Vec<N>) -> Result<N, ActionError>;

struct BoundRule<N> {
    label: String,
    arity: usize,
    action: ReduceAction<N>,
}

/// Semantic actions looked up by the `=> label` of each rule.
pub struct ActionTable<T: LexemeSet, N> {
    shift: ShiftAction<T, N>,
    rules: Vec<BoundRule<N>>,
}

impl<T: LexemeSet, N> ActionTable<T, N> {
    /// Binds `bindings` to the labeled rules of `grammar`. Every rule must
    /// carry a label with a binding, and every binding must name a label
    /// used in the grammar. Several rules may share one label.
    pub fn bind(
        grammar: &Grammar<T>,
        shift: ShiftAction<T, N>,
        bindings: &[(&str, ReduceAction<N>)],
    ) -> Result<Self, GrammarError> {
        let mut by_label: HashMap<&str, ReduceAction<N>> = HashMap::new();
        for &(label, action) in bindings {
            if by_label.insert(label, action).is_some() {
                return Err(GrammarError::DuplicateAction(label.to_string()));
            }
        }

        let used: HashSet<&str> = grammar
            .productions()
            .iter()
            .filter_map(|x| x.label.as_deref())
            .collect();
        for &(label, _) in bindings {
            if !used.contains(label) {
                return Err(GrammarError::UnknownAction(label.to_string()));
            }
        }

        let mut rules = Vec::with_capacity(grammar.productions().len());
        for (rule, production) in grammar.productions().iter().enumerate() {
            let unbound = || GrammarError::UnboundAction {
                rule,
                lhs: grammar.nonterminal_name(production.lhs).to_string(),
            };
            let label = production.label.as_deref().ok_or_else(unbound)?;
            let action = by_label.get(label).ok_or_else(unbound)?;
            rules.push(BoundRule {
                label: label.to_string(),
                arity: production.len(),
                action: *action,
            });
        }

        Ok(Self { shift, rules })
    }

    pub fn label(&self, rule: RuleId) -> Option<&str> {
        self.rules.get(rule).map(|x| x.label.as_str())
    }
}

impl<'a, T: LexemeSet, N> SemanticActions<T> for &'a ActionTable<T, N> {
    type Node = N;

    fn shift(&mut self, token: Token<T>) -> Result<N, ActionError> {
        (self.shift)(token)
    }

    fn reduce(&mut self, rule: RuleId, children: Vec<N>) -> Result<N, ActionError> {
        let bound = self.rules.get(rule).ok_or(ActionError::UnknownRule(rule))?;
        if children.len() != bound.arity {
            return Err(ActionError::Arity {
                action: bound.label.clone(),
                expected: bound.arity,
                found: children.len(),
            });
        }
        (bound.action)(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::lexeme_sets::expressions::Expressions;

    const LIST: &str = "
        list ::= list Identifier => append | Identifier => start
    ";

    fn leaf(token: Token<Expressions>) -> Result<Vec<String>, ActionError> {
        Ok(vec![token.text])
    }

    fn start(mut children: Vec<Vec<String>>) -> Result<Vec<String>, ActionError> {
        Ok(children.remove(0))
    }

    fn append(mut children: Vec<Vec<String>>) -> Result<Vec<String>, ActionError> {
        let last = children.pop().unwrap_or_default();
        let mut list = children.pop().unwrap_or_default();
        list.extend(last);
        Ok(list)
    }

    fn grammar(src: &str) -> Grammar<Expressions> {
        Grammar::from_bnf_str(src).unwrap()
    }

    fn bind(
        g: &Grammar<Expressions>,
        bindings: &[(&str, ReduceAction<Vec<String>>)],
    ) -> Result<ActionTable<Expressions, Vec<String>>, GrammarError> {
        ActionTable::bind(g, leaf, bindings)
    }

    #[test]
    fn binds_every_rule_by_label() {
        let g = grammar(LIST);
        let table = bind(&g, &[("append", append), ("start", start)]).unwrap();
        assert_eq!(table.label(0), Some("append"));
        assert_eq!(table.label(1), Some("start"));

        let mut actions = &table;
        let a = actions.shift(Token::new(Expressions::Identifier, "a", 0)).unwrap();
        let b = actions.shift(Token::new(Expressions::Identifier, "b", 2)).unwrap();
        let list = actions.reduce(1, vec![a]).unwrap();
        assert_eq!(actions.reduce(0, vec![list, b]).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unlabeled_rule_is_unbound() {
        let g = grammar("list ::= list Identifier => append | Identifier");
        let result = bind(&g, &[("append", append)]);
        assert_eq!(
            result.err(),
            Some(GrammarError::UnboundAction {
                rule: 1,
                lhs: "list".to_string()
            })
        );
    }

    #[test]
    fn missing_binding_is_unbound() {
        let g = grammar(LIST);
        let result = bind(&g, &[("append", append)]);
        assert!(matches!(result, Err(GrammarError::UnboundAction { rule: 1, .. })));
    }

    #[test]
    fn unknown_and_duplicate_bindings_are_rejected() {
        let g = grammar(LIST);
        let unknown = bind(&g, &[("append", append), ("start", start), ("other", start)]);
        assert_eq!(unknown.err(), Some(GrammarError::UnknownAction("other".to_string())));

        let duplicate = bind(&g, &[("append", append), ("append", start)]);
        assert_eq!(duplicate.err(), Some(GrammarError::DuplicateAction("append".to_string())));
    }

    #[test]
    fn arity_is_checked() {
        let g = grammar(LIST);
        let table = bind(&g, &[("append", append), ("start", start)]).unwrap();
        let mut actions = &table;
        assert_eq!(
            actions.reduce(0, vec![vec![]]),
            Err(ActionError::Arity {
                action: "append".to_string(),
                expected: 2,
                found: 1
            })
        );
        assert_eq!(actions.reduce(7, vec![]), Err(ActionError::UnknownRule(7)));
    }
}
