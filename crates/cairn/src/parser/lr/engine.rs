use std::fmt;

use cairn_lex::{LexemeSet, Token, TokenStream};
use thiserror::Error;
use tracing::{debug, trace};

use crate::parser::grammar::{RuleId, NT};

use super::actions::ActionError;
use super::automaton::StateId;
use super::table::{LRAction, ParseTable};

/// Callbacks run by the parser: one node per shifted token, one node per
/// reduction built from the rule's children in rhs order.
pub trait SemanticActions<T: LexemeSet> {
    type Node;

    fn shift(&mut self, token: Token<T>) -> Result<Self::Node, ActionError>;
    fn reduce(&mut self, rule: RuleId, children: Vec<Self::Node>) -> Result<Self::Node, ActionError>;
}

/// Owned description of a token, kept in errors after the token itself has
/// been handed to a semantic action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSummary {
    pub kind: &'static str,
    pub text: String,
    pub offset: usize,
}

impl<T: LexemeSet> From<&Token<T>> for TokenSummary {
    fn from(token: &Token<T>) -> Self {
        Self {
            kind: token.kind.to_name(),
            text: token.text.clone(),
            offset: token.offset,
        }
    }
}

impl fmt::Display for TokenSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' at {}", self.kind, self.text, self.offset)
    }
}

fn describe_last(after: &Option<TokenSummary>) -> String {
    match after {
        Some(token) => format!(" after {}", token),
        None => String::new(),
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected {token} in state {state}")]
    UnexpectedToken { state: StateId, token: TokenSummary },
    #[error("unexpected end of input in state {state}{}", describe_last(.after))]
    UnexpectedEndOfInput {
        state: StateId,
        after: Option<TokenSummary>,
    },
    #[error("parse table expects {table} terminals, lexeme set has {lexemes}")]
    WrongLexemeSet { table: usize, lexemes: usize },
    #[error("parse table has no goto from state {state} on nonterminal {nt}")]
    MissingGoto { state: StateId, nt: NT },
    #[error("reducing rule {rule} needs {needed} stack entries, found {found}")]
    StackUnderflow {
        rule: RuleId,
        needed: usize,
        found: usize,
    },
    #[error("parse table refers to missing rule {0}")]
    UnknownRule(RuleId),
    #[error("{reductions} reductions in a row without consuming input, last in state {state}")]
    NoProgress { state: StateId, reductions: usize },
    #[error(transparent)]
    Action(#[from] ActionError),
}

struct StackEntry<N> {
    state: StateId,
    node: N,
}

/// Shift-reduce driver over a compiled table. The table is only read, so one
/// table can back any number of parsers.
pub struct Parser<'t> {
    table: &'t ParseTable,
}

impl<'t> Parser<'t> {
    pub fn new(table: &'t ParseTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'t ParseTable {
        self.table
    }

    /// Runs until the goal symbol is reduced with every token consumed.
    ///
    /// The bottom of the stack is the initial state with no node; it is not
    /// stored, so an empty `stack` means only the bottom entry is left.
    ///
    /// Reductions between two shifts are bounded by `states * rules` per
    /// stack entry. Only a table built from a cyclic grammar exceeds that,
    /// and the parse fails with [`ParseError::NoProgress`].
    pub fn parse<T, A>(
        &self,
        tokens: &mut impl TokenStream<T>,
        actions: &mut A,
    ) -> Result<A::Node, ParseError>
    where
        T: LexemeSet,
        A: SemanticActions<T>,
    {
        let lexemes = T::size() as usize;
        if lexemes != self.table.n_terminals() {
            return Err(ParseError::WrongLexemeSet {
                table: self.table.n_terminals(),
                lexemes,
            });
        }

        let initial = StateId::new(0);
        let mut stack: Vec<StackEntry<A::Node>> = Vec::new();
        let mut lookahead = tokens.advance();
        let mut last_shifted: Option<TokenSummary> = None;

        let per_entry = self.table.n_states().max(1).saturating_mul(self.table.n_rules().max(1));
        let mut reductions = 0;
        let mut reduction_limit = per_entry;

        loop {
            let state = stack.last().map_or(initial, |x| x.state);
            let column = match &lookahead {
                Some(token) => token.kind.to_id() as usize,
                None => self.table.eof_column(),
            };

            match self.table.action(state, column) {
                LRAction::Shift(target) => {
                    let Some(token) = lookahead.take() else {
                        return Err(ParseError::UnexpectedEndOfInput {
                            state,
                            after: last_shifted,
                        });
                    };
                    trace!(state = %state, target = %target, token = %token, "shift");

                    last_shifted = Some(TokenSummary::from(&token));
                    let node = actions.shift(token)?;
                    stack.push(StackEntry {
                        state: target,
                        node,
                    });
                    lookahead = tokens.advance();
                    reductions = 0;
                    reduction_limit = per_entry.saturating_mul(stack.len() + 1);
                }
                LRAction::Reduce(rule) => {
                    if reductions == reduction_limit {
                        return Err(ParseError::NoProgress { state, reductions });
                    }
                    reductions += 1;

                    let shape = self.table.rule(rule).ok_or(ParseError::UnknownRule(rule))?;
                    let needed = shape.rhs.len();
                    if stack.len() < needed {
                        return Err(ParseError::StackUnderflow {
                            rule,
                            needed,
                            found: stack.len(),
                        });
                    }

                    let children: Vec<A::Node> = stack
                        .drain(stack.len() - needed..)
                        .map(|x| x.node)
                        .collect();
                    let node = actions.reduce(rule, children)?;

                    let exposed = stack.last().map_or(initial, |x| x.state);
                    trace!(state = %state, rule, exposed = %exposed, "reduce");

                    if shape.lhs == self.table.goal_symbol() && stack.is_empty() && lookahead.is_none() {
                        debug!(rule, "accept");
                        return Ok(node);
                    }

                    let target = self.table.goto(exposed, shape.lhs).ok_or(ParseError::MissingGoto {
                        state: exposed,
                        nt: shape.lhs,
                    })?;
                    stack.push(StackEntry {
                        state: target,
                        node,
                    });
                }
                LRAction::Invalid => {
                    return Err(match lookahead {
                        Some(token) => ParseError::UnexpectedToken {
                            state,
                            token: TokenSummary::from(&token),
                        },
                        None => ParseError::UnexpectedEndOfInput {
                            state,
                            after: last_shifted,
                        },
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cairn_lex::TokenBuffer;

    use super::*;
    use crate::config::{BuildConfig, ConflictPolicy};
    use crate::parser::grammar::Grammar;
    use crate::parser::lr::Automaton;
    use crate::scanner::lexeme_sets::expressions::Expressions;

    const ARITHMETIC: &str = "
        e ::= e Plus t | t

        t ::= t Star f | f

        f ::= Identifier | LeftParen e RightParen
    ";

    fn table(src: &str) -> ParseTable {
        let g: Grammar<Expressions> = Grammar::from_bnf_str(src).unwrap();
        let automaton = Automaton::build(&g, &BuildConfig::default()).unwrap();
        ParseTable::compile(&g, &automaton, ConflictPolicy::Reject).unwrap()
    }

    fn tokens(kinds: &[Expressions]) -> TokenBuffer<Expressions> {
        TokenBuffer::new(
            kinds
                .iter()
                .enumerate()
                .map(|(i, kind)| Token::new(*kind, kind.to_name(), i)),
        )
    }

    // records the rules reduced, in order, and renders a bracketed tree
    #[derive(Default)]
    struct Recorder {
        reductions: Vec<RuleId>,
    }

    impl SemanticActions<Expressions> for Recorder {
        type Node = String;

        fn shift(&mut self, token: Token<Expressions>) -> Result<String, ActionError> {
            Ok(token.kind.to_name().to_string())
        }

        fn reduce(&mut self, rule: RuleId, children: Vec<String>) -> Result<String, ActionError> {
            self.reductions.push(rule);
            if children.len() == 1 {
                Ok(children.into_iter().collect())
            } else {
                Ok(format!("[{}]", children.join(" ")))
            }
        }
    }

    #[test]
    fn reduces_with_precedence_and_left_associativity() {
        use Expressions::*;
        let table = table(ARITHMETIC);
        let mut recorder = Recorder::default();
        let result = Parser::new(&table)
            .parse(
                &mut tokens(&[Identifier, Plus, Identifier, Star, Identifier, Plus, Identifier]),
                &mut recorder,
            )
            .unwrap();

        assert_eq!(
            result,
            "[[Identifier Plus [Identifier Star Identifier]] Plus Identifier]"
        );
        assert_eq!(recorder.reductions.last(), Some(&0));
    }

    #[test]
    fn parentheses_nest() {
        use Expressions::*;
        let table = table(ARITHMETIC);
        let result = Parser::new(&table)
            .parse(
                &mut tokens(&[LeftParen, Identifier, Plus, Identifier, RightParen, Star, Identifier]),
                &mut Recorder::default(),
            )
            .unwrap();

        assert_eq!(
            result,
            "[[LeftParen [Identifier Plus Identifier] RightParen] Star Identifier]"
        );
    }

    #[test]
    fn unexpected_token_reports_state_and_token() {
        use Expressions::*;
        let table = table(ARITHMETIC);
        let err = Parser::new(&table)
            .parse(&mut tokens(&[Identifier, Identifier]), &mut Recorder::default())
            .unwrap_err();

        let ParseError::UnexpectedToken { token, .. } = &err else {
            panic!("expected an unexpected token error, got {err:?}");
        };
        assert_eq!(token.kind, "Identifier");
        assert_eq!(token.offset, 1);
    }

    #[test]
    fn truncated_input_reports_last_token() {
        use Expressions::*;
        let table = table(ARITHMETIC);
        let err = Parser::new(&table)
            .parse(&mut tokens(&[Identifier, Plus]), &mut Recorder::default())
            .unwrap_err();

        let ParseError::UnexpectedEndOfInput { after, .. } = &err else {
            panic!("expected end of input error, got {err:?}");
        };
        assert_eq!(after.as_ref().map(|x| x.kind), Some("Plus"));
        assert!(err.to_string().ends_with("after Plus 'Plus' at 1"));
    }

    #[test]
    fn empty_input_is_rejected_unless_goal_is_nullable() {
        let strict = table(ARITHMETIC);
        let err = Parser::new(&strict)
            .parse(&mut tokens(&[]), &mut Recorder::default())
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedEndOfInput {
                state: StateId::new(0),
                after: None,
            }
        );

        let nullable = table("s ::= | Identifier");
        let result = Parser::new(&nullable)
            .parse(&mut tokens(&[]), &mut Recorder::default())
            .unwrap();
        assert_eq!(result, "[]");
    }

    #[test]
    fn action_errors_stop_the_parse() {
        struct Failing;

        impl SemanticActions<Expressions> for Failing {
            type Node = ();

            fn shift(&mut self, _: Token<Expressions>) -> Result<(), ActionError> {
                Ok(())
            }

            fn reduce(&mut self, rule: RuleId, _: Vec<()>) -> Result<(), ActionError> {
                Err(ActionError::UnknownRule(rule))
            }
        }

        let table = table(ARITHMETIC);
        let err = Parser::new(&table)
            .parse(&mut tokens(&[Expressions::Identifier]), &mut Failing)
            .unwrap_err();
        assert_eq!(err, ParseError::Action(ActionError::UnknownRule(4)));
    }

    #[test]
    fn long_reduction_chains_are_not_cut_short() {
        use Expressions::*;
        // every reduction of a right recursive list waits for the end of input
        let table = table("l ::= Identifier l | Identifier");
        let input = vec![Identifier; 64];
        let mut recorder = Recorder::default();
        Parser::new(&table).parse(&mut tokens(&input), &mut recorder).unwrap();
        assert_eq!(recorder.reductions.len(), 64);
    }

    #[test]
    fn unit_cycle_in_table_fails_instead_of_looping() {
        use crate::parser::grammar::{Production, Symbol};
        use Expressions::*;

        // s ::= LeftParen b RightParen, a ::= a | Identifier, b ::= Plus a
        // Grammar::new rejects this, so it is assembled directly
        let g = Grammar {
            productions: vec![
                Production::new(
                    0,
                    vec![
                        Symbol::Terminal(LeftParen),
                        Symbol::Nonterminal(2),
                        Symbol::Terminal(RightParen),
                    ],
                ),
                Production::new(1, vec![Symbol::Nonterminal(1)]),
                Production::new(1, vec![Symbol::Terminal(Identifier)]),
                Production::new(2, vec![Symbol::Terminal(Plus), Symbol::Nonterminal(1)]),
            ],
            goal_symbol: 0,
            nonterminal_names: vec!["s".to_string(), "a".to_string(), "b".to_string()],
        };
        let automaton = Automaton::build(&g, &BuildConfig::default()).unwrap();
        let table = ParseTable::compile(&g, &automaton, ConflictPolicy::PreferShift).unwrap();
        assert!(!table.resolved_conflicts().is_empty());

        let err = Parser::new(&table)
            .parse(
                &mut tokens(&[LeftParen, Plus, Identifier, RightParen]),
                &mut Recorder::default(),
            )
            .unwrap_err();
        let ParseError::NoProgress { reductions, .. } = &err else {
            panic!("expected the reduction limit to stop the parse, got {err:?}");
        };
        // three entries on the stack when the last token was shifted
        assert_eq!(*reductions, 4 * table.n_states() * table.n_rules());
    }
}
