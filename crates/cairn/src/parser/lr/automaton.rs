use std::collections::{BTreeMap, VecDeque};

use cairn_lex::LexemeSet;
use cairn_util::make_type_idx;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::BuildConfig;
use crate::parser::grammar::{Grammar, GrammarError, RuleId, Symbol};

use super::closure::Lookahead;
use super::items::{ItemSet, ItemSetBuilder};
use super::table::Conflict;

make_type_idx!(pub StateId, State);

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error("automaton has more than {limit} states")]
    TooManyStates { limit: usize },
    #[error("parse table has {} conflicting cells", .0.len())]
    Conflicts(Vec<Conflict>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub id: StateId,
    pub items: ItemSet,
    // keyed by grammar column (see Grammar::column)
    pub transitions: BTreeMap<usize, StateId>,
}

/// Every state reachable from the closure of the goal symbol, numbered in
/// breadth-first discovery order.
#[derive(Debug, Clone)]
pub struct Automaton {
    states: Vec<State>,
}

impl Automaton {
    pub fn build<T: LexemeSet>(
        grammar: &Grammar<T>,
        config: &BuildConfig,
    ) -> Result<Automaton, BuildError> {
        let n_rules = grammar.productions().len();
        if n_rules > config.max_rules {
            return Err(GrammarError::TooManyRules {
                count: n_rules,
                limit: config.max_rules,
            }
            .into());
        }

        for rule in Self::lookahead_gaps(grammar) {
            warn!(
                rule,
                production = %grammar.format_production(rule),
                "nonterminal is followed by a nullable one, lookaheads past it are not propagated"
            );
        }

        let builder = ItemSetBuilder::new(grammar);
        let initial = builder.closure_of(grammar.goal_symbol(), &Lookahead::end_of_input());

        let mut states: Vec<State> = Vec::new();
        let mut registry: BTreeMap<ItemSet, StateId> = BTreeMap::new();
        let mut worklist: VecDeque<StateId> = VecDeque::new();

        let root = StateId::from_push(
            &mut states,
            State {
                id: StateId::new(0),
                items: initial.clone(),
                transitions: BTreeMap::new(),
            },
        );
        registry.insert(initial, root);
        worklist.push_back(root);

        while let Some(current) = worklist.pop_front() {
            let edges = Self::advance_items(&builder, &states[current].items);

            for (column, items) in edges {
                let target = match registry.get(&items) {
                    Some(existing) => *existing,
                    None => {
                        if states.len() >= config.max_states {
                            return Err(BuildError::TooManyStates {
                                limit: config.max_states,
                            });
                        }
                        let id = StateId::new(states.len());
                        trace!(state = %id, from = %current, column, items = items.len(), "new state");
                        states.push(State {
                            id,
                            items: items.clone(),
                            transitions: BTreeMap::new(),
                        });
                        registry.insert(items, id);
                        worklist.push_back(id);
                        id
                    }
                };
                states[current].transitions.insert(column, target);
            }
        }

        debug!(states = states.len(), rules = n_rules, "built automaton");
        Ok(Automaton { states })
    }

    // rules where a nonterminal is followed by a nullable nonterminal; the
    // first one's items only get the heads of the second as lookahead
    fn lookahead_gaps<T: LexemeSet>(grammar: &Grammar<T>) -> Vec<RuleId> {
        let nullables = grammar.compute_nullable_nonterminals();
        grammar
            .productions()
            .iter()
            .enumerate()
            .filter(|(_, production)| {
                production.rhs.windows(2).any(|pair| {
                    matches!(pair, [Symbol::Nonterminal(_), Symbol::Nonterminal(next)] if nullables.contains(next))
                })
            })
            .map(|(rule, _)| rule)
            .collect()
    }

    // groups the items of one state by the symbol after their cursor, each
    // group advanced past that symbol and closed over the nonterminal that
    // follows it
    fn advance_items<T: LexemeSet>(
        builder: &ItemSetBuilder<'_, T>,
        items: &ItemSet,
    ) -> BTreeMap<usize, ItemSet> {
        let grammar = builder.grammar();
        let mut edges: BTreeMap<usize, ItemSet> = BTreeMap::new();

        for item in items {
            let Some(symbol) = item.next_symbol(grammar) else {
                continue;
            };
            let advanced = item.advance();
            let target = edges.entry(grammar.column(symbol)).or_default();

            let rhs = &grammar.production(item.rule).rhs;
            if let Some(Symbol::Nonterminal(nt)) = rhs.get(advanced.cursor) {
                let lookahead = match rhs.get(advanced.cursor + 1) {
                    Some(following) => builder.head_terminals(*following),
                    None => item.lookahead.clone(),
                };
                builder.generate_items(*nt, &lookahead, target);
            }
            target.insert(advanced);
        }

        edges
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id]
    }

    pub fn initial(&self) -> &State {
        &self.states[0]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
