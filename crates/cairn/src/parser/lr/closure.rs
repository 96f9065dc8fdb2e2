use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use bit_set::BitSet;
use cairn_lex::LexemeSet;

use crate::parser::grammar::{Grammar, Symbol};

/// Set of terminal ids that may follow a reduction. The empty set stands for
/// end of input.
#[derive(Clone, Debug, Default)]
pub struct Lookahead {
    terminals: BitSet,
}

impl Lookahead {
    pub fn end_of_input() -> Lookahead {
        Lookahead::default()
    }

    pub fn single(terminal: u32) -> Lookahead {
        let mut lookahead = Lookahead::default();
        lookahead.insert(terminal);
        lookahead
    }

    pub fn is_end_of_input(&self) -> bool {
        self.terminals.is_empty()
    }

    pub fn insert(&mut self, terminal: u32) -> bool {
        self.terminals.insert(terminal as usize)
    }

    pub fn union_with(&mut self, other: &Lookahead) {
        self.terminals.union_with(&other.terminals);
    }

    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.terminals.iter().map(|x| x as u32)
    }
}

impl<T: LexemeSet> FromIterator<T> for Lookahead {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut lookahead = Lookahead::default();
        for terminal in iter {
            lookahead.insert(terminal.to_id());
        }
        lookahead
    }
}

// comparisons go through the members, bit vector capacity must not matter
impl PartialEq for Lookahead {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Lookahead {}

impl Hash for Lookahead {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for terminal in self.iter() {
            terminal.hash(state);
        }
        self.len().hash(state);
    }
}

impl PartialOrd for Lookahead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lookahead {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

/// Terminals that can begin a derivation of `symbol`.
///
/// `visited` holds the nonterminals already expanded by this query; meeting
/// one again contributes nothing, which is what keeps left-recursive and
/// mutually recursive grammars from looping. Rules with an empty rhs
/// contribute nothing either. End of input has no head terminals.
pub fn head_terminals<T: LexemeSet>(
    grammar: &Grammar<T>,
    symbol: Symbol<T>,
    visited: &mut BitSet,
) -> Lookahead {
    match symbol {
        Symbol::Terminal(t) => Lookahead::single(t.to_id()),
        Symbol::EOF => Lookahead::default(),
        Symbol::Nonterminal(nt) => {
            let mut result = Lookahead::default();
            if !visited.insert(nt) {
                return result;
            }

            for production in grammar.productions.iter().filter(|x| x.lhs == nt) {
                match production.rhs.first() {
                    Some(Symbol::Terminal(t)) => {
                        result.insert(t.to_id());
                    }
                    Some(first @ Symbol::Nonterminal(_)) => {
                        let heads = head_terminals(grammar, *first, visited);
                        result.union_with(&heads);
                    }
                    Some(Symbol::EOF) | None => {}
                }
            }

            result
        }
    }
}

/// Head terminals of every nonterminal, computed once per grammar.
#[derive(Clone, Debug)]
pub struct HeadTerminalTable {
    heads: Vec<Lookahead>,
}

impl HeadTerminalTable {
    pub fn new<T: LexemeSet>(grammar: &Grammar<T>) -> HeadTerminalTable {
        let heads = (0..grammar.n_nonterminals())
            .map(|nt| head_terminals(grammar, Symbol::Nonterminal(nt), &mut BitSet::new()))
            .collect();

        HeadTerminalTable { heads }
    }

    pub fn of<T: LexemeSet>(&self, symbol: Symbol<T>) -> Lookahead {
        match symbol {
            Symbol::Terminal(t) => Lookahead::single(t.to_id()),
            Symbol::Nonterminal(nt) => self.heads[nt].clone(),
            Symbol::EOF => Lookahead::default(),
        }
    }
}
