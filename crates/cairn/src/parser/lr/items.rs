use std::collections::BTreeSet;
use std::fmt;

use cairn_lex::LexemeSet;

use crate::parser::grammar::{Grammar, RuleId, Symbol, NT};

use super::closure::{HeadTerminalTable, Lookahead};

/// A rule recognized up to `cursor`, expecting one of `lookahead` once the
/// whole rule has been reduced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub rule: RuleId,
    pub cursor: usize,
    pub lookahead: Lookahead,
}

// ordered so that equal item sets compare and hash equal regardless of the
// order items were discovered in
pub type ItemSet = BTreeSet<Item>;

impl Item {
    pub fn new(rule: RuleId, lookahead: Lookahead) -> Item {
        Item {
            rule,
            cursor: 0,
            lookahead,
        }
    }

    pub fn advance(&self) -> Item {
        Item {
            rule: self.rule,
            cursor: self.cursor + 1,
            lookahead: self.lookahead.clone(),
        }
    }

    pub fn next_symbol<T: LexemeSet>(&self, grammar: &Grammar<T>) -> Option<Symbol<T>> {
        grammar.production(self.rule).rhs.get(self.cursor).copied()
    }

    pub fn is_complete<T: LexemeSet>(&self, grammar: &Grammar<T>) -> bool {
        self.cursor >= grammar.production(self.rule).len()
    }

    pub fn display<'a, T: LexemeSet>(&'a self, grammar: &'a Grammar<T>) -> ItemDisplay<'a, T> {
        ItemDisplay {
            item: self,
            grammar,
        }
    }
}

/// `lhs -> a . b {Plus, $}` rendering of an item.
pub struct ItemDisplay<'a, T: LexemeSet> {
    item: &'a Item,
    grammar: &'a Grammar<T>,
}

impl<T: LexemeSet> fmt::Display for ItemDisplay<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let production = self.grammar.production(self.item.rule);
        write!(f, "{} ->", self.grammar.nonterminal_name(production.lhs))?;
        for (i, symbol) in production.rhs.iter().enumerate() {
            if i == self.item.cursor {
                write!(f, " .")?;
            }
            write!(f, " {}", self.grammar.symbol_name(*symbol))?;
        }
        if self.item.cursor >= production.len() {
            write!(f, " .")?;
        }

        write!(f, " {{")?;
        if self.item.lookahead.is_end_of_input() {
            write!(f, "$")?;
        }
        for (i, terminal) in self.item.lookahead.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match T::from_id(terminal) {
                Some(t) => write!(f, "{}", t.to_name())?,
                None => write!(f, "#{}", terminal)?,
            }
        }
        write!(f, "}}")
    }
}

/// Expands nonterminals into the closure of their cursor-0 items.
pub struct ItemSetBuilder<'g, T: LexemeSet> {
    grammar: &'g Grammar<T>,
    rules_by_lhs: Vec<Vec<RuleId>>,
    heads: HeadTerminalTable,
}

impl<'g, T: LexemeSet> ItemSetBuilder<'g, T> {
    pub fn new(grammar: &'g Grammar<T>) -> Self {
        Self {
            grammar,
            rules_by_lhs: grammar.compute_nonterminal_index(),
            heads: HeadTerminalTable::new(grammar),
        }
    }

    pub fn grammar(&self) -> &'g Grammar<T> {
        self.grammar
    }

    pub fn head_terminals(&self, symbol: Symbol<T>) -> Lookahead {
        self.heads.of(symbol)
    }

    /// Adds `{rule, 0, lookahead}` for every rule of `nt` not already in
    /// `items`, recursing into rules that start with a nonterminal. A rule
    /// with more symbols after that nonterminal passes on the head terminals
    /// of the next symbol; a single-symbol rule passes `lookahead` through.
    /// Only newly inserted items recurse, so left recursion stops as soon as
    /// an item repeats.
    pub fn generate_items(&self, nt: NT, lookahead: &Lookahead, items: &mut ItemSet) {
        for &rule in &self.rules_by_lhs[nt] {
            if !items.insert(Item::new(rule, lookahead.clone())) {
                continue;
            }

            let rhs = &self.grammar.production(rule).rhs;
            if let Some(Symbol::Nonterminal(first)) = rhs.first() {
                if rhs.len() > 1 {
                    let propagated = self.head_terminals(rhs[1]);
                    self.generate_items(*first, &propagated, items);
                } else {
                    self.generate_items(*first, lookahead, items);
                }
            }
        }
    }

    pub fn closure_of(&self, nt: NT, lookahead: &Lookahead) -> ItemSet {
        let mut items = ItemSet::new();
        self.generate_items(nt, lookahead, &mut items);
        items
    }
}
