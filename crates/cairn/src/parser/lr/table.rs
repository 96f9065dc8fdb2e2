use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cairn_lex::LexemeSet;
use serde::{Deserialize, Serialize};
use serde_binary::binary_stream::Endian;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ConflictPolicy;
use crate::parser::grammar::{Grammar, RuleId, NT};

use super::automaton::{Automaton, BuildError, StateId};

// bump whenever the serialized layout of ParseTable changes
const TABLE_FORMAT_VERSION: u32 = 2;

// action cells: 0 = invalid, odd = shift to cell >> 1, even = reduce by
// (cell >> 1) - 1
const INVALID_CELL: u32 = 0;
// goto cells
const NO_GOTO: u32 = u32::MAX;

/// Decoded view of one action cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LRAction {
    Invalid,
    Shift(StateId),
    Reduce(RuleId),
}

impl LRAction {
    fn encode(self) -> u32 {
        match self {
            LRAction::Invalid => INVALID_CELL,
            LRAction::Shift(target) => ((target.index() as u32) << 1) | 1,
            LRAction::Reduce(rule) => (rule as u32 + 1) << 1,
        }
    }

    fn decode(cell: u32) -> LRAction {
        if cell == INVALID_CELL {
            LRAction::Invalid
        } else if cell & 1 == 1 {
            LRAction::Shift(StateId::new((cell >> 1) as usize))
        } else {
            LRAction::Reduce((cell >> 1) as usize - 1)
        }
    }
}

/// What the parser needs to know about a rule: the nonterminal it produces
/// and the columns of its rhs symbols.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleShape {
    pub lhs: NT,
    pub rhs: Vec<usize>,
}

impl RuleShape {
    fn of<T: LexemeSet>(grammar: &Grammar<T>, rule: RuleId) -> RuleShape {
        let production = grammar.production(rule);
        RuleShape {
            lhs: production.lhs,
            rhs: production.rhs.iter().map(|x| grammar.column(*x)).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

/// A (state, terminal) cell that received more than one action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub state: StateId,
    pub column: usize,
    pub symbol: String,
    pub shift: Option<StateId>,
    pub reduces: Vec<RuleId>,
}

impl Conflict {
    pub fn kind(&self) -> ConflictKind {
        if self.shift.is_some() {
            ConflictKind::ShiftReduce
        } else {
            ConflictKind::ReduceReduce
        }
    }

    // shift beats reduce, then the earliest rule
    fn preferred(&self) -> LRAction {
        match (self.shift, self.reduces.first()) {
            (Some(target), _) => LRAction::Shift(target),
            (None, Some(rule)) => LRAction::Reduce(*rule),
            (None, None) => LRAction::Invalid,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state {} on {}:", self.state, self.symbol)?;
        if let Some(target) = self.shift {
            write!(f, " shift to {}", target)?;
        }
        for (i, rule) in self.reduces.iter().enumerate() {
            let sep = if i == 0 && self.shift.is_none() { "" } else { "," };
            write!(f, "{} reduce by rule {}", sep, rule)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to encode or decode parse table")]
    Encoding(#[from] serde_binary::Error),
    #[error("parse table format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("malformed parse table: {0}")]
    Malformed(&'static str),
    #[error("parse table was compiled from a different grammar")]
    StaleTable,
}

// every candidate action of one cell
#[derive(Default)]
struct Cell {
    shift: Option<StateId>,
    reduces: BTreeSet<RuleId>,
}

impl Cell {
    fn is_conflict(&self) -> bool {
        self.reduces.len() + usize::from(self.shift.is_some()) > 1
    }
}

/// Dense action/goto tables indexed by state. Action columns are the
/// terminal ids followed by one end of input column; goto columns are the
/// nonterminals. Cells hold encoded integers, [`ParseTable::action`] and
/// [`ParseTable::goto`] decode them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseTable {
    version: u32,
    n_states: usize,
    n_terminals: usize,
    n_nonterminals: usize,
    goal: NT,
    action: Vec<u32>,
    goto: Vec<u32>,
    rules: Vec<RuleShape>,
    nonterminal_names: Vec<String>,
    // build diagnostics only, a reloaded table has none
    #[serde(skip)]
    resolved_conflicts: Vec<Conflict>,
}

impl ParseTable {
    pub fn compile<T: LexemeSet>(
        grammar: &Grammar<T>,
        automaton: &Automaton,
        policy: ConflictPolicy,
    ) -> Result<ParseTable, BuildError> {
        let n_states = automaton.len();
        let n_terminals = grammar.n_terminals();
        let n_nonterminals = grammar.n_nonterminals();
        let width = n_terminals + 1;

        let mut action = vec![INVALID_CELL; n_states * width];
        let mut goto = vec![NO_GOTO; n_states * n_nonterminals];
        let mut conflicts = Vec::new();

        for state in automaton.states() {
            let row = state.id.index();
            for (&column, &target) in &state.transitions {
                if column > n_terminals {
                    goto[row * n_nonterminals + column - width] = target.index() as u32;
                }
            }

            for (column, cell) in Self::action_cells(grammar, automaton, state.id) {
                let resolved = if cell.is_conflict() {
                    let conflict = Self::make_conflict(grammar, state.id, column, cell);
                    let preferred = conflict.preferred();
                    conflicts.push(conflict);
                    preferred
                } else if let Some(target) = cell.shift {
                    LRAction::Shift(target)
                } else if let Some(rule) = cell.reduces.first() {
                    LRAction::Reduce(*rule)
                } else {
                    LRAction::Invalid
                };
                action[row * width + column] = resolved.encode();
            }
        }

        if !conflicts.is_empty() {
            match policy {
                ConflictPolicy::Reject => return Err(BuildError::Conflicts(conflicts)),
                ConflictPolicy::PreferShift => {
                    for conflict in &conflicts {
                        warn!(
                            state = %conflict.state,
                            symbol = %conflict.symbol,
                            kind = ?conflict.kind(),
                            resolution = ?conflict.preferred(),
                            "resolved conflict: {}",
                            conflict
                        );
                    }
                }
            }
        }

        let rules = (0..grammar.productions().len())
            .map(|rule| RuleShape::of(grammar, rule))
            .collect();
        let nonterminal_names = (0..n_nonterminals)
            .map(|nt| grammar.nonterminal_name(nt).to_string())
            .collect();

        debug!(
            states = n_states,
            columns = width + n_nonterminals,
            resolved_conflicts = conflicts.len(),
            "compiled parse table"
        );

        Ok(ParseTable {
            version: TABLE_FORMAT_VERSION,
            n_states,
            n_terminals,
            n_nonterminals,
            goal: grammar.goal_symbol(),
            action,
            goto,
            rules,
            nonterminal_names,
            resolved_conflicts: conflicts,
        })
    }

    /// Every cell of the automaton that would receive more than one action,
    /// in state then column order.
    pub fn find_conflicts<T: LexemeSet>(grammar: &Grammar<T>, automaton: &Automaton) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for state in automaton.states() {
            for (column, cell) in Self::action_cells(grammar, automaton, state.id) {
                if cell.is_conflict() {
                    conflicts.push(Self::make_conflict(grammar, state.id, column, cell));
                }
            }
        }
        conflicts
    }

    // shifts from terminal edges, reduces from completed items; an empty
    // lookahead reduces on the end of input column
    fn action_cells<T: LexemeSet>(
        grammar: &Grammar<T>,
        automaton: &Automaton,
        id: StateId,
    ) -> BTreeMap<usize, Cell> {
        let state = automaton.state(id);
        let eof = grammar.n_terminals();
        let mut cells: BTreeMap<usize, Cell> = BTreeMap::new();

        for (&column, &target) in &state.transitions {
            if column < eof {
                cells.entry(column).or_default().shift = Some(target);
            }
        }

        for item in state.items.iter().filter(|x| x.is_complete(grammar)) {
            if item.lookahead.is_end_of_input() {
                cells.entry(eof).or_default().reduces.insert(item.rule);
            }
            for terminal in item.lookahead.iter() {
                cells
                    .entry(terminal as usize)
                    .or_default()
                    .reduces
                    .insert(item.rule);
            }
        }

        cells
    }

    fn make_conflict<T: LexemeSet>(
        grammar: &Grammar<T>,
        state: StateId,
        column: usize,
        cell: Cell,
    ) -> Conflict {
        let symbol = grammar
            .symbol_at(column)
            .map(|x| grammar.symbol_name(x).to_string())
            .unwrap_or_else(|| format!("#{}", column));
        Conflict {
            state,
            column,
            symbol,
            shift: cell.shift,
            reduces: cell.reduces.into_iter().collect(),
        }
    }

    pub fn compile_table(&self) -> Result<Vec<u8>, TableError> {
        Ok(serde_binary::to_vec(self, Endian::Little)?)
    }

    pub fn from_precompiled_table(bytes: &[u8]) -> Result<ParseTable, TableError> {
        let table: ParseTable = serde_binary::from_slice(bytes, Endian::Little)?;
        table.validate()?;
        Ok(table)
    }

    // a decoded table must not be able to send the parser out of bounds
    fn validate(&self) -> Result<(), TableError> {
        if self.version != TABLE_FORMAT_VERSION {
            return Err(TableError::UnsupportedVersion {
                found: self.version,
                expected: TABLE_FORMAT_VERSION,
            });
        }
        if self.n_states == 0 {
            return Err(TableError::Malformed("table has no states"));
        }
        if self.action.len() != self.n_states * (self.n_terminals + 1) {
            return Err(TableError::Malformed("action table has the wrong size"));
        }
        if self.goto.len() != self.n_states * self.n_nonterminals {
            return Err(TableError::Malformed("goto table has the wrong size"));
        }
        if self.nonterminal_names.len() != self.n_nonterminals || self.goal >= self.n_nonterminals {
            return Err(TableError::Malformed("nonterminals do not match goto columns"));
        }

        for cell in &self.action {
            match LRAction::decode(*cell) {
                LRAction::Shift(target) if target.index() >= self.n_states => {
                    return Err(TableError::Malformed("shift to a missing state"));
                }
                LRAction::Reduce(rule) if rule >= self.rules.len() => {
                    return Err(TableError::Malformed("reduce by a missing rule"));
                }
                _ => {}
            }
        }
        let valid_goto = |x: &u32| *x == NO_GOTO || (*x as usize) < self.n_states;
        if !self.goto.iter().all(valid_goto) {
            return Err(TableError::Malformed("goto to a missing state"));
        }

        let n_columns = self.n_terminals + 1 + self.n_nonterminals;
        let eof = self.eof_column();
        for rule in &self.rules {
            if rule.lhs >= self.n_nonterminals
                || rule.rhs.iter().any(|x| *x >= n_columns || *x == eof)
            {
                return Err(TableError::Malformed("rule refers to a missing symbol"));
            }
        }

        Ok(())
    }

    /// Fails unless `grammar` has exactly the rules this table was compiled
    /// from.
    pub fn check_grammar<T: LexemeSet>(&self, grammar: &Grammar<T>) -> Result<(), TableError> {
        let same_shape = self.n_terminals == grammar.n_terminals()
            && self.n_nonterminals == grammar.n_nonterminals()
            && self.goal == grammar.goal_symbol()
            && self.rules.len() == grammar.productions().len()
            && self
                .rules
                .iter()
                .enumerate()
                .all(|(rule, shape)| *shape == RuleShape::of(grammar, rule));

        if same_shape {
            Ok(())
        } else {
            Err(TableError::StaleTable)
        }
    }

    /// Action for a terminal id or the end of input column. Anything out of
    /// range is `Invalid`.
    pub fn action(&self, state: StateId, column: usize) -> LRAction {
        let width = self.n_terminals + 1;
        if state.index() >= self.n_states || column >= width {
            return LRAction::Invalid;
        }
        LRAction::decode(self.action[state.index() * width + column])
    }

    pub fn goto(&self, state: StateId, nt: NT) -> Option<StateId> {
        if state.index() >= self.n_states || nt >= self.n_nonterminals {
            return None;
        }
        match self.goto[state.index() * self.n_nonterminals + nt] {
            NO_GOTO => None,
            target => Some(StateId::new(target as usize)),
        }
    }

    pub fn eof_column(&self) -> usize {
        self.n_terminals
    }

    pub fn rule(&self, rule: RuleId) -> Option<&RuleShape> {
        self.rules.get(rule)
    }

    pub fn n_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn goal_symbol(&self) -> NT {
        self.goal
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_terminals(&self) -> usize {
        self.n_terminals
    }

    pub fn n_nonterminals(&self) -> usize {
        self.n_nonterminals
    }

    pub fn nonterminal_name(&self, nt: NT) -> Option<&str> {
        self.nonterminal_names.get(nt).map(String::as_str)
    }

    pub fn resolved_conflicts(&self) -> &[Conflict] {
        &self.resolved_conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::parser::grammar::Symbol;
    use crate::scanner::lexeme_sets::expressions::Expressions;

    const ARITHMETIC: &str = "
        e ::= e Plus t | t

        t ::= t Star f | f

        f ::= Identifier | LeftParen e RightParen
    ";

    fn build(src: &str, policy: ConflictPolicy) -> Result<ParseTable, BuildError> {
        let g: Grammar<Expressions> = Grammar::from_bnf_str(src).unwrap();
        let automaton = Automaton::build(&g, &BuildConfig::default()).unwrap();
        ParseTable::compile(&g, &automaton, policy)
    }

    fn column(terminal: Expressions) -> usize {
        terminal.to_id() as usize
    }

    #[test]
    fn arithmetic_has_no_conflicts() {
        let g: Grammar<Expressions> = Grammar::from_bnf_str(ARITHMETIC).unwrap();
        let automaton = Automaton::build(&g, &BuildConfig::default()).unwrap();
        assert!(ParseTable::find_conflicts(&g, &automaton).is_empty());

        let table = ParseTable::compile(&g, &automaton, ConflictPolicy::Reject).unwrap();
        assert_eq!(table.n_states(), automaton.len());
        assert!(table.resolved_conflicts().is_empty());

        let initial = StateId::new(0);
        assert!(matches!(
            table.action(initial, column(Expressions::Identifier)),
            LRAction::Shift(_)
        ));
        assert_eq!(table.action(initial, column(Expressions::Plus)), LRAction::Invalid);
        assert_eq!(table.action(initial, table.eof_column()), LRAction::Invalid);
        assert!(table.goto(initial, 0).is_some());

        // goto cells mirror the automaton's nonterminal edges
        let e_column = g.column(Symbol::Nonterminal(0));
        assert_eq!(table.goto(initial, 0), automaton.initial().transitions.get(&e_column).copied());
    }

    #[test]
    fn out_of_range_cells_are_invalid() {
        let table = build(ARITHMETIC, ConflictPolicy::Reject).unwrap();
        let past_end = StateId::new(table.n_states());
        assert_eq!(table.action(past_end, 0), LRAction::Invalid);
        assert_eq!(table.action(StateId::new(0), table.eof_column() + 1), LRAction::Invalid);
        assert_eq!(table.goto(StateId::new(0), table.n_nonterminals()), None);
    }

    #[test]
    fn ambiguous_grammar_is_rejected() {
        let result = build("e ::= e Plus e | Identifier", ConflictPolicy::Reject);
        let Err(BuildError::Conflicts(conflicts)) = result else {
            panic!("expected conflicts");
        };

        assert!(!conflicts.is_empty());
        let on_plus: Vec<&Conflict> = conflicts
            .iter()
            .filter(|x| x.column == column(Expressions::Plus))
            .collect();
        assert_eq!(on_plus.len(), 1);
        assert_eq!(on_plus[0].kind(), ConflictKind::ShiftReduce);
        assert_eq!(on_plus[0].reduces, vec![0]);
        assert_eq!(on_plus[0].symbol, "Plus");
    }

    #[test]
    fn prefer_shift_resolves_shift_reduce() {
        let table = build("e ::= e Plus e | Identifier", ConflictPolicy::PreferShift).unwrap();
        let conflicts = table.resolved_conflicts();
        assert_eq!(conflicts.len(), 1);

        let conflict = &conflicts[0];
        let Some(target) = conflict.shift else {
            panic!("expected a shift/reduce conflict");
        };
        assert_eq!(table.action(conflict.state, conflict.column), LRAction::Shift(target));
    }

    #[test]
    fn prefer_shift_resolves_reduce_reduce_to_lowest_rule() {
        let src = "
            s ::= a | b

            a ::= Identifier

            b ::= Identifier
        ";
        assert!(matches!(
            build(src, ConflictPolicy::Reject),
            Err(BuildError::Conflicts(_))
        ));

        let table = build(src, ConflictPolicy::PreferShift).unwrap();
        let conflict = &table.resolved_conflicts()[0];
        assert_eq!(conflict.kind(), ConflictKind::ReduceReduce);
        assert_eq!(conflict.reduces, vec![2, 3]);
        assert_eq!(conflict.column, table.eof_column());
        assert_eq!(table.action(conflict.state, conflict.column), LRAction::Reduce(2));
        assert_eq!(conflict.to_string(), format!("state {} on $: reduce by rule 2, reduce by rule 3", conflict.state));
    }

    #[test]
    fn persisted_table_round_trips() {
        let table = build(ARITHMETIC, ConflictPolicy::Reject).unwrap();
        let bytes = table.compile_table().unwrap();
        let reloaded = ParseTable::from_precompiled_table(&bytes).unwrap();
        assert_eq!(reloaded, table);
        assert_eq!(reloaded.nonterminal_name(reloaded.goal_symbol()), Some("e"));
        assert_eq!(reloaded.nonterminal_name(3), None);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut table = build(ARITHMETIC, ConflictPolicy::Reject).unwrap();
        table.version = TABLE_FORMAT_VERSION + 1;
        let bytes = table.compile_table().unwrap();
        assert!(matches!(
            ParseTable::from_precompiled_table(&bytes),
            Err(TableError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn inconsistent_dimensions_are_rejected() {
        let mut table = build(ARITHMETIC, ConflictPolicy::Reject).unwrap();
        table.action.pop();
        let bytes = table.compile_table().unwrap();
        assert!(matches!(
            ParseTable::from_precompiled_table(&bytes),
            Err(TableError::Malformed(_))
        ));
    }

    #[test]
    fn reloaded_table_keeps_resolved_cells() {
        let table = build("e ::= e Plus e | Identifier", ConflictPolicy::PreferShift).unwrap();
        let reloaded = ParseTable::from_precompiled_table(&table.compile_table().unwrap()).unwrap();
        assert!(reloaded.resolved_conflicts().is_empty());

        for state in (0..table.n_states()).map(StateId::new) {
            for column in 0..=table.eof_column() {
                assert_eq!(reloaded.action(state, column), table.action(state, column));
            }
            for nt in 0..table.n_nonterminals() {
                assert_eq!(reloaded.goto(state, nt), table.goto(state, nt));
            }
        }
    }

    #[test]
    fn reduce_by_missing_rule_is_rejected() {
        let mut table = build(ARITHMETIC, ConflictPolicy::Reject).unwrap();
        table.action[0] = LRAction::Reduce(table.n_rules()).encode();
        let bytes = table.compile_table().unwrap();
        assert!(matches!(
            ParseTable::from_precompiled_table(&bytes),
            Err(TableError::Malformed("reduce by a missing rule"))
        ));
    }

    #[test]
    fn goto_to_missing_state_is_rejected() {
        let mut table = build(ARITHMETIC, ConflictPolicy::Reject).unwrap();
        table.goto[0] = table.n_states() as u32;
        let bytes = table.compile_table().unwrap();
        assert!(matches!(
            ParseTable::from_precompiled_table(&bytes),
            Err(TableError::Malformed("goto to a missing state"))
        ));
    }

    #[test]
    fn stale_table_is_detected() {
        let table = build(ARITHMETIC, ConflictPolicy::Reject).unwrap();
        let same: Grammar<Expressions> = Grammar::from_bnf_str(ARITHMETIC).unwrap();
        assert!(table.check_grammar(&same).is_ok());

        let changed: Grammar<Expressions> = Grammar::from_bnf_str(
            "
            e ::= e Minus t | t

            t ::= t Star f | f

            f ::= Identifier | LeftParen e RightParen
            ",
        )
        .unwrap();
        assert!(matches!(table.check_grammar(&changed), Err(TableError::StaleTable)));
    }
}
