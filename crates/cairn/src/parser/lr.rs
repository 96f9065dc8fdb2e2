// Canonical LR-style parser construction and the table-driven parser.
//
// grammar -> head terminals -> item sets -> automaton -> parse table -> parser
//
// Lookaheads only ever look one symbol past the nonterminal being expanded
// (head terminals of the next rhs symbol, or the item's own lookahead when
// nothing follows). That is narrower than textbook LR(1) follow computation
// and is what the table compiler relies on.

mod actions;
mod automaton;
mod closure;
mod engine;
mod graph;
mod items;
mod parse_tree;
mod table;

pub use actions::{ActionError, ActionTable, ReduceAction, ShiftAction};
pub use automaton::{Automaton, BuildError, State, StateId};
pub use closure::{head_terminals, HeadTerminalTable, Lookahead};
pub use engine::{Parser, SemanticActions, TokenSummary, ParseError};
pub use graph::automaton_to_graph;
pub use items::{Item, ItemDisplay, ItemSet, ItemSetBuilder};
pub use parse_tree::{ParseTree, ParseTreeBuilder};
pub use table::{Conflict, ConflictKind, LRAction, ParseTable, RuleShape, TableError};
