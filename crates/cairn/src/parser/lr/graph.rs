use cairn_lex::LexemeSet;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::parser::grammar::Grammar;

use super::automaton::Automaton;

/// One node per state, labelled with its id and items; one edge per
/// transition, labelled with the symbol it is taken on.
pub fn automaton_to_graph<T: LexemeSet>(
    automaton: &Automaton,
    grammar: &Grammar<T>,
) -> DiGraph<String, String> {
    let mut graph: DiGraph<String, String> = DiGraph::new();

    // states are numbered densely, so node i is state i
    let nodes: Vec<NodeIndex> = automaton
        .states()
        .iter()
        .map(|state| {
            let mut label = format!("I{}", state.id);
            for item in &state.items {
                label.push('\n');
                label.push_str(&item.display(grammar).to_string());
            }
            graph.add_node(label)
        })
        .collect();

    for state in automaton.states() {
        for (&column, &target) in &state.transitions {
            let symbol = match grammar.symbol_at(column) {
                Some(symbol) => grammar.symbol_name(symbol).to_string(),
                None => format!("#{}", column),
            };
            graph.add_edge(nodes[state.id.index()], nodes[target.index()], symbol);
        }
    }

    graph
}
