use std::collections::{HashMap, HashSet, VecDeque};

use cairn_lex::LexemeSet;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use thiserror::Error;

pub type NT = usize;
pub type RuleId = usize;

// nonterminals are plain indices into Grammar::nonterminal_names
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol<T: LexemeSet> {
    Terminal(T),
    Nonterminal(NT),
    EOF,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Production<T: LexemeSet> {
    pub lhs: NT,
    pub rhs: Vec<Symbol<T>>,
    // name of the semantic action bound to this rule
    pub label: Option<String>,
}

impl<T: LexemeSet> Production<T> {
    pub fn new(lhs: NT, rhs: Vec<Symbol<T>>) -> Self {
        Self {
            lhs,
            rhs,
            label: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("malformed grammar definition: {0}")]
    Malformed(&'static str),
    #[error("unexpected end of grammar definition")]
    UnexpectedEOF,
    #[error("grammar defines no nonterminals")]
    EmptyGrammar,
    #[error("`{0}` is neither a nonterminal nor a terminal")]
    UndefinedSymbol(String),
    #[error("nonterminal `{0}` is defined more than once")]
    DuplicateNonterminal(String),
    #[error("nonterminal `{0}` has the same name as a terminal")]
    ShadowedTerminal(String),
    #[error("nonterminal `{0}` has no productions")]
    NoProductions(String),
    #[error("nonterminal `{0}` can derive itself without consuming input")]
    CyclicNonterminal(String),
    #[error("rule {0} refers to a symbol outside the grammar")]
    InvalidSymbol(RuleId),
    #[error("goal symbol {0} is not a nonterminal of the grammar")]
    InvalidGoal(NT),
    #[error("grammar has {count} rules, limit is {limit}")]
    TooManyRules { count: usize, limit: usize },
    #[error("rule {rule} (`{lhs}`) has no semantic action bound")]
    UnboundAction { rule: RuleId, lhs: String },
    #[error("no rule is labeled `{0}`")]
    UnknownAction(String),
    #[error("semantic action `{0}` is bound twice")]
    DuplicateAction(String),
}

#[derive(Debug, Clone)]
pub struct Grammar<T: LexemeSet> {
    pub(crate) productions: Vec<Production<T>>,
    pub(crate) goal_symbol: NT,
    pub(crate) nonterminal_names: Vec<String>,
}

impl<T: LexemeSet> Grammar<T> {
    pub fn new(
        nonterminal_names: Vec<String>,
        productions: Vec<Production<T>>,
        goal_symbol: NT,
    ) -> Result<Grammar<T>, GrammarError> {
        let n_nonterminals = nonterminal_names.len();
        if n_nonterminals == 0 {
            return Err(GrammarError::EmptyGrammar);
        }
        if goal_symbol >= n_nonterminals {
            return Err(GrammarError::InvalidGoal(goal_symbol));
        }

        let mut defined = vec![false; n_nonterminals];
        for (rule, production) in productions.iter().enumerate() {
            if production.lhs >= n_nonterminals {
                return Err(GrammarError::InvalidSymbol(rule));
            }
            let valid_rhs = production.rhs.iter().all(|x| match x {
                Symbol::Terminal(_) => true,
                Symbol::Nonterminal(nt) => *nt < n_nonterminals,
                Symbol::EOF => false,
            });
            if !valid_rhs {
                return Err(GrammarError::InvalidSymbol(rule));
            }
            defined[production.lhs] = true;
        }

        if let Some(nt) = defined.iter().position(|x| !x) {
            return Err(GrammarError::NoProductions(nonterminal_names[nt].clone()));
        }

        let grammar = Grammar {
            productions,
            goal_symbol,
            nonterminal_names,
        };
        if let Some(nt) = grammar.find_cyclic_nonterminal() {
            return Err(GrammarError::CyclicNonterminal(grammar.nonterminal_names[nt].clone()));
        }
        Ok(grammar)
    }

    // A -> a B b with a and b nullable gives A =>+ B; a cycle in that
    // relation means some nonterminal derives itself and reductions by it
    // never consume input. Reports the lowest such nonterminal.
    fn find_cyclic_nonterminal(&self) -> Option<NT> {
        let nullables = self.compute_nullable_nonterminals();
        let is_nullable = |x: &Symbol<T>| matches!(x, Symbol::Nonterminal(nt) if nullables.contains(nt));

        let mut derives: DiGraphMap<NT, ()> = DiGraphMap::new();
        for production in &self.productions {
            for (i, symbol) in production.rhs.iter().enumerate() {
                let Symbol::Nonterminal(nt) = symbol else {
                    continue;
                };
                let rest_nullable = production.rhs[..i].iter().all(is_nullable)
                    && production.rhs[i + 1..].iter().all(is_nullable);
                if rest_nullable {
                    derives.add_edge(production.lhs, *nt, ());
                }
            }
        }

        tarjan_scc(&derives)
            .into_iter()
            .filter(|scc| scc.len() > 1 || derives.contains_edge(scc[0], scc[0]))
            .filter_map(|scc| scc.into_iter().min())
            .min()
    }

    pub fn productions(&self) -> &[Production<T>] {
        &self.productions
    }

    pub fn production(&self, rule: RuleId) -> &Production<T> {
        &self.productions[rule]
    }

    pub fn goal_symbol(&self) -> NT {
        self.goal_symbol
    }

    pub fn n_nonterminals(&self) -> usize {
        self.nonterminal_names.len()
    }

    pub fn n_terminals(&self) -> usize {
        T::size() as usize
    }

    pub fn nonterminal_name(&self, nt: NT) -> &str {
        &self.nonterminal_names[nt]
    }

    pub fn nonterminal_by_name(&self, name: &str) -> Option<NT> {
        self.nonterminal_names.iter().position(|x| x == name)
    }

    pub fn symbol_name(&self, symbol: Symbol<T>) -> &str {
        match symbol {
            Symbol::Terminal(t) => t.to_name(),
            Symbol::Nonterminal(nt) => &self.nonterminal_names[nt],
            Symbol::EOF => "$",
        }
    }

    // columns: terminals by id, then end of input, then nonterminals
    pub fn column(&self, symbol: Symbol<T>) -> usize {
        match symbol {
            Symbol::Terminal(t) => t.to_id() as usize,
            Symbol::EOF => self.n_terminals(),
            Symbol::Nonterminal(nt) => self.n_terminals() + 1 + nt,
        }
    }

    pub fn symbol_at(&self, column: usize) -> Option<Symbol<T>> {
        let n_terminals = self.n_terminals();
        if column < n_terminals {
            T::from_id(column as u32).map(Symbol::Terminal)
        } else if column == n_terminals {
            Some(Symbol::EOF)
        } else if column - n_terminals - 1 < self.n_nonterminals() {
            Some(Symbol::Nonterminal(column - n_terminals - 1))
        } else {
            None
        }
    }

    pub fn format_production(&self, rule: RuleId) -> String {
        let production = &self.productions[rule];
        let mut text = format!("{} ->", self.nonterminal_name(production.lhs));
        for symbol in &production.rhs {
            text.push(' ');
            text.push_str(self.symbol_name(*symbol));
        }
        text
    }

    pub fn compute_nonterminal_index(&self) -> Vec<Vec<RuleId>> {
        let mut map: Vec<Vec<RuleId>> = Vec::new();
        map.resize_with(self.n_nonterminals(), Vec::new);
        for (i, production) in self.productions.iter().enumerate() {
            map[production.lhs].push(i);
        }
        map
    }

    // fixpoint over all rules, rescanned until no lhs is added
    pub fn compute_nullable_nonterminals(&self) -> HashSet<NT> {
        let mut nullables: HashSet<NT> = HashSet::new();
        loop {
            let mut changed = false;
            for rule in &self.productions {
                let all_nullable = rule.rhs.iter().all(|x| match x {
                    Symbol::Terminal(_) => false,
                    Symbol::Nonterminal(nt) => nullables.contains(nt),
                    Symbol::EOF => true,
                });

                if all_nullable {
                    changed |= nullables.insert(rule.lhs);
                }
            }

            if !changed {
                break;
            }
        }

        nullables
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BNFAlternative {
    pub symbols: Vec<String>,
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BNFDefinition {
    pub name: String,
    pub alternatives: Vec<BNFAlternative>,
}

impl<T: LexemeSet> Grammar<T> {
    pub fn from_bnf_str(s: &str) -> Result<Grammar<T>, GrammarError> {
        let definitions = BNFDefinition::from_str(s)?;
        Self::from_bnf(&definitions)
    }

    pub fn from_bnf(definitions: &[BNFDefinition]) -> Result<Grammar<T>, GrammarError> {
        let mut name_to_nonterminal: HashMap<&str, NT> = HashMap::new();
        let mut nonterminal_to_name: Vec<String> = Vec::new();

        // pass 1: collect names so definitions can refer forward
        for definition in definitions {
            if T::from_name(&definition.name).is_some() {
                return Err(GrammarError::ShadowedTerminal(definition.name.clone()));
            }
            let nt = nonterminal_to_name.len();
            if name_to_nonterminal.insert(&definition.name, nt).is_some() {
                return Err(GrammarError::DuplicateNonterminal(definition.name.clone()));
            }
            nonterminal_to_name.push(definition.name.clone());
        }

        // pass 2: resolve every alternative into a production
        let mut productions: Vec<Production<T>> = Vec::new();
        for (nt, definition) in definitions.iter().enumerate() {
            for alternative in &definition.alternatives {
                let mut rhs: Vec<Symbol<T>> = Vec::with_capacity(alternative.symbols.len());
                for name in &alternative.symbols {
                    let symbol = if let Some(nt) = name_to_nonterminal.get(name.as_str()) {
                        Symbol::Nonterminal(*nt)
                    } else if let Some(terminal) = T::from_name(name) {
                        Symbol::Terminal(terminal)
                    } else {
                        return Err(GrammarError::UndefinedSymbol(name.clone()));
                    };
                    rhs.push(symbol);
                }
                productions.push(Production {
                    lhs: nt,
                    rhs,
                    label: alternative.label.clone(),
                });
            }
        }

        Grammar::new(nonterminal_to_name, productions, 0)
    }
}

/// small hand parser for grammar definitions
/// Grammar:
///
/// (* whitespace only delimits symbols; blank lines end a definition;
///    lines starting with // are comments *)
/// <grammar> ::= <goal-definition> ("\n\n" <definition>)*
///
/// <definition> ::= <symbol> "::=" <alternatives>
///
/// <alternatives> ::= <alternative> ("|" <alternative>)*
///
/// <alternative> ::= <symbol>* ("=>" <label>)?
impl BNFDefinition {
    pub fn from_str(s: &str) -> Result<Vec<BNFDefinition>, GrammarError> {
        let mut definitions: Vec<BNFDefinition> = Vec::new();

        for chunk in Self::split_definitions(s) {
            let mut toks: VecDeque<&str> = chunk
                .iter()
                .flat_map(|line| line.split_whitespace())
                .flat_map(Self::split_bars)
                .collect();

            let definition = Self::parse_definition(&mut toks)?;
            definitions.push(definition);
        }

        if definitions.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }

        Ok(definitions)
    }

    fn split_definitions(s: &str) -> Vec<Vec<&str>> {
        let mut chunks: Vec<Vec<&str>> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in s.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("//") {
                continue;
            }
            if trimmed.is_empty() {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                continue;
            }
            current.push(trimmed);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    // "a|b" is two alternatives even without surrounding whitespace
    fn split_bars(word: &str) -> Vec<&str> {
        let mut result = Vec::new();
        let mut last = 0;
        for (index, matched) in word.match_indices('|') {
            if last != index {
                result.push(&word[last..index]);
            }
            result.push(matched);
            last = index + matched.len();
        }
        if last < word.len() {
            result.push(&word[last..]);
        }
        result
    }

    fn parse_definition(toks: &mut VecDeque<&str>) -> Result<BNFDefinition, GrammarError> {
        let name = toks.pop_front().ok_or(GrammarError::UnexpectedEOF)?;
        if Self::is_reserved(name) {
            return Err(GrammarError::Malformed("expected a nonterminal name"));
        }

        let missing_delimiter = GrammarError::Malformed("didn't see ::= delimiter");
        if toks.pop_front().ok_or(missing_delimiter.clone())? != "::=" {
            return Err(missing_delimiter);
        }

        let mut alternatives = vec![Self::parse_alternative(toks)?];
        while let Some(tok) = toks.pop_front() {
            if tok != "|" {
                return Err(GrammarError::Malformed("expected | (new alternative)"));
            }
            alternatives.push(Self::parse_alternative(toks)?);
        }

        Ok(BNFDefinition {
            name: name.to_string(),
            alternatives,
        })
    }

    fn parse_alternative(toks: &mut VecDeque<&str>) -> Result<BNFAlternative, GrammarError> {
        let mut symbols: Vec<String> = Vec::new();
        let mut label = None;

        while let Some(&lookahead) = toks.front() {
            match lookahead {
                "|" => break,
                "=>" => {
                    toks.pop_front();
                    let name = toks.pop_front().ok_or(GrammarError::UnexpectedEOF)?;
                    if Self::is_reserved(name) {
                        return Err(GrammarError::Malformed("expected an action label after =>"));
                    }
                    label = Some(name.to_string());
                    if toks.front().is_some_and(|x| *x != "|") {
                        return Err(GrammarError::Malformed("action label must end the alternative"));
                    }
                    break;
                }
                "::=" => return Err(GrammarError::Malformed("unexpected ::= (missing blank line?)")),
                _ => {
                    toks.pop_front();
                    symbols.push(lookahead.to_string());
                }
            }
        }

        Ok(BNFAlternative { symbols, label })
    }

    fn is_reserved(tok: &str) -> bool {
        matches!(tok, "::=" | "|" | "=>")
    }
}
