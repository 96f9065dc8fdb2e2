//! Command line front end for the expression parser.
//!
//! Usage:
//!   compiler compile-table --output `<path>`   - build and persist the parse table
//!   compiler parse [--table `<path>`] `<expr>`   - parse an expression and print its AST
//!   compiler automaton [--dot]                 - dump the LR automaton

mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use cairn::config::BuildConfig;
use cairn::parser::expression::ExpressionParser;
use cairn::parser::lr::{automaton_to_graph, Automaton};
use clap::{Parser, Subcommand};
use petgraph::dot::Dot;
use tracing::{debug, info};

use settings::{Loader, LOCAL_SETTINGS_FILE};

#[derive(Parser, Debug)]
#[command(name = "compiler", version, about = "LR table builder and expression parser")]
struct Cli {
    /// Settings file layered over the defaults and ./cairn.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Upper bound on automaton states
    #[arg(long, global = true)]
    max_states: Option<usize>,

    /// How table conflicts are handled
    #[arg(long, global = true, value_parser = ["reject", "prefer-shift"])]
    conflict_policy: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the expression parse table and write it to a file
    CompileTable {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Parse an expression and print its AST
    Parse {
        /// Load a table written by compile-table instead of building one
        #[arg(long)]
        table: Option<PathBuf>,
        expression: String,
    },
    /// Print the automaton's item sets, or a GraphViz rendering
    Automaton {
        #[arg(long)]
        dot: bool,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_build_config(cli: &Cli) -> Result<BuildConfig> {
    let mut loader = Loader::new().with_optional_file(LOCAL_SETTINGS_FILE);
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    if let Some(max_states) = cli.max_states {
        let max_states = i64::try_from(max_states).context("--max-states is too large")?;
        loader = loader.set_override("build.max_states", max_states)?;
    }
    if let Some(policy) = &cli.conflict_policy {
        loader = loader.set_override("build.conflict_policy", policy.as_str())?;
    }

    let settings = loader.build().context("Failed to load settings")?;
    debug!(?settings, "loaded settings");
    Ok(settings.build)
}

fn compile_table(config: &BuildConfig, output: &Path) -> Result<()> {
    let now = Instant::now();
    let parser = ExpressionParser::build(config).context("Failed to build the expression parser")?;
    info!(
        states = parser.table().n_states(),
        elapsed = ?now.elapsed(),
        "built parse table"
    );

    let bytes = parser.table().compile_table()?;
    fs::write(output, &bytes).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {}, {} bytes", output.display(), bytes.len());
    Ok(())
}

fn parse(config: &BuildConfig, table: Option<&Path>, expression: &str) -> Result<()> {
    let parser = match table {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let parser = ExpressionParser::from_precompiled_table(&bytes)
                .with_context(|| format!("Failed to load parse table {}", path.display()))?;
            let table = parser.table();
            info!(
                states = table.n_states(),
                rules = table.n_rules(),
                goal = table.nonterminal_name(table.goal_symbol()).unwrap_or("?"),
                "loaded parse table"
            );
            parser
        }
        None => ExpressionParser::build(config).context("Failed to build the expression parser")?,
    };

    let now = Instant::now();
    let root = parser.parse_str(expression)?;
    debug!(elapsed = ?now.elapsed(), "parsed");
    println!("{}", root);
    println!("{:#?}", root);
    Ok(())
}

fn dump_automaton(config: &BuildConfig, dot: bool) -> Result<()> {
    let grammar = ExpressionParser::grammar_definition()?;
    let automaton = Automaton::build(&grammar, config)?;

    if dot {
        let graph = automaton_to_graph(&automaton, &grammar);
        println!("{}", Dot::new(&graph));
        return Ok(());
    }

    println!("{} states", automaton.len());
    for state in automaton.states() {
        println!("\nI{}", state.id);
        for item in &state.items {
            println!("  {}", item.display(&grammar));
        }
        for (&column, target) in &state.transitions {
            if let Some(symbol) = grammar.symbol_at(column) {
                println!("  on {} goto I{}", grammar.symbol_name(symbol), target);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_build_config(&cli)?;

    match &cli.command {
        Command::CompileTable { output } => compile_table(&config, output),
        Command::Parse { table, expression } => parse(&config, table.as_deref(), expression),
        Command::Automaton { dot } => dump_automaton(&config, *dot),
    }
}
