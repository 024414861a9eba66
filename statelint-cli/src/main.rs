//! statelint - Lint and evaluate state machine diagrams from the shell.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "statelint")]
#[command(about = "Validator and expression evaluator for state machine diagrams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a machine definition
    Validate {
        /// Definition JSON (or @file.json to read from file)
        definition: String,
    },

    /// Evaluate an expression program and print the resulting bindings
    Eval {
        /// Program source, e.g. 'a = 1 + 2;'
        source: String,

        /// Seed a variable before evaluation, as name=value (repeatable)
        #[arg(short, long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },

    /// Check that a condition is a pure boolean expression
    Condition {
        /// Condition source, e.g. 'in == 1;'
        source: String,
    },

    /// Print the token stream of a source fragment
    Tokens {
        /// Program source
        source: String,
    },

    /// Print the parsed statements of a source fragment
    Ast {
        /// Program source
        source: String,
    },

    /// List the variables each output assignment depends on
    Outputs {
        /// Output-expression source, e.g. 'out = mode + 1;'
        source: String,

        /// Treat a name as a declared input, as name=width (repeatable)
        #[arg(short, long = "input", value_name = "NAME=WIDTH")]
        inputs: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match commands::execute(cli.command) {
        Ok(output) => {
            println!("{output}");
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
