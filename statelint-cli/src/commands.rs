//! Command execution.

use crate::Commands;
use colored::Colorize;
use statelint_core::{
    analysis, interpreter, lexer, parser, validator, ExecutionContext, StateMachine, Value,
};

/// Executes a command and returns the formatted output.
pub fn execute(cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Validate { definition } => {
            let json = parse_json_arg(&definition)?;
            let machine = StateMachine::from_json(&json)?;
            let report = validator::validate(&machine);

            if report.valid {
                Ok(format!(
                    "{} ({} states, {} transitions)",
                    "Valid".green(),
                    machine.states().count(),
                    machine.transitions().len()
                ))
            } else {
                let issue = &report.issues[0];
                Err(format!("[{}] {}", issue.code(), issue).into())
            }
        }

        Commands::Eval { source, vars } => {
            let mut ctx = ExecutionContext::new();
            for var in &vars {
                let (name, value) = split_pair(var, "expected NAME=VALUE")?;
                ctx.set_variable(name, parse_value(value));
            }

            let result = interpreter::run(&source, &mut ctx)?;

            let mut output = format!("{} {}\n", "Result:".bold(), result.to_string().yellow());
            for (name, value) in &ctx.variables {
                output.push_str(&format!("  {} = {}\n", name.cyan(), value));
            }
            Ok(output.trim_end().to_string())
        }

        Commands::Condition { source } => {
            interpreter::run_condition(&source)?;
            Ok("OK".green().to_string())
        }

        Commands::Tokens { source } => {
            let tokens = lexer::tokenize(&source)?;
            let mut output = String::new();
            for token in &tokens {
                output.push_str(&format!(
                    "{:>4}:{:<4} {:<10} {}\n",
                    token.line + 1,
                    token.column + 1,
                    format!("{:?}", token.kind),
                    token.text.cyan()
                ));
            }
            Ok(output.trim_end().to_string())
        }

        Commands::Ast { source } => {
            let tokens = lexer::tokenize(&source)?;
            let statements = parser::parse(&tokens)?;
            Ok(format!("{statements:#?}"))
        }

        Commands::Outputs { source, inputs } => {
            let mut ctx = ExecutionContext::new();
            for input in &inputs {
                let (name, width) = split_pair(input, "expected NAME=WIDTH")?;
                ctx.declare_input(name, width.parse()?, true);
            }

            let assignments = analysis::check_output_logic(&source, &ctx)?;
            let mut output = String::new();
            for assignment in &assignments {
                let deps = if assignment.variables.is_empty() {
                    "constant".dimmed().to_string()
                } else {
                    assignment.variables.join(", ")
                };
                output.push_str(&format!("  {} <- {}\n", assignment.name.cyan(), deps));
            }
            Ok(output.trim_end().to_string())
        }
    }
}

/// Parses a JSON argument, reading from a file if prefixed with `@`.
fn parse_json_arg(arg: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = if let Some(path) = arg.strip_prefix('@') {
        std::fs::read_to_string(path)?
    } else {
        arg.to_string()
    };
    Ok(serde_json::from_str(&content)?)
}

fn split_pair<'a>(
    arg: &'a str,
    message: &str,
) -> Result<(&'a str, &'a str), Box<dyn std::error::Error>> {
    arg.split_once('=')
        .ok_or_else(|| format!("{message}, got '{arg}'").into())
}

/// Numbers where they parse, booleans for true/false, strings otherwise.
fn parse_value(text: &str) -> Value {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match text.parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Str(text.to_string()),
        },
    }
}
