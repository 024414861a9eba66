//! Editor-facing static analyses over expression sources.
//!
//! These run while a diagram is being edited, before full validation:
//! `check_output_logic` rejects combinational outputs that read inputs,
//! and `infer_input_widths` derives the bit width of undeclared inputs
//! from the comparisons they appear in.

use crate::ast::{Expr, Statement};
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::interpreter;
use crate::lexer;
use crate::parser;

/// One output assignment and the variable names its right-hand side reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAssignment {
    pub name: String,
    pub variables: Vec<String>,
}

/// Checks a state's output-expression source: every assignment's
/// right-hand side may only read state variables, never declared inputs.
/// Returns the per-output dependency lists for the editor to display.
pub fn check_output_logic(
    source: &str,
    ctx: &ExecutionContext,
) -> Result<Vec<OutputAssignment>, CoreError> {
    let tokens = lexer::tokenize(source)?;
    let statements = parser::parse(&tokens)?;

    let mut assignments = Vec::new();
    for statement in &statements {
        if let Statement::Assignment { name, expr } = statement {
            let variables = expr.variables();
            for variable in &variables {
                if ctx.inputs.contains_key(*variable) {
                    return Err(CoreError::OutputDependsOnInput {
                        output: name.clone(),
                        input: variable.to_string(),
                    });
                }
            }
            assignments.push(OutputAssignment {
                name: name.clone(),
                variables: variables.into_iter().map(str::to_string).collect(),
            });
        }
    }
    Ok(assignments)
}

/// Infers widths for undeclared inputs appearing in bare conditions.
///
/// For every condition of the form `lhs <op> rhs` where one side is a
/// variable (optionally under a unary operator) not declared as an
/// output, the other side is probe-evaluated against a snapshot of the
/// context; the variable is declared as an input whose width is the bit
/// length of the probed value. Declared outputs with stored literal
/// values are visible to the probe by name, so `a == out;` sizes `a`
/// from `out`'s value. A failed probe still declares the input, with
/// width 1 and `known = false`. The live context's variables are never
/// touched.
pub fn infer_input_widths(source: &str, ctx: &mut ExecutionContext) -> Result<(), CoreError> {
    let tokens = lexer::tokenize(source)?;
    let statements = parser::parse(&tokens)?;

    for statement in &statements {
        let Statement::Condition(Expr::Binary { left, right, .. }) = statement else {
            continue;
        };
        if let Some(name) = variable_side(left) {
            probe_side(ctx, name, right);
        }
        if let Some(name) = variable_side(right) {
            probe_side(ctx, name, left);
        }
    }
    Ok(())
}

/// The variable name of a side, looking through a unary wrapper.
fn variable_side(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Variable(name) => Some(name),
        Expr::Unary { operand, .. } => match operand.as_ref() {
            Expr::Variable(name) => Some(name),
            _ => None,
        },
        _ => None,
    }
}

fn probe_side(ctx: &mut ExecutionContext, name: &str, other: &Expr) {
    // Known outputs are not inputs; leave them alone.
    if ctx.outputs.contains_key(name) {
        return;
    }

    let mut probe = ctx.probe_snapshot();
    let statements = [Statement::Assignment {
        name: "__probe".to_string(),
        expr: other.clone(),
    }];

    match interpreter::execute(&statements, &mut probe) {
        Ok(_) => {
            let width = probe
                .variable("__probe")
                .map(|value| value.bit_width())
                .unwrap_or(1);
            ctx.declare_input(name, width, true);
        }
        Err(error) => {
            tracing::debug!(input = name, %error, "width probe failed");
            ctx.declare_input(name, 1, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_output_reading_input_rejected() {
        let mut ctx = ExecutionContext::new();
        ctx.declare_input("in", 1, true);

        let result = check_output_logic("out = in + 1;", &ctx);
        assert!(matches!(
            result,
            Err(CoreError::OutputDependsOnInput { ref output, ref input })
                if output == "out" && input == "in"
        ));
    }

    #[test]
    fn test_output_dependencies_collected() {
        let ctx = ExecutionContext::new();
        let assignments = check_output_logic("out = a + b; led = 1;", &ctx).unwrap();
        assert_eq!(
            assignments,
            vec![
                OutputAssignment {
                    name: "out".into(),
                    variables: vec!["a".into(), "b".into()],
                },
                OutputAssignment {
                    name: "led".into(),
                    variables: vec![],
                },
            ]
        );
    }

    #[test]
    fn test_infer_width_from_literal() {
        let mut ctx = ExecutionContext::new();
        infer_input_widths("a == 5;", &mut ctx).unwrap();

        let input = ctx.inputs.get("a").unwrap();
        assert_eq!(input.width, 3);
        assert!(input.known);
    }

    #[test]
    fn test_infer_width_variable_on_right() {
        let mut ctx = ExecutionContext::new();
        infer_input_widths("12 == b;", &mut ctx).unwrap();
        assert_eq!(ctx.inputs.get("b").unwrap().width, 4);
    }

    #[test]
    fn test_infer_width_from_output_value() {
        let mut ctx = ExecutionContext::new();
        ctx.declare_output("out", 4);
        ctx.set_output_value("out", Value::Number(5.0));
        infer_input_widths("a == out;", &mut ctx).unwrap();

        let a = ctx.inputs.get("a").unwrap();
        assert_eq!(a.width, 3);
        assert!(a.known);
    }

    #[test]
    fn test_failed_probe_marks_width_unknown() {
        let mut ctx = ExecutionContext::new();
        infer_input_widths("a == other;", &mut ctx).unwrap();

        let a = ctx.inputs.get("a").unwrap();
        assert_eq!(a.width, 1);
        assert!(!a.known);
    }

    #[test]
    fn test_known_output_not_redeclared_as_input() {
        let mut ctx = ExecutionContext::new();
        ctx.declare_output("out", 2);
        infer_input_widths("out == 3;", &mut ctx).unwrap();
        assert!(ctx.inputs.is_empty());
    }

    #[test]
    fn test_probe_does_not_mutate_live_variables() {
        let mut ctx = ExecutionContext::new();
        ctx.set_variable("x", Value::Number(7.0));
        infer_input_widths("a == x;", &mut ctx).unwrap();

        assert_eq!(ctx.variable("x"), Some(&Value::Number(7.0)));
        assert!(ctx.variable("__probe").is_none());
        assert_eq!(ctx.inputs.get("a").unwrap().width, 3);
    }
}
