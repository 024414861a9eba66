//! Tree-walking interpreter and the lex→parse→execute pipeline.

use crate::ast::{BinaryOp, Expr, Statement, UnaryOp};
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::value::Value;

/// Runs statements in order and returns the last statement's result, or
/// `Null` for an empty program. All runtime errors are fatal for the
/// whole call; there are no partial results.
pub fn execute(statements: &[Statement], ctx: &mut ExecutionContext) -> Result<Value, CoreError> {
    let mut result = Value::Null;
    for statement in statements {
        result = eval_statement(statement, ctx)?;
    }
    Ok(result)
}

fn eval_statement(statement: &Statement, ctx: &mut ExecutionContext) -> Result<Value, CoreError> {
    match statement {
        Statement::Assignment { name, expr } => {
            let value = eval_expr(expr, ctx)?;
            ctx.set_variable(name.clone(), value.clone());
            Ok(value)
        }
        Statement::FunctionCall { name, args } => eval_call(name, args, ctx),
        Statement::If { condition, body } => {
            let guard = eval_expr(condition, ctx)?;
            if guard.is_truthy() {
                execute(body, ctx)
            } else {
                Ok(Value::Null)
            }
        }
        Statement::Condition(expr) => eval_expr(expr, ctx),
        Statement::ElseMarker => Ok(Value::else_sentinel()),
    }
}

fn eval_expr(expr: &Expr, ctx: &mut ExecutionContext) -> Result<Value, CoreError> {
    match expr {
        Expr::Str(text) => Ok(Value::Str(text.clone())),
        // Decimal literal text converts here, not at lex time.
        Expr::Number(text) => Ok(Value::Number(text.parse().unwrap_or(f64::NAN))),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Variable(name) => ctx
            .variable(name)
            .cloned()
            .ok_or_else(|| CoreError::UndefinedVariable { name: name.clone() }),
        Expr::FunctionCall { name, args } => eval_call(name, args, ctx),
        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, ctx)?;
            Ok(match op {
                Some(UnaryOp::Not) => Value::Bool(!value.is_truthy()),
                Some(UnaryOp::BitNot) => Value::Number(f64::from(!value.to_int32())),
                Some(UnaryOp::Neg) => Value::Number(-value.to_number()),
                None => value,
            })
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, ctx),
    }
}

fn eval_call(name: &str, args: &[Expr], ctx: &mut ExecutionContext) -> Result<Value, CoreError> {
    if ctx.function(name).is_none() {
        return Err(CoreError::UndefinedFunction {
            name: name.to_string(),
        });
    }

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_expr(arg, ctx)?);
    }

    // Registry is read-only during evaluation; the function is still here.
    match ctx.function(name) {
        Some(function) => Ok(function(&values)),
        None => Err(CoreError::UndefinedFunction {
            name: name.to_string(),
        }),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &mut ExecutionContext,
) -> Result<Value, CoreError> {
    // Logical operators short-circuit and return the deciding operand
    // value itself, not a boolean.
    match op {
        BinaryOp::And => {
            let lhs = eval_expr(left, ctx)?;
            if !lhs.is_truthy() {
                return Ok(lhs);
            }
            return eval_expr(right, ctx);
        }
        BinaryOp::Or => {
            let lhs = eval_expr(left, ctx)?;
            if lhs.is_truthy() {
                return Ok(lhs);
            }
            return eval_expr(right, ctx);
        }
        _ => {}
    }

    let lhs = eval_expr(left, ctx)?;
    let rhs = eval_expr(right, ctx)?;

    Ok(match op {
        BinaryOp::Add => Value::Number(lhs.to_number() + rhs.to_number()),
        BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        BinaryOp::Eq => Value::Bool(lhs.loose_eq(&rhs)),
        BinaryOp::Ne => Value::Bool(!lhs.loose_eq(&rhs)),
        BinaryOp::Lt => Value::Bool(lhs.loose_lt(&rhs)),
        BinaryOp::Gt => Value::Bool(lhs.loose_gt(&rhs)),
        BinaryOp::Le => Value::Bool(lhs.loose_le(&rhs)),
        BinaryOp::Ge => Value::Bool(lhs.loose_ge(&rhs)),
        BinaryOp::BitAnd => Value::Number(f64::from(lhs.to_int32() & rhs.to_int32())),
        BinaryOp::BitOr => Value::Number(f64::from(lhs.to_int32() | rhs.to_int32())),
        BinaryOp::BitXor => Value::Number(f64::from(lhs.to_int32() ^ rhs.to_int32())),
        BinaryOp::Shl => {
            Value::Number(f64::from(lhs.to_int32().wrapping_shl(rhs.to_uint32() & 31)))
        }
        // Zero-fill right shift on the unsigned view; a negative left
        // operand comes out large and positive.
        BinaryOp::Shr => Value::Number(f64::from(lhs.to_uint32() >> (rhs.to_uint32() & 31))),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    })
}

/// Compiles and evaluates `source` against `ctx`.
pub fn run(source: &str, ctx: &mut ExecutionContext) -> Result<Value, CoreError> {
    tracing::trace!(source, "running program");
    let tokens = tokenize(source)?;
    let statements = parse(&tokens)?;
    execute(&statements, ctx)
}

/// Checks that `source` is a well-formed transition condition: it must
/// lex and parse, and no top-level statement may be an assignment.
/// Conditions are not evaluated here.
pub fn run_condition(source: &str) -> Result<(), CoreError> {
    let tokens = tokenize(source)?;
    let statements = parse(&tokens)?;

    for statement in &statements {
        if matches!(statement, Statement::Assignment { .. }) {
            return Err(CoreError::AssignmentInCondition);
        }
    }

    Ok(())
}
