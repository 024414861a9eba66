//! Backtracking recursive-descent parser.
//!
//! The grammar is tried top-down with explicit checkpoints: every
//! sequence and every alternative runs under its own saved cursor
//! position and rewinds completely on failure, so rules compose without
//! consuming tokens they did not match. Binary expression layers parse
//! one operand plus a flat `(operator, operand)` tail and fold it
//! left-associatively.
//!
//! Precedence, loosest to tightest: logic/bitwise (`&&` `||` `&` `|` `^`),
//! equality, relational, shift, additive, unary, factor.

use crate::ast::{BinaryOp, Expr, Statement, UnaryOp};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind};

/// Cursor over the token list with a save/restore position stack.
struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    saved: Vec<usize>,
}

impl<'a> TokenCursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            saved: Vec::new(),
        }
    }

    fn has_next(&self) -> bool {
        self.pos < self.tokens.len()
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn last_token(&self) -> Option<&'a Token> {
        self.tokens.last()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn push_state(&mut self) {
        self.saved.push(self.pos);
    }

    /// Commits the innermost checkpoint.
    fn pop_state(&mut self) {
        self.saved.pop();
    }

    /// Rewinds to the innermost checkpoint.
    fn restore_state(&mut self) {
        if let Some(pos) = self.saved.pop() {
            self.pos = pos;
        }
    }

    fn depth(&self) -> usize {
        self.saved.len()
    }
}

/// Runs `rule` under its own checkpoint: commit on match, rewind on
/// failure. Every combinator below builds on this.
fn attempt<T>(
    cursor: &mut TokenCursor<'_>,
    rule: impl FnOnce(&mut TokenCursor<'_>) -> Option<T>,
) -> Option<T> {
    cursor.push_state();
    match rule(cursor) {
        Some(value) => {
            cursor.pop_state();
            Some(value)
        }
        None => {
            cursor.restore_state();
            None
        }
    }
}

/// Consumes the current token iff its kind (and text, when given) matches.
fn terminal(cursor: &mut TokenCursor<'_>, kind: TokenKind, text: Option<&str>) -> Option<Token> {
    let token = cursor.peek()?;
    if token.kind != kind {
        return None;
    }
    if let Some(text) = text {
        if token.text != text {
            return None;
        }
    }
    let token = token.clone();
    cursor.advance();
    Some(token)
}

/// Collects `rule` matches until it fails; succeeds only with at least
/// `min` matches, rewinding past the whole repetition otherwise.
fn repeat_min<T>(
    cursor: &mut TokenCursor<'_>,
    min: usize,
    mut rule: impl FnMut(&mut TokenCursor<'_>) -> Option<T>,
) -> Option<Vec<T>> {
    cursor.push_state();
    let mut results = Vec::new();

    while let Some(value) = attempt(cursor, &mut rule) {
        results.push(value);
    }

    if results.len() < min {
        cursor.restore_state();
        None
    } else {
        cursor.pop_state();
        Some(results)
    }
}

/// Parses a full program: statements consumed greedily until the tokens
/// are exhausted; any unmatched remainder is a syntax error.
pub fn parse(tokens: &[Token]) -> Result<Vec<Statement>, CoreError> {
    let mut cursor = TokenCursor::new(tokens);
    let mut statements = Vec::new();

    while cursor.has_next() {
        match statement(&mut cursor) {
            Some(stmt) => {
                // Checkpoints must balance out after every statement.
                debug_assert_eq!(cursor.depth(), 0);
                statements.push(stmt);
            }
            None => {
                let token = cursor.peek().or_else(|| cursor.last_token());
                return Err(syntax_error(token));
            }
        }
    }

    Ok(statements)
}

fn syntax_error(token: Option<&Token>) -> CoreError {
    let expected = "an assignment, function call or an if statement".to_string();
    match token {
        Some(token) => CoreError::Syntax {
            line: token.line,
            column: token.column,
            found: token.text.clone(),
            expected,
        },
        None => CoreError::Syntax {
            line: 0,
            column: 0,
            found: String::new(),
            expected,
        },
    }
}

/// Statement := ElseStmt | Condition | IfStmt | Assignment | FunctionStmt
///
/// Alternative order matters: `f();` matches Condition (a call is an
/// expression factor), so FunctionStmt only catches what Condition cannot.
fn statement(cursor: &mut TokenCursor<'_>) -> Option<Statement> {
    if let Some(stmt) = else_statement(cursor) {
        return Some(stmt);
    }
    if let Some(stmt) = condition_statement(cursor) {
        return Some(stmt);
    }
    if let Some(stmt) = if_statement(cursor) {
        return Some(stmt);
    }
    if let Some(stmt) = assignment_statement(cursor) {
        return Some(stmt);
    }
    function_statement(cursor)
}

fn else_statement(cursor: &mut TokenCursor<'_>) -> Option<Statement> {
    attempt(cursor, |cursor| {
        terminal(cursor, TokenKind::Keyword, Some("else"))?;
        terminal(cursor, TokenKind::EndOfLine, None)?;
        Some(Statement::ElseMarker)
    })
}

fn condition_statement(cursor: &mut TokenCursor<'_>) -> Option<Statement> {
    attempt(cursor, |cursor| {
        let expr = expression(cursor)?;
        terminal(cursor, TokenKind::EndOfLine, None)?;
        Some(Statement::Condition(expr))
    })
}

fn if_statement(cursor: &mut TokenCursor<'_>) -> Option<Statement> {
    attempt(cursor, |cursor| {
        terminal(cursor, TokenKind::Keyword, Some("if"))?;
        terminal(cursor, TokenKind::ParenStart, None)?;
        let condition = expression(cursor)?;
        terminal(cursor, TokenKind::ParenEnd, None)?;
        let body = block(cursor)?;
        Some(Statement::If { condition, body })
    })
}

fn block(cursor: &mut TokenCursor<'_>) -> Option<Vec<Statement>> {
    attempt(cursor, |cursor| {
        terminal(cursor, TokenKind::BlockStart, None)?;
        let statements = repeat_min(cursor, 0, statement)?;
        terminal(cursor, TokenKind::BlockEnd, None)?;
        Some(statements)
    })
}

fn assignment_statement(cursor: &mut TokenCursor<'_>) -> Option<Statement> {
    attempt(cursor, |cursor| {
        let name = terminal(cursor, TokenKind::Name, None)?;
        terminal(cursor, TokenKind::Operator, Some("="))?;
        let expr = expression(cursor)?;
        terminal(cursor, TokenKind::EndOfLine, None)?;
        Some(Statement::Assignment {
            name: name.text,
            expr,
        })
    })
}

fn function_statement(cursor: &mut TokenCursor<'_>) -> Option<Statement> {
    attempt(cursor, |cursor| {
        let (name, args) = function_expression(cursor)?;
        terminal(cursor, TokenKind::EndOfLine, None)?;
        Some(Statement::FunctionCall { name, args })
    })
}

/// FunctionExpr := Name '(' (Expr (',' Expr)*)? ')'
fn function_expression(cursor: &mut TokenCursor<'_>) -> Option<(String, Vec<Expr>)> {
    attempt(cursor, |cursor| {
        let name = terminal(cursor, TokenKind::Name, None)?;
        terminal(cursor, TokenKind::ParenStart, None)?;
        let args = attempt(cursor, function_parameters).unwrap_or_default();
        terminal(cursor, TokenKind::ParenEnd, None)?;
        Some((name.text, args))
    })
}

fn function_parameters(cursor: &mut TokenCursor<'_>) -> Option<Vec<Expr>> {
    attempt(cursor, |cursor| {
        let first = expression(cursor)?;
        let rest = repeat_min(cursor, 0, |cursor| {
            attempt(cursor, |cursor| {
                terminal(cursor, TokenKind::Comma, None)?;
                expression(cursor)
            })
        })?;

        let mut args = vec![first];
        args.extend(rest);
        Some(args)
    })
}

/// Consumes an operator token whose text is one of `ops`.
fn operator_of(cursor: &mut TokenCursor<'_>, ops: &[&str]) -> Option<BinaryOp> {
    let token = cursor.peek()?;
    if token.kind != TokenKind::Operator || !ops.contains(&token.text.as_str()) {
        return None;
    }
    let op = BinaryOp::from_text(&token.text)?;
    cursor.advance();
    Some(op)
}

/// One left-associative precedence layer:
/// `layer := next ((op) next)*`, folded left-to-right.
fn binary_layer(
    cursor: &mut TokenCursor<'_>,
    ops: &[&str],
    next: fn(&mut TokenCursor<'_>) -> Option<Expr>,
) -> Option<Expr> {
    attempt(cursor, |cursor| {
        let left = next(cursor)?;
        let rest = repeat_min(cursor, 0, |cursor| {
            attempt(cursor, |cursor| {
                let op = operator_of(cursor, ops)?;
                let right = next(cursor)?;
                Some((op, right))
            })
        })?;
        Some(Expr::fold_binary(left, rest))
    })
}

fn expression(cursor: &mut TokenCursor<'_>) -> Option<Expr> {
    binary_layer(cursor, &["&&", "||", "&", "|", "^"], equality)
}

fn equality(cursor: &mut TokenCursor<'_>) -> Option<Expr> {
    binary_layer(cursor, &["==", "!="], relational)
}

fn relational(cursor: &mut TokenCursor<'_>) -> Option<Expr> {
    binary_layer(cursor, &["<", ">", "<=", ">="], shift)
}

fn shift(cursor: &mut TokenCursor<'_>) -> Option<Expr> {
    binary_layer(cursor, &["<<", ">>"], additive)
}

fn additive(cursor: &mut TokenCursor<'_>) -> Option<Expr> {
    binary_layer(cursor, &["+", "-"], unary)
}

fn unary(cursor: &mut TokenCursor<'_>) -> Option<Expr> {
    attempt(cursor, |cursor| {
        let op = attempt(cursor, unary_operator);
        let operand = factor(cursor)?;
        match op {
            Some(op) => Some(Expr::Unary {
                op: Some(op),
                operand: Box::new(operand),
            }),
            None => Some(operand),
        }
    })
}

fn unary_operator(cursor: &mut TokenCursor<'_>) -> Option<UnaryOp> {
    let token = cursor.peek()?;
    if token.kind != TokenKind::Operator {
        return None;
    }
    let op = match token.text.as_str() {
        "!" => UnaryOp::Not,
        "~" => UnaryOp::BitNot,
        "-" => UnaryOp::Neg,
        _ => return None,
    };
    cursor.advance();
    Some(op)
}

/// Factor := '(' Expr ')' | FunctionExpr | Number | Name | String | Bool
fn factor(cursor: &mut TokenCursor<'_>) -> Option<Expr> {
    if let Some(expr) = group_expression(cursor) {
        return Some(expr);
    }
    if let Some((name, args)) = function_expression(cursor) {
        return Some(Expr::FunctionCall { name, args });
    }
    if let Some(token) = attempt(cursor, |c| terminal(c, TokenKind::Number, None)) {
        return Some(Expr::Number(token.text));
    }
    if let Some(token) = attempt(cursor, |c| terminal(c, TokenKind::Name, None)) {
        return Some(Expr::Variable(token.text));
    }
    if let Some(token) = attempt(cursor, |c| terminal(c, TokenKind::Str, None)) {
        return Some(Expr::Str(token.text));
    }
    if attempt(cursor, |c| terminal(c, TokenKind::Keyword, Some("true"))).is_some() {
        return Some(Expr::Bool(true));
    }
    if attempt(cursor, |c| terminal(c, TokenKind::Keyword, Some("false"))).is_some() {
        return Some(Expr::Bool(false));
    }
    None
}

fn group_expression(cursor: &mut TokenCursor<'_>) -> Option<Expr> {
    attempt(cursor, |cursor| {
        terminal(cursor, TokenKind::ParenStart, None)?;
        let expr = expression(cursor)?;
        terminal(cursor, TokenKind::ParenEnd, None)?;
        Some(expr)
    })
}
