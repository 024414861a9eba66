//! Core error types.

use thiserror::Error;

/// Errors from the expression toolchain and machine loading.
///
/// Lexing, parsing and evaluation are all fatal within a single call:
/// the first error aborts the pipeline and surfaces to the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid character '{character}' at {line}:{column}")]
    Lex {
        line: usize,
        column: usize,
        character: char,
    },

    #[error("syntax error at {line}:{column} near \"{found}\": expected {expected}")]
    Syntax {
        line: usize,
        column: usize,
        found: String,
        expected: String,
    },

    #[error("variable '{name}' does not exist")]
    UndefinedVariable { name: String },

    #[error("function '{name}' is not defined")]
    UndefinedFunction { name: String },

    #[error("assignment is not allowed in a transition condition")]
    AssignmentInCondition,

    #[error("output '{output}' depends on input '{input}'")]
    OutputDependsOnInput { output: String, input: String },

    #[error("invalid machine: {reason}")]
    InvalidMachine { reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns an error code suitable for tool output.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Lex { .. } => "LEX_ERROR",
            CoreError::Syntax { .. } => "SYNTAX_ERROR",
            CoreError::UndefinedVariable { .. } => "UNDEFINED_VARIABLE",
            CoreError::UndefinedFunction { .. } => "UNDEFINED_FUNCTION",
            CoreError::AssignmentInCondition => "ASSIGNMENT_IN_CONDITION",
            CoreError::OutputDependsOnInput { .. } => "OUTPUT_DEPENDS_ON_INPUT",
            CoreError::InvalidMachine { .. } => "INVALID_MACHINE",
            CoreError::Json(_) => "INVALID_JSON",
        }
    }
}
