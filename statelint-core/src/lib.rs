//! # statelint-core
//!
//! Expression language and validator for visual state machine diagrams.
//!
//! This crate provides:
//! - Lexing and parsing of the embedded expression language
//! - A tree-walking interpreter with host-compatible coercion rules
//! - The state machine graph model
//! - Truth-table based structural validation
//! - Editor analyses (output dependency checks, input width inference)

pub mod analysis;
pub mod ast;
pub mod context;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod machine;
pub mod parser;
pub mod validator;
pub mod value;

pub use analysis::{check_output_logic, infer_input_widths, OutputAssignment};
pub use context::{ExecutionContext, HostFunction, InputWidth, OutputDecl};
pub use error::CoreError;
pub use interpreter::{execute, run, run_condition};
pub use lexer::{tokenize, Token, TokenKind};
pub use machine::{PortDecl, Reset, StateId, StateMachine, StateMachineRaw, StateNode, Transition};
pub use parser::parse;
pub use validator::{validate, ValidationIssue, ValidationReport};
pub use value::Value;
