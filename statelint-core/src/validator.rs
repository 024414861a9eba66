//! Structural validation of a state machine.
//!
//! `validate` runs a fixed pipeline of rules over the machine: reset
//! legality, state-name uniqueness, output soundness, then an exhaustive
//! truth table resolving every (state, input combination) row against the
//! transition conditions. The first violated rule becomes the report's
//! single issue; later rules are not evaluated. Callers relying on issue
//! ordering get the same answer for the same machine every time because
//! states, transitions and rows are always walked in declaration order.

use crate::ast::{Expr, Statement};
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::interpreter;
use crate::lexer;
use crate::machine::{StateId, StateMachine};
use crate::parser;
use crate::value::Value;
use std::collections::BTreeMap;

/// Outcome of a `validate` call. `issues` holds at most one entry.
#[derive(Debug)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// A violated structural rule.
#[derive(Debug, thiserror::Error)]
pub enum ValidationIssue {
    #[error("missing reset logic: need at least one reset")]
    MissingReset,

    #[error("bad reset logic: {count} resets, at most 2 allowed")]
    TooManyResets { count: usize },

    #[error("bad reset logic: both resets are {kind}")]
    ResetsSameKind { kind: &'static str },

    #[error("two states share the name '{name}'")]
    DuplicateStateName { name: String },

    #[error("{site} assigns output '{output}' not declared by the machine")]
    UndeclaredOutput { site: String, output: String },

    #[error("{site} assigns output '{output}' needing {needed} bits, declared width is {declared}")]
    OutputTooWide {
        site: String,
        output: String,
        needed: u32,
        declared: u32,
    },

    #[error("states '{first}' and '{second}' produce the same output vector")]
    ConflictingOutputs { first: String, second: String },

    #[error("indeterminate transitions: two transitions from state '{state}' match the same inputs")]
    IndeterminateTransitions { state: String },

    #[error("transition into state '{state}' writes output '{output}' the state also writes")]
    TransitionOutputClash { state: String, output: String },

    #[error("incomplete transitions: state '{state}' has no transition for some input combination")]
    IncompleteTransitions { state: String },

    #[error("stuck state: '{state}' only ever transitions to itself")]
    StuckState { state: String },

    #[error("declared inputs total {total} bits, truth table supports at most {max}")]
    InputsTooWide { total: u64, max: u32 },

    #[error("expression error: {0}")]
    Expression(#[from] CoreError),
}

impl ValidationIssue {
    /// Stable machine-readable issue code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationIssue::MissingReset => "MISSING_RESET",
            ValidationIssue::TooManyResets { .. } => "TOO_MANY_RESETS",
            ValidationIssue::ResetsSameKind { .. } => "RESETS_SAME_KIND",
            ValidationIssue::DuplicateStateName { .. } => "DUPLICATE_STATE_NAME",
            ValidationIssue::UndeclaredOutput { .. } => "UNDECLARED_OUTPUT",
            ValidationIssue::OutputTooWide { .. } => "OUTPUT_TOO_WIDE",
            ValidationIssue::ConflictingOutputs { .. } => "CONFLICTING_OUTPUTS",
            ValidationIssue::IndeterminateTransitions { .. } => "INDETERMINATE_TRANSITIONS",
            ValidationIssue::TransitionOutputClash { .. } => "TRANSITION_OUTPUT_CLASH",
            ValidationIssue::IncompleteTransitions { .. } => "INCOMPLETE_TRANSITIONS",
            ValidationIssue::StuckState { .. } => "STUCK_STATE",
            ValidationIssue::InputsTooWide { .. } => "INPUTS_TOO_WIDE",
            ValidationIssue::Expression(_) => "EXPRESSION_ERROR",
        }
    }
}

/// One truth-table row: a state paired with one concrete input assignment.
/// `to` is filled in as transitions claim rows.
#[derive(Debug)]
struct Row {
    state: StateId,
    inputs: Vec<(String, u64)>,
    to: Option<StateId>,
}

/// Validates the machine. Never fails; the first violated rule is
/// returned as the report's only issue.
pub fn validate(machine: &StateMachine) -> ValidationReport {
    match run_rules(machine) {
        Ok(()) => ValidationReport {
            valid: true,
            issues: Vec::new(),
        },
        Err(issue) => {
            tracing::debug!(code = issue.code(), issue = %issue, "validation failed");
            ValidationReport {
                valid: false,
                issues: vec![issue],
            }
        }
    }
}

fn run_rules(machine: &StateMachine) -> Result<(), ValidationIssue> {
    check_resets(machine)?;
    check_state_names(machine)?;
    check_table_width(machine)?;

    let mut table = build_table(machine);
    tracing::debug!(
        states = machine.states().count(),
        rows = table.len(),
        "truth table built"
    );

    check_state_outputs(machine)?;
    resolve_transitions(machine, &mut table)?;
    resolve_else_fallbacks(machine, &mut table)?;
    check_coverage(machine, &table)
}

fn check_resets(machine: &StateMachine) -> Result<(), ValidationIssue> {
    let resets = machine.resets();
    if resets.is_empty() {
        return Err(ValidationIssue::MissingReset);
    }
    if resets.len() == 2 && resets[0].synchronous == resets[1].synchronous {
        let kind = if resets[0].synchronous {
            "synchronous"
        } else {
            "asynchronous"
        };
        return Err(ValidationIssue::ResetsSameKind { kind });
    }
    if resets.len() > 2 {
        return Err(ValidationIssue::TooManyResets {
            count: resets.len(),
        });
    }
    Ok(())
}

fn check_state_names(machine: &StateMachine) -> Result<(), ValidationIssue> {
    let mut seen: BTreeMap<&str, StateId> = BTreeMap::new();
    for (id, state) in machine.states() {
        let name = state.name.trim();
        if seen.insert(name, id).is_some() {
            return Err(ValidationIssue::DuplicateStateName {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Hard cap on the summed declared input widths: the table materializes
/// `2^total` rows per state, so anything wider is rejected before the
/// row count is computed.
const MAX_TOTAL_INPUT_WIDTH: u32 = 16;

fn check_table_width(machine: &StateMachine) -> Result<(), ValidationIssue> {
    let total: u64 = machine.inputs().iter().map(|p| u64::from(p.width)).sum();
    if total > u64::from(MAX_TOTAL_INPUT_WIDTH) {
        return Err(ValidationIssue::InputsTooWide {
            total,
            max: MAX_TOTAL_INPUT_WIDTH,
        });
    }
    Ok(())
}

/// Materializes one row per (state, input combination). Rows are grouped
/// by state in declaration order; within a state the first declared
/// input varies fastest. With no inputs each state gets a single row.
fn build_table(machine: &StateMachine) -> Vec<Row> {
    let inputs = machine.inputs();
    let total_width: u32 = inputs.iter().map(|p| p.width).sum();
    let row_count: u64 = 1 << total_width;

    let mut table = Vec::new();
    for (id, _) in machine.states() {
        for i in 0..row_count {
            let mut values = Vec::with_capacity(inputs.len());
            let mut shift = 0u32;
            for port in inputs {
                let mask = (1u64 << port.width) - 1;
                values.push((port.name.clone(), (i >> shift) & mask));
                shift += port.width;
            }
            table.push(Row {
                state: id,
                inputs: values,
                to: None,
            });
        }
    }
    table
}

/// Runs an output-expression source and collects the literal values it
/// assigns, keyed by output name. Non-literal assignments contribute
/// nothing to the vector.
fn output_vector(source: &str) -> Result<BTreeMap<String, Value>, CoreError> {
    let tokens = lexer::tokenize(source)?;
    let statements = parser::parse(&tokens)?;

    let mut vector = BTreeMap::new();
    for statement in &statements {
        if let Statement::Assignment { name, expr } = statement {
            let value = match expr {
                Expr::Number(text) => Value::Number(Value::Str(text.clone()).to_number()),
                Expr::Str(text) => Value::Str(text.clone()),
                Expr::Bool(b) => Value::Bool(*b),
                _ => continue,
            };
            vector.insert(name.clone(), value);
        }
    }
    Ok(vector)
}

fn vector_to_json(vector: &BTreeMap<String, Value>) -> String {
    let map: serde_json::Map<String, serde_json::Value> = vector
        .iter()
        .map(|(name, value)| {
            let json = match value {
                Value::Number(n) => serde_json::json!(n),
                Value::Bool(b) => serde_json::json!(b),
                Value::Str(s) => serde_json::json!(s),
                Value::Null => serde_json::Value::Null,
            };
            (name.clone(), json)
        })
        .collect();
    serde_json::Value::Object(map).to_string()
}

/// Checks every name in `vector` against the machine's declared outputs.
fn check_vector_fits(
    machine: &StateMachine,
    site: &str,
    vector: &BTreeMap<String, Value>,
) -> Result<(), ValidationIssue> {
    for (name, value) in vector {
        let declared = machine.output_width(name).ok_or_else(|| {
            ValidationIssue::UndeclaredOutput {
                site: site.to_string(),
                output: name.clone(),
            }
        })?;
        let needed = value.bit_width();
        if declared < needed {
            return Err(ValidationIssue::OutputTooWide {
                site: site.to_string(),
                output: name.clone(),
                needed,
                declared,
            });
        }
    }
    Ok(())
}

/// Output soundness: every state's literal output vector must fit the
/// machine's declarations, and no two states may produce the same
/// non-empty vector.
fn check_state_outputs(machine: &StateMachine) -> Result<(), ValidationIssue> {
    let mut seen: BTreeMap<String, StateId> = BTreeMap::new();
    for (id, state) in machine.states() {
        let vector = output_vector(&state.output)?;
        check_vector_fits(machine, &format!("state '{}'", state.name), &vector)?;

        if vector.is_empty() {
            continue;
        }
        let key = vector_to_json(&vector);
        if let Some(&other) = seen.get(&key) {
            return Err(ValidationIssue::ConflictingOutputs {
                first: machine.state(other).name.clone(),
                second: state.name.clone(),
            });
        }
        seen.insert(key, id);
    }
    Ok(())
}

fn row_context(row: &Row) -> ExecutionContext {
    let mut ctx = ExecutionContext::new();
    for (name, value) in &row.inputs {
        ctx.set_variable(name.clone(), Value::Number(*value as f64));
    }
    ctx
}

/// Names assigned by running an expression source in a fresh context.
fn assigned_names(source: &str) -> Result<Vec<String>, CoreError> {
    let mut ctx = ExecutionContext::new();
    interpreter::run(source, &mut ctx)?;
    Ok(ctx.variables.into_keys().collect())
}

/// Pass 1: transitions in declaration order claim the rows their
/// condition is truthy on. A row claimed twice is a determinism conflict.
fn resolve_transitions(
    machine: &StateMachine,
    table: &mut [Row],
) -> Result<(), ValidationIssue> {
    for transition in machine.transitions() {
        for row in table.iter_mut() {
            if row.state != transition.from {
                continue;
            }
            let mut ctx = row_context(row);
            let result = interpreter::run(&transition.condition, &mut ctx)?;
            if !result.is_truthy() || result.is_else_sentinel() {
                continue;
            }

            if row.to.is_some() {
                return Err(ValidationIssue::IndeterminateTransitions {
                    state: machine.state(row.state).name.clone(),
                });
            }
            row.to = Some(transition.to);

            if let Some(output) = &transition.output {
                let destination = machine.state(transition.to);
                let vector = output_vector(output)?;
                let site = format!(
                    "transition '{}' -> '{}'",
                    machine.state(transition.from).name,
                    destination.name
                );
                check_vector_fits(machine, &site, &vector)?;

                let transition_writes = assigned_names(output)?;
                let state_writes = assigned_names(&destination.output)?;
                for name in &transition_writes {
                    if state_writes.contains(name) {
                        return Err(ValidationIssue::TransitionOutputClash {
                            state: destination.name.clone(),
                            output: name.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Pass 2: the first transition whose condition yields the `else`
/// sentinel claims every still-unclaimed row of its source state.
fn resolve_else_fallbacks(
    machine: &StateMachine,
    table: &mut [Row],
) -> Result<(), ValidationIssue> {
    for transition in machine.transitions() {
        for row in table.iter_mut() {
            if row.state != transition.from || row.to.is_some() {
                continue;
            }
            let mut ctx = row_context(row);
            let result = interpreter::run(&transition.condition, &mut ctx)?;
            if result.is_else_sentinel() {
                row.to = Some(transition.to);
            }
        }
    }
    Ok(())
}

/// Completeness and stuck checks over the resolved table. A state that
/// claimed some but not all of its rows is incomplete; a state whose
/// every row points back to itself can never leave.
fn check_coverage(machine: &StateMachine, table: &[Row]) -> Result<(), ValidationIssue> {
    let mut has_any: BTreeMap<StateId, bool> = BTreeMap::new();
    for row in table {
        if row.to.is_some() {
            has_any.insert(row.state, true);
        }
    }

    let mut stuck: BTreeMap<StateId, bool> =
        machine.states().map(|(id, _)| (id, true)).collect();

    for row in table {
        if has_any.get(&row.state).copied().unwrap_or(false) && row.to.is_none() {
            return Err(ValidationIssue::IncompleteTransitions {
                state: machine.state(row.state).name.clone(),
            });
        }
        if row.to != Some(row.state) {
            stuck.insert(row.state, false);
        }
    }

    for (id, _) in machine.states() {
        if stuck.get(&id).copied().unwrap_or(false) {
            return Err(ValidationIssue::StuckState {
                state: machine.state(id).name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reset to S0, 1-bit input `in`, S0 -> S1 on `in == 1;`, self loops
    /// otherwise. The smallest machine that validates cleanly.
    fn valid_machine() -> StateMachine {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "out = 0;");
        let s1 = machine.add_state("S1", "out = 1;");
        machine.add_reset(s0, true);
        machine.declare_input("in", 1);
        machine.declare_output("out", 1);
        machine.add_transition(s0, s1, "in == 1;", None);
        machine.add_transition(s0, s0, "else;", None);
        machine.add_transition(s1, s0, "in == 0;", None);
        machine.add_transition(s1, s1, "else;", None);
        machine
    }

    #[test]
    fn test_valid_machine_passes() {
        let report = validate(&valid_machine());
        assert!(report.valid, "issues: {:?}", report.issues);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_rows_resolve_to_expected_states() {
        let machine = valid_machine();
        let mut table = build_table(&machine);
        resolve_transitions(&machine, &mut table).unwrap();
        resolve_else_fallbacks(&machine, &mut table).unwrap();

        // S0 rows: in=0 stays (else), in=1 goes to S1.
        assert_eq!(table[0].inputs, vec![("in".to_string(), 0)]);
        assert_eq!(table[0].to, Some(StateId(0)));
        assert_eq!(table[1].inputs, vec![("in".to_string(), 1)]);
        assert_eq!(table[1].to, Some(StateId(1)));
    }

    #[test]
    fn test_missing_reset() {
        let mut machine = StateMachine::new();
        machine.add_state("S0", "");
        let report = validate(&machine);
        assert!(!report.valid);
        assert_eq!(report.issues[0].code(), "MISSING_RESET");
    }

    #[test]
    fn test_two_synchronous_resets() {
        let mut machine = valid_machine();
        machine.add_reset(StateId(0), true);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "RESETS_SAME_KIND");
        assert!(report.issues[0].to_string().contains("synchronous"));
    }

    #[test]
    fn test_opposite_resets_allowed() {
        let mut machine = valid_machine();
        machine.add_reset(StateId(0), false);
        assert!(validate(&machine).valid);
    }

    #[test]
    fn test_three_resets() {
        let mut machine = valid_machine();
        machine.add_reset(StateId(0), false);
        machine.add_reset(StateId(1), true);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "TOO_MANY_RESETS");
    }

    #[test]
    fn test_duplicate_state_name_trimmed() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        machine.add_state("  S0 ", "");
        machine.add_reset(s0, true);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "DUPLICATE_STATE_NAME");
    }

    #[test]
    fn test_undeclared_output() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "led = 1;");
        machine.add_reset(s0, true);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "UNDECLARED_OUTPUT");
    }

    #[test]
    fn test_output_too_wide() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "out = 5;");
        machine.add_reset(s0, true);
        machine.declare_output("out", 2);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "OUTPUT_TOO_WIDE");
    }

    #[test]
    fn test_conflicting_output_vectors() {
        let mut machine = valid_machine();
        machine.add_state("S2", "out = 1;");
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "CONFLICTING_OUTPUTS");
    }

    #[test]
    fn test_empty_vectors_never_conflict() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        let s1 = machine.add_state("S1", "");
        machine.add_reset(s0, true);
        machine.add_transition(s0, s1, "else;", None);
        machine.add_transition(s1, s0, "else;", None);
        assert!(validate(&machine).valid);
    }

    #[test]
    fn test_indeterminate_transitions() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        let s1 = machine.add_state("S1", "");
        machine.add_reset(s0, true);
        machine.declare_input("in", 1);
        machine.add_transition(s0, s1, "in == 1;", None);
        machine.add_transition(s0, s0, "in >= 1;", None);
        machine.add_transition(s1, s0, "else;", None);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "INDETERMINATE_TRANSITIONS");
    }

    #[test]
    fn test_incomplete_transitions() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        let s1 = machine.add_state("S1", "");
        machine.add_reset(s0, true);
        machine.declare_input("in", 1);
        machine.add_transition(s0, s1, "in == 1;", None);
        machine.add_transition(s1, s0, "else;", None);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "INCOMPLETE_TRANSITIONS");
    }

    #[test]
    fn test_stuck_state() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        let s1 = machine.add_state("S1", "");
        machine.add_reset(s0, true);
        machine.add_transition(s0, s1, "else;", None);
        machine.add_transition(s1, s1, "else;", None);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "STUCK_STATE");
        assert!(report.issues[0].to_string().contains("S1"));
    }

    #[test]
    fn test_transition_output_clash() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        let s1 = machine.add_state("S1", "out = 1;");
        machine.add_reset(s0, true);
        machine.declare_output("out", 1);
        machine.add_transition(s0, s1, "1 == 1;", Some("out = 1;".to_string()));
        machine.add_transition(s1, s0, "else;", None);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "TRANSITION_OUTPUT_CLASH");
    }

    #[test]
    fn test_transition_output_without_clash() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        let s1 = machine.add_state("S1", "out = 1;");
        machine.add_reset(s0, true);
        machine.declare_output("out", 1);
        machine.declare_output("pulse", 1);
        machine.add_transition(s0, s1, "1 == 1;", Some("pulse = 1;".to_string()));
        machine.add_transition(s1, s0, "else;", None);
        assert!(validate(&machine).valid);
    }

    #[test]
    fn test_condition_error_becomes_issue() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        machine.add_reset(s0, true);
        machine.add_transition(s0, s0, "missing == 1;", None);
        let report = validate(&machine);
        assert!(!report.valid);
        assert_eq!(report.issues[0].code(), "EXPRESSION_ERROR");
    }

    #[test]
    fn test_input_wider_than_table_cap() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        machine.add_reset(s0, true);
        machine.declare_input("in", 64);
        machine.add_transition(s0, s0, "else;", None);
        let report = validate(&machine);
        assert!(!report.valid);
        assert_eq!(report.issues[0].code(), "INPUTS_TOO_WIDE");
    }

    #[test]
    fn test_input_widths_sum_against_cap() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        machine.add_reset(s0, true);
        machine.declare_input("a", 10);
        machine.declare_input("b", 10);
        let report = validate(&machine);
        assert_eq!(report.issues[0].code(), "INPUTS_TOO_WIDE");
    }

    #[test]
    fn test_input_width_at_cap_allowed() {
        let mut machine = StateMachine::new();
        let s0 = machine.add_state("S0", "");
        machine.add_reset(s0, true);
        machine.declare_input("in", MAX_TOTAL_INPUT_WIDTH);
        assert!(validate(&machine).valid);
    }

    #[test]
    fn test_first_declared_input_varies_fastest() {
        let mut machine = StateMachine::new();
        machine.add_state("S0", "");
        machine.declare_input("a", 1);
        machine.declare_input("b", 1);
        let table = build_table(&machine);

        let values: Vec<(u64, u64)> = table
            .iter()
            .map(|row| (row.inputs[0].1, row.inputs[1].1))
            .collect();
        assert_eq!(values, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_first_failure_reports_single_issue() {
        // Missing reset AND duplicate names: only the reset issue surfaces.
        let mut machine = StateMachine::new();
        machine.add_state("S0", "");
        machine.add_state("S0", "");
        let report = validate(&machine);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].code(), "MISSING_RESET");
    }
}
