//! State machine graph consumed by the validator.
//!
//! States live in an arena indexed by [`StateId`]; transitions and resets
//! are edges holding indices, so the graph has no ownership cycles.
//! Declaration order of states, transitions, resets and port
//! declarations is preserved everywhere - it decides which transition
//! claims a truth-table row first and is part of the observable contract.
//!
//! Machines can also be loaded from a JSON raw form where edges reference
//! states by name:
//!
//! ```json
//! {
//!   "inputs": [{"name": "in", "width": 1}],
//!   "outputs": [{"name": "out", "width": 2}],
//!   "states": [
//!     {"name": "S0", "output": "out = 1;"},
//!     {"name": "S1", "output": "out = 2;"}
//!   ],
//!   "transitions": [
//!     {"from": "S0", "to": "S1", "condition": "in == 1;"},
//!     {"from": "S0", "to": "S0", "condition": "else;"}
//!   ],
//!   "resets": [{"state": "S0", "synchronous": true}]
//! }
//! ```

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Arena index of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub usize);

/// A state and its combinational output expression source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateNode {
    pub name: String,

    /// Output-expression source text, e.g. `out = 1;`. May be empty.
    #[serde(default)]
    pub output: String,
}

/// A directed edge between two states, guarded by a condition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: StateId,
    pub to: StateId,

    /// Boolean guard source text, e.g. `in == 1;` or `else;`.
    pub condition: String,

    /// Optional Mealy-style output expression emitted on this edge.
    pub output: Option<String>,
}

/// A reset arrow pointing at its target state.
#[derive(Debug, Clone, Copy)]
pub struct Reset {
    pub target: StateId,
    pub synchronous: bool,
}

/// A declared input or output variable with its bit width.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
    pub width: u32,
}

/// The machine graph: a state arena plus edge lists and I/O declarations.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    states: Vec<StateNode>,
    transitions: Vec<Transition>,
    resets: Vec<Reset>,
    inputs: Vec<PortDecl>,
    outputs: Vec<PortDecl>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a state and returns its arena index.
    pub fn add_state(&mut self, name: impl Into<String>, output: impl Into<String>) -> StateId {
        self.states.push(StateNode {
            name: name.into(),
            output: output.into(),
        });
        StateId(self.states.len() - 1)
    }

    pub fn add_transition(
        &mut self,
        from: StateId,
        to: StateId,
        condition: impl Into<String>,
        output: Option<String>,
    ) {
        self.transitions.push(Transition {
            from,
            to,
            condition: condition.into(),
            output,
        });
    }

    pub fn add_reset(&mut self, target: StateId, synchronous: bool) {
        self.resets.push(Reset {
            target,
            synchronous,
        });
    }

    pub fn declare_input(&mut self, name: impl Into<String>, width: u32) {
        self.inputs.push(PortDecl {
            name: name.into(),
            width,
        });
    }

    pub fn declare_output(&mut self, name: impl Into<String>, width: u32) {
        self.outputs.push(PortDecl {
            name: name.into(),
            width,
        });
    }

    pub fn state(&self, id: StateId) -> &StateNode {
        &self.states[id.0]
    }

    pub fn states(&self) -> impl Iterator<Item = (StateId, &StateNode)> {
        self.states.iter().enumerate().map(|(i, s)| (StateId(i), s))
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn resets(&self) -> &[Reset] {
        &self.resets
    }

    pub fn inputs(&self) -> &[PortDecl] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PortDecl] {
        &self.outputs
    }

    /// Declared width of an output, if declared.
    pub fn output_width(&self, name: &str) -> Option<u32> {
        self.outputs.iter().find(|p| p.name == name).map(|p| p.width)
    }

    /// Loads a machine from its JSON raw form.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        let raw: StateMachineRaw = serde_json::from_value(json.clone())?;
        Self::from_raw(raw)
    }

    /// Resolves a raw definition's name references into arena indices.
    pub fn from_raw(raw: StateMachineRaw) -> Result<Self, CoreError> {
        let mut machine = StateMachine::new();

        for state in raw.states {
            machine.states.push(state);
        }

        let resolve = |name: &str| -> Result<StateId, CoreError> {
            machine
                .states
                .iter()
                .position(|s| s.name == name)
                .map(StateId)
                .ok_or_else(|| CoreError::InvalidMachine {
                    reason: format!("unknown state '{name}'"),
                })
        };

        let mut transitions = Vec::with_capacity(raw.transitions.len());
        for t in &raw.transitions {
            transitions.push(Transition {
                from: resolve(&t.from)?,
                to: resolve(&t.to)?,
                condition: t.condition.clone(),
                output: t.output.clone(),
            });
        }

        let mut resets = Vec::with_capacity(raw.resets.len());
        for r in &raw.resets {
            resets.push(Reset {
                target: resolve(&r.state)?,
                synchronous: r.synchronous,
            });
        }

        machine.transitions = transitions;
        machine.resets = resets;
        machine.inputs = raw.inputs;
        machine.outputs = raw.outputs;
        Ok(machine)
    }
}

/// Raw machine definition as stored/transmitted: edges reference states
/// by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachineRaw {
    #[serde(default)]
    pub inputs: Vec<PortDecl>,

    #[serde(default)]
    pub outputs: Vec<PortDecl>,

    pub states: Vec<StateNode>,

    #[serde(default)]
    pub transitions: Vec<TransitionRaw>,

    #[serde(default)]
    pub resets: Vec<ResetRaw>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRaw {
    pub from: String,
    pub to: String,
    pub condition: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRaw {
    pub state: String,
    pub synchronous: bool,
}
