//! Execution context: the binding environment expressions run against.

use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A host-provided callable exposed to the language.
pub type HostFunction = Box<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Declared bit width of an input variable. `known` is false when the
/// width was inferred from a failed probe rather than resolved exactly
/// (displayed as `b<?>` by editors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputWidth {
    pub width: u32,
    pub known: bool,
}

/// A declared output: its bit width and, once the editor has evaluated
/// the owning state's output expression, the literal value it assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    pub width: u32,
    pub value: Option<Value>,
}

/// The mutable environment a program executes against: variable
/// bindings, a read-only host function registry, and the machine's
/// declared input/output widths.
///
/// A context is created fresh per evaluation; only assignments (and the
/// validator's explicit probe seeding) mutate it.
#[derive(Default)]
pub struct ExecutionContext {
    pub variables: BTreeMap<String, Value>,
    functions: BTreeMap<String, HostFunction>,
    pub inputs: BTreeMap<String, InputWidth>,
    pub outputs: BTreeMap<String, OutputDecl>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host function under `name`.
    pub fn register_function(&mut self, name: impl Into<String>, function: HostFunction) {
        self.functions.insert(name.into(), function);
    }

    pub fn function(&self, name: &str) -> Option<&HostFunction> {
        self.functions.get(name)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn declare_input(&mut self, name: impl Into<String>, width: u32, known: bool) {
        self.inputs.insert(name.into(), InputWidth { width, known });
    }

    pub fn declare_output(&mut self, name: impl Into<String>, width: u32) {
        self.outputs.insert(name.into(), OutputDecl { width, value: None });
    }

    /// Records the literal value an output assigns. An undeclared name is
    /// declared with the value's bit length as its width.
    pub fn set_output_value(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.outputs.get_mut(&name) {
            Some(decl) => decl.value = Some(value),
            None => {
                self.outputs.insert(
                    name,
                    OutputDecl {
                        width: value.bit_width(),
                        value: Some(value),
                    },
                );
            }
        }
    }

    /// Narrow structural clone for probe evaluations: copies the variable
    /// and output bindings only, with each output's stored literal value
    /// overlaid onto the variables so conditions can read outputs by
    /// name. Host functions are deliberately absent so a probe cannot
    /// trigger host side effects.
    pub fn probe_snapshot(&self) -> ExecutionContext {
        let mut variables = self.variables.clone();
        for (name, decl) in &self.outputs {
            if let Some(value) = &decl.value {
                variables.insert(name.clone(), value.clone());
            }
        }
        ExecutionContext {
            variables,
            functions: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: self.outputs.clone(),
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("variables", &self.variables)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_snapshot_is_narrow() {
        let mut ctx = ExecutionContext::new();
        ctx.set_variable("a", Value::Number(1.0));
        ctx.declare_input("in", 2, true);
        ctx.declare_output("out", 4);
        ctx.register_function("f", Box::new(|_| Value::Null));

        let snapshot = ctx.probe_snapshot();
        assert_eq!(snapshot.variable("a"), Some(&Value::Number(1.0)));
        assert_eq!(snapshot.outputs.get("out").map(|d| d.width), Some(4));
        assert!(snapshot.function("f").is_none());
        assert!(snapshot.inputs.is_empty());
    }

    #[test]
    fn test_probe_snapshot_overlays_output_values() {
        let mut ctx = ExecutionContext::new();
        ctx.declare_output("out", 4);
        ctx.set_output_value("out", Value::Number(5.0));

        let snapshot = ctx.probe_snapshot();
        assert_eq!(snapshot.variable("out"), Some(&Value::Number(5.0)));
        // The live context's variables stay untouched.
        assert_eq!(ctx.variable("out"), None);
    }

    #[test]
    fn test_set_output_value_declares_undeclared_name() {
        let mut ctx = ExecutionContext::new();
        ctx.set_output_value("led", Value::Number(6.0));

        let decl = ctx.outputs.get("led").unwrap();
        assert_eq!(decl.width, 3);
        assert_eq!(decl.value, Some(Value::Number(6.0)));
    }

    #[test]
    fn test_snapshot_mutation_does_not_leak() {
        let mut ctx = ExecutionContext::new();
        ctx.set_variable("a", Value::Number(1.0));

        let mut snapshot = ctx.probe_snapshot();
        snapshot.set_variable("a", Value::Number(9.0));

        assert_eq!(ctx.variable("a"), Some(&Value::Number(1.0)));
    }
}
