//! Circuit instructions combining gates with operands.

use serde::{Deserialize, Serialize};

use crate::gate::StandardGate;
use crate::parameter::Bindings;
use crate::qubit::QubitId;

/// A gate applied to concrete qubits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The gate.
    pub gate: StandardGate,
    /// Operands, control first for controlled gates.
    pub qubits: Vec<QubitId>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn new(gate: StandardGate, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            gate,
            qubits: qubits.into_iter().collect(),
        }
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::new(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::new(gate, [q1, q2])
    }

    /// Gate name.
    pub fn name(&self) -> &'static str {
        self.gate.name()
    }

    /// Copy with parameters substituted.
    pub fn bind(&self, bindings: &Bindings) -> Self {
        Self {
            gate: self.gate.bind(bindings),
            qubits: self.qubits.clone(),
        }
    }
}
