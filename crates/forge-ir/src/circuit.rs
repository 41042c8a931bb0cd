//! High-level circuit builder API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{IrError, IrResult};
use crate::gate::StandardGate;
use crate::instruction::Instruction;
use crate::parameter::{Bindings, ParameterExpression};
use crate::qubit::QubitId;

/// A quantum circuit over a fixed number of qubits.
///
/// Instructions are kept in application order. Every builder method
/// validates operands against the circuit width before appending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    name: String,
    num_qubits: u32,
    instructions: Vec<Instruction>,
}

impl Circuit {
    /// Create an empty circuit of the given width.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            instructions: vec![],
        }
    }

    /// Append an instruction after validating its operands.
    pub fn append(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        let gate_name = instruction.name();
        let expected = instruction.gate.num_qubits();
        if instruction.qubits.len() as u32 != expected {
            return Err(IrError::QubitCountMismatch {
                gate_name: gate_name.to_string(),
                expected,
                got: instruction.qubits.len() as u32,
            });
        }
        for (i, &qubit) in instruction.qubits.iter().enumerate() {
            if qubit.0 >= self.num_qubits {
                return Err(IrError::QubitNotFound {
                    qubit,
                    width: self.num_qubits,
                    gate_name: Some(gate_name.to_string()),
                });
            }
            if instruction.qubits[..i].contains(&qubit) {
                return Err(IrError::DuplicateQubit {
                    qubit,
                    gate_name: Some(gate_name.to_string()),
                });
            }
        }
        self.instructions.push(instruction);
        Ok(self)
    }

    fn single(&mut self, gate: StandardGate, qubit: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::single_qubit_gate(gate, qubit))
    }

    fn pair(&mut self, gate: StandardGate, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::two_qubit_gate(gate, q1, q2))
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::H, qubit)
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::X, qubit)
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::Y, qubit)
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::Z, qubit)
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::S, qubit)
    }

    /// Apply S-dagger gate.
    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::Sdg, qubit)
    }

    /// Apply RX rotation.
    pub fn rx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.single(StandardGate::Rx(theta.into()), qubit)
    }

    /// Apply RY rotation.
    pub fn ry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.single(StandardGate::Ry(theta.into()), qubit)
    }

    /// Apply RZ rotation.
    pub fn rz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.single(StandardGate::Rz(theta.into()), qubit)
    }

    /// Apply phase gate.
    pub fn p(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.single(StandardGate::P(theta.into()), qubit)
    }

    // =========================================================================
    // Two-qubit gates
    // =========================================================================

    /// Apply CNOT gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.pair(StandardGate::CX, control, target)
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.pair(StandardGate::CZ, control, target)
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.pair(StandardGate::Swap, q1, q2)
    }

    /// Apply controlled RX.
    pub fn crx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.pair(StandardGate::CRx(theta.into()), control, target)
    }

    /// Apply controlled RY.
    pub fn cry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.pair(StandardGate::CRy(theta.into()), control, target)
    }

    /// Apply controlled RZ.
    pub fn crz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.pair(StandardGate::CRz(theta.into()), control, target)
    }

    // =========================================================================
    // Composition and binding
    // =========================================================================

    /// Append all instructions of `other`, which must have the same width.
    pub fn compose(&mut self, other: &Circuit) -> IrResult<&mut Self> {
        if other.num_qubits != self.num_qubits {
            return Err(IrError::WidthMismatch {
                expected: self.num_qubits,
                got: other.num_qubits,
            });
        }
        self.instructions.extend(other.instructions.iter().cloned());
        Ok(self)
    }

    /// Copy with the given parameters substituted; others stay symbolic.
    pub fn bind(&self, bindings: &Bindings) -> Circuit {
        Circuit {
            name: self.name.clone(),
            num_qubits: self.num_qubits,
            instructions: self.instructions.iter().map(|i| i.bind(bindings)).collect(),
        }
    }

    /// Like [`Circuit::bind`], but every parameter must be assigned.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<Circuit> {
        let bound = self.bind(bindings);
        if let Some(name) = bound.parameters().into_iter().next() {
            return Err(IrError::UnboundParameter(name));
        }
        Ok(bound)
    }

    /// Names of all unbound parameters, sorted.
    pub fn parameters(&self) -> BTreeSet<String> {
        self.instructions
            .iter()
            .filter_map(|i| i.gate.parameter())
            .flat_map(ParameterExpression::symbols)
            .collect()
    }

    /// Whether any gate still carries a symbolic angle.
    pub fn is_parameterized(&self) -> bool {
        self.instructions.iter().any(|i| i.gate.is_parameterized())
    }

    /// Whether every gate has a real matrix.
    pub fn is_real(&self) -> bool {
        self.instructions.iter().all(|i| i.gate.is_real())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits as usize
    }

    /// Instructions in application order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the circuit has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Length of the longest chain of instructions sharing a qubit.
    pub fn depth(&self) -> usize {
        let mut layer = vec![0usize; self.num_qubits as usize];
        for inst in &self.instructions {
            let next = inst
                .qubits
                .iter()
                .map(|q| layer[q.index()])
                .max()
                .unwrap_or(0)
                + 1;
            for q in &inst.qubits {
                layer[q.index()] = next;
            }
        }
        layer.into_iter().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_depth() {
        let mut circuit = Circuit::new("bell", 2);
        circuit.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();

        assert_eq!(circuit.num_qubits(), 2);
        assert_eq!(circuit.len(), 2);
        assert_eq!(circuit.depth(), 2);
        assert!(circuit.is_real());
    }

    #[test]
    fn test_out_of_range_qubit() {
        let mut circuit = Circuit::new("c", 2);
        let err = circuit.x(QubitId(2)).unwrap_err();
        assert!(matches!(err, IrError::QubitNotFound { width: 2, .. }));
    }

    #[test]
    fn test_duplicate_qubit() {
        let mut circuit = Circuit::new("c", 2);
        let err = circuit.cx(QubitId(1), QubitId(1)).unwrap_err();
        assert!(matches!(err, IrError::DuplicateQubit { .. }));
    }

    #[test]
    fn test_arity_checked() {
        let mut circuit = Circuit::new("c", 3);
        let err = circuit
            .append(Instruction::new(StandardGate::CX, [QubitId(0)]))
            .unwrap_err();
        assert!(matches!(err, IrError::QubitCountMismatch { expected: 2, got: 1, .. }));
    }

    #[test]
    fn test_bind_and_assign() {
        let mut circuit = Circuit::new("ansatz", 2);
        circuit
            .ry("a", QubitId(0))
            .unwrap()
            .cry("b", QubitId(0), QubitId(1))
            .unwrap();
        assert_eq!(
            circuit.parameters().into_iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        let mut bindings = Bindings::default();
        bindings.insert("a".into(), 0.3);
        assert!(matches!(
            circuit.assign(&bindings),
            Err(IrError::UnboundParameter(name)) if name == "b"
        ));

        bindings.insert("b".into(), 0.7);
        let bound = circuit.assign(&bindings).unwrap();
        assert!(!bound.is_parameterized());
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn test_compose_width_mismatch() {
        let mut a = Circuit::new("a", 2);
        let b = Circuit::new("b", 3);
        assert!(matches!(
            a.compose(&b),
            Err(IrError::WidthMismatch { expected: 2, got: 3 })
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_depth_bounded_by_len(pairs in proptest::collection::vec((0u32..4, 0u32..4), 0..32)) {
            let mut circuit = Circuit::new("random", 4);
            for (a, b) in pairs {
                if a == b {
                    circuit.h(QubitId(a)).unwrap();
                } else {
                    circuit.cx(QubitId(a), QubitId(b)).unwrap();
                }
            }
            proptest::prop_assert!(circuit.depth() <= circuit.len());
            proptest::prop_assert!(circuit.is_empty() || circuit.depth() >= 1);
        }
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut circuit = Circuit::new("c", 1);
        circuit.rz("t", QubitId(0)).unwrap();
        let json = serde_json::to_string(&circuit).unwrap();
        let back: Circuit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, circuit);
    }
}
