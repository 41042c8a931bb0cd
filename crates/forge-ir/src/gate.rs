//! Gate set used by ansatz templates and state preparation.

use serde::{Deserialize, Serialize};

use crate::parameter::{Bindings, ParameterExpression};

/// Standard gates with known semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardGate {
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,

    /// Rotation around X axis.
    Rx(ParameterExpression),
    /// Rotation around Y axis.
    Ry(ParameterExpression),
    /// Rotation around Z axis.
    Rz(ParameterExpression),
    /// Phase gate.
    P(ParameterExpression),

    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Z gate.
    CZ,
    /// SWAP gate.
    Swap,
    /// Controlled rotation around X.
    CRx(ParameterExpression),
    /// Controlled rotation around Y.
    CRy(ParameterExpression),
    /// Controlled rotation around Z.
    CRz(ParameterExpression),
}

impl StandardGate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::P(_) => "p",
            StandardGate::CX => "cx",
            StandardGate::CZ => "cz",
            StandardGate::Swap => "swap",
            StandardGate::CRx(_) => "crx",
            StandardGate::CRy(_) => "cry",
            StandardGate::CRz(_) => "crz",
        }
    }

    /// Look up a parameterized gate by name, as used in ansatz templates.
    pub fn from_name(name: &str, angle: ParameterExpression) -> Option<Self> {
        let gate = match name.to_ascii_lowercase().as_str() {
            "id" | "i" => StandardGate::I,
            "x" => StandardGate::X,
            "y" => StandardGate::Y,
            "z" => StandardGate::Z,
            "h" => StandardGate::H,
            "s" => StandardGate::S,
            "sdg" => StandardGate::Sdg,
            "rx" => StandardGate::Rx(angle),
            "ry" => StandardGate::Ry(angle),
            "rz" => StandardGate::Rz(angle),
            "p" => StandardGate::P(angle),
            "cx" | "cnot" => StandardGate::CX,
            "cz" => StandardGate::CZ,
            "swap" => StandardGate::Swap,
            "crx" => StandardGate::CRx(angle),
            "cry" => StandardGate::CRy(angle),
            "crz" => StandardGate::CRz(angle),
            _ => return None,
        };
        Some(gate)
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::I
            | StandardGate::X
            | StandardGate::Y
            | StandardGate::Z
            | StandardGate::H
            | StandardGate::S
            | StandardGate::Sdg
            | StandardGate::Rx(_)
            | StandardGate::Ry(_)
            | StandardGate::Rz(_)
            | StandardGate::P(_) => 1,

            StandardGate::CX
            | StandardGate::CZ
            | StandardGate::Swap
            | StandardGate::CRx(_)
            | StandardGate::CRy(_)
            | StandardGate::CRz(_) => 2,
        }
    }

    /// The angle of a rotation gate.
    pub fn parameter(&self) -> Option<&ParameterExpression> {
        match self {
            StandardGate::Rx(p)
            | StandardGate::Ry(p)
            | StandardGate::Rz(p)
            | StandardGate::P(p)
            | StandardGate::CRx(p)
            | StandardGate::CRy(p)
            | StandardGate::CRz(p) => Some(p),
            _ => None,
        }
    }

    /// Check if this gate still has unbound parameters.
    pub fn is_parameterized(&self) -> bool {
        self.parameter().is_some_and(ParameterExpression::is_symbolic)
    }

    /// Whether the gate matrix is real for every angle.
    ///
    /// A circuit of real gates maps real amplitudes to real amplitudes,
    /// so its transition matrix elements between basis states are real.
    pub fn is_real(&self) -> bool {
        matches!(
            self,
            StandardGate::I
                | StandardGate::X
                | StandardGate::Z
                | StandardGate::H
                | StandardGate::Ry(_)
                | StandardGate::CX
                | StandardGate::CZ
                | StandardGate::Swap
                | StandardGate::CRy(_)
        )
    }

    /// Substitute parameter values.
    pub fn bind(&self, bindings: &Bindings) -> Self {
        match self {
            StandardGate::Rx(p) => StandardGate::Rx(p.bind(bindings)),
            StandardGate::Ry(p) => StandardGate::Ry(p.bind(bindings)),
            StandardGate::Rz(p) => StandardGate::Rz(p.bind(bindings)),
            StandardGate::P(p) => StandardGate::P(p.bind(bindings)),
            StandardGate::CRx(p) => StandardGate::CRx(p.bind(bindings)),
            StandardGate::CRy(p) => StandardGate::CRy(p.bind(bindings)),
            StandardGate::CRz(p) => StandardGate::CRz(p.bind(bindings)),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_gate_properties() {
        assert_eq!(StandardGate::H.name(), "h");
        assert_eq!(StandardGate::H.num_qubits(), 1);
        assert_eq!(StandardGate::CX.num_qubits(), 2);
        assert!(!StandardGate::CX.is_parameterized());

        let cry = StandardGate::CRy(ParameterExpression::symbol("t"));
        assert!(cry.is_parameterized());
        assert!(cry.is_real());
        assert!(!StandardGate::Rz(0.1.into()).is_real());
    }

    #[test]
    fn test_from_name() {
        let gate = StandardGate::from_name("CRY", "t".into()).unwrap();
        assert_eq!(gate.name(), "cry");
        assert!(StandardGate::from_name("toffoli", 0.0.into()).is_none());
    }

    #[test]
    fn test_bind() {
        let mut bindings = Bindings::default();
        bindings.insert("t".into(), 0.5);
        let bound = StandardGate::Ry("t".into()).bind(&bindings);
        assert_eq!(bound, StandardGate::Ry(ParameterExpression::Constant(0.5)));
        assert!(!bound.is_parameterized());
    }
}
