//! Backend capability description.

use serde::{Deserialize, Serialize};

/// What a backend can execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Name of the backend.
    pub name: String,
    /// Number of qubits available.
    pub num_qubits: u32,
    /// Maximum shots per Pauli term.
    pub max_shots: u32,
    /// Whether exact (shot-free) expectation values are available.
    pub supports_exact: bool,
    /// Whether this is a simulator (`true`) or real hardware (`false`).
    pub is_simulator: bool,
    /// Additional capability flags such as `"statevector"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Capabilities {
    /// Capabilities of a local statevector simulator.
    pub fn simulator(num_qubits: u32) -> Self {
        Self {
            name: "simulator".into(),
            num_qubits,
            max_shots: 1_000_000,
            supports_exact: true,
            is_simulator: true,
            features: vec!["statevector".into(), "estimator".into()],
        }
    }

    /// Whether a feature flag is present.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}
