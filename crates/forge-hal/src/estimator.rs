//! Estimator request and result types.
//!
//! A request is one fully bound circuit plus the observables to evaluate
//! on its output state. Backends answer with one value per observable,
//! either exact or estimated from `shots` samples per Pauli term.

use serde::{Deserialize, Serialize};

use forge_ir::Circuit;
use forge_ops::Observable;

use crate::error::{HalError, HalResult};

/// A circuit and the observables to measure on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorRequest {
    /// Fully bound state-preparation circuit.
    pub circuit: Circuit,
    /// Observables to evaluate, answered in the same order.
    pub observables: Vec<Observable>,
    /// Shots per Pauli term. `None` requests exact expectation values.
    pub shots: Option<u32>,
    /// Seed for sampling backends.
    pub seed: Option<u64>,
}

impl EstimatorRequest {
    /// Create an exact-evaluation request.
    pub fn new(circuit: Circuit, observables: Vec<Observable>) -> Self {
        Self {
            circuit,
            observables,
            shots: None,
            seed: None,
        }
    }

    /// Request sampled estimates.
    pub fn with_shots(mut self, shots: Option<u32>) -> Self {
        self.shots = shots;
        self
    }

    /// Fix the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Structural checks every backend performs before accepting a request.
    pub fn check(&self) -> HalResult<()> {
        if self.circuit.is_parameterized() {
            let names: Vec<_> = self.circuit.parameters().into_iter().collect();
            return Err(HalError::InvalidCircuit(format!(
                "unbound parameters: {}",
                names.join(", ")
            )));
        }
        if self.shots == Some(0) {
            return Err(HalError::InvalidShots("shots must be positive".into()));
        }
        let width = self.circuit.num_qubits() as u32;
        if let Some(obs) = self.observables.iter().find(|o| o.min_qubits() > width) {
            return Err(HalError::InvalidObservable(format!(
                "observable needs {} qubits, circuit has {width}",
                obs.min_qubits()
            )));
        }
        Ok(())
    }
}

/// Expectation values for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorResult {
    /// One value per requested observable.
    pub values: Vec<f64>,
    /// Estimator variance per observable; zero for exact evaluation.
    pub variances: Vec<f64>,
    /// Shots used per Pauli term, if sampled.
    pub shots: Option<u32>,
    /// Wall time spent executing, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

impl EstimatorResult {
    /// Exact values with zero variance.
    pub fn exact(values: Vec<f64>) -> Self {
        let variances = vec![0.0; values.len()];
        Self {
            values,
            variances,
            shots: None,
            execution_time_ms: None,
        }
    }

    /// Set execution time.
    pub fn with_execution_time(mut self, ms: u64) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_ir::QubitId;
    use forge_ops::{PauliOp, PauliString};

    #[test]
    fn test_check_rejects_unbound_circuit() {
        let mut circuit = Circuit::new("c", 1);
        circuit.ry("theta", QubitId(0)).unwrap();
        let request = EstimatorRequest::new(circuit, vec![]);
        assert!(matches!(request.check(), Err(HalError::InvalidCircuit(_))));
    }

    #[test]
    fn test_check_rejects_wide_observable() {
        let circuit = Circuit::new("c", 1);
        let obs = Observable::from_terms([(PauliString::single(2, PauliOp::Z), 1.0)]);
        let request = EstimatorRequest::new(circuit, vec![obs]);
        assert!(matches!(request.check(), Err(HalError::InvalidObservable(_))));
    }

    #[test]
    fn test_check_rejects_zero_shots() {
        let request = EstimatorRequest::new(Circuit::new("c", 1), vec![]).with_shots(Some(0));
        assert!(matches!(request.check(), Err(HalError::InvalidShots(_))));
    }

    #[test]
    fn test_exact_result() {
        let result = EstimatorResult::exact(vec![0.5, -1.0]).with_execution_time(3);
        assert_eq!(result.variances, vec![0.0, 0.0]);
        assert_eq!(result.execution_time_ms, Some(3));
    }
}
