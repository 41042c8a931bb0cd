//! Solver results.

use serde::{Deserialize, Serialize};

use crate::bitstrings::Bitstring;

/// Lifecycle of the optimizer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerState {
    /// Created, nothing evaluated.
    Initialized,
    /// Inside the loop.
    Iterating,
    /// The optimizer reported convergence.
    Converged,
    /// The iteration budget ran out.
    MaxItersReached,
    /// Stopped by an error or cancellation.
    Failed,
}

impl OptimizerState {
    /// Whether the loop has stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OptimizerState::Converged | OptimizerState::MaxItersReached | OptimizerState::Failed
        )
    }
}

/// Expectation values reported alongside the energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryValues {
    /// `⟨N_α⟩`.
    pub num_alpha: f64,
    /// `⟨N_β⟩`.
    pub num_beta: f64,
    /// One-body part of the electronic energy, both spins.
    pub one_body_energy: f64,
    /// Same-spin two-body part, both spins.
    pub same_spin_energy: f64,
    /// Cross-spin two-body part.
    pub cross_spin_energy: f64,
    /// Nuclear repulsion plus frozen-core energy.
    pub offset: f64,
}

/// Outcome of a forged ground-state solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyResult {
    /// Lowest total energy observed.
    pub energy: f64,
    /// Parameters that produced `energy`.
    pub optimal_params: Vec<f64>,
    /// Optimizer update steps taken.
    pub iterations: usize,
    /// Energy evaluations performed.
    pub evaluations: usize,
    /// Whether the optimizer reported convergence.
    pub converged: bool,
    /// Terminal loop state.
    pub state: OptimizerState,
    /// Name of the optimizer.
    pub optimizer: String,
    /// Schmidt coefficients over the unique pairs below.
    pub schmidt_coefficients: Vec<f64>,
    /// `U` bitstrings of the unique pairs.
    pub bitstrings_u: Vec<Bitstring>,
    /// `V` bitstrings of the unique pairs.
    pub bitstrings_v: Vec<Bitstring>,
    /// How often each unique pair appeared in the input.
    pub multiplicities: Vec<usize>,
    /// Constant added to the electronic energy.
    pub energy_offset: f64,
    /// Energy of every evaluation, in order.
    pub history: Vec<f64>,
    /// Auxiliary expectation values at the optimum, if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<AuxiliaryValues>,
    /// Wall time of the solve.
    pub elapsed_ms: u64,
}

impl EnergyResult {
    /// Electronic part of the energy.
    pub fn electronic_energy(&self) -> f64 {
        self.energy - self.energy_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&OptimizerState::MaxItersReached).unwrap();
        assert_eq!(json, "\"max_iters_reached\"");
        assert!(OptimizerState::Failed.is_terminal());
        assert!(!OptimizerState::Iterating.is_terminal());
    }
}
