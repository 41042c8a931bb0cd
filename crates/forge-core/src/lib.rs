//! Forge Entanglement Forging Engine
//!
//! Computes molecular ground-state energies by splitting the `2n`-qubit
//! spin-orbital problem into two `n`-qubit registers, one per spin sector,
//! joined by a classical Schmidt decomposition over a set of bitstrings.
//! Only `n`-qubit circuits ever reach the backend.
//!
//! # Pipeline
//!
//! - [`integrals`]: MO-basis integrals and the [`ChemistryDriver`] seam
//! - [`active_space`]: frozen-core and virtual-orbital reduction
//! - [`bitstrings`]: determinant lists and their reduction
//! - [`operators`]: the subsystem operators mapped to qubits
//! - [`evaluator`]: concurrent measurement of transition elements
//! - [`assembler`]: the Schmidt matrix and its lowest eigenvalue
//! - [`optimizer`]: SPSA, COBYLA and Nelder-Mead step machines
//! - [`solver`]: the orchestrating [`EntanglementForgedGroundStateSolver`]
//! - [`exact`]: a full-CI reference energy
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use forge_adapter_sim::SimulatorBackend;
//! use forge_core::{Ansatz, Bitstring, SolverConfig, SolverSettings, solve};
//!
//! let settings = SolverSettings {
//!     maxiter: 0,
//!     initial_params: Some(vec![0.0, std::f64::consts::FRAC_PI_2]),
//!     ..Default::default()
//! };
//! let config = SolverConfig::new(Arc::new(SimulatorBackend::new())).with_settings(settings);
//! let bitstrings: Vec<Bitstring> = vec!["10".parse()?, "01".parse()?];
//!
//! let result = solve(&problem, &Ansatz::h2_minimal()?, bitstrings, config, None).await?;
//! println!("E = {:.10} Ha", result.energy);
//! ```

pub mod active_space;
pub mod ansatz;
pub mod assembler;
pub mod bitstrings;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod exact;
pub mod integrals;
pub mod operators;
pub mod optimizer;
pub mod result;
pub mod solver;

pub use active_space::ActiveSpaceSelection;
pub use ansatz::{Ansatz, AnsatzConfig, CustomAnsatz, Entanglement, Hop, HopGates, TwoLocal};
pub use assembler::{Assembly, EnergyAssembler};
pub use bitstrings::{Bitstring, BitstringSet, Bitstrings};
pub use config::{SolverConfig, SolverSettings};
pub use error::{ForgeError, ForgeResult};
pub use evaluator::{ExpectationCache, MatrixElements, PairArena, SchmidtPairEvaluator, StateKey};
pub use exact::fci_energy;
pub use integrals::{
    ChemistryDriver, ElectronicStructureProblem, IntegralBasis, IntegralDriver, IntegralTensors,
};
pub use operators::{ForgingOperators, OperatorLabel};
pub use optimizer::{Optimizer, OptimizerKind};
pub use result::{AuxiliaryValues, EnergyResult, OptimizerState};
pub use solver::{CancelHandle, EntanglementForgedGroundStateSolver, solve};
