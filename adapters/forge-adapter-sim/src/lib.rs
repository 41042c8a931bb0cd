//! Forge Local Statevector Estimator
//!
//! A local backend that evaluates Pauli-sum observables on the exact
//! output state of a bound circuit. It is the default backend for the
//! forging solver and for tests.
//!
//! # Features
//!
//! - **Exact Evaluation**: `shots = None` returns `⟨ψ|O|ψ⟩` with zero variance
//! - **Sampled Evaluation**: `shots = Some(n)` draws `n` outcomes per Pauli
//!   term, reproducibly for a fixed request seed
//! - **Whole Gate Set**: every gate in `forge-ir`
//!
//! # Performance
//!
//! | Qubits | Memory | Simulation Speed |
//! |--------|--------|------------------|
//! | 10 | ~16 KB | Instant |
//! | 15 | ~512 KB | Fast |
//! | 20 | ~16 MB | Moderate |
//!
//! # Example
//!
//! ```ignore
//! use forge_adapter_sim::SimulatorBackend;
//! use forge_hal::{Backend, EstimatorRequest};
//!
//! let backend = SimulatorBackend::new();
//! let result = backend.run(&EstimatorRequest::new(circuit, observables)).await?;
//! println!("values: {:?}", result.values);
//! ```

mod simulator;
mod statevector;

pub use simulator::SimulatorBackend;
pub use statevector::Statevector;
