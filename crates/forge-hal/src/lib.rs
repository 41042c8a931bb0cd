//! Forge Hardware Abstraction Layer
//!
//! This crate defines how the forging engine talks to anything that can
//! estimate expectation values: local simulators, emulators or remote
//! hardware.
//!
//! # Overview
//!
//! - A common [`Backend`] trait for job submission and management
//! - [`EstimatorRequest`] / [`EstimatorResult`]: a bound circuit plus the
//!   observables to evaluate on it, answered exactly or from shots
//! - [`Capabilities`] to describe limits such as width and shot budget
//! - [`HalError::is_transient`] to separate retryable failures from
//!   malformed requests
//!
//! # Example
//!
//! ```ignore
//! use forge_adapter_sim::SimulatorBackend;
//! use forge_hal::{Backend, EstimatorRequest};
//! use forge_ir::{Circuit, QubitId};
//! use forge_ops::{Observable, PauliOp, PauliString};
//!
//! let mut circuit = Circuit::new("flip", 1);
//! circuit.x(QubitId(0))?;
//! let z = Observable::from_terms([(PauliString::single(0, PauliOp::Z), 1.0)]);
//!
//! let backend = SimulatorBackend::new();
//! let result = backend.run(&EstimatorRequest::new(circuit, vec![z])).await?;
//! assert_eq!(result.values, vec![-1.0]);
//! ```

pub mod backend;
pub mod capability;
pub mod error;
pub mod estimator;
pub mod job;

pub use backend::{
    Backend, BackendAvailability, BackendConfig, BackendFactory, DEFAULT_POLL_INTERVAL,
    DEFAULT_WAIT_TIMEOUT, ValidationResult,
};
pub use capability::Capabilities;
pub use error::{HalError, HalResult};
pub use estimator::{EstimatorRequest, EstimatorResult};
pub use job::{Job, JobId, JobStatus};
