//! Forge Circuit Representation
//!
//! This crate provides the circuit data structures used to express
//! variational ansätze and state-preparation circuits in Forge.
//!
//! # Core Components
//!
//! - **Qubits**: [`QubitId`] addresses a qubit; qubit `q` is bit `1 << q`
//!   of a computational basis index
//! - **Gates**: [`StandardGate`] for the built-in gate set
//! - **Parameters**: [`ParameterExpression`] for symbolic angles, bound
//!   through a [`Bindings`] map
//! - **Instructions**: [`Instruction`] combining a gate with its operands
//! - **Circuit**: [`Circuit`] builder with validation and binding
//!
//! # Example: Parameterized Circuit
//!
//! ```rust
//! use forge_ir::{Bindings, Circuit, QubitId};
//!
//! let mut circuit = Circuit::new("ansatz", 2);
//! circuit.ry("theta", QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//!
//! let mut bindings = Bindings::default();
//! bindings.insert("theta".to_string(), 0.25);
//! let bound = circuit.assign(&bindings).unwrap();
//!
//! assert!(!bound.is_parameterized());
//! assert_eq!(bound.depth(), 2);
//! ```
//!
//! # Supported Gates
//!
//! | Gate | Qubits | Real matrix |
//! |------|--------|-------------|
//! | `I`, `X`, `Z`, `H` | 1 | yes |
//! | `Y`, `S`, `Sdg` | 1 | no |
//! | `Ry` | 1 | yes |
//! | `Rx`, `Rz`, `P` | 1 | no |
//! | `CX`, `CZ`, `Swap`, `CRy` | 2 | yes |
//! | `CRx`, `CRz` | 2 | no |

pub mod circuit;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod parameter;
pub mod qubit;

pub use circuit::Circuit;
pub use error::{IrError, IrResult};
pub use gate::StandardGate;
pub use instruction::Instruction;
pub use parameter::{Bindings, ParameterExpression};
pub use qubit::QubitId;
