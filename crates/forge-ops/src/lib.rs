//! Operator algebra for Forge.
//!
//! - [`pauli`]: Pauli strings with exact phase tracking
//! - [`sparse`]: complex Pauli sums and real [`Observable`]s
//! - [`fermion`]: ladder-operator products ([`FermionicOp`])
//! - [`mapper`]: the pluggable [`QubitMapper`] strategy with Jordan-Wigner
//!   and parity encodings
//!
//! # Example
//!
//! ```rust
//! use forge_ops::{FermionicOp, JordanWignerMapper, QubitMapper};
//!
//! // n_0 = (I - Z_0) / 2 under Jordan-Wigner
//! let obs = JordanWignerMapper.map_hermitian(&FermionicOp::number(0), 2).unwrap();
//! assert_eq!(obs.num_terms(), 2);
//! assert!((obs.constant() - 0.5).abs() < 1e-12);
//! ```

pub mod error;
pub mod fermion;
pub mod mapper;
pub mod pauli;
pub mod sparse;

pub use error::{OpsError, OpsResult};
pub use fermion::{FermionicOp, Ladder};
pub use mapper::{JordanWignerMapper, MapperKind, ParityMapper, QubitMapper};
pub use pauli::{PauliOp, PauliString};
pub use sparse::{DEFAULT_TOLERANCE, Observable, SparsePauliOp};
