//! Error types for the operator crate.

use thiserror::Error;

/// Errors produced while building or mapping operators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OpsError {
    /// A ladder operator addresses a mode outside the register.
    #[error("Mode {mode} out of range for {num_modes} modes")]
    ModeOutOfRange {
        /// The offending mode index.
        mode: u32,
        /// Number of modes in the register.
        num_modes: u32,
    },

    /// A supposedly Hermitian operator kept an imaginary coefficient.
    #[error("Operator is not Hermitian: term {term} has imaginary part {imag:e}")]
    NonHermitian {
        /// Label of the offending Pauli term.
        term: String,
        /// Size of the imaginary part.
        imag: f64,
    },

    /// Unknown mapper name.
    #[error("Unknown qubit mapper '{0}' (expected jordan_wigner or parity)")]
    UnknownMapper(String),
}

/// Result type for operator construction.
pub type OpsResult<T> = Result<T, OpsError>;
