//! Error types for the forging engine.

use forge_hal::HalError;
use forge_ir::IrError;
use forge_ops::OpsError;
use thiserror::Error;

use crate::result::EnergyResult;

/// Errors produced while setting up or running a forged solve.
///
/// Failures that happen after the optimizer loop has started carry the best
/// result observed so far in `partial`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ForgeError {
    /// A bitstring or active-space selection does not fit the problem.
    #[error("Invalid bitstring: {0}")]
    InvalidBitstring(String),

    /// Integral tensors or particle counts are inconsistent.
    #[error("Integral shape error: {0}")]
    IntegralShape(String),

    /// The backend failed and the retry budget did not recover it.
    #[error("Backend execution failed: {source}")]
    BackendExecution {
        /// Last backend error.
        #[source]
        source: HalError,
        /// Best result before the failure.
        partial: Option<Box<EnergyResult>>,
    },

    /// The energy became NaN or infinite.
    #[error("Optimizer diverged: energy is not finite")]
    OptimizerDivergence {
        /// Last parameters that produced a finite energy.
        last_params: Vec<f64>,
        /// Best result before the divergence.
        partial: Option<Box<EnergyResult>>,
    },

    /// The solve was cancelled or ran out of wall-clock budget.
    #[error("Solve cancelled")]
    Cancelled {
        /// Best result before cancellation.
        partial: Option<Box<EnergyResult>>,
    },

    /// Invalid solver settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Circuit construction failed.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Operator mapping failed.
    #[error(transparent)]
    Ops(#[from] OpsError),
}

impl ForgeError {
    /// Best result obtained before the error, if any.
    pub fn partial(&self) -> Option<&EnergyResult> {
        match self {
            ForgeError::BackendExecution { partial, .. }
            | ForgeError::OptimizerDivergence { partial, .. }
            | ForgeError::Cancelled { partial } => partial.as_deref(),
            _ => None,
        }
    }

    /// Attach a partial result to errors that can carry one.
    pub(crate) fn with_partial(mut self, result: EnergyResult) -> Self {
        match &mut self {
            ForgeError::BackendExecution { partial, .. }
            | ForgeError::OptimizerDivergence { partial, .. }
            | ForgeError::Cancelled { partial } => *partial = Some(Box::new(result)),
            _ => {}
        }
        self
    }
}

impl From<HalError> for ForgeError {
    fn from(source: HalError) -> Self {
        ForgeError::BackendExecution {
            source,
            partial: None,
        }
    }
}

/// Result type for forging operations.
pub type ForgeResult<T> = Result<T, ForgeError>;
