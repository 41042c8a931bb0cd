//! Fermion-to-qubit mappings.
//!
//! A [`QubitMapper`] turns ladder operators into Pauli sums and tells the
//! caller which computational basis state represents a given occupation
//! pattern. Both halves matter: observables and state preparation must use
//! the same encoding or matrix elements come out in the wrong basis.
//!
//! | Mapper | `a_j` | occupation → qubits |
//! |--------|-------|---------------------|
//! | [`JordanWignerMapper`] | `Z_{<j} (X_j + iY_j)/2` | `q_j = b_j` |
//! | [`ParityMapper`] | `X_{>j} ½(X_j Z_{j-1} + iY_j)` | `q_j = b_0 ⊕ … ⊕ b_j` |

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{OpsError, OpsResult};
use crate::fermion::{FermionicOp, Ladder};
use crate::pauli::{PauliOp, PauliString};
use crate::sparse::{DEFAULT_TOLERANCE, Observable, SparsePauliOp};

/// Tolerance for discarding imaginary residue when mapping Hermitian operators.
const HERMITIAN_TOLERANCE: f64 = 1e-10;

/// A fermion-to-qubit encoding.
pub trait QubitMapper: Send + Sync + fmt::Debug {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Image of a single ladder operator on `num_modes` qubits.
    fn map_ladder(&self, op: Ladder, num_modes: u32) -> SparsePauliOp;

    /// Qubit basis state encoding an occupation pattern, indexed by mode.
    fn encode_occupation(&self, occupation: &[bool]) -> Vec<bool>;

    /// Map a fermionic operator term by term.
    fn map(&self, op: &FermionicOp, num_modes: u32) -> OpsResult<SparsePauliOp> {
        let mut out = SparsePauliOp::zero();
        for (ladders, coeff) in op.terms() {
            let mut product = SparsePauliOp::identity(Complex64::new(*coeff, 0.0));
            for &ladder in ladders {
                if ladder.mode() >= num_modes {
                    return Err(OpsError::ModeOutOfRange {
                        mode: ladder.mode(),
                        num_modes,
                    });
                }
                product = product.compose(&self.map_ladder(ladder, num_modes));
            }
            out += product;
        }
        Ok(out.simplify(DEFAULT_TOLERANCE))
    }

    /// Map an operator that is known to be Hermitian into an [`Observable`].
    fn map_hermitian(&self, op: &FermionicOp, num_modes: u32) -> OpsResult<Observable> {
        self.map(op, num_modes)?.into_observable(HERMITIAN_TOLERANCE)
    }
}

fn half(re: f64, im: f64) -> Complex64 {
    Complex64::new(0.5 * re, 0.5 * im)
}

/// Jordan-Wigner encoding: qubit `j` holds the occupation of mode `j`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JordanWignerMapper;

impl QubitMapper for JordanWignerMapper {
    fn name(&self) -> &'static str {
        "jordan_wigner"
    }

    fn map_ladder(&self, op: Ladder, _num_modes: u32) -> SparsePauliOp {
        let (j, sign) = match op {
            Ladder::Annihilate(j) => (j, 1.0),
            Ladder::Create(j) => (j, -1.0),
        };
        let string = |top: PauliOp| {
            PauliString::from_ops((0..j).map(|k| (k, PauliOp::Z)).chain([(j, top)]))
        };
        let mut out = SparsePauliOp::zero();
        out.add_term(string(PauliOp::X), half(1.0, 0.0));
        out.add_term(string(PauliOp::Y), half(0.0, sign));
        out
    }

    fn encode_occupation(&self, occupation: &[bool]) -> Vec<bool> {
        occupation.to_vec()
    }
}

/// Parity encoding: qubit `j` holds the parity of modes `0..=j`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParityMapper;

impl QubitMapper for ParityMapper {
    fn name(&self) -> &'static str {
        "parity"
    }

    fn map_ladder(&self, op: Ladder, num_modes: u32) -> SparsePauliOp {
        let (j, sign) = match op {
            Ladder::Annihilate(j) => (j, 1.0),
            Ladder::Create(j) => (j, -1.0),
        };
        let update = (j + 1..num_modes).map(|k| (k, PauliOp::X));
        let x_part = PauliString::from_ops(
            update
                .clone()
                .chain([(j, PauliOp::X)])
                .chain(j.checked_sub(1).map(|p| (p, PauliOp::Z))),
        );
        let y_part = PauliString::from_ops(update.chain([(j, PauliOp::Y)]));
        let mut out = SparsePauliOp::zero();
        out.add_term(x_part, half(1.0, 0.0));
        out.add_term(y_part, half(0.0, sign));
        out
    }

    fn encode_occupation(&self, occupation: &[bool]) -> Vec<bool> {
        occupation
            .iter()
            .scan(false, |parity, &b| {
                *parity ^= b;
                Some(*parity)
            })
            .collect()
    }
}

/// Mapper selection as it appears in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapperKind {
    /// [`JordanWignerMapper`].
    #[default]
    JordanWigner,
    /// [`ParityMapper`].
    Parity,
}

impl MapperKind {
    /// Instantiate the mapper.
    pub fn build(self) -> Arc<dyn QubitMapper> {
        match self {
            MapperKind::JordanWigner => Arc::new(JordanWignerMapper),
            MapperKind::Parity => Arc::new(ParityMapper),
        }
    }
}

impl FromStr for MapperKind {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "jordan_wigner" | "jw" => Ok(MapperKind::JordanWigner),
            "parity" => Ok(MapperKind::Parity),
            _ => Err(OpsError::UnknownMapper(s.to_string())),
        }
    }
}
