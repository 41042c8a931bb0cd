//! Weighted sums of Pauli strings.
//!
//! [`SparsePauliOp`] carries complex coefficients and is closed under
//! products, which is what fermion-to-qubit mapping needs. Hermitian
//! results are converted into a real [`Observable`] before they are
//! handed to a backend.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use crate::error::{OpsError, OpsResult};
use crate::pauli::PauliString;

/// Coefficients below this magnitude are dropped by [`SparsePauliOp::simplify`].
pub const DEFAULT_TOLERANCE: f64 = 1e-12;

/// Sum of Pauli strings with complex coefficients.
///
/// Terms are kept in a `BTreeMap`, so equal strings merge on insertion
/// and iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparsePauliOp {
    terms: BTreeMap<PauliString, Complex64>,
}

impl SparsePauliOp {
    /// The zero operator.
    pub fn zero() -> Self {
        Self::default()
    }

    /// `coeff · I`.
    pub fn identity(coeff: Complex64) -> Self {
        Self::from_term(PauliString::identity(), coeff)
    }

    /// A single weighted string.
    pub fn from_term(pauli: PauliString, coeff: Complex64) -> Self {
        let mut op = Self::zero();
        op.add_term(pauli, coeff);
        op
    }

    /// Accumulate `coeff · pauli`.
    pub fn add_term(&mut self, pauli: PauliString, coeff: Complex64) {
        *self.terms.entry(pauli).or_default() += coeff;
    }

    /// Iterate over (string, coefficient) pairs in string order.
    pub fn terms(&self) -> impl Iterator<Item = (&PauliString, &Complex64)> {
        self.terms.iter()
    }

    /// Number of stored terms.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Product `self · rhs`.
    pub fn compose(&self, rhs: &SparsePauliOp) -> SparsePauliOp {
        let mut out = SparsePauliOp::zero();
        for (a, ca) in &self.terms {
            for (b, cb) in &rhs.terms {
                let (phase, p) = a.mul(b);
                out.add_term(p, phase * ca * cb);
            }
        }
        out
    }

    /// Multiply every coefficient by `factor`.
    pub fn scale(mut self, factor: Complex64) -> Self {
        for c in self.terms.values_mut() {
            *c *= factor;
        }
        self
    }

    /// Hermitian adjoint. Pauli strings are Hermitian, so only the
    /// coefficients are conjugated.
    pub fn adjoint(mut self) -> Self {
        for c in self.terms.values_mut() {
            *c = c.conj();
        }
        self
    }

    /// Drop terms whose coefficient magnitude is at most `tol`.
    pub fn simplify(mut self, tol: f64) -> Self {
        self.terms.retain(|_, c| c.norm() > tol);
        self
    }

    /// Convert to a real observable, failing if an imaginary part above
    /// `tol` survives.
    pub fn into_observable(self, tol: f64) -> OpsResult<Observable> {
        let mut terms = Vec::with_capacity(self.terms.len());
        for (pauli, c) in self.simplify(tol).terms {
            if c.im.abs() > tol {
                return Err(OpsError::NonHermitian {
                    term: pauli.to_string(),
                    imag: c.im,
                });
            }
            if c.re.abs() > tol {
                terms.push((pauli, c.re));
            }
        }
        Ok(Observable { terms })
    }
}

impl Add for SparsePauliOp {
    type Output = SparsePauliOp;

    fn add(mut self, rhs: SparsePauliOp) -> SparsePauliOp {
        self += rhs;
        self
    }
}

impl AddAssign for SparsePauliOp {
    fn add_assign(&mut self, rhs: SparsePauliOp) {
        for (p, c) in rhs.terms {
            self.add_term(p, c);
        }
    }
}

/// A Hermitian operator as a real-weighted sum of Pauli strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    terms: Vec<(PauliString, f64)>,
}

impl Observable {
    /// Build from terms, merging repeated strings.
    pub fn from_terms(terms: impl IntoIterator<Item = (PauliString, f64)>) -> Self {
        let mut merged: BTreeMap<PauliString, f64> = BTreeMap::new();
        for (p, c) in terms {
            *merged.entry(p).or_default() += c;
        }
        Self {
            terms: merged.into_iter().filter(|(_, c)| *c != 0.0).collect(),
        }
    }

    /// All terms.
    pub fn terms(&self) -> &[(PauliString, f64)] {
        &self.terms
    }

    /// Number of terms.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Whether the observable is zero.
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Coefficient of the identity string.
    pub fn constant(&self) -> f64 {
        self.terms
            .iter()
            .find(|(p, _)| p.is_identity())
            .map_or(0.0, |(_, c)| *c)
    }

    /// Minimum register width needed to evaluate this observable.
    pub fn min_qubits(&self) -> u32 {
        self.terms
            .iter()
            .filter_map(|(p, _)| p.max_qubit())
            .max()
            .map_or(0, |q| q + 1)
    }
}
