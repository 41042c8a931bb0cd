//! Per-subsystem qubit operators of the forged Hamiltonian.
//!
//! Each subsystem register holds one spin sector of `n` spatial orbitals.
//! The forged energy needs transition elements of
//!
//! - `F_pq = (a†_p a_q + a†_q a_p) / 2` for `p ≤ q`, and
//! - `S = ½ Σ (pq|rs) a†_p a†_r a_s a_q`, the same-spin two-body part.
//!
//! The contraction weights against the integrals are precomputed here so
//! the assembler only deals with the canonical `p ≤ q` operators.

use ndarray::{Array1, Array2};
use std::fmt;

use forge_ops::{FermionicOp, Observable, QubitMapper};

use crate::error::ForgeResult;
use crate::integrals::IntegralTensors;

const INTEGRAL_CUTOFF: f64 = 1e-14;

/// Identifies one measured operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperatorLabel {
    /// `F_pq` with `p ≤ q`.
    OneBody {
        /// Lower orbital index.
        p: u32,
        /// Upper orbital index.
        q: u32,
    },
    /// The same-spin two-body operator.
    SameSpin,
}

impl fmt::Display for OperatorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorLabel::OneBody { p, q } => write!(f, "F{p},{q}"),
            OperatorLabel::SameSpin => write!(f, "S"),
        }
    }
}

/// Mapped observables plus their integral weights.
#[derive(Debug, Clone)]
pub struct ForgingOperators {
    num_orbitals: usize,
    labels: Vec<OperatorLabel>,
    observables: Vec<Observable>,
    one_body_weights: Array1<f64>,
    cross_weights: Array2<f64>,
}

impl ForgingOperators {
    /// Map every operator with `mapper` and fold the integrals into
    /// weights over the canonical `F_pq`.
    pub fn build(integrals: &IntegralTensors, mapper: &dyn QubitMapper) -> ForgeResult<Self> {
        let n = integrals.num_orbitals();
        let modes = n as u32;
        let h = integrals.one_body();
        let g = integrals.two_body();

        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|p| (p..n).map(move |q| (p, q)))
            .collect();

        let mut labels = Vec::with_capacity(pairs.len() + 1);
        let mut observables = Vec::with_capacity(pairs.len() + 1);
        for &(p, q) in &pairs {
            let (p, q) = (p as u32, q as u32);
            labels.push(OperatorLabel::OneBody { p, q });
            observables.push(mapper.map_hermitian(&FermionicOp::symmetric_excitation(p, q), modes)?);
        }

        let mut same_spin = FermionicOp::zero();
        for p in 0..n {
            for q in 0..n {
                for r in 0..n {
                    for s in 0..n {
                        let v = g[[p, q, r, s]];
                        if v.abs() < INTEGRAL_CUTOFF || p == r || q == s {
                            continue;
                        }
                        same_spin.extend_scaled(
                            &FermionicOp::two_body(p as u32, q as u32, r as u32, s as u32),
                            0.5 * v,
                        );
                    }
                }
            }
        }
        labels.push(OperatorLabel::SameSpin);
        observables.push(mapper.map_hermitian(&same_spin, modes)?);

        // Σ_pq h_pq F_pq over all ordered (p, q) equals Σ_{p≤q} w F_pq.
        let one_body_weights = Array1::from_shape_fn(pairs.len(), |a| {
            let (p, q) = pairs[a];
            if p == q { h[[p, p]] } else { h[[p, q]] + h[[q, p]] }
        });
        let cross_weights = Array2::from_shape_fn((pairs.len(), pairs.len()), |(a, b)| {
            let (p, q) = pairs[a];
            let (r, s) = pairs[b];
            orientations(p, q)
                .flat_map(|(i, j)| orientations(r, s).map(move |(k, l)| g[[i, j, k, l]]))
                .sum::<f64>()
        });

        Ok(Self {
            num_orbitals: n,
            labels,
            observables,
            one_body_weights,
            cross_weights,
        })
    }

    /// Spatial orbitals per subsystem register.
    pub fn num_orbitals(&self) -> usize {
        self.num_orbitals
    }

    /// Operator labels, `F_pq` first, `S` last.
    pub fn labels(&self) -> &[OperatorLabel] {
        &self.labels
    }

    /// Mapped observables, aligned with [`ForgingOperators::labels`].
    pub fn observables(&self) -> &[Observable] {
        &self.observables
    }

    /// Total number of operators.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Never true: `S` is always present.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of `F_pq` operators.
    pub fn num_one_body(&self) -> usize {
        self.labels.len() - 1
    }

    /// Index of `S`.
    pub fn same_spin_index(&self) -> usize {
        self.labels.len() - 1
    }

    /// Indices of the diagonal `F_pp` (number) operators.
    pub fn number_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| matches!(l, OperatorLabel::OneBody { p, q } if p == q).then_some(i))
    }

    /// Weights `w_a` with `Σ_pq h_pq F_pq = Σ_a w_a F_a`.
    pub fn one_body_weights(&self) -> &Array1<f64> {
        &self.one_body_weights
    }

    /// Weights `W_ab` with `Σ (pq|rs) F_pq ⊗ F_rs = Σ_ab W_ab F_a ⊗ F_b`.
    pub fn cross_weights(&self) -> &Array2<f64> {
        &self.cross_weights
    }
}

fn orientations(p: usize, q: usize) -> impl Iterator<Item = (usize, usize)> {
    let swapped = (p != q).then_some((q, p));
    std::iter::once((p, q)).chain(swapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_ops::JordanWignerMapper;
    use ndarray::{Array4, array};

    fn integrals() -> IntegralTensors {
        let h = array![[-1.0, 0.25], [0.25, -0.5]];
        let g = Array4::from_elem((2, 2, 2, 2), 0.1);
        IntegralTensors::new(h, g, 0.0).unwrap()
    }

    #[test]
    fn test_labels_and_layout() {
        let ops = ForgingOperators::build(&integrals(), &JordanWignerMapper).unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops.num_one_body(), 3);
        let names: Vec<String> = ops.labels().iter().map(ToString::to_string).collect();
        assert_eq!(names, ["F0,0", "F0,1", "F1,1", "S"]);
        assert_eq!(ops.number_indices().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_one_body_weights_double_off_diagonal() {
        let ops = ForgingOperators::build(&integrals(), &JordanWignerMapper).unwrap();
        assert_eq!(ops.one_body_weights().to_vec(), vec![-1.0, 0.5, -0.5]);
    }

    #[test]
    fn test_cross_weights_count_orientations() {
        let ops = ForgingOperators::build(&integrals(), &JordanWignerMapper).unwrap();
        let w = ops.cross_weights();
        assert!((w[[0, 0]] - 0.1).abs() < 1e-15);
        assert!((w[[0, 1]] - 0.2).abs() < 1e-15);
        assert!((w[[1, 1]] - 0.4).abs() < 1e-15);
    }

    #[test]
    fn test_same_spin_vanishes_below_two_electrons() {
        // S annihilates two electrons first, so its diagonal on |10⟩ is zero
        let ops = ForgingOperators::build(&integrals(), &JordanWignerMapper).unwrap();
        let s = &ops.observables()[ops.same_spin_index()];
        let mut diag = 0.0;
        for (pauli, c) in s.terms() {
            let (x, z) = pauli.masks();
            if x == 0 {
                let sign = if (1u64 & z).count_ones() % 2 == 0 { 1.0 } else { -1.0 };
                diag += c * sign;
            }
        }
        assert!(diag.abs() < 1e-12);
    }
}
