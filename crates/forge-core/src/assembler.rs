//! Energy assembly from measured transition elements.
//!
//! Over the unique pairs `(u_n, v_n)` the forged Hamiltonian is
//!
//! ```text
//! H_nm = Hσ[u_n,u_m] δ(v_n,v_m) + δ(u_n,u_m) Hσ[v_n,v_m]
//!      + Σ_ab W_ab F_a[u_n,u_m] F_b[v_n,v_m]
//! Hσ   = Σ_a w_a F_a + S
//! ```
//!
//! and the energy is its lowest eigenvalue plus the constant offset. The
//! eigenvector holds the Schmidt coefficients.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use num_complex::Complex64;

use crate::evaluator::{MatrixElements, PairArena};
use crate::operators::ForgingOperators;
use crate::result::AuxiliaryValues;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Energy and Schmidt vector of one evaluation.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Total energy, offset included. NaN if the matrix was not finite.
    pub energy: f64,
    /// Normalized Schmidt vector over the arena's unique pairs.
    pub coefficients: Vec<Complex64>,
    /// Auxiliary values, when requested.
    pub aux: Option<AuxiliaryValues>,
}

impl Assembly {
    /// Schmidt coefficients as real numbers, after rotating the largest
    /// component onto the positive real axis.
    pub fn schmidt_coefficients(&self) -> Vec<f64> {
        let Some(pivot) = self
            .coefficients
            .iter()
            .max_by(|a, b| a.norm().total_cmp(&b.norm()))
            .filter(|c| c.norm() > 0.0)
        else {
            return vec![0.0; self.coefficients.len()];
        };
        let phase = *pivot / pivot.norm();
        self.coefficients.iter().map(|c| (*c / phase).re).collect()
    }
}

struct Parts {
    one_body: DMatrix<Complex64>,
    same_spin: DMatrix<Complex64>,
    cross_spin: DMatrix<Complex64>,
    num_alpha: DMatrix<Complex64>,
    num_beta: DMatrix<Complex64>,
}

/// Builds and diagonalizes the Schmidt matrix.
#[derive(Debug, Clone)]
pub struct EnergyAssembler {
    operators: Arc<ForgingOperators>,
    offset: f64,
}

impl EnergyAssembler {
    /// `offset` is added to every energy.
    pub fn new(operators: Arc<ForgingOperators>, offset: f64) -> Self {
        Self { operators, offset }
    }

    /// Constant part of the energy.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    fn parts(&self, arena: &PairArena, elements: &MatrixElements) -> Parts {
        let ops = &self.operators;
        let pairs = arena.pairs();
        let n = pairs.len();
        let na = ops.num_one_body();
        let s = ops.same_spin_index();
        let w = ops.one_body_weights();
        let big_w = ops.cross_weights();
        let numbers: Vec<usize> = ops.number_indices().collect();

        let mut parts = Parts {
            one_body: DMatrix::from_element(n, n, ZERO),
            same_spin: DMatrix::from_element(n, n, ZERO),
            cross_spin: DMatrix::from_element(n, n, ZERO),
            num_alpha: DMatrix::from_element(n, n, ZERO),
            num_beta: DMatrix::from_element(n, n, ZERO),
        };

        for (i, &(ui, vi)) in pairs.iter().enumerate() {
            for (j, &(uj, vj)) in pairs.iter().enumerate() {
                let fu: Vec<Complex64> = (0..na).map(|a| elements.get(a, ui, uj)).collect();
                let fv: Vec<Complex64> = (0..na).map(|a| elements.get(a, vi, vj)).collect();
                let one = |f: &[Complex64]| -> Complex64 {
                    f.iter().zip(w.iter()).map(|(x, wa)| *x * *wa).sum()
                };
                let count = |f: &[Complex64]| -> Complex64 { numbers.iter().map(|&a| f[a]).sum() };

                if vi == vj {
                    parts.one_body[(i, j)] += one(&fu);
                    parts.same_spin[(i, j)] += elements.get(s, ui, uj);
                    parts.num_alpha[(i, j)] += count(&fu);
                }
                if ui == uj {
                    parts.one_body[(i, j)] += one(&fv);
                    parts.same_spin[(i, j)] += elements.get(s, vi, vj);
                    parts.num_beta[(i, j)] += count(&fv);
                }

                let mut cross = ZERO;
                for (a, fa) in fu.iter().enumerate() {
                    if fa.norm() == 0.0 {
                        continue;
                    }
                    let row: Complex64 = fv
                        .iter()
                        .zip(big_w.row(a).iter())
                        .map(|(fb, wab)| *fb * *wab)
                        .sum();
                    cross += *fa * row;
                }
                parts.cross_spin[(i, j)] = cross;
            }
        }
        parts
    }

    /// Energy and Schmidt vector for measured `elements`.
    pub fn assemble(&self, arena: &PairArena, elements: &MatrixElements, aux: bool) -> Assembly {
        let parts = self.parts(arena, elements);
        let h = &parts.one_body + &parts.same_spin + &parts.cross_spin;
        let h = (&h + h.adjoint()) * Complex64::new(0.5, 0.0);

        let diverged = Assembly {
            energy: f64::NAN,
            coefficients: Vec::new(),
            aux: None,
        };
        if h.iter().any(|c| !c.re.is_finite() || !c.im.is_finite()) {
            return diverged;
        }
        let n = h.nrows();
        let Some(eig) = SymmetricEigen::try_new(h, f64::EPSILON, 1000 * n.max(1)) else {
            return diverged;
        };
        let Some((k, &lowest)) = eig
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
        else {
            return diverged;
        };
        let lambda: DVector<Complex64> = eig.eigenvectors.column(k).into_owned();

        let aux = aux.then(|| {
            let expect = |m: &DMatrix<Complex64>| lambda.dotc(&(m * &lambda)).re;
            AuxiliaryValues {
                num_alpha: expect(&parts.num_alpha),
                num_beta: expect(&parts.num_beta),
                one_body_energy: expect(&parts.one_body),
                same_spin_energy: expect(&parts.same_spin),
                cross_spin_energy: expect(&parts.cross_spin),
                offset: self.offset,
            }
        });

        Assembly {
            energy: lowest + self.offset,
            coefficients: lambda.iter().copied().collect(),
            aux,
        }
    }
}
