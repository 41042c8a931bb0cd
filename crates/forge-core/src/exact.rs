//! Exact ground-state energy by full configuration interaction.
//!
//! Builds the spin-orbital Hamiltonian on `2n` Jordan-Wigner qubits (alpha
//! orbital `p` on qubit `p`, beta on `n + p`) and diagonalizes it inside the
//! `(N_α, N_β)` sector. Used as a reference for the forged energy, which is
//! variational and never falls below it.

use nalgebra::{DMatrix, SymmetricEigen};
use num_complex::Complex64;
use rustc_hash::FxHashMap;
use tracing::debug;

use forge_ops::{FermionicOp, JordanWignerMapper, QubitMapper};

use crate::error::{ForgeError, ForgeResult};
use crate::integrals::ElectronicStructureProblem;

/// Largest orbital count accepted; the sector dimension grows combinatorially.
pub const MAX_FCI_ORBITALS: usize = 8;

const INTEGRAL_CUTOFF: f64 = 1e-14;

/// Spin-orbital Hamiltonian without the constant offset.
fn hamiltonian(problem: &ElectronicStructureProblem) -> FermionicOp {
    let n = problem.num_orbitals();
    let h = problem.integrals().one_body();
    let g = problem.integrals().two_body();
    let spin = |sigma: usize, p: usize| (sigma * n + p) as u32;

    let mut op = FermionicOp::zero();
    for sigma in 0..2 {
        for p in 0..n {
            for q in 0..n {
                let v = h[[p, q]];
                if v.abs() >= INTEGRAL_CUTOFF {
                    op.extend_scaled(&FermionicOp::excitation(spin(sigma, p), spin(sigma, q)), v);
                }
            }
        }
    }

    for sigma in 0..2 {
        for tau in 0..2 {
            for p in 0..n {
                for q in 0..n {
                    for r in 0..n {
                        for s in 0..n {
                            let v = g[[p, q, r, s]];
                            if v.abs() < INTEGRAL_CUTOFF {
                                continue;
                            }
                            if sigma == tau && (p == r || q == s) {
                                continue;
                            }
                            let term = FermionicOp::two_body(
                                spin(sigma, p),
                                spin(sigma, q),
                                spin(tau, r),
                                spin(tau, s),
                            );
                            op.extend_scaled(&term, 0.5 * v);
                        }
                    }
                }
            }
        }
    }
    op
}

/// Basis states with `num_alpha` bits set among the low `n` and `num_beta`
/// among the high `n`.
fn sector(n: usize, num_alpha: usize, num_beta: usize) -> Vec<u64> {
    let low = (1u64 << n) - 1;
    (0..1u64 << (2 * n))
        .filter(|b| {
            (b & low).count_ones() as usize == num_alpha
                && (b >> n).count_ones() as usize == num_beta
        })
        .collect()
}

/// Lowest eigenvalue of the Hamiltonian in the problem's particle sector,
/// offset included.
pub fn fci_energy(problem: &ElectronicStructureProblem) -> ForgeResult<f64> {
    let n = problem.num_orbitals();
    if n > MAX_FCI_ORBITALS {
        return Err(ForgeError::Config(format!(
            "exact diagonalization supports at most {MAX_FCI_ORBITALS} orbitals, got {n}"
        )));
    }

    let observable = JordanWignerMapper.map_hermitian(&hamiltonian(problem), 2 * n as u32)?;
    let basis = sector(n, problem.num_alpha(), problem.num_beta());
    let index: FxHashMap<u64, usize> = basis.iter().enumerate().map(|(i, &b)| (b, i)).collect();
    let dim = basis.len();

    let mut matrix = DMatrix::from_element(dim, dim, Complex64::new(0.0, 0.0));
    for (pauli, coeff) in observable.terms() {
        let (x, z) = pauli.masks();
        let y_phase = Complex64::i().powu(pauli.num_y());
        for (col, &b) in basis.iter().enumerate() {
            let Some(&row) = index.get(&(b ^ x)) else {
                continue;
            };
            let sign = if (b & z).count_ones() % 2 == 0 { 1.0 } else { -1.0 };
            matrix[(row, col)] += y_phase * (sign * coeff);
        }
    }

    debug!(orbitals = n, dimension = dim, terms = observable.num_terms(), "FCI matrix built");

    let eig = SymmetricEigen::try_new(matrix, f64::EPSILON, 0).ok_or_else(|| {
        ForgeError::Config("exact diagonalization did not converge".to_string())
    })?;
    let lowest = eig
        .eigenvalues
        .iter()
        .copied()
        .min_by(f64::total_cmp)
        .ok_or_else(|| ForgeError::Config("empty particle sector".to_string()))?;

    Ok(lowest + problem.energy_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, Array4, array};

    #[test]
    fn test_sector_dimension() {
        assert_eq!(sector(2, 1, 1).len(), 4);
        assert_eq!(sector(3, 2, 1).len(), 9);
        assert_eq!(sector(2, 2, 2), vec![0b1111]);
    }

    #[test]
    fn test_one_electron_is_lowest_orbital_energy() {
        let h = array![[-1.0, 0.0], [0.0, 0.5]];
        let g = Array4::zeros((2, 2, 2, 2));
        let problem = ElectronicStructureProblem::new(h, g, 1, 0, 0.25).unwrap();
        assert_abs_diff_eq!(fci_energy(&problem).unwrap(), -0.75, epsilon = 1e-10);
    }

    #[test]
    fn test_closed_shell_single_orbital() {
        // Doubly occupied single orbital: 2h + (00|00).
        let h = Array2::from_elem((1, 1), -1.2);
        let g = Array4::from_elem((1, 1, 1, 1), 0.7);
        let problem = ElectronicStructureProblem::new(h, g, 1, 1, 0.0).unwrap();
        assert_abs_diff_eq!(fci_energy(&problem).unwrap(), -1.7, epsilon = 1e-10);
    }

    #[test]
    fn test_rejects_large_problems() {
        let n = MAX_FCI_ORBITALS + 1;
        let problem = ElectronicStructureProblem::new(
            Array2::zeros((n, n)),
            Array4::zeros((n, n, n, n)),
            1,
            1,
            0.0,
        )
        .unwrap();
        assert!(matches!(fci_energy(&problem), Err(ForgeError::Config(_))));
    }
}
