//! Electronic-structure integrals and the driver contract that supplies them.
//!
//! Two-body integrals are stored in chemist notation, `g[[p, q, r, s]] =
//! (pq|rs)`, over real spatial orbitals.

use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, ForgeResult};

/// Largest relative deviation accepted between symmetry-related integrals.
const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// One- and two-body integrals plus a constant energy offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegralTensors {
    one_body: Array2<f64>,
    two_body: Array4<f64>,
    offset: f64,
}

impl IntegralTensors {
    /// Validate shapes and permutational symmetry and wrap the tensors.
    ///
    /// `h` must be symmetric and `(pq|rs) = (qp|rs) = (rs|pq)` must hold.
    pub fn new(one_body: Array2<f64>, two_body: Array4<f64>, offset: f64) -> ForgeResult<Self> {
        let n = one_body.nrows();
        if n == 0 {
            return Err(ForgeError::IntegralShape("no orbitals".into()));
        }
        if one_body.ncols() != n {
            return Err(ForgeError::IntegralShape(format!(
                "one-body tensor is {}x{}, expected square",
                n,
                one_body.ncols()
            )));
        }
        if two_body.shape() != [n, n, n, n] {
            return Err(ForgeError::IntegralShape(format!(
                "two-body tensor has shape {:?}, expected [{n}, {n}, {n}, {n}]",
                two_body.shape()
            )));
        }
        if !offset.is_finite()
            || one_body.iter().chain(two_body.iter()).any(|v| !v.is_finite())
        {
            return Err(ForgeError::IntegralShape("non-finite integral".into()));
        }
        check_symmetry(&one_body, &two_body)?;
        Ok(Self {
            one_body,
            two_body,
            offset,
        })
    }

    /// Build from nested vectors as they appear in problem files.
    pub fn from_nested(
        one_body: &[Vec<f64>],
        two_body: &[Vec<Vec<Vec<f64>>>],
        offset: f64,
    ) -> ForgeResult<Self> {
        Self::new(nested_2d(one_body)?, nested_4d(two_body)?, offset)
    }

    /// Number of spatial orbitals.
    pub fn num_orbitals(&self) -> usize {
        self.one_body.nrows()
    }

    /// `h[p][q]`.
    pub fn one_body(&self) -> &Array2<f64> {
        &self.one_body
    }

    /// `(pq|rs)`.
    pub fn two_body(&self) -> &Array4<f64> {
        &self.two_body
    }

    /// Constant energy added to the electronic energy.
    pub fn offset(&self) -> f64 {
        self.offset
    }
}

fn check_symmetry(h: &Array2<f64>, g: &Array4<f64>) -> ForgeResult<()> {
    let close = |a: f64, b: f64| (a - b).abs() <= SYMMETRY_TOLERANCE * a.abs().max(b.abs()).max(1.0);

    for ((p, q), &v) in h.indexed_iter() {
        if q < p && !close(v, h[[q, p]]) {
            return Err(ForgeError::IntegralShape(format!(
                "one-body tensor is not symmetric: h[{p}][{q}] = {v}, h[{q}][{p}] = {}",
                h[[q, p]]
            )));
        }
    }
    for ((p, q, r, s), &v) in g.indexed_iter() {
        if !close(v, g[[q, p, r, s]]) || !close(v, g[[r, s, p, q]]) {
            return Err(ForgeError::IntegralShape(format!(
                "two-body tensor breaks (pq|rs) = (qp|rs) = (rs|pq) at ({p}{q}|{r}{s})"
            )));
        }
    }
    Ok(())
}

pub(crate) fn nested_2d(rows: &[Vec<f64>]) -> ForgeResult<Array2<f64>> {
    let n = rows.len();
    let m = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != m) {
        return Err(ForgeError::IntegralShape("ragged matrix".into()));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((n, m), flat).map_err(|e| ForgeError::IntegralShape(e.to_string()))
}

fn nested_4d(blocks: &[Vec<Vec<Vec<f64>>>]) -> ForgeResult<Array4<f64>> {
    let n = blocks.len();
    let mut flat = Vec::with_capacity(n.pow(4));
    for a in blocks {
        if a.len() != n {
            return Err(ForgeError::IntegralShape("ragged two-body tensor".into()));
        }
        for b in a {
            if b.len() != n || b.iter().any(|c| c.len() != n) {
                return Err(ForgeError::IntegralShape("ragged two-body tensor".into()));
            }
            flat.extend(b.iter().flatten().copied());
        }
    }
    Array4::from_shape_vec((n, n, n, n), flat)
        .map_err(|e| ForgeError::IntegralShape(e.to_string()))
}

/// Integrals plus particle counts: everything the solver needs to know
/// about a molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectronicStructureProblem {
    integrals: IntegralTensors,
    num_alpha: usize,
    num_beta: usize,
}

impl ElectronicStructureProblem {
    /// Validate and build from raw MO-basis tensors.
    pub fn new(
        one_body: Array2<f64>,
        two_body: Array4<f64>,
        num_alpha: usize,
        num_beta: usize,
        nuclear_repulsion: f64,
    ) -> ForgeResult<Self> {
        let integrals = IntegralTensors::new(one_body, two_body, nuclear_repulsion)?;
        Self::from_integrals(integrals, num_alpha, num_beta)
    }

    /// Attach particle counts to validated integrals.
    pub fn from_integrals(
        integrals: IntegralTensors,
        num_alpha: usize,
        num_beta: usize,
    ) -> ForgeResult<Self> {
        let n = integrals.num_orbitals();
        if num_alpha > n || num_beta > n {
            return Err(ForgeError::IntegralShape(format!(
                "{num_alpha} alpha and {num_beta} beta electrons do not fit {n} orbitals"
            )));
        }
        Ok(Self {
            integrals,
            num_alpha,
            num_beta,
        })
    }

    /// The integral tensors.
    pub fn integrals(&self) -> &IntegralTensors {
        &self.integrals
    }

    /// Number of spatial orbitals.
    pub fn num_orbitals(&self) -> usize {
        self.integrals.num_orbitals()
    }

    /// Alpha electron count.
    pub fn num_alpha(&self) -> usize {
        self.num_alpha
    }

    /// Beta electron count.
    pub fn num_beta(&self) -> usize {
        self.num_beta
    }

    /// Constant offset: nuclear repulsion, plus the frozen-core energy once
    /// the problem has been reduced.
    pub fn energy_offset(&self) -> f64 {
        self.integrals.offset()
    }
}

/// Source of an [`ElectronicStructureProblem`].
///
/// Geometry handling, basis sets and SCF live behind this trait; the solver
/// only consumes the resulting integrals.
pub trait ChemistryDriver {
    /// Produce the problem.
    fn problem(&self) -> ForgeResult<ElectronicStructureProblem>;
}

/// Basis the driver's tensors are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegralBasis {
    /// Molecular-orbital integrals, used as-is.
    Molecular {
        /// `h[p][q]` over MOs.
        one_body: Array2<f64>,
        /// `(pq|rs)` over MOs.
        two_body: Array4<f64>,
    },
    /// Atomic-orbital integrals and the MO coefficient matrix `C`
    /// (AOs along rows, MOs along columns).
    Atomic {
        /// `h[μ][ν]` over AOs.
        one_body: Array2<f64>,
        /// `(μν|λσ)` over AOs.
        two_body: Array4<f64>,
        /// MO coefficients.
        mo_coeff: Array2<f64>,
    },
}

/// A driver for precomputed integrals.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegralDriver {
    basis: IntegralBasis,
    num_alpha: usize,
    num_beta: usize,
    nuclear_repulsion: f64,
}

impl IntegralDriver {
    /// Integrals already in the MO basis.
    pub fn molecular(
        one_body: Array2<f64>,
        two_body: Array4<f64>,
        num_alpha: usize,
        num_beta: usize,
        nuclear_repulsion: f64,
    ) -> Self {
        Self {
            basis: IntegralBasis::Molecular { one_body, two_body },
            num_alpha,
            num_beta,
            nuclear_repulsion,
        }
    }

    /// AO integrals to be transformed with `mo_coeff`.
    pub fn atomic(
        one_body: Array2<f64>,
        two_body: Array4<f64>,
        mo_coeff: Array2<f64>,
        num_alpha: usize,
        num_beta: usize,
        nuclear_repulsion: f64,
    ) -> Self {
        Self {
            basis: IntegralBasis::Atomic {
                one_body,
                two_body,
                mo_coeff,
            },
            num_alpha,
            num_beta,
            nuclear_repulsion,
        }
    }
}

impl ChemistryDriver for IntegralDriver {
    fn problem(&self) -> ForgeResult<ElectronicStructureProblem> {
        let (one_body, two_body) = match &self.basis {
            IntegralBasis::Molecular { one_body, two_body } => {
                (one_body.clone(), two_body.clone())
            }
            IntegralBasis::Atomic {
                one_body,
                two_body,
                mo_coeff,
            } => {
                let n_ao = one_body.nrows();
                if mo_coeff.nrows() != n_ao || two_body.shape() != [n_ao, n_ao, n_ao, n_ao] {
                    return Err(ForgeError::IntegralShape(format!(
                        "mo_coeff has shape {:?}, integrals cover {n_ao} AOs",
                        mo_coeff.shape()
                    )));
                }
                (
                    mo_coeff.t().dot(one_body).dot(mo_coeff),
                    transform_two_body(two_body, mo_coeff),
                )
            }
        };
        ElectronicStructureProblem::new(
            one_body,
            two_body,
            self.num_alpha,
            self.num_beta,
            self.nuclear_repulsion,
        )
    }
}

/// `(pq|rs) = Σ C_μp C_νq C_λr C_σs (μν|λσ)`, one index at a time.
fn transform_two_body(ao: &Array4<f64>, c: &Array2<f64>) -> Array4<f64> {
    let n_ao = c.nrows();
    let n_mo = c.ncols();

    let mut step = Array4::<f64>::zeros((n_mo, n_ao, n_ao, n_ao));
    for p in 0..n_mo {
        for mu in 0..n_ao {
            let c_mp = c[[mu, p]];
            if c_mp == 0.0 {
                continue;
            }
            for nu in 0..n_ao {
                for la in 0..n_ao {
                    for si in 0..n_ao {
                        step[[p, nu, la, si]] += c_mp * ao[[mu, nu, la, si]];
                    }
                }
            }
        }
    }

    let mut next = Array4::<f64>::zeros((n_mo, n_mo, n_ao, n_ao));
    for p in 0..n_mo {
        for q in 0..n_mo {
            for nu in 0..n_ao {
                let c_nq = c[[nu, q]];
                for la in 0..n_ao {
                    for si in 0..n_ao {
                        next[[p, q, la, si]] += c_nq * step[[p, nu, la, si]];
                    }
                }
            }
        }
    }

    let mut step = Array4::<f64>::zeros((n_mo, n_mo, n_mo, n_ao));
    for p in 0..n_mo {
        for q in 0..n_mo {
            for r in 0..n_mo {
                for la in 0..n_ao {
                    let c_lr = c[[la, r]];
                    for si in 0..n_ao {
                        step[[p, q, r, si]] += c_lr * next[[p, q, la, si]];
                    }
                }
            }
        }
    }

    let mut out = Array4::<f64>::zeros((n_mo, n_mo, n_mo, n_mo));
    for p in 0..n_mo {
        for q in 0..n_mo {
            for r in 0..n_mo {
                for s in 0..n_mo {
                    out[[p, q, r, s]] = (0..n_ao).map(|si| c[[si, s]] * step[[p, q, r, si]]).sum();
                }
            }
        }
    }
    out
}
