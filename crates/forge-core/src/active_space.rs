//! Active-space selection and integral reduction.
//!
//! Removed orbitals below `min(num_alpha, num_beta)` are frozen core and
//! assumed doubly occupied; their mean field is folded into the one-body
//! tensor and their energy into the offset. Other removed orbitals are
//! discarded virtuals and simply dropped.

use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ForgeError, ForgeResult};
use crate::integrals::{ElectronicStructureProblem, IntegralTensors};

/// Orbital indices to remove from the problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct ActiveSpaceSelection {
    removed: Vec<usize>,
}

impl ActiveSpaceSelection {
    /// Build from indices, rejecting duplicates.
    pub fn new(indices: impl IntoIterator<Item = usize>) -> ForgeResult<Self> {
        let mut removed: Vec<usize> = indices.into_iter().collect();
        removed.sort_unstable();
        if let Some(w) = removed.windows(2).find(|w| w[0] == w[1]) {
            return Err(ForgeError::InvalidBitstring(format!(
                "orbital {} selected twice",
                w[0]
            )));
        }
        Ok(Self { removed })
    }

    /// Remove nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether nothing is removed.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    /// Number of removed orbitals.
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    /// Removed indices, ascending.
    pub fn removed(&self) -> &[usize] {
        &self.removed
    }

    /// Whether orbital `i` is removed.
    pub fn contains(&self, i: usize) -> bool {
        self.removed.binary_search(&i).is_ok()
    }

    /// Fail if any index is outside `0..num_orbitals`.
    pub fn check(&self, num_orbitals: usize) -> ForgeResult<()> {
        match self.removed.last() {
            Some(&max) if max >= num_orbitals => Err(ForgeError::InvalidBitstring(format!(
                "orbital {max} is out of range for {num_orbitals} orbitals"
            ))),
            _ => Ok(()),
        }
    }

    /// Retained orbitals, ascending.
    pub fn active(&self, num_orbitals: usize) -> Vec<usize> {
        (0..num_orbitals).filter(|&i| !self.contains(i)).collect()
    }

    /// Removed orbitals treated as doubly occupied core.
    pub fn frozen(&self, core_limit: usize) -> Vec<usize> {
        self.removed
            .iter()
            .copied()
            .filter(|&i| i < core_limit)
            .collect()
    }
}

impl TryFrom<Vec<usize>> for ActiveSpaceSelection {
    type Error = ForgeError;

    fn try_from(indices: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(indices)
    }
}

impl From<ActiveSpaceSelection> for Vec<usize> {
    fn from(selection: ActiveSpaceSelection) -> Self {
        selection.removed
    }
}

impl ElectronicStructureProblem {
    /// Index below which removed orbitals count as frozen core.
    pub fn core_limit(&self) -> usize {
        self.num_alpha().min(self.num_beta())
    }

    /// Project the problem onto the active space of `selection`.
    pub fn reduce(&self, selection: &ActiveSpaceSelection) -> ForgeResult<ElectronicStructureProblem> {
        let n = self.num_orbitals();
        selection.check(n)?;
        if selection.len() == n {
            return Err(ForgeError::InvalidBitstring(
                "selection removes every orbital".into(),
            ));
        }
        let occ = selection.frozen(self.core_limit());
        let act = selection.active(n);
        let ints = self.integrals();
        let h = ints.one_body();
        let g = ints.two_body();

        let mut core_energy = 0.0;
        for &i in &occ {
            core_energy += 2.0 * h[[i, i]];
            for &j in &occ {
                core_energy += 2.0 * g[[i, i, j, j]] - g[[i, j, j, i]];
            }
        }

        let m = act.len();
        let one_body = Array2::from_shape_fn((m, m), |(a, b)| {
            let (p, q) = (act[a], act[b]);
            h[[p, q]]
                + occ
                    .iter()
                    .map(|&i| 2.0 * g[[p, q, i, i]] - g[[p, i, i, q]])
                    .sum::<f64>()
        });
        let two_body =
            Array4::from_shape_fn((m, m, m, m), |(a, b, c, d)| g[[act[a], act[b], act[c], act[d]]]);

        debug!(
            frozen = occ.len(),
            discarded = selection.len() - occ.len(),
            active = m,
            core_energy,
            "Reduced integrals to active space"
        );

        let integrals = IntegralTensors::new(one_body, two_body, ints.offset() + core_energy)?;
        ElectronicStructureProblem::from_integrals(
            integrals,
            self.num_alpha() - occ.len(),
            self.num_beta() - occ.len(),
        )
    }
}
