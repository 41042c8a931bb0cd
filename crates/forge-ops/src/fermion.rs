//! Second-quantized fermionic operators.

use serde::{Deserialize, Serialize};

/// A single creation or annihilation operator on a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ladder {
    /// `a†_p`.
    Create(u32),
    /// `a_p`.
    Annihilate(u32),
}

impl Ladder {
    /// The mode this operator acts on.
    pub fn mode(self) -> u32 {
        match self {
            Ladder::Create(p) | Ladder::Annihilate(p) => p,
        }
    }
}

/// A real-weighted sum of products of ladder operators.
///
/// Products are stored in application order from left to right, so
/// `[Create(p), Annihilate(q)]` is `a†_p a_q`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FermionicOp {
    terms: Vec<(Vec<Ladder>, f64)>,
}

impl FermionicOp {
    /// The zero operator.
    pub fn zero() -> Self {
        Self::default()
    }

    /// A single weighted product.
    pub fn term(ops: impl IntoIterator<Item = Ladder>, coeff: f64) -> Self {
        Self {
            terms: vec![(ops.into_iter().collect(), coeff)],
        }
    }

    /// Number operator `a†_p a_p`.
    pub fn number(p: u32) -> Self {
        Self::excitation(p, p)
    }

    /// One-body excitation `a†_p a_q`.
    pub fn excitation(p: u32, q: u32) -> Self {
        Self::term([Ladder::Create(p), Ladder::Annihilate(q)], 1.0)
    }

    /// Hermitian part of the excitation, `(a†_p a_q + a†_q a_p) / 2`.
    pub fn symmetric_excitation(p: u32, q: u32) -> Self {
        if p == q {
            return Self::number(p);
        }
        let mut op = Self::term([Ladder::Create(p), Ladder::Annihilate(q)], 0.5);
        op.push([Ladder::Create(q), Ladder::Annihilate(p)], 0.5);
        op
    }

    /// Two-body product `a†_p a†_r a_s a_q`, matching the chemist-notation
    /// integral `(pq|rs)`.
    pub fn two_body(p: u32, q: u32, r: u32, s: u32) -> Self {
        Self::term(
            [
                Ladder::Create(p),
                Ladder::Create(r),
                Ladder::Annihilate(s),
                Ladder::Annihilate(q),
            ],
            1.0,
        )
    }

    /// Append a weighted product.
    pub fn push(&mut self, ops: impl IntoIterator<Item = Ladder>, coeff: f64) {
        self.terms.push((ops.into_iter().collect(), coeff));
    }

    /// Append all terms of `other` scaled by `factor`.
    pub fn extend_scaled(&mut self, other: &FermionicOp, factor: f64) {
        self.terms
            .extend(other.terms.iter().map(|(ops, c)| (ops.clone(), c * factor)));
    }

    /// All terms.
    pub fn terms(&self) -> &[(Vec<Ladder>, f64)] {
        &self.terms
    }

    /// Number of stored products.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Largest mode index referenced.
    pub fn max_mode(&self) -> Option<u32> {
        self.terms
            .iter()
            .flat_map(|(ops, _)| ops.iter().map(|l| l.mode()))
            .max()
    }
}
