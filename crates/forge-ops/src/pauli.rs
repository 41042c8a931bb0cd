//! Pauli strings and their products.
//!
//! A Pauli string is a tensor product of single-qubit Pauli operators.
//! Products of strings pick up a phase in {±1, ±i}, which is tracked
//! explicitly so that fermionic operators can be expanded exactly.
//!
//! # Example
//!
//! ```rust
//! use forge_ops::pauli::{PauliOp, PauliString};
//! use num_complex::Complex64;
//!
//! let x = PauliString::from_ops([(0, PauliOp::X)]);
//! let y = PauliString::from_ops([(0, PauliOp::Y)]);
//! let (phase, z) = x.mul(&y);
//!
//! assert_eq!(phase, Complex64::new(0.0, 1.0));
//! assert_eq!(z, PauliString::from_ops([(0, PauliOp::Z)]));
//! ```

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Single-qubit Pauli operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PauliOp {
    /// Identity.
    I,
    /// Pauli-X.
    X,
    /// Pauli-Y.
    Y,
    /// Pauli-Z.
    Z,
}

impl PauliOp {
    /// Product `self · rhs` as (phase, operator).
    pub fn mul(self, rhs: PauliOp) -> (Complex64, PauliOp) {
        let one = Complex64::new(1.0, 0.0);
        let i = Complex64::new(0.0, 1.0);
        match (self, rhs) {
            (PauliOp::I, p) | (p, PauliOp::I) => (one, p),
            (PauliOp::X, PauliOp::X) | (PauliOp::Y, PauliOp::Y) | (PauliOp::Z, PauliOp::Z) => {
                (one, PauliOp::I)
            }
            (PauliOp::X, PauliOp::Y) => (i, PauliOp::Z),
            (PauliOp::Y, PauliOp::Z) => (i, PauliOp::X),
            (PauliOp::Z, PauliOp::X) => (i, PauliOp::Y),
            (PauliOp::Y, PauliOp::X) => (-i, PauliOp::Z),
            (PauliOp::Z, PauliOp::Y) => (-i, PauliOp::X),
            (PauliOp::X, PauliOp::Z) => (-i, PauliOp::Y),
        }
    }

    fn symbol(self) -> char {
        match self {
            PauliOp::I => 'I',
            PauliOp::X => 'X',
            PauliOp::Y => 'Y',
            PauliOp::Z => 'Z',
        }
    }
}

/// A tensor product of Pauli operators on indexed qubits.
///
/// Stored as a sorted `Vec<(qubit_index, PauliOp)>` with identity factors
/// omitted. Qubits not listed are implicitly I.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PauliString {
    ops: Vec<(u32, PauliOp)>,
}

impl PauliString {
    /// The identity string.
    pub fn identity() -> Self {
        Self { ops: vec![] }
    }

    /// Construct from (qubit, op) pairs.
    ///
    /// Identity factors are dropped and the rest sorted by qubit. When a
    /// qubit appears more than once the last entry wins.
    pub fn from_ops(ops: impl IntoIterator<Item = (u32, PauliOp)>) -> Self {
        let mut v: Vec<(u32, PauliOp)> = ops.into_iter().collect();
        v.sort_by_key(|(q, _)| *q);
        let mut out: Vec<(u32, PauliOp)> = Vec::with_capacity(v.len());
        for (q, op) in v {
            match out.last_mut() {
                Some(last) if last.0 == q => last.1 = op,
                _ => out.push((q, op)),
            }
        }
        out.retain(|(_, op)| *op != PauliOp::I);
        Self { ops: out }
    }

    /// Single-qubit string.
    pub fn single(qubit: u32, op: PauliOp) -> Self {
        Self::from_ops([(qubit, op)])
    }

    /// Return the non-identity (qubit, op) pairs, sorted by qubit index.
    pub fn ops(&self) -> &[(u32, PauliOp)] {
        &self.ops
    }

    /// True if there are no non-identity operators.
    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// The highest qubit index referenced, or `None` for the identity.
    pub fn max_qubit(&self) -> Option<u32> {
        self.ops.last().map(|(q, _)| *q)
    }

    /// Bit masks `(x_mask, z_mask)` of the string.
    ///
    /// X sets the x bit, Z the z bit and Y both. On a basis state the
    /// string acts as `P|b⟩ = i^{#Y} (-1)^{|b & z|} |b ^ x⟩`.
    pub fn masks(&self) -> (u64, u64) {
        let mut x = 0u64;
        let mut z = 0u64;
        for &(q, op) in &self.ops {
            let bit = 1u64 << q;
            match op {
                PauliOp::X => x |= bit,
                PauliOp::Z => z |= bit,
                PauliOp::Y => {
                    x |= bit;
                    z |= bit;
                }
                PauliOp::I => {}
            }
        }
        (x, z)
    }

    /// Number of Y factors.
    pub fn num_y(&self) -> u32 {
        self.ops.iter().filter(|(_, op)| *op == PauliOp::Y).count() as u32
    }

    /// Product `self · rhs` as (phase, string).
    pub fn mul(&self, rhs: &PauliString) -> (Complex64, PauliString) {
        let mut phase = Complex64::new(1.0, 0.0);
        let mut ops = Vec::with_capacity(self.ops.len() + rhs.ops.len());
        let (mut i, mut j) = (0, 0);
        while i < self.ops.len() || j < rhs.ops.len() {
            let next = match (self.ops.get(i), rhs.ops.get(j)) {
                (Some(a), Some(b)) => a.0.cmp(&b.0),
                (Some(_), None) => Ordering::Less,
                (None, _) => Ordering::Greater,
            };
            match next {
                Ordering::Less => {
                    ops.push(self.ops[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    ops.push(rhs.ops[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    let (p, op) = self.ops[i].1.mul(rhs.ops[j].1);
                    phase *= p;
                    if op != PauliOp::I {
                        ops.push((self.ops[i].0, op));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        (phase, PauliString { ops })
    }
}

impl fmt::Display for PauliString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return write!(f, "I");
        }
        for (k, (q, op)) in self.ops.iter().enumerate() {
            if k > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}{}", op.symbol(), q)?;
        }
        Ok(())
    }
}
