//! Occupation bitstrings and the U/V bitstring sets of a forged state.
//!
//! Bit `i` of a [`Bitstring`] is the occupation of spatial orbital `i` in
//! one spin sector. A [`BitstringSet`] pairs the n-th `U` bitstring with
//! the n-th `V` bitstring to form one Schmidt term.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::active_space::ActiveSpaceSelection;
use crate::error::{ForgeError, ForgeResult};

/// A non-empty occupation pattern over spatial orbitals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Bitstring(Vec<bool>);

impl Bitstring {
    /// Build from 0/1 entries.
    pub fn new(bits: impl IntoIterator<Item = u8>) -> ForgeResult<Self> {
        let bits = bits
            .into_iter()
            .map(|b| match b {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(ForgeError::InvalidBitstring(format!(
                    "entries must be 0 or 1, got {other}"
                ))),
            })
            .collect::<ForgeResult<Vec<_>>>()?;
        Self::from_bools(bits)
    }

    /// Build from booleans.
    pub fn from_bools(bits: Vec<bool>) -> ForgeResult<Self> {
        if bits.is_empty() {
            return Err(ForgeError::InvalidBitstring("bitstring is empty".into()));
        }
        Ok(Self(bits))
    }

    /// Number of orbitals covered.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; construction rejects empty bitstrings.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Occupation of orbital `i`.
    pub fn get(&self, i: usize) -> bool {
        self.0.get(i).copied().unwrap_or(false)
    }

    /// The bits in orbital order.
    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    /// Number of occupied orbitals.
    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }

    /// Remove the orbitals in `selection`, keeping the others in order.
    ///
    /// Frozen-core positions (below `core_limit`) are expected to be
    /// occupied and discarded virtuals empty; anything else is logged.
    pub fn reduce(
        &self,
        selection: &ActiveSpaceSelection,
        core_limit: usize,
    ) -> ForgeResult<Bitstring> {
        selection.check(self.len())?;
        for &i in selection.removed() {
            let occupied = self.0[i];
            if i < core_limit && !occupied {
                warn!(bitstring = %self, orbital = i, "frozen core orbital is unoccupied");
            } else if i >= core_limit && occupied {
                warn!(bitstring = %self, orbital = i, "discarded virtual orbital is occupied");
            }
        }
        let kept: Vec<bool> = self
            .0
            .iter()
            .enumerate()
            .filter(|(i, _)| !selection.contains(*i))
            .map(|(_, &b)| b)
            .collect();
        Bitstring::from_bools(kept).map_err(|_| {
            ForgeError::InvalidBitstring(format!("selection removes every orbital of {self}"))
        })
    }
}

impl fmt::Display for Bitstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Bitstring {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bitstring::new(s.trim().bytes().map(|c| c.wrapping_sub(b'0')))
    }
}

impl TryFrom<Vec<u8>> for Bitstring {
    type Error = ForgeError;

    fn try_from(bits: Vec<u8>) -> Result<Self, Self::Error> {
        Bitstring::new(bits)
    }
}

impl From<Bitstring> for Vec<u8> {
    fn from(bits: Bitstring) -> Self {
        bits.0.into_iter().map(u8::from).collect()
    }
}

/// Reduce every bitstring in `bitstrings` to the active space.
///
/// All inputs must have length `num_orbitals`.
pub fn reduce(
    bitstrings: &[Bitstring],
    selection: &ActiveSpaceSelection,
    num_orbitals: usize,
    core_limit: usize,
) -> ForgeResult<Vec<Bitstring>> {
    selection.check(num_orbitals)?;
    bitstrings
        .iter()
        .map(|b| {
            if b.len() != num_orbitals {
                return Err(ForgeError::InvalidBitstring(format!(
                    "{b} has length {}, expected {num_orbitals}",
                    b.len()
                )));
            }
            b.reduce(selection, core_limit)
        })
        .collect()
}

/// Bitstrings as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bitstrings {
    /// One list used for both subsystems (`U = V`).
    Symmetric(Vec<Bitstring>),
    /// Independently supplied lists for asymmetric forging.
    Pair {
        /// Bitstrings of the first subsystem.
        u: Vec<Bitstring>,
        /// Bitstrings of the second subsystem.
        v: Vec<Bitstring>,
    },
}

impl Bitstrings {
    /// Validate into a [`BitstringSet`].
    pub fn into_set(self) -> ForgeResult<BitstringSet> {
        match self {
            Bitstrings::Symmetric(list) => BitstringSet::symmetric(list),
            Bitstrings::Pair { u, v } => BitstringSet::new(u, v),
        }
    }
}

impl From<Vec<Bitstring>> for Bitstrings {
    fn from(list: Vec<Bitstring>) -> Self {
        Bitstrings::Symmetric(list)
    }
}

/// Validated U and V bitstring lists.
///
/// Both lists are non-empty, equally long, and every bitstring has the
/// same length. Duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitstringSet {
    u: Vec<Bitstring>,
    v: Vec<Bitstring>,
}

impl BitstringSet {
    /// Build an asymmetric set.
    pub fn new(u: Vec<Bitstring>, v: Vec<Bitstring>) -> ForgeResult<Self> {
        if u.is_empty() {
            return Err(ForgeError::InvalidBitstring("no bitstrings given".into()));
        }
        if u.len() != v.len() {
            return Err(ForgeError::InvalidBitstring(format!(
                "U has {} bitstrings but V has {}",
                u.len(),
                v.len()
            )));
        }
        let width = u[0].len();
        if let Some(bad) = u.iter().chain(&v).find(|b| b.len() != width) {
            return Err(ForgeError::InvalidBitstring(format!(
                "mixed lengths: {bad} has length {}, expected {width}",
                bad.len()
            )));
        }
        Ok(Self { u, v })
    }

    /// Build a symmetric set with `U = V = list`.
    pub fn symmetric(list: Vec<Bitstring>) -> ForgeResult<Self> {
        Self::new(list.clone(), list)
    }

    /// Bitstrings of the first subsystem.
    pub fn u(&self) -> &[Bitstring] {
        &self.u
    }

    /// Bitstrings of the second subsystem.
    pub fn v(&self) -> &[Bitstring] {
        &self.v
    }

    /// Number of Schmidt terms, duplicates included.
    pub fn len(&self) -> usize {
        self.u.len()
    }

    /// Always `false` for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
    }

    /// Length of every bitstring.
    pub fn num_orbitals(&self) -> usize {
        self.u[0].len()
    }

    /// Whether `U` and `V` are the same list.
    pub fn is_symmetric(&self) -> bool {
        self.u == self.v
    }

    /// The `(U[n], V[n])` pairs in order.
    pub fn pairs(&self) -> impl Iterator<Item = (&Bitstring, &Bitstring)> {
        self.u.iter().zip(&self.v)
    }

    /// Reduce both lists to the active space.
    pub fn reduce(
        &self,
        selection: &ActiveSpaceSelection,
        core_limit: usize,
    ) -> ForgeResult<BitstringSet> {
        let n = self.num_orbitals();
        Ok(Self {
            u: reduce(&self.u, selection, n, core_limit)?,
            v: reduce(&self.v, selection, n, core_limit)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bs(s: &str) -> Bitstring {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let b = bs("1010");
        assert_eq!(b.len(), 4);
        assert_eq!(b.count_ones(), 2);
        assert!(b.get(0) && !b.get(1));
        assert_eq!(b.to_string(), "1010");
    }

    #[test]
    fn test_rejects_bad_entries() {
        assert!(Bitstring::new([0, 2]).is_err());
        assert!(Bitstring::new([]).is_err());
        assert!("10x".parse::<Bitstring>().is_err());
    }

    #[test]
    fn test_serde_as_list() {
        let b: Bitstring = serde_json::from_str("[1, 0, 1]").unwrap();
        assert_eq!(b, bs("101"));
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1,0,1]");
        assert!(serde_json::from_str::<Bitstring>("[1, 3]").is_err());
    }

    #[test]
    fn test_reduce_keeps_order() {
        let sel = ActiveSpaceSelection::new([0, 3]).unwrap();
        let reduced = bs("11001").reduce(&sel, 1).unwrap();
        assert_eq!(reduced, bs("101"));
    }

    #[test]
    fn test_reduce_length_mismatch() {
        let sel = ActiveSpaceSelection::new([0]).unwrap();
        let err = reduce(&[bs("110"), bs("10")], &sel, 3, 1).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidBitstring(_)));
    }

    #[test]
    fn test_reduce_out_of_range_selection() {
        let sel = ActiveSpaceSelection::new([5]).unwrap();
        assert!(reduce(&[bs("110")], &sel, 3, 1).is_err());
    }

    #[test]
    fn test_reduce_everything_fails() {
        let sel = ActiveSpaceSelection::new([0, 1]).unwrap();
        assert!(bs("10").reduce(&sel, 1).is_err());
    }

    #[test]
    fn test_set_validation() {
        assert!(BitstringSet::new(vec![bs("10")], vec![]).is_err());
        assert!(BitstringSet::new(vec![bs("10")], vec![bs("100")]).is_err());
        assert!(BitstringSet::symmetric(vec![]).is_err());

        let set = BitstringSet::symmetric(vec![bs("10"), bs("01")]).unwrap();
        assert!(set.is_symmetric());
        assert_eq!(set.len(), 2);
        assert_eq!(set.num_orbitals(), 2);
    }

    #[test]
    fn test_bitstrings_untagged_serde() {
        let sym: Bitstrings = serde_json::from_str("[[1,0],[0,1]]").unwrap();
        assert!(matches!(sym, Bitstrings::Symmetric(ref l) if l.len() == 2));

        let pair: Bitstrings = serde_json::from_str(r#"{"u": [[1,0]], "v": [[0,1]]}"#).unwrap();
        let set = pair.into_set().unwrap();
        assert!(!set.is_symmetric());
    }
}
