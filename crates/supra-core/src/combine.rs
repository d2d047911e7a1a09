//! Combined-ID arithmetic for product constructions
//!
//! Product constructions derive the identity of a synthetic state from the
//! identities of its member states. Two encodings are provided behind one
//! interface:
//!
//! - a fixed-width fast path: the pairing function
//!   `combine_pair(id1, id2, max) = (id2 - 1) * max + id1` and its N-ary
//!   generalization via base-`(max + 1)` positional encoding, both injective
//!   over member IDs in `[1, max]`;
//! - an arbitrary-width fallback holding the positional digits directly, for
//!   state spaces where `nStates^(nControllers + 1)` exceeds the 64-bit
//!   range.
//!
//! The fallback is mandatory whenever the bound can overflow; callers decide
//! once via [`fits_fixed`] and then combine uniformly through
//! [`CompositeId::combine`].

use crate::{SupraError, SupraResult};

/// Combine two 1-based IDs into one, injective over `[1, max]²`.
///
/// `combine_pair(id1, id2, max) = (id2 - 1) * max + id1`.
pub fn combine_pair(id1: u64, id2: u64, max: u64) -> SupraResult<u64> {
    debug_assert!(id1 >= 1 && id1 <= max);
    debug_assert!(id2 >= 1 && id2 <= max);
    (id2 - 1)
        .checked_mul(max)
        .and_then(|x| x.checked_add(id1))
        .ok_or(SupraError::IdOverflow)
}

/// Invert [`combine_pair`]. Combined values are 1-based like the IDs.
pub fn separate_pair(combined: u64, max: u64) -> (u64, u64) {
    debug_assert!(combined >= 1, "combined IDs are 1-based");
    let id1 = (combined - 1) % max + 1;
    let id2 = (combined - 1) / max + 1;
    (id1, id2)
}

/// Combine a non-empty list of 1-based IDs via base-`(max + 1)` positional
/// encoding. Injective for all components in `[1, max]`.
pub fn combine_ids(ids: &[u64], max: u64) -> SupraResult<u64> {
    let base = max.checked_add(1).ok_or(SupraError::IdOverflow)?;
    let mut combined: u64 = 0;
    for &id in ids {
        debug_assert!(id >= 1 && id <= max);
        combined = combined
            .checked_mul(base)
            .and_then(|x| x.checked_add(id))
            .ok_or(SupraError::IdOverflow)?;
    }
    Ok(combined)
}

/// Invert [`combine_ids`] for a known component count.
pub fn separate_ids(combined: u64, max: u64, count: usize) -> Vec<u64> {
    let base = max + 1;
    let mut remaining = combined;
    let mut ids = vec![0u64; count];
    for slot in ids.iter_mut().rev() {
        *slot = remaining % base;
        remaining /= base;
    }
    ids
}

/// Whether `count` positional digits in base `(max + 1)` fit in a `u64`.
pub fn fits_fixed(max: u64, count: usize) -> bool {
    let base = match max.checked_add(1) {
        Some(b) => b,
        None => return false,
    };
    let mut acc: u64 = 1;
    for _ in 0..count {
        acc = match acc.checked_mul(base) {
            Some(v) => v,
            None => return false,
        };
    }
    true
}

/// A combined identity over either encoding.
///
/// `Wide` stores the positional digits themselves (most significant first),
/// which is the canonical arbitrary-width representation of the same base-
/// `(max + 1)` integer and compares/hashes identically to it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum CompositeId {
    Fixed(u64),
    Wide(Vec<u64>),
}

impl CompositeId {
    /// Combine member IDs, choosing the encoding from the overflow bound.
    pub fn combine(ids: &[u64], max: u64) -> CompositeId {
        if fits_fixed(max, ids.len()) {
            // Unwrap is unreachable: fits_fixed just proved the bound.
            match combine_ids(ids, max) {
                Ok(v) => CompositeId::Fixed(v),
                Err(_) => CompositeId::Wide(ids.to_vec()),
            }
        } else {
            CompositeId::Wide(ids.to_vec())
        }
    }

    /// Recover the member IDs.
    pub fn separate(&self, max: u64, count: usize) -> Vec<u64> {
        match self {
            CompositeId::Fixed(v) => separate_ids(*v, max, count),
            CompositeId::Wide(ids) => ids.clone(),
        }
    }

    /// The fixed-width value, when this identity took the fast path.
    pub fn as_fixed(&self) -> Option<u64> {
        match self {
            CompositeId::Fixed(v) => Some(*v),
            CompositeId::Wide(_) => None,
        }
    }
}
