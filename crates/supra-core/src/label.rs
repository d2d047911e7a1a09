//! Vectorized event labels
//!
//! A label vector is either a plain label or the textual form
//! `<e0,e1,...,en>` where index 0 is the system-level label and indices
//! `1..=n` belong to controllers. The component `*` means "no component
//! here": the controller's projection of the event is absent/unobservable.

use std::fmt;

use crate::{SupraError, SupraResult};

/// The "no component" marker
pub const ABSENT: &str = "*";

/// A plain or vectorized event label
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelVector {
    /// A non-vector label
    Plain(String),
    /// Components indexed `0..=nControllers`
    Vector(Vec<String>),
}

impl LabelVector {
    /// Parse the textual syntax. A string is a vector iff it starts with `<`;
    /// it must then end with `>` and contain no empty components.
    pub fn parse(text: &str) -> SupraResult<LabelVector> {
        if !text.starts_with('<') {
            if text.is_empty() {
                return Err(SupraError::MalformedLabelVector(text.to_string()));
            }
            return Ok(LabelVector::Plain(text.to_string()));
        }
        if !text.ends_with('>') || text.len() < 3 {
            return Err(SupraError::MalformedLabelVector(text.to_string()));
        }
        let inner = &text[1..text.len() - 1];
        let components: Vec<String> = inner.split(',').map(str::to_string).collect();
        if components.iter().any(|c| c.is_empty()) {
            return Err(SupraError::MalformedLabelVector(text.to_string()));
        }
        Ok(LabelVector::Vector(components))
    }

    /// Build a vector from components.
    pub fn from_components(components: Vec<String>) -> LabelVector {
        LabelVector::Vector(components)
    }

    #[inline]
    pub fn is_vector(&self) -> bool {
        matches!(self, LabelVector::Vector(_))
    }

    /// Number of components (1 for a plain label)
    pub fn len(&self) -> usize {
        match self {
            LabelVector::Plain(_) => 1,
            LabelVector::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Component at `index` (a plain label is its own component 0)
    pub fn component(&self, index: usize) -> Option<&str> {
        match self {
            LabelVector::Plain(s) => (index == 0).then_some(s.as_str()),
            LabelVector::Vector(v) => v.get(index).map(String::as_str),
        }
    }

    /// Is the component at `index` present (non-`*`)?
    pub fn has_component(&self, index: usize) -> bool {
        self.component(index).is_some_and(|c| c != ABSENT)
    }

    /// Least upper bound: merge two equal-length vectors, keeping non-`*`
    /// components. `None` when any position carries two different non-`*`
    /// components, or the shapes differ.
    pub fn least_upper_bound(&self, other: &LabelVector) -> Option<LabelVector> {
        let (a, b) = match (self, other) {
            (LabelVector::Vector(a), LabelVector::Vector(b)) if a.len() == b.len() => (a, b),
            _ => return None,
        };
        let mut merged = Vec::with_capacity(a.len());
        for (x, y) in a.iter().zip(b) {
            match (x.as_str(), y.as_str()) {
                (ABSENT, _) => merged.push(y.clone()),
                (_, ABSENT) => merged.push(x.clone()),
                (x, y) if x == y => merged.push(x.to_string()),
                _ => return None,
            }
        }
        Some(LabelVector::Vector(merged))
    }

    /// Strict sub-vector: equal length, agrees with `other` at every position
    /// where `self` is non-`*`, and not identical.
    pub fn is_strict_sub_vector_of(&self, other: &LabelVector) -> bool {
        let (a, b) = match (self, other) {
            (LabelVector::Vector(a), LabelVector::Vector(b)) if a.len() == b.len() => (a, b),
            _ => return false,
        };
        if a == b {
            return false;
        }
        a.iter()
            .zip(b)
            .all(|(x, y)| x == ABSENT || x == y)
    }

    /// Dual of [`is_strict_sub_vector_of`](Self::is_strict_sub_vector_of).
    pub fn is_strict_super_vector_of(&self, other: &LabelVector) -> bool {
        other.is_strict_sub_vector_of(self)
    }

    /// Do the two vectors conflict at some position where both are non-`*`?
    pub fn conflicts_with(&self, other: &LabelVector) -> bool {
        let (a, b) = match (self, other) {
            (LabelVector::Vector(a), LabelVector::Vector(b)) if a.len() == b.len() => (a, b),
            _ => return false,
        };
        a.iter()
            .zip(b)
            .any(|(x, y)| x != ABSENT && y != ABSENT && x != y)
    }
}

impl fmt::Display for LabelVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelVector::Plain(s) => write!(f, "{s}"),
            LabelVector::Vector(v) => write!(f, "<{}>", v.join(",")),
        }
    }
}
