//! Event descriptors
//!
//! An event carries one observability flag and one controllability flag per
//! controller. Both vectors always have length `nControllers`; controller
//! indices are 1-based (index 0 is the system view, which observes every
//! plain event).

use serde::{Deserialize, Serialize};

use crate::{EventId, SupraError, SupraResult};

/// An event of a discrete-event system
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Dense 1-based identity within the owning automaton
    pub id: EventId,
    /// Unique label within the owning automaton
    pub label: String,
    /// Per-controller observability, length `nControllers`
    pub observable: Vec<bool>,
    /// Per-controller controllability, length `nControllers`
    pub controllable: Vec<bool>,
}

impl Event {
    pub fn new(id: EventId, label: impl Into<String>, observable: Vec<bool>, controllable: Vec<bool>) -> Self {
        debug_assert_eq!(observable.len(), controllable.len());
        Event {
            id,
            label: label.into(),
            observable,
            controllable,
        }
    }

    /// Number of controllers this event is described for
    #[inline]
    pub fn n_controllers(&self) -> usize {
        self.observable.len()
    }

    /// Is this event observable to the given 1-based controller?
    ///
    /// Controller index 0 (the system view) observes every event.
    pub fn is_observable_to(&self, controller: usize) -> SupraResult<bool> {
        if controller == 0 {
            return Ok(true);
        }
        self.observable
            .get(controller - 1)
            .copied()
            .ok_or(SupraError::InvalidControllerIndex {
                index: controller,
                n_controllers: self.n_controllers(),
            })
    }

    /// Is this event controllable by the given 1-based controller?
    pub fn is_controllable_by(&self, controller: usize) -> SupraResult<bool> {
        if controller == 0 {
            return Ok(false);
        }
        self.controllable
            .get(controller - 1)
            .copied()
            .ok_or(SupraError::InvalidControllerIndex {
                index: controller,
                n_controllers: self.n_controllers(),
            })
    }

    /// Number of controllers that can control this event
    pub fn controllable_count(&self) -> usize {
        self.controllable.iter().filter(|&&c| c).count()
    }

    /// Is this event controllable by at least one controller?
    pub fn is_controllable(&self) -> bool {
        self.controllable.iter().any(|&c| c)
    }

    /// Events with the same label must agree on every attribute when two
    /// automata are combined.
    pub fn compatible_with(&self, other: &Event) -> bool {
        self.label != other.label
            || (self.observable == other.observable && self.controllable == other.controllable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(label: &str, observable: Vec<bool>, controllable: Vec<bool>) -> Event {
        Event::new(EventId::new(1), label, observable, controllable)
    }

    #[test]
    fn test_observability_indexing() {
        let e = event("a", vec![true, false], vec![false, true]);
        assert!(e.is_observable_to(0).unwrap());
        assert!(e.is_observable_to(1).unwrap());
        assert!(!e.is_observable_to(2).unwrap());
        assert!(matches!(
            e.is_observable_to(3),
            Err(SupraError::InvalidControllerIndex { index: 3, .. })
        ));
    }

    #[test]
    fn test_controllability() {
        let e = event("a", vec![true, true], vec![false, true]);
        assert!(!e.is_controllable_by(1).unwrap());
        assert!(e.is_controllable_by(2).unwrap());
        assert_eq!(e.controllable_count(), 1);
        assert!(e.is_controllable());
    }

    #[test]
    fn test_compatibility() {
        let a = event("a", vec![true], vec![false]);
        let a2 = event("a", vec![true], vec![false]);
        let a3 = event("a", vec![false], vec![false]);
        let b = event("b", vec![false], vec![true]);

        assert!(a.compatible_with(&a2));
        assert!(!a.compatible_with(&a3));
        // Different labels never conflict.
        assert!(a.compatible_with(&b));
    }
}
