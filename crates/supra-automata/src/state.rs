//! State graph nodes
//!
//! Transitions carry no explicit source; they are owned by their source
//! state. Composite states (`StateVector`, `StateSet`) are built during
//! product constructions and carry a deterministically derived label used as
//! an identity key.

use serde::{Deserialize, Serialize};
use supra_core::{EventId, StateId};

/// An outgoing transition of a state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub event: EventId,
    pub target: StateId,
}

impl Transition {
    #[inline]
    pub fn new(event: EventId, target: StateId) -> Self {
        Transition { event, target }
    }
}

/// A state of an automaton
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub label: String,
    pub marked: bool,
    /// Set by the observability analysis: this configuration enables the
    /// event under test. Mutually exclusive with `disablement`.
    #[serde(default)]
    pub enablement: bool,
    /// Set by the observability analysis: this configuration disables the
    /// event under test. Mutually exclusive with `enablement`.
    #[serde(default)]
    pub disablement: bool,
    pub transitions: Vec<Transition>,
}

impl State {
    pub fn new(id: StateId, label: impl Into<String>, marked: bool) -> Self {
        State {
            id,
            label: label.into(),
            marked,
            enablement: false,
            disablement: false,
            transitions: Vec::new(),
        }
    }

    /// All outgoing transitions on the given event
    pub fn transitions_on(&self, event: EventId) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(move |t| t.event == event)
    }

    /// First outgoing transition on the given event
    pub fn transition_on(&self, event: EventId) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.event == event)
    }

    pub fn has_transition(&self, event: EventId, target: StateId) -> bool {
        self.transitions
            .iter()
            .any(|t| t.event == event && t.target == target)
    }
}

/// Ordered member states of a product construction (one per view)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateVector {
    ids: Vec<StateId>,
}

impl StateVector {
    pub fn new(ids: Vec<StateId>) -> Self {
        StateVector { ids }
    }

    #[inline]
    pub fn ids(&self) -> &[StateId] {
        &self.ids
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn member(&self, index: usize) -> StateId {
        self.ids[index]
    }

    /// A copy with one member advanced
    pub fn with_member(&self, index: usize, id: StateId) -> StateVector {
        let mut ids = self.ids.clone();
        ids[index] = id;
        StateVector { ids }
    }

    /// Derived `_`-joined label over the member labels
    pub fn label(&self, member_label: impl Fn(StateId) -> String) -> String {
        self.ids
            .iter()
            .map(|&id| member_label(id))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Canonicalized, unordered set of states (null-closures in subset
/// construction)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateSet {
    ids: Vec<StateId>,
}

impl StateSet {
    /// Canonicalize: sort and deduplicate
    pub fn new(mut ids: Vec<StateId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        StateSet { ids }
    }

    #[inline]
    pub fn ids(&self) -> &[StateId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Derived vectorized label over the sorted member labels
    pub fn label(&self, member_label: impl Fn(StateId) -> String) -> String {
        let mut labels: Vec<String> = self.ids.iter().map(|&id| member_label(id)).collect();
        labels.sort_unstable();
        format!("<{}>", labels.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_state_transitions_on() {
        let mut s = State::new(StateId::new(1), "x", false);
        s.transitions.push(Transition::new(EventId::new(1), StateId::new(2)));
        s.transitions.push(Transition::new(EventId::new(1), StateId::new(3)));
        s.transitions.push(Transition::new(EventId::new(2), StateId::new(2)));

        assert_eq!(s.transitions_on(EventId::new(1)).count(), 2);
        assert_eq!(
            s.transition_on(EventId::new(2)).map(|t| t.target),
            Some(StateId::new(2))
        );
        assert!(s.has_transition(EventId::new(1), StateId::new(3)));
        assert!(!s.has_transition(EventId::new(2), StateId::new(3)));
    }

    #[test]
    fn test_state_vector_label() {
        let v = StateVector::new(vec![StateId::new(1), StateId::new(2), StateId::new(1)]);
        assert_eq!(v.label(|id| format!("s{id}")), "s1_s2_s1");
        assert_eq!(v.with_member(1, StateId::new(5)).member(1), StateId::new(5));
    }

    #[test]
    fn test_state_set_canonical() {
        let a = StateSet::new(vec![StateId::new(3), StateId::new(1), StateId::new(3)]);
        let b = StateSet::new(vec![StateId::new(1), StateId::new(3)]);
        assert_eq!(a, b);
        assert!(a.contains(StateId::new(3)));
        assert_eq!(a.label(|id| format!("s{id}")), "<s1,s3>");
    }

    proptest! {
        #[test]
        fn prop_state_set_order_independent(raw in proptest::collection::vec(1u64..50, 1..12)) {
            let ids: Vec<StateId> = raw.iter().map(|&v| StateId::new(v)).collect();
            let mut reversed = ids.clone();
            reversed.reverse();

            let a = StateSet::new(ids);
            let b = StateSet::new(reversed);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.label(|id| format!("s{id}")), b.label(|id| format!("s{id}")));
            prop_assert!(a.ids().windows(2).all(|w| w[0] < w[1]));
        }
    }
}
