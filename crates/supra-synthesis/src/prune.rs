//! Pruning of partial event occurrences
//!
//! Once a communication is chosen, the underlying event no longer occurs
//! without it: every transition sharing a non-`*` component with the chosen
//! vector is an un-communicated partial occurrence and is removed, together
//! with its continuations up to `nControllers` steps deep. Transitions that
//! are themselves part of the chosen protocol are spared at depth 0.

use std::collections::HashSet;

use supra_automata::{AutomatonKind, TransitionRef};
use supra_core::{LabelVector, StateId, SupraResult};
use tracing::trace;

use crate::{Protocol, UStructure};

/// A U-Structure under protocol application
#[derive(Clone, Debug)]
pub struct PrunedUStructure {
    inner: UStructure,
}

impl PrunedUStructure {
    /// Start pruning from a copy of the structure, retagged as pruned.
    pub fn from_ustructure(u: &UStructure) -> Self {
        let mut inner = u.clone();
        let data = inner
            .automaton()
            .ustructure_data()
            .cloned()
            .unwrap_or_default();
        inner.automaton_mut().set_kind(AutomatonKind::Pruned(data));
        PrunedUStructure { inner }
    }

    #[inline]
    pub fn ustructure(&self) -> &UStructure {
        &self.inner
    }

    pub(crate) fn inner_mut(&mut self) -> &mut UStructure {
        &mut self.inner
    }

    pub fn into_inner(self) -> UStructure {
        self.inner
    }

    /// Do two vectors share a non-`*` component at some position?
    fn overlaps(a: &LabelVector, b: &LabelVector) -> bool {
        (0..a.len().max(b.len())).any(|i| {
            match (a.component(i), b.component(i)) {
                (Some(x), Some(y)) => x != supra_core::ABSENT && x == y,
                _ => false,
            }
        })
    }

    /// Remove the partial occurrences of a chosen communication's vector,
    /// starting from the communication's source state. Explicit stack, depth
    /// bounded by the controller count.
    pub fn prune(
        &mut self,
        protocol: &Protocol,
        vector: &LabelVector,
        start: StateId,
    ) -> SupraResult<()> {
        let max_depth = self.inner.n_controllers();
        let mut stack: Vec<(StateId, usize)> = vec![(start, 0)];
        let mut visited: HashSet<(StateId, usize)> = HashSet::new();

        while let Some((state_id, depth)) = stack.pop() {
            if !visited.insert((state_id, depth)) {
                continue;
            }
            let Some(state) = self.inner.automaton().state(state_id) else {
                continue;
            };

            let mut doomed: Vec<TransitionRef> = Vec::new();
            for transition in &state.transitions {
                let Some(event_vector) = self.inner.event_vector(transition.event) else {
                    continue;
                };
                if !Self::overlaps(&event_vector, vector) {
                    continue;
                }
                let reference = TransitionRef::new(state_id, transition.event, transition.target);
                if depth == 0 && protocol.contains_transition(&reference) {
                    continue;
                }
                doomed.push(reference);
            }

            for reference in doomed {
                trace!(?reference, depth, "pruning partial occurrence");
                self.inner.automaton_mut().remove_transition(&reference);
                if depth < max_depth {
                    stack.push((reference.target, depth + 1));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{add_communications, synchronized_composition, CommunicationOptions};
    use supra_automata::Automaton;

    /// Controller 1 observes a, controller 2 controls it blindly.
    fn blind_disabler() -> UStructure {
        let mut aut = Automaton::new(2);
        let a = aut
            .add_event("a", vec![true, false], vec![false, true])
            .unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        aut.mark_transition_bad(s1, a, s2).unwrap();
        let u = synchronized_composition(&aut).unwrap();
        add_communications(&u, &CommunicationOptions::default()).unwrap()
    }

    #[test]
    fn test_overlap() {
        let a = LabelVector::parse("<a,a,*>").unwrap();
        let b = LabelVector::parse("<a,a,a>").unwrap();
        let c = LabelVector::parse("<*,*,a>").unwrap();
        let d = LabelVector::parse("<b,b,*>").unwrap();
        assert!(PrunedUStructure::overlaps(&a, &b));
        assert!(PrunedUStructure::overlaps(&c, &b));
        assert!(!PrunedUStructure::overlaps(&a, &c));
        assert!(!PrunedUStructure::overlaps(&a, &d));
    }

    #[test]
    fn test_prune_removes_partial_occurrences() {
        let u = blind_disabler();
        let comm = u.data().potential_communications[0].clone();
        let vector = u.event_vector(comm.transition.event).unwrap();
        let protocol = Protocol::new(vec![comm.clone()]);

        let mut pruned = PrunedUStructure::from_ustructure(&u);
        pruned
            .prune(&protocol, &vector, comm.transition.source)
            .unwrap();

        let aut = pruned.ustructure().automaton();
        // The chosen communication survives; the un-communicated occurrence
        // of a from the same state does not.
        assert!(aut.transition_exists(&comm.transition));
        let source = aut.state(comm.transition.source).unwrap();
        let partial = aut.event_by_label("<a,a,*>").unwrap().id;
        assert!(source.transition_on(partial).is_none());
    }

    #[test]
    fn test_prune_purges_classifications() {
        let u = blind_disabler();
        assert!(!u.data().unconditional_violations.is_empty());
        let comm = u.data().potential_communications[0].clone();
        let vector = u.event_vector(comm.transition.event).unwrap();
        let protocol = Protocol::new(vec![comm.clone()]);

        let mut pruned = PrunedUStructure::from_ustructure(&u);
        pruned
            .prune(&protocol, &vector, comm.transition.source)
            .unwrap();
        // The violation rode on the pruned partial occurrence.
        assert!(pruned
            .ustructure()
            .data()
            .unconditional_violations
            .is_empty());
    }

    #[test]
    fn test_prune_kind_tag() {
        let u = blind_disabler();
        let pruned = PrunedUStructure::from_ustructure(&u);
        assert_eq!(pruned.ustructure().automaton().kind().type_byte(), 2);
    }
}
