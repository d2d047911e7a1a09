//! Algebraic operations on automata
//!
//! Every operation builds and returns a new automaton, carrying surviving
//! special-transition classifications over and renumbering where product
//! construction or state removal leaves gaps. Operands are never mutated.

use std::collections::{HashMap, HashSet};

use supra_core::{combine_pair, EventId, StateId, SupraError, SupraResult};
use tracing::debug;

use crate::{Automaton, TransitionRef};

/// Label of the synthetic sink state added by [`Automaton::complement`]
pub const DUMP_STATE_LABEL: &str = "Dump State";

/// Intern a product state for a pair of operand states, pushing newly
/// discovered pairs onto the worklist. The combined ID comes from the
/// pairing function, injective as long as the first operand's IDs stay
/// within `max`.
fn intern_pair(
    a: &Automaton,
    b: &Automaton,
    product: &mut Automaton,
    id_of: &mut HashMap<(StateId, StateId), StateId>,
    stack: &mut Vec<(StateId, StateId)>,
    pair: (StateId, StateId),
    max: u64,
) -> SupraResult<StateId> {
    if let Some(&id) = id_of.get(&pair) {
        return Ok(id);
    }
    let (sa, sb) = pair;
    let left = a.state(sa).ok_or(SupraError::StateNotFound(sa))?;
    let right = b.state(sb).ok_or(SupraError::StateNotFound(sb))?;
    let combined = StateId::new(combine_pair(sa.0, sb.0, max)?);
    product.add_state_with_id(
        combined,
        format!("{}_{}", left.label, right.label),
        left.marked && right.marked,
    )?;
    id_of.insert(pair, combined);
    stack.push(pair);
    Ok(combined)
}

impl Automaton {
    /// Restriction to states forward-reachable from the initial state.
    pub fn accessible(&self) -> SupraResult<Automaton> {
        let initial = self.initial().ok_or(SupraError::NoInitialState)?;

        let mut reachable = HashSet::new();
        let mut stack = vec![initial];
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(state) = self.state(id) {
                for transition in &state.transitions {
                    if !reachable.contains(&transition.target) {
                        stack.push(transition.target);
                    }
                }
            }
        }

        let mut result = self.clone();
        result.retain_states(&reachable);
        result.renumber_states();
        debug!(
            kept = result.n_states(),
            dropped = self.n_states() - result.n_states(),
            "accessible restriction"
        );
        Ok(result)
    }

    /// The reversed automaton: every transition flipped, state IDs preserved.
    ///
    /// A derived, disposable view used for backward reachability; special
    /// transitions and bad-transition classifications are intentionally
    /// dropped and the result is never persisted.
    pub fn invert(&self) -> Automaton {
        let mut inverted = Automaton::new(self.n_controllers());
        for event in self.events() {
            // Labels are unique in self, so re-adding cannot fail.
            let _ = inverted.add_event(
                event.label.clone(),
                event.observable.clone(),
                event.controllable.clone(),
            );
        }
        for state in self.states() {
            let _ = inverted.add_state_with_id(state.id, state.label.clone(), state.marked);
        }
        for state in self.states() {
            for transition in &state.transitions {
                let _ = inverted.add_transition(transition.target, transition.event, state.id);
            }
        }
        if let Some(initial) = self.initial() {
            let _ = inverted.set_initial(initial);
        }
        inverted
    }

    /// Restriction to states from which some marked state is reachable,
    /// computed as forward reachability from the marked states on the
    /// inverted view.
    pub fn coaccessible(&self) -> SupraResult<Automaton> {
        let inverted = self.invert();

        let mut coreachable = HashSet::new();
        let mut stack: Vec<StateId> = self
            .states()
            .filter(|s| s.marked)
            .map(|s| s.id)
            .collect();
        while let Some(id) = stack.pop() {
            if !coreachable.insert(id) {
                continue;
            }
            if let Some(state) = inverted.state(id) {
                for transition in &state.transitions {
                    if !coreachable.contains(&transition.target) {
                        stack.push(transition.target);
                    }
                }
            }
        }

        let mut result = self.clone();
        result.retain_states(&coreachable);
        result.renumber_states();
        Ok(result)
    }

    /// `accessible` then `coaccessible` (accessible first: cheaper).
    pub fn trim(&self) -> SupraResult<Automaton> {
        self.accessible()?.coaccessible()
    }

    /// Language complement: toggle every marking and make the automaton
    /// total by routing every missing `(state, event)` pair to a marked
    /// dump state that self-loops on every event.
    ///
    /// Fails with [`SupraError::OperationAlreadyApplied`] when a dump state
    /// would have to be added but one already exists. A total automaton
    /// complements by marking-toggle alone, so complementing twice restores
    /// the original markings.
    pub fn complement(&self) -> SupraResult<Automaton> {
        let mut result = self.clone();
        for id in self.state_ids().collect::<Vec<_>>() {
            if let Some(state) = result.state_mut(id) {
                state.marked = !state.marked;
            }
        }

        let mut missing: Vec<(StateId, EventId)> = Vec::new();
        for state in self.states() {
            for event in self.events() {
                if state.transition_on(event.id).is_none() {
                    missing.push((state.id, event.id));
                }
            }
        }
        if missing.is_empty() {
            return Ok(result);
        }
        if self.state_by_label(DUMP_STATE_LABEL).is_some() {
            return Err(SupraError::OperationAlreadyApplied("complement"));
        }

        let dump = result.add_state(DUMP_STATE_LABEL, true);
        for (source, event) in missing {
            result.add_transition(source, event, dump)?;
        }
        for event in self.events().iter().map(|e| e.id).collect::<Vec<_>>() {
            result.add_transition(dump, event, dump)?;
        }
        Ok(result)
    }

    fn check_combinable(&self, other: &Automaton) -> SupraResult<()> {
        if self.n_controllers() != other.n_controllers() {
            return Err(SupraError::IncompatibleAutomata(format!(
                "controller counts differ: {} vs {}",
                self.n_controllers(),
                other.n_controllers()
            )));
        }
        for event in self.events() {
            if let Some(twin) = other.event_by_label(&event.label) {
                if !event.compatible_with(twin) {
                    return Err(SupraError::IncompatibleAutomata(format!(
                        "event {:?} has conflicting attributes",
                        event.label
                    )));
                }
            }
        }
        Ok(())
    }

    /// Product over event-equal transition pairs on shared events; accepts
    /// exactly the common language. A product transition is bad iff it is bad
    /// in **both** operands.
    pub fn intersection(&self, other: &Automaton) -> SupraResult<Automaton> {
        self.check_combinable(other)?;
        let init_a = self.initial().ok_or(SupraError::NoInitialState)?;
        let init_b = other.initial().ok_or(SupraError::NoInitialState)?;

        let mut product = Automaton::new(self.n_controllers());
        // (event in self, event in other, event in product)
        let mut shared: Vec<(EventId, EventId, EventId)> = Vec::new();
        for event in self.events() {
            if let Some(twin) = other.event_by_label(&event.label) {
                let id = product.add_event(
                    event.label.clone(),
                    event.observable.clone(),
                    event.controllable.clone(),
                )?;
                shared.push((event.id, twin.id, id));
            }
        }

        let max = self.max_state_id().max(other.max_state_id()).max(1);
        let mut id_of: HashMap<(StateId, StateId), StateId> = HashMap::new();
        let mut stack: Vec<(StateId, StateId)> = Vec::new();

        let initial = intern_pair(
            self,
            other,
            &mut product,
            &mut id_of,
            &mut stack,
            (init_a, init_b),
            max,
        )?;
        product.set_initial(initial)?;

        while let Some((sa, sb)) = stack.pop() {
            let source = id_of[&(sa, sb)];
            for &(ea, eb, ep) in &shared {
                let a_moves: Vec<StateId> = self
                    .state(sa)
                    .map(|s| s.transitions_on(ea).map(|t| t.target).collect())
                    .unwrap_or_default();
                let b_moves: Vec<StateId> = other
                    .state(sb)
                    .map(|s| s.transitions_on(eb).map(|t| t.target).collect())
                    .unwrap_or_default();
                for &ta in &a_moves {
                    for &tb in &b_moves {
                        let target = intern_pair(
                            self,
                            other,
                            &mut product,
                            &mut id_of,
                            &mut stack,
                            (ta, tb),
                            max,
                        )?;
                        product.add_transition(source, ep, target)?;
                        let bad_a = self.is_bad_transition(&TransitionRef::new(sa, ea, ta));
                        let bad_b = other.is_bad_transition(&TransitionRef::new(sb, eb, tb));
                        if bad_a && bad_b {
                            product.push_bad_transition(TransitionRef::new(source, ep, target));
                        }
                    }
                }
            }
        }

        product.renumber_states();
        Ok(product)
    }

    /// Product with interleaving of each operand's private events. A product
    /// transition is bad iff it is bad in **either** operand.
    pub fn union(&self, other: &Automaton) -> SupraResult<Automaton> {
        self.check_combinable(other)?;
        let init_a = self.initial().ok_or(SupraError::NoInitialState)?;
        let init_b = other.initial().ok_or(SupraError::NoInitialState)?;

        let mut product = Automaton::new(self.n_controllers());
        let mut a_map: HashMap<EventId, EventId> = HashMap::new();
        let mut b_map: HashMap<EventId, EventId> = HashMap::new();
        for event in self.events() {
            let id = product.add_event(
                event.label.clone(),
                event.observable.clone(),
                event.controllable.clone(),
            )?;
            a_map.insert(event.id, id);
        }
        for event in other.events() {
            let id = product.add_event_if_absent(
                &event.label,
                event.observable.clone(),
                event.controllable.clone(),
            )?;
            b_map.insert(event.id, id);
        }

        let max = self.max_state_id().max(other.max_state_id()).max(1);
        let mut id_of: HashMap<(StateId, StateId), StateId> = HashMap::new();
        let mut stack: Vec<(StateId, StateId)> = Vec::new();

        let initial = intern_pair(
            self,
            other,
            &mut product,
            &mut id_of,
            &mut stack,
            (init_a, init_b),
            max,
        )?;
        product.set_initial(initial)?;

        while let Some((sa, sb)) = stack.pop() {
            let source = id_of[&(sa, sb)];
            let a_state = self.state(sa).ok_or(SupraError::StateNotFound(sa))?;
            let b_state = other.state(sb).ok_or(SupraError::StateNotFound(sb))?;

            for event in self.events() {
                let ep = a_map[&event.id];
                let is_shared = other.event_by_label(&event.label).is_some();
                let a_moves: Vec<StateId> =
                    a_state.transitions_on(event.id).map(|t| t.target).collect();
                if is_shared {
                    let eb = other.event_by_label(&event.label).map(|e| e.id);
                    let eb = match eb {
                        Some(id) => id,
                        None => continue,
                    };
                    let b_moves: Vec<StateId> =
                        b_state.transitions_on(eb).map(|t| t.target).collect();
                    for &ta in &a_moves {
                        for &tb in &b_moves {
                            let target = intern_pair(
                                self,
                                other,
                                &mut product,
                                &mut id_of,
                                &mut stack,
                                (ta, tb),
                                max,
                            )?;
                            product.add_transition(source, ep, target)?;
                            let bad = self.is_bad_transition(&TransitionRef::new(sa, event.id, ta))
                                || other.is_bad_transition(&TransitionRef::new(sb, eb, tb));
                            if bad {
                                product.push_bad_transition(TransitionRef::new(source, ep, target));
                            }
                        }
                    }
                } else {
                    // Private to self: other holds still.
                    for &ta in &a_moves {
                        let target = intern_pair(
                            self,
                            other,
                            &mut product,
                            &mut id_of,
                            &mut stack,
                            (ta, sb),
                            max,
                        )?;
                        product.add_transition(source, ep, target)?;
                        if self.is_bad_transition(&TransitionRef::new(sa, event.id, ta)) {
                            product.push_bad_transition(TransitionRef::new(source, ep, target));
                        }
                    }
                }
            }
            for event in other.events() {
                if self.event_by_label(&event.label).is_some() {
                    continue;
                }
                // Private to other: self holds still.
                let ep = b_map[&event.id];
                let b_moves: Vec<StateId> =
                    b_state.transitions_on(event.id).map(|t| t.target).collect();
                for &tb in &b_moves {
                    let target = intern_pair(
                        self,
                        other,
                        &mut product,
                        &mut id_of,
                        &mut stack,
                        (sa, tb),
                        max,
                    )?;
                    product.add_transition(source, ep, target)?;
                    if other.is_bad_transition(&TransitionRef::new(sb, event.id, tb)) {
                        product.push_bad_transition(TransitionRef::new(source, ep, target));
                    }
                }
            }
        }

        product.renumber_states();
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// a: 1 -a-> 2 -b-> 3(marked), plus unreachable 4
    fn sample() -> Automaton {
        let mut aut = Automaton::new(1);
        let a = aut.add_event("a", vec![true], vec![true]).unwrap();
        let b = aut.add_event("b", vec![true], vec![false]).unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", false);
        let s3 = aut.add_state("3", true);
        let s4 = aut.add_state("4", false);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        aut.add_transition(s2, b, s3).unwrap();
        aut.add_transition(s4, a, s3).unwrap();
        aut
    }

    #[test]
    fn test_accessible_drops_unreachable() {
        let aut = sample();
        let accessible = aut.accessible().unwrap();
        assert_eq!(accessible.n_states(), 3);
        assert!(accessible.state_by_label("4").is_none());
        // Renumbered densely.
        let ids: Vec<u64> = accessible.state_ids().map(|id| id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_accessible_requires_initial() {
        let mut aut = Automaton::new(1);
        aut.add_state("1", false);
        assert!(matches!(aut.accessible(), Err(SupraError::NoInitialState)));
    }

    #[test]
    fn test_invert_twice_restores_structure() {
        let aut = sample();
        let double = aut.invert().invert();
        assert_eq!(double.n_states(), aut.n_states());
        assert_eq!(double.initial(), aut.initial());
        for state in aut.states() {
            let twin = double.state(state.id).unwrap();
            assert_eq!(twin.label, state.label);
            assert_eq!(twin.marked, state.marked);
            let mut expected: Vec<_> = state.transitions.clone();
            let mut actual: Vec<_> = twin.transitions.clone();
            expected.sort_by_key(|t| (t.event, t.target));
            actual.sort_by_key(|t| (t.event, t.target));
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn test_coaccessible_keeps_paths_to_marked() {
        let mut aut = sample();
        // Dead end that can never reach a marked state.
        let a = aut.event_by_label("a").unwrap().id;
        let dead = aut.add_state("dead", false);
        aut.add_transition(StateId::new(3), a, dead).unwrap();

        let co = aut.coaccessible().unwrap();
        assert!(co.state_by_label("dead").is_none());
        assert!(co.state_by_label("4").is_some());
        assert!(co.initial().is_some());
    }

    #[test]
    fn test_trim() {
        let aut = sample();
        let trimmed = aut.trim().unwrap();
        assert_eq!(trimmed.n_states(), 3);
        assert!(trimmed.initial().is_some());
    }

    #[test]
    fn test_complement_twice_restores_markings() {
        let aut = sample();
        let double = aut.complement().unwrap().complement().unwrap();
        for state in aut.states() {
            assert_eq!(double.state(state.id).unwrap().marked, state.marked);
        }
        // First pass added the dump state; second pass only toggled.
        assert_eq!(double.n_states(), aut.n_states() + 1);
    }

    #[test]
    fn test_complement_guard() {
        let mut aut = sample();
        aut.add_state(DUMP_STATE_LABEL, false);
        assert!(matches!(
            aut.complement(),
            Err(SupraError::OperationAlreadyApplied("complement"))
        ));
    }

    #[test]
    fn test_complement_total() {
        let aut = sample();
        let complemented = aut.complement().unwrap();
        // Every state now has a transition on every event.
        for state in complemented.states() {
            for event in complemented.events() {
                assert!(state.transition_on(event.id).is_some(), "missing {}", event.label);
            }
        }
        assert!(complemented.state_by_label(DUMP_STATE_LABEL).unwrap().marked);
    }

    fn chain(labels: &[(&str, bool)], events: &[&str]) -> Automaton {
        let mut aut = Automaton::new(1);
        for label in events {
            aut.add_event(*label, vec![true], vec![true]).unwrap();
        }
        let mut prev = None;
        for (i, &(event, marked)) in labels.iter().enumerate() {
            let id = aut.add_state(format!("{i}"), marked);
            if let Some(p) = prev {
                let e = aut.event_by_label(event).unwrap().id;
                aut.add_transition(p, e, id).unwrap();
            } else {
                aut.set_initial(id).unwrap();
            }
            prev = Some(id);
        }
        aut
    }

    #[test]
    fn test_intersection_common_language() {
        // a: accepts "ab"; b: accepts "a" then "b" or "c"
        let left = chain(&[("", false), ("a", false), ("b", true)], &["a", "b"]);
        let mut right = chain(&[("", false), ("a", false), ("b", true)], &["a", "b", "c"]);
        let c = right.event_by_label("c").unwrap().id;
        let extra = right.add_state("extra", true);
        right.add_transition(StateId::new(2), c, extra).unwrap();

        let product = left.intersection(&right).unwrap();
        // Only the "ab" path survives; "ac" needs an event left lacks.
        assert_eq!(product.n_states(), 3);
        assert_eq!(product.states().filter(|s| s.marked).count(), 1);
    }

    #[test]
    fn test_intersection_bad_iff_both() {
        let mut left = chain(&[("", false), ("a", true)], &["a"]);
        let mut right = chain(&[("", false), ("a", true)], &["a"]);
        let a_l = left.event_by_label("a").unwrap().id;
        let a_r = right.event_by_label("a").unwrap().id;
        left.mark_transition_bad(StateId::new(1), a_l, StateId::new(2)).unwrap();

        let product = left.intersection(&right).unwrap();
        assert!(product.bad_transitions().is_empty());

        right.mark_transition_bad(StateId::new(1), a_r, StateId::new(2)).unwrap();
        let product = left.intersection(&right).unwrap();
        assert_eq!(product.bad_transitions().len(), 1);
    }

    #[test]
    fn test_intersection_rejects_incompatible() {
        let left = chain(&[("", false), ("a", true)], &["a"]);
        let mut right = Automaton::new(1);
        right.add_event("a", vec![false], vec![true]).unwrap();
        let s = right.add_state("0", false);
        right.set_initial(s).unwrap();
        assert!(matches!(
            left.intersection(&right),
            Err(SupraError::IncompatibleAutomata(_))
        ));

        let two = Automaton::new(2);
        assert!(left.intersection(&two).is_err());
    }

    #[test]
    fn test_union_interleaves_private_events() {
        let left = chain(&[("", false), ("a", true)], &["a"]);
        let right = chain(&[("", false), ("b", true)], &["b"]);

        let product = left.union(&right).unwrap();
        // States: (0,0), (1,0), (0,1), (1,1) — full interleaving diamond.
        assert_eq!(product.n_states(), 4);
        assert_eq!(product.n_events(), 2);
        assert_eq!(product.states().filter(|s| s.marked).count(), 1);
    }

    #[test]
    fn test_union_bad_iff_either() {
        let mut left = chain(&[("", false), ("a", true)], &["a"]);
        let right = chain(&[("", false), ("a", true)], &["a"]);
        let a = left.event_by_label("a").unwrap().id;
        left.mark_transition_bad(StateId::new(1), a, StateId::new(2)).unwrap();

        let product = left.union(&right).unwrap();
        assert_eq!(product.bad_transitions().len(), 1);
    }
}
