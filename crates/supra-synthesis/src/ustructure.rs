//! Synchronized composition
//!
//! The U-Structure of an automaton is the product of one "system" view
//! (index 0) and one partial view per controller (indices `1..=n`), all
//! starting at the system's initial state. A product state exists only if
//! every controller able to observe the synthesized event can actually take
//! it; unobservable controllers hold still behind a `*` component.

use std::collections::HashMap;

use supra_automata::{Automaton, AutomatonKind, StateVector, TransitionRef, UStructureData};
use supra_core::{fits_fixed, CompositeId, LabelVector, StateId, SupraError, SupraResult, ABSENT};
use tracing::debug;

static EMPTY_DATA: UStructureData = UStructureData {
    unconditional_violations: Vec::new(),
    conditional_violations: Vec::new(),
    potential_communications: Vec::new(),
    invalid_communications: Vec::new(),
    nash_communications: Vec::new(),
    disablement_decisions: Vec::new(),
    suppressed_transitions: Vec::new(),
};

/// A synchronized-composition product with its annotations
#[derive(Clone, Debug)]
pub struct UStructure {
    automaton: Automaton,
    /// Decomposition of each product state into its `n + 1` member states in
    /// the source automaton. Rebuilt by synthesis, never persisted.
    members: HashMap<StateId, Vec<StateId>>,
    /// The automaton this U-Structure was synthesized from
    source: Automaton,
}

impl UStructure {
    pub(crate) fn from_parts(
        automaton: Automaton,
        members: HashMap<StateId, Vec<StateId>>,
        source: Automaton,
    ) -> Self {
        UStructure {
            automaton,
            members,
            source,
        }
    }

    #[inline]
    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub(crate) fn automaton_mut(&mut self) -> &mut Automaton {
        &mut self.automaton
    }

    #[inline]
    pub fn source(&self) -> &Automaton {
        &self.source
    }

    #[inline]
    pub fn n_controllers(&self) -> usize {
        self.automaton.n_controllers()
    }

    /// The violation/communication/disablement collections
    pub fn data(&self) -> &UStructureData {
        self.automaton.ustructure_data().unwrap_or(&EMPTY_DATA)
    }

    /// Member states of one product state in the source automaton
    pub fn members(&self, state: StateId) -> Option<&[StateId]> {
        self.members.get(&state).map(Vec::as_slice)
    }

    pub(crate) fn members_mut(&mut self) -> &mut HashMap<StateId, Vec<StateId>> {
        &mut self.members
    }

    /// Parsed label vector of one of this structure's events
    pub fn event_vector(&self, event: supra_core::EventId) -> Option<LabelVector> {
        let label = &self.automaton.event(event)?.label;
        LabelVector::parse(label).ok().filter(LabelVector::is_vector)
    }
}

/// Assignment of product-state IDs: the pairing-function fast path when the
/// `nStates^(nControllers + 1)` bound fits 64 bits, else discovery order with
/// the wide composite as the identity key.
struct VectorInterner {
    id_of: HashMap<CompositeId, StateId>,
    max: u64,
    fixed: bool,
    next_sequential: u64,
}

impl VectorInterner {
    fn new(max: u64, count: usize) -> Self {
        VectorInterner {
            id_of: HashMap::new(),
            max,
            fixed: fits_fixed(max, count),
            next_sequential: 1,
        }
    }

    /// Existing ID for a vector, or `None` if it has not been interned.
    fn get(&self, vector: &StateVector) -> Option<StateId> {
        let ids: Vec<u64> = vector.ids().iter().map(|s| s.0).collect();
        self.id_of.get(&CompositeId::combine(&ids, self.max)).copied()
    }

    /// Intern a vector, returning `(id, freshly_inserted)`.
    fn intern(&mut self, vector: &StateVector) -> (StateId, bool) {
        let ids: Vec<u64> = vector.ids().iter().map(|s| s.0).collect();
        let key = CompositeId::combine(&ids, self.max);
        if let Some(&id) = self.id_of.get(&key) {
            return (id, false);
        }
        let id = if self.fixed {
            match key.as_fixed() {
                Some(v) => StateId::new(v),
                None => {
                    let id = StateId::new(self.next_sequential);
                    self.next_sequential += 1;
                    id
                }
            }
        } else {
            let id = StateId::new(self.next_sequential);
            self.next_sequential += 1;
            id
        };
        self.id_of.insert(key, id);
        (id, true)
    }
}

/// Build the U-Structure of an automaton.
///
/// Fails with [`SupraError::NoInitialState`] when the source has no initial
/// state; insertion failures mid-synthesis indicate a broken invariant and
/// surface as [`SupraError::CorruptAutomaton`].
pub fn synchronized_composition(aut: &Automaton) -> SupraResult<UStructure> {
    let initial = aut.initial().ok_or(SupraError::NoInitialState)?;
    let n = aut.n_controllers();
    let max = aut.max_state_id().max(1);

    let mut product = Automaton::with_kind(
        AutomatonKind::UStructure(UStructureData::default()),
        n,
    );
    let mut members: HashMap<StateId, Vec<StateId>> = HashMap::new();
    let mut interner = VectorInterner::new(max, n + 1);
    let mut stack: Vec<StateVector> = Vec::new();

    let label_of = |id: StateId| {
        aut.state(id)
            .map(|s| s.label.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let vector_marked = |vector: &StateVector| {
        vector
            .ids()
            .iter()
            .all(|&id| aut.state(id).is_some_and(|s| s.marked))
    };

    let start = StateVector::new(vec![initial; n + 1]);
    let (start_id, _) = interner.intern(&start);
    product.add_state_with_id(start_id, start.label(label_of), vector_marked(&start))?;
    members.insert(start_id, start.ids().to_vec());
    product.set_initial(start_id)?;
    stack.push(start);

    while let Some(vector) = stack.pop() {
        let source_id = interner
            .get(&vector)
            .ok_or_else(|| SupraError::CorruptAutomaton("worklist vector not interned".into()))?;
        let s0 = vector.member(0);
        let system_state = aut
            .state(s0)
            .ok_or(SupraError::StateNotFound(s0))?;

        // System transitions, gated by every observing controller.
        'outer: for transition in &system_state.transitions {
            let event = aut
                .event(transition.event)
                .ok_or(SupraError::EventNotFound(transition.event))?;

            let mut targets = Vec::with_capacity(n + 1);
            let mut components = Vec::with_capacity(n + 1);
            // Matched target per controller, None when unobservable.
            let mut matched: Vec<Option<StateId>> = vec![None; n];
            targets.push(transition.target);
            components.push(event.label.clone());

            for i in 1..=n {
                if event.observable[i - 1] {
                    let view = aut
                        .state(vector.member(i))
                        .ok_or(SupraError::StateNotFound(vector.member(i)))?;
                    match view.transition_on(transition.event) {
                        Some(t) => {
                            targets.push(t.target);
                            components.push(event.label.clone());
                            matched[i - 1] = Some(t.target);
                        }
                        // An observing controller that cannot take the event
                        // kills the whole synthesized vector.
                        None => continue 'outer,
                    }
                } else {
                    targets.push(vector.member(i));
                    components.push(ABSENT.to_string());
                }
            }

            let label = LabelVector::from_components(components).to_string();
            let observable: Vec<bool> = (1..=n).map(|i| matched[i - 1].is_some()).collect();
            let event_id =
                product.add_event_if_absent(&label, observable, event.controllable.clone())?;

            let target_vector = StateVector::new(targets);
            let (target_id, fresh) = interner.intern(&target_vector);
            if fresh {
                product.add_state_with_id(
                    target_id,
                    target_vector.label(label_of),
                    vector_marked(&target_vector),
                )?;
                members.insert(target_id, target_vector.ids().to_vec());
                stack.push(target_vector);
            }
            product.add_transition(source_id, event_id, target_id)?;

            // Classification.
            let bad = aut.is_bad_transition(&TransitionRef::new(s0, transition.event, transition.target));
            let sees_bad: Vec<bool> = (1..=n)
                .map(|i| {
                    event.controllable[i - 1]
                        && matched[i - 1].is_some_and(|t| {
                            aut.is_bad_transition(&TransitionRef::new(
                                vector.member(i),
                                transition.event,
                                t,
                            ))
                        })
                })
                .collect();
            let product_ref = TransitionRef::new(source_id, event_id, target_id);
            if bad {
                product.add_disablement_decision(product_ref, sees_bad.clone())?;
                // No controller able to observe and control it sees it as bad:
                // nobody can prevent it.
                if !sees_bad.iter().any(|&b| b) {
                    product.add_unconditional_violation(product_ref)?;
                }
            } else if event.controllable_count() >= 2 && sees_bad.iter().any(|&b| b) {
                product.add_conditional_violation(product_ref)?;
            }
        }

        // Purely-local controller moves on events the controller itself
        // cannot observe: only that component advances.
        for i in 1..=n {
            let view = aut
                .state(vector.member(i))
                .ok_or(SupraError::StateNotFound(vector.member(i)))?;
            for transition in &view.transitions {
                let event = aut
                    .event(transition.event)
                    .ok_or(SupraError::EventNotFound(transition.event))?;
                if event.observable[i - 1] {
                    continue;
                }

                let mut components = vec![ABSENT.to_string(); n + 1];
                components[i] = event.label.clone();
                let label = LabelVector::from_components(components).to_string();
                let mut observable = vec![false; n];
                observable[i - 1] = true;
                let event_id =
                    product.add_event_if_absent(&label, observable, event.controllable.clone())?;

                let target_vector = vector.with_member(i, transition.target);
                let (target_id, fresh) = interner.intern(&target_vector);
                if fresh {
                    product.add_state_with_id(
                        target_id,
                        target_vector.label(label_of),
                        vector_marked(&target_vector),
                    )?;
                    members.insert(target_id, target_vector.ids().to_vec());
                    stack.push(target_vector);
                }
                product.add_transition(source_id, event_id, target_id)?;
            }
        }
    }

    let state_map = product.renumber_states_map();
    let members = members
        .into_iter()
        .filter_map(|(old, v)| state_map.get(&old).map(|&new| (new, v)))
        .collect();

    debug!(
        states = product.n_states(),
        events = product.n_events(),
        "synchronized composition"
    );
    Ok(UStructure::from_parts(product, members, aut.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two controllers; only controller 1 observes `a`.
    fn one_observer() -> Automaton {
        let mut aut = Automaton::new(2);
        let a = aut
            .add_event("a", vec![true, false], vec![true, false])
            .unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        aut
    }

    #[test]
    fn test_partial_observation_vector() {
        let aut = one_observer();
        let u = synchronized_composition(&aut).unwrap();
        // Controller 1 advances with the system, controller 2 holds; the
        // unobserving controller also drifts on its own local copy of a.
        assert!(u.automaton().event_by_label("<a,a,*>").is_some());
        assert!(u.automaton().event_by_label("<*,*,a>").is_some());
        assert_eq!(u.automaton().n_states(), 4);

        let initial = u.automaton().initial().unwrap();
        assert_eq!(u.members(initial).unwrap().len(), 3);
    }

    #[test]
    fn test_no_bad_transitions_no_violations() {
        let mut aut = Automaton::new(1);
        let a = aut.add_event("a", vec![true], vec![true]).unwrap();
        let b = aut.add_event("b", vec![false], vec![false]).unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        aut.add_transition(s2, b, s1).unwrap();

        let u = synchronized_composition(&aut).unwrap();
        assert!(u.data().unconditional_violations.is_empty());
        assert!(u.data().conditional_violations.is_empty());
    }

    #[test]
    fn test_requires_initial_state() {
        let aut = Automaton::new(1);
        assert!(matches!(
            synchronized_composition(&aut),
            Err(SupraError::NoInitialState)
        ));
    }

    #[test]
    fn test_unobservable_local_moves() {
        // Event u unobservable to the only controller: the controller's view
        // drifts independently of the system.
        let mut aut = Automaton::new(1);
        let u = aut.add_event("u", vec![false], vec![false]).unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, u, s2).unwrap();

        let structure = synchronized_composition(&aut).unwrap();
        // System-only move <u,*> and controller-only move <*,u>.
        assert!(structure.automaton().event_by_label("<u,*>").is_some());
        assert!(structure.automaton().event_by_label("<*,u>").is_some());
        // Vectors reachable: (1,1), (2,1), (1,2), (2,2).
        assert_eq!(structure.automaton().n_states(), 4);
    }

    #[test]
    fn test_unconditional_violation_detected() {
        // One controller, controls a but cannot observe it: the bad
        // transition cannot be prevented knowingly.
        let mut aut = Automaton::new(1);
        let a = aut.add_event("a", vec![false], vec![true]).unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        aut.mark_transition_bad(s1, a, s2).unwrap();

        let u = synchronized_composition(&aut).unwrap();
        // The bad system move occurs from (1,1) and from (1,2): the view
        // drifts on its own unobservable copy of a first.
        assert_eq!(u.data().unconditional_violations.len(), 2);
        assert_eq!(u.data().disablement_decisions.len(), 2);
        assert!(u
            .data()
            .disablement_decisions
            .iter()
            .all(|d| !d.controllers[0]));
    }

    #[test]
    fn test_disablement_decision_bitmap() {
        // Controller observes and controls a, and its own view marks the
        // transition bad: it can disable, so no unconditional violation.
        let mut aut = Automaton::new(1);
        let a = aut.add_event("a", vec![true], vec![true]).unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        aut.mark_transition_bad(s1, a, s2).unwrap();

        let u = synchronized_composition(&aut).unwrap();
        assert!(u.data().unconditional_violations.is_empty());
        assert_eq!(u.data().disablement_decisions.len(), 1);
        assert!(u.data().disablement_decisions[0].controllers[0]);
    }

    #[test]
    fn test_conditional_violation() {
        // Controller 1 cannot observe u, so after the system takes u its view
        // still sits at state 1, where a leads somewhere bad. The good system
        // move on a then looks bad to controller 1 alone: ambiguity.
        let mut aut = Automaton::new(2);
        let u_ev = aut
            .add_event("u", vec![false, true], vec![false, false])
            .unwrap();
        let a = aut
            .add_event("a", vec![true, true], vec![true, true])
            .unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", false);
        let s3 = aut.add_state("3", false);
        let s4 = aut.add_state("4", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, u_ev, s2).unwrap();
        aut.add_transition(s1, a, s3).unwrap();
        aut.add_transition(s2, a, s4).unwrap();
        aut.mark_transition_bad(s1, a, s3).unwrap();

        let structure = synchronized_composition(&aut).unwrap();
        assert!(!structure.data().conditional_violations.is_empty());
    }
}
