//! Observability and controllability tests
//!
//! Controllability is a linear scan: every bad transition must be
//! controllable by someone. Observability runs on the synchronized
//! composition: configuration states shared between indistinguishability
//! classes are split apart, then for each controllable event the
//! enablement and disablement configurations are resolved by a fixpoint
//! that peels off states some controlling controller can already decide.
//! The iteration at which a controller first decides is its ambiguity level.

use std::collections::{HashMap, HashSet};

use supra_automata::{
    subset::indistinguishability_classes, Automaton, TransitionRef, Transition,
};
use supra_core::{StateId, SupraResult};
use tracing::debug;

use crate::{synchronized_composition, UStructure};

/// Outcome of the observability test. Failing the test is a result, not an
/// error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilityResult {
    pub observable: bool,
    /// Per controller, the deepest fixpoint iteration it needed to make a
    /// control decision; 0 when it never had to distinguish anything.
    pub ambiguity_levels: Vec<usize>,
}

/// Every bad transition must be controllable by at least one controller.
pub fn test_controllability(aut: &Automaton) -> SupraResult<bool> {
    for transition in aut.bad_transitions() {
        let event = aut
            .event(transition.event)
            .ok_or(supra_core::SupraError::EventNotFound(transition.event))?;
        if !event.is_controllable() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Split configuration states that occur in more than one
/// indistinguishability class, so each occurrence has its own identity.
///
/// For every class beyond the first containing a state, a duplicate is
/// created (same marking and outgoing transitions) and the class's members
/// are relinked to it. Returns the map from every state of the result to the
/// state it originated from.
fn relabel_shared_configurations(
    working: &mut Automaton,
) -> SupraResult<HashMap<StateId, StateId>> {
    let n = working.n_controllers();
    let mut origin: HashMap<StateId, StateId> = working
        .state_ids()
        .map(|id| (id, id))
        .collect();

    for controller in 1..=n {
        let classes = indistinguishability_classes(working, controller)?;
        let mut first_class: HashMap<StateId, usize> = HashMap::new();
        for (index, class) in classes.iter().enumerate() {
            for &member in class {
                let first = *first_class.entry(member).or_insert(index);
                if first == index {
                    continue;
                }
                // Later occurrence: split it off.
                let Some(original) = working.state(member).cloned() else {
                    continue;
                };
                let duplicate = working.add_state(
                    format!("{}~{}", original.label, index),
                    original.marked,
                );
                origin.insert(duplicate, origin.get(&member).copied().unwrap_or(member));
                let transitions: Vec<Transition> = original.transitions.clone();
                for t in transitions {
                    working.add_transition(duplicate, t.event, t.target)?;
                }
                for &other in class {
                    if other == member {
                        continue;
                    }
                    let retargets: Vec<TransitionRef> = working
                        .state(other)
                        .map(|s| {
                            s.transitions
                                .iter()
                                .filter(|t| t.target == member)
                                .map(|t| TransitionRef::new(other, t.event, member))
                                .collect()
                        })
                        .unwrap_or_default();
                    for r in retargets {
                        working.remove_transition(&r);
                        working.add_transition(r.source, r.event, duplicate)?;
                    }
                }
            }
        }
    }
    Ok(origin)
}

/// Enablement and disablement configurations of one event in the structure,
/// by the event-label component at index 0.
fn configurations(u: &UStructure, label: &str) -> (HashSet<StateId>, HashSet<StateId>) {
    let mut enablement = HashSet::new();
    let mut disablement = HashSet::new();
    for state in u.automaton().states() {
        for transition in &state.transitions {
            let Some(vector) = u.event_vector(transition.event) else {
                continue;
            };
            if vector.component(0) != Some(label) {
                continue;
            }
            let reference = TransitionRef::new(state.id, transition.event, transition.target);
            let disables = u
                .data()
                .disablement_decisions
                .iter()
                .any(|d| d.transition == reference);
            if disables {
                disablement.insert(state.id);
            } else {
                enablement.insert(state.id);
            }
        }
    }
    (enablement, disablement)
}

/// Inference test for decentralized observability with ambiguity levels.
pub fn test_observability(aut: &Automaton) -> SupraResult<ObservabilityResult> {
    let n = aut.n_controllers();
    let u = synchronized_composition(aut)?;

    let mut working = u.automaton().clone();
    let origin = relabel_shared_configurations(&mut working)?;
    let classes: Vec<Vec<Vec<StateId>>> = (1..=n)
        .map(|controller| indistinguishability_classes(&working, controller))
        .collect::<SupraResult<_>>()?;
    let confused = |controller: usize, a: StateId, b: StateId| {
        classes[controller - 1]
            .iter()
            .any(|class| class.contains(&a) && class.contains(&b))
    };

    let mut ambiguity_levels = vec![0usize; n];
    let mut observable = true;

    for event in aut.events().iter().filter(|e| e.is_controllable()) {
        let controlling: Vec<usize> = (1..=n)
            .filter(|&i| event.controllable[i - 1])
            .collect();
        let (enablement, disablement) = configurations(&u, &event.label);

        // Project onto the relabeled graph: duplicates inherit their
        // origin's role.
        let with_origin = |set: &HashSet<StateId>| -> Vec<StateId> {
            origin
                .iter()
                .filter(|(_, &from)| set.contains(&from))
                .map(|(&id, _)| id)
                .collect()
        };
        let enable_states = with_origin(&enablement);
        let disable_states = with_origin(&disablement);

        mark_flags(&mut working, &enable_states, &disable_states);

        // One edge per controlling controller that cannot tell the
        // enablement configuration from the disablement one.
        let mut pairs: Vec<(StateId, StateId, Vec<usize>)> = Vec::new();
        for &e in &enable_states {
            for &d in &disable_states {
                if e == d {
                    continue;
                }
                let blockers: Vec<usize> = controlling
                    .iter()
                    .copied()
                    .filter(|&i| confused(i, e, d))
                    .collect();
                pairs.push((e, d, blockers));
            }
        }

        let mut unresolved: HashSet<StateId> = enable_states
            .iter()
            .chain(&disable_states)
            .copied()
            .collect();
        let mut active = pairs;
        let mut iteration = 0usize;
        loop {
            iteration += 1;
            let mut resolved: Vec<(StateId, usize)> = Vec::new();
            for &state in &unresolved {
                let decider = controlling.iter().copied().find(|&i| {
                    !active.iter().any(|(e, d, blockers)| {
                        (*e == state || *d == state) && blockers.contains(&i)
                    })
                });
                if let Some(i) = decider {
                    resolved.push((state, i));
                }
            }
            if resolved.is_empty() {
                break;
            }
            for (state, controller) in resolved {
                unresolved.remove(&state);
                active.retain(|(e, d, _)| *e != state && *d != state);
                ambiguity_levels[controller - 1] =
                    ambiguity_levels[controller - 1].max(iteration);
            }
        }

        if !unresolved.is_empty() {
            debug!(event = %event.label, stuck = unresolved.len(), "observability failure");
            observable = false;
        }
    }

    Ok(ObservabilityResult {
        observable,
        ambiguity_levels,
    })
}

/// Record each configuration's role on the state itself.
fn mark_flags(working: &mut Automaton, enable: &[StateId], disable: &[StateId]) {
    let ids: Vec<StateId> = working.state_ids().collect();
    for id in ids {
        if let Some(state) = working.state_mut(id) {
            state.enablement = false;
            state.disablement = false;
        }
    }
    for &id in enable {
        if let Some(state) = working.state_mut(id) {
            state.enablement = true;
        }
    }
    for &id in disable {
        if let Some(state) = working.state_mut(id) {
            state.disablement = true;
            state.enablement = false;
        }
    }
}
