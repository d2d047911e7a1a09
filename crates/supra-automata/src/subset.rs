//! Per-controller subset construction (determinization)
//!
//! The observer automaton of one controller: states are null-closures (sets
//! of states reachable through transitions the controller cannot observe),
//! transitions group the closure's observable moves by event. Controller
//! index 0 is the system's own determinization.
//!
//! Observability of a transition resolves through the event's vector label
//! when one is present (the shape U-Structure events have); plain events fall
//! back to the per-controller attribute array.

use std::collections::{BTreeSet, HashMap, VecDeque};

use supra_core::{Event, LabelVector, StateId, SupraError, SupraResult};
use tracing::debug;

use crate::{Automaton, StateSet};

/// Whether one controller can observe occurrences of an event.
///
/// For events labeled with a vector of `nControllers + 1` components the
/// controller's component decides; otherwise the event's attribute array
/// does (and the system view, index 0, observes everything).
pub fn event_observable_to(aut: &Automaton, event: &Event, controller: usize) -> bool {
    if event.label.starts_with('<') {
        if let Ok(vector @ LabelVector::Vector(_)) = LabelVector::parse(&event.label) {
            if vector.len() == aut.n_controllers() + 1 {
                return vector.has_component(controller);
            }
        }
    }
    event.is_observable_to(controller).unwrap_or(false)
}

/// States reachable from `start` through transitions unobservable to the
/// controller, including `start` itself. Iterative, cycle-safe.
pub fn null_closure(aut: &Automaton, start: StateId, controller: usize) -> BTreeSet<StateId> {
    let mut closure = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !closure.insert(id) {
            continue;
        }
        let Some(state) = aut.state(id) else { continue };
        for transition in &state.transitions {
            let Some(event) = aut.event(transition.event) else {
                continue;
            };
            if !event_observable_to(aut, event, controller) && !closure.contains(&transition.target)
            {
                stack.push(transition.target);
            }
        }
    }
    closure
}

/// Deterministic observer automaton for one controller.
///
/// The result's states are canonicalized closures; a set state is marked iff
/// any member is marked. State IDs are dense in discovery order.
pub fn subset_construction(aut: &Automaton, controller: usize) -> SupraResult<Automaton> {
    if controller > aut.n_controllers() {
        return Err(SupraError::InvalidControllerIndex {
            index: controller,
            n_controllers: aut.n_controllers(),
        });
    }
    let initial = aut.initial().ok_or(SupraError::NoInitialState)?;

    let mut observer = Automaton::new(aut.n_controllers());
    for event in aut.events() {
        observer.add_event(
            event.label.clone(),
            event.observable.clone(),
            event.controllable.clone(),
        )?;
    }

    let member_label = |id: StateId| {
        aut.state(id)
            .map(|s| s.label.clone())
            .unwrap_or_else(|| id.to_string())
    };

    let start = StateSet::new(null_closure(aut, initial, controller).into_iter().collect());
    let mut id_of: HashMap<StateSet, StateId> = HashMap::new();
    let mut queue: VecDeque<StateSet> = VecDeque::new();

    let marked = start.ids().iter().any(|&id| {
        aut.state(id).is_some_and(|s| s.marked)
    });
    let start_id = observer.add_state(start.label(member_label), marked);
    observer.set_initial(start_id)?;
    id_of.insert(start.clone(), start_id);
    queue.push_back(start);

    while let Some(set) = queue.pop_front() {
        let source = id_of[&set];
        // Group the closure's observable moves by event, closing targets.
        let mut moves: HashMap<supra_core::EventId, BTreeSet<StateId>> = HashMap::new();
        for &member in set.ids() {
            let Some(state) = aut.state(member) else { continue };
            for transition in &state.transitions {
                let Some(event) = aut.event(transition.event) else {
                    continue;
                };
                if !event_observable_to(aut, event, controller) {
                    continue;
                }
                moves
                    .entry(transition.event)
                    .or_default()
                    .extend(null_closure(aut, transition.target, controller));
            }
        }

        let mut ordered: Vec<_> = moves.into_iter().collect();
        ordered.sort_by_key(|(event, _)| *event);
        for (event, targets) in ordered {
            let target_set = StateSet::new(targets.into_iter().collect());
            let target_id = match id_of.get(&target_set) {
                Some(&id) => id,
                None => {
                    let marked = target_set
                        .ids()
                        .iter()
                        .any(|&id| aut.state(id).is_some_and(|s| s.marked));
                    let id = observer.add_state(target_set.label(member_label), marked);
                    id_of.insert(target_set.clone(), id);
                    queue.push_back(target_set);
                    id
                }
            };
            observer.add_transition(source, event, target_id)?;
        }
    }

    debug!(
        controller,
        observer_states = observer.n_states(),
        "subset construction"
    );
    Ok(observer)
}

/// The indistinguishability classes of one controller: every canonical
/// closure set the observer visits, as member-ID lists.
pub fn indistinguishability_classes(
    aut: &Automaton,
    controller: usize,
) -> SupraResult<Vec<Vec<StateId>>> {
    let initial = aut.initial().ok_or(SupraError::NoInitialState)?;
    let mut classes: Vec<Vec<StateId>> = Vec::new();
    let mut seen: HashMap<StateSet, ()> = HashMap::new();
    let mut queue: VecDeque<StateSet> = VecDeque::new();

    let start = StateSet::new(null_closure(aut, initial, controller).into_iter().collect());
    seen.insert(start.clone(), ());
    queue.push_back(start);

    while let Some(set) = queue.pop_front() {
        classes.push(set.ids().to_vec());
        let mut moves: HashMap<supra_core::EventId, BTreeSet<StateId>> = HashMap::new();
        for &member in set.ids() {
            let Some(state) = aut.state(member) else { continue };
            for transition in &state.transitions {
                let Some(event) = aut.event(transition.event) else {
                    continue;
                };
                if !event_observable_to(aut, event, controller) {
                    continue;
                }
                moves
                    .entry(transition.event)
                    .or_default()
                    .extend(null_closure(aut, transition.target, controller));
            }
        }
        for (_, targets) in moves {
            let target_set = StateSet::new(targets.into_iter().collect());
            if !seen.contains_key(&target_set) {
                seen.insert(target_set.clone(), ());
                queue.push_back(target_set);
            }
        }
    }
    Ok(classes)
}
