//! Communication synthesis
//!
//! A potential communication is a synthesized event vector in which one
//! controller that observed the underlying event (the sender) fills in the
//! components of controllers that could not (the receivers). Candidates are
//! found by closing the structure's existing vector labels under least upper
//! bounds and pairing observable merges with compatible unobservable ones.

use std::collections::{BTreeSet, HashMap};

use supra_automata::{CommunicationData, TransitionRef};
use supra_core::{CommunicationRole, LabelVector, StateId, SupraResult};
use tracing::debug;

use crate::UStructure;

/// Knobs for [`add_communications`]
#[derive(Clone, Copy, Debug, Default)]
pub struct CommunicationOptions {
    /// Drop invalid communications into `suppressed_transitions` instead of
    /// recording them as invalid.
    pub suppress_invalid: bool,
}

/// Close a set of label vectors under least upper bounds.
fn least_upper_bound_closure(seeds: Vec<LabelVector>) -> BTreeSet<LabelVector> {
    let mut closure: BTreeSet<LabelVector> = seeds.into_iter().collect();
    let mut frontier: Vec<LabelVector> = closure.iter().cloned().collect();
    while let Some(vector) = frontier.pop() {
        let merges: Vec<LabelVector> = closure
            .iter()
            .filter_map(|other| vector.least_upper_bound(other))
            .collect();
        for merged in merges {
            if closure.insert(merged.clone()) {
                frontier.push(merged);
            }
        }
    }
    closure
}

/// Synthesize communications into a copy of the U-Structure.
///
/// Every merged label is inserted as a transition wherever all of its non-`*`
/// components can advance in the member decomposition. Merges with at least
/// one controller component on the observable side become potential
/// communications, one per possible sender; merges with no possible sender
/// are invalid and either recorded or suppressed per the options.
pub fn add_communications(
    u: &UStructure,
    options: &CommunicationOptions,
) -> SupraResult<UStructure> {
    let n = u.n_controllers();
    let mut result = u.clone();

    let seeds: Vec<LabelVector> = u
        .automaton()
        .events()
        .iter()
        .filter_map(|e| LabelVector::parse(&e.label).ok())
        .filter(|v| v.is_vector() && v.len() == n + 1)
        .collect();
    let closure = least_upper_bound_closure(seeds);

    // Labels already present, plus labels synthesized earlier in this pass:
    // the first sender/receiver split to produce a label owns it.
    let mut existing: BTreeSet<String> = u
        .automaton()
        .events()
        .iter()
        .map(|e| e.label.clone())
        .collect();
    let (observable, unobservable): (Vec<_>, Vec<_>) = closure
        .iter()
        .partition(|v| v.has_component(0));

    // Reverse index: member decomposition -> product state.
    let mut vector_index: HashMap<Vec<StateId>, StateId> = result
        .members_mut()
        .iter()
        .map(|(&id, v)| (v.clone(), id))
        .collect();

    for sender_side in &observable {
        for receiver_side in &unobservable {
            if sender_side.conflicts_with(receiver_side) {
                continue;
            }
            let Some(merged) = sender_side.least_upper_bound(receiver_side) else {
                continue;
            };
            let label = merged.to_string();
            if existing.contains(&label) {
                continue;
            }

            let senders: Vec<usize> =
                (1..=n).filter(|&i| sender_side.has_component(i)).collect();
            let receivers: Vec<usize> =
                (1..=n).filter(|&i| receiver_side.has_component(i)).collect();
            if receivers.is_empty() {
                continue;
            }

            let inserted =
                insert_communication_transitions(&mut result, &mut vector_index, &merged)?;
            if inserted.is_empty() {
                continue;
            }
            existing.insert(label);

            for transition in inserted {
                if senders.is_empty() {
                    // No controller observed the event: nobody can send it.
                    record_invalid(&mut result, transition, options)?;
                    continue;
                }
                for &sender in &senders {
                    let roles: Vec<CommunicationRole> = (1..=n)
                        .map(|i| {
                            if i == sender {
                                CommunicationRole::Sender
                            } else if receiver_side.has_component(i) {
                                CommunicationRole::Receiver
                            } else {
                                CommunicationRole::None
                            }
                        })
                        .collect();
                    result.automaton_mut().add_potential_communication(
                        CommunicationData::new(transition, roles),
                    )?;
                }
            }
        }
    }

    debug!(
        potential = result.data().potential_communications.len(),
        invalid = result.data().invalid_communications.len(),
        suppressed = result.data().suppressed_transitions.len(),
        "communication synthesis"
    );
    Ok(result)
}

fn record_invalid(
    u: &mut UStructure,
    transition: TransitionRef,
    options: &CommunicationOptions,
) -> SupraResult<()> {
    if options.suppress_invalid {
        u.automaton_mut().add_suppressed_transition(transition)
    } else {
        u.automaton_mut().add_invalid_communication(transition)
    }
}

/// Insert one transition per product state where every non-`*` component of
/// the merged vector can advance, creating the event and any missing target
/// states, and return the inserted transition refs.
fn insert_communication_transitions(
    u: &mut UStructure,
    vector_index: &mut HashMap<Vec<StateId>, StateId>,
    merged: &LabelVector,
) -> SupraResult<Vec<TransitionRef>> {
    let n = u.n_controllers();
    let mut inserted = Vec::new();

    // Resolve each component to its source event up front; a component
    // naming an unknown source event never advances anywhere.
    let mut component_events = Vec::with_capacity(n + 1);
    for j in 0..=n {
        if merged.has_component(j) {
            let component = merged
                .component(j)
                .unwrap_or_default()
                .to_string();
            match u.source().event_by_label(&component) {
                Some(event) => component_events.push(Some(event.id)),
                None => return Ok(inserted),
            }
        } else {
            component_events.push(None);
        }
    }

    // First pass finds the sites where every non-`*` component advances;
    // the merged event is only registered once at least one exists, so a
    // merge with no reachable site leaves no dangling zero-transition event.
    let sites: Vec<(StateId, Vec<StateId>)> = u
        .members_mut()
        .iter()
        .map(|(&id, members)| (id, members.clone()))
        .collect();
    let mut advancing: Vec<(StateId, Vec<StateId>)> = Vec::new();
    'site: for (product_state, members) in sites {
        let mut target_members = Vec::with_capacity(n + 1);
        for (j, &member) in members.iter().enumerate() {
            match component_events[j] {
                Some(source_event) => {
                    let Some(state) = u.source().state(member) else {
                        continue 'site;
                    };
                    match state.transition_on(source_event) {
                        Some(t) => target_members.push(t.target),
                        None => continue 'site,
                    }
                }
                None => target_members.push(member),
            }
        }
        advancing.push((product_state, target_members));
    }
    if advancing.is_empty() {
        return Ok(inserted);
    }

    let observable: Vec<bool> = (1..=n).map(|i| merged.has_component(i)).collect();
    let controllable = component_events[0]
        .and_then(|id| u.source().event(id))
        .map(|e| e.controllable.clone())
        .unwrap_or_else(|| vec![false; n]);
    let event_id = u.automaton_mut().add_event_if_absent(
        &merged.to_string(),
        observable,
        controllable,
    )?;

    for (product_state, target_members) in advancing {
        let target = match vector_index.get(&target_members) {
            Some(&id) => id,
            None => {
                let label = target_members
                    .iter()
                    .map(|&id| {
                        u.source()
                            .state(id)
                            .map(|s| s.label.clone())
                            .unwrap_or_else(|| id.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join("_");
                let marked = target_members
                    .iter()
                    .all(|&id| u.source().state(id).is_some_and(|s| s.marked));
                let id = u.automaton_mut().add_state(label, marked);
                u.members_mut().insert(id, target_members.clone());
                vector_index.insert(target_members, id);
                id
            }
        };

        u.automaton_mut()
            .add_transition(product_state, event_id, target)?;
        inserted.push(TransitionRef::new(product_state, event_id, target));
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synchronized_composition;
    use supra_automata::Automaton;

    /// Two controllers; only controller 1 observes `a`.
    fn one_observer() -> UStructure {
        let mut aut = Automaton::new(2);
        let a = aut
            .add_event("a", vec![true, false], vec![true, false])
            .unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        synchronized_composition(&aut).unwrap()
    }

    #[test]
    fn test_lub_closure() {
        let closure = least_upper_bound_closure(vec![
            LabelVector::parse("<a,a,*>").unwrap(),
            LabelVector::parse("<*,*,a>").unwrap(),
        ]);
        assert!(closure.contains(&LabelVector::parse("<a,a,a>").unwrap()));
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn test_potential_communication_synthesized() {
        // <a,a,*> (system + controller 1) merges with <*,*,a> (controller 2's
        // local move): controller 1 can tell controller 2 about a.
        let u = one_observer();
        let with_comms = add_communications(&u, &CommunicationOptions::default()).unwrap();

        let comms = &with_comms.data().potential_communications;
        assert_eq!(comms.len(), 1);
        assert_eq!(comms[0].sender(), Some(1));
        assert_eq!(comms[0].receivers(), vec![2]);

        let event = with_comms.automaton().event_by_label("<a,a,a>").unwrap();
        assert_eq!(event.observable, vec![true, true]);
        // Controllability comes from the underlying source event.
        assert_eq!(event.controllable, vec![true, false]);
        assert!(with_comms
            .automaton()
            .transition_exists(&comms[0].transition));
    }

    #[test]
    fn test_communication_target_decomposition() {
        let u = one_observer();
        let with_comms = add_communications(&u, &CommunicationOptions::default()).unwrap();
        let comm = &with_comms.data().potential_communications[0];
        // All three members advance to the source's state 2.
        let members = with_comms.members(comm.transition.target).unwrap();
        assert!(members.iter().all(|&id| {
            with_comms.source().state(id).is_some_and(|s| s.label == "2")
        }));
    }

    #[test]
    fn test_invalid_communication_recorded() {
        // Nobody observes a: the merge <a,a,*> has no possible sender.
        let mut aut = Automaton::new(2);
        let a = aut
            .add_event("a", vec![false, false], vec![false, false])
            .unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        let u = synchronized_composition(&aut).unwrap();

        let kept = add_communications(&u, &CommunicationOptions::default()).unwrap();
        assert!(!kept.data().invalid_communications.is_empty());
        assert!(kept.data().suppressed_transitions.is_empty());

        let suppressed = add_communications(
            &u,
            &CommunicationOptions {
                suppress_invalid: true,
            },
        )
        .unwrap();
        assert!(suppressed.data().invalid_communications.is_empty());
        assert!(!suppressed.data().suppressed_transitions.is_empty());
    }

    #[test]
    fn test_unreachable_merge_leaves_no_event() {
        // a fires only from state 1 and b only from state 2, so no product
        // state lets both components of <a,b> advance at once.
        let mut aut = Automaton::new(1);
        let a = aut.add_event("a", vec![true], vec![true]).unwrap();
        let b = aut.add_event("b", vec![true], vec![false]).unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        aut.add_transition(s2, b, s1).unwrap();
        let mut u = synchronized_composition(&aut).unwrap();

        let mut index: HashMap<Vec<supra_core::StateId>, supra_core::StateId> = HashMap::new();
        let merged = LabelVector::parse("<a,b>").unwrap();
        let inserted = insert_communication_transitions(&mut u, &mut index, &merged).unwrap();
        assert!(inserted.is_empty());
        assert!(u.automaton().event_by_label("<a,b>").is_none());
    }

    #[test]
    fn test_synthesized_events_all_carry_transitions() {
        let u = one_observer();
        let with_comms = add_communications(&u, &CommunicationOptions::default()).unwrap();
        for event in with_comms.automaton().events() {
            let used = with_comms
                .automaton()
                .states()
                .any(|s| s.transition_on(event.id).is_some());
            assert!(used, "event {} has no transitions", event.label);
        }
    }

    #[test]
    fn test_no_vector_labels_no_communications() {
        let u = one_observer();
        // A fresh structure with the communication pass applied twice adds
        // nothing new: merged labels already exist after the first pass.
        let once = add_communications(&u, &CommunicationOptions::default()).unwrap();
        let twice = add_communications(&once, &CommunicationOptions::default()).unwrap();
        assert_eq!(
            once.data().potential_communications.len(),
            twice.data().potential_communications.len()
        );
    }
}
