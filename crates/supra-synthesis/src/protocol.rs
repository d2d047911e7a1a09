//! Communication protocols
//!
//! A protocol is a chosen subset of a U-Structure's potential
//! communications. Applying one drops the transitions of every communication
//! left out (and every invalid one), then prunes the partial occurrences of
//! each chosen vector. Feasibility asks whether the applied structure still
//! reaches a strict sub-vector of a chosen communication from anywhere the
//! sender cannot distinguish from its source.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use supra_automata::{subset::event_observable_to, Automaton, CommunicationData, TransitionRef};
use supra_core::{StateId, SupraError, SupraResult};
use tracing::{debug, warn};

use crate::{PrunedUStructure, UStructure};

/// Candidate counts past this make the powerset enumeration impractical.
const ENUMERATION_WARN_THRESHOLD: usize = 20;

/// A chosen set of communications
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Protocol {
    communications: Vec<CommunicationData>,
}

impl Protocol {
    pub fn new(communications: Vec<CommunicationData>) -> Self {
        let mut protocol = Protocol::default();
        for comm in communications {
            protocol.add(comm);
        }
        protocol
    }

    pub fn communications(&self) -> &[CommunicationData] {
        &self.communications
    }

    pub fn len(&self) -> usize {
        self.communications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communications.is_empty()
    }

    pub fn contains(&self, communication: &CommunicationData) -> bool {
        self.communications.contains(communication)
    }

    /// Is some chosen communication carried by this transition?
    pub fn contains_transition(&self, transition: &TransitionRef) -> bool {
        self.communications
            .iter()
            .any(|c| c.transition == *transition)
    }

    pub fn add(&mut self, communication: CommunicationData) {
        if !self.contains(&communication) {
            self.communications.push(communication);
        }
    }
}

/// States connected to `start` through edges the controller cannot observe,
/// traversed in both directions. Always contains `start`.
pub fn connecting_states(aut: &Automaton, start: StateId, controller: usize) -> Vec<StateId> {
    let mut incoming: HashMap<StateId, Vec<(supra_core::EventId, StateId)>> = HashMap::new();
    for state in aut.states() {
        for transition in &state.transitions {
            incoming
                .entry(transition.target)
                .or_default()
                .push((transition.event, state.id));
        }
    }

    let unobservable = |event_id| {
        aut.event(event_id)
            .is_some_and(|e| !event_observable_to(aut, e, controller))
    };

    let mut connected: BTreeSet<StateId> = BTreeSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        if !connected.insert(id) {
            continue;
        }
        if let Some(state) = aut.state(id) {
            for transition in &state.transitions {
                if unobservable(transition.event) && !connected.contains(&transition.target) {
                    queue.push_back(transition.target);
                }
            }
        }
        for &(event, source) in incoming.get(&id).into_iter().flatten() {
            if unobservable(event) && !connected.contains(&source) {
                queue.push_back(source);
            }
        }
    }
    connected.into_iter().collect()
}

/// Apply a protocol: drop un-chosen and invalid communication transitions,
/// then prune the partial occurrences of every chosen communication.
pub fn apply_protocol(u: &UStructure, protocol: &Protocol) -> SupraResult<PrunedUStructure> {
    let mut pruned = PrunedUStructure::from_ustructure(u);
    let data = u.data().clone();

    let mut dropped: HashSet<TransitionRef> = HashSet::new();
    for comm in &data.potential_communications {
        if !protocol.contains_transition(&comm.transition) {
            dropped.insert(comm.transition);
        }
    }
    dropped.extend(data.invalid_communications.iter().copied());
    for transition in dropped {
        pruned.inner_mut().automaton_mut().remove_transition(&transition);
    }

    for comm in protocol.communications() {
        let vector = u
            .event_vector(comm.transition.event)
            .ok_or_else(|| {
                SupraError::CorruptAutomaton(format!(
                    "communication on non-vector event {:?}",
                    comm.transition.event
                ))
            })?;
        pruned.prune(protocol, &vector, comm.transition.source)?;
    }
    Ok(pruned)
}

/// Is the protocol feasible on this structure?
///
/// After application, no strict sub-vector of a surviving communication's
/// vector may remain reachable from a state the sender cannot distinguish
/// from the communication's source.
pub fn is_feasible_protocol(u: &UStructure, protocol: &Protocol) -> SupraResult<bool> {
    let applied = apply_protocol(u, protocol)?;
    let structure = applied.ustructure();
    let aut = structure.automaton();

    for comm in protocol.communications() {
        if !aut.transition_exists(&comm.transition) {
            continue;
        }
        let Some(vector) = structure.event_vector(comm.transition.event) else {
            continue;
        };
        let Some(sender) = comm.sender() else {
            continue;
        };
        for state_id in connecting_states(aut, comm.transition.source, sender) {
            let Some(state) = aut.state(state_id) else { continue };
            for transition in &state.transitions {
                if let Some(other) = structure.event_vector(transition.event) {
                    if other.is_strict_sub_vector_of(&vector) {
                        return Ok(false);
                    }
                }
            }
        }
    }
    Ok(true)
}

/// Does the applied structure retain any violation?
fn resolves_all_violations(applied: &PrunedUStructure) -> bool {
    let data = applied.ustructure().data();
    data.unconditional_violations.is_empty() && data.conditional_violations.is_empty()
}

fn enumerate_feasible(
    u: &UStructure,
    require_resolution: bool,
) -> SupraResult<Vec<Protocol>> {
    let candidates = &u.data().potential_communications;
    // Subset masks are 64-bit; anything close to that bound could never be
    // enumerated anyway.
    if candidates.len() >= 64 {
        return Err(SupraError::IdOverflow);
    }
    if candidates.len() > ENUMERATION_WARN_THRESHOLD {
        warn!(
            candidates = candidates.len(),
            "protocol enumeration is exponential in the candidate count"
        );
    }

    // Masks ascending by popcount; the empty protocol is excluded outright.
    let mut masks: Vec<u64> = (1..(1u64 << candidates.len())).collect();
    masks.sort_by_key(|m| m.count_ones());

    let mut feasible = Vec::new();
    for mask in masks {
        let chosen: Vec<CommunicationData> = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, c)| c.clone())
            .collect();
        let protocol = Protocol::new(chosen);
        if !is_feasible_protocol(u, &protocol)? {
            continue;
        }
        if require_resolution && !resolves_all_violations(&apply_protocol(u, &protocol)?) {
            continue;
        }
        feasible.push(protocol);
    }
    debug!(feasible = feasible.len(), "protocol enumeration");
    Ok(feasible)
}

/// All feasible non-empty protocols, ascending by size.
pub fn generate_all_feasible_protocols(
    u: &UStructure,
    require_resolution: bool,
) -> SupraResult<Vec<Protocol>> {
    enumerate_feasible(u, require_resolution)
}

/// The feasible non-empty protocols of minimum size.
pub fn generate_smallest_feasible_protocols(
    u: &UStructure,
    require_resolution: bool,
) -> SupraResult<Vec<Protocol>> {
    let all = enumerate_feasible(u, require_resolution)?;
    let Some(min) = all.iter().map(Protocol::len).min() else {
        return Ok(Vec::new());
    };
    Ok(all.into_iter().filter(|p| p.len() == min).collect())
}

/// Nearest potential communication resolving the violating vector: BFS over
/// predecessors from the violation's source, looking for a communication
/// whose vector is a strict super-vector of the violating one.
fn nearest_resolving_communication(
    u: &UStructure,
    violation: &TransitionRef,
) -> SupraResult<Option<CommunicationData>> {
    let vector = u
        .event_vector(violation.event)
        .ok_or_else(|| {
            SupraError::CorruptAutomaton(format!(
                "violation on non-vector event {:?}",
                violation.event
            ))
        })?;
    let inverted = u.automaton().invert();
    let candidates = &u.data().potential_communications;

    let mut visited: HashSet<StateId> = HashSet::new();
    let mut queue = VecDeque::from([violation.source]);
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        for comm in candidates {
            if comm.transition.source != id {
                continue;
            }
            if let Some(comm_vector) = u.event_vector(comm.transition.event) {
                if comm_vector.is_strict_super_vector_of(&vector) {
                    return Ok(Some(comm.clone()));
                }
            }
        }
        // Predecessors in the source graph are successors in the inversion.
        if let Some(state) = inverted.state(id) {
            for transition in &state.transitions {
                if !visited.contains(&transition.target) {
                    queue.push_back(transition.target);
                }
            }
        }
    }
    Ok(None)
}

/// Greedy protocol construction: resolve one violation at a time with the
/// nearest super-vector communication and everything indistinguishable from
/// it, until no violations remain.
///
/// Re-selecting an already-chosen communication means the search cannot make
/// progress and fails with [`SupraError::ProtocolSearchLoop`]; a violation
/// with no resolving candidate fails with
/// [`SupraError::NoResolvingCommunication`].
pub fn generate_feasible_protocol(u: &UStructure) -> SupraResult<Protocol> {
    let mut protocol = Protocol::default();
    loop {
        let applied = apply_protocol(u, &protocol)?;
        let data = applied.ustructure().data();
        let violation = data
            .unconditional_violations
            .first()
            .or_else(|| data.conditional_violations.first())
            .copied();
        let Some(violation) = violation else {
            debug!(size = protocol.len(), "greedy protocol complete");
            return Ok(protocol);
        };

        let comm = nearest_resolving_communication(u, &violation)?
            .ok_or(SupraError::NoResolvingCommunication)?;
        if protocol.contains(&comm) {
            return Err(SupraError::ProtocolSearchLoop);
        }

        // A sender cannot choose to communicate only here if it cannot tell
        // "here" apart from elsewhere: pull in the indistinguishable twins.
        let twins: Vec<CommunicationData> = match comm.sender() {
            Some(sender) => {
                let connected =
                    connecting_states(u.automaton(), comm.transition.source, sender);
                u.data()
                    .potential_communications
                    .iter()
                    .filter(|c| c.roles == comm.roles)
                    .filter(|c| connected.binary_search(&c.transition.source).is_ok())
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };
        protocol.add(comm);
        for twin in twins {
            protocol.add(twin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{add_communications, synchronized_composition, CommunicationOptions};

    /// Controller 1 observes a, controller 2 controls it blindly; the lone
    /// transition is bad, so only a communication can resolve it.
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

    fn full_protocol(u: &UStructure) -> Protocol {
        Protocol::new(u.data().potential_communications.to_vec())
    }

    #[test]
    fn test_connecting_states_bidirectional() {
        let u = blind_disabler();
        let initial = u.automaton().initial().unwrap();
        // Controller 1 cannot see <*,*,a> moves; they connect states in both
        // directions.
        let connected = connecting_states(u.automaton(), initial, 1);
        assert!(connected.len() >= 2);
        assert!(connected.contains(&initial));
    }

    #[test]
    fn test_apply_empty_protocol_drops_communications() {
        let u = blind_disabler();
        let applied = apply_protocol(&u, &Protocol::default()).unwrap();
        assert!(applied
            .ustructure()
            .data()
            .potential_communications
            .is_empty());
        // Violations ride on plain vector transitions and survive.
        assert!(!applied
            .ustructure()
            .data()
            .unconditional_violations
            .is_empty());
    }

    #[test]
    fn test_full_protocol_feasible() {
        let u = blind_disabler();
        assert!(u.data().invalid_communications.is_empty());
        assert!(is_feasible_protocol(&u, &full_protocol(&u)).unwrap());
    }

    #[test]
    fn test_enumeration_excludes_empty() {
        let u = blind_disabler();
        for protocol in generate_all_feasible_protocols(&u, false).unwrap() {
            assert!(!protocol.is_empty());
        }
    }

    #[test]
    fn test_smallest_protocols_minimal() {
        let u = blind_disabler();
        let smallest = generate_smallest_feasible_protocols(&u, true).unwrap();
        assert!(!smallest.is_empty());
        let all = generate_all_feasible_protocols(&u, true).unwrap();
        let min = all.iter().map(Protocol::len).min().unwrap();
        assert!(smallest.iter().all(|p| p.len() == min));
    }

    #[test]
    fn test_greedy_resolves_blind_disablement() {
        let u = blind_disabler();
        let protocol = generate_feasible_protocol(&u).unwrap();
        assert!(!protocol.is_empty());
        let applied = apply_protocol(&u, &protocol).unwrap();
        assert!(resolves_all_violations(&applied));
    }

    #[test]
    fn test_greedy_trivial_when_no_violations() {
        let mut aut = Automaton::new(1);
        let a = aut.add_event("a", vec![true], vec![true]).unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        let u = synchronized_composition(&aut).unwrap();

        let protocol = generate_feasible_protocol(&u).unwrap();
        assert!(protocol.is_empty());
    }

    #[test]
    fn test_no_resolving_communication() {
        // Violations but no communications at all: nothing can resolve them.
        let mut aut = Automaton::new(1);
        let a = aut.add_event("a", vec![true], vec![false]).unwrap();
        let s1 = aut.add_state("1", false);
        let s2 = aut.add_state("2", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        aut.mark_transition_bad(s1, a, s2).unwrap();
        let u = synchronized_composition(&aut).unwrap();
        assert!(!u.data().unconditional_violations.is_empty());

        assert!(matches!(
            generate_feasible_protocol(&u),
            Err(SupraError::NoResolvingCommunication)
        ));
    }
}
