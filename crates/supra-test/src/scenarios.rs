//! Hand-built scenario systems
//!
//! The small systems the analysis properties are stated over. Builders live
//! here so integration tests and benches share them.

use supra_automata::Automaton;

/// States {1,2,3}, initial 1, one event `a`, transitions 1->2 (bad) and
/// 1->3. Controllability of `a` is the toggle.
pub fn toggle_scenario(controllable: bool) -> Automaton {
    let mut aut = Automaton::new(1);
    let a = aut.add_event("a", vec![true], vec![controllable]).unwrap();
    let s1 = aut.add_state("1", false);
    let s2 = aut.add_state("2", true);
    let s3 = aut.add_state("3", true);
    aut.set_initial(s1).unwrap();
    aut.add_transition(s1, a, s2).unwrap();
    aut.add_transition(s1, a, s3).unwrap();
    aut.mark_transition_bad(s1, a, s2).unwrap();
    aut
}

/// Two controllers; only controller 1 observes `a`.
pub fn partial_observation_scenario() -> Automaton {
    let mut aut = Automaton::new(2);
    let a = aut.add_event("a", vec![true, false], vec![true, false]).unwrap();
    let s1 = aut.add_state("1", false);
    let s2 = aut.add_state("2", true);
    aut.set_initial(s1).unwrap();
    aut.add_transition(s1, a, s2).unwrap();
    aut
}

/// Controller 1 observes `a`, controller 2 controls it blindly, and the
/// lone transition is bad: only a communication can resolve the violation.
pub fn blind_disabler_scenario() -> Automaton {
    let mut aut = Automaton::new(2);
    let a = aut.add_event("a", vec![true, false], vec![false, true]).unwrap();
    let s1 = aut.add_state("1", false);
    let s2 = aut.add_state("2", true);
    aut.set_initial(s1).unwrap();
    aut.add_transition(s1, a, s2).unwrap();
    aut.mark_transition_bad(s1, a, s2).unwrap();
    aut
}

/// One controller, no bad transitions: synthesis must find no violations.
pub fn violation_free_scenario() -> Automaton {
    let mut aut = Automaton::new(1);
    let a = aut.add_event("a", vec![true], vec![true]).unwrap();
    let b = aut.add_event("b", vec![false], vec![false]).unwrap();
    let s1 = aut.add_state("1", false);
    let s2 = aut.add_state("2", true);
    aut.set_initial(s1).unwrap();
    aut.add_transition(s1, a, s2).unwrap();
    aut.add_transition(s2, b, s1).unwrap();
    aut
}
