//! Seeded random automaton generation
//!
//! Every generated automaton is fully determined by its config, so a failing
//! case reproduces from the seed alone. Connectivity is guaranteed by a
//! spanning chain from the initial state; everything else is random.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use supra_automata::Automaton;
use supra_core::{EventId, StateId};

/// Generator configuration
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub n_states: usize,
    pub n_events: usize,
    pub n_controllers: usize,
    /// Extra random transitions per state, on top of the spanning chain
    pub extra_transitions: usize,
    /// Probability that a state is marked
    pub marked_prob: f64,
    /// Probability that a transition is classified bad
    pub bad_prob: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            n_states: 20,
            n_events: 5,
            n_controllers: 2,
            extra_transitions: 2,
            marked_prob: 0.3,
            bad_prob: 0.1,
            seed: 42,
        }
    }
}

impl GeneratorConfig {
    /// Small inputs for quick checks
    pub fn light() -> Self {
        GeneratorConfig {
            n_states: 6,
            n_events: 3,
            n_controllers: 1,
            extra_transitions: 1,
            ..GeneratorConfig::default()
        }
    }

    /// Larger inputs for benchmarks
    pub fn heavy() -> Self {
        GeneratorConfig {
            n_states: 200,
            n_events: 12,
            n_controllers: 3,
            extra_transitions: 3,
            ..GeneratorConfig::default()
        }
    }
}

/// Generate a random connected automaton.
pub fn generate(config: &GeneratorConfig) -> Automaton {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut aut = Automaton::new(config.n_controllers);

    let mut events = Vec::with_capacity(config.n_events);
    for i in 0..config.n_events {
        let observable: Vec<bool> = (0..config.n_controllers).map(|_| rng.gen()).collect();
        let controllable: Vec<bool> = (0..config.n_controllers).map(|_| rng.gen()).collect();
        // Unique single-letter-style labels: e0, e1, ...
        let id = aut
            .add_event(format!("e{i}"), observable, controllable)
            .unwrap_or(EventId::NONE);
        events.push(id);
    }

    let mut states = Vec::with_capacity(config.n_states);
    for i in 0..config.n_states {
        let marked = rng.gen_bool(config.marked_prob);
        states.push(aut.add_state(format!("{}", i + 1), marked));
    }
    if let Some(&initial) = states.first() {
        let _ = aut.set_initial(initial);
    }

    let maybe_bad = |aut: &mut Automaton,
                         rng: &mut StdRng,
                         source: StateId,
                         event: EventId,
                         target: StateId| {
        if aut.add_transition(source, event, target).is_ok() && rng.gen_bool(config.bad_prob) {
            let _ = aut.mark_transition_bad(source, event, target);
        }
    };

    // Spanning chain keeps every state reachable.
    for window in states.windows(2) {
        let event = events[rng.gen_range(0..events.len())];
        maybe_bad(&mut aut, &mut rng, window[0], event, window[1]);
    }
    for &source in &states {
        for _ in 0..config.extra_transitions {
            let event = events[rng.gen_range(0..events.len())];
            let target = states[rng.gen_range(0..states.len())];
            maybe_bad(&mut aut, &mut rng, source, event, target);
        }
    }
    aut
}
