//! The automaton core
//!
//! An automaton owns its event list, state map, initial state, controller
//! count, and the classified special transitions. It is logically immutable
//! input to the algebraic operations, which build and return a fresh
//! automaton; the mutator API here is used while constructing one.

use std::collections::{BTreeMap, HashMap, HashSet};

use supra_core::{Event, EventId, StateId, SupraError, SupraResult};

use crate::{AutomatonKind, State, Transition, TransitionRef, UStructureData};

/// A finite-state automaton under decentralized control
#[derive(Clone, Debug, PartialEq)]
pub struct Automaton {
    kind: AutomatonKind,
    n_controllers: usize,
    /// Dense event list; `events[i]` has id `i + 1`
    events: Vec<Event>,
    states: BTreeMap<StateId, State>,
    initial: Option<StateId>,
    /// Transitions a supervisor must prevent
    bad_transitions: Vec<TransitionRef>,
    next_state_id: u64,
}

impl Automaton {
    pub fn new(n_controllers: usize) -> Self {
        Automaton::with_kind(AutomatonKind::Plain, n_controllers)
    }

    pub fn with_kind(kind: AutomatonKind, n_controllers: usize) -> Self {
        Automaton {
            kind,
            n_controllers,
            events: Vec::new(),
            states: BTreeMap::new(),
            initial: None,
            bad_transitions: Vec::new(),
            next_state_id: 1,
        }
    }

    // --- accessors ---

    #[inline]
    pub fn kind(&self) -> &AutomatonKind {
        &self.kind
    }

    #[inline]
    pub fn n_controllers(&self) -> usize {
        self.n_controllers
    }

    #[inline]
    pub fn n_states(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event(&self, id: EventId) -> Option<&Event> {
        if id.is_none() {
            return None;
        }
        self.events.get(id.0 as usize - 1)
    }

    pub fn event_by_label(&self, label: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.label == label)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    pub fn state_ids(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states.keys().copied()
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(&id)
    }

    pub fn state_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.states.get_mut(&id)
    }

    pub fn state_by_label(&self, label: &str) -> Option<&State> {
        self.states.values().find(|s| s.label == label)
    }

    /// Largest state ID currently in use
    pub fn max_state_id(&self) -> u64 {
        self.states.keys().next_back().map_or(0, |id| id.0)
    }

    pub fn bad_transitions(&self) -> &[TransitionRef] {
        &self.bad_transitions
    }

    pub fn is_bad_transition(&self, transition: &TransitionRef) -> bool {
        self.bad_transitions.contains(transition)
    }

    /// The U-Structure collections, when this automaton carries them
    pub fn ustructure_data(&self) -> Option<&UStructureData> {
        self.kind.data()
    }

    pub fn ustructure_data_mut(&mut self) -> Option<&mut UStructureData> {
        self.kind.data_mut()
    }

    pub fn transition_exists(&self, transition: &TransitionRef) -> bool {
        self.states
            .get(&transition.source)
            .is_some_and(|s| s.has_transition(transition.event, transition.target))
    }

    // --- builder API ---

    /// Add an event with a unique label. Attribute vectors must have length
    /// `nControllers`.
    pub fn add_event(
        &mut self,
        label: impl Into<String>,
        observable: Vec<bool>,
        controllable: Vec<bool>,
    ) -> SupraResult<EventId> {
        let label = label.into();
        if observable.len() != self.n_controllers || controllable.len() != self.n_controllers {
            return Err(SupraError::IncompatibleAutomata(format!(
                "event {label:?} attribute vectors must have length {}",
                self.n_controllers
            )));
        }
        if self.event_by_label(&label).is_some() {
            return Err(SupraError::DuplicateEventLabel(label));
        }
        let id = EventId::new(self.events.len() as u32 + 1);
        self.events.push(Event::new(id, label, observable, controllable));
        Ok(id)
    }

    /// Add an event, or return the existing one with the same label after
    /// checking that its attributes agree.
    pub fn add_event_if_absent(
        &mut self,
        label: &str,
        observable: Vec<bool>,
        controllable: Vec<bool>,
    ) -> SupraResult<EventId> {
        if let Some(existing) = self.event_by_label(label) {
            if existing.observable != observable || existing.controllable != controllable {
                return Err(SupraError::IncompatibleAutomata(format!(
                    "event {label:?} has conflicting attributes"
                )));
            }
            return Ok(existing.id);
        }
        self.add_event(label, observable, controllable)
    }

    /// Add a state with the next free ID.
    pub fn add_state(&mut self, label: impl Into<String>, marked: bool) -> StateId {
        let id = StateId::new(self.next_state_id);
        self.next_state_id += 1;
        self.states.insert(id, State::new(id, label, marked));
        id
    }

    /// Add a state with an explicit ID; fails if the slot is occupied.
    pub fn add_state_with_id(
        &mut self,
        id: StateId,
        label: impl Into<String>,
        marked: bool,
    ) -> SupraResult<()> {
        if id.is_none() {
            return Err(SupraError::CorruptAutomaton("state id 0 is reserved".into()));
        }
        if self.states.contains_key(&id) {
            return Err(SupraError::CorruptAutomaton(format!(
                "state {id} inserted twice"
            )));
        }
        self.states.insert(id, State::new(id, label, marked));
        self.next_state_id = self.next_state_id.max(id.0 + 1);
        Ok(())
    }

    pub fn set_initial(&mut self, id: StateId) -> SupraResult<()> {
        if !self.states.contains_key(&id) {
            return Err(SupraError::StateNotFound(id));
        }
        self.initial = Some(id);
        Ok(())
    }

    /// Add a transition; duplicates are ignored.
    pub fn add_transition(
        &mut self,
        source: StateId,
        event: EventId,
        target: StateId,
    ) -> SupraResult<()> {
        if self.event(event).is_none() {
            return Err(SupraError::EventNotFound(event));
        }
        if !self.states.contains_key(&target) {
            return Err(SupraError::StateNotFound(target));
        }
        let state = self
            .states
            .get_mut(&source)
            .ok_or(SupraError::StateNotFound(source))?;
        if !state.has_transition(event, target) {
            state.transitions.push(Transition::new(event, target));
        }
        Ok(())
    }

    /// Remove a transition along with every classification that refers to it.
    pub fn remove_transition(&mut self, transition: &TransitionRef) -> bool {
        let Some(state) = self.states.get_mut(&transition.source) else {
            return false;
        };
        let before = state.transitions.len();
        state
            .transitions
            .retain(|t| !(t.event == transition.event && t.target == transition.target));
        let removed = state.transitions.len() < before;
        if removed {
            self.bad_transitions.retain(|t| t != transition);
            if let Some(data) = self.kind.data_mut() {
                data.retain_existing(|t| t != transition);
            }
        }
        removed
    }

    /// Classify an existing transition as bad.
    pub fn mark_transition_bad(
        &mut self,
        source: StateId,
        event: EventId,
        target: StateId,
    ) -> SupraResult<()> {
        let transition = TransitionRef::new(source, event, target);
        if !self.transition_exists(&transition) {
            return Err(SupraError::CorruptAutomaton(format!(
                "cannot mark missing transition {transition:?} as bad"
            )));
        }
        if !self.bad_transitions.contains(&transition) {
            self.bad_transitions.push(transition);
        }
        Ok(())
    }

    pub(crate) fn push_bad_transition(&mut self, transition: TransitionRef) {
        if !self.bad_transitions.contains(&transition) {
            self.bad_transitions.push(transition);
        }
    }

    // --- U-Structure classification hooks ---

    fn data_for_insert(&mut self) -> SupraResult<&mut UStructureData> {
        self.kind
            .data_mut()
            .ok_or_else(|| SupraError::CorruptAutomaton("automaton carries no U-Structure data".into()))
    }

    pub fn add_unconditional_violation(&mut self, transition: TransitionRef) -> SupraResult<()> {
        let data = self.data_for_insert()?;
        if !data.unconditional_violations.contains(&transition) {
            data.unconditional_violations.push(transition);
        }
        Ok(())
    }

    pub fn add_conditional_violation(&mut self, transition: TransitionRef) -> SupraResult<()> {
        let data = self.data_for_insert()?;
        if !data.conditional_violations.contains(&transition) {
            data.conditional_violations.push(transition);
        }
        Ok(())
    }

    pub fn add_disablement_decision(
        &mut self,
        transition: TransitionRef,
        controllers: Vec<bool>,
    ) -> SupraResult<()> {
        let data = self.data_for_insert()?;
        if !data
            .disablement_decisions
            .iter()
            .any(|d| d.transition == transition)
        {
            data.disablement_decisions
                .push(crate::DisablementData { transition, controllers });
        }
        Ok(())
    }

    pub fn add_potential_communication(
        &mut self,
        communication: crate::CommunicationData,
    ) -> SupraResult<()> {
        let data = self.data_for_insert()?;
        if !data.potential_communications.contains(&communication) {
            data.potential_communications.push(communication);
        }
        Ok(())
    }

    pub fn add_invalid_communication(&mut self, transition: TransitionRef) -> SupraResult<()> {
        let data = self.data_for_insert()?;
        if !data.invalid_communications.contains(&transition) {
            data.invalid_communications.push(transition);
        }
        Ok(())
    }

    pub fn add_suppressed_transition(&mut self, transition: TransitionRef) -> SupraResult<()> {
        let data = self.data_for_insert()?;
        if !data.suppressed_transitions.contains(&transition) {
            data.suppressed_transitions.push(transition);
        }
        Ok(())
    }

    // --- structural maintenance ---

    /// Keep only the given states; transitions into removed states and the
    /// classifications referring to them are dropped with them.
    pub(crate) fn retain_states(&mut self, keep: &HashSet<StateId>) {
        self.states.retain(|id, _| keep.contains(id));
        for state in self.states.values_mut() {
            state.transitions.retain(|t| keep.contains(&t.target));
        }
        if let Some(init) = self.initial {
            if !keep.contains(&init) {
                self.initial = None;
            }
        }
        let states = &self.states;
        let exists = |t: &TransitionRef| {
            states
                .get(&t.source)
                .is_some_and(|s| s.has_transition(t.event, t.target))
        };
        self.bad_transitions.retain(|t| exists(t));
        if let Some(data) = self.kind.data_mut() {
            data.retain_existing(exists);
        }
    }

    /// Reassign state IDs densely as `1..=nStates` in ascending old-ID order,
    /// remapping every structure that refers to them.
    pub fn renumber_states(&mut self) {
        let _ = self.renumber_states_map();
    }

    /// [`renumber_states`](Self::renumber_states), returning the old-to-new
    /// map for callers that maintain side tables keyed by state ID.
    pub fn renumber_states_map(&mut self) -> HashMap<StateId, StateId> {
        let state_map: HashMap<StateId, StateId> = self
            .states
            .keys()
            .enumerate()
            .map(|(i, &old)| (old, StateId::new(i as u64 + 1)))
            .collect();
        // Event IDs are already dense; the identity map keeps the remap
        // signature uniform.
        let event_map: HashMap<EventId, EventId> =
            self.events.iter().map(|e| (e.id, e.id)).collect();

        let mut renumbered = BTreeMap::new();
        for (old, mut state) in std::mem::take(&mut self.states) {
            let new = state_map[&old];
            state.id = new;
            for transition in &mut state.transitions {
                transition.target = state_map[&transition.target];
            }
            renumbered.insert(new, state);
        }
        self.states = renumbered;
        self.initial = self.initial.map(|id| state_map[&id]);
        self.next_state_id = self.states.len() as u64 + 1;

        self.bad_transitions
            .retain_mut(|t| match (state_map.get(&t.source), state_map.get(&t.target)) {
                (Some(&s), Some(&tg)) => {
                    *t = TransitionRef::new(s, t.event, tg);
                    true
                }
                _ => false,
            });
        if let Some(data) = self.kind.data_mut() {
            data.remap(&state_map, &event_map);
        }
        state_map
    }

    /// Replace the kind tag, keeping the collections only when the new kind
    /// can carry them.
    pub fn set_kind(&mut self, kind: AutomatonKind) {
        self.kind = kind;
    }
}
