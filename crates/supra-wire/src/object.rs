//! Object-tree encoding
//!
//! A portable JSON representation of an automaton: layout counts, events
//! with their attribute arrays, states with explicit IDs and transitions,
//! and the special-transition collections of the U-Structure kinds. The
//! round trip preserves state IDs, ordering, and attributes exactly.

use serde::{Deserialize, Serialize};
use supra_automata::{
    Automaton, AutomatonKind, CommunicationData, DisablementData, NashCommunicationData,
    TransitionRef, UStructureData,
};
use supra_core::{CommunicationRole, EventId, StateId, SupraError, SupraResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventObject {
    pub label: String,
    pub observable: Vec<bool>,
    pub controllable: Vec<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionObject {
    pub event_id: u32,
    pub target_id: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateObject {
    pub id: u64,
    pub label: String,
    pub marked: bool,
    #[serde(default)]
    pub enablement: bool,
    #[serde(default)]
    pub disablement: bool,
    pub transitions: Vec<TransitionObject>,
}

/// A special-transition reference: `(source, event, target)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDataObject {
    pub source: u64,
    pub event_id: u32,
    pub target: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationObject {
    pub source: u64,
    pub event_id: u32,
    pub target: u64,
    /// One `S`/`R`/`N` character per controller
    pub roles: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NashCommunicationObject {
    pub source: u64,
    pub event_id: u32,
    pub target: u64,
    pub roles: String,
    pub cost: f64,
    pub probability: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisablementObject {
    pub source: u64,
    pub event_id: u32,
    pub target: u64,
    pub controllers: Vec<bool>,
}

/// The full object tree of one automaton
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatonObject {
    #[serde(rename = "type")]
    pub type_tag: u8,
    pub n_states: u64,
    pub initial_state: u64,
    pub n_controllers: u32,
    pub events: Vec<EventObject>,
    pub states: Vec<StateObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bad_transitions: Vec<TransitionDataObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unconditional_violations: Vec<TransitionDataObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_violations: Vec<TransitionDataObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub potential_communications: Vec<CommunicationObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_communications: Vec<TransitionDataObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nash_communications: Vec<NashCommunicationObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disablement_decisions: Vec<DisablementObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressed_transitions: Vec<TransitionDataObject>,
}

fn transition_ref_object(t: &TransitionRef) -> TransitionDataObject {
    TransitionDataObject {
        source: t.source.0,
        event_id: t.event.0,
        target: t.target.0,
    }
}

fn object_transition_ref(o: &TransitionDataObject) -> TransitionRef {
    TransitionRef::new(
        StateId::new(o.source),
        EventId::new(o.event_id),
        StateId::new(o.target),
    )
}

fn roles_to_string(roles: &[CommunicationRole]) -> String {
    roles.iter().map(|r| r.to_char()).collect()
}

fn roles_from_string(text: &str) -> SupraResult<Vec<CommunicationRole>> {
    text.chars()
        .map(|c| {
            CommunicationRole::from_char(c)
                .ok_or_else(|| SupraError::InvalidWireFormat(format!("unknown role {c:?}")))
        })
        .collect()
}

impl AutomatonObject {
    pub fn from_automaton(aut: &Automaton) -> Self {
        let data = aut.ustructure_data().cloned().unwrap_or_default();
        AutomatonObject {
            type_tag: aut.kind().type_byte(),
            n_states: aut.n_states() as u64,
            initial_state: aut.initial().map_or(0, |id| id.0),
            n_controllers: aut.n_controllers() as u32,
            events: aut
                .events()
                .iter()
                .map(|e| EventObject {
                    label: e.label.clone(),
                    observable: e.observable.clone(),
                    controllable: e.controllable.clone(),
                })
                .collect(),
            states: aut
                .states()
                .map(|s| StateObject {
                    id: s.id.0,
                    label: s.label.clone(),
                    marked: s.marked,
                    enablement: s.enablement,
                    disablement: s.disablement,
                    transitions: s
                        .transitions
                        .iter()
                        .map(|t| TransitionObject {
                            event_id: t.event.0,
                            target_id: t.target.0,
                        })
                        .collect(),
                })
                .collect(),
            bad_transitions: aut.bad_transitions().iter().map(transition_ref_object).collect(),
            unconditional_violations: data
                .unconditional_violations
                .iter()
                .map(transition_ref_object)
                .collect(),
            conditional_violations: data
                .conditional_violations
                .iter()
                .map(transition_ref_object)
                .collect(),
            potential_communications: data
                .potential_communications
                .iter()
                .map(|c| CommunicationObject {
                    source: c.transition.source.0,
                    event_id: c.transition.event.0,
                    target: c.transition.target.0,
                    roles: roles_to_string(&c.roles),
                })
                .collect(),
            invalid_communications: data
                .invalid_communications
                .iter()
                .map(transition_ref_object)
                .collect(),
            nash_communications: data
                .nash_communications
                .iter()
                .map(|c| NashCommunicationObject {
                    source: c.transition.source.0,
                    event_id: c.transition.event.0,
                    target: c.transition.target.0,
                    roles: roles_to_string(&c.roles),
                    cost: c.cost,
                    probability: c.probability,
                })
                .collect(),
            disablement_decisions: data
                .disablement_decisions
                .iter()
                .map(|d| DisablementObject {
                    source: d.transition.source.0,
                    event_id: d.transition.event.0,
                    target: d.transition.target.0,
                    controllers: d.controllers.clone(),
                })
                .collect(),
            suppressed_transitions: data
                .suppressed_transitions
                .iter()
                .map(transition_ref_object)
                .collect(),
        }
    }

    pub fn to_automaton(&self) -> SupraResult<Automaton> {
        let mut aut = Automaton::new(self.n_controllers as usize);

        for event in &self.events {
            aut.add_event(
                event.label.clone(),
                event.observable.clone(),
                event.controllable.clone(),
            )?;
        }
        for state in &self.states {
            aut.add_state_with_id(StateId::new(state.id), state.label.clone(), state.marked)?;
        }
        for state in &self.states {
            if state.enablement && state.disablement {
                return Err(SupraError::InvalidWireFormat(format!(
                    "state {} is both an enablement and a disablement configuration",
                    state.id
                )));
            }
            for transition in &state.transitions {
                aut.add_transition(
                    StateId::new(state.id),
                    EventId::new(transition.event_id),
                    StateId::new(transition.target_id),
                )?;
            }
            if state.enablement || state.disablement {
                if let Some(s) = aut.state_mut(StateId::new(state.id)) {
                    s.enablement = state.enablement;
                    s.disablement = state.disablement;
                }
            }
        }
        if self.initial_state != 0 {
            aut.set_initial(StateId::new(self.initial_state))?;
        }
        for bad in &self.bad_transitions {
            let t = object_transition_ref(bad);
            aut.mark_transition_bad(t.source, t.event, t.target)?;
        }

        let data = UStructureData {
            unconditional_violations: self
                .unconditional_violations
                .iter()
                .map(object_transition_ref)
                .collect(),
            conditional_violations: self
                .conditional_violations
                .iter()
                .map(object_transition_ref)
                .collect(),
            potential_communications: self
                .potential_communications
                .iter()
                .map(|c| {
                    Ok(CommunicationData::new(
                        TransitionRef::new(
                            StateId::new(c.source),
                            EventId::new(c.event_id),
                            StateId::new(c.target),
                        ),
                        roles_from_string(&c.roles)?,
                    ))
                })
                .collect::<SupraResult<_>>()?,
            invalid_communications: self
                .invalid_communications
                .iter()
                .map(object_transition_ref)
                .collect(),
            nash_communications: self
                .nash_communications
                .iter()
                .map(|c| {
                    Ok(NashCommunicationData {
                        transition: TransitionRef::new(
                            StateId::new(c.source),
                            EventId::new(c.event_id),
                            StateId::new(c.target),
                        ),
                        roles: roles_from_string(&c.roles)?,
                        cost: c.cost,
                        probability: c.probability,
                    })
                })
                .collect::<SupraResult<_>>()?,
            disablement_decisions: self
                .disablement_decisions
                .iter()
                .map(|d| DisablementData {
                    transition: TransitionRef::new(
                        StateId::new(d.source),
                        EventId::new(d.event_id),
                        StateId::new(d.target),
                    ),
                    controllers: d.controllers.clone(),
                })
                .collect(),
            suppressed_transitions: self
                .suppressed_transitions
                .iter()
                .map(object_transition_ref)
                .collect(),
        };

        match self.type_tag {
            0 => {
                if !data.is_empty() {
                    return Err(SupraError::InvalidWireFormat(
                        "plain automaton carries special-transition collections".into(),
                    ));
                }
            }
            1 => aut.set_kind(AutomatonKind::UStructure(data)),
            2 => aut.set_kind(AutomatonKind::Pruned(data)),
            other => {
                return Err(SupraError::InvalidWireFormat(format!(
                    "unknown automaton type tag {other}"
                )));
            }
        }
        Ok(aut)
    }
}

/// Encode an automaton as a JSON object tree.
pub fn to_json(aut: &Automaton) -> SupraResult<String> {
    serde_json::to_string_pretty(&AutomatonObject::from_automaton(aut))
        .map_err(|e| SupraError::Json(e.to_string()))
}

/// Decode an automaton from its JSON object tree.
pub fn from_json(text: &str) -> SupraResult<Automaton> {
    let object: AutomatonObject =
        serde_json::from_str(text).map_err(|e| SupraError::Json(e.to_string()))?;
    object.to_automaton()
}
