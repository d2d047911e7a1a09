//! Special-transition classifications
//!
//! Every classification refers to a transition that exists in the owning
//! automaton's state graph, keyed by `(source, event, target)`. Operations
//! that delete transitions or states must delete or remap the corresponding
//! entries; [`UStructureData::retain_existing`] and [`UStructureData::remap`]
//! are the sweeps they run.
//!
//! The upstream class hierarchy (`Automaton -> UStructure -> Pruned`) is
//! replaced by [`AutomatonKind`]: each variant owns its own collections and
//! the shared algebra matches on the variant instead of virtual dispatch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use supra_core::{CommunicationRole, EventId, StateId};

/// Key of a classified transition
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TransitionRef {
    pub source: StateId,
    pub event: EventId,
    pub target: StateId,
}

impl TransitionRef {
    #[inline]
    pub fn new(source: StateId, event: EventId, target: StateId) -> Self {
        TransitionRef {
            source,
            event,
            target,
        }
    }

    fn remap(
        &mut self,
        state_map: &HashMap<StateId, StateId>,
        event_map: &HashMap<EventId, EventId>,
    ) -> bool {
        let source = state_map.get(&self.source);
        let target = state_map.get(&self.target);
        let event = event_map.get(&self.event);
        match (source, event, target) {
            (Some(&s), Some(&e), Some(&t)) => {
                *self = TransitionRef::new(s, e, t);
                true
            }
            _ => false,
        }
    }
}

/// A synthesized communication: one sender, zero or more receivers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunicationData {
    pub transition: TransitionRef,
    /// One role per controller, length `nControllers`
    pub roles: Vec<CommunicationRole>,
}

impl CommunicationData {
    pub fn new(transition: TransitionRef, roles: Vec<CommunicationRole>) -> Self {
        CommunicationData { transition, roles }
    }

    /// 1-based index of the sending controller
    pub fn sender(&self) -> Option<usize> {
        self.roles
            .iter()
            .position(|&r| r == CommunicationRole::Sender)
            .map(|i| i + 1)
    }

    /// 1-based indices of the receiving controllers
    pub fn receivers(&self) -> Vec<usize> {
        self.roles
            .iter()
            .enumerate()
            .filter(|(_, &r)| r == CommunicationRole::Receiver)
            .map(|(i, _)| i + 1)
            .collect()
    }
}

/// A communication annotated with cost/probability. Carried for persistence
/// fidelity only; the coalition analysis built on it is out of scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NashCommunicationData {
    pub transition: TransitionRef,
    pub roles: Vec<CommunicationRole>,
    pub cost: f64,
    pub probability: f64,
}

/// A bad system transition with the bitmap of controllers that see it as bad
/// in their own view
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisablementData {
    pub transition: TransitionRef,
    /// `controllers[i]` is true when controller `i + 1` can disable here
    pub controllers: Vec<bool>,
}

/// Collections attached to a U-Structure (or a pruned one)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UStructureData {
    pub unconditional_violations: Vec<TransitionRef>,
    pub conditional_violations: Vec<TransitionRef>,
    pub potential_communications: Vec<CommunicationData>,
    pub invalid_communications: Vec<TransitionRef>,
    pub nash_communications: Vec<NashCommunicationData>,
    pub disablement_decisions: Vec<DisablementData>,
    pub suppressed_transitions: Vec<TransitionRef>,
}

impl UStructureData {
    /// Drop every entry whose transition no longer exists.
    pub fn retain_existing(&mut self, exists: impl Fn(&TransitionRef) -> bool) {
        self.unconditional_violations.retain(|t| exists(t));
        self.conditional_violations.retain(|t| exists(t));
        self.potential_communications.retain(|c| exists(&c.transition));
        self.invalid_communications.retain(|t| exists(t));
        self.nash_communications.retain(|c| exists(&c.transition));
        self.disablement_decisions.retain(|d| exists(&d.transition));
        self.suppressed_transitions.retain(|t| exists(t));
    }

    /// Remap every entry through renumbering maps, dropping entries whose
    /// endpoints were removed.
    pub fn remap(
        &mut self,
        state_map: &HashMap<StateId, StateId>,
        event_map: &HashMap<EventId, EventId>,
    ) {
        self.unconditional_violations
            .retain_mut(|t| t.remap(state_map, event_map));
        self.conditional_violations
            .retain_mut(|t| t.remap(state_map, event_map));
        self.potential_communications
            .retain_mut(|c| c.transition.remap(state_map, event_map));
        self.invalid_communications
            .retain_mut(|t| t.remap(state_map, event_map));
        self.nash_communications
            .retain_mut(|c| c.transition.remap(state_map, event_map));
        self.disablement_decisions
            .retain_mut(|d| d.transition.remap(state_map, event_map));
        self.suppressed_transitions
            .retain_mut(|t| t.remap(state_map, event_map));
    }

    pub fn is_empty(&self) -> bool {
        self.unconditional_violations.is_empty()
            && self.conditional_violations.is_empty()
            && self.potential_communications.is_empty()
            && self.invalid_communications.is_empty()
            && self.nash_communications.is_empty()
            && self.disablement_decisions.is_empty()
            && self.suppressed_transitions.is_empty()
    }
}

/// Capability tag of an automaton
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AutomatonKind {
    /// A plain automaton (bad transitions only)
    Plain,
    /// A synchronized-composition product with violation/communication
    /// annotations
    UStructure(UStructureData),
    /// A U-Structure with a communication protocol applied
    Pruned(UStructureData),
}

impl AutomatonKind {
    pub fn data(&self) -> Option<&UStructureData> {
        match self {
            AutomatonKind::Plain => None,
            AutomatonKind::UStructure(d) | AutomatonKind::Pruned(d) => Some(d),
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut UStructureData> {
        match self {
            AutomatonKind::Plain => None,
            AutomatonKind::UStructure(d) | AutomatonKind::Pruned(d) => Some(d),
        }
    }

    /// Type tag used by both persistence encodings
    pub fn type_byte(&self) -> u8 {
        match self {
            AutomatonKind::Plain => 0,
            AutomatonKind::UStructure(_) => 1,
            AutomatonKind::Pruned(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tr(s: u64, e: u32, t: u64) -> TransitionRef {
        TransitionRef::new(StateId::new(s), EventId::new(e), StateId::new(t))
    }

    #[test]
    fn test_communication_roles() {
        let comm = CommunicationData::new(
            tr(1, 1, 2),
            vec![
                CommunicationRole::Sender,
                CommunicationRole::None,
                CommunicationRole::Receiver,
            ],
        );
        assert_eq!(comm.sender(), Some(1));
        assert_eq!(comm.receivers(), vec![3]);
    }

    #[test]
    fn test_retain_existing() {
        let mut data = UStructureData::default();
        data.unconditional_violations.push(tr(1, 1, 2));
        data.unconditional_violations.push(tr(2, 1, 3));
        data.disablement_decisions.push(DisablementData {
            transition: tr(2, 1, 3),
            controllers: vec![true],
        });

        data.retain_existing(|t| t.source != StateId::new(2));
        assert_eq!(data.unconditional_violations, vec![tr(1, 1, 2)]);
        assert!(data.disablement_decisions.is_empty());
    }

    #[test]
    fn test_remap_drops_removed() {
        let mut data = UStructureData::default();
        data.conditional_violations.push(tr(1, 1, 2));
        data.conditional_violations.push(tr(3, 1, 4));

        let state_map: HashMap<_, _> = [
            (StateId::new(1), StateId::new(10)),
            (StateId::new(2), StateId::new(20)),
        ]
        .into();
        let event_map: HashMap<_, _> = [(EventId::new(1), EventId::new(1))].into();

        data.remap(&state_map, &event_map);
        assert_eq!(data.conditional_violations, vec![tr(10, 1, 20)]);
    }
}
