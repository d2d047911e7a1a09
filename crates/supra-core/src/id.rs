//! Identity types for automata
//!
//! State identifiers are 64-bit and event identifiers 32-bit, matching the
//! widths of the legacy persistence format. IDs are 1-based; 0 is the
//! "absent" sentinel used by zero-filled body records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Event identity - dense `1..=nEvents` within one automaton
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub u32);

impl EventId {
    /// The "no event" sentinel (never a valid event)
    pub const NONE: EventId = EventId(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        EventId(id)
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        EventId(u32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State identity - dense `1..=nStates` after renumbering
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StateId(pub u64);

impl StateId {
    /// The "no state" sentinel (never a valid state)
    pub const NONE: StateId = StateId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        StateId(id)
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        StateId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State({})", self.0)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
