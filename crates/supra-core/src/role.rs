//! Communication roles
//!
//! Each controller position of a synthesized communication is tagged with
//! the part it plays: the sender broadcasts an event it observed, receivers
//! learn about it, everyone else is uninvolved.

use serde::{Deserialize, Serialize};

/// Role of one controller in a potential communication
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommunicationRole {
    /// Not involved in the communication
    #[default]
    None = 0,
    /// Broadcasts the observed event
    Sender = 1,
    /// Learns about the event through the communication
    Receiver = 2,
}

impl CommunicationRole {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(CommunicationRole::None),
            1 => Some(CommunicationRole::Sender),
            2 => Some(CommunicationRole::Receiver),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'N' => Some(CommunicationRole::None),
            'S' => Some(CommunicationRole::Sender),
            'R' => Some(CommunicationRole::Receiver),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            CommunicationRole::None => 'N',
            CommunicationRole::Sender => 'S',
            CommunicationRole::Receiver => 'R',
        }
    }
}
