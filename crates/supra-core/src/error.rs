//! Error types for SUPRA
//!
//! Analysis outcomes (violations, infeasible protocols, unobservability) are
//! results, never errors; this enum covers malformed input, incompatible
//! operands, arithmetic overflow, and invariant breakage surfaced during
//! synthesis or persistence.

use thiserror::Error;

use crate::{EventId, StateId};

/// Core SUPRA errors
#[derive(Error, Debug)]
pub enum SupraError {
    // Structural preconditions
    #[error("Automaton has no initial state")]
    NoInitialState,

    #[error("Incompatible automata: {0}")]
    IncompatibleAutomata(String),

    #[error("Operation already applied: {0}")]
    OperationAlreadyApplied(&'static str),

    #[error("Invalid controller index {index} (automaton has {n_controllers} controllers)")]
    InvalidControllerIndex { index: usize, n_controllers: usize },

    // Arithmetic
    #[error("Combined-ID arithmetic exceeded the fixed-width range")]
    IdOverflow,

    // Parsing
    #[error("Malformed label vector: {0:?}")]
    MalformedLabelVector(String),

    // Graph lookups
    #[error("State not found: {0:?}")]
    StateNotFound(StateId),

    #[error("Event not found: {0:?}")]
    EventNotFound(EventId),

    #[error("Duplicate event label: {0:?}")]
    DuplicateEventLabel(String),

    // Synthesis invariant breakage (fatal)
    #[error("Corrupt automaton during synthesis: {0}")]
    CorruptAutomaton(String),

    // Protocol search
    #[error("Greedy protocol search re-selected a communication (infinite loop)")]
    ProtocolSearchLoop,

    #[error("No communication resolves the remaining violations")]
    NoResolvingCommunication,

    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),
}

/// Result type for SUPRA operations
pub type SupraResult<T> = Result<T, SupraError>;
