//! SUPRA Automata - State graphs and the automaton algebra
//!
//! This crate implements the automaton core:
//! - State/transition graph with marking and decision flags
//! - Special-transition classifications (bad, violations, communications,
//!   disablement decisions) keyed by `(source, event, target)`
//! - The builder API and dense renumbering
//! - Algebraic operations: accessible, co-accessible, complement, invert,
//!   trim, intersection, union
//! - Per-controller subset construction (determinization)

pub mod automaton;
pub mod ops;
pub mod special;
pub mod state;
pub mod subset;

pub use automaton::*;
pub use special::*;
pub use state::*;
pub use subset::*;
