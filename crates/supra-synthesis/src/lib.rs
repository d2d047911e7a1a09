//! SUPRA Synthesis - The U-Structure pipeline
//!
//! This crate implements the synthesis and analysis layers built on the
//! automaton core:
//! - Synchronized composition: one system view plus one projection per
//!   controller, annotated with violation/disablement metadata
//! - Communication synthesis via least upper bounds of event-label vectors
//! - Protocol feasibility, exhaustive enumeration, and greedy construction
//! - Pruning of un-chosen communications
//! - Observability and controllability tests with ambiguity levels

pub mod comm;
pub mod observability;
pub mod protocol;
pub mod prune;
pub mod ustructure;

pub use comm::*;
pub use observability::*;
pub use protocol::*;
pub use prune::*;
pub use ustructure::*;
