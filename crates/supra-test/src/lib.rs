//! SUPRA Test - Generators and scenario builders
//!
//! Seeded random automaton generation for fuzzing and benchmarks, plus the
//! small hand-built systems the analysis properties are checked against.

pub mod generator;
mod integration;
pub mod scenarios;

pub use generator::*;
pub use scenarios::*;
