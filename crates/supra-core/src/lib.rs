//! SUPRA Core - Fundamental types for supervisory control analysis
//!
//! This crate defines the core types used throughout SUPRA:
//! - Identifiers (EventId, StateId) and combined-ID arithmetic
//! - Event descriptors with per-controller observability/controllability
//! - Vectorized event labels (`<a,b,*>` syntax)
//! - Communication roles for synthesized protocols
//! - The shared error taxonomy

pub mod combine;
pub mod error;
pub mod event;
pub mod id;
pub mod label;
pub mod role;

pub use combine::*;
pub use error::*;
pub use event::*;
pub use id::*;
pub use label::*;
pub use role::*;
