//! SUPRA Wire - Persistence encodings
//!
//! Two encodings the core round-trips exactly:
//! - an object-tree encoding (JSON via serde), the portable format
//! - the legacy fixed-width binary encoding: a header file carrying the
//!   layout and special transitions, and a body file of fixed-size state
//!   records addressed by state ID

pub mod binary;
pub mod object;

pub use binary::*;
pub use object::*;
