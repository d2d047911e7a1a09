//! End-to-end analysis pipeline tests
//!
//! The full flow on one system: synchronized composition, communication
//! synthesis, protocol construction and application, observability, and a
//! persistence round trip of every stage.
