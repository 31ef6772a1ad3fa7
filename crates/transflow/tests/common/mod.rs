//! Shared helpers for transflow integration tests.
//!
//! - `ScriptedJobBackend` and `StaticAnalyzer`: in-memory collaborators
//! - `SessionHarness`: a session wired to those collaborators

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::SessionHarness;
