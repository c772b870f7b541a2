//! Deterministic, pure logic shared by the engine.
//!
//! Core modules are free of I/O. They operate on in-memory tables and return
//! deterministic outputs suitable for tests; the dispatcher composes them.

pub mod action;
pub mod commit;
pub mod hot_vars;
pub mod invariants;
pub mod preferences;
pub mod timers;
pub mod types;
pub mod value;
