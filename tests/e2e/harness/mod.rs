//! E2E test harness for appforge.
//!
//! Scenarios script the model's replies up front, then drive whole
//! conversations through a real on-disk workspace.

#![allow(dead_code)]

pub mod assertions;
pub mod clock;
pub mod runner;
pub mod scenario;
pub mod steps;

pub use assertions::Assertion;
pub use backend::{fenced, ScriptedBackend};
pub use scenario::Scenario;
