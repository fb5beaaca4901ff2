//! Policy engines for compliance decisions
//!
//! Provides the [`PolicyEngine`] capability trait, the reference
//! [`RuleSetEngine`] (atomic rule set snapshots, lock-free counters) and an
//! [`EngineRegistry`] that selects an implementation by configuration key.

pub mod condition;
pub mod engine;
pub mod error;
pub mod factory;
pub mod rule_set_engine;
pub mod stats;

pub use engine::{PolicyEngine, RulesSource};
pub use error::EngineError;
pub use factory::{EngineConfig, EngineRegistry};
pub use rule_set_engine::RuleSetEngine;
pub use stats::{DecisionCounts, EngineStats};
