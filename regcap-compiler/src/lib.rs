//! Compiler for YAML rule sets
//!
//! This crate parses the YAML rule definition list, validates every rule
//! and produces an immutable, versioned [`RuleSet`] snapshot that engines
//! can swap in atomically.

pub mod compiler;
pub mod error;
pub mod rule_set;

pub use compiler::RuleCompiler;
pub use error::CompilerError;
pub use rule_set::RuleSet;
