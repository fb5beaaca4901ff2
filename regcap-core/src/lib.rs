//! Core domain models for the regulatory capital and compliance engine
//!
//! This crate contains the shared data structures used across the
//! workspace: the canonical PolicyTransaction, rule definitions,
//! PolicyDecision, AuditRecord and the credit agreement shape consumed
//! from upstream systems.

pub mod agreement;
pub mod audit;
pub mod decision;
pub mod error;
pub mod rule;
pub mod trace;
pub mod transaction;

pub use agreement::{AgreementParty, CreditAgreement, EsgKpiTarget, Facility, Money};
pub use audit::{AuditRecord, EntityRef};
pub use decision::{Decision, EvaluationOutcome, PolicyDecision, TraceStep};
pub use error::CoreError;
pub use rule::{ConditionLeaf, ConditionOperator, PolicyRule, RuleAction, RuleCondition};
pub use trace::new_trace_id;
pub use transaction::{GeoLocation, PartyIdentity, PolicyTransaction, MAX_EXTENSION_FIELDS};
