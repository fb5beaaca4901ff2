//! Audit storage for compliance decisions
//!
//! Provides append-only persistence for [`regcap_core::AuditRecord`] and the
//! [`AuditLedger`] service for logging, querying and aggregating decisions.
//! Supports both in-memory (for development) and JSON-lines backends.

pub mod error;
pub mod filter;
pub mod jsonl;
pub mod ledger;
pub mod memory;
pub mod traits;

pub use error::StorageError;
pub use filter::AuditFilter;
pub use jsonl::{JsonlAuditStore, LedgerSink};
pub use ledger::{AuditLedger, AuditPage, DailyCount, PolicyStatistics, RuleCount};
pub use memory::InMemoryAuditStore;
pub use traits::AuditStore;
