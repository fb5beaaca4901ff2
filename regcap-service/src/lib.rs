//! Regulatory capital and policy compliance service
//!
//! Orchestrates the credit risk service, the configured policy engine and
//! the audit ledger behind a single [`PolicyService`].

pub mod config;
pub mod convert;
pub mod error;
pub mod esg;
pub mod events;
pub mod policy_service;
pub mod state;

pub use config::{AuditBackend, AuditConfig, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
pub use events::{
    CdmEvent, DomainEvent, LoanAssetSecuritization, SecuritizedAsset, TermAmendment, TermsChange,
    TradeExecution,
};
pub use policy_service::{CdmEvaluation, CreditRiskEvaluation, PolicyService};
pub use state::AppState;
