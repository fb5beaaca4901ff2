//! Credit risk and regulatory capital
//!
//! ## Key Components
//!
//! - [`numeric`] - normal CDF / inverse CDF approximations with documented error bounds
//! - [`weights`] - standardized-approach risk-weight table and PD rating buckets
//! - [`service::CreditRiskService`] - RWA, capital, leverage, creditworthiness,
//!   collateral and concentration
//! - [`mapper::CreditRiskMapper`] - credit agreement + context into [`RiskFields`]

pub mod collateral;
pub mod concentration;
pub mod creditworthiness;
pub mod error;
pub mod fields;
pub mod mapper;
pub mod numeric;
pub mod service;
pub mod weights;

pub use collateral::{Collateral, CollateralAssessment};
pub use concentration::{FacilityExposure, PortfolioConcentration};
pub use creditworthiness::{BorrowerFinancials, CreditworthinessAssessment, RiskLevel, ScoreBreakdown};
pub use error::RiskError;
pub use fields::{AssetClass, RiskFields, RiskModelApproach};
pub use mapper::{CreditRiskMapper, RiskContext};
pub use service::{CreditRiskService, RiskConfig};
pub use weights::RatingBucket;
