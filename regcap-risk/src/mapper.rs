//! Credit agreement to [`RiskFields`] mapping

use chrono::{NaiveDate, Utc};
use regcap_core::CreditAgreement;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::creditworthiness::BorrowerFinancials;
use crate::fields::{AssetClass, RiskFields, RiskModelApproach};

/// Maturity assumed when no facility carries a maturity date
const DEFAULT_MATURITY_YEARS: f64 = 2.5;
const DAYS_PER_YEAR: f64 = 365.25;

/// Free-form risk context supplied alongside an agreement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskContext {
    #[serde(default, alias = "pd")]
    pub probability_of_default: Option<f64>,
    #[serde(default, alias = "lgd")]
    pub loss_given_default: Option<f64>,
    #[serde(default)]
    pub risk_model_approach: Option<RiskModelApproach>,
    #[serde(default)]
    pub asset_class: Option<String>,
    #[serde(default)]
    pub collateral_value: Option<Decimal>,
    #[serde(default)]
    pub borrower_financials: Option<BorrowerFinancials>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Builds canonical risk fields from an agreement.
///
/// Never fails: missing optional data falls back to defaults, and an
/// agreement without facilities yields `facility_amount: None`.
#[derive(Debug, Clone)]
pub struct CreditRiskMapper {
    default_pd: f64,
    default_lgd: f64,
}

impl Default for CreditRiskMapper {
    fn default() -> Self {
        Self {
            default_pd: 0.01,
            default_lgd: 0.45,
        }
    }
}

impl CreditRiskMapper {
    pub fn new(default_pd: f64, default_lgd: f64) -> Self {
        Self {
            default_pd,
            default_lgd,
        }
    }

    pub fn map(&self, agreement: &CreditAgreement, context: &RiskContext) -> RiskFields {
        self.map_as_of(agreement, context, Utc::now().date_naive())
    }

    pub fn map_as_of(
        &self,
        agreement: &CreditAgreement,
        context: &RiskContext,
        today: NaiveDate,
    ) -> RiskFields {
        let exposure = agreement.total_commitment();
        let facility_amount = if agreement.facilities.is_empty() {
            None
        } else {
            Some(exposure)
        };

        let maturity_years = agreement
            .nearest_maturity()
            .map(|date| ((date - today).num_days() as f64 / DAYS_PER_YEAR).max(0.0))
            .unwrap_or(DEFAULT_MATURITY_YEARS);

        let collateral_coverage_ratio = match context.collateral_value {
            Some(value) if exposure > Decimal::ZERO => {
                value.checked_div(exposure).and_then(|r| r.to_f64())
            }
            _ => None,
        };

        let borrower = agreement.borrower();

        RiskFields {
            facility_amount,
            exposure_at_default: exposure,
            currency: agreement.primary_currency().unwrap_or("USD").to_string(),
            maturity_years,
            probability_of_default: context.probability_of_default.unwrap_or(self.default_pd),
            loss_given_default: context.loss_given_default.unwrap_or(self.default_lgd),
            risk_model_approach: context.risk_model_approach.unwrap_or_default(),
            asset_class: context
                .asset_class
                .as_deref()
                .map(AssetClass::parse_lenient)
                .unwrap_or_default(),
            collateral_coverage_ratio,
            borrower_id: borrower.map(|p| p.id.clone()),
            borrower_lei: borrower.and_then(|p| p.lei.clone()),
            borrower_name: borrower.map(|p| p.name.clone()),
            risk_weighted_assets: None,
            capital_requirement: None,
            tier1_capital_requirement: None,
            leverage_ratio: None,
        }
    }
}
