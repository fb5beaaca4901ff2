//! Canonical risk fields consumed by the credit risk service

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RiskError, RiskResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskModelApproach {
    #[default]
    Standardized,
    IrbFoundation,
    IrbAdvanced,
    Internal,
}

impl RiskModelApproach {
    /// Approaches priced with the IRB formula rather than the weight table
    pub fn is_irb(&self) -> bool {
        !matches!(self, RiskModelApproach::Standardized)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskModelApproach::Standardized => "standardized",
            RiskModelApproach::IrbFoundation => "irb_foundation",
            RiskModelApproach::IrbAdvanced => "irb_advanced",
            RiskModelApproach::Internal => "internal",
        }
    }
}

impl FromStr for RiskModelApproach {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standardized" | "standardised" => Ok(RiskModelApproach::Standardized),
            "irb" | "irb_foundation" | "foundation_irb" => Ok(RiskModelApproach::IrbFoundation),
            "irb_advanced" | "advanced_irb" => Ok(RiskModelApproach::IrbAdvanced),
            "internal" => Ok(RiskModelApproach::Internal),
            other => Err(RiskError::InvalidInput(format!(
                "unknown risk model approach '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RiskModelApproach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Sovereign,
    Bank,
    #[default]
    Corporate,
    Retail,
    ResidentialMortgage,
    CommercialRealEstate,
}

impl AssetClass {
    /// Parse an asset class label; unknown labels are priced as corporate
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace(|c: char| c == '-' || c.is_whitespace(), "_").as_str() {
            "sovereign" | "government" => AssetClass::Sovereign,
            "bank" | "institution" | "financial_institution" => AssetClass::Bank,
            "retail" | "consumer" => AssetClass::Retail,
            "residential_mortgage" | "mortgage" => AssetClass::ResidentialMortgage,
            "commercial_real_estate" | "cre" => AssetClass::CommercialRealEstate,
            _ => AssetClass::Corporate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Sovereign => "sovereign",
            AssetClass::Bank => "bank",
            AssetClass::Corporate => "corporate",
            AssetClass::Retail => "retail",
            AssetClass::ResidentialMortgage => "residential_mortgage",
            AssetClass::CommercialRealEstate => "commercial_real_estate",
        }
    }
}

/// Canonical risk record for one exposure.
///
/// Built per call and never persisted directly. The computed fields are
/// `None` until [`crate::CreditRiskService::assess`] fills them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFields {
    pub facility_amount: Option<Decimal>,
    pub exposure_at_default: Decimal,
    pub currency: String,
    pub maturity_years: f64,
    pub probability_of_default: f64,
    pub loss_given_default: f64,
    pub risk_model_approach: RiskModelApproach,
    pub asset_class: AssetClass,
    pub collateral_coverage_ratio: Option<f64>,
    pub borrower_id: Option<String>,
    pub borrower_lei: Option<String>,
    pub borrower_name: Option<String>,

    pub risk_weighted_assets: Option<Decimal>,
    pub capital_requirement: Option<Decimal>,
    pub tier1_capital_requirement: Option<Decimal>,
    pub leverage_ratio: Option<Decimal>,
}

impl RiskFields {
    pub fn new(exposure_at_default: Decimal, currency: impl Into<String>) -> Self {
        Self {
            facility_amount: Some(exposure_at_default),
            exposure_at_default,
            currency: currency.into(),
            maturity_years: 1.0,
            probability_of_default: 0.01,
            loss_given_default: 0.45,
            risk_model_approach: RiskModelApproach::default(),
            asset_class: AssetClass::default(),
            collateral_coverage_ratio: None,
            borrower_id: None,
            borrower_lei: None,
            borrower_name: None,
            risk_weighted_assets: None,
            capital_requirement: None,
            tier1_capital_requirement: None,
            leverage_ratio: None,
        }
    }

    /// Facility amount, for callers that cannot proceed without one
    pub fn require_facility_amount(&self) -> RiskResult<Decimal> {
        self.facility_amount.ok_or_else(|| {
            RiskError::MissingFacility("agreement has no facilities".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approach_parsing() {
        assert_eq!(
            "irb".parse::<RiskModelApproach>().unwrap(),
            RiskModelApproach::IrbFoundation
        );
        assert!("internal".parse::<RiskModelApproach>().unwrap().is_irb());
        assert!(!RiskModelApproach::Standardized.is_irb());
        assert!("basel-iv".parse::<RiskModelApproach>().is_err());
    }

    #[test]
    fn test_asset_class_lenient() {
        assert_eq!(AssetClass::parse_lenient("Residential Mortgage"), AssetClass::ResidentialMortgage);
        assert_eq!(AssetClass::parse_lenient("project-finance"), AssetClass::Corporate);
    }

    #[test]
    fn test_missing_facility() {
        let mut fields = RiskFields::new(Decimal::ZERO, "USD");
        fields.facility_amount = None;
        assert!(matches!(
            fields.require_facility_amount(),
            Err(RiskError::MissingFacility(_))
        ));
    }
}
