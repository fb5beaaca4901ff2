//! Collateral eligibility and adequacy

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

/// Collateral types rejected regardless of value
const INELIGIBLE_MARKERS: [&str; 3] = ["intangible", "goodwill", "speculative"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collateral {
    pub collateral_type: String,
    pub value: Decimal,
    #[serde(default)]
    pub valuation_date: Option<NaiveDate>,
    /// Price volatility haircut as a fraction, 0 for cash
    #[serde(default)]
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralAssessment {
    pub collateral_type: String,
    pub coverage_ratio: f64,
    pub volatility_adjusted_coverage: f64,
    pub eligible: bool,
    pub adequate: bool,
    pub valuation_current: bool,
    pub valuation_age_months: Option<u32>,
    pub accepted: bool,
    pub issues: Vec<String>,
}

fn is_ineligible(collateral_type: &str) -> bool {
    let lowered = collateral_type.to_ascii_lowercase();
    INELIGIBLE_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Whole months from `from` to `to`, zero if `from` is in the future
fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if from >= to {
        return 0;
    }
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0) as u32
}

pub(crate) fn validate(
    collateral: &Collateral,
    facility_amount: Decimal,
    as_of: NaiveDate,
    adequate_coverage: f64,
    max_age_months: u32,
) -> RiskResult<CollateralAssessment> {
    if facility_amount <= Decimal::ZERO {
        return Err(RiskError::InvalidInput(format!(
            "facility amount must be positive, got {}",
            facility_amount
        )));
    }
    if collateral.value < Decimal::ZERO {
        return Err(RiskError::InvalidInput(format!(
            "collateral value must be non-negative, got {}",
            collateral.value
        )));
    }
    if !(0.0..=1.0).contains(&collateral.volatility) {
        return Err(RiskError::InvalidInput(format!(
            "volatility must be within [0, 1], got {}",
            collateral.volatility
        )));
    }

    let coverage_ratio = collateral
        .value
        .checked_div(facility_amount)
        .and_then(|ratio| ratio.to_f64())
        .ok_or_else(|| RiskError::Calculation("coverage ratio out of range".to_string()))?;
    let volatility_adjusted_coverage = coverage_ratio * (1.0 - collateral.volatility);

    let mut issues = Vec::new();

    let eligible = !is_ineligible(&collateral.collateral_type);
    if !eligible {
        issues.push(format!(
            "collateral type '{}' is ineligible",
            collateral.collateral_type
        ));
    }

    let adequate = coverage_ratio >= adequate_coverage;
    if !adequate {
        issues.push(format!(
            "coverage {:.2}% is below the required {:.2}%",
            coverage_ratio * 100.0,
            adequate_coverage * 100.0
        ));
    }

    let valuation_age_months = collateral
        .valuation_date
        .map(|date| months_between(date, as_of));
    let valuation_current = match valuation_age_months {
        Some(age) if age <= max_age_months => true,
        Some(age) => {
            issues.push(format!(
                "valuation is {} months old, limit is {}",
                age, max_age_months
            ));
            false
        }
        None => {
            issues.push("valuation date is missing".to_string());
            false
        }
    };

    Ok(CollateralAssessment {
        collateral_type: collateral.collateral_type.clone(),
        coverage_ratio,
        volatility_adjusted_coverage,
        eligible,
        adequate,
        valuation_current,
        valuation_age_months,
        accepted: eligible && adequate && valuation_current,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn real_estate(value: Decimal, valued: NaiveDate) -> Collateral {
        Collateral {
            collateral_type: "commercial real estate".to_string(),
            value,
            valuation_date: Some(valued),
            volatility: 0.2,
        }
    }

    #[test]
    fn test_adequate_current_collateral_accepted() {
        let result = validate(
            &real_estate(dec!(1500000), date(2026, 3, 1)),
            dec!(1000000),
            date(2026, 10, 16),
            1.2,
            12,
        )
        .unwrap();

        assert!(result.accepted);
        assert_eq!(result.coverage_ratio, 1.5);
        assert!((result.volatility_adjusted_coverage - 1.2).abs() < 1e-12);
        assert_eq!(result.valuation_age_months, Some(7));
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_stale_and_thin_collateral_reports_each_issue() {
        let result = validate(
            &real_estate(dec!(1100000), date(2024, 10, 17)),
            dec!(1000000),
            date(2026, 10, 16),
            1.2,
            12,
        )
        .unwrap();

        assert!(!result.accepted);
        assert!(!result.adequate);
        assert!(!result.valuation_current);
        assert_eq!(result.valuation_age_months, Some(23));
        assert_eq!(result.issues.len(), 2);
    }

    #[test]
    fn test_ineligible_types_rejected() {
        for kind in ["Goodwill", "intangible assets", "Speculative crypto tokens"] {
            let collateral = Collateral {
                collateral_type: kind.to_string(),
                value: dec!(5000000),
                valuation_date: Some(date(2026, 9, 1)),
                volatility: 0.0,
            };
            let result =
                validate(&collateral, dec!(1000000), date(2026, 10, 16), 1.2, 12).unwrap();
            assert!(!result.eligible, "{}", kind);
            assert!(!result.accepted);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let collateral = real_estate(dec!(100), date(2026, 1, 1));
        assert!(validate(&collateral, Decimal::ZERO, date(2026, 2, 1), 1.2, 12).is_err());

        let volatile = Collateral {
            volatility: 1.5,
            ..collateral
        };
        assert!(validate(&volatile, dec!(100), date(2026, 2, 1), 1.2, 12).is_err());
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(date(2026, 1, 31), date(2026, 2, 28)), 0);
        assert_eq!(months_between(date(2026, 1, 15), date(2026, 2, 15)), 1);
        assert_eq!(months_between(date(2027, 1, 1), date(2026, 1, 1)), 0);
    }
}
