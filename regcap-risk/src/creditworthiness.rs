//! Borrower creditworthiness scoring
//!
//! Composite score out of 100:
//!
//! | component          | weight |
//! |--------------------|--------|
//! | credit score       | 40%    |
//! | DSCR               | 25%    |
//! | debt-to-equity     | 20%    |
//! | net worth and cash | 15%    |
//!
//! Missing components score zero. The composite maps to an internal rating
//! from 1 (AAA) to 10 (D), each with a fixed PD.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

const CREDIT_SCORE_WEIGHT: f64 = 0.40;
const DSCR_WEIGHT: f64 = 0.25;
const LEVERAGE_WEIGHT: f64 = 0.20;
const FINANCIAL_STRENGTH_WEIGHT: f64 = 0.15;

/// (label, PD) per internal rating, index 0 is rating 1
const RATING_TABLE: [(&str, f64); 10] = [
    ("AAA", 0.0001),
    ("AA", 0.0005),
    ("A", 0.001),
    ("BBB", 0.005),
    ("BB", 0.01),
    ("B", 0.03),
    ("CCC", 0.10),
    ("CC", 0.20),
    ("C", 0.35),
    ("D", 0.50),
];

/// Borrower financial metrics supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorrowerFinancials {
    #[serde(default)]
    pub credit_score: Option<u16>,
    #[serde(default, alias = "dscr")]
    pub debt_service_coverage_ratio: Option<f64>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
    #[serde(default)]
    pub net_worth: Option<Decimal>,
    #[serde(default)]
    pub cash_flow: Option<Decimal>,
}

impl BorrowerFinancials {
    pub fn is_empty(&self) -> bool {
        self.credit_score.is_none()
            && self.debt_service_coverage_ratio.is_none()
            && self.debt_to_equity.is_none()
            && self.net_worth.is_none()
            && self.cash_flow.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    fn from_rating(rating: u8) -> Self {
        match rating {
            1..=3 => RiskLevel::Low,
            4..=5 => RiskLevel::Moderate,
            6..=7 => RiskLevel::High,
            _ => RiskLevel::VeryHigh,
        }
    }
}

/// Per-component scores, each out of 100 before weighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub credit_score: f64,
    pub debt_service_coverage: f64,
    pub leverage: f64,
    pub financial_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditworthinessAssessment {
    pub score: f64,
    pub rating: u8,
    pub rating_label: String,
    pub probability_of_default: f64,
    pub risk_level: RiskLevel,
    pub components: ScoreBreakdown,
}

fn credit_score_points(score: Option<u16>) -> RiskResult<f64> {
    let Some(score) = score else {
        return Ok(0.0);
    };
    if !(300..=850).contains(&score) {
        return Err(RiskError::InvalidInput(format!(
            "credit score must be within 300..=850, got {}",
            score
        )));
    }
    Ok(match score {
        800.. => 100.0,
        740..=799 => 85.0,
        670..=739 => 70.0,
        580..=669 => 50.0,
        _ => 25.0,
    })
}

fn dscr_points(dscr: Option<f64>) -> RiskResult<f64> {
    let Some(dscr) = dscr else {
        return Ok(0.0);
    };
    if !(dscr.is_finite() && dscr >= 0.0) {
        return Err(RiskError::InvalidInput(format!(
            "debt service coverage ratio must be non-negative, got {}",
            dscr
        )));
    }
    Ok(if dscr >= 2.0 {
        100.0
    } else if dscr >= 1.5 {
        80.0
    } else if dscr >= 1.25 {
        60.0
    } else if dscr >= 1.0 {
        40.0
    } else {
        10.0
    })
}

fn leverage_points(debt_to_equity: Option<f64>) -> RiskResult<f64> {
    let Some(ratio) = debt_to_equity else {
        return Ok(0.0);
    };
    if !(ratio.is_finite() && ratio >= 0.0) {
        return Err(RiskError::InvalidInput(format!(
            "debt-to-equity must be non-negative, got {}",
            ratio
        )));
    }
    Ok(if ratio <= 1.0 {
        100.0
    } else if ratio <= 2.0 {
        80.0
    } else if ratio <= 3.0 {
        60.0
    } else if ratio <= 4.0 {
        40.0
    } else {
        20.0
    })
}

fn financial_strength_points(data: &BorrowerFinancials) -> f64 {
    let positive = |v: Option<Decimal>| v.map_or(false, |v| v > Decimal::ZERO);
    let mut points = 0.0;
    if positive(data.net_worth) {
        points += 50.0;
    }
    if positive(data.cash_flow) {
        points += 50.0;
    }
    points
}

fn rating_for(score: f64) -> u8 {
    // 90+ is rating 1, each 10 points lower drops one notch
    let tens = (score / 10.0).floor().clamp(0.0, 9.0) as u8;
    10 - tens
}

pub(crate) fn assess(data: &BorrowerFinancials) -> RiskResult<CreditworthinessAssessment> {
    let components = ScoreBreakdown {
        credit_score: credit_score_points(data.credit_score)?,
        debt_service_coverage: dscr_points(data.debt_service_coverage_ratio)?,
        leverage: leverage_points(data.debt_to_equity)?,
        financial_strength: financial_strength_points(data),
    };

    let score = components.credit_score * CREDIT_SCORE_WEIGHT
        + components.debt_service_coverage * DSCR_WEIGHT
        + components.leverage * LEVERAGE_WEIGHT
        + components.financial_strength * FINANCIAL_STRENGTH_WEIGHT;
    let score = (score * 100.0).round() / 100.0;

    let rating = rating_for(score);
    let (label, pd) = RATING_TABLE[usize::from(rating - 1)];

    Ok(CreditworthinessAssessment {
        score,
        rating,
        rating_label: label.to_string(),
        probability_of_default: pd,
        risk_level: RiskLevel::from_rating(rating),
        components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_strong_borrower() {
        let data = BorrowerFinancials {
            credit_score: Some(810),
            debt_service_coverage_ratio: Some(2.4),
            debt_to_equity: Some(0.8),
            net_worth: Some(dec!(25000000)),
            cash_flow: Some(dec!(3000000)),
        };
        let result = assess(&data).unwrap();
        assert_eq!(result.score, 100.0);
        assert_eq!(result.rating, 1);
        assert_eq!(result.rating_label, "AAA");
        assert_eq!(result.probability_of_default, 0.0001);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_middling_borrower() {
        let data = BorrowerFinancials {
            credit_score: Some(700),
            debt_service_coverage_ratio: Some(1.3),
            debt_to_equity: Some(2.5),
            net_worth: Some(dec!(1000000)),
            cash_flow: None,
        };
        // 70*0.4 + 60*0.25 + 60*0.2 + 50*0.15 = 62.5
        let result = assess(&data).unwrap();
        assert_eq!(result.score, 62.5);
        assert_eq!(result.rating, 4);
        assert_eq!(result.rating_label, "BBB");
        assert_eq!(result.risk_level, RiskLevel::Moderate);
    }

    #[test]
    fn test_missing_data_scores_worst() {
        let result = assess(&BorrowerFinancials::default()).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.rating, 10);
        assert_eq!(result.rating_label, "D");
        assert_eq!(result.risk_level, RiskLevel::VeryHigh);
    }

    #[test]
    fn test_rejects_out_of_range_inputs() {
        let bad_score = BorrowerFinancials {
            credit_score: Some(900),
            ..Default::default()
        };
        assert!(assess(&bad_score).is_err());

        let bad_dscr = BorrowerFinancials {
            debt_service_coverage_ratio: Some(-0.5),
            ..Default::default()
        };
        assert!(assess(&bad_dscr).is_err());
    }

    #[test]
    fn test_rating_boundaries() {
        assert_eq!(rating_for(100.0), 1);
        assert_eq!(rating_for(90.0), 1);
        assert_eq!(rating_for(89.99), 2);
        assert_eq!(rating_for(10.0), 9);
        assert_eq!(rating_for(9.99), 10);
    }
}
