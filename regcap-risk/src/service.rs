//! Credit risk service
//!
//! Computes Basel III risk-weighted assets and the capital metrics derived
//! from them. All monetary values are [`Decimal`]; PD, LGD and maturity are
//! `f64` because they feed the normal-distribution approximations.

use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collateral::{self, Collateral, CollateralAssessment};
use crate::concentration::{self, FacilityExposure, PortfolioConcentration};
use crate::creditworthiness::{self, BorrowerFinancials, CreditworthinessAssessment};
use crate::error::{RiskError, RiskResult};
use crate::fields::{AssetClass, RiskFields, RiskModelApproach};
use crate::numeric::{norm_cdf, norm_inv};
use crate::weights::{standardized_risk_weight, RatingBucket};

/// Confidence level of the IRB capital formula
const IRB_CONFIDENCE: f64 = 0.999;
/// Inverse of the 8% minimum, scales K to RWA
const RWA_SCALING: Decimal = dec!(12.5);
const RETAIL_CORRELATION: f64 = 0.04;

fn default_capital_ratio() -> Decimal {
    dec!(0.08)
}

fn default_tier1_ratio() -> Decimal {
    dec!(0.06)
}

fn default_pd_floor() -> f64 {
    0.0003
}

fn default_pd() -> f64 {
    0.01
}

fn default_lgd() -> f64 {
    0.45
}

fn default_adequate_coverage() -> f64 {
    1.20
}

fn default_max_valuation_age_months() -> u32 {
    12
}

/// Regulatory parameters for the credit risk service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_capital_ratio")]
    pub capital_ratio: Decimal,
    #[serde(default = "default_tier1_ratio")]
    pub tier1_ratio: Decimal,
    /// Lower bound applied to PD before the IRB formula
    #[serde(default = "default_pd_floor")]
    pub pd_floor: f64,
    #[serde(default = "default_pd")]
    pub default_pd: f64,
    #[serde(default = "default_lgd")]
    pub default_lgd: f64,
    /// Minimum collateral coverage ratio considered adequate
    #[serde(default = "default_adequate_coverage")]
    pub adequate_coverage: f64,
    #[serde(default = "default_max_valuation_age_months")]
    pub max_valuation_age_months: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            capital_ratio: default_capital_ratio(),
            tier1_ratio: default_tier1_ratio(),
            pd_floor: default_pd_floor(),
            default_pd: default_pd(),
            default_lgd: default_lgd(),
            adequate_coverage: default_adequate_coverage(),
            max_valuation_age_months: default_max_valuation_age_months(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> RiskResult<()> {
        for (name, ratio) in [
            ("capital_ratio", self.capital_ratio),
            ("tier1_ratio", self.tier1_ratio),
        ] {
            if ratio < Decimal::ZERO || ratio > Decimal::ONE {
                return Err(RiskError::InvalidInput(format!(
                    "{} must be within [0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if !(self.pd_floor >= 0.0 && self.pd_floor < 1.0) {
            return Err(RiskError::InvalidInput(format!(
                "pd_floor must be within [0, 1), got {}",
                self.pd_floor
            )));
        }
        if !(self.default_pd > 0.0 && self.default_pd < 1.0) {
            return Err(RiskError::InvalidInput(format!(
                "default_pd must be within (0, 1), got {}",
                self.default_pd
            )));
        }
        if !(0.0..=1.0).contains(&self.default_lgd) {
            return Err(RiskError::InvalidInput(format!(
                "default_lgd must be within [0, 1], got {}",
                self.default_lgd
            )));
        }
        if !(self.adequate_coverage.is_finite() && self.adequate_coverage > 0.0) {
            return Err(RiskError::InvalidInput(
                "adequate_coverage must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn ensure_non_negative(name: &str, value: Decimal) -> RiskResult<()> {
    if value < Decimal::ZERO {
        return Err(RiskError::InvalidInput(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

fn overflow(what: &str) -> RiskError {
    RiskError::Calculation(format!("{} overflowed decimal range", what))
}

/// Basel III credit risk calculator
#[derive(Debug, Clone, Default)]
pub struct CreditRiskService {
    config: RiskConfig,
}

impl CreditRiskService {
    pub fn new(config: RiskConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Asset correlation R for the IRB formula.
    ///
    /// Only the `retail` class takes the fixed 0.04; every other class,
    /// mortgages included, uses the corporate PD-dependent curve.
    fn correlation(pd: f64, asset_class: AssetClass) -> f64 {
        if matches!(asset_class, AssetClass::Retail) {
            return RETAIL_CORRELATION;
        }
        let weight = (1.0 - (-50.0 * pd).exp()) / (1.0 - (-50.0f64).exp());
        0.12 * weight + 0.24 * (1.0 - weight)
    }

    /// IRB capital factor K, maturity adjusted and floored at zero
    fn irb_capital_factor(
        &self,
        pd: f64,
        lgd: f64,
        maturity: f64,
        asset_class: AssetClass,
    ) -> RiskResult<f64> {
        if !(pd > 0.0 && pd < 1.0) {
            return Err(RiskError::Calculation(format!(
                "probability of default must be strictly between 0 and 1, got {}",
                pd
            )));
        }
        if !(0.0..=1.0).contains(&lgd) {
            return Err(RiskError::InvalidInput(format!(
                "loss given default must be within [0, 1], got {}",
                lgd
            )));
        }
        if !(maturity.is_finite() && maturity >= 0.0) {
            return Err(RiskError::InvalidInput(format!(
                "maturity must be a non-negative number of years, got {}",
                maturity
            )));
        }

        let pd = pd.max(self.config.pd_floor);
        let r = Self::correlation(pd, asset_class);

        let b = (0.11852 - 0.05478 * pd.ln()).powi(2);
        let denominator = 1.0 - 1.5 * b;
        if denominator <= 0.0 {
            return Err(RiskError::Calculation(format!(
                "maturity adjustment denominator is non-positive for pd {}",
                pd
            )));
        }
        let adjustment = (1.0 + (maturity - 2.5) * b) / denominator;

        let z = (1.0 - r).powf(-0.5) * norm_inv(pd) + (r / (1.0 - r)).sqrt() * norm_inv(IRB_CONFIDENCE);
        let unexpected_loss = (lgd * norm_cdf(z) - pd * lgd).max(0.0);
        let k = (unexpected_loss * adjustment).max(0.0);

        if !k.is_finite() {
            return Err(RiskError::Calculation(format!(
                "capital factor is not finite for pd {} lgd {} maturity {}",
                pd, lgd, maturity
            )));
        }

        debug!(pd, lgd, maturity, correlation = r, adjustment, k, "IRB capital factor");
        Ok(k)
    }

    /// Risk-weighted assets for one exposure, rounded half-up to cents
    pub fn calculate_rwa(
        &self,
        exposure: Decimal,
        pd: f64,
        lgd: f64,
        maturity: f64,
        asset_class: AssetClass,
        approach: RiskModelApproach,
    ) -> RiskResult<Decimal> {
        ensure_non_negative("exposure", exposure)?;

        let rwa = if approach.is_irb() {
            let k = self.irb_capital_factor(pd, lgd, maturity, asset_class)?;
            // Below decimal precision
            let k = if k < 1e-20 {
                Decimal::ZERO
            } else {
                Decimal::from_f64(k).ok_or_else(|| {
                    RiskError::Calculation(format!("capital factor {} is not representable", k))
                })?
            };
            exposure
                .checked_mul(k)
                .and_then(|v| v.checked_mul(RWA_SCALING))
                .ok_or_else(|| overflow("risk-weighted assets"))?
        } else {
            if !(0.0..=1.0).contains(&pd) {
                return Err(RiskError::InvalidInput(format!(
                    "probability of default must be within [0, 1], got {}",
                    pd
                )));
            }
            let bucket = RatingBucket::from_pd(pd);
            let weight = standardized_risk_weight(asset_class, bucket);
            debug!(
                asset_class = asset_class.as_str(),
                bucket = bucket.as_str(),
                %weight,
                "standardized risk weight"
            );
            exposure
                .checked_mul(weight)
                .ok_or_else(|| overflow("risk-weighted assets"))?
        };

        Ok(round_money(rwa.max(Decimal::ZERO)))
    }

    /// Capital requirement at the configured ratio
    pub fn calculate_capital_requirement(&self, rwa: Decimal) -> RiskResult<Decimal> {
        self.calculate_capital_requirement_at(rwa, self.config.capital_ratio)
    }

    pub fn calculate_capital_requirement_at(
        &self,
        rwa: Decimal,
        ratio: Decimal,
    ) -> RiskResult<Decimal> {
        ensure_non_negative("risk-weighted assets", rwa)?;
        ensure_non_negative("capital ratio", ratio)?;
        let capital = rwa
            .checked_mul(ratio)
            .ok_or_else(|| overflow("capital requirement"))?;
        Ok(round_money(capital))
    }

    pub fn calculate_tier1_capital_requirement(&self, rwa: Decimal) -> RiskResult<Decimal> {
        self.calculate_capital_requirement_at(rwa, self.config.tier1_ratio)
    }

    /// Tier 1 capital over total exposure, four decimal places
    pub fn calculate_leverage_ratio(
        &self,
        tier1_capital: Decimal,
        total_exposure: Decimal,
    ) -> RiskResult<Decimal> {
        ensure_non_negative("tier 1 capital", tier1_capital)?;
        ensure_non_negative("total exposure", total_exposure)?;
        if total_exposure.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let ratio = tier1_capital
            .checked_div(total_exposure)
            .ok_or_else(|| overflow("leverage ratio"))?;
        Ok(ratio.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Fill the computed fields of `fields`
    pub fn assess(&self, mut fields: RiskFields) -> RiskResult<RiskFields> {
        let rwa = self.calculate_rwa(
            fields.exposure_at_default,
            fields.probability_of_default,
            fields.loss_given_default,
            fields.maturity_years,
            fields.asset_class,
            fields.risk_model_approach,
        )?;
        let capital = self.calculate_capital_requirement(rwa)?;
        let tier1 = self.calculate_tier1_capital_requirement(rwa)?;
        let leverage = self.calculate_leverage_ratio(tier1, fields.exposure_at_default)?;

        debug!(
            approach = fields.risk_model_approach.as_str(),
            asset_class = fields.asset_class.as_str(),
            %rwa,
            %capital,
            "credit risk assessed"
        );

        fields.risk_weighted_assets = Some(rwa);
        fields.capital_requirement = Some(capital);
        fields.tier1_capital_requirement = Some(tier1);
        fields.leverage_ratio = Some(leverage);
        Ok(fields)
    }

    pub fn assess_creditworthiness(
        &self,
        data: &BorrowerFinancials,
    ) -> RiskResult<CreditworthinessAssessment> {
        creditworthiness::assess(data)
    }

    pub fn validate_collateral(
        &self,
        collateral: &Collateral,
        facility_amount: Decimal,
    ) -> RiskResult<CollateralAssessment> {
        self.validate_collateral_as_of(collateral, facility_amount, Utc::now().date_naive())
    }

    pub fn validate_collateral_as_of(
        &self,
        collateral: &Collateral,
        facility_amount: Decimal,
        as_of: NaiveDate,
    ) -> RiskResult<CollateralAssessment> {
        collateral::validate(
            collateral,
            facility_amount,
            as_of,
            self.config.adequate_coverage,
            self.config.max_valuation_age_months,
        )
    }

    pub fn calculate_portfolio_concentration(
        &self,
        facilities: &[FacilityExposure],
    ) -> RiskResult<PortfolioConcentration> {
        concentration::calculate(facilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn service() -> CreditRiskService {
        CreditRiskService::default()
    }

    #[test]
    fn test_irb_corporate_reference_scenario() {
        let svc = service();
        let rwa = svc
            .calculate_rwa(
                dec!(1000000),
                0.01,
                0.45,
                1.0,
                AssetClass::Corporate,
                RiskModelApproach::IrbFoundation,
            )
            .unwrap();

        // Exact normal functions give 732,783.82; the approximations land within 0.1%.
        assert!(rwa > dec!(732000) && rwa < dec!(733500), "rwa = {}", rwa);
        assert_eq!(rwa.scale(), 2);

        let capital = svc.calculate_capital_requirement(rwa).unwrap();
        let tier1 = svc.calculate_tier1_capital_requirement(rwa).unwrap();
        assert_eq!(capital, round_money(rwa * dec!(0.08)));
        assert_eq!(tier1, round_money(rwa * dec!(0.06)));
    }

    #[test]
    fn test_irb_is_deterministic() {
        let svc = service();
        let run = || {
            svc.calculate_rwa(
                dec!(1000000),
                0.01,
                0.45,
                1.0,
                AssetClass::Corporate,
                RiskModelApproach::IrbAdvanced,
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_retail_correlation_lowers_rwa() {
        let svc = service();
        let corporate = svc
            .calculate_rwa(dec!(1000000), 0.01, 0.45, 1.0, AssetClass::Corporate, RiskModelApproach::Internal)
            .unwrap();
        let retail = svc
            .calculate_rwa(dec!(1000000), 0.01, 0.45, 1.0, AssetClass::Retail, RiskModelApproach::Internal)
            .unwrap();
        assert!(retail < corporate);
        assert!(retail > dec!(170000) && retail < dec!(176000), "retail = {}", retail);

        let mortgage = svc
            .calculate_rwa(
                dec!(1000000),
                0.01,
                0.45,
                1.0,
                AssetClass::ResidentialMortgage,
                RiskModelApproach::Internal,
            )
            .unwrap();
        assert_eq!(mortgage, corporate);
    }

    #[test]
    fn test_pd_boundary_is_calculation_error() {
        let svc = service();
        for pd in [0.0, 1.0, -0.1, f64::NAN] {
            let result = svc.calculate_rwa(
                dec!(1000),
                pd,
                0.45,
                1.0,
                AssetClass::Corporate,
                RiskModelApproach::IrbFoundation,
            );
            assert!(matches!(result, Err(RiskError::Calculation(_))), "pd = {}", pd);
        }
    }

    #[test]
    fn test_pd_floor_applies() {
        let svc = service();
        let tiny = svc
            .calculate_rwa(dec!(1000000), 1e-9, 0.45, 2.5, AssetClass::Corporate, RiskModelApproach::IrbFoundation)
            .unwrap();
        let floor = svc
            .calculate_rwa(dec!(1000000), 0.0003, 0.45, 2.5, AssetClass::Corporate, RiskModelApproach::IrbFoundation)
            .unwrap();
        assert_eq!(tiny, floor);
    }

    #[test]
    fn test_invalid_lgd_and_exposure() {
        let svc = service();
        assert!(matches!(
            svc.calculate_rwa(dec!(1000), 0.01, 1.5, 1.0, AssetClass::Corporate, RiskModelApproach::IrbFoundation),
            Err(RiskError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.calculate_rwa(dec!(-1), 0.01, 0.45, 1.0, AssetClass::Corporate, RiskModelApproach::Standardized),
            Err(RiskError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_standardized_uses_weight_table() {
        let svc = service();
        let rwa = svc
            .calculate_rwa(dec!(1000000), 0.01, 0.45, 1.0, AssetClass::Corporate, RiskModelApproach::Standardized)
            .unwrap();
        assert_eq!(rwa, dec!(1000000.00));

        let sovereign = svc
            .calculate_rwa(dec!(1000000), 0.00005, 0.45, 1.0, AssetClass::Sovereign, RiskModelApproach::Standardized)
            .unwrap();
        assert_eq!(sovereign, Decimal::ZERO);

        // PD at 0 is a valid AAA input for the table
        assert!(svc
            .calculate_rwa(dec!(10), 0.0, 0.45, 1.0, AssetClass::Bank, RiskModelApproach::Standardized)
            .is_ok());
    }

    #[test]
    fn test_capital_rounds_half_up() {
        let svc = service();
        // 0.0625 * 0.08 = 0.005 -> 0.01
        assert_eq!(svc.calculate_capital_requirement(dec!(0.0625)).unwrap(), dec!(0.01));
        assert_eq!(
            svc.calculate_capital_requirement_at(dec!(1000), dec!(0.105)).unwrap(),
            dec!(105.00)
        );
        assert!(svc.calculate_capital_requirement(dec!(-1)).is_err());
    }

    #[test]
    fn test_leverage_ratio() {
        let svc = service();
        assert_eq!(svc.calculate_leverage_ratio(dec!(43950.49), Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert_eq!(
            svc.calculate_leverage_ratio(dec!(43950.49), dec!(1000000)).unwrap(),
            dec!(0.0440)
        );
    }

    #[test]
    fn test_assess_fills_computed_fields() {
        let svc = service();
        let mut fields = RiskFields::new(dec!(1000000), "USD");
        fields.risk_model_approach = RiskModelApproach::IrbFoundation;

        let assessed = svc.assess(fields).unwrap();
        let rwa = assessed.risk_weighted_assets.unwrap();
        assert_eq!(assessed.capital_requirement, Some(round_money(rwa * dec!(0.08))));
        assert_eq!(assessed.tier1_capital_requirement, Some(round_money(rwa * dec!(0.06))));
        assert!(assessed.leverage_ratio.unwrap() > Decimal::ZERO);
    }

    #[test]
    fn test_config_validation() {
        let config = RiskConfig {
            capital_ratio: dec!(1.5),
            ..Default::default()
        };
        assert!(CreditRiskService::new(config).is_err());

        let parsed: RiskConfig = serde_json::from_str(r#"{"capital_ratio": "0.105"}"#).unwrap();
        assert_eq!(parsed.capital_ratio, dec!(0.105));
        assert_eq!(parsed.tier1_ratio, dec!(0.06));
        assert_eq!(parsed.max_valuation_age_months, 12);
    }

    proptest! {
        #[test]
        fn prop_irb_rwa_non_negative_and_monotonic_in_ead(
            pd in 0.00001f64..0.99999,
            lgd in 0.0f64..=1.0,
            maturity in 0.0f64..30.0,
            ead in 0u64..1_000_000_000,
            extra in 0u64..1_000_000_000,
            retail in any::<bool>(),
        ) {
            let svc = service();
            let class = if retail { AssetClass::Retail } else { AssetClass::Corporate };
            let low = svc.calculate_rwa(Decimal::from(ead), pd, lgd, maturity, class, RiskModelApproach::IrbFoundation).unwrap();
            let high = svc.calculate_rwa(Decimal::from(ead + extra), pd, lgd, maturity, class, RiskModelApproach::IrbFoundation).unwrap();
            prop_assert!(low >= Decimal::ZERO);
            prop_assert!(high >= low);
        }

        #[test]
        fn prop_capital_ratios_hold(cents in 0i64..10_000_000_000_000) {
            let svc = service();
            let rwa = Decimal::new(cents, 2);
            let capital = svc.calculate_capital_requirement(rwa).unwrap();
            let tier1 = svc.calculate_tier1_capital_requirement(rwa).unwrap();
            prop_assert!((capital - rwa * dec!(0.08)).abs() <= dec!(0.01));
            prop_assert!((tier1 - rwa * dec!(0.06)).abs() <= dec!(0.01));
        }
    }
}
