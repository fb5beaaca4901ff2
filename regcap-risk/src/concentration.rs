//! Portfolio concentration by sector and borrower

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{RiskError, RiskResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityExposure {
    pub facility_id: String,
    pub borrower_id: String,
    pub sector: String,
    pub exposure: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConcentration {
    pub total_exposure: Decimal,
    pub facility_count: usize,
    pub sector_count: usize,
    pub borrower_count: usize,
    pub sector_exposure: BTreeMap<String, Decimal>,
    pub borrower_exposure: BTreeMap<String, Decimal>,
    /// Share of total exposure, four decimal places
    pub sector_ratios: BTreeMap<String, Decimal>,
    pub borrower_ratios: BTreeMap<String, Decimal>,
    pub largest_sector: Option<String>,
    pub max_sector_ratio: Decimal,
    pub largest_borrower: Option<String>,
    pub max_borrower_ratio: Decimal,
    /// Herfindahl–Hirschman index over sector shares, 0..=1
    pub sector_hhi: Decimal,
}

fn share(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    part.checked_div(total)
        .unwrap_or_default()
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

fn ratios(sums: &BTreeMap<String, Decimal>, total: Decimal) -> BTreeMap<String, Decimal> {
    sums.iter()
        .map(|(k, v)| (k.clone(), share(*v, total)))
        .collect()
}

/// Key with the largest ratio; ties resolve to the lexicographically first key
fn largest(ratios: &BTreeMap<String, Decimal>) -> (Option<String>, Decimal) {
    ratios
        .iter()
        .fold((None, Decimal::ZERO), |(best, max), (k, v)| {
            if best.is_none() || *v > max {
                (Some(k.clone()), *v)
            } else {
                (best, max)
            }
        })
}

pub(crate) fn calculate(facilities: &[FacilityExposure]) -> RiskResult<PortfolioConcentration> {
    let mut sector_exposure: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut borrower_exposure: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut total = Decimal::ZERO;

    for facility in facilities {
        if facility.exposure < Decimal::ZERO {
            return Err(RiskError::InvalidInput(format!(
                "facility {} has negative exposure {}",
                facility.facility_id, facility.exposure
            )));
        }
        total = total
            .checked_add(facility.exposure)
            .ok_or_else(|| RiskError::Calculation("portfolio exposure overflowed".to_string()))?;
        *sector_exposure.entry(facility.sector.clone()).or_default() += facility.exposure;
        *borrower_exposure
            .entry(facility.borrower_id.clone())
            .or_default() += facility.exposure;
    }

    let sector_ratios = ratios(&sector_exposure, total);
    let borrower_ratios = ratios(&borrower_exposure, total);
    let (largest_sector, max_sector_ratio) = largest(&sector_ratios);
    let (largest_borrower, max_borrower_ratio) = largest(&borrower_ratios);

    let sector_hhi = sector_exposure
        .values()
        .map(|v| {
            let s = if total.is_zero() {
                Decimal::ZERO
            } else {
                v.checked_div(total).unwrap_or_default()
            };
            s * s
        })
        .sum::<Decimal>()
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);

    Ok(PortfolioConcentration {
        total_exposure: total,
        facility_count: facilities.len(),
        sector_count: sector_exposure.len(),
        borrower_count: borrower_exposure.len(),
        sector_exposure,
        borrower_exposure,
        sector_ratios,
        borrower_ratios,
        largest_sector,
        max_sector_ratio,
        largest_borrower,
        max_borrower_ratio,
        sector_hhi,
    })
}
