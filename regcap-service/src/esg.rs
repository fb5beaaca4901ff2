//! ESG KPI alignment for sustainability-linked agreements

use regcap_core::EsgKpiTarget;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EsgError {
    #[error("KPI '{kpi}' has invalid target {target}")]
    InvalidTarget { kpi: String, target: f64 },

    #[error("KPI '{0}' has non-finite current value")]
    NonFiniteCurrent(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiAlignment {
    pub kpi_type: String,
    pub target_value: f64,
    pub current_value: Option<f64>,
    /// current / target, `None` while no current value is reported
    pub progress_ratio: Option<f64>,
    pub met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgAlignment {
    pub kpis: Vec<KpiAlignment>,
    pub met_count: usize,
    pub reported_count: usize,
    /// Share of KPIs with a reported value that meet their target
    pub alignment_ratio: Option<f64>,
}

/// Progress of each KPI against its target.
///
/// Fails on a target that is zero, negative or non-finite, or on a
/// non-finite reported value.
pub fn assess(targets: &[EsgKpiTarget]) -> Result<EsgAlignment, EsgError> {
    let mut kpis = Vec::with_capacity(targets.len());

    for target in targets {
        if !target.target_value.is_finite() || target.target_value <= 0.0 {
            return Err(EsgError::InvalidTarget {
                kpi: target.kpi_type.clone(),
                target: target.target_value,
            });
        }
        if let Some(current) = target.current_value {
            if !current.is_finite() {
                return Err(EsgError::NonFiniteCurrent(target.kpi_type.clone()));
            }
        }

        let progress_ratio = target.current_value.map(|c| c / target.target_value);
        kpis.push(KpiAlignment {
            kpi_type: target.kpi_type.clone(),
            target_value: target.target_value,
            current_value: target.current_value,
            progress_ratio,
            met: progress_ratio.is_some_and(|r| r >= 1.0),
        });
    }

    let reported_count = kpis.iter().filter(|k| k.current_value.is_some()).count();
    let met_count = kpis.iter().filter(|k| k.met).count();
    let alignment_ratio = (reported_count > 0).then(|| met_count as f64 / reported_count as f64);

    Ok(EsgAlignment {
        kpis,
        met_count,
        reported_count,
        alignment_ratio,
    })
}
