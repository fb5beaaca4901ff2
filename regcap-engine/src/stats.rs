//! Engine statistics
//!
//! Counters are owned by one engine instance and only read through
//! [`crate::PolicyEngine::get_stats`].

use regcap_core::Decision;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    #[serde(rename = "ALLOW")]
    pub allow: u64,
    #[serde(rename = "BLOCK")]
    pub block: u64,
    #[serde(rename = "FLAG")]
    pub flag: u64,
}

impl DecisionCounts {
    pub fn get(&self, decision: Decision) -> u64 {
        match decision {
            Decision::Allow => self.allow,
            Decision::Block => self.block,
            Decision::Flag => self.flag,
        }
    }

    pub fn total(&self) -> u64 {
        self.allow + self.block + self.flag
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_processed: u64,
    pub decisions: DecisionCounts,
    pub rules_loaded: usize,
    pub last_evaluation_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set_version: Option<String>,
}

/// Lock-free per-engine counters
#[derive(Debug, Default)]
pub(crate) struct EngineCounters {
    total: AtomicU64,
    allow: AtomicU64,
    block: AtomicU64,
    flag: AtomicU64,
    last_evaluation_nanos: AtomicU64,
}

impl EngineCounters {
    pub(crate) fn record(&self, decision: Decision, elapsed_nanos: u64) {
        let counter = match decision {
            Decision::Allow => &self.allow,
            Decision::Block => &self.block,
            Decision::Flag => &self.flag,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
        self.last_evaluation_nanos
            .store(elapsed_nanos, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, rules_loaded: usize, rule_set_version: Option<String>) -> EngineStats {
        EngineStats {
            total_processed: self.total.load(Ordering::Relaxed),
            decisions: DecisionCounts {
                allow: self.allow.load(Ordering::Relaxed),
                block: self.block.load(Ordering::Relaxed),
                flag: self.flag.load(Ordering::Relaxed),
            },
            rules_loaded,
            last_evaluation_time_ms: self.last_evaluation_nanos.load(Ordering::Relaxed) as f64
                / 1_000_000.0,
            rule_set_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = EngineCounters::default();
        counters.record(Decision::Allow, 1_500_000);
        counters.record(Decision::Block, 250_000);
        counters.record(Decision::Block, 250_000);

        let stats = counters.snapshot(4, None);
        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.decisions.get(Decision::Block), 2);
        assert_eq!(stats.decisions.total(), stats.total_processed);
        assert_eq!(stats.last_evaluation_time_ms, 0.25);
        assert_eq!(stats.rules_loaded, 4);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["decisions"]["ALLOW"], 1);
    }
}
