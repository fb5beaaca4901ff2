//! Audit ledger service
//!
//! Persists policy decisions as immutable records and answers history,
//! query and statistics requests over them.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regcap_core::{AuditRecord, Decision, EntityRef, PolicyDecision};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{AuditFilter, AuditStore, StorageError};

pub const DEFAULT_STATISTICS_WINDOW_DAYS: u32 = 30;
const TOP_RULES: usize = 10;

/// One page of audit records, most recent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPage {
    pub records: Vec<AuditRecord>,
    /// Matching records before pagination
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCount {
    pub rule: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub total: u64,
    pub allow: u64,
    pub block: u64,
    pub flag: u64,
}

impl DailyCount {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total: 0,
            allow: 0,
            block: 0,
            flag: 0,
        }
    }

    fn add(&mut self, decision: Decision) {
        self.total += 1;
        match decision {
            Decision::Allow => self.allow += 1,
            Decision::Block => self.block += 1,
            Decision::Flag => self.flag += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyStatistics {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total: u64,
    /// Every decision value is present, zero when unseen
    pub by_decision: BTreeMap<String, u64>,
    pub top_rules: Vec<RuleCount>,
    pub by_transaction_type: BTreeMap<String, u64>,
    /// One entry per calendar day (UTC) in the window, zero-filled
    pub daily: Vec<DailyCount>,
}

pub struct AuditLedger {
    store: Arc<dyn AuditStore>,
    statistics_window_days: u32,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            statistics_window_days: DEFAULT_STATISTICS_WINDOW_DAYS,
        }
    }

    pub fn with_statistics_window(mut self, days: u32) -> Self {
        self.statistics_window_days = days.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Persist exactly one record for `decision`.
    ///
    /// Caller metadata is overridden by the decision's own metadata on
    /// key collision.
    pub async fn log_policy_decision(
        &self,
        decision: &PolicyDecision,
        transaction_id: &str,
        transaction_type: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuditRecord, StorageError> {
        self.log_with_references(decision, transaction_id, transaction_type, metadata, None, None)
            .await
    }

    /// As [`Self::log_policy_decision`], linking the originating entity and
    /// any machine-readable event derived from the evaluation
    pub async fn log_with_references(
        &self,
        decision: &PolicyDecision,
        transaction_id: &str,
        transaction_type: &str,
        metadata: Map<String, Value>,
        entity_ref: Option<EntityRef>,
        cdm_event: Option<Value>,
    ) -> Result<AuditRecord, StorageError> {
        if transaction_id.trim().is_empty() {
            return Err(StorageError::Persistence(
                "transaction_id is required to log a decision".to_string(),
            ));
        }

        let record = AuditRecord::from_decision(
            decision,
            transaction_id,
            transaction_type,
            metadata,
            entity_ref,
            cdm_event,
        );

        match self.store.append(record).await {
            Ok(saved) => {
                info!(
                    trace_id = %saved.trace_id,
                    transaction_id = %saved.transaction_id,
                    decision = %saved.decision,
                    "Logged policy decision"
                );
                Ok(saved)
            }
            Err(e) => {
                warn!(
                    trace_id = %decision.trace_id(),
                    error = %e,
                    "Policy decision not recorded"
                );
                Err(e)
            }
        }
    }

    /// Matching records, most recent first, paginated
    pub async fn get_policy_decisions(&self, filter: &AuditFilter) -> Result<AuditPage, StorageError> {
        let mut records = self.store.find(filter).await?;
        let total = records.len();

        // find() yields insertion order; reverse first so equal timestamps
        // keep latest-inserted first under the stable sort
        records.reverse();
        records.sort_by(|a, b| b.decided_at.cmp(&a.decided_at));

        let limit = filter.effective_limit();
        let records = records
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .collect();

        Ok(AuditPage {
            records,
            total,
            limit,
            offset: filter.offset,
        })
    }

    /// Every decision recorded for a transaction, oldest first
    pub async fn get_decision_history(&self, transaction_id: &str) -> Result<Vec<AuditRecord>, StorageError> {
        let mut records = self
            .store
            .find(&AuditFilter::new().transaction_id(transaction_id))
            .await?;
        records.sort_by(|a, b| a.decided_at.cmp(&b.decided_at));
        Ok(records)
    }

    /// Aggregates over `[from, to]`; defaults to the configured window
    /// ending now
    pub async fn get_policy_statistics(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<PolicyStatistics, StorageError> {
        let to = to.unwrap_or_else(Utc::now);
        let from = from.unwrap_or_else(|| to - Duration::days(i64::from(self.statistics_window_days)));
        if from > to {
            return Err(StorageError::InvalidQuery(format!(
                "statistics range start {} is after end {}",
                from, to
            )));
        }

        let records = self
            .store
            .find(&AuditFilter {
                from: Some(from),
                to: Some(to),
                ..Default::default()
            })
            .await?;

        let mut by_decision: BTreeMap<String, u64> = Decision::ALL
            .iter()
            .map(|d| (d.as_str().to_string(), 0))
            .collect();
        let mut by_rule: HashMap<String, u64> = HashMap::new();
        let mut by_transaction_type: BTreeMap<String, u64> = BTreeMap::new();

        let mut daily: Vec<DailyCount> = from
            .date_naive()
            .iter_days()
            .take_while(|d| *d <= to.date_naive())
            .map(DailyCount::empty)
            .collect();
        let first_day = from.date_naive();

        for record in &records {
            *by_decision.entry(record.decision.as_str().to_string()).or_default() += 1;
            if let Some(rule) = &record.rule_applied {
                *by_rule.entry(rule.clone()).or_default() += 1;
            }
            *by_transaction_type
                .entry(record.transaction_type.clone())
                .or_default() += 1;

            let offset = (record.decided_at.date_naive() - first_day).num_days();
            if let Some(day) = usize::try_from(offset).ok().and_then(|i| daily.get_mut(i)) {
                day.add(record.decision);
            }
        }

        let mut top_rules: Vec<RuleCount> = by_rule
            .into_iter()
            .map(|(rule, count)| RuleCount { rule, count })
            .collect();
        top_rules.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.rule.cmp(&b.rule)));
        top_rules.truncate(TOP_RULES);

        Ok(PolicyStatistics {
            from,
            to,
            total: records.len() as u64,
            by_decision,
            top_rules,
            by_transaction_type,
            daily,
        })
    }
}
