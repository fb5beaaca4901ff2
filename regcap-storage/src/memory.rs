//! In-memory audit store for development and testing

use async_trait::async_trait;
use parking_lot::RwLock;
use regcap_core::AuditRecord;
use uuid::Uuid;

use crate::{AuditFilter, AuditStore, StorageError};

/// In-memory append-only audit store
pub struct InMemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<AuditRecord, StorageError> {
        let mut records = self.records.write();
        if records.iter().any(|r| r.id == record.id) {
            return Err(StorageError::Persistence(format!(
                "audit record {} already exists",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AuditRecord>, StorageError> {
        let records = self.records.read();
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn find(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, StorageError> {
        let records = self.records.read();
        Ok(records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use regcap_core::Decision;
    use serde_json::Map;

    fn record(tx: &str, decision: Decision) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            trace_id: format!("trade_{}_2026-10-16T00:00:00Z", tx),
            transaction_id: tx.to_string(),
            transaction_type: "trade_execution".to_string(),
            decision,
            rule_applied: None,
            matched_rules: Vec::new(),
            trace: Vec::new(),
            metadata: Map::new(),
            entity_ref: None,
            cdm_event: None,
            decided_at: Utc::now(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let store = InMemoryAuditStore::new();
        let saved = store.append(record("tx-1", Decision::Allow)).await.unwrap();

        let retrieved = store.get_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(retrieved, saved);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryAuditStore::new();
        let rec = record("tx-1", Decision::Allow);
        store.append(rec.clone()).await.unwrap();

        assert!(matches!(
            store.append(rec).await,
            Err(StorageError::Persistence(_))
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_filter() {
        let store = InMemoryAuditStore::new();
        store.append(record("tx-1", Decision::Allow)).await.unwrap();
        store.append(record("tx-2", Decision::Block)).await.unwrap();
        store.append(record("tx-1", Decision::Flag)).await.unwrap();

        let tx1 = store.find(&AuditFilter::new().transaction_id("tx-1")).await.unwrap();
        assert_eq!(tx1.len(), 2);

        let blocked = store.find(&AuditFilter::new().decision(Decision::Block)).await.unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].transaction_id, "tx-2");
    }
}
