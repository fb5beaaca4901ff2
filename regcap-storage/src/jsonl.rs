//! Append-only JSON-lines audit store
//!
//! One record per line. Existing records are read once at open and kept
//! in memory for queries. A write that fails part-way is cut back to the
//! previous file length, so the file never holds a partial record.

use async_trait::async_trait;
use parking_lot::RwLock;
use regcap_core::AuditRecord;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{AuditFilter, AuditStore, StorageError};

/// Append target behind a [`JsonlAuditStore`]
#[async_trait]
pub trait LedgerSink: Send {
    async fn current_len(&mut self) -> io::Result<u64>;

    /// Write one full line and make it durable
    async fn write_line(&mut self, line: &[u8]) -> io::Result<()>;

    async fn truncate(&mut self, len: u64) -> io::Result<()>;
}

#[async_trait]
impl LedgerSink for File {
    async fn current_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata().await?.len())
    }

    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.write_all(line).await?;
        self.flush().await?;
        self.sync_data().await
    }

    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await
    }
}

pub struct JsonlAuditStore<W = File> {
    path: PathBuf,
    file: Mutex<W>,
    records: RwLock<Vec<AuditRecord>>,
}

impl JsonlAuditStore<File> {
    /// Open or create the ledger file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let records = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse_lines(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!(path = %path.display(), records = records.len(), "Opened audit ledger");

        Ok(Self::from_parts(path, file, records))
    }
}

impl<W: LedgerSink> JsonlAuditStore<W> {
    fn from_parts(path: PathBuf, sink: W, records: Vec<AuditRecord>) -> Self {
        Self {
            path,
            file: Mutex::new(sink),
            records: RwLock::new(records),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_lines(contents: &str) -> Result<Vec<AuditRecord>, StorageError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                StorageError::Persistence(format!("corrupt audit record on line {}: {}", idx + 1, e))
            })
        })
        .collect()
}

#[async_trait]
impl<W: LedgerSink + 'static> AuditStore for JsonlAuditStore<W> {
    async fn append(&self, record: AuditRecord) -> Result<AuditRecord, StorageError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        if self.records.read().iter().any(|r| r.id == record.id) {
            return Err(StorageError::Persistence(format!(
                "audit record {} already exists",
                record.id
            )));
        }
        let previous_len = file.current_len().await?;

        if let Err(e) = file.write_line(&line).await {
            error!(error = %e, path = %self.path.display(), "Audit write failed, truncating");
            if let Err(truncate_err) = file.truncate(previous_len).await {
                error!(error = %truncate_err, "Failed to truncate audit ledger");
            }
            return Err(StorageError::Persistence(format!(
                "failed to write audit record {}: {}",
                record.id, e
            )));
        }

        self.records.write().push(record.clone());
        debug!(id = %record.id, transaction_id = %record.transaction_id, "Appended audit record");
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AuditRecord>, StorageError> {
        Ok(self.records.read().iter().find(|r| r.id == id).cloned())
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
    use regcap_core::{Decision, EntityRef};
    use serde_json::{json, Map};

    fn record(tx: &str) -> AuditRecord {
        let mut metadata = Map::new();
        metadata.insert("rule_set_version".to_string(), json!("abc"));
        AuditRecord {
            id: Uuid::new_v4(),
            trace_id: format!("facility_creation_{}_2026-10-16T00:00:00Z", tx),
            transaction_id: tx.to_string(),
            transaction_type: "facility_creation".to_string(),
            decision: Decision::Flag,
            rule_applied: Some("flag-large".to_string()),
            matched_rules: vec!["flag-large".to_string()],
            trace: Vec::new(),
            metadata,
            entity_ref: Some(EntityRef::new("credit_agreement", "DEAL-1")),
            cdm_event: None,
            decided_at: Utc::now(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("ledger.jsonl");

        let saved = {
            let store = JsonlAuditStore::open(&path).await.unwrap();
            store.append(record("tx-1")).await.unwrap();
            store.append(record("tx-2")).await.unwrap()
        };

        let reopened = JsonlAuditStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        assert_eq!(reopened.get_by_id(saved.id).await.unwrap(), Some(saved));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(&path, "{\"id\": \"not-a-record\"\n").unwrap();

        assert!(matches!(
            JsonlAuditStore::open(&path).await,
            Err(StorageError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let store = JsonlAuditStore::open(&path).await.unwrap();

        let rec = record("tx-1");
        store.append(rec.clone()).await.unwrap();
        assert!(store.append(rec).await.is_err());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    /// Writes half the line, then fails like a full disk
    struct TornWrite(File);

    #[async_trait]
    impl LedgerSink for TornWrite {
        async fn current_len(&mut self) -> io::Result<u64> {
            self.0.current_len().await
        }

        async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
            self.0.write_all(&line[..line.len() / 2]).await?;
            self.0.flush().await?;
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        async fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.0.truncate(len).await
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let existing = {
            let store = JsonlAuditStore::open(&path).await.unwrap();
            store.append(record("tx-1")).await.unwrap();
            store.find(&AuditFilter::new()).await.unwrap()
        };
        let len_before = std::fs::metadata(&path).unwrap().len();

        let file = OpenOptions::new().append(true).open(&path).await.unwrap();
        let store = JsonlAuditStore::from_parts(path.clone(), TornWrite(file), existing);

        let err = store.append(record("tx-2")).await.unwrap_err();
        assert!(matches!(err, StorageError::Persistence(_)));
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len_before);

        let reopened = JsonlAuditStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
