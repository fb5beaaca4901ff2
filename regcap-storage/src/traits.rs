//! Storage traits defining the interface for audit persistence

use async_trait::async_trait;
use regcap_core::AuditRecord;
use uuid::Uuid;

use crate::{AuditFilter, StorageError};

/// Append-only store of audit records.
///
/// Records are never updated or deleted. `append` either persists the
/// whole record or fails without leaving any trace of it.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist one record
    async fn append(&self, record: AuditRecord) -> Result<AuditRecord, StorageError>;

    /// Get a record by ID
    async fn get_by_id(&self, id: Uuid) -> Result<Option<AuditRecord>, StorageError>;

    /// All records matching the filter's predicates, in insertion order.
    ///
    /// Pagination fields of the filter are ignored here.
    async fn find(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, StorageError>;

    async fn count(&self) -> Result<usize, StorageError>;
}
