//! Application state built from configuration

use regcap_engine::{EngineRegistry, PolicyEngine};
use regcap_risk::CreditRiskService;
use regcap_storage::{AuditLedger, AuditStore, InMemoryAuditStore, JsonlAuditStore};
use std::sync::Arc;
use tracing::info;

use crate::config::{AuditBackend, AuditConfig, ServiceConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::policy_service::PolicyService;

/// Shared application state
pub struct AppState {
    pub config: ServiceConfig,
    pub engine: Arc<dyn PolicyEngine>,
    pub ledger: Arc<AuditLedger>,
    pub policy_service: PolicyService,
}

impl AppState {
    /// Build state with the default engine registry
    pub async fn from_config(config: ServiceConfig) -> ServiceResult<Self> {
        Self::with_registry(config, &EngineRegistry::with_defaults()).await
    }

    /// Build state, resolving the engine through `registry`.
    ///
    /// A missing or misconfigured engine fails here rather than at the
    /// first evaluation.
    pub async fn with_registry(config: ServiceConfig, registry: &EngineRegistry) -> ServiceResult<Self> {
        config.validate()?;

        let engine = registry.create(&config.engine)?;
        let risk = CreditRiskService::new(config.risk.clone())
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        let store = open_store(&config.audit).await?;
        let ledger = Arc::new(
            AuditLedger::new(store).with_statistics_window(config.audit.statistics_window_days),
        );

        info!(
            engine = engine.name(),
            rules_loaded = engine.get_stats().rules_loaded,
            audit_backend = ?config.audit.backend,
            "Initialized regulatory capital service"
        );

        let policy_service = PolicyService::new(Arc::clone(&engine), risk, Arc::clone(&ledger));
        Ok(Self {
            config,
            engine,
            ledger,
            policy_service,
        })
    }
}

async fn open_store(config: &AuditConfig) -> ServiceResult<Arc<dyn AuditStore>> {
    match config.backend {
        AuditBackend::Memory => {
            info!("Initializing in-memory audit store");
            Ok(Arc::new(InMemoryAuditStore::new()))
        }
        AuditBackend::Jsonl => {
            let path = config.path.as_ref().ok_or_else(|| {
                ServiceError::Config("audit.path is required for the jsonl backend".to_string())
            })?;
            let store = JsonlAuditStore::open(path).await?;
            Ok(Arc::new(store))
        }
    }
}
