//! Service configuration
//!
//! Loaded from YAML; every field has a default, so an empty file (or no
//! file) is a valid configuration. Environment variables override the
//! file:
//!
//! - `REGCAP_CONFIG` - path of the YAML file
//! - `REGCAP_ENGINE` - `engine.kind`
//! - `REGCAP_RULES` - `engine.rules_path`
//! - `REGCAP_AUDIT_PATH` - `audit.path`, switching the backend to `jsonl`

use regcap_engine::EngineConfig;
use regcap_risk::RiskConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ServiceError, ServiceResult};

pub const CONFIG_ENV: &str = "REGCAP_CONFIG";
pub const ENGINE_ENV: &str = "REGCAP_ENGINE";
pub const RULES_ENV: &str = "REGCAP_RULES";
pub const AUDIT_PATH_ENV: &str = "REGCAP_AUDIT_PATH";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditBackend {
    #[default]
    Memory,
    Jsonl,
}

fn default_window_days() -> u32 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub backend: AuditBackend,
    /// JSON-lines ledger file, required for the `jsonl` backend
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_window_days")]
    pub statistics_window_days: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            backend: AuditBackend::default(),
            path: None,
            statistics_window_days: default_window_days(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl ServiceConfig {
    pub fn from_yaml(source: &str) -> ServiceResult<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(source)
            .map_err(|e| ServiceError::Config(format!("invalid configuration: {}", e)))
    }

    pub fn from_file(path: &Path) -> ServiceResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&source)
    }

    /// Resolve configuration from an explicit path, `REGCAP_CONFIG`, or
    /// defaults, then apply environment overrides
    pub fn load(path: Option<&Path>) -> ServiceResult<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup(ENGINE_ENV).filter(|v| !v.trim().is_empty()) {
            self.engine.kind = kind;
        }
        if let Some(rules) = lookup(RULES_ENV).filter(|v| !v.trim().is_empty()) {
            self.engine.rules_path = Some(PathBuf::from(rules));
        }
        if let Some(path) = lookup(AUDIT_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            self.audit.backend = AuditBackend::Jsonl;
            self.audit.path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> ServiceResult<()> {
        self.risk
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        if self.audit.backend == AuditBackend::Jsonl && self.audit.path.is_none() {
            return Err(ServiceError::Config(
                "audit.path is required for the jsonl backend".to_string(),
            ));
        }
        if self.audit.statistics_window_days == 0 {
            return Err(ServiceError::Config(
                "audit.statistics_window_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = ServiceConfig::from_yaml("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.engine.kind, "rule_set");
        assert_eq!(config.audit.statistics_window_days, 30);
    }

    #[test]
    fn test_partial_yaml() {
        let config = ServiceConfig::from_yaml(
            r#"
risk:
  capital_ratio: "0.105"
audit:
  backend: jsonl
  path: /var/lib/regcap/audit.jsonl
"#,
        )
        .unwrap();

        assert_eq!(config.risk.capital_ratio, dec!(0.105));
        assert_eq!(config.risk.default_lgd, 0.45);
        assert_eq!(config.audit.backend, AuditBackend::Jsonl);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENGINE_ENV, "vendor"),
            (RULES_ENV, "rules/compliance.yaml"),
            (AUDIT_PATH_ENV, "/tmp/audit.jsonl"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.engine.kind, "vendor");
        assert_eq!(config.engine.rules_path, Some(PathBuf::from("rules/compliance.yaml")));
        assert_eq!(config.audit.backend, AuditBackend::Jsonl);
    }

    #[test]
    fn test_jsonl_without_path_rejected() {
        let config = ServiceConfig::from_yaml("audit: { backend: jsonl }").unwrap();
        assert!(matches!(config.validate(), Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(ServiceConfig::from_yaml("audit: { backend: couchbase }").is_err());
    }
}
