//! Engine registry keyed by configuration
//!
//! Vendor engines register a constructor under a key; callers only ever
//! see `Arc<dyn PolicyEngine>`. An unknown key or a rule set that fails to
//! load is reported as `Unavailable` so the caller fails closed.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::rule_set_engine::{RuleSetEngine, ENGINE_NAME};
use crate::{EngineError, PolicyEngine, RulesSource};

fn default_kind() -> String {
    ENGINE_NAME.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_kind")]
    pub kind: String,
    /// YAML rule set loaded when the engine is created
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            rules_path: None,
        }
    }
}

type Constructor = Arc<dyn Fn(&EngineConfig) -> Result<Arc<dyn PolicyEngine>, EngineError> + Send + Sync>;

pub struct EngineRegistry {
    constructors: RwLock<HashMap<String, Constructor>>,
}

impl EngineRegistry {
    /// Empty registry; every `create` fails until something is registered
    pub fn empty() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the reference rule set engine
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register(ENGINE_NAME, |_| Ok(Arc::new(RuleSetEngine::new()) as Arc<dyn PolicyEngine>));
        registry
    }

    pub fn register<F>(&self, kind: &str, constructor: F)
    where
        F: Fn(&EngineConfig) -> Result<Arc<dyn PolicyEngine>, EngineError> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .insert(kind.to_ascii_lowercase(), Arc::new(constructor));
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self.constructors.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Build the configured engine and load its rule set, if any
    pub fn create(&self, config: &EngineConfig) -> Result<Arc<dyn PolicyEngine>, EngineError> {
        let kind = config.kind.trim().to_ascii_lowercase();
        let constructor = self.constructors.read().get(&kind).cloned().ok_or_else(|| {
            error!(kind = %config.kind, "Unknown policy engine");
            EngineError::Unavailable(format!("no policy engine registered as '{}'", config.kind))
        })?;

        let engine = constructor(config)?;

        if let Some(path) = &config.rules_path {
            let source = std::fs::read_to_string(path).map_err(|e| {
                EngineError::Unavailable(format!("cannot read rule set {}: {}", path.display(), e))
            })?;
            engine.load_rules(RulesSource::Yaml(source)).map_err(|e| {
                EngineError::Unavailable(format!("rule set {} rejected: {}", path.display(), e))
            })?;
        }

        info!(kind = %kind, "Created policy engine");
        Ok(engine)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
