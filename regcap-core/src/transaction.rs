//! Canonical transaction record evaluated by policy engines

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::agreement::{AgreementParty, EsgKpiTarget};
use crate::CoreError;

/// Upper bound on forward-compatible vendor fields carried by a transaction
pub const MAX_EXTENSION_FIELDS: usize = 64;

/// Identity block for the originator or beneficiary of a transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartyIdentity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub lei: Option<String>,
    #[serde(default)]
    pub kyc_status: bool,
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

impl From<&AgreementParty> for PartyIdentity {
    fn from(party: &AgreementParty) -> Self {
        Self {
            id: party.id.clone(),
            name: Some(party.name.clone()),
            role: Some(party.role.clone()),
            lei: party.lei.clone(),
            kyc_status: party.kyc_status,
            jurisdiction: party.jurisdiction.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub name: Option<String>,
}

/// A canonical flat record built fresh for every evaluation.
///
/// Unknown fields are kept in `extensions` and flattened back into the
/// evaluated facts, so rules can address vendor fields by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTransaction {
    pub transaction_id: String,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub originator: Option<PartyIdentity>,
    #[serde(default)]
    pub beneficiary: Option<PartyIdentity>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,

    // Domain extensions
    #[serde(default)]
    pub sustainability_linked: bool,
    #[serde(default)]
    pub esg_kpi_targets: Vec<EsgKpiTarget>,
    #[serde(default)]
    pub governing_law: Option<String>,
    #[serde(default)]
    pub regulatory_framework: Vec<String>,
    #[serde(default)]
    pub risk_status: Option<String>,
    #[serde(default)]
    pub ndvi_score: Option<f64>,
    #[serde(default)]
    pub spt_threshold: Option<f64>,
    #[serde(default)]
    pub location: Option<GeoLocation>,
    #[serde(default)]
    pub air_quality_index: Option<f64>,
    #[serde(default)]
    pub sustainability_score: Option<f64>,

    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl PolicyTransaction {
    pub fn new(transaction_id: impl Into<String>, transaction_type: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            transaction_type: Some(transaction_type.into()),
            timestamp: Utc::now(),
            originator: None,
            beneficiary: None,
            amount: None,
            currency: None,
            sustainability_linked: false,
            esg_kpi_targets: Vec::new(),
            governing_law: None,
            regulatory_framework: Vec::new(),
            risk_status: None,
            ndvi_score: None,
            spt_threshold: None,
            location: None,
            air_quality_index: None,
            sustainability_score: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Parse an untyped mapping into a transaction.
    ///
    /// Fails before any typed conversion when the value is not a mapping
    /// or lacks `transaction_id`.
    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        let map = value
            .as_object()
            .ok_or_else(|| CoreError::Validation("transaction must be a mapping".to_string()))?;

        match map.get("transaction_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => {}
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(CoreError::Validation(
                    "transaction_id is required".to_string(),
                ))
            }
            Some(_) => {
                return Err(CoreError::Validation(
                    "transaction_id must be a string".to_string(),
                ))
            }
        }

        let tx: PolicyTransaction = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Validation(format!("malformed transaction: {}", e)))?;
        tx.validate()?;
        Ok(tx)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.transaction_id.trim().is_empty() {
            return Err(CoreError::Validation("transaction_id is required".to_string()));
        }

        if let Some(currency) = &self.currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(CoreError::Validation(format!(
                    "currency must be a 3-letter code, got '{}'",
                    currency
                )));
            }
        }

        if let Some(amount) = self.amount {
            if !amount.is_finite() {
                return Err(CoreError::Validation("amount must be finite".to_string()));
            }
        }

        if self.extensions.len() > MAX_EXTENSION_FIELDS {
            return Err(CoreError::Validation(format!(
                "too many extension fields: {} (max {})",
                self.extensions.len(),
                MAX_EXTENSION_FIELDS
            )));
        }

        Ok(())
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Flat JSON view used for rule evaluation
    pub fn to_facts(&self) -> Result<Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn transaction_type_or_default(&self) -> &str {
        self.transaction_type.as_deref().unwrap_or("unspecified")
    }
}
