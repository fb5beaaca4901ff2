//! Domain events and the CDM event envelope

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regcap_core::{CreditAgreement, Money, PartyIdentity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Event type emitted for every CDM-processed evaluation
pub const POLICY_EVALUATION_EVENT: &str = "PolicyEvaluation";

/// Execution of a secondary loan trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExecution {
    pub trade_id: String,
    #[serde(default)]
    pub trade_date: Option<NaiveDate>,
    pub buyer: PartyIdentity,
    pub seller: PartyIdentity,
    pub notional: Money,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub instrument: Option<String>,
    /// Credit agreement the traded position belongs to
    #[serde(default)]
    pub deal_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuritizedAsset {
    pub asset_id: String,
    pub principal: Decimal,
    #[serde(default)]
    pub deal_id: Option<String>,
}

/// Transfer of loan assets into a securitization pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanAssetSecuritization {
    pub securitization_id: String,
    #[serde(default)]
    pub pool_id: Option<String>,
    pub originator: PartyIdentity,
    #[serde(default)]
    pub issuer: Option<PartyIdentity>,
    pub currency: String,
    #[serde(default)]
    pub assets: Vec<SecuritizedAsset>,
    #[serde(default)]
    pub tranche_count: Option<u32>,
}

impl LoanAssetSecuritization {
    pub fn total_principal(&self) -> Decimal {
        self.assets.iter().map(|a| a.principal).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermAmendment {
    pub term: String,
    #[serde(default)]
    pub previous: Value,
    #[serde(default)]
    pub proposed: Value,
}

/// Amendment to the terms of an existing agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsChange {
    pub change_id: String,
    pub deal_id: String,
    #[serde(default)]
    pub borrower: Option<PartyIdentity>,
    #[serde(default)]
    pub lender: Option<PartyIdentity>,
    #[serde(default)]
    pub amendments: Vec<TermAmendment>,
    #[serde(default)]
    pub current_commitment: Option<Money>,
    #[serde(default)]
    pub new_commitment: Option<Money>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub governing_law: Option<String>,
}

/// A business event the service can turn into a canonical transaction
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    FacilityCreation(CreditAgreement),
    TradeExecution(TradeExecution),
    LoanAssetSecuritization(LoanAssetSecuritization),
    TermsChange(TermsChange),
}

impl DomainEvent {
    pub fn transaction_type(&self) -> &'static str {
        match self {
            DomainEvent::FacilityCreation(_) => "facility_creation",
            DomainEvent::TradeExecution(_) => "trade_execution",
            DomainEvent::LoanAssetSecuritization(_) => "loan_asset_securitization",
            DomainEvent::TermsChange(_) => "terms_change",
        }
    }

    /// Decode the payload of a CDM event of the given type
    pub fn from_cdm(event_type: &str, payload: &Value) -> ServiceResult<Self> {
        let decode_err = |e: serde_json::Error| {
            ServiceError::Validation(format!("invalid {} payload: {}", event_type, e))
        };
        let payload = payload.clone();
        match event_type {
            "FacilityCreation" | "CreditAgreement" => serde_json::from_value(payload)
                .map(DomainEvent::FacilityCreation)
                .map_err(decode_err),
            "TradeExecution" | "Execution" => serde_json::from_value(payload)
                .map(DomainEvent::TradeExecution)
                .map_err(decode_err),
            "LoanAssetSecuritization" | "Securitization" => serde_json::from_value(payload)
                .map(DomainEvent::LoanAssetSecuritization)
                .map_err(decode_err),
            "TermsChange" => serde_json::from_value(payload)
                .map(DomainEvent::TermsChange)
                .map_err(decode_err),
            other => Err(ServiceError::Validation(format!(
                "unsupported eventType '{}'",
                other
            ))),
        }
    }
}

/// A validated CDM event envelope
#[derive(Debug, Clone, PartialEq)]
pub struct CdmEvent {
    pub event_type: String,
    pub event_date: DateTime<Utc>,
    pub global_key: String,
    pub payload: Value,
}

fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl CdmEvent {
    /// Validate the envelope, naming the first offending field.
    ///
    /// Required: `eventType`, an ISO-8601 `eventDate` and `meta.globalKey`.
    pub fn from_value(event: &Value) -> ServiceResult<Self> {
        let map = event
            .as_object()
            .ok_or_else(|| ServiceError::Validation("CDM event must be a mapping".to_string()))?;

        let event_type = match map.get("eventType") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(ServiceError::Validation(
                    "eventType: required non-empty string".to_string(),
                ))
            }
        };

        let event_date = match map.get("eventDate") {
            Some(Value::String(s)) => parse_event_date(s.trim()).ok_or_else(|| {
                ServiceError::Validation(format!("eventDate: '{}' is not an ISO-8601 date", s))
            })?,
            _ => {
                return Err(ServiceError::Validation(
                    "eventDate: required ISO-8601 string".to_string(),
                ))
            }
        };

        let global_key = match map.get("meta").and_then(|m| m.get("globalKey")) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(ServiceError::Validation(
                    "meta.globalKey: required non-empty string".to_string(),
                ))
            }
        };

        Ok(Self {
            event_type,
            event_date,
            global_key,
            payload: map.get("payload").cloned().unwrap_or(Value::Null),
        })
    }

    pub fn domain_event(&self) -> ServiceResult<DomainEvent> {
        DomainEvent::from_cdm(&self.event_type, &self.payload)
    }

    /// Evaluation event linked back to this event through its global key
    pub fn lineage_event(&self, evaluation: Value) -> Value {
        json!({
            "eventType": POLICY_EVALUATION_EVENT,
            "eventDate": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "meta": {
                "globalKey": Uuid::new_v4().to_string(),
            },
            "lineage": {
                "eventReference": [{
                    "globalReference": self.global_key,
                    "eventType": self.event_type,
                }],
            },
            "policyEvaluation": evaluation,
        })
    }
}
