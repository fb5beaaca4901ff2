//! Policy evaluation orchestration
//!
//! Converts domain events into canonical transactions, evaluates them with
//! the configured [`PolicyEngine`], merges credit risk output and records
//! every decision in the audit ledger.
//!
//! The primary path never swallows engine or credit risk errors: an
//! unavailable engine fails the call instead of defaulting to ALLOW.
//! Enrichments (creditworthiness, ESG alignment) degrade to `null` plus a
//! `skipped_enrichments` note.

use regcap_core::{
    new_trace_id, CreditAgreement, EntityRef, PolicyDecision, PolicyTransaction,
};
use regcap_engine::PolicyEngine;
use regcap_risk::{
    CreditRiskMapper, CreditRiskService, CreditworthinessAssessment, RiskContext, RiskFields,
};
use regcap_storage::AuditLedger;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::convert;
use crate::error::{ServiceError, ServiceResult};
use crate::esg;
use crate::events::{CdmEvent, DomainEvent, LoanAssetSecuritization, TermsChange, TradeExecution};

pub const SKIPPED_ENRICHMENTS: &str = "skipped_enrichments";

/// Credit risk output attached to a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRiskEvaluation {
    pub fields: RiskFields,
    /// `None` when no borrower financials were supplied or scoring failed
    pub creditworthiness: Option<CreditworthinessAssessment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_enrichments: Vec<String>,
}

/// Result of a CDM-processed evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct CdmEvaluation {
    pub decision: PolicyDecision,
    /// Evaluation event referencing the originating event's global key
    pub lineage_event: Value,
}

pub struct PolicyService {
    engine: Arc<dyn PolicyEngine>,
    risk: CreditRiskService,
    mapper: CreditRiskMapper,
    ledger: Arc<AuditLedger>,
}

impl PolicyService {
    pub fn new(engine: Arc<dyn PolicyEngine>, risk: CreditRiskService, ledger: Arc<AuditLedger>) -> Self {
        let mapper = CreditRiskMapper::new(risk.config().default_pd, risk.config().default_lgd);
        Self {
            engine,
            risk,
            mapper,
            ledger,
        }
    }

    pub fn engine(&self) -> &Arc<dyn PolicyEngine> {
        &self.engine
    }

    pub fn risk(&self) -> &CreditRiskService {
        &self.risk
    }

    pub fn ledger(&self) -> &Arc<AuditLedger> {
        &self.ledger
    }

    /// Evaluate an already canonical transaction and record the decision
    pub async fn evaluate_transaction(
        &self,
        transaction: PolicyTransaction,
        metadata: Map<String, Value>,
    ) -> ServiceResult<PolicyDecision> {
        let decision = self.decide(&transaction, metadata)?;
        self.record(&decision, &transaction, None, None).await?;
        Ok(decision)
    }

    /// Evaluate an untyped mapping; `transaction_id` is required
    pub async fn evaluate_json(&self, transaction: &Value) -> ServiceResult<PolicyDecision> {
        let transaction = PolicyTransaction::from_value(transaction)?;
        self.evaluate_transaction(transaction, Map::new()).await
    }

    /// Map an agreement to risk fields and compute its capital metrics.
    ///
    /// Borrower financials in `context` add a creditworthiness assessment;
    /// a scoring failure leaves it `None` with a skipped note.
    pub fn evaluate_credit_risk(
        &self,
        agreement: &CreditAgreement,
        context: &RiskContext,
    ) -> ServiceResult<CreditRiskEvaluation> {
        let fields = self.mapper.map(agreement, context);
        fields.require_facility_amount()?;
        let fields = self.risk.assess(fields)?;

        let mut skipped_enrichments = Vec::new();
        let creditworthiness = match context.borrower_financials.as_ref().filter(|f| !f.is_empty()) {
            Some(financials) => match self.risk.assess_creditworthiness(financials) {
                Ok(assessment) => Some(assessment),
                Err(e) => {
                    warn!(error = %e, "Skipping creditworthiness assessment");
                    skipped_enrichments.push(format!("creditworthiness: {}", e));
                    None
                }
            },
            None => None,
        };

        Ok(CreditRiskEvaluation {
            fields,
            creditworthiness,
            skipped_enrichments,
        })
    }

    pub async fn evaluate_facility_creation(
        &self,
        agreement: &CreditAgreement,
        context: &RiskContext,
        metadata: Map<String, Value>,
    ) -> ServiceResult<PolicyDecision> {
        let (transaction, metadata) = self.facility_transaction(agreement, context, metadata)?;
        let decision = self.decide(&transaction, metadata)?;
        let entity = agreement
            .identifier()
            .map(|id| EntityRef::new("credit_agreement", id));
        self.record(&decision, &transaction, entity, None).await?;
        Ok(decision)
    }

    pub async fn evaluate_trade_execution(&self, trade: &TradeExecution) -> ServiceResult<PolicyDecision> {
        let transaction = convert::trade_execution(trade);
        let decision = self.decide(&transaction, Map::new())?;
        let entity = Some(EntityRef::new("trade", &trade.trade_id));
        self.record(&decision, &transaction, entity, None).await?;
        Ok(decision)
    }

    pub async fn evaluate_loan_asset_securitization(
        &self,
        event: &LoanAssetSecuritization,
    ) -> ServiceResult<PolicyDecision> {
        let transaction = convert::loan_asset_securitization(event);
        let decision = self.decide(&transaction, Map::new())?;
        let entity = Some(EntityRef::new("securitization", &event.securitization_id));
        self.record(&decision, &transaction, entity, None).await?;
        Ok(decision)
    }

    pub async fn evaluate_terms_change(&self, change: &TermsChange) -> ServiceResult<PolicyDecision> {
        let transaction = convert::terms_change(change);
        let decision = self.decide(&transaction, Map::new())?;
        let entity = Some(EntityRef::new("credit_agreement", &change.deal_id));
        self.record(&decision, &transaction, entity, None).await?;
        Ok(decision)
    }

    /// Validate a CDM event envelope, evaluate its payload and emit a
    /// lineage-linked evaluation event.
    ///
    /// Envelope errors are reported before any rule is evaluated.
    pub async fn evaluate_with_cdm_process(&self, event: &Value) -> ServiceResult<CdmEvaluation> {
        let envelope = CdmEvent::from_value(event)?;
        let domain_event = envelope.domain_event()?;

        let mut metadata = Map::new();
        metadata.insert("cdm_event_type".to_string(), json!(envelope.event_type));
        metadata.insert("cdm_global_key".to_string(), json!(envelope.global_key));
        metadata.insert("cdm_event_date".to_string(), json!(envelope.event_date));

        let transaction = match &domain_event {
            DomainEvent::FacilityCreation(agreement) => {
                let (tx, merged) =
                    self.facility_transaction(agreement, &RiskContext::default(), metadata)?;
                metadata = merged;
                tx
            }
            other => convert::to_transaction(other),
        };

        let decision = self.decide(&transaction, metadata)?;
        let lineage_event = envelope.lineage_event(json!({
            "traceId": decision.trace_id(),
            "transactionId": decision.transaction_id(),
            "transactionType": decision.transaction_type(),
            "decision": decision.decision(),
            "ruleApplied": decision.rule_applied(),
            "matchedRules": decision.matched_rules(),
        }));

        let entity = Some(EntityRef::new("cdm_event", &envelope.global_key));
        self.record(&decision, &transaction, entity, Some(lineage_event.clone()))
            .await?;

        Ok(CdmEvaluation {
            decision,
            lineage_event,
        })
    }

    /// Canonical transaction plus decision metadata for a new facility
    fn facility_transaction(
        &self,
        agreement: &CreditAgreement,
        context: &RiskContext,
        mut metadata: Map<String, Value>,
    ) -> ServiceResult<(PolicyTransaction, Map<String, Value>)> {
        let mut transaction = convert::facility_creation(agreement);
        let mut skipped = Vec::new();

        if !agreement.facilities.is_empty() {
            let credit_risk = self.evaluate_credit_risk(agreement, context)?;
            transaction = transaction
                .with_extension("risk_weighted_assets", json!(credit_risk.fields.risk_weighted_assets))
                .with_extension("capital_requirement", json!(credit_risk.fields.capital_requirement))
                .with_extension(
                    "probability_of_default",
                    json!(credit_risk.fields.probability_of_default),
                );
            if let Some(cw) = &credit_risk.creditworthiness {
                transaction = transaction.with_extension("credit_rating", json!(cw.rating_label));
            }
            skipped.extend(credit_risk.skipped_enrichments.iter().cloned());
            metadata.insert("credit_risk".to_string(), serde_json::to_value(&credit_risk)?);
        }

        if agreement.sustainability_linked {
            match esg::assess(&agreement.esg_kpi_targets) {
                Ok(alignment) => {
                    transaction = transaction
                        .with_extension("esg_alignment_ratio", json!(alignment.alignment_ratio));
                    metadata.insert("esg_alignment".to_string(), serde_json::to_value(&alignment)?);
                }
                Err(reason) => {
                    warn!(reason = %reason, "Skipping ESG alignment");
                    metadata.insert("esg_alignment".to_string(), Value::Null);
                    skipped.push(format!("esg_alignment: {}", reason));
                }
            }
        }

        if !skipped.is_empty() {
            metadata.insert(SKIPPED_ENRICHMENTS.to_string(), json!(skipped));
        }

        Ok((transaction, metadata))
    }

    fn decide(
        &self,
        transaction: &PolicyTransaction,
        metadata: Map<String, Value>,
    ) -> ServiceResult<PolicyDecision> {
        let outcome = self.engine.evaluate(transaction).map_err(|e| {
            warn!(
                engine = self.engine.name(),
                transaction_id = %transaction.transaction_id,
                error = %e,
                "Policy evaluation failed"
            );
            ServiceError::from(e)
        })?;

        let trace_id = new_trace_id(
            transaction.transaction_type_or_default(),
            &transaction.transaction_id,
        );
        Ok(PolicyDecision::from_outcome(trace_id, transaction, outcome, metadata))
    }

    async fn record(
        &self,
        decision: &PolicyDecision,
        transaction: &PolicyTransaction,
        entity: Option<EntityRef>,
        cdm_event: Option<Value>,
    ) -> ServiceResult<()> {
        self.ledger
            .log_with_references(
                decision,
                &transaction.transaction_id,
                transaction.transaction_type_or_default(),
                Map::new(),
                entity,
                cdm_event,
            )
            .await?;

        info!(
            trace_id = %decision.trace_id(),
            decision = %decision.decision(),
            rule = ?decision.rule_applied(),
            "Policy decision recorded"
        );
        Ok(())
    }
}
