//! Domain event to canonical transaction conversion
//!
//! Every conversion is deterministic: the same event always yields the
//! same transaction apart from `timestamp`.

use regcap_core::{CreditAgreement, PartyIdentity, PolicyTransaction};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::events::{DomainEvent, LoanAssetSecuritization, TermsChange, TradeExecution};

pub const ESG_COMPLIANCE: &str = "ESG_Compliance";
pub const US_REGULATIONS: &str = "US_Regulations";
pub const MICA: &str = "MiCA";
pub const FATF: &str = "FATF";

const US_GOVERNING_LAWS: [&str; 4] = ["new york", "ny", "delaware", "california"];

fn is_us_governing_law(law: &str) -> bool {
    let law = law.trim().to_ascii_lowercase();
    US_GOVERNING_LAWS.iter().any(|us| {
        if us.len() <= 2 {
            law.split(|c: char| !c.is_ascii_alphanumeric()).any(|word| word == *us)
        } else {
            law.contains(us)
        }
    })
}

/// Regulatory frameworks that apply to a credit agreement.
///
/// FATF always applies.
pub fn regulatory_frameworks(agreement: &CreditAgreement) -> Vec<String> {
    let mut frameworks = Vec::new();
    if agreement.sustainability_linked {
        frameworks.push(ESG_COMPLIANCE.to_string());
    }
    if agreement
        .governing_law
        .as_deref()
        .is_some_and(is_us_governing_law)
    {
        frameworks.push(US_REGULATIONS.to_string());
    }
    if agreement.has_currency("EUR") {
        frameworks.push(MICA.to_string());
    }
    frameworks.push(FATF.to_string());
    frameworks
}

fn to_amount(value: Decimal) -> Option<f64> {
    value.to_f64()
}

pub fn facility_creation(agreement: &CreditAgreement) -> PolicyTransaction {
    let transaction_id = agreement
        .identifier()
        .map(str::to_string)
        .unwrap_or_else(|| format!("facility_{}", Uuid::new_v4()));

    let mut tx = PolicyTransaction::new(transaction_id, "facility_creation");
    tx.originator = agreement.borrower().map(PartyIdentity::from);
    tx.beneficiary = agreement.lender().map(PartyIdentity::from);
    if !agreement.facilities.is_empty() {
        tx.amount = to_amount(agreement.total_commitment());
        tx.currency = agreement.primary_currency().map(str::to_string);
    }
    tx.sustainability_linked = agreement.sustainability_linked;
    tx.esg_kpi_targets = agreement.esg_kpi_targets.clone();
    tx.governing_law = agreement.governing_law.clone();
    tx.regulatory_framework = regulatory_frameworks(agreement);

    tx.with_extension("facility_count", json!(agreement.facilities.len()))
        .with_extension("deal_id", json!(agreement.deal_id))
        .with_extension(
            "nearest_maturity",
            json!(agreement.nearest_maturity().map(|d| d.to_string())),
        )
}

pub fn trade_execution(trade: &TradeExecution) -> PolicyTransaction {
    let mut tx = PolicyTransaction::new(trade.trade_id.clone(), "trade_execution");
    tx.originator = Some(trade.buyer.clone());
    tx.beneficiary = Some(trade.seller.clone());
    tx.amount = to_amount(trade.notional.amount);
    tx.currency = Some(trade.notional.currency.clone());
    tx.regulatory_framework = vec![FATF.to_string()];

    tx.with_extension("instrument", json!(trade.instrument))
        .with_extension("price", json!(trade.price.and_then(|p| p.to_f64())))
        .with_extension("trade_date", json!(trade.trade_date.map(|d| d.to_string())))
        .with_extension("deal_id", json!(trade.deal_id))
}

pub fn loan_asset_securitization(event: &LoanAssetSecuritization) -> PolicyTransaction {
    let mut tx = PolicyTransaction::new(
        event.securitization_id.clone(),
        "loan_asset_securitization",
    );
    tx.originator = Some(event.originator.clone());
    tx.beneficiary = event.issuer.clone();
    tx.amount = to_amount(event.total_principal());
    tx.currency = Some(event.currency.clone());
    tx.regulatory_framework = vec![FATF.to_string()];

    let asset_ids: Vec<&str> = event.assets.iter().map(|a| a.asset_id.as_str()).collect();
    tx.with_extension("pool_id", json!(event.pool_id))
        .with_extension("asset_count", json!(event.assets.len()))
        .with_extension("asset_ids", json!(asset_ids))
        .with_extension("tranche_count", json!(event.tranche_count))
}

pub fn terms_change(change: &TermsChange) -> PolicyTransaction {
    let mut tx = PolicyTransaction::new(change.change_id.clone(), "terms_change");
    tx.originator = change.borrower.clone();
    tx.beneficiary = change.lender.clone();
    tx.governing_law = change.governing_law.clone();

    let new_commitment = change.new_commitment.as_ref().or(change.current_commitment.as_ref());
    if let Some(commitment) = new_commitment {
        tx.amount = to_amount(commitment.amount);
        tx.currency = Some(commitment.currency.clone());
    }

    let mut frameworks = Vec::new();
    if change.governing_law.as_deref().is_some_and(is_us_governing_law) {
        frameworks.push(US_REGULATIONS.to_string());
    }
    if new_commitment.is_some_and(|m| m.currency.eq_ignore_ascii_case("EUR")) {
        frameworks.push(MICA.to_string());
    }
    frameworks.push(FATF.to_string());
    tx.regulatory_framework = frameworks;

    let (change_amount, change_ratio) = match (&change.current_commitment, &change.new_commitment) {
        (Some(current), Some(new)) if current.currency.eq_ignore_ascii_case(&new.currency) => {
            let delta = new.amount - current.amount;
            let ratio = delta.checked_div(current.amount).and_then(|r| r.to_f64());
            (to_amount(delta), ratio)
        }
        _ => (None, None),
    };

    let terms: Vec<&str> = change.amendments.iter().map(|a| a.term.as_str()).collect();
    let amendments: Value = change
        .amendments
        .iter()
        .map(|a| (a.term.clone(), json!({ "previous": a.previous, "proposed": a.proposed })))
        .collect::<serde_json::Map<_, _>>()
        .into();

    tx.with_extension("deal_id", json!(change.deal_id))
        .with_extension("amended_terms", json!(terms))
        .with_extension("amendments", amendments)
        .with_extension("commitment_change", json!(change_amount))
        .with_extension("commitment_change_ratio", json!(change_ratio))
        .with_extension(
            "effective_date",
            json!(change.effective_date.map(|d| d.to_string())),
        )
}

pub fn to_transaction(event: &DomainEvent) -> PolicyTransaction {
    match event {
        DomainEvent::FacilityCreation(agreement) => facility_creation(agreement),
        DomainEvent::TradeExecution(trade) => trade_execution(trade),
        DomainEvent::LoanAssetSecuritization(event) => loan_asset_securitization(event),
        DomainEvent::TermsChange(change) => terms_change(change),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SecuritizedAsset, TermAmendment};
    use regcap_core::{AgreementParty, Facility, Money};
    use rust_decimal_macros::dec;

    fn facility(amount: Decimal, currency: &str) -> Facility {
        Facility {
            facility_name: "Term Loan".to_string(),
            commitment_amount: Money::new(amount, currency),
            drawn_amount: None,
            maturity_date: None,
        }
    }

    fn party(id: &str, role: &str) -> AgreementParty {
        AgreementParty {
            id: id.to_string(),
            name: format!("{} name", id),
            role: role.to_string(),
            lei: None,
            kyc_status: true,
            jurisdiction: Some("US".to_string()),
        }
    }

    fn identity(id: &str) -> PartyIdentity {
        PartyIdentity {
            id: id.to_string(),
            kyc_status: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_frameworks() {
        let agreement = CreditAgreement {
            sustainability_linked: true,
            governing_law: Some("State of New York".to_string()),
            facilities: vec![facility(dec!(1), "USD"), facility(dec!(1), "EUR")],
            ..Default::default()
        };
        assert_eq!(
            regulatory_frameworks(&agreement),
            vec![ESG_COMPLIANCE, US_REGULATIONS, MICA, FATF]
        );

        let english = CreditAgreement {
            governing_law: Some("England and Wales".to_string()),
            facilities: vec![facility(dec!(1), "GBP")],
            ..Default::default()
        };
        assert_eq!(regulatory_frameworks(&english), vec![FATF]);
    }

    #[test]
    fn test_ny_abbreviation_is_word_matched() {
        assert!(is_us_governing_law("NY"));
        assert!(is_us_governing_law("Laws of the State of Delaware"));
        assert!(!is_us_governing_law("Sydney"));
    }

    #[test]
    fn test_facility_creation() {
        let agreement = CreditAgreement {
            deal_id: Some("DEAL-7".to_string()),
            parties: vec![party("bor", "Borrower"), party("len", "Lender")],
            facilities: vec![facility(dec!(3000000), "USD"), facility(dec!(2000000), "USD")],
            ..Default::default()
        };

        let tx = facility_creation(&agreement);
        assert_eq!(tx.transaction_id, "DEAL-7");
        assert_eq!(tx.transaction_type.as_deref(), Some("facility_creation"));
        assert_eq!(tx.amount, Some(5_000_000.0));
        assert_eq!(tx.currency.as_deref(), Some("USD"));
        assert_eq!(tx.originator.as_ref().map(|p| p.id.as_str()), Some("bor"));
        assert_eq!(tx.beneficiary.as_ref().map(|p| p.id.as_str()), Some("len"));
        assert_eq!(tx.extensions["facility_count"], 2);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_agreement_without_identifier_gets_generated_id() {
        let tx = facility_creation(&CreditAgreement::default());
        assert!(tx.transaction_id.starts_with("facility_"));
        assert_eq!(tx.amount, None);
    }

    #[test]
    fn test_trade_execution() {
        let trade = TradeExecution {
            trade_id: "T-9".to_string(),
            trade_date: None,
            buyer: identity("buyer"),
            seller: identity("seller"),
            notional: Money::new(dec!(750000), "EUR"),
            price: Some(dec!(99.5)),
            instrument: Some("TLB".to_string()),
            deal_id: None,
        };
        let tx = trade_execution(&trade);
        assert_eq!(tx.amount, Some(750000.0));
        assert_eq!(tx.extensions["price"], 99.5);
        assert_eq!(tx.originator.map(|p| p.id), Some("buyer".to_string()));
    }

    #[test]
    fn test_securitization_sums_principal() {
        let event = LoanAssetSecuritization {
            securitization_id: "SEC-1".to_string(),
            pool_id: Some("POOL-1".to_string()),
            originator: identity("bank"),
            issuer: None,
            currency: "USD".to_string(),
            assets: vec![
                SecuritizedAsset { asset_id: "L1".to_string(), principal: dec!(100), deal_id: None },
                SecuritizedAsset { asset_id: "L2".to_string(), principal: dec!(250.5), deal_id: None },
            ],
            tranche_count: Some(3),
        };
        let tx = loan_asset_securitization(&event);
        assert_eq!(tx.amount, Some(350.5));
        assert_eq!(tx.extensions["asset_count"], 2);
        assert_eq!(tx.extensions["asset_ids"], json!(["L1", "L2"]));
    }

    #[test]
    fn test_terms_change_commitment_delta() {
        let change = TermsChange {
            change_id: "CHG-1".to_string(),
            deal_id: "DEAL-7".to_string(),
            borrower: Some(identity("bor")),
            lender: None,
            amendments: vec![TermAmendment {
                term: "margin_bps".to_string(),
                previous: json!(250),
                proposed: json!(325),
            }],
            current_commitment: Some(Money::new(dec!(1000000), "USD")),
            new_commitment: Some(Money::new(dec!(1500000), "USD")),
            effective_date: None,
            governing_law: Some("Delaware".to_string()),
        };

        let tx = terms_change(&change);
        assert_eq!(tx.amount, Some(1_500_000.0));
        assert_eq!(tx.extensions["commitment_change"], 500000.0);
        assert_eq!(tx.extensions["commitment_change_ratio"], 0.5);
        assert_eq!(tx.extensions["amendments"]["margin_bps"]["proposed"], 325);
        assert_eq!(tx.regulatory_framework, vec![US_REGULATIONS, FATF]);
    }
}
