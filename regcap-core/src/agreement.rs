//! Credit agreement shape consumed from upstream document extraction

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in a single currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// A party named in the agreement (borrower, lender, agent, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementParty {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub lei: Option<String>,
    #[serde(default)]
    pub kyc_status: bool,
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

impl AgreementParty {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.to_ascii_lowercase().contains(&role.to_ascii_lowercase())
    }
}

/// A single credit facility (tranche) within the agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub facility_name: String,
    pub commitment_amount: Money,
    /// Drawn portion, when the source document reports it
    #[serde(default)]
    pub drawn_amount: Option<Decimal>,
    #[serde(default)]
    pub maturity_date: Option<NaiveDate>,
}

/// Sustainability performance target attached to a sustainability-linked loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgKpiTarget {
    pub kpi_type: String,
    pub target_value: f64,
    #[serde(default)]
    pub current_value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Canonical credit agreement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditAgreement {
    #[serde(default)]
    pub deal_id: Option<String>,
    #[serde(default)]
    pub loan_identification_number: Option<String>,
    #[serde(default)]
    pub agreement_date: Option<NaiveDate>,
    #[serde(default)]
    pub parties: Vec<AgreementParty>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub governing_law: Option<String>,
    #[serde(default)]
    pub sustainability_linked: bool,
    #[serde(default)]
    pub esg_kpi_targets: Vec<EsgKpiTarget>,
}

impl CreditAgreement {
    /// Deal id, falling back to the loan identification number
    pub fn identifier(&self) -> Option<&str> {
        self.deal_id
            .as_deref()
            .or(self.loan_identification_number.as_deref())
    }

    pub fn borrower(&self) -> Option<&AgreementParty> {
        self.parties.iter().find(|p| p.has_role("borrower"))
    }

    /// First party acting as lender, falling back to the administrative agent
    pub fn lender(&self) -> Option<&AgreementParty> {
        self.parties
            .iter()
            .find(|p| p.has_role("lender"))
            .or_else(|| self.parties.iter().find(|p| p.has_role("agent")))
    }

    /// Sum of commitment amounts across all facilities.
    ///
    /// Drawn and undrawn commitments are treated alike.
    pub fn total_commitment(&self) -> Decimal {
        self.facilities
            .iter()
            .map(|f| f.commitment_amount.amount)
            .sum()
    }

    /// Currency of the first facility
    pub fn primary_currency(&self) -> Option<&str> {
        self.facilities
            .first()
            .map(|f| f.commitment_amount.currency.as_str())
    }

    pub fn nearest_maturity(&self) -> Option<NaiveDate> {
        self.facilities.iter().filter_map(|f| f.maturity_date).min()
    }

    pub fn has_currency(&self, currency: &str) -> bool {
        self.facilities
            .iter()
            .any(|f| f.commitment_amount.currency.eq_ignore_ascii_case(currency))
    }
}
