//! RegCap - command-line driver
//!
//! Evaluates transactions, domain events and CDM events against the
//! configured rule set and prints the resulting decision as JSON.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use regcap_core::{CreditAgreement, Decision};
use regcap_engine::{PolicyEngine, RuleSetEngine, RulesSource};
use regcap_risk::RiskContext;
use regcap_service::{
    AppState, LoanAssetSecuritization, ServiceConfig, TermsChange, TradeExecution,
};
use regcap_storage::AuditFilter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "regcap")]
#[command(about = "Regulatory capital and policy compliance engine", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "REGCAP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a canonical transaction (JSON mapping)
    Evaluate { file: PathBuf },

    /// Evaluate a new credit facility
    Facility {
        /// Credit agreement JSON
        agreement: PathBuf,
        /// Risk context JSON (PD, LGD, approach, borrower financials)
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Compute RWA and capital requirements for an agreement
    CreditRisk {
        agreement: PathBuf,
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Evaluate a trade execution event
    Trade { file: PathBuf },

    /// Evaluate a loan asset securitization event
    Securitization { file: PathBuf },

    /// Evaluate a terms change event
    TermsChange { file: PathBuf },

    /// Validate and evaluate a CDM event envelope
    Cdm { file: PathBuf },

    /// Query recorded decisions, most recent first
    Decisions {
        #[arg(long)]
        transaction_id: Option<String>,
        #[arg(long)]
        transaction_type: Option<String>,
        /// ALLOW, BLOCK or FLAG
        #[arg(long)]
        decision: Option<String>,
        #[arg(long)]
        rule: Option<String>,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Every decision recorded for a transaction, oldest first
    History { transaction_id: String },

    /// Decision statistics over a window
    Stats {
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },

    /// Engine counters and loaded rule set version
    EngineStats,

    /// Compile a YAML rule set and report its version
    ValidateRules { file: PathBuf },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn read_context(path: Option<&Path>) -> Result<RiskContext> {
    match path {
        Some(path) => read_json(path),
        None => Ok(RiskContext::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,regcap=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::ValidateRules { file } = &cli.command {
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("cannot read {}", file.display()))?;
        let engine = RuleSetEngine::new();
        engine.load_rules(RulesSource::Yaml(source))?;
        return print_json(&engine.get_stats());
    }

    let config = ServiceConfig::load(cli.config.as_deref())?;
    let state = AppState::from_config(config).await?;
    let service = &state.policy_service;

    match cli.command {
        Commands::Evaluate { file } => {
            let tx: Value = read_json(&file)?;
            print_json(&service.evaluate_json(&tx).await?)?;
        }
        Commands::Facility { agreement, context } => {
            let agreement: CreditAgreement = read_json(&agreement)?;
            let context = read_context(context.as_deref())?;
            let decision = service
                .evaluate_facility_creation(&agreement, &context, Map::new())
                .await?;
            print_json(&decision)?;
        }
        Commands::CreditRisk { agreement, context } => {
            let agreement: CreditAgreement = read_json(&agreement)?;
            let context = read_context(context.as_deref())?;
            print_json(&service.evaluate_credit_risk(&agreement, &context)?)?;
        }
        Commands::Trade { file } => {
            let trade: TradeExecution = read_json(&file)?;
            print_json(&service.evaluate_trade_execution(&trade).await?)?;
        }
        Commands::Securitization { file } => {
            let event: LoanAssetSecuritization = read_json(&file)?;
            print_json(&service.evaluate_loan_asset_securitization(&event).await?)?;
        }
        Commands::TermsChange { file } => {
            let change: TermsChange = read_json(&file)?;
            print_json(&service.evaluate_terms_change(&change).await?)?;
        }
        Commands::Cdm { file } => {
            let event: Value = read_json(&file)?;
            let evaluation = service.evaluate_with_cdm_process(&event).await?;
            print_json(&serde_json::json!({
                "decision": evaluation.decision,
                "lineage_event": evaluation.lineage_event,
            }))?;
        }
        Commands::Decisions {
            transaction_id,
            transaction_type,
            decision,
            rule,
            from,
            to,
            limit,
            offset,
        } => {
            let decision = match decision.as_deref() {
                Some(raw) => match Decision::parse(raw) {
                    Some(d) => Some(d),
                    None => bail!("unknown decision '{}', expected ALLOW, BLOCK or FLAG", raw),
                },
                None => None,
            };
            let filter = AuditFilter {
                transaction_id,
                transaction_type,
                decision,
                rule_applied: rule,
                from,
                to,
                limit,
                offset,
            };
            print_json(&state.ledger.get_policy_decisions(&filter).await?)?;
        }
        Commands::History { transaction_id } => {
            print_json(&state.ledger.get_decision_history(&transaction_id).await?)?;
        }
        Commands::Stats { from, to } => {
            print_json(&state.ledger.get_policy_statistics(from, to).await?)?;
        }
        Commands::EngineStats => {
            print_json(&state.engine.get_stats())?;
        }
        Commands::ValidateRules { .. } => {}
    }

    Ok(())
}
