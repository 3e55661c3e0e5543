//! # Evaluate Subcommand
//!
//! Runs the rules in a JSON file against one receipt.
//!
//! By default this is a dry run: every active rule is tested against the
//! receipt regardless of owner and nothing changes. With `--apply` the
//! rules and receipt are loaded into an in-memory store and processed as
//! the service would, so only rules owned by the receipt's `user_id` run,
//! later rules see earlier writes, and the updated receipt is printed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use receiptor_rules::{EngineConfig, MemoryStore, Record, Rule, RuleEngine, RuleMatch};
use serde::Serialize;
use serde_json::Value;

use crate::{print_json, read_json};

/// Arguments for `receiptor evaluate`.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// JSON file holding an array of rules.
    #[arg(long)]
    pub rules: PathBuf,

    /// JSON file holding one receipt object.
    #[arg(long)]
    pub receipt: PathBuf,

    /// Apply matching actions and report the updated receipt.
    #[arg(long)]
    pub apply: bool,
}

#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    pub rules_evaluated: usize,
    pub matches: Vec<RuleMatch>,
    /// The receipt after actions ran. Only present with `--apply`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Value>,
}

/// Load the inputs and evaluate them.
pub async fn evaluate(args: &EvaluateArgs) -> Result<EvaluationReport> {
    let rules: Vec<Rule> = read_json(&args.rules)?;
    let receipt = Record::from_value(read_json(&args.receipt)?)
        .with_context(|| format!("{} is not a JSON object", args.receipt.display()))?;

    if args.apply {
        apply(rules, receipt).await
    } else {
        dry_run(rules, &receipt).await
    }
}

async fn dry_run(rules: Vec<Rule>, receipt: &Record) -> Result<EvaluationReport> {
    let engine = RuleEngine::from_store(MemoryStore::new(), EngineConfig::default());
    let active: Vec<Rule> = rules.into_iter().filter(|r| r.is_active).collect();

    let mut matches = Vec::new();
    for rule in &active {
        if let Some(m) = engine.test_rule(rule, receipt).await {
            matches.push(m);
        }
    }
    tracing::info!(evaluated = active.len(), matched = matches.len(), "dry run complete");

    Ok(EvaluationReport {
        rules_evaluated: active.len(),
        matches,
        receipt: None,
    })
}

async fn apply(rules: Vec<Rule>, receipt: Record) -> Result<EvaluationReport> {
    let Some(receipt_id) = receipt.id().map(str::to_string) else {
        bail!("--apply needs a receipt with a string `id`");
    };
    let Some(user_id) = receipt.user_id().map(str::to_string) else {
        bail!("--apply needs a receipt with a `user_id`");
    };

    let owned = rules
        .iter()
        .filter(|r| r.is_active && r.user_id == user_id)
        .count();
    if owned < rules.len() {
        tracing::warn!(
            skipped = rules.len() - owned,
            "rules that are inactive or not owned by the receipt's user are skipped"
        );
    }

    let store = MemoryStore::seeded(rules, [receipt.clone()]);
    let engine = RuleEngine::from_store(store.clone(), EngineConfig::default());
    let matches = engine.process_record(&receipt).await;
    let updated = store
        .record(&receipt_id)
        .context("receipt vanished from the in-memory store")?;

    Ok(EvaluationReport {
        rules_evaluated: owned,
        matches,
        receipt: Some(updated.into()),
    })
}

/// Entry point for `receiptor evaluate`.
pub async fn run_evaluate(args: &EvaluateArgs) -> Result<u8> {
    let report = evaluate(args).await?;
    print_json(&report)?;
    Ok(0)
}
