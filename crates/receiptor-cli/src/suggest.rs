//! # Suggest Subcommand
//!
//! Prints rule suggestions mined from an exported receipt list.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use receiptor_rules::{suggest_from_records, Record, RuleSuggestion};
use serde_json::Value;

use crate::{print_json, read_json};

/// Arguments for `receiptor suggest`.
#[derive(Args, Debug)]
pub struct SuggestArgs {
    /// JSON file holding an array of receipt objects.
    #[arg(long)]
    pub receipts: PathBuf,
}

/// Load the export and derive suggestions.
pub fn suggest(args: &SuggestArgs) -> Result<Vec<RuleSuggestion>> {
    let raw: Vec<Value> = read_json(&args.receipts)?;
    let mut records = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        match Record::from_value(value) {
            Some(record) => records.push(record),
            None => bail!("receipt #{index} in {} is not a JSON object", args.receipts.display()),
        }
    }

    let suggestions = suggest_from_records(&records);
    tracing::info!(receipts = records.len(), suggestions = suggestions.len(), "suggestions generated");
    Ok(suggestions)
}

/// Entry point for `receiptor suggest`.
pub fn run_suggest(args: &SuggestArgs) -> Result<u8> {
    print_json(&suggest(args)?)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use receiptor_rules::SuggestionKind;
    use serde_json::json;

    fn export(value: Value) -> (tempfile::TempDir, SuggestArgs) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipts.json");
        std::fs::write(&path, value.to_string()).unwrap();
        (dir, SuggestArgs { receipts: path })
    }

    #[test]
    fn vendor_and_high_amount_suggestions() {
        let receipt = |vendor: &str, amount: f64| {
            json!({"category": "travel", "extracted_data": {"vendor_name": vendor, "total_amount": amount}})
        };
        let (_dir, args) = export(json!([
            receipt("Uber", 20.0),
            receipt("Uber", 31.0),
            receipt("Uber", 12.5),
            receipt("Delta", 1450.0),
        ]));

        let suggestions = suggest(&args).unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].kind, SuggestionKind::VendorCategorization);
        assert_eq!(suggestions[0].title, "Auto-categorize Uber receipts");
        assert_eq!(suggestions[1].kind, SuggestionKind::HighAmountReview);
    }

    #[test]
    fn empty_export_yields_nothing() {
        let (_dir, args) = export(json!([]));
        assert!(suggest(&args).unwrap().is_empty());
    }

    #[test]
    fn non_object_entry_is_an_error() {
        let (_dir, args) = export(json!([{"category": "x"}, "oops"]));
        let err = suggest(&args).unwrap_err();
        assert!(err.to_string().contains("receipt #1"));
    }
}
