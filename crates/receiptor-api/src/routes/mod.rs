//! # API Route Modules
//!
//! - `rules`: rule management, dry runs and suggestions.
//! - `receipts`: receipt ingest, rule application and rule history.

pub mod receipts;
pub mod rules;
