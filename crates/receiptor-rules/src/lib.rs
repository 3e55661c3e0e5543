//! # receiptor-rules: Receipt Rule Engine
//!
//! Decides, for each processed receipt, whether a user's automation rules
//! apply and executes the configured side effects: recategorizing, tagging,
//! flagging for review, or preparing the receipt for accounting export.
//!
//! ## Architecture
//!
//! - **Field** (`field.rs`): dotted-path resolution over nested records.
//!
//! - **Condition** (`condition.rs`): typed text/number/date/boolean
//!   predicates. Unknown types and operators evaluate to `false`.
//!
//! - **Group** (`group.rs`): AND/OR/NOT combination of conditions and the
//!   confidence score (fraction of conditions that held).
//!
//! - **Action** (`action.rs`): the closed set of rule actions and the
//!   dispatcher that turns them into field updates.
//!
//! - **Engine** (`engine.rs`): loads a user's active rules, applies the
//!   matching ones, and records usage statistics.
//!
//! - **Suggestion** (`suggestion.rs`): proposes new rules from receipt
//!   history (vendor clustering, high-amount review).
//!
//! - **Store** (`store.rs`, `memory.rs`): the storage collaborator traits and
//!   an in-memory implementation.
//!
//! ## Failure Policy
//!
//! A single bad condition, action, or rule never blocks processing of a
//! receipt. Predicates fail closed, action failures are logged and skipped,
//! and [`RuleEngine::process_record`] always returns a (possibly empty) list.

pub mod action;
pub mod condition;
pub mod engine;
pub mod error;
pub mod field;
pub mod group;
pub mod memory;
pub mod record;
pub mod rule;
pub mod store;
pub mod suggestion;

// Re-export primary types.
pub use action::{Action, ActionDispatcher, ActionMap};
pub use condition::{Condition, Predicate};
pub use engine::{EngineConfig, RuleEngine};
pub use error::{EngineError, StoreError};
pub use group::{ConditionGroup, GroupOutcome, Logic};
pub use memory::MemoryStore;
pub use record::Record;
pub use rule::{Rule, RuleApplication, RuleMatch, RuleUpdate};
pub use store::{ApplicationLog, RecordMutator, RecordQuery, RuleStore, StoreResult};
pub use suggestion::{suggest_from_records, RuleSuggestion, SuggestionKind};
