//! # Storage Collaborators
//!
//! The engine never owns rules or receipts. It reaches storage through these
//! traits, each implemented by [`MemoryStore`](crate::memory::MemoryStore)
//! and by the Postgres adapter in `receiptor-api`.
//!
//! The engine itself only calls [`RuleStore::find_active_rules`],
//! [`RuleStore::increment_usage`], [`RecordMutator::apply_field_update`] and
//! [`RecordQuery::find_records_by_user`]. The remaining methods back the
//! rule management API.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::record::Record;
use crate::rule::{Rule, RuleApplication, RuleUpdate};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules owned by `user_id` with `is_active = true`.
    async fn find_active_rules(&self, user_id: &str) -> StoreResult<Vec<Rule>>;

    /// Atomically add one to `usage_count` and set `last_used` to now.
    ///
    /// Implementations must not read-modify-write across an await point:
    /// concurrent increments of the same rule must never be lost.
    async fn increment_usage(&self, rule_id: Uuid) -> StoreResult<()>;

    /// Apply a user edit. Never touches usage statistics.
    async fn update_rule(&self, rule_id: Uuid, update: RuleUpdate) -> StoreResult<Rule>;

    async fn insert_rule(&self, rule: Rule) -> StoreResult<Rule>;

    async fn get_rule(&self, rule_id: Uuid) -> StoreResult<Rule>;

    /// Every rule owned by `user_id`, active or not, oldest first.
    async fn list_rules(&self, user_id: &str) -> StoreResult<Vec<Rule>>;

    async fn delete_rule(&self, rule_id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait RecordMutator: Send + Sync {
    /// Write `value` at the dotted `field_path` of record `record_id`,
    /// creating missing intermediate objects. A path that crosses a
    /// non-object value is a [`StoreError::Backend`].
    ///
    /// Calls for different paths of the same record must not interfere.
    async fn apply_field_update(
        &self,
        record_id: &str,
        field_path: &str,
        value: Value,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait RecordQuery: Send + Sync {
    /// All receipts owned by `user_id`, most recent first.
    async fn find_records_by_user(&self, user_id: &str) -> StoreResult<Vec<Record>>;

    async fn get_record(&self, record_id: &str) -> StoreResult<Record>;

    /// Store a new receipt. The record must carry a string `id`; an id that
    /// is already taken yields [`StoreError::Conflict`] and leaves the stored
    /// receipt untouched.
    async fn insert_record(&self, record: Record) -> StoreResult<Record>;
}

#[async_trait]
pub trait ApplicationLog: Send + Sync {
    async fn record_applications(&self, applications: Vec<RuleApplication>) -> StoreResult<()>;

    /// History for one receipt, most recent first.
    async fn applications_for_record(&self, receipt_id: &str)
        -> StoreResult<Vec<RuleApplication>>;
}

/// A mutator that accepts and drops every write. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardMutator;

#[async_trait]
impl RecordMutator for DiscardMutator {
    async fn apply_field_update(&self, _: &str, _: &str, _: Value) -> StoreResult<()> {
        Ok(())
    }
}

/// Run a storage call under `deadline`, mapping expiry to [`StoreError::Timeout`].
pub async fn within<T, F>(deadline: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| StoreError::Timeout(deadline))?
}
