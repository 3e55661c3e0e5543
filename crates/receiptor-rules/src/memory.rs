//! # In-Memory Store
//!
//! [`MemoryStore`] implements every storage trait over process memory. It
//! backs the test suites, the CLI, and the API when no database is
//! configured.
//!
//! Locks are `parking_lot` and are never held across an `.await`. Usage
//! increments run entirely under one write lock, so concurrent matches of
//! the same rule never lose an update.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::record::Record;
use crate::rule::{Rule, RuleApplication, RuleUpdate};
use crate::store::{ApplicationLog, RecordMutator, RecordQuery, RuleStore, StoreResult};

#[derive(Debug, Default)]
struct Receipts {
    by_id: HashMap<String, Record>,
    /// Insertion order, oldest first.
    order: Vec<String>,
}

/// Thread-safe, cloneable in-memory implementation of all storage traits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rules: Arc<RwLock<HashMap<Uuid, Rule>>>,
    receipts: Arc<RwLock<Receipts>>,
    applications: Arc<RwLock<Vec<RuleApplication>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store preloaded with rules and receipts. Receipts without a
    /// string `id` are skipped.
    pub fn seeded(rules: impl IntoIterator<Item = Rule>, records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.rules.write();
            for rule in rules {
                guard.insert(rule.id, rule);
            }
        }
        {
            let mut guard = store.receipts.write();
            for record in records {
                if let Some(id) = record.id().map(String::from) {
                    if guard.by_id.insert(id.clone(), record).is_none() {
                        guard.order.push(id);
                    }
                }
            }
        }
        store
    }

    /// Snapshot of a rule, if present. Convenience for tests and the CLI.
    pub fn rule(&self, rule_id: &Uuid) -> Option<Rule> {
        self.rules.read().get(rule_id).cloned()
    }

    /// Snapshot of a receipt, if present.
    pub fn record(&self, record_id: &str) -> Option<Record> {
        self.receipts.read().by_id.get(record_id).cloned()
    }
}

fn sorted(mut rules: Vec<Rule>) -> Vec<Rule> {
    rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    rules
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn find_active_rules(&self, user_id: &str) -> StoreResult<Vec<Rule>> {
        let rules = self
            .rules
            .read()
            .values()
            .filter(|r| r.user_id == user_id && r.is_active)
            .cloned()
            .collect();
        Ok(sorted(rules))
    }

    async fn increment_usage(&self, rule_id: Uuid) -> StoreResult<()> {
        let mut guard = self.rules.write();
        let rule = guard
            .get_mut(&rule_id)
            .ok_or_else(|| StoreError::NotFound(format!("rule {rule_id}")))?;
        rule.usage_count += 1;
        rule.last_used = Some(Utc::now());
        Ok(())
    }

    async fn update_rule(&self, rule_id: Uuid, update: RuleUpdate) -> StoreResult<Rule> {
        let mut guard = self.rules.write();
        let rule = guard
            .get_mut(&rule_id)
            .ok_or_else(|| StoreError::NotFound(format!("rule {rule_id}")))?;
        rule.apply_update(update);
        Ok(rule.clone())
    }

    async fn insert_rule(&self, rule: Rule) -> StoreResult<Rule> {
        self.rules.write().insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn get_rule(&self, rule_id: Uuid) -> StoreResult<Rule> {
        self.rule(&rule_id)
            .ok_or_else(|| StoreError::NotFound(format!("rule {rule_id}")))
    }

    async fn list_rules(&self, user_id: &str) -> StoreResult<Vec<Rule>> {
        let rules = self
            .rules
            .read()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted(rules))
    }

    async fn delete_rule(&self, rule_id: Uuid) -> StoreResult<()> {
        self.rules
            .write()
            .remove(&rule_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("rule {rule_id}")))
    }
}

#[async_trait]
impl RecordMutator for MemoryStore {
    async fn apply_field_update(
        &self,
        record_id: &str,
        field_path: &str,
        value: Value,
    ) -> StoreResult<()> {
        let mut guard = self.receipts.write();
        let record = guard
            .by_id
            .get_mut(record_id)
            .ok_or_else(|| StoreError::NotFound(format!("receipt {record_id}")))?;
        if record.set(field_path, value) {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "cannot write `{field_path}` on receipt {record_id}"
            )))
        }
    }
}

#[async_trait]
impl RecordQuery for MemoryStore {
    async fn find_records_by_user(&self, user_id: &str) -> StoreResult<Vec<Record>> {
        let guard = self.receipts.read();
        Ok(guard
            .order
            .iter()
            .rev()
            .filter_map(|id| guard.by_id.get(id))
            .filter(|r| r.user_id() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn get_record(&self, record_id: &str) -> StoreResult<Record> {
        self.record(record_id)
            .ok_or_else(|| StoreError::NotFound(format!("receipt {record_id}")))
    }

    async fn insert_record(&self, record: Record) -> StoreResult<Record> {
        let id = record
            .id()
            .map(String::from)
            .ok_or_else(|| StoreError::Backend("receipt has no string `id`".into()))?;
        let mut guard = self.receipts.write();
        if guard.by_id.contains_key(&id) {
            return Err(StoreError::Conflict(format!("receipt {id}")));
        }
        guard.by_id.insert(id.clone(), record.clone());
        guard.order.push(id);
        Ok(record)
    }
}

#[async_trait]
impl ApplicationLog for MemoryStore {
    async fn record_applications(&self, applications: Vec<RuleApplication>) -> StoreResult<()> {
        self.applications.write().extend(applications);
        Ok(())
    }

    async fn applications_for_record(
        &self,
        receipt_id: &str,
    ) -> StoreResult<Vec<RuleApplication>> {
        Ok(self
            .applications
            .read()
            .iter()
            .rev()
            .filter(|a| a.receipt_id == receipt_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionMap;
    use crate::group::ConditionGroup;
    use crate::rule::RuleMatch;
    use serde_json::json;

    fn rule(user: &str, active: bool) -> Rule {
        let mut r = Rule::new(user, "r", ConditionGroup::default(), ActionMap::new());
        r.is_active = active;
        r
    }

    fn receipt(id: &str, user: &str) -> Record {
        Record::from_value(json!({"id": id, "user_id": user})).unwrap()
    }

    #[tokio::test]
    async fn find_active_rules_filters_user_and_flag() {
        let mine = rule("u-1", true);
        let store = MemoryStore::seeded(
            [mine.clone(), rule("u-1", false), rule("u-2", true)],
            [],
        );
        let found = store.find_active_rules("u-1").await.unwrap();
        assert_eq!(found, vec![mine]);
        assert_eq!(store.list_rules("u-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn increment_usage_sets_last_used() {
        let r = rule("u-1", true);
        let store = MemoryStore::seeded([r.clone()], []);
        store.increment_usage(r.id).await.unwrap();
        store.increment_usage(r.id).await.unwrap();
        let stored = store.rule(&r.id).unwrap();
        assert_eq!(stored.usage_count, 2);
        assert!(stored.last_used.is_some());
    }

    #[tokio::test]
    async fn missing_rule_is_not_found() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.increment_usage(id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.get_rule(id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_rule(id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn field_update_writes_nested_path() {
        let store = MemoryStore::seeded([], [receipt("r-1", "u-1")]);
        store
            .apply_field_update("r-1", "sync.quickbooks", json!(true))
            .await
            .unwrap();
        let stored = store.record("r-1").unwrap();
        assert_eq!(stored.get("sync.quickbooks"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn field_update_through_scalar_fails() {
        let store = MemoryStore::seeded([], [receipt("r-1", "u-1")]);
        let err = store.apply_field_update("r-1", "user_id.name", json!("x")).await;
        assert!(matches!(err, Err(StoreError::Backend(_))));
        assert_eq!(store.record("r-1").unwrap().user_id(), Some("u-1"));
    }

    #[tokio::test]
    async fn field_update_on_missing_receipt_fails() {
        let store = MemoryStore::new();
        let err = store.apply_field_update("nope", "category", json!("x")).await;
        assert!(matches!(err, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn records_by_user_are_most_recent_first() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store.insert_record(receipt(id, "u-1")).await.unwrap();
        }
        store.insert_record(receipt("z", "u-2")).await.unwrap();

        let ids: Vec<String> = store
            .find_records_by_user("u-1")
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.id().map(String::from))
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn insert_record_requires_id() {
        let store = MemoryStore::new();
        let result = store.insert_record(Record::new()).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn insert_record_never_replaces_existing_id() {
        let store = MemoryStore::new();
        store.insert_record(receipt("r-1", "u-1")).await.unwrap();

        let result = store.insert_record(receipt("r-1", "u-2")).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let stored = store.record("r-1").unwrap();
        assert_eq!(stored.user_id(), Some("u-1"));
        assert!(store.find_records_by_user("u-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn application_history_is_per_receipt() {
        let store = MemoryStore::new();
        let m = RuleMatch {
            rule_id: Uuid::new_v4(),
            rule_name: "r".into(),
            confidence: 1.0,
            actions_applied: vec![],
        };
        store
            .record_applications(vec![
                RuleApplication::from_match("r-1", &m),
                RuleApplication::from_match("r-2", &m),
            ])
            .await
            .unwrap();
        assert_eq!(store.applications_for_record("r-1").await.unwrap().len(), 1);
        assert!(store.applications_for_record("r-3").await.unwrap().is_empty());
    }
}
