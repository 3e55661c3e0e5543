//! # Postgres Store
//!
//! [`PgStore`] implements every storage trait of `receiptor-rules` on top
//! of three tables: `ai_rules`, `receipts` (the full receipt document in a
//! JSONB `data` column) and `receipt_rule_applications`.
//!
//! Usage counters are advanced with a single `UPDATE ... SET usage_count =
//! usage_count + 1`, so concurrent increments are never lost. Top-level
//! field writes use `jsonb_set`, which only touches the addressed key; nested
//! writes rewrite the document under `select ... for update` so missing
//! parents are created the same way `MemoryStore` creates them.

use async_trait::async_trait;
use receiptor_rules::{
    ApplicationLog, ConditionGroup, Record, RecordMutator, RecordQuery, Rule, RuleApplication,
    RuleStore, RuleUpdate, StoreError, StoreResult,
};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Receipts returned per user lookup.
const MAX_RECORDS_PER_USER: i64 = 1000;

const RULE_COLUMNS: &str = "id, user_id, name, description, conditions, actions, is_active, \
                            usage_count, last_used, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_rule_row(row: PgRow) -> StoreResult<Rule> {
        let conditions: Value = row.get("conditions");
        let actions: Value = row.get("actions");
        let usage_count: i64 = row.get("usage_count");

        Ok(Rule {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            description: row.get("description"),
            conditions: serde_json::from_value::<ConditionGroup>(conditions)
                .map_err(|e| StoreError::Backend(format!("corrupt rule conditions: {e}")))?,
            actions: serde_json::from_value(actions)
                .map_err(|e| StoreError::Backend(format!("corrupt rule actions: {e}")))?,
            is_active: row.get("is_active"),
            usage_count: u64::try_from(usage_count).unwrap_or(0),
            last_used: row.get("last_used"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn map_record_row(row: PgRow) -> StoreResult<Record> {
        let data: Value = row.get("data");
        Record::from_value(data)
            .ok_or_else(|| StoreError::Backend("stored receipt is not a JSON object".into()))
    }

    fn map_application_row(row: PgRow) -> StoreResult<RuleApplication> {
        let actions: Value = row.get("actions_applied");
        Ok(RuleApplication {
            id: row.get("id"),
            receipt_id: row.get("receipt_id"),
            rule_id: row.get("rule_id"),
            rule_name: row.get("rule_name"),
            confidence: row.get("confidence"),
            actions_applied: serde_json::from_value(actions)
                .map_err(|e| StoreError::Backend(format!("corrupt actions_applied: {e}")))?,
            applied_at: row.get("applied_at"),
        })
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

/// A single non-empty key that `jsonb_set` can write in place.
fn is_top_level(field_path: &str) -> bool {
    !field_path.is_empty() && !field_path.contains('.')
}

#[async_trait]
impl RuleStore for PgStore {
    async fn find_active_rules(&self, user_id: &str) -> StoreResult<Vec<Rule>> {
        let rows = sqlx::query(&format!(
            "select {RULE_COLUMNS} from ai_rules
             where user_id = $1 and is_active
             order by created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Self::map_rule_row).collect()
    }

    async fn increment_usage(&self, rule_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "update ai_rules set usage_count = usage_count + 1, last_used = now() where id = $1",
        )
        .bind(rule_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("rule {rule_id}")));
        }
        Ok(())
    }

    async fn update_rule(&self, rule_id: Uuid, update: RuleUpdate) -> StoreResult<Rule> {
        let mut rule = self.get_rule(rule_id).await?;
        rule.apply_update(update);

        // Statistics columns are left out of the SET list.
        let row = sqlx::query(&format!(
            "update ai_rules
             set name = $2, description = $3, conditions = $4, actions = $5,
                 is_active = $6, updated_at = $7
             where id = $1
             returning {RULE_COLUMNS}"
        ))
        .bind(rule.id)
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(to_json(&rule.conditions)?)
        .bind(to_json(&rule.actions)?)
        .bind(rule.is_active)
        .bind(rule.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| StoreError::NotFound(format!("rule {rule_id}")))?;

        Self::map_rule_row(row)
    }

    async fn insert_rule(&self, rule: Rule) -> StoreResult<Rule> {
        let row = sqlx::query(&format!(
            "insert into ai_rules ({RULE_COLUMNS})
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             returning {RULE_COLUMNS}"
        ))
        .bind(rule.id)
        .bind(&rule.user_id)
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(to_json(&rule.conditions)?)
        .bind(to_json(&rule.actions)?)
        .bind(rule.is_active)
        .bind(i64::try_from(rule.usage_count).unwrap_or(i64::MAX))
        .bind(rule.last_used)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Self::map_rule_row(row)
    }

    async fn get_rule(&self, rule_id: Uuid) -> StoreResult<Rule> {
        let row = sqlx::query(&format!("select {RULE_COLUMNS} from ai_rules where id = $1"))
            .bind(rule_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::NotFound(format!("rule {rule_id}")))?;

        Self::map_rule_row(row)
    }

    async fn list_rules(&self, user_id: &str) -> StoreResult<Vec<Rule>> {
        let rows = sqlx::query(&format!(
            "select {RULE_COLUMNS} from ai_rules where user_id = $1 order by created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Self::map_rule_row).collect()
    }

    async fn delete_rule(&self, rule_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("delete from ai_rules where id = $1")
            .bind(rule_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("rule {rule_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordMutator for PgStore {
    async fn apply_field_update(
        &self,
        record_id: &str,
        field_path: &str,
        value: Value,
    ) -> StoreResult<()> {
        if is_top_level(field_path) {
            let result = sqlx::query(
                "update receipts set data = jsonb_set(data, $2::text[], $3::jsonb, true) where id = $1",
            )
            .bind(record_id)
            .bind(vec![field_path.to_string()])
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("receipt {record_id}")));
            }
            return Ok(());
        }

        // jsonb_set cannot create missing parents, so nested writes go
        // through the document under a row lock.
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let row = sqlx::query("select data from receipts where id = $1 for update")
            .bind(record_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::NotFound(format!("receipt {record_id}")))?;

        let mut record = Self::map_record_row(row)?;
        if !record.set(field_path, value) {
            return Err(StoreError::Backend(format!(
                "cannot write `{field_path}` on receipt {record_id}"
            )));
        }

        sqlx::query("update receipts set data = $2 where id = $1")
            .bind(record_id)
            .bind(Value::from(record))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }
}

#[async_trait]
impl RecordQuery for PgStore {
    async fn find_records_by_user(&self, user_id: &str) -> StoreResult<Vec<Record>> {
        let rows = sqlx::query(
            "select data from receipts where user_id = $1 order by created_at desc limit $2",
        )
        .bind(user_id)
        .bind(MAX_RECORDS_PER_USER)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Self::map_record_row).collect()
    }

    async fn get_record(&self, record_id: &str) -> StoreResult<Record> {
        let row = sqlx::query("select data from receipts where id = $1")
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::NotFound(format!("receipt {record_id}")))?;

        Self::map_record_row(row)
    }

    async fn insert_record(&self, record: Record) -> StoreResult<Record> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::Backend("receipt has no string id".into()))?
            .to_string();
        let user_id = record.user_id().unwrap_or_default().to_string();

        let row = sqlx::query(
            "insert into receipts (id, user_id, data) values ($1, $2, $3)
             on conflict (id) do nothing
             returning data",
        )
        .bind(&id)
        .bind(&user_id)
        .bind(Value::from(record))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| StoreError::Conflict(format!("receipt {id}")))?;

        Self::map_record_row(row)
    }
}

#[async_trait]
impl ApplicationLog for PgStore {
    async fn record_applications(&self, applications: Vec<RuleApplication>) -> StoreResult<()> {
        if applications.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for app in &applications {
            sqlx::query(
                "insert into receipt_rule_applications
                 (id, receipt_id, rule_id, rule_name, confidence, actions_applied, applied_at)
                 values ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(app.id)
            .bind(&app.receipt_id)
            .bind(app.rule_id)
            .bind(&app.rule_name)
            .bind(app.confidence)
            .bind(to_json(&app.actions_applied)?)
            .bind(app.applied_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;

        Ok(())
    }

    async fn applications_for_record(
        &self,
        receipt_id: &str,
    ) -> StoreResult<Vec<RuleApplication>> {
        let rows = sqlx::query(
            "select id, receipt_id, rule_id, rule_name, confidence, actions_applied, applied_at
             from receipt_rule_applications
             where receipt_id = $1
             order by applied_at desc",
        )
        .bind(receipt_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Self::map_application_row).collect()
    }
}
