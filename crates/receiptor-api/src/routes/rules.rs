//! # Rule Management Routes
//!
//! - `POST   /v1/rules`             : Create a rule for the caller
//! - `GET    /v1/rules`             : List the caller's rules
//! - `GET    /v1/rules/suggestions` : Rule suggestions from receipt history
//! - `GET    /v1/rules/:id`         : Get one rule
//! - `PUT    /v1/rules/:id`         : Replace a rule's editable fields
//! - `DELETE /v1/rules/:id`         : Delete a rule
//! - `POST   /v1/rules/:id/test`    : Dry-run a rule against recent receipts
//!
//! Every rule is scoped to its owner. A rule owned by someone else is
//! reported as not found.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use receiptor_rules::store::within;
use receiptor_rules::{ActionMap, ConditionGroup, Rule, RuleSuggestion, RuleUpdate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerUser;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 255;

/// Receipts a dry run is evaluated against.
const TEST_SAMPLE_SIZE: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/rules", post(create_rule).get(list_rules))
        .route("/v1/rules/suggestions", get(suggest_rules))
        .route(
            "/v1/rules/:id",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
        .route("/v1/rules/:id/test", post(test_rule))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Body for creating or replacing a rule.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RuleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `{"logic": "AND"|"OR"|"NOT", "conditions": [{field, type, operator, value}]}`
    #[serde(default)]
    #[schema(value_type = Object)]
    pub conditions: ConditionGroup,
    /// Action name to action config, e.g. `{"set_category": {"category": "meals"}}`.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub actions: ActionMap,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for RuleRequest {
    fn validate(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(format!("name must be at most {MAX_NAME_LEN} characters"));
        }
        Ok(())
    }
}

impl RuleRequest {
    fn into_update(self) -> RuleUpdate {
        RuleUpdate {
            name: Some(self.name.trim().to_string()),
            description: Some(self.description),
            conditions: Some(self.conditions),
            actions: Some(self.actions),
            is_active: Some(self.is_active),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RuleResponse {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub conditions: ConditionGroup,
    #[schema(value_type = Object)]
    pub actions: ActionMap,
    pub is_active: bool,
    pub usage_count: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Rule> for RuleResponse {
    fn from(rule: Rule) -> Self {
        Self {
            id: rule.id,
            user_id: rule.user_id,
            name: rule.name,
            description: rule.description,
            conditions: rule.conditions,
            actions: rule.actions,
            is_active: rule.is_active,
            usage_count: rule.usage_count,
            last_used: rule.last_used,
            created_at: rule.created_at,
            updated_at: rule.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuggestionsResponse {
    #[schema(value_type = Vec<Object>)]
    pub suggestions: Vec<RuleSuggestion>,
    pub count: usize,
}

/// Outcome of a dry run against one receipt.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TestResult {
    pub receipt_id: String,
    pub filename: Option<String>,
    pub vendor_name: Option<String>,
    pub matched: bool,
    /// Zero when the rule did not match.
    pub confidence: f64,
    pub actions_would_apply: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TestRuleResponse {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub test_results: Vec<TestResult>,
    pub total_tested: usize,
    pub total_matched: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a rule and check that the caller owns it.
async fn owned_rule(state: &AppState, caller: &CallerUser, id: Uuid) -> Result<Rule, AppError> {
    let rule = within(state.config.storage_timeout, state.rules.get_rule(id)).await?;
    if !caller.owns(Some(rule.user_id.as_str())) {
        return Err(AppError::NotFound(format!("rule {id}")));
    }
    Ok(rule)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Create a rule owned by the caller.
#[utoipa::path(
    post,
    path = "/v1/rules",
    request_body = RuleRequest,
    responses(
        (status = 201, description = "Rule created", body = RuleResponse),
        (status = 422, description = "Invalid rule"),
    ),
    tag = "rules"
)]
pub(crate) async fn create_rule(
    State(state): State<AppState>,
    caller: CallerUser,
    body: Result<Json<RuleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RuleResponse>), AppError> {
    let req = extract_validated_json(body)?;

    let rule = Rule::new(
        caller.as_str(),
        req.name.trim(),
        req.conditions,
        req.actions,
    )
    .with_description(req.description);
    let rule = Rule {
        is_active: req.is_active,
        ..rule
    };

    let rule = within(state.config.storage_timeout, state.rules.insert_rule(rule)).await?;
    tracing::info!(rule_id = %rule.id, user_id = caller.as_str(), "rule created");

    Ok((StatusCode::CREATED, Json(rule.into())))
}

/// List the caller's rules, oldest first.
#[utoipa::path(
    get,
    path = "/v1/rules",
    responses(
        (status = 200, description = "The caller's rules", body = Vec<RuleResponse>),
    ),
    tag = "rules"
)]
pub(crate) async fn list_rules(
    State(state): State<AppState>,
    caller: CallerUser,
) -> Result<Json<Vec<RuleResponse>>, AppError> {
    let rules = within(
        state.config.storage_timeout,
        state.rules.list_rules(caller.as_str()),
    )
    .await?;
    Ok(Json(rules.into_iter().map(RuleResponse::from).collect()))
}

/// Propose rules from the caller's receipt history.
#[utoipa::path(
    get,
    path = "/v1/rules/suggestions",
    responses(
        (status = 200, description = "Rule suggestions", body = SuggestionsResponse),
        (status = 503, description = "Receipt storage timed out"),
    ),
    tag = "rules"
)]
pub(crate) async fn suggest_rules(
    State(state): State<AppState>,
    caller: CallerUser,
) -> Result<Json<SuggestionsResponse>, AppError> {
    let suggestions = state.engine.suggest(caller.as_str()).await?;
    let count = suggestions.len();
    Ok(Json(SuggestionsResponse { suggestions, count }))
}

/// Get one of the caller's rules.
#[utoipa::path(
    get,
    path = "/v1/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Rule found", body = RuleResponse),
        (status = 404, description = "Rule not found"),
    ),
    tag = "rules"
)]
pub(crate) async fn get_rule(
    State(state): State<AppState>,
    caller: CallerUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RuleResponse>, AppError> {
    let rule = owned_rule(&state, &caller, id).await?;
    Ok(Json(rule.into()))
}

/// Replace a rule's editable fields. Usage statistics are preserved.
#[utoipa::path(
    put,
    path = "/v1/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule ID")),
    request_body = RuleRequest,
    responses(
        (status = 200, description = "Rule updated", body = RuleResponse),
        (status = 404, description = "Rule not found"),
        (status = 422, description = "Invalid rule"),
    ),
    tag = "rules"
)]
pub(crate) async fn update_rule(
    State(state): State<AppState>,
    caller: CallerUser,
    Path(id): Path<Uuid>,
    body: Result<Json<RuleRequest>, JsonRejection>,
) -> Result<Json<RuleResponse>, AppError> {
    let req = extract_validated_json(body)?;
    owned_rule(&state, &caller, id).await?;

    let rule = within(
        state.config.storage_timeout,
        state.rules.update_rule(id, req.into_update()),
    )
    .await?;
    tracing::info!(rule_id = %id, user_id = caller.as_str(), "rule updated");

    Ok(Json(rule.into()))
}

/// Delete one of the caller's rules.
#[utoipa::path(
    delete,
    path = "/v1/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not found"),
    ),
    tag = "rules"
)]
pub(crate) async fn delete_rule(
    State(state): State<AppState>,
    caller: CallerUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    owned_rule(&state, &caller, id).await?;
    within(state.config.storage_timeout, state.rules.delete_rule(id)).await?;
    tracing::info!(rule_id = %id, user_id = caller.as_str(), "rule deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Dry-run a rule against the caller's most recent receipts.
///
/// Nothing is written: receipts, usage statistics and rule history are
/// left untouched.
#[utoipa::path(
    post,
    path = "/v1/rules/{id}/test",
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Dry-run results", body = TestRuleResponse),
        (status = 404, description = "Rule not found"),
    ),
    tag = "rules"
)]
pub(crate) async fn test_rule(
    State(state): State<AppState>,
    caller: CallerUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TestRuleResponse>, AppError> {
    let rule = owned_rule(&state, &caller, id).await?;
    let receipts = within(
        state.config.storage_timeout,
        state.records.find_records_by_user(caller.as_str()),
    )
    .await?;

    let mut test_results = Vec::new();
    for receipt in receipts.iter().take(TEST_SAMPLE_SIZE) {
        let outcome = state.engine.test_rule(&rule, receipt).await;
        test_results.push(TestResult {
            receipt_id: receipt.id().unwrap_or_default().to_string(),
            filename: receipt
                .get("filename")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            vendor_name: receipt
                .extracted("vendor_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            matched: outcome.is_some(),
            confidence: outcome.as_ref().map_or(0.0, |m| m.confidence),
            actions_would_apply: outcome.map(|m| m.actions_applied).unwrap_or_default(),
        });
    }

    let total_matched = test_results.iter().filter(|r| r.matched).count();
    Ok(Json(TestRuleResponse {
        rule_id: rule.id,
        rule_name: rule.name,
        total_tested: test_results.len(),
        total_matched,
        test_results,
    }))
}
