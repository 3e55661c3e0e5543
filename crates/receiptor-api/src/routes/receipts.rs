//! # Receipt Routes
//!
//! - `POST /v1/receipts`                  : Ingest a processed receipt and run the caller's rules
//! - `GET  /v1/receipts/:id`              : Current stored receipt
//! - `POST /v1/receipts/:id/apply-rules`  : Re-run the caller's rules on a receipt
//! - `GET  /v1/receipts/:id/rule-history` : Rules applied to a receipt, most recent first
//!
//! Receipts are arbitrary JSON objects. The API only owns `id` and
//! `user_id`; everything else is whatever the extraction pipeline produced.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use receiptor_rules::store::within;
use receiptor_rules::{Record, RuleApplication, RuleMatch};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerUser;
use crate::error::AppError;
use crate::extractors::extract_record;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/receipts", post(ingest_receipt))
        .route("/v1/receipts/:id", get(get_receipt))
        .route("/v1/receipts/:id/apply-rules", post(apply_rules))
        .route("/v1/receipts/:id/rule-history", get(rule_history))
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A receipt document: any JSON object produced by extraction.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(value_type = Object)]
pub struct ReceiptDocument(pub Value);

/// A rule that matched during this request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MatchResponse {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub confidence: f64,
    pub actions_applied: Vec<String>,
}

impl From<RuleMatch> for MatchResponse {
    fn from(m: RuleMatch) -> Self {
        Self {
            rule_id: m.rule_id,
            rule_name: m.rule_name,
            confidence: m.confidence,
            actions_applied: m.actions_applied,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    /// The stored receipt after rule actions ran.
    #[schema(value_type = Object)]
    pub receipt: Value,
    pub rules_applied: usize,
    pub matches: Vec<MatchResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplyRulesResponse {
    pub receipt_id: String,
    pub rules_applied: usize,
    pub matches: Vec<MatchResponse>,
}

/// A persisted rule application.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub rule_name: String,
    pub confidence: f64,
    pub actions_applied: Vec<String>,
    pub applied_at: DateTime<Utc>,
}

impl From<RuleApplication> for ApplicationResponse {
    fn from(app: RuleApplication) -> Self {
        Self {
            id: app.id,
            rule_id: app.rule_id,
            rule_name: app.rule_name,
            confidence: app.confidence,
            actions_applied: app.actions_applied,
            applied_at: app.applied_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RuleHistoryResponse {
    pub receipt_id: String,
    pub rule_applications: Vec<ApplicationResponse>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a receipt and check that the caller owns it.
async fn owned_receipt(state: &AppState, caller: &CallerUser, id: &str) -> Result<Record, AppError> {
    let record = within(state.config.storage_timeout, state.records.get_record(id)).await?;
    if !caller.owns(record.user_id()) {
        return Err(AppError::NotFound(format!("receipt {id}")));
    }
    Ok(record)
}

/// Run the engine on `record` and persist the resulting applications.
async fn run_rules(state: &AppState, receipt_id: &str, record: &Record) -> Result<Vec<RuleMatch>, AppError> {
    let matches = state.engine.process_record(record).await;
    if !matches.is_empty() {
        let applications = matches
            .iter()
            .map(|m| RuleApplication::from_match(receipt_id, m))
            .collect();
        within(
            state.config.storage_timeout,
            state.applications.record_applications(applications),
        )
        .await?;
    }
    Ok(matches)
}

fn has_usable_id(record: &Record) -> bool {
    record.id().is_some_and(|id| !id.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Ingest a processed receipt for the caller and run their active rules.
///
/// `user_id` is always set to the caller. A receipt without an `id` gets a
/// fresh UUID; an `id` that is already stored is rejected with 409.
#[utoipa::path(
    post,
    path = "/v1/receipts",
    request_body = ReceiptDocument,
    responses(
        (status = 201, description = "Receipt stored and rules applied", body = IngestResponse),
        (status = 409, description = "A receipt with this id already exists"),
        (status = 422, description = "Body is not a JSON object"),
    ),
    tag = "receipts"
)]
pub(crate) async fn ingest_receipt(
    State(state): State<AppState>,
    caller: CallerUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let mut record = extract_record(body)?;
    if !has_usable_id(&record) {
        record.insert("id", Value::String(Uuid::new_v4().to_string()));
    }
    record.insert("user_id", Value::String(caller.as_str().to_string()));

    let stored = within(state.config.storage_timeout, state.records.insert_record(record)).await?;
    let receipt_id = stored.id().unwrap_or_default().to_string();
    tracing::info!(receipt_id = %receipt_id, user_id = caller.as_str(), "receipt ingested");

    let matches = run_rules(&state, &receipt_id, &stored).await?;
    let current = within(
        state.config.storage_timeout,
        state.records.get_record(&receipt_id),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            receipt: current.into(),
            rules_applied: matches.len(),
            matches: matches.into_iter().map(MatchResponse::from).collect(),
        }),
    ))
}

/// Get one of the caller's receipts as currently stored.
#[utoipa::path(
    get,
    path = "/v1/receipts/{id}",
    params(("id" = String, Path, description = "Receipt ID")),
    responses(
        (status = 200, description = "Receipt found", body = ReceiptDocument),
        (status = 404, description = "Receipt not found"),
    ),
    tag = "receipts"
)]
pub(crate) async fn get_receipt(
    State(state): State<AppState>,
    caller: CallerUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let record = owned_receipt(&state, &caller, &id).await?;
    Ok(Json(record.into()))
}

/// Re-run the caller's active rules against a stored receipt.
#[utoipa::path(
    post,
    path = "/v1/receipts/{id}/apply-rules",
    params(("id" = String, Path, description = "Receipt ID")),
    responses(
        (status = 200, description = "Rules applied", body = ApplyRulesResponse),
        (status = 404, description = "Receipt not found"),
    ),
    tag = "receipts"
)]
pub(crate) async fn apply_rules(
    State(state): State<AppState>,
    caller: CallerUser,
    Path(id): Path<String>,
) -> Result<Json<ApplyRulesResponse>, AppError> {
    let record = owned_receipt(&state, &caller, &id).await?;
    let matches = run_rules(&state, &id, &record).await?;

    Ok(Json(ApplyRulesResponse {
        receipt_id: id,
        rules_applied: matches.len(),
        matches: matches.into_iter().map(MatchResponse::from).collect(),
    }))
}

/// Rule applications recorded for one of the caller's receipts.
#[utoipa::path(
    get,
    path = "/v1/receipts/{id}/rule-history",
    params(("id" = String, Path, description = "Receipt ID")),
    responses(
        (status = 200, description = "Rule application history", body = RuleHistoryResponse),
        (status = 404, description = "Receipt not found"),
    ),
    tag = "receipts"
)]
pub(crate) async fn rule_history(
    State(state): State<AppState>,
    caller: CallerUser,
    Path(id): Path<String>,
) -> Result<Json<RuleHistoryResponse>, AppError> {
    owned_receipt(&state, &caller, &id).await?;
    let applications = within(
        state.config.storage_timeout,
        state.applications.applications_for_record(&id),
    )
    .await?;

    Ok(Json(RuleHistoryResponse {
        receipt_id: id,
        rule_applications: applications.into_iter().map(ApplicationResponse::from).collect(),
    }))
}
