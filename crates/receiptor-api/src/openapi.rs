//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Static bearer token. Set via the AUTH_TOKEN env var.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Receiptor Rules API",
        version = "0.1.0",
        description = "Per-user receipt automation rules.\n\nProvides:\n- **Rule management** with ownership scoping\n- **Dry runs** of a rule against recent receipts\n- **Rule suggestions** mined from receipt history\n- **Receipt ingest** that applies active rules and records history\n\nEvery `/v1/*` request names its user in the `X-User-Id` header. When `AUTH_TOKEN` is set, `Authorization: Bearer <token>` is also required.",
        license(name = "AGPL-3.0-or-later")
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::rules::create_rule,
        crate::routes::rules::list_rules,
        crate::routes::rules::suggest_rules,
        crate::routes::rules::get_rule,
        crate::routes::rules::update_rule,
        crate::routes::rules::delete_rule,
        crate::routes::rules::test_rule,
        crate::routes::receipts::ingest_receipt,
        crate::routes::receipts::get_receipt,
        crate::routes::receipts::apply_rules,
        crate::routes::receipts::rule_history,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::rules::RuleRequest,
        crate::routes::rules::RuleResponse,
        crate::routes::rules::SuggestionsResponse,
        crate::routes::rules::TestResult,
        crate::routes::rules::TestRuleResponse,
        crate::routes::receipts::ReceiptDocument,
        crate::routes::receipts::MatchResponse,
        crate::routes::receipts::IngestResponse,
        crate::routes::receipts::ApplyRulesResponse,
        crate::routes::receipts::ApplicationResponse,
        crate::routes::receipts::RuleHistoryResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "rules", description = "Rule management, dry runs and suggestions"),
        (name = "receipts", description = "Receipt ingest and rule application history"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/v1/rules",
            "/v1/rules/suggestions",
            "/v1/rules/{id}",
            "/v1/rules/{id}/test",
            "/v1/receipts",
            "/v1/receipts/{id}",
            "/v1/receipts/{id}/apply-rules",
            "/v1/receipts/{id}/rule-history",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn document_has_schemas_and_security() {
        let doc = ApiDoc::openapi();
        let components = doc.components.as_ref().unwrap();
        for name in ["RuleResponse", "TestRuleResponse", "IngestResponse", "ErrorBody"] {
            assert!(components.schemas.contains_key(name), "missing schema {name}");
        }
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
