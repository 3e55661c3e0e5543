//! # Request Body Extraction & Validation
//!
//! Rule payloads implement [`Validate`]; receipt payloads must be JSON
//! objects and are unwrapped into a [`Record`].

use axum::extract::rejection::JsonRejection;
use axum::Json;
use receiptor_rules::Record;
use serde_json::Value;

use crate::error::AppError;

/// Business-rule validation beyond what serde checks.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and run its [`Validate`] impl.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Extract a receipt body. Anything but a JSON object is a validation error.
pub fn extract_record(result: Result<Json<Value>, JsonRejection>) -> Result<Record, AppError> {
    let value = extract_json(result)?;
    Record::from_value(value)
        .ok_or_else(|| AppError::Validation("receipt must be a JSON object".to_string()))
}
