//! # Typed Conditions
//!
//! A [`Condition`] is a single predicate over one field of a receipt:
//!
//! ```json
//! {"type": "text", "field": "extracted_data.vendor_name", "operator": "contains", "value": "coffee"}
//! ```
//!
//! The `type`/`operator` pair is parsed once into a [`Predicate`]. Pairs the
//! engine does not understand become [`Predicate::Unsupported`], which keeps
//! the original strings (so stored rules round-trip unchanged) and always
//! evaluates to `false`.
//!
//! ## Evaluation
//!
//! A field that does not resolve is `false` for every operator. Values are
//! never coerced from "missing" to an empty string or zero.
//!
//! - **text**: both sides rendered as text and compared case-insensitively.
//!   `regex` is a case-insensitive search; an invalid pattern is `false`.
//! - **number**: both sides parsed as `f64`. Equality is exact.
//! - **date**: `equals` compares calendar dates. The ordering operators
//!   compare full timestamps, or calendar dates when the expected value is a
//!   bare `YYYY-MM-DD`.
//! - **boolean**: both sides coerced to a boolean.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::Record;

/// Compiled regex size cap for user-supplied patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Operators for `text` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
}

impl TextOperator {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "equals" => Self::Equals,
            "not_equals" => Self::NotEquals,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "regex" => Self::Regex,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Regex => "regex",
        }
    }
}

/// Operators for `number` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl NumberOperator {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "equals" => Self::Equals,
            "not_equals" => Self::NotEquals,
            "greater_than" => Self::GreaterThan,
            "less_than" => Self::LessThan,
            "greater_than_or_equal" => Self::GreaterThanOrEqual,
            "less_than_or_equal" => Self::LessThanOrEqual,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::GreaterThanOrEqual => "greater_than_or_equal",
            Self::LessThanOrEqual => "less_than_or_equal",
        }
    }
}

/// Operators for `date` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateOperator {
    Equals,
    After,
    Before,
    OnOrAfter,
    OnOrBefore,
}

impl DateOperator {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "equals" => Self::Equals,
            "after" => Self::After,
            "before" => Self::Before,
            "on_or_after" => Self::OnOrAfter,
            "on_or_before" => Self::OnOrBefore,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::After => "after",
            Self::Before => "before",
            Self::OnOrAfter => "on_or_after",
            Self::OnOrBefore => "on_or_before",
        }
    }
}

/// Operators for `boolean` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOperator {
    Equals,
    NotEquals,
}

impl BooleanOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "equals" => Some(Self::Equals),
            "not_equals" => Some(Self::NotEquals),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
        }
    }
}

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// The parsed `type` + `operator` of a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Text(TextOperator),
    Number(NumberOperator),
    Date(DateOperator),
    Boolean(BooleanOperator),
    /// A type or operator this engine does not recognize. Always `false`.
    Unsupported { kind: String, operator: String },
}

impl Predicate {
    /// Parse a `type`/`operator` pair. Never fails: unknown pairs become
    /// [`Predicate::Unsupported`].
    pub fn parse(kind: &str, operator: &str) -> Self {
        let parsed = match kind {
            "text" => TextOperator::parse(operator).map(Self::Text),
            "number" => NumberOperator::parse(operator).map(Self::Number),
            "date" => DateOperator::parse(operator).map(Self::Date),
            "boolean" => BooleanOperator::parse(operator).map(Self::Boolean),
            _ => None,
        };
        parsed.unwrap_or_else(|| Self::Unsupported {
            kind: kind.to_string(),
            operator: operator.to_string(),
        })
    }

    /// The condition `type` string.
    pub fn kind(&self) -> &str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Date(_) => "date",
            Self::Boolean(_) => "boolean",
            Self::Unsupported { kind, .. } => kind,
        }
    }

    /// The condition `operator` string.
    pub fn operator(&self) -> &str {
        match self {
            Self::Text(op) => op.as_str(),
            Self::Number(op) => op.as_str(),
            Self::Date(op) => op.as_str(),
            Self::Boolean(op) => op.as_str(),
            Self::Unsupported { operator, .. } => operator,
        }
    }

    /// Whether the engine understands this predicate.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported { .. })
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A single typed predicate over one field of a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCondition", into = "RawCondition")]
pub struct Condition {
    /// Dotted path into the receipt, e.g. `extracted_data.total_amount`.
    pub field: String,
    pub predicate: Predicate,
    /// The expected value the resolved field is compared against.
    pub value: Value,
}

/// Wire shape of a condition. Missing keys deserialize as empty strings /
/// `null` so malformed stored conditions load (and evaluate to `false`)
/// instead of failing the whole rule.
#[derive(Serialize, Deserialize)]
struct RawCondition {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    field: String,
    #[serde(default)]
    operator: String,
    #[serde(default)]
    value: Value,
}

impl From<RawCondition> for Condition {
    fn from(raw: RawCondition) -> Self {
        Self {
            predicate: Predicate::parse(&raw.kind, &raw.operator),
            field: raw.field,
            value: raw.value,
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        Self {
            kind: condition.predicate.kind().to_string(),
            operator: condition.predicate.operator().to_string(),
            field: condition.field,
            value: condition.value,
        }
    }
}

impl Condition {
    pub fn new(field: impl Into<String>, predicate: Predicate, value: Value) -> Self {
        Self {
            field: field.into(),
            predicate,
            value,
        }
    }

    pub fn text(field: impl Into<String>, op: TextOperator, value: impl Into<Value>) -> Self {
        Self::new(field, Predicate::Text(op), value.into())
    }

    pub fn number(field: impl Into<String>, op: NumberOperator, value: impl Into<Value>) -> Self {
        Self::new(field, Predicate::Number(op), value.into())
    }

    pub fn date(field: impl Into<String>, op: DateOperator, value: impl Into<Value>) -> Self {
        Self::new(field, Predicate::Date(op), value.into())
    }

    pub fn boolean(field: impl Into<String>, op: BooleanOperator, value: impl Into<Value>) -> Self {
        Self::new(field, Predicate::Boolean(op), value.into())
    }

    /// Evaluate this condition against a record. Never panics, never errors.
    pub fn evaluate(&self, record: &Record) -> bool {
        let Some(actual) = record.get(&self.field) else {
            return false;
        };

        match &self.predicate {
            Predicate::Text(op) => evaluate_text(*op, actual, &self.value),
            Predicate::Number(op) => evaluate_number(*op, actual, &self.value),
            Predicate::Date(op) => evaluate_date(*op, actual, &self.value),
            Predicate::Boolean(op) => evaluate_boolean(*op, actual, &self.value),
            Predicate::Unsupported { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Typed evaluators
// ---------------------------------------------------------------------------

/// Render a JSON value as text: strings verbatim, everything else as JSON.
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn evaluate_text(op: TextOperator, actual: &Value, expected: &Value) -> bool {
    if op == TextOperator::Regex {
        return RegexBuilder::new(&as_text(expected))
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map(|re| re.is_match(&as_text(actual)))
            .unwrap_or(false);
    }

    let actual = as_text(actual).to_lowercase();
    let expected = as_text(expected).to_lowercase();
    match op {
        TextOperator::Equals => actual == expected,
        TextOperator::NotEquals => actual != expected,
        TextOperator::Contains => actual.contains(&expected),
        TextOperator::NotContains => !actual.contains(&expected),
        TextOperator::StartsWith => actual.starts_with(&expected),
        TextOperator::EndsWith => actual.ends_with(&expected),
        TextOperator::Regex => false,
    }
}

/// Parse a JSON number or numeric string. Booleans and containers fail.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

// Equality is exact f64 comparison; currency amounts that differ in the last
// ulp do not match.
#[allow(clippy::float_cmp)]
fn evaluate_number(op: NumberOperator, actual: &Value, expected: &Value) -> bool {
    let (Some(a), Some(e)) = (as_number(actual), as_number(expected)) else {
        return false;
    };
    match op {
        NumberOperator::Equals => a == e,
        NumberOperator::NotEquals => a != e,
        NumberOperator::GreaterThan => a > e,
        NumberOperator::LessThan => a < e,
        NumberOperator::GreaterThanOrEqual => a >= e,
        NumberOperator::LessThanOrEqual => a <= e,
    }
}

/// A parsed point in time, remembering whether it was written as a bare date.
///
/// `at` is normalized to UTC for ordering; `day` is the calendar date as
/// written, before any offset is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Moment {
    at: NaiveDateTime,
    day: NaiveDate,
    date_only: bool,
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn as_moment(value: &Value) -> Option<Moment> {
    let text = value.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Moment {
            at: dt.naive_utc(),
            day: dt.date_naive(),
            date_only: false,
        });
    }
    for format in DATETIME_FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Moment {
                at,
                day: at.date(),
                date_only: false,
            });
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|at| Moment {
            at,
            day: at.date(),
            date_only: true,
        })
}

fn evaluate_date(op: DateOperator, actual: &Value, expected: &Value) -> bool {
    let (Some(actual), Some(expected)) = (as_moment(actual), as_moment(expected)) else {
        return false;
    };

    let ordering = || -> Ordering {
        if expected.date_only {
            actual.day.cmp(&expected.day)
        } else {
            actual.at.cmp(&expected.at)
        }
    };

    match op {
        DateOperator::Equals => actual.day == expected.day,
        DateOperator::After => ordering().is_gt(),
        DateOperator::Before => ordering().is_lt(),
        DateOperator::OnOrAfter => ordering().is_ge(),
        DateOperator::OnOrBefore => ordering().is_le(),
    }
}

/// Coerce a JSON value to a boolean.
///
/// Common textual spellings (`true`/`false`, `yes`/`no`, `on`/`off`,
/// `1`/`0`) are honoured; any other non-empty string is `true`.
fn as_boolean(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "no" | "off" | "0" => false,
            _ => true,
        },
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn evaluate_boolean(op: BooleanOperator, actual: &Value, expected: &Value) -> bool {
    let (a, e) = (as_boolean(actual), as_boolean(expected));
    match op {
        BooleanOperator::Equals => a == e,
        BooleanOperator::NotEquals => a != e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn receipt(extracted: Value) -> Record {
        Record::from_value(json!({
            "id": "r-1",
            "user_id": "u-1",
            "manual_review_needed": false,
            "extracted_data": extracted,
        }))
        .unwrap()
    }

    fn vendor(name: &str) -> Record {
        receipt(json!({"vendor_name": name}))
    }

    fn amount(value: Value) -> Record {
        receipt(json!({"total_amount": value}))
    }

    fn dated(value: &str) -> Record {
        receipt(json!({"date": value}))
    }

    const VENDOR: &str = "extracted_data.vendor_name";
    const AMOUNT: &str = "extracted_data.total_amount";
    const DATE: &str = "extracted_data.date";

    // ── text ─────────────────────────────────────────────────────────

    #[test]
    fn text_contains_is_case_insensitive_both_ways() {
        let c = Condition::text(VENDOR, TextOperator::Contains, "coffee");
        assert!(c.evaluate(&vendor("Blueberry Coffee House")));
        assert!(c.evaluate(&vendor("COFFEE")));

        let upper = Condition::text(VENDOR, TextOperator::Contains, "COFFEE");
        assert!(upper.evaluate(&vendor("coffee shop")));
    }

    #[test]
    fn text_operators() {
        let r = vendor("Acme Office Supply");
        let check = |op, v: &str| Condition::text(VENDOR, op, v).evaluate(&r);

        assert!(check(TextOperator::Equals, "acme office supply"));
        assert!(!check(TextOperator::Equals, "acme"));
        assert!(check(TextOperator::NotEquals, "acme"));
        assert!(check(TextOperator::NotContains, "coffee"));
        assert!(!check(TextOperator::NotContains, "office"));
        assert!(check(TextOperator::StartsWith, "ACME"));
        assert!(!check(TextOperator::StartsWith, "office"));
        assert!(check(TextOperator::EndsWith, "supply"));
        assert!(!check(TextOperator::EndsWith, "acme"));
    }

    #[test]
    fn text_regex_is_case_insensitive_search() {
        let r = vendor("Shell Station #1234");
        assert!(Condition::text(VENDOR, TextOperator::Regex, "shell|chevron").evaluate(&r));
        assert!(Condition::text(VENDOR, TextOperator::Regex, r"#\d+").evaluate(&r));
        assert!(!Condition::text(VENDOR, TextOperator::Regex, "^station").evaluate(&r));
    }

    #[test]
    fn text_regex_keeps_escape_case() {
        // `\D` (non-digit) must not be lowercased into `\d`.
        let r = vendor("1234");
        assert!(!Condition::text(VENDOR, TextOperator::Regex, r"\D").evaluate(&r));
    }

    #[test]
    fn invalid_regex_is_false() {
        let c = Condition::text(VENDOR, TextOperator::Regex, "([unclosed");
        assert!(!c.evaluate(&vendor("([unclosed")));
    }

    #[test]
    fn text_on_non_string_value_uses_json_rendering() {
        let c = Condition::text(AMOUNT, TextOperator::Equals, "12.5");
        assert!(c.evaluate(&amount(json!(12.5))));
    }

    // ── number ───────────────────────────────────────────────────────

    #[test]
    fn number_greater_than_boundary() {
        let c = Condition::number(AMOUNT, NumberOperator::GreaterThan, 1000);
        assert!(!c.evaluate(&amount(json!(1000))));
        assert!(c.evaluate(&amount(json!(1000.01))));
    }

    #[test]
    fn number_operators() {
        let r = amount(json!(50));
        let check = |op, v: f64| Condition::number(AMOUNT, op, v).evaluate(&r);

        assert!(check(NumberOperator::Equals, 50.0));
        assert!(!check(NumberOperator::NotEquals, 50.0));
        assert!(check(NumberOperator::LessThan, 50.5));
        assert!(check(NumberOperator::GreaterThanOrEqual, 50.0));
        assert!(check(NumberOperator::LessThanOrEqual, 50.0));
        assert!(!check(NumberOperator::LessThanOrEqual, 49.99));
    }

    #[test]
    fn number_accepts_numeric_strings() {
        let c = Condition::number(AMOUNT, NumberOperator::Equals, "19.99");
        assert!(c.evaluate(&amount(json!(" 19.99 "))));
    }

    #[test]
    fn number_equality_is_exact() {
        let c = Condition::number(AMOUNT, NumberOperator::Equals, 0.3);
        assert!(!c.evaluate(&amount(json!(0.1 + 0.2))));
    }

    #[test]
    fn number_parse_failure_is_false() {
        let c = Condition::number(AMOUNT, NumberOperator::NotEquals, 10);
        assert!(!c.evaluate(&amount(json!("ten"))));
        assert!(!c.evaluate(&amount(json!(true))));
        let bad_expected = Condition::number(AMOUNT, NumberOperator::LessThan, "lots");
        assert!(!bad_expected.evaluate(&amount(json!(1))));
    }

    // ── date ─────────────────────────────────────────────────────────

    #[test]
    fn date_equals_ignores_time_of_day() {
        let c = Condition::date(DATE, DateOperator::Equals, "2024-01-15");
        assert!(c.evaluate(&dated("2024-01-15T23:59:00")));
        assert!(!c.evaluate(&dated("2024-01-16T00:00:00")));
    }

    #[test]
    fn date_after_bare_date_means_later_day() {
        let c = Condition::date(DATE, DateOperator::After, "2024-01-15");
        assert!(!c.evaluate(&dated("2024-01-15T23:59:00")));
        assert!(c.evaluate(&dated("2024-01-16T00:00:01")));
    }

    #[test]
    fn date_ordering_with_timestamp_uses_full_time() {
        let after = Condition::date(DATE, DateOperator::After, "2024-01-15T12:00:00");
        assert!(after.evaluate(&dated("2024-01-15T23:59:00")));
        assert!(!after.evaluate(&dated("2024-01-15T11:00:00")));

        let on_or_before = Condition::date(DATE, DateOperator::OnOrBefore, "2024-01-15T12:00:00");
        assert!(on_or_before.evaluate(&dated("2024-01-15T12:00:00")));
        assert!(!on_or_before.evaluate(&dated("2024-01-15T12:00:01")));
    }

    #[test]
    fn date_operators_on_bare_dates() {
        let r = dated("2024-03-10");
        let check = |op, v: &str| Condition::date(DATE, op, v).evaluate(&r);

        assert!(check(DateOperator::Before, "2024-03-11"));
        assert!(!check(DateOperator::Before, "2024-03-10"));
        assert!(check(DateOperator::OnOrAfter, "2024-03-10"));
        assert!(check(DateOperator::OnOrBefore, "2024-03-10"));
        assert!(!check(DateOperator::After, "2024-03-10"));
    }

    #[test]
    fn date_accepts_rfc3339_and_space_separator() {
        let c = Condition::date(DATE, DateOperator::Equals, "2024-01-15");
        assert!(c.evaluate(&dated("2024-01-15T08:30:00Z")));
        assert!(c.evaluate(&dated("2024-01-15 08:30:00")));
        assert!(c.evaluate(&dated("2024-01-15T08:30")));
        assert!(c.evaluate(&dated("2024-01-15T08:30:00.250")));
    }

    #[test]
    fn date_equals_uses_the_written_calendar_day() {
        let c = Condition::date(DATE, DateOperator::Equals, "2024-01-15");
        assert!(c.evaluate(&dated("2024-01-15T23:00:00-05:00")));
        assert!(c.evaluate(&dated("2024-01-15T01:00:00+09:00")));
        assert!(!c.evaluate(&dated("2024-01-16T01:00:00+09:00")));

        let on_or_before = Condition::date(DATE, DateOperator::OnOrBefore, "2024-01-15");
        assert!(on_or_before.evaluate(&dated("2024-01-15T23:00:00-05:00")));
    }

    #[test]
    fn date_timestamp_ordering_respects_offsets() {
        let before = Condition::date(DATE, DateOperator::Before, "2024-01-16T03:00:00Z");
        assert!(before.evaluate(&dated("2024-01-15T21:00:00-05:00")));
        assert!(!before.evaluate(&dated("2024-01-15T23:00:00-05:00")));
    }

    #[test]
    fn date_parse_failure_is_false() {
        let c = Condition::date(DATE, DateOperator::Before, "2024-01-15");
        assert!(!c.evaluate(&dated("last tuesday")));
        let bad_expected = Condition::date(DATE, DateOperator::Before, "soon");
        assert!(!bad_expected.evaluate(&dated("2024-01-15")));
    }

    // ── boolean ──────────────────────────────────────────────────────

    #[test]
    fn boolean_equals_and_not_equals() {
        let r = receipt(json!({}));
        let eq = Condition::boolean("manual_review_needed", BooleanOperator::Equals, false);
        let ne = Condition::boolean("manual_review_needed", BooleanOperator::NotEquals, true);
        assert!(eq.evaluate(&r));
        assert!(ne.evaluate(&r));
    }

    #[test]
    fn boolean_coercion() {
        assert!(as_boolean(&json!("yes")));
        assert!(as_boolean(&json!("TRUE")));
        assert!(!as_boolean(&json!("false")));
        assert!(!as_boolean(&json!("")));
        assert!(as_boolean(&json!("anything")));
        assert!(as_boolean(&json!(2)));
        assert!(!as_boolean(&json!(0.0)));
        assert!(!as_boolean(&json!([])));
        assert!(as_boolean(&json!({"k": 1})));
    }

    // ── fail-closed ──────────────────────────────────────────────────

    #[test]
    fn missing_field_is_false_for_every_operator() {
        let r = receipt(json!({}));
        assert!(!Condition::text(VENDOR, TextOperator::NotEquals, "x").evaluate(&r));
        assert!(!Condition::text(VENDOR, TextOperator::NotContains, "x").evaluate(&r));
        assert!(!Condition::number(AMOUNT, NumberOperator::NotEquals, 1).evaluate(&r));
        assert!(!Condition::boolean(VENDOR, BooleanOperator::Equals, false).evaluate(&r));
    }

    #[test]
    fn unknown_type_or_operator_is_false() {
        let r = vendor("Acme");
        let unknown_type = Condition::new(VENDOR, Predicate::parse("geo", "near"), json!("x"));
        let unknown_op = Condition::new(VENDOR, Predicate::parse("text", "sounds_like"), json!("acme"));
        assert!(!unknown_type.evaluate(&r));
        assert!(!unknown_op.evaluate(&r));
        assert!(!unknown_op.predicate.is_supported());
    }

    // ── serde ────────────────────────────────────────────────────────

    #[test]
    fn deserializes_wire_shape() {
        let c: Condition = serde_json::from_value(json!({
            "type": "number",
            "field": AMOUNT,
            "operator": "greater_than",
            "value": 1000
        }))
        .unwrap();
        assert_eq!(c.predicate, Predicate::Number(NumberOperator::GreaterThan));
        assert_eq!(c.field, AMOUNT);
        assert_eq!(c.value, json!(1000));
    }

    #[test]
    fn unsupported_condition_round_trips_unchanged() {
        let wire = json!({"type": "geo", "field": "loc", "operator": "near", "value": [1, 2]});
        let c: Condition = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(c.predicate.kind(), "geo");
        assert_eq!(serde_json::to_value(&c).unwrap(), wire);
    }

    #[test]
    fn missing_keys_load_as_unsupported() {
        let c: Condition = serde_json::from_value(json!({"field": VENDOR})).unwrap();
        assert!(!c.predicate.is_supported());
        assert!(!c.evaluate(&vendor("Acme")));
    }
}
