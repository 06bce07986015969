//! Field extraction from raw movie records.
//!
//! Raw records are JSON objects whose fields are loosely typed: numbers may
//! arrive as strings, years as floats, and genre lists as real arrays,
//! stringified lists (`"['Drama', 'Crime']"`) or delimited text
//! (`"Drama, Crime"`). Every coercion here has a fallback; only a payload
//! that is not a JSON object at all is an error.

use crate::error::{IndexError, Result};
use crate::types::{Movie, NumericValues};
use serde_json::{Map, Value};

// Source field names
pub const ID_FIELD: &str = "id";
pub const TITLE_FIELD: &str = "title";
pub const ACTOR_FIELD: &str = "Star1";
pub const DIRECTOR_FIELD: &str = "Director";
pub const LANGUAGE_FIELD: &str = "original_language";
pub const YEAR_FIELD: &str = "release_year";
pub const GENRES_FIELD: &str = "genres_list";
pub const COUNTRIES_FIELD: &str = "production_countries";
pub const RATING_FIELD: &str = "vote_average";
pub const EXTERNAL_RATING_FIELD: &str = "IMDB_Rating";
pub const BUDGET_FIELD: &str = "budget";
pub const REVENUE_FIELD: &str = "revenue";
pub const RUNTIME_FIELD: &str = "runtime";
pub const POPULARITY_FIELD: &str = "popularity";
pub const VOTE_COUNT_FIELD: &str = "vote_count";

/// Parse a stored payload into a [`Movie`].
///
/// Fails only when the payload is not a JSON object; individual fields never
/// fail.
pub fn parse_record(key: &str, payload: &[u8]) -> Result<Movie> {
    let value: Value = serde_json::from_slice(payload).map_err(|e| IndexError::MalformedRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })?;

    match value {
        Value::Object(fields) => Ok(extract_movie(key, &fields)),
        other => Err(IndexError::MalformedRecord {
            key: key.to_string(),
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
    }
}

/// Derive the attribute bundle from an already-decoded record.
pub fn extract_movie(key: &str, fields: &Map<String, Value>) -> Movie {
    Movie {
        key: key.to_string(),
        id: identifier(fields.get(ID_FIELD)),
        title: text(fields.get(TITLE_FIELD)),
        actor: text(fields.get(ACTOR_FIELD)),
        director: text(fields.get(DIRECTOR_FIELD)),
        language: text(fields.get(LANGUAGE_FIELD)),
        year: parse_year(fields.get(YEAR_FIELD)),
        genres: ListField::from_value(fields.get(GENRES_FIELD)).into_values(),
        countries: ListField::from_value(fields.get(COUNTRIES_FIELD)).into_values(),
        numbers: NumericValues {
            rating: coerce_number(fields.get(RATING_FIELD)),
            external_rating: coerce_number(fields.get(EXTERNAL_RATING_FIELD)),
            budget: coerce_number(fields.get(BUDGET_FIELD)),
            revenue: coerce_number(fields.get(REVENUE_FIELD)),
            runtime: coerce_number(fields.get(RUNTIME_FIELD)),
            popularity: coerce_number(fields.get(POPULARITY_FIELD)),
            vote_count: coerce_number(fields.get(VOTE_COUNT_FIELD)),
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Trimmed, non-empty string value.
fn text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

fn identifier(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Number(n)) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
        ),
        other => text(other),
    }
}

/// Coerce a loosely typed value to `f64`.
///
/// Missing, empty, `"nan"`, non-numeric and non-finite input all become
/// `0.0`.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Parse a release year.
///
/// Accepts integers, floats (truncated) and digit-only strings. Anything
/// else is "no year".
pub fn parse_year(value: Option<&Value>) -> Option<i32> {
    match value? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok()
            } else {
                let f = n.as_f64()?.trunc();
                (f.is_finite() && f >= i32::MIN as f64 && f <= i32::MAX as f64).then(|| f as i32)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                trimmed.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

// =============================================================================
// List fields
// =============================================================================

/// The shapes a multi-valued field arrives in.
#[derive(Debug, Clone, PartialEq)]
pub enum ListField {
    /// A native array, or a stringified list that parsed
    List(Vec<String>),
    /// Plain text split on `,` or `|`
    DelimitedString(String),
    Empty,
}

impl ListField {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Array(items)) => {
                ListField::List(items.iter().filter_map(list_item).collect())
            }
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    ListField::Empty
                } else if trimmed.starts_with('[') {
                    parse_list_literal(trimmed).map_or(ListField::Empty, ListField::List)
                } else {
                    ListField::DelimitedString(trimmed.to_string())
                }
            }
            _ => ListField::Empty,
        }
    }

    /// Trimmed, non-empty, de-duplicated values in first-seen order.
    pub fn into_values(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            ListField::List(items) => items,
            ListField::DelimitedString(s) => s
                .split([',', '|'])
                .map(str::to_string)
                .collect(),
            ListField::Empty => Vec::new(),
        };

        let mut values: Vec<String> = Vec::with_capacity(raw.len());
        for item in raw {
            let item = item.trim();
            if !item.is_empty() && !values.iter().any(|v| v == item) {
                values.push(item.to_string());
            }
        }
        values
    }
}

fn list_item(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Parse a serialized list: JSON first, then a Python-style literal with
/// single- or double-quoted string items. `None` when neither applies.
fn parse_list_literal(s: &str) -> Option<Vec<String>> {
    if let Ok(items) = serde_json::from_str::<Vec<Value>>(s) {
        return Some(items.iter().filter_map(list_item).collect());
    }
    parse_quoted_list(s)
}

fn parse_quoted_list(s: &str) -> Option<Vec<String>> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?;
    let mut chars = inner.chars().peekable();
    let mut items = Vec::new();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(quote) = chars.next() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return None;
        }

        let mut item = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => item.push(chars.next()?),
                c if c == quote => {
                    closed = true;
                    break;
                }
                c => item.push(c),
            }
        }
        if !closed {
            return None;
        }
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return None,
        }
    }
    Some(items)
}
