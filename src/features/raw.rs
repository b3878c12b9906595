// src/features/raw.rs
//! Typed view of a loosely-typed request body.
//!
//! Requests arrive as JSON objects whose values may be strings, numbers or
//! booleans for the same field depending on the client. `RawInput` keeps the
//! primitive as sent and offers the coercions the normalizer needs; nested
//! values are rejected at construction.

use log::debug;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use super::schema::FeatureSchema;
use crate::error::PredictionError;

/// Request fields read outside the feature schema.
const CONTROL_FIELDS: [&str; 5] = ["subject", "gender", "G1", "G2", "G3"];

/// Whether the normalizer, the prediction engine or the feedback recorder
/// reads `field`.
fn is_consumed(field: &str) -> bool {
    CONTROL_FIELDS.contains(&field)
        || FeatureSchema::base()
            .features()
            .iter()
            .any(|spec| !spec.source.is_empty() && spec.source == field)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl RawValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// The empty string. Whitespace-only text is not blank.
    pub fn is_blank(&self) -> bool {
        matches!(self, RawValue::Text(text) if text.is_empty())
    }

    /// Float coercion. Booleans count as 0/1; text must parse as a finite number.
    pub fn to_number(&self) -> Option<f64> {
        let value = match self {
            RawValue::Number(n) => *n,
            RawValue::Flag(flag) => {
                if *flag {
                    1.0
                } else {
                    0.0
                }
            }
            RawValue::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    /// Integer coercion. Numbers are truncated toward zero; text must be an
    /// integer literal.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            RawValue::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            RawValue::Number(_) => None,
            RawValue::Flag(flag) => Some(i64::from(*flag)),
            RawValue::Text(text) => text.trim().parse::<i64>().ok(),
        }
    }

    /// `"yes"`, `"1"`, the number 1 and `true` are affirmative.
    pub fn is_affirmative(&self) -> bool {
        match self {
            RawValue::Text(text) => text == "yes" || text == "1",
            RawValue::Number(n) => *n == 1.0,
            RawValue::Flag(flag) => *flag,
        }
    }

    fn from_json(field: &str, value: &JsonValue) -> Result<Option<Self>, PredictionError> {
        match value {
            JsonValue::Null => Ok(None),
            JsonValue::Bool(flag) => Ok(Some(RawValue::Flag(*flag))),
            JsonValue::String(text) => Ok(Some(RawValue::Text(text.clone()))),
            JsonValue::Number(number) => number
                .as_f64()
                .map(|n| Some(RawValue::Number(n)))
                .ok_or_else(|| {
                    PredictionError::validation(format!("Field '{}' is not a valid number", field))
                }),
            JsonValue::Array(_) | JsonValue::Object(_) => Err(PredictionError::validation(format!(
                "Field '{}' must be a string, number or boolean",
                field
            ))),
        }
    }
}

impl From<&str> for RawValue {
    fn from(text: &str) -> Self {
        RawValue::Text(text.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<bool> for RawValue {
    fn from(flag: bool) -> Self {
        RawValue::Flag(flag)
    }
}

/// One request's fields. Missing keys are a normal state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    fields: BTreeMap<String, RawValue>,
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the typed view from a JSON object body. `null` values are
    /// treated as absent. Nested values are rejected on fields that are read
    /// and dropped everywhere else.
    pub fn from_json(body: &JsonValue) -> Result<Self, PredictionError> {
        let object = body
            .as_object()
            .ok_or_else(|| PredictionError::validation("Request body must be a JSON object"))?;

        let mut fields = BTreeMap::new();
        for (field, value) in object {
            if (value.is_array() || value.is_object()) && !is_consumed(field) {
                debug!("Ignoring nested value for unread field '{}'", field);
                continue;
            }
            if let Some(raw) = RawValue::from_json(field, value)? {
                fields.insert(field.clone(), raw);
            }
        }
        Ok(Self { fields })
    }

    /// Builder used by callers assembling input programmatically.
    pub fn with(mut self, field: &str, value: impl Into<RawValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<RawValue>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(RawValue::as_text)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Grade that may be omitted. Absent or blank yields `None`; anything
    /// present must be a number or numeric text.
    pub fn optional_grade(&self, field: &str) -> Result<Option<f64>, PredictionError> {
        match self.get(field) {
            None => Ok(None),
            Some(value) if value.is_blank() => Ok(None),
            Some(RawValue::Flag(_)) => Err(invalid_grade(field)),
            Some(value) => value.to_number().map(Some).ok_or_else(|| invalid_grade(field)),
        }
    }

    /// Ground-truth grade for feedback rows: must be present as a JSON number.
    pub fn required_grade(&self, field: &str) -> Result<f64, PredictionError> {
        match self.get(field) {
            Some(RawValue::Number(n)) if n.is_finite() => Ok(*n),
            _ => Err(PredictionError::validation(format!(
                "Missing or invalid {} value",
                field
            ))),
        }
    }
}

fn invalid_grade(field: &str) -> PredictionError {
    PredictionError::validation(format!("{} must be a valid number", field))
}
