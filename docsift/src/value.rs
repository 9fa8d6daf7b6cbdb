//! Raw inputs accepted by fields and the canonical values they produce.
//!
//! A [`Value`] is whatever a caller hands to a document: text, numbers, dates,
//! date-times, or nothing at all. Fields coerce it into a [`FieldValue`] of
//! their declared [`FieldKind`], which is what documents store and what the
//! backend receives.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The closed set of field kinds a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Tokenized full-text.
    Text,
    /// A string matched as a whole, never tokenized.
    Atom,
    Integer,
    Float,
    Boolean,
    /// A calendar date; any time component is dropped.
    Date,
}

impl FieldKind {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Atom => "atom",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
        }
    }

    /// True for kinds the backend indexes as numbers (and therefore supports range lookups).
    #[inline]
    pub const fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Float | FieldKind::Date)
    }

    /// The value an unset field of this kind resolves to when no default is configured.
    pub fn zero(self) -> FieldValue {
        match self {
            FieldKind::Text | FieldKind::Atom => FieldValue::Text(String::new()),
            FieldKind::Integer => FieldValue::Integer(0),
            FieldKind::Float => FieldValue::Float(0.0),
            FieldKind::Boolean => FieldValue::Boolean(false),
            FieldKind::Date => FieldValue::Date(NaiveDate::default()),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw, not-yet-coerced input value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value supplied; the field resolves to its default.
    Null,
    Text(String),
    /// Text that has already been through a preprocessor and must not be tokenized again.
    Tokens(Vec<String>),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Build an already-tokenized text value.
    pub fn tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Tokens(tokens.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Tokens(_) => "tokens",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

/// Zone-aware date-times are normalized to UTC before their naive form is taken.
impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(value: DateTime<Tz>) -> Self {
        Value::DateTime(value.naive_utc())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(text) => Value::Text(text),
            FieldValue::Integer(number) => Value::Integer(number),
            FieldValue::Float(number) => Value::Float(number),
            FieldValue::Boolean(flag) => Value::Boolean(flag),
            FieldValue::Date(date) => Value::Date(date),
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Boolean(*flag),
            JsonValue::Number(number) => match number.as_i64() {
                Some(integer) => Value::Integer(integer),
                None => number.as_f64().map_or(Value::Null, Value::Float),
            },
            JsonValue::String(text) => Value::Text(text.clone()),
            JsonValue::Array(items) => Value::Tokens(
                items
                    .iter()
                    .map(|item| match item {
                        JsonValue::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            JsonValue::Object(_) => Value::Text(value.to_string()),
        }
    }
}

/// A coerced, validated value of a known kind.
///
/// Text and atom fields both store [`FieldValue::Text`]; the owning field's
/// kind decides how the backend indexes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Date(_) => "date",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Numeric representation used by range queries. Dates compare as Unix seconds at midnight UTC.
    pub fn to_numeric(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(number) => Some(*number as f64),
            FieldValue::Float(number) => Some(*number),
            FieldValue::Date(date) => Some(date_to_timestamp(*date) as f64),
            FieldValue::Boolean(_) | FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Integer(number) => write!(f, "{number}"),
            FieldValue::Float(number) => f.write_str(&format_numeric(*number)),
            FieldValue::Boolean(flag) => write!(f, "{flag}"),
            FieldValue::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
        }
    }
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Seconds since the Unix epoch at midnight UTC of `date`.
pub fn date_to_timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Inverse of [`date_to_timestamp`]; any time-of-day component is dropped.
pub fn timestamp_to_date(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|datetime| datetime.date_naive())
}

/// Render a number without a trailing `.0` when it is integral.
pub fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn dates_round_trip_through_timestamps() {
        let date = NaiveDate::from_ymd_opt(1988, 7, 15).expect("valid date");
        let timestamp = date_to_timestamp(date);
        assert_eq!(timestamp, 584_928_000);
        assert_eq!(timestamp_to_date(timestamp), Some(date));
        assert_eq!(timestamp_to_date(timestamp + 3_600), Some(date));
    }

    #[test]
    fn zero_values_per_kind() {
        assert_eq!(FieldKind::Text.zero(), FieldValue::Text(String::new()));
        assert_eq!(FieldKind::Integer.zero(), FieldValue::Integer(0));
        assert_eq!(FieldKind::Boolean.zero(), FieldValue::Boolean(false));
        assert_eq!(
            FieldKind::Date.zero(),
            FieldValue::Date(NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid date"))
        );
    }

    #[test]
    fn aware_datetimes_become_naive_utc() {
        let aware = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).single().expect("valid datetime");
        match Value::from(aware) {
            Value::DateTime(naive) => assert_eq!(naive.to_string(), "2024-03-09 23:30:00"),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn json_values_map_to_raw_values() {
        let json = serde_json::json!({"n": 3, "x": 2.5, "s": "hi", "t": ["a", "b"], "z": null});
        assert_eq!(Value::from(&json["n"]), Value::Integer(3));
        assert_eq!(Value::from(&json["x"]), Value::Float(2.5));
        assert_eq!(Value::from(&json["s"]), Value::Text("hi".to_string()));
        assert_eq!(Value::from(&json["t"]), Value::tokens(["a", "b"]));
        assert!(Value::from(&json["z"]).is_null());
    }

    #[test]
    fn display_uses_backend_friendly_forms() {
        assert_eq!(FieldValue::Float(4.0).to_string(), "4");
        assert_eq!(FieldValue::Float(4.25).to_string(), "4.25");
        let date = NaiveDate::from_ymd_opt(2001, 2, 3).expect("valid date");
        assert_eq!(FieldValue::Date(date).to_string(), "2001-02-03");
    }
}
