//! Field descriptors: coercion, validation and default rules for one document attribute.
//!
//! A [`Field`] is declared with one of the kind constructors ([`Field::text`],
//! [`Field::integer`], ...) plus optional settings, then bound to a name when
//! its schema is built. Binding coerces the declared default and bounds once,
//! so resolving a default later can never fail.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::errors::{SchemaError, ValidationError, ValidationResult};
use crate::preprocessors::Preprocessor;
use crate::value::{DATE_FORMAT, DATETIME_FORMAT, FieldKind, FieldValue, Value, format_numeric};

/// Largest integer the backend's numeric index represents exactly.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;
pub const MIN_SAFE_INTEGER: i64 = -MAX_SAFE_INTEGER;

const TRUE_WORDS: &[&str] = &["true", "1", "yes", "on"];
const FALSE_WORDS: &[&str] = &["false", "0", "no", "off", ""];

#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
    declared_default: Option<Value>,
    default: FieldValue,
    declared_minimum: Option<Value>,
    declared_maximum: Option<Value>,
    minimum: Option<FieldValue>,
    maximum: Option<FieldValue>,
    preprocessor: Option<Preprocessor>,
}

impl Field {
    fn of(kind: FieldKind) -> Self {
        Self {
            name: String::new(),
            kind,
            declared_default: None,
            default: kind.zero(),
            declared_minimum: None,
            declared_maximum: None,
            minimum: None,
            maximum: None,
            preprocessor: None,
        }
    }

    /// Tokenized full-text field.
    pub fn text() -> Self {
        Self::of(FieldKind::Text)
    }

    /// String field matched as a whole.
    pub fn atom() -> Self {
        Self::of(FieldKind::Atom)
    }

    pub fn integer() -> Self {
        Self::of(FieldKind::Integer)
    }

    pub fn float() -> Self {
        Self::of(FieldKind::Float)
    }

    pub fn boolean() -> Self {
        Self::of(FieldKind::Boolean)
    }

    pub fn date() -> Self {
        Self::of(FieldKind::Date)
    }

    #[inline]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.declared_default = Some(value.into());
        self
    }

    /// Inclusive lower bound (integer and float fields only).
    #[inline]
    pub fn with_minimum(mut self, value: impl Into<Value>) -> Self {
        self.declared_minimum = Some(value.into());
        self
    }

    /// Inclusive upper bound (integer and float fields only).
    #[inline]
    pub fn with_maximum(mut self, value: impl Into<Value>) -> Self {
        self.declared_maximum = Some(value.into());
        self
    }

    #[inline]
    pub fn with_range(self, minimum: impl Into<Value>, maximum: impl Into<Value>) -> Self {
        self.with_minimum(minimum).with_maximum(maximum)
    }

    /// Text preprocessor run on every assigned value (text fields only).
    #[inline]
    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn minimum(&self) -> Option<&FieldValue> {
        self.minimum.as_ref()
    }

    pub fn maximum(&self) -> Option<&FieldValue> {
        self.maximum.as_ref()
    }

    pub fn preprocessor(&self) -> Option<&Preprocessor> {
        self.preprocessor.as_ref()
    }

    /// Whether a default was declared (as opposed to falling back to the kind's zero value).
    pub fn has_declared_default(&self) -> bool {
        self.declared_default.is_some()
    }

    /// The value an unset field resolves to.
    pub fn resolve_default(&self) -> FieldValue {
        self.default.clone()
    }

    /// Attach this field to `name`, checking its options and coercing its default and bounds.
    pub(crate) fn bind(&self, name: &str) -> Result<Field, SchemaError> {
        let mut field = self.clone();
        field.name = name.to_string();
        field.default = field.kind.zero();
        field.minimum = None;
        field.maximum = None;

        let has_bounds = field.declared_minimum.is_some() || field.declared_maximum.is_some();
        if has_bounds && !matches!(field.kind, FieldKind::Integer | FieldKind::Float) {
            return Err(field.invalid_option(format!("bounds are not supported on {} fields", field.kind)));
        }
        if field.preprocessor.is_some() && field.kind != FieldKind::Text {
            return Err(field.invalid_option(format!("preprocessors are not supported on {} fields", field.kind)));
        }

        if let Some(raw) = field.declared_minimum.clone() {
            let bound = field.coerce_bound(raw)?;
            field.minimum = Some(bound);
        }
        if let Some(raw) = field.declared_maximum.clone() {
            let bound = field.coerce_bound(raw)?;
            field.maximum = Some(bound);
        }
        if let (Some(minimum), Some(maximum)) = (&field.minimum, &field.maximum)
            && compare_numeric(minimum, maximum).is_some_and(|ordering| ordering.is_gt())
        {
            return Err(field.invalid_option(format!("minimum {minimum} is greater than maximum {maximum}")));
        }

        if let Some(raw) = field.declared_default.clone() {
            let default = field.clean(raw).map_err(|source| SchemaError::InvalidDefault {
                field: field.name.clone(),
                source,
            })?;
            field.default = default;
        }

        Ok(field)
    }

    /// Convert a raw input into this field's canonical kind.
    ///
    /// `Value::Null` resolves to the field's default. Text fields run their
    /// preprocessor unless the input is already tokenized.
    pub fn coerce(&self, raw: Value) -> ValidationResult<FieldValue> {
        self.coerce_with(raw, true)
    }

    /// Check kind-specific constraints, returning the value unchanged.
    pub fn validate(&self, value: FieldValue) -> ValidationResult<FieldValue> {
        match (self.kind, &value) {
            (FieldKind::Text | FieldKind::Atom, FieldValue::Text(_))
            | (FieldKind::Boolean, FieldValue::Boolean(_))
            | (FieldKind::Date, FieldValue::Date(_)) => Ok(value),
            (FieldKind::Integer, FieldValue::Integer(number)) => {
                if !(MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(number) {
                    return Err(self.issue(
                        "out_of_range",
                        format!("{number} is outside the backend's numeric range"),
                    ));
                }
                self.check_bounds(value)
            }
            (FieldKind::Float, FieldValue::Float(number)) => {
                if !number.is_finite() {
                    return Err(self.issue("not_finite", format!("{number} is not a finite number")));
                }
                self.check_bounds(value)
            }
            (kind, other) => Err(self.issue(
                "invalid_type",
                format!("expected a {kind} value, got {}", other.type_name()),
            )),
        }
    }

    /// `coerce` followed by `validate`: the path every assigned value takes.
    pub fn clean(&self, raw: Value) -> ValidationResult<FieldValue> {
        let value = self.coerce(raw)?;
        self.validate(value)
    }

    /// Like [`Field::clean`] but never runs the text preprocessor: filter values
    /// are compared against tokens that were produced at indexing time.
    pub fn coerce_for_filter(&self, raw: Value) -> ValidationResult<FieldValue> {
        let value = self.coerce_with(raw, false)?;
        self.validate(value)
    }

    /// Normalize a value that came back from the backend.
    ///
    /// No preprocessing and no constraint checks: the value was valid when it
    /// was stored. Values of another kind (backends that hand back strings) are
    /// coerced; dates lose any time component.
    pub fn rehydrate(&self, value: FieldValue) -> ValidationResult<FieldValue> {
        match (self.kind, &value) {
            (FieldKind::Text | FieldKind::Atom, FieldValue::Text(_))
            | (FieldKind::Integer, FieldValue::Integer(_))
            | (FieldKind::Float, FieldValue::Float(_))
            | (FieldKind::Boolean, FieldValue::Boolean(_))
            | (FieldKind::Date, FieldValue::Date(_)) => Ok(value),
            _ => self.coerce_with(Value::from(value), false),
        }
    }

    fn coerce_with(&self, raw: Value, preprocess: bool) -> ValidationResult<FieldValue> {
        if raw.is_null() {
            return Ok(self.resolve_default());
        }
        match self.kind {
            FieldKind::Text => self.coerce_text(raw, preprocess),
            FieldKind::Atom => match raw {
                Value::Tokens(tokens) => Ok(FieldValue::Text(tokens.join(" "))),
                other => self.plain_text(other).map(FieldValue::Text),
            },
            FieldKind::Integer => self.coerce_integer(raw),
            FieldKind::Float => self.coerce_float(raw),
            FieldKind::Boolean => self.coerce_boolean(raw),
            FieldKind::Date => self.coerce_date(raw),
        }
    }

    fn coerce_text(&self, raw: Value, preprocess: bool) -> ValidationResult<FieldValue> {
        let text = match raw {
            Value::Tokens(tokens) => return Ok(FieldValue::Text(tokens.join(" "))),
            other => self.plain_text(other)?,
        };
        match (&self.preprocessor, preprocess) {
            (Some(preprocessor), true) => Ok(FieldValue::Text(preprocessor.apply(&text).join(" "))),
            _ => Ok(FieldValue::Text(text)),
        }
    }

    fn plain_text(&self, raw: Value) -> ValidationResult<String> {
        match raw {
            Value::Text(text) => Ok(text),
            Value::Tokens(tokens) => Ok(tokens.join(" ")),
            Value::Integer(number) => Ok(number.to_string()),
            Value::Float(number) => Ok(format_numeric(number)),
            Value::Boolean(flag) => Ok(flag.to_string()),
            Value::Date(date) => Ok(date.format(DATE_FORMAT).to_string()),
            Value::DateTime(datetime) => Ok(datetime.format(DATETIME_FORMAT).to_string()),
            Value::Null => Ok(String::new()),
        }
    }

    fn coerce_integer(&self, raw: Value) -> ValidationResult<FieldValue> {
        let number = match raw {
            Value::Integer(number) => number,
            Value::Float(number) => self.integral(number)?,
            Value::Boolean(flag) => i64::from(flag),
            Value::Text(ref text) => {
                let trimmed = text.trim();
                match trimmed.parse::<i64>() {
                    Ok(number) => number,
                    Err(_) => {
                        let parsed = trimmed
                            .parse::<f64>()
                            .map_err(|_| self.not_convertible(&raw))?;
                        self.integral(parsed)?
                    }
                }
            }
            other => return Err(self.not_convertible(&other)),
        };
        Ok(FieldValue::Integer(number))
    }

    fn integral(&self, number: f64) -> ValidationResult<i64> {
        let in_range = number >= MIN_SAFE_INTEGER as f64 && number <= MAX_SAFE_INTEGER as f64;
        if number.fract() != 0.0 || !in_range {
            return Err(self.issue("invalid_type", format!("{number} is not a whole number")));
        }
        Ok(number as i64)
    }

    fn coerce_float(&self, raw: Value) -> ValidationResult<FieldValue> {
        match raw {
            Value::Float(number) => Ok(FieldValue::Float(number)),
            Value::Integer(number) => Ok(FieldValue::Float(number as f64)),
            Value::Text(ref text) => text
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| self.not_convertible(&raw)),
            other => Err(self.not_convertible(&other)),
        }
    }

    fn coerce_boolean(&self, raw: Value) -> ValidationResult<FieldValue> {
        match raw {
            Value::Boolean(flag) => Ok(FieldValue::Boolean(flag)),
            Value::Integer(number) => Ok(FieldValue::Boolean(number != 0)),
            Value::Text(ref text) => {
                let lowered = text.trim().to_ascii_lowercase();
                if TRUE_WORDS.contains(&lowered.as_str()) {
                    Ok(FieldValue::Boolean(true))
                } else if FALSE_WORDS.contains(&lowered.as_str()) {
                    Ok(FieldValue::Boolean(false))
                } else {
                    Err(self.not_convertible(&raw))
                }
            }
            other => Err(self.not_convertible(&other)),
        }
    }

    fn coerce_date(&self, raw: Value) -> ValidationResult<FieldValue> {
        match raw {
            Value::Date(date) => Ok(FieldValue::Date(date)),
            Value::DateTime(datetime) => Ok(FieldValue::Date(datetime.date())),
            Value::Text(ref text) => parse_date(text.trim())
                .map(FieldValue::Date)
                .ok_or_else(|| self.not_convertible(&raw)),
            other => Err(self.not_convertible(&other)),
        }
    }

    fn coerce_bound(&self, raw: Value) -> Result<FieldValue, SchemaError> {
        self.coerce_with(raw, false)
            .and_then(|value| match value {
                FieldValue::Float(number) if !number.is_finite() => {
                    Err(self.issue("not_finite", format!("{number} is not a finite bound")))
                }
                other => Ok(other),
            })
            .map_err(|err| self.invalid_option(format!("invalid bound: {err}")))
    }

    fn check_bounds(&self, value: FieldValue) -> ValidationResult<FieldValue> {
        if let Some(minimum) = &self.minimum
            && compare_numeric(&value, minimum).is_some_and(|ordering| ordering.is_lt())
        {
            return Err(self.issue("out_of_range", format!("{value} is below the minimum {minimum}")));
        }
        if let Some(maximum) = &self.maximum
            && compare_numeric(&value, maximum).is_some_and(|ordering| ordering.is_gt())
        {
            return Err(self.issue("out_of_range", format!("{value} is above the maximum {maximum}")));
        }
        Ok(value)
    }

    fn not_convertible(&self, raw: &Value) -> ValidationError {
        let shown = match raw {
            Value::Text(text) => format!("'{text}'"),
            other => other.type_name().to_string(),
        };
        self.issue("invalid_type", format!("cannot convert {shown} to {}", self.kind))
    }

    fn issue(&self, code: &str, message: String) -> ValidationError {
        ValidationError::single(self.name.as_str(), code, message)
    }

    fn invalid_option(&self, message: String) -> SchemaError {
        SchemaError::InvalidOption {
            field: self.name.clone(),
            message,
        }
    }
}

fn compare_numeric(left: &FieldValue, right: &FieldValue) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
        _ => left.to_numeric()?.partial_cmp(&right.to_numeric()?),
    }
}

/// Accepts `YYYY-MM-DDTHH:MM:SS`, RFC 3339 and `YYYY-MM-DD`; date-times are truncated.
fn parse_date(text: &str) -> Option<NaiveDate> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(text, DATETIME_FORMAT) {
        return Some(datetime.date());
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.with_timezone(&Utc).date_naive());
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}
