//! Schema-backed documents.
//!
//! A [`Document`] holds exactly one coerced, validated value per field of its
//! schema. Every write goes through the owning [`Field`](crate::Field), so a
//! document is schema-valid between any two operations.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::backend::{BackendField, RawResult};
use crate::errors::{SchemaError, SearchError, ValidationError, ValidationResult};
use crate::id::generate_doc_id;
use crate::schema::{DocumentType, Schema};
use crate::value::{DATE_FORMAT, FieldKind, FieldValue, Value};

/// Build a list of `(field, value)` pairs for [`Document::create`].
///
/// ```
/// let values = docsift::document! { "title" => "Die Hard", "rating" => 4.5 };
/// assert_eq!(values.len(), 2);
/// ```
#[macro_export]
macro_rules! document {
    () => {
        ::std::vec::Vec::<(&str, $crate::Value)>::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$(($name, $crate::Value::from($value))),+]
    };
}

#[derive(Clone)]
pub struct Document {
    schema: Arc<Schema>,
    doc_id: Option<String>,
    values: Vec<FieldValue>,
}

impl Document {
    /// A document with every field at its default.
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = schema.defaults();
        Self {
            schema,
            doc_id: None,
            values,
        }
    }

    /// An all-defaults document of type `D`.
    pub fn of<D: DocumentType>() -> Result<Self, SchemaError> {
        Ok(Self::new(D::schema()?))
    }

    /// Build a document from `(field, value)` pairs.
    ///
    /// Names not in the schema fail with [`SchemaError::UnknownField`]. Every
    /// value is cleaned by its field and all failures are reported together.
    pub fn create<I, K, V>(schema: Arc<Schema>, doc_id: Option<&str>, values: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut document = Self::new(schema);
        document.doc_id = doc_id.map(str::to_string);
        let mut issues = Vec::new();
        for (name, raw) in values {
            let name = name.as_ref();
            let position = document
                .schema
                .position(name)
                .ok_or_else(|| SchemaError::unknown_field(document.schema.name(), name))?;
            match document.schema.fields()[position].clean(raw.into()) {
                Ok(value) => document.values[position] = value,
                Err(err) => issues.extend(err.issues),
            }
        }
        if !issues.is_empty() {
            return Err(ValidationError::new(issues).into());
        }
        Ok(document)
    }

    /// [`Document::create`] against the registered schema of `D`.
    pub fn build<D, I, K, V>(values: I) -> Result<Self, SearchError>
    where
        D: DocumentType,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Self::create(D::schema()?, None, values)
    }

    pub fn with_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn doc_id(&self) -> Option<&str> {
        self.doc_id.as_deref()
    }

    pub fn set_doc_id(&mut self, doc_id: impl Into<String>) {
        self.doc_id = Some(doc_id.into());
    }

    /// The document id, generating a random one first if none is set.
    pub fn ensure_doc_id(&mut self) -> &str {
        self.doc_id.get_or_insert_with(generate_doc_id)
    }

    /// Values in schema declaration order.
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// `(name, value)` pairs in schema declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.schema.field_names().zip(self.values.iter())
    }

    pub fn get(&self, name: &str) -> Result<&FieldValue, SchemaError> {
        self.schema
            .position(name)
            .map(|idx| &self.values[idx])
            .ok_or_else(|| SchemaError::unknown_field(self.schema.name(), name))
    }

    /// Assign one field. On failure the previous value is left untouched.
    pub fn set(&mut self, name: &str, raw: impl Into<Value>) -> Result<(), SearchError> {
        let position = self
            .schema
            .position(name)
            .ok_or_else(|| SchemaError::unknown_field(self.schema.name(), name))?;
        let value = self.schema.fields()[position].clean(raw.into())?;
        self.values[position] = value;
        Ok(())
    }

    pub fn text(&self, name: &str) -> Result<&str, SchemaError> {
        let value = self.get(name)?;
        value.as_text().ok_or_else(|| mismatch(name, FieldKind::Text, value))
    }

    pub fn integer(&self, name: &str) -> Result<i64, SchemaError> {
        let value = self.get(name)?;
        value.as_integer().ok_or_else(|| mismatch(name, FieldKind::Integer, value))
    }

    pub fn float(&self, name: &str) -> Result<f64, SchemaError> {
        let value = self.get(name)?;
        value.as_float().ok_or_else(|| mismatch(name, FieldKind::Float, value))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, SchemaError> {
        let value = self.get(name)?;
        value.as_boolean().ok_or_else(|| mismatch(name, FieldKind::Boolean, value))
    }

    pub fn date(&self, name: &str) -> Result<NaiveDate, SchemaError> {
        let value = self.get(name)?;
        value.as_date().ok_or_else(|| mismatch(name, FieldKind::Date, value))
    }

    /// Flatten into `(name, kind, value)` triples for a backend.
    pub fn to_backend_payload(&self) -> Vec<BackendField> {
        self.schema.payload(&self.values)
    }

    /// Rebuild a document from stored fields.
    ///
    /// Stored values are trusted: they are only normalized, never preprocessed
    /// or range checked. Fields missing from `raw` take their defaults.
    pub fn from_backend_result(schema: Arc<Schema>, raw: RawResult) -> ValidationResult<Self> {
        let mut stored = schema.from_backend_fields(&raw.fields)?;
        let values = schema
            .fields()
            .iter()
            .map(|field| stored.remove(field.name()).unwrap_or_else(|| field.resolve_default()))
            .collect();
        Ok(Self {
            schema,
            doc_id: Some(raw.doc_id),
            values,
        })
    }

    /// JSON object of every field, plus `doc_id` when one is set.
    pub fn to_json(&self) -> JsonValue {
        let mut map = JsonMap::with_capacity(self.values.len() + 1);
        if let Some(doc_id) = &self.doc_id {
            map.insert("doc_id".to_string(), JsonValue::String(doc_id.clone()));
        }
        for (name, value) in self.iter() {
            map.insert(name.to_string(), json_value(value));
        }
        JsonValue::Object(map)
    }

    /// Build a document from a JSON object such as the one [`Document::to_json`] produces.
    pub fn from_json(schema: Arc<Schema>, json: &JsonValue) -> Result<Self, SearchError> {
        let JsonValue::Object(map) = json else {
            return Err(ValidationError::single("doc_id", "invalid_type", "expected a JSON object").into());
        };
        let doc_id = match map.get("doc_id") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(id)) => Some(id.as_str()),
            Some(_) => {
                return Err(ValidationError::single("doc_id", "invalid_type", "doc_id must be a string").into());
            }
        };
        let values = map
            .iter()
            .filter(|(name, _)| name.as_str() != "doc_id")
            .map(|(name, value)| (name.as_str(), Value::from(value)));
        Self::create(schema, doc_id, values)
    }
}

fn mismatch(name: &str, expected: FieldKind, value: &FieldValue) -> SchemaError {
    SchemaError::KindMismatch {
        field: name.to_string(),
        expected,
        actual: value.type_name(),
    }
}

fn json_value(value: &FieldValue) -> JsonValue {
    match value {
        FieldValue::Text(text) => JsonValue::String(text.clone()),
        FieldValue::Integer(number) => JsonValue::from(*number),
        FieldValue::Float(number) => JsonValue::from(*number),
        FieldValue::Boolean(flag) => JsonValue::Bool(*flag),
        FieldValue::Date(date) => JsonValue::String(date.format(DATE_FORMAT).to_string()),
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.doc_id == other.doc_id && self.values == other.values
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.schema.name());
        out.field("doc_id", &self.doc_id);
        for (name, value) in self.iter() {
            out.field(name, value);
        }
        out.finish()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + usize::from(self.doc_id.is_some())))?;
        if let Some(doc_id) = &self.doc_id {
            map.serialize_entry("doc_id", doc_id)?;
        }
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
