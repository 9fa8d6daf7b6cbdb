//! Ordered field registries per document type.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use log::debug;
use regex::Regex;

use crate::backend::BackendField;
use crate::document::Document;
use crate::errors::{SchemaError, ValidationError, ValidationResult};
use crate::fields::Field;
use crate::registry;
use crate::value::{FieldValue, Value};

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("field name pattern is valid"));

/// A document type known to docsift.
///
/// Implementors list their fields in [`DocumentType::declare`]. A derived type
/// calls its parent's `declare` first and then adds or overrides fields:
///
/// ```
/// use docsift::{DocumentType, Field, SchemaBuilder};
///
/// struct Film;
/// impl DocumentType for Film {
///     const NAME: &'static str = "film";
///     fn declare(schema: SchemaBuilder) -> SchemaBuilder {
///         schema.field("title", Field::text().with_default("Untitled"))
///     }
/// }
///
/// struct Documentary;
/// impl DocumentType for Documentary {
///     const NAME: &'static str = "documentary";
///     fn declare(schema: SchemaBuilder) -> SchemaBuilder {
///         Film::declare(schema).field("subject", Field::atom())
///     }
/// }
///
/// let schema = Documentary::schema().unwrap();
/// assert_eq!(schema.field_names().collect::<Vec<_>>(), ["title", "subject"]);
/// ```
pub trait DocumentType: 'static {
    const NAME: &'static str;

    fn declare(schema: SchemaBuilder) -> SchemaBuilder;

    /// The cached schema for this type.
    fn schema() -> Result<Arc<Schema>, SchemaError> {
        registry::schema_for::<Self>()
    }
}

/// Collects field declarations; [`SchemaBuilder::build`] validates and binds them.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<(String, Field)>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declare a field. Re-declaring a name replaces the earlier field in place.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name, field)),
        }
        self
    }

    /// Inherit every field of an already built schema.
    pub fn extend(self, parent: &Schema) -> Self {
        parent
            .fields()
            .iter()
            .fold(self, |builder, field| builder.field(field.name(), field.clone()))
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        let mut positions = HashMap::with_capacity(self.fields.len());
        for (name, field) in self.fields {
            check_field_name(&name)?;
            positions.insert(name.clone(), fields.len());
            fields.push(field.bind(&name)?);
        }
        Ok(Schema {
            name: self.name,
            fields,
            positions,
        })
    }
}

fn check_field_name(name: &str) -> Result<(), SchemaError> {
    let reason = if name.starts_with("__") {
        "names starting with '__' are reserved"
    } else if name == "doc_id" {
        "'doc_id' is reserved for the document identifier"
    } else if !FIELD_NAME.is_match(name) {
        "use letters, digits and underscores, not starting with a digit"
    } else {
        return Ok(());
    };
    Err(SchemaError::InvalidFieldName {
        name: name.to_string(),
        reason,
    })
}

/// The ordered, immutable set of fields of one document type.
#[derive(Debug)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    positions: HashMap<String, usize>,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Field::name)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Result<&Field, SchemaError> {
        self.position(name)
            .map(|idx| &self.fields[idx])
            .ok_or_else(|| SchemaError::unknown_field(&self.name, name))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every field's default, in declaration order.
    pub(crate) fn defaults(&self) -> Vec<FieldValue> {
        self.fields.iter().map(Field::resolve_default).collect()
    }

    /// Flatten a document of this schema into backend triples.
    pub fn to_backend_fields(&self, document: &Document) -> Result<Vec<BackendField>, SchemaError> {
        if document.schema().name() != self.name {
            return Err(SchemaError::SchemaMismatch {
                expected: self.name.clone(),
                actual: document.schema().name().to_string(),
            });
        }
        Ok(self.payload(document.values()))
    }

    pub(crate) fn payload(&self, values: &[FieldValue]) -> Vec<BackendField> {
        self.fields
            .iter()
            .zip(values)
            .map(|(field, value)| BackendField::new(field.name(), field.kind(), value.clone()))
            .collect()
    }

    /// Normalize stored fields by name. Names this schema does not declare are skipped.
    pub fn from_backend_fields(&self, raw: &[BackendField]) -> ValidationResult<HashMap<String, FieldValue>> {
        let mut values = HashMap::with_capacity(raw.len());
        let mut issues = Vec::new();
        for stored in raw {
            let Ok(field) = self.get(&stored.name) else {
                debug!("ignoring backend field '{}' unknown to schema '{}'", stored.name, self.name);
                continue;
            };
            match field.rehydrate(stored.value.clone()) {
                Ok(value) => {
                    values.insert(stored.name.clone(), value);
                }
                Err(err) => issues.extend(err.issues),
            }
        }
        if issues.is_empty() {
            Ok(values)
        } else {
            Err(ValidationError::new(issues))
        }
    }

    /// Coerce and validate `raw` through the named field.
    pub fn clean(&self, name: &str, raw: impl Into<Value>) -> Result<FieldValue, crate::SearchError> {
        Ok(self.get(name)?.clean(raw.into())?)
    }
}
