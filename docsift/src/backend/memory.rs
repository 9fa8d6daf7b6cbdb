//! In-process backend for tests and embedded use.
//!
//! Evaluates the structured form of a [`NativeQuery`] directly against stored
//! fields, approximating RediSearch semantics: text fields match on
//! lower-cased alphanumeric tokens, tag fields match case-insensitively as a
//! whole, and numeric/date fields compare as numbers. Prefix and contains
//! filters split their value into terms the same way the RediSearch
//! rendering does: every term must match a stored token.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::errors::BackendError;
use crate::schema::Schema;
use crate::search::{FilterCondition, NativeQuery, QueryExpression, SortOrder, SortSpec, text_terms};
use crate::value::{FieldKind, FieldValue};

use super::{BackendField, QueryResponse, RawResult, SearchBackend};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Mutex<BTreeMap<String, Vec<BackendField>>>,
    queries: Mutex<Vec<NativeQuery>>,
    schemas: Mutex<Vec<String>>,
    pending_failure: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next backend call fail with [`BackendError::Failed`].
    pub fn fail_next(&self, message: impl Into<String>) {
        *lock(&self.pending_failure) = Some(message.into());
    }

    /// Every query executed since the log was last taken, oldest first.
    pub fn executed_queries(&self) -> Vec<NativeQuery> {
        lock(&self.queries).clone()
    }

    /// Drain the query log. Long-lived embedded backends should call this
    /// periodically, since the log is otherwise unbounded.
    pub fn take_executed_queries(&self) -> Vec<NativeQuery> {
        std::mem::take(&mut *lock(&self.queries))
    }

    /// Names of schemas passed to `ensure_schema`.
    pub fn ensured_schemas(&self) -> Vec<String> {
        lock(&self.schemas).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.documents).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.documents).clear();
    }

    fn check_failure(&self) -> Result<(), BackendError> {
        match lock(&self.pending_failure).take() {
            Some(message) => Err(BackendError::Failed { message: message.into() }),
            None => Ok(()),
        }
    }
}

impl SearchBackend for MemoryBackend {
    async fn put(&self, doc_id: &str, fields: &[BackendField]) -> Result<(), BackendError> {
        self.check_failure()?;
        lock(&self.documents).insert(doc_id.to_string(), fields.to_vec());
        Ok(())
    }

    async fn remove(&self, doc_id: &str) -> Result<bool, BackendError> {
        self.check_failure()?;
        Ok(lock(&self.documents).remove(doc_id).is_some())
    }

    async fn get(&self, doc_id: &str) -> Result<Option<RawResult>, BackendError> {
        self.check_failure()?;
        Ok(lock(&self.documents).get(doc_id).map(|fields| RawResult {
            doc_id: doc_id.to_string(),
            fields: fields.clone(),
        }))
    }

    async fn execute_query(&self, query: &NativeQuery) -> Result<QueryResponse, BackendError> {
        lock(&self.queries).push(query.clone());
        self.check_failure()?;

        let (keywords, conditions) = match &query.expression {
            QueryExpression::Structured { keywords, conditions } => (keywords, conditions),
            QueryExpression::Raw(_) => {
                return Err(BackendError::Unsupported {
                    message: "raw query strings need a RediSearch backend".into(),
                });
            }
        };

        let documents = lock(&self.documents);
        let mut hits: Vec<(&String, &Vec<BackendField>)> = documents
            .iter()
            .filter(|(_, fields)| matches_keywords(keywords, fields))
            .filter(|(_, fields)| conditions.iter().all(|condition| matches_condition(condition, fields)))
            .collect();
        let total = hits.len();
        hits.sort_by(|(left_id, left), (right_id, right)| {
            compare_documents(&query.sort, left, right).then_with(|| left_id.cmp(right_id))
        });

        let results = hits
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|(doc_id, fields)| RawResult {
                doc_id: doc_id.clone(),
                fields: if query.ids_only { Vec::new() } else { fields.clone() },
            })
            .collect::<Vec<_>>();
        debug!("memory query '{}' matched {} of {}", query.query_string(), total, documents.len());
        Ok(QueryResponse { total, results })
    }

    async fn ensure_schema(&self, schema: &Schema) -> Result<(), BackendError> {
        self.check_failure()?;
        let mut schemas = lock(&self.schemas);
        if !schemas.iter().any(|name| name == schema.name()) {
            schemas.push(schema.name().to_string());
        }
        Ok(())
    }
}

fn field_value<'f>(fields: &'f [BackendField], name: &str) -> Option<&'f FieldValue> {
    fields.iter().find(|field| field.name == name).map(|field| &field.value)
}

fn text_tokens(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric() && ch != '_')
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn matches_keywords(keywords: &[String], fields: &[BackendField]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let indexed: Vec<String> = fields
        .iter()
        .filter(|field| field.kind == FieldKind::Text)
        .filter_map(|field| field.value.as_text())
        .flat_map(text_tokens)
        .collect();
    keywords
        .iter()
        .flat_map(|keyword| text_tokens(keyword))
        .all(|keyword| indexed.contains(&keyword))
}

fn matches_condition(condition: &FilterCondition, fields: &[BackendField]) -> bool {
    match condition {
        FilterCondition::And(conditions) => conditions.iter().all(|inner| matches_condition(inner, fields)),
        FilterCondition::Or(conditions) => conditions.iter().any(|inner| matches_condition(inner, fields)),
        FilterCondition::Not(inner) => !matches_condition(inner, fields),
        FilterCondition::TagEquals { field, values } => field_value(fields, field)
            .and_then(FieldValue::as_text)
            .is_some_and(|stored| values.iter().any(|value| value.to_lowercase() == stored.to_lowercase())),
        FilterCondition::TagPrefix { field, value } => field_value(fields, field)
            .and_then(FieldValue::as_text)
            .is_some_and(|stored| stored.to_lowercase().starts_with(&value.to_lowercase())),
        FilterCondition::BooleanEquals { field, value } => {
            field_value(fields, field).and_then(FieldValue::as_boolean) == Some(*value)
        }
        FilterCondition::NumericRange { field, .. } => field_value(fields, field)
            .and_then(FieldValue::to_numeric)
            .is_some_and(|number| condition.admits_numeric(number)),
        FilterCondition::TextExact { field, value } => text_of(fields, field).is_some_and(|stored| {
            let phrase = text_tokens(value);
            !phrase.is_empty() && text_tokens(stored).windows(phrase.len()).any(|window| window == phrase.as_slice())
        }),
        FilterCondition::TextPrefix { field, value } => text_of(fields, field).is_some_and(|stored| {
            let tokens = text_tokens(stored);
            let wanted = lowered_terms(value);
            let Some((last, init)) = wanted.split_last() else {
                return true;
            };
            init.iter().all(|token| tokens.contains(token)) && tokens.iter().any(|token| token.starts_with(last.as_str()))
        }),
        FilterCondition::TextContains { field, value } => text_of(fields, field).is_some_and(|stored| {
            let tokens = text_tokens(stored);
            lowered_terms(value)
                .iter()
                .all(|term| tokens.iter().any(|token| token.contains(term.as_str())))
        }),
    }
}

fn lowered_terms(value: &str) -> Vec<String> {
    text_terms(value).into_iter().map(str::to_lowercase).collect()
}

fn text_of<'f>(fields: &'f [BackendField], name: &str) -> Option<&'f str> {
    field_value(fields, name).and_then(FieldValue::as_text)
}

fn compare_documents(sort: &[SortSpec], left: &[BackendField], right: &[BackendField]) -> Ordering {
    for spec in sort {
        let ordering = compare_values(field_value(left, &spec.field), field_value(right, &spec.field));
        let ordering = match spec.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(left: Option<&FieldValue>, right: Option<&FieldValue>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(FieldValue::Text(a)), Some(FieldValue::Text(b))) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Some(FieldValue::Boolean(a)), Some(FieldValue::Boolean(b))) => a.cmp(b),
        (Some(a), Some(b)) => match (a.to_numeric(), b.to_numeric()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.type_name().cmp(b.type_name()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(name: &str, value: &str) -> BackendField {
        BackendField::new(name, FieldKind::Text, FieldValue::Text(value.to_string()))
    }

    fn tag(name: &str, value: &str) -> BackendField {
        BackendField::new(name, FieldKind::Atom, FieldValue::Text(value.to_string()))
    }

    #[test]
    fn text_conditions_match_on_tokens() {
        let fields = [text("title", "Die Hard: With a Vengeance")];
        assert!(matches_condition(&FilterCondition::text_exact("title", "die hard"), &fields));
        assert!(matches_condition(&FilterCondition::text_exact("title", "With a"), &fields));
        assert!(!matches_condition(&FilterCondition::text_exact("title", "hard die"), &fields));
        assert!(matches_condition(&FilterCondition::text_prefix("title", "veng"), &fields));
        assert!(matches_condition(&FilterCondition::text_prefix("title", "die ha"), &fields));
        assert!(!matches_condition(&FilterCondition::text_prefix("title", "ard"), &fields));
        assert!(matches_condition(&FilterCondition::text_contains("title", "ard"), &fields));
    }

    #[test]
    fn contains_needs_every_term_inside_some_token() {
        let fields = [text("title", "Die Hard: With a Vengeance")];
        assert!(matches_condition(&FilterCondition::text_contains("title", "ie ard"), &fields));
        assert!(matches_condition(&FilterCondition::text_contains("title", "hard die"), &fields));
        assert!(!matches_condition(&FilterCondition::text_contains("title", "die ronin"), &fields));
        assert!(!matches_condition(&FilterCondition::text_contains("title", "eat z"), &[text("title", "Heat")]));
    }

    #[test]
    fn groups_and_negation() {
        let fields = [tag("genre", "action"), BackendField::new("rating", FieldKind::Float, FieldValue::Float(3.5))];
        let action = FilterCondition::tag_eq("genre", "action");
        let top = FilterCondition::numeric_gte("rating", 4.0);
        assert!(!matches_condition(&FilterCondition::and([action.clone(), top.clone()]), &fields));
        assert!(matches_condition(&FilterCondition::or([action.clone(), top.clone()]), &fields));
        assert!(matches_condition(&FilterCondition::negate(top), &fields));
        assert!(!matches_condition(&FilterCondition::negate(action), &fields));
    }

    #[test]
    fn tags_match_whole_values_ignoring_case() {
        let fields = [tag("genre", "Sci-Fi")];
        assert!(matches_condition(&FilterCondition::tag_eq("genre", "sci-fi"), &fields));
        assert!(!matches_condition(&FilterCondition::tag_eq("genre", "sci"), &fields));
        assert!(matches_condition(&FilterCondition::tag_prefix("genre", "SCI"), &fields));
        assert!(matches_condition(&FilterCondition::tag_in("genre", ["drama", "sci-fi"]), &fields));
    }

    #[test]
    fn keywords_must_all_appear_in_text_fields() {
        let fields = [text("title", "Die Hard"), tag("genre", "action")];
        assert!(matches_keywords(&["die".into(), "hard".into()], &fields));
        assert!(!matches_keywords(&["die".into(), "action".into()], &fields));
        assert!(matches_keywords(&[], &fields));
    }

    #[test]
    fn missing_values_sort_first() {
        let rated = [BackendField::new("rating", FieldKind::Float, FieldValue::Float(1.0))];
        let sort = [SortSpec::new("rating", SortOrder::Asc)];
        assert_eq!(compare_documents(&sort, &[], &rated), Ordering::Less);
        let sort = [SortSpec::new("rating", SortOrder::Desc)];
        assert_eq!(compare_documents(&sort, &[], &rated), Ordering::Greater);
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let backend = MemoryBackend::new();
        backend.fail_next("connection reset");
        let err = backend.put("a", &[]).await.expect_err("injected failure");
        assert!(matches!(err, BackendError::Failed { .. }));
        backend.put("a", &[]).await.expect("second call succeeds");
        assert_eq!(backend.len(), 1);
        assert!(backend.remove("a").await.expect("removes"));
        assert!(!backend.remove("a").await.expect("already gone"));
    }

    #[tokio::test]
    async fn query_log_can_be_drained() {
        let backend = MemoryBackend::new();
        let query = NativeQuery {
            expression: QueryExpression::Structured {
                keywords: Vec::new(),
                conditions: Vec::new(),
            },
            sort: Vec::new(),
            limit: 10,
            offset: 0,
            ids_only: false,
        };
        backend.execute_query(&query).await.expect("runs");
        backend.execute_query(&query).await.expect("runs");

        assert_eq!(backend.take_executed_queries().len(), 2);
        assert!(backend.executed_queries().is_empty());
        backend.execute_query(&query).await.expect("runs");
        assert_eq!(backend.take_executed_queries(), [query]);
    }
}
