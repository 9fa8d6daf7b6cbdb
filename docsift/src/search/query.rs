use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::backend::SearchBackend;
use crate::errors::{QueryArgumentError, QueryStateError, SchemaError, SearchError};
use crate::fields::Field;
use crate::schema::Schema;
use crate::value::{FieldKind, FieldValue, Value};

use super::{
    Criterion, FilterCondition, NativeQuery, QueryExpression, SearchResults, SortOrder, SortSpec, text_terms,
    tokenize_keywords,
};

const LOOKUP_SEPARATOR: &str = "__";
const DEFAULT_MAX_LIMIT: usize = 1000;
const DEFAULT_MAX_OFFSET: usize = 1000;

/// Pagination bounds applied by a [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub max_limit: usize,
    pub max_offset: usize,
    /// Window size used when the caller never calls `limit`.
    pub default_limit: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_limit: DEFAULT_MAX_LIMIT,
            max_offset: DEFAULT_MAX_OFFSET,
            default_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

/// Comparison requested by a `field__lookup` filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Exact,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
}

impl Lookup {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "exact" => Some(Lookup::Exact),
            "gt" => Some(Lookup::Gt),
            "gte" => Some(Lookup::Gte),
            "lt" => Some(Lookup::Lt),
            "lte" => Some(Lookup::Lte),
            "contains" => Some(Lookup::Contains),
            "startswith" => Some(Lookup::StartsWith),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Lookup::Exact => "exact",
            Lookup::Gt => "gt",
            Lookup::Gte => "gte",
            Lookup::Lt => "lt",
            Lookup::Lte => "lte",
            Lookup::Contains => "contains",
            Lookup::StartsWith => "startswith",
        }
    }

    fn supported_by(self, kind: FieldKind) -> bool {
        match kind {
            FieldKind::Text => matches!(self, Lookup::Exact | Lookup::Contains | Lookup::StartsWith),
            FieldKind::Atom => matches!(self, Lookup::Exact | Lookup::StartsWith),
            FieldKind::Boolean => self == Lookup::Exact,
            FieldKind::Integer | FieldKind::Float | FieldKind::Date => {
                matches!(self, Lookup::Exact | Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    Empty,
    Composing,
    Executed,
}

/// Chainable search over one document type.
///
/// Every chain method consumes the builder and hands back a new one, so two
/// chains that share a prefix need an explicit `clone()`. A builder runs once:
/// after [`Query::fetch`] (or any other terminal call) every further call
/// fails with [`QueryStateError`].
///
/// ```no_run
/// # use docsift::{Index, MemoryBackend, DocumentType, SchemaBuilder, Field, SearchError};
/// # struct Film;
/// # impl DocumentType for Film {
/// #     const NAME: &'static str = "film";
/// #     fn declare(s: SchemaBuilder) -> SchemaBuilder { s.field("rating", Field::float()) }
/// # }
/// # async fn demo(index: Index<MemoryBackend>) -> Result<(), SearchError> {
/// let mut query = index
///     .search::<Film>()?
///     .filter("rating__gte", 4)?
///     .order_by("-rating")?
///     .limit(10)?;
/// for film in query.fetch().await? {
///     println!("{:?}", film?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Query<'a, B> {
    backend: &'a B,
    schema: Arc<Schema>,
    limits: QueryLimits,
    state: QueryState,
    keywords: Vec<String>,
    conditions: Vec<FilterCondition>,
    sort: Vec<SortSpec>,
    limit: Option<usize>,
    offset: usize,
    raw: Option<String>,
}

impl<'a, B: SearchBackend> Query<'a, B> {
    pub(crate) fn new(backend: &'a B, schema: Arc<Schema>, limits: QueryLimits) -> Self {
        Self {
            backend,
            schema,
            limits,
            state: QueryState::Empty,
            keywords: Vec::new(),
            conditions: Vec::new(),
            sort: Vec::new(),
            limit: None,
            offset: 0,
            raw: None,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn is_executed(&self) -> bool {
        self.state == QueryState::Executed
    }

    /// Free-text search term; a later call replaces an earlier one.
    pub fn keywords(mut self, text: &str) -> Result<Self, SearchError> {
        self.compose("keywords")?;
        self.keywords = tokenize_keywords(text);
        Ok(self)
    }

    /// Restrict results by `field` or `field__lookup`.
    ///
    /// The value is coerced by the field before the clause is recorded.
    /// Repeated filters are intersected.
    pub fn filter(mut self, field_lookup: &str, value: impl Into<Value>) -> Result<Self, SearchError> {
        self.compose("filter")?;
        let condition = self.condition(field_lookup, value.into())?;
        self.conditions.push(condition);
        Ok(self)
    }

    /// Restrict results by a composed [`Criterion`], which may span several fields.
    ///
    /// Like [`Query::filter`], the criterion is intersected with every other filter.
    pub fn filter_where(mut self, criterion: Criterion) -> Result<Self, SearchError> {
        self.compose("filter_where")?;
        let condition = self.resolve_criterion(&criterion)?;
        self.conditions.push(condition);
        Ok(self)
    }

    /// Drop results matching `field_lookup`.
    pub fn exclude(mut self, field_lookup: &str, value: impl Into<Value>) -> Result<Self, SearchError> {
        self.compose("exclude")?;
        let condition = self.condition(field_lookup, value.into())?;
        self.conditions.push(FilterCondition::negate(condition));
        Ok(self)
    }

    /// Match any of `values` on `field_lookup`.
    pub fn filter_in<I, V>(mut self, field_lookup: &str, values: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.compose("filter_in")?;
        let (field, lookup) = self.resolve_lookup(field_lookup)?;
        let mut conditions = Vec::new();
        for raw in values {
            let value = field.coerce_for_filter(raw.into())?;
            conditions.push(condition_for(field, lookup, &value)?);
        }
        if conditions.is_empty() {
            return Err(QueryArgumentError::new(format!("filter_in on '{field_lookup}' needs at least one value")).into());
        }
        let condition = match (field.kind(), lookup) {
            (FieldKind::Atom, Lookup::Exact) => merge_tags(field.name(), conditions),
            _ if conditions.len() == 1 => conditions.remove(0),
            _ => FilterCondition::or(conditions),
        };
        self.conditions.push(condition);
        Ok(self)
    }

    /// Sort by `field`, or descending by `-field`. Repeated calls add secondary keys.
    pub fn order_by(self, field: &str) -> Result<Self, SearchError> {
        match field.strip_prefix('-') {
            Some(name) => self.push_sort("order_by", name, SortOrder::Desc),
            None => self.push_sort("order_by", field, SortOrder::Asc),
        }
    }

    pub fn order_by_direction(self, field: &str, order: SortOrder) -> Result<Self, SearchError> {
        self.push_sort("order_by_direction", field, order)
    }

    pub fn limit(mut self, limit: i64) -> Result<Self, SearchError> {
        self.compose("limit")?;
        self.limit = Some(checked_window("limit", limit, self.limits.max_limit)?);
        Ok(self)
    }

    pub fn offset(mut self, offset: i64) -> Result<Self, SearchError> {
        self.compose("offset")?;
        self.offset = checked_window("offset", offset, self.limits.max_offset)?;
        Ok(self)
    }

    /// One-based page of `page_size` results.
    pub fn page(self, page: i64, page_size: i64) -> Result<Self, SearchError> {
        if page < 1 {
            return Err(QueryArgumentError::new(format!("page must be at least 1, got {page}")).into());
        }
        let offset = (page - 1).saturating_mul(page_size.max(0));
        self.limit(page_size)?.offset(offset)
    }

    /// Replace the generated keyword and filter expression with a native query string.
    pub fn raw(mut self, query: &str) -> Result<Self, SearchError> {
        self.compose("raw")?;
        self.raw = Some(query.to_string());
        Ok(self)
    }

    /// The backend query this builder currently describes.
    pub fn to_native(&self) -> NativeQuery {
        let expression = match &self.raw {
            Some(raw) => QueryExpression::Raw(raw.clone()),
            None => QueryExpression::Structured {
                keywords: self.keywords.clone(),
                conditions: self.conditions.clone(),
            },
        };
        NativeQuery {
            expression,
            sort: self.sort.clone(),
            limit: self.limit.unwrap_or(self.limits.default_limit),
            offset: self.offset,
            ids_only: false,
        }
    }

    pub fn query_string(&self) -> String {
        self.to_native().query_string()
    }

    /// Run the query and return the matching documents.
    pub async fn fetch(&mut self) -> Result<SearchResults, SearchError> {
        let native = self.begin_execution("fetch")?;
        let response = self.backend.execute_query(&native).await?;
        Ok(SearchResults::new(self.schema.clone(), response))
    }

    /// Run the query returning only document ids.
    pub async fn fetch_ids(&mut self) -> Result<Vec<String>, SearchError> {
        let mut native = self.begin_execution("fetch_ids")?;
        native.ids_only = true;
        let response = self.backend.execute_query(&native).await?;
        Ok(response.results.into_iter().map(|row| row.doc_id).collect())
    }

    /// Number of matching documents, ignoring the window.
    pub async fn count(&mut self) -> Result<usize, SearchError> {
        let mut native = self.begin_execution("count")?;
        native.ids_only = true;
        native.limit = 0;
        native.offset = 0;
        let response = self.backend.execute_query(&native).await?;
        Ok(response.total)
    }

    fn compose(&mut self, operation: &'static str) -> Result<(), QueryStateError> {
        if self.state == QueryState::Executed {
            return Err(QueryStateError { operation });
        }
        self.state = QueryState::Composing;
        Ok(())
    }

    fn begin_execution(&mut self, operation: &'static str) -> Result<NativeQuery, QueryStateError> {
        if self.state == QueryState::Executed {
            return Err(QueryStateError { operation });
        }
        self.state = QueryState::Executed;
        let native = self.to_native();
        debug!(
            "{} on '{}': {} (sort {:?}, limit {}, offset {})",
            operation,
            self.schema.name(),
            native.query_string(),
            native.sort,
            native.limit,
            native.offset
        );
        Ok(native)
    }

    fn push_sort(mut self, operation: &'static str, field: &str, order: SortOrder) -> Result<Self, SearchError> {
        self.compose(operation)?;
        let field = self.schema.get(field)?;
        self.sort.push(SortSpec::new(field.name(), order));
        Ok(self)
    }

    fn condition(&self, field_lookup: &str, value: Value) -> Result<FilterCondition, SearchError> {
        let (field, lookup) = self.resolve_lookup(field_lookup)?;
        let value = field.coerce_for_filter(value)?;
        condition_for(field, lookup, &value)
    }

    fn resolve_criterion(&self, criterion: &Criterion) -> Result<FilterCondition, SearchError> {
        let parts = match criterion {
            Criterion::Match { field_lookup, value } => return self.condition(field_lookup, value.clone()),
            Criterion::Not(inner) => return Ok(FilterCondition::negate(self.resolve_criterion(inner)?)),
            Criterion::All(parts) | Criterion::Any(parts) => parts,
        };
        let mut conditions = parts
            .iter()
            .map(|part| self.resolve_criterion(part))
            .collect::<Result<Vec<_>, _>>()?;
        match conditions.len() {
            0 => Err(QueryArgumentError::new("a criterion group needs at least one member").into()),
            1 => Ok(conditions.remove(0)),
            _ if matches!(criterion, Criterion::All(_)) => Ok(FilterCondition::And(conditions)),
            _ => Ok(FilterCondition::Or(conditions)),
        }
    }

    fn resolve_lookup(&self, field_lookup: &str) -> Result<(&Field, Lookup), SearchError> {
        if let Some((name, token)) = field_lookup.rsplit_once(LOOKUP_SEPARATOR)
            && !self.schema.contains(field_lookup)
            && let Some(lookup) = Lookup::parse(token)
        {
            let field = self.schema.get(name)?;
            if !lookup.supported_by(field.kind()) {
                return Err(QueryArgumentError::new(format!(
                    "lookup '{}' is not supported on {} field '{}'",
                    lookup.as_str(),
                    field.kind(),
                    name
                ))
                .into());
            }
            return Ok((field, lookup));
        }
        Ok((self.schema.get(field_lookup)?, Lookup::Exact))
    }
}

fn condition_for(field: &Field, lookup: Lookup, value: &FieldValue) -> Result<FilterCondition, SearchError> {
    let name = field.name();
    let condition = match (field.kind(), value) {
        (FieldKind::Text | FieldKind::Atom, FieldValue::Text(text)) if text.trim().is_empty() => {
            return Err(QueryArgumentError::new(format!("empty value for '{name}__{}'", lookup.as_str())).into());
        }
        (FieldKind::Text, FieldValue::Text(text))
            if matches!(lookup, Lookup::Contains | Lookup::StartsWith) && text_terms(text).is_empty() =>
        {
            return Err(QueryArgumentError::new(format!(
                "no searchable terms in '{text}' for '{name}__{}'",
                lookup.as_str()
            ))
            .into());
        }
        (FieldKind::Text, FieldValue::Text(text)) => match lookup {
            Lookup::Contains => FilterCondition::text_contains(name, text.as_str()),
            Lookup::StartsWith => FilterCondition::text_prefix(name, text.as_str()),
            _ => FilterCondition::text_exact(name, text.as_str()),
        },
        (FieldKind::Atom, FieldValue::Text(text)) => match lookup {
            Lookup::StartsWith => FilterCondition::tag_prefix(name, text.as_str()),
            _ => FilterCondition::tag_eq(name, text.as_str()),
        },
        (FieldKind::Boolean, FieldValue::Boolean(flag)) => FilterCondition::bool_eq(name, *flag),
        (kind, value) if kind.is_numeric() => {
            let number = value.to_numeric().ok_or_else(|| SchemaError::KindMismatch {
                field: name.to_string(),
                expected: kind,
                actual: value.type_name(),
            })?;
            match lookup {
                Lookup::Gt => FilterCondition::numeric_gt(name, number),
                Lookup::Gte => FilterCondition::numeric_gte(name, number),
                Lookup::Lt => FilterCondition::numeric_lt(name, number),
                Lookup::Lte => FilterCondition::numeric_lte(name, number),
                _ => FilterCondition::numeric_eq(name, number),
            }
        }
        (kind, value) => {
            return Err(SchemaError::KindMismatch {
                field: name.to_string(),
                expected: kind,
                actual: value.type_name(),
            }
            .into());
        }
    };
    Ok(condition)
}

fn merge_tags(field: &str, conditions: Vec<FilterCondition>) -> FilterCondition {
    let values = conditions.into_iter().flat_map(|condition| match condition {
        FilterCondition::TagEquals { values, .. } => values,
        _ => Vec::new(),
    });
    FilterCondition::tag_in(field, values)
}

fn checked_window(what: &str, requested: i64, maximum: usize) -> Result<usize, QueryArgumentError> {
    let value = usize::try_from(requested)
        .map_err(|_| QueryArgumentError::new(format!("{what} must not be negative, got {requested}")))?;
    if value > maximum {
        return Err(QueryArgumentError::new(format!("{what} {value} exceeds the maximum of {maximum}")));
    }
    Ok(value)
}

impl<B> Clone for Query<'_, B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend,
            schema: self.schema.clone(),
            limits: self.limits,
            state: self.state,
            keywords: self.keywords.clone(),
            conditions: self.conditions.clone(),
            sort: self.sort.clone(),
            limit: self.limit,
            offset: self.offset,
            raw: self.raw.clone(),
        }
    }
}

impl<B> fmt::Debug for Query<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("schema", &self.schema.name())
            .field("state", &self.state)
            .field("keywords", &self.keywords)
            .field("conditions", &self.conditions)
            .field("sort", &self.sort)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("raw", &self.raw)
            .finish()
    }
}
