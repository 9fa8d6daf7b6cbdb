//! # Query model and RediSearch rendering
//!
//! Filters built by the [`Query`] builder are kept as structured
//! [`FilterCondition`]s inside a [`NativeQuery`]. Backends either evaluate
//! that structure directly or render it to a RediSearch (dialect 2) string
//! with [`NativeQuery::query_string`].
//!
//! | clause                     | rendering                    |
//! |----------------------------|------------------------------|
//! | text equality              | `(@title:"die hard")`        |
//! | text contains / prefix     | `(@title:*hard*)` / `(@title:ha*)` |
//! | several terms              | `(@title:(*die* *har*))`     |
//! | atom equality / prefix     | `(@genre:{action})` / `(@genre:{act*})` |
//! | boolean                    | `(@featured:{true})`         |
//! | numeric range              | `(@rating:[4 +inf])`, `(@rating:[(4 +inf])` |
//! | all of / any of            | `(a b)` / `(a\|b)`           |
//! | not                        | `-(@genre:{drama})`          |
//! | keywords                   | `(die hard)`                 |
//! | nothing                    | `*`                          |

mod criteria;
mod query;
mod results;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::format_numeric;

pub use criteria::Criterion;
pub use query::{Lookup, Query, QueryLimits};
pub use results::SearchResults;

const TAG_SEPARATOR: &str = "|";

static KEYWORD_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s'-]").expect("keyword pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

/// One end of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericBound {
    pub value: f64,
    pub inclusive: bool,
}

impl NumericBound {
    #[inline]
    pub const fn inclusive(value: f64) -> Self {
        Self { value, inclusive: true }
    }

    #[inline]
    pub const fn exclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }

    fn admits_above(&self, value: f64) -> bool {
        if self.inclusive { value >= self.value } else { value > self.value }
    }

    fn admits_below(&self, value: f64) -> bool {
        if self.inclusive { value <= self.value } else { value < self.value }
    }
}

/// A single filter restriction. Top-level conditions are intersected.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    TagEquals {
        field: String,
        values: Vec<String>,
    },
    TagPrefix {
        field: String,
        value: String,
    },
    NumericRange {
        field: String,
        min: Option<NumericBound>,
        max: Option<NumericBound>,
    },
    BooleanEquals {
        field: String,
        value: bool,
    },
    TextPrefix {
        field: String,
        value: String,
    },
    TextContains {
        field: String,
        value: String,
    },
    TextExact {
        field: String,
        value: String,
    },
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
    Not(Box<FilterCondition>),
}

impl FilterCondition {
    // ========== Constructors ==========

    #[inline]
    pub fn tag_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TagEquals {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    /// Match any of `values` on a tag field.
    #[inline]
    pub fn tag_in<S: Into<String>>(field: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::TagEquals {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn tag_prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TagPrefix {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn bool_eq(field: impl Into<String>, value: bool) -> Self {
        Self::BooleanEquals {
            field: field.into(),
            value,
        }
    }

    #[inline]
    pub fn numeric_range(field: impl Into<String>, min: Option<NumericBound>, max: Option<NumericBound>) -> Self {
        Self::NumericRange {
            field: field.into(),
            min,
            max,
        }
    }

    #[inline]
    pub fn numeric_eq(field: impl Into<String>, value: f64) -> Self {
        Self::numeric_range(field, Some(NumericBound::inclusive(value)), Some(NumericBound::inclusive(value)))
    }

    #[inline]
    pub fn numeric_gt(field: impl Into<String>, value: f64) -> Self {
        Self::numeric_range(field, Some(NumericBound::exclusive(value)), None)
    }

    #[inline]
    pub fn numeric_gte(field: impl Into<String>, value: f64) -> Self {
        Self::numeric_range(field, Some(NumericBound::inclusive(value)), None)
    }

    #[inline]
    pub fn numeric_lt(field: impl Into<String>, value: f64) -> Self {
        Self::numeric_range(field, None, Some(NumericBound::exclusive(value)))
    }

    #[inline]
    pub fn numeric_lte(field: impl Into<String>, value: f64) -> Self {
        Self::numeric_range(field, None, Some(NumericBound::inclusive(value)))
    }

    #[inline]
    pub fn text_prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TextPrefix {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn text_contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TextContains {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn text_exact(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TextExact {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn and(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self::And(conditions.into_iter().collect())
    }

    #[inline]
    pub fn or(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self::Or(conditions.into_iter().collect())
    }

    #[inline]
    pub fn negate(condition: FilterCondition) -> Self {
        Self::Not(Box::new(condition))
    }

    // ========== Query Generation ==========

    /// Render this condition as a RediSearch query clause.
    pub fn to_query_clause(&self) -> String {
        match self {
            Self::TagEquals { field, values } => {
                let escaped: Vec<String> = values.iter().map(|v| escape_for_tag_query(v)).collect();
                format!("(@{}:{{{}}})", field, escaped.join(TAG_SEPARATOR))
            }
            Self::TagPrefix { field, value } => {
                format!("(@{}:{{{}*}})", field, escape_for_tag_query(value))
            }
            Self::NumericRange { field, min, max } => {
                let min_s = render_bound(min.as_ref(), "-inf");
                let max_s = render_bound(max.as_ref(), "+inf");
                format!("(@{}:[{} {}])", field, min_s, max_s)
            }
            Self::BooleanEquals { field, value } => {
                format!("(@{}:{{{}}})", field, value)
            }
            Self::TextPrefix { field, value } => field_terms(field, &escape_for_text_prefix(value)),
            Self::TextContains { field, value } => field_terms(field, &escape_for_text_contains(value)),
            Self::TextExact { field, value } => {
                format!("(@{}:{})", field, escape_for_text_exact(value))
            }
            Self::And(conditions) => join_clauses(conditions, " "),
            Self::Or(conditions) => join_clauses(conditions, "|"),
            Self::Not(inner) => {
                let clause = inner.to_query_clause();
                if clause.is_empty() { clause } else { format!("-{clause}") }
            }
        }
    }

    /// Whether a numeric `value` lies inside this condition's range. Non-range conditions never match.
    pub fn admits_numeric(&self, value: f64) -> bool {
        match self {
            Self::NumericRange { min, max, .. } => {
                min.is_none_or(|bound| bound.admits_above(value)) && max.is_none_or(|bound| bound.admits_below(value))
            }
            _ => false,
        }
    }
}

/// The query expression handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpression {
    /// Keyword tokens and filter conditions, all of which must match.
    Structured {
        keywords: Vec<String>,
        conditions: Vec<FilterCondition>,
    },
    /// A caller-supplied RediSearch query string.
    Raw(String),
}

/// Everything a backend needs to run one search.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    pub expression: QueryExpression,
    pub sort: Vec<SortSpec>,
    pub limit: usize,
    pub offset: usize,
    pub ids_only: bool,
}

impl NativeQuery {
    /// Render the expression as a RediSearch query string.
    pub fn query_string(&self) -> String {
        match &self.expression {
            QueryExpression::Raw(raw) if raw.trim().is_empty() => "*".to_string(),
            QueryExpression::Raw(raw) => raw.clone(),
            QueryExpression::Structured { keywords, conditions } => build_query(keywords, conditions),
        }
    }
}

fn build_query(keywords: &[String], conditions: &[FilterCondition]) -> String {
    let mut clauses = Vec::with_capacity(conditions.len() + 1);
    if !keywords.is_empty() {
        let escaped: Vec<String> = keywords.iter().map(|token| escape_text_token(token)).collect();
        clauses.push(format!("({})", escaped.join(" ")));
    }
    for condition in conditions {
        let clause = condition.to_query_clause();
        if !clause.is_empty() {
            clauses.push(clause);
        }
    }
    if clauses.is_empty() { "*".to_string() } else { clauses.join(" ") }
}

/// Split a text filter value into the terms a TEXT field indexes it as.
///
/// ```
/// use docsift::search::text_terms;
///
/// assert_eq!(text_terms("sci-fi / west"), ["sci", "fi", "west"]);
/// assert!(text_terms(" -- ").is_empty());
/// ```
pub fn text_terms(value: &str) -> Vec<&str> {
    value
        .split(|ch: char| ch == '-' || ch == '/' || ch.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split free text into lower-cased search tokens, dropping characters the query lexer would trip on.
pub fn tokenize_keywords(text: &str) -> Vec<String> {
    KEYWORD_NOISE
        .replace_all(text, " ")
        .split(|ch: char| ch.is_whitespace() || ch == '-' || ch == '/')
        .map(|token| token.trim_matches('\'').to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Escape a value for RediSearch TAG field queries.
///
/// ```
/// use docsift::search::escape_for_tag_query;
///
/// assert_eq!(escape_for_tag_query("action"), "action");
/// assert_eq!(escape_for_tag_query("sci-fi"), "sci\\-fi");
/// assert_eq!(escape_for_tag_query("a|b"), "a\\|b");
/// assert_eq!(escape_for_tag_query("New York"), "New\\ York");
/// ```
pub fn escape_for_tag_query(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '$' | '{' | '}' | '\\' | '|' | '.' | '-' | ' ' | ',' | '<' | '>' | '\'' | '"' | ':' | ';' | '!' | '@'
            | '#' | '%' | '^' | '&' | '*' | '(' | ')' | '+' | '=' | '~' | '[' | ']' | '/' | '?' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escape and format a value for RediSearch TEXT prefix queries.
///
/// Tokenizes the value on `-` and `/` (matching index-time tokenization) and
/// puts the wildcard on the last token.
///
/// ```
/// use docsift::search::escape_for_text_prefix;
///
/// assert_eq!(escape_for_text_prefix("hard"), "hard*");
/// assert_eq!(escape_for_text_prefix("sci-fi/west"), "sci fi west*");
/// ```
pub fn escape_for_text_prefix(value: &str) -> String {
    let tokens = text_terms(value);
    let Some((last, init)) = tokens.split_last() else {
        return "*".to_string();
    };
    let mut parts: Vec<String> = init.iter().map(|t| escape_text_token(t)).collect();
    parts.push(format!("{}*", escape_text_token(last)));
    parts.join(" ")
}

/// Escape each term of a value and wrap it in `*...*` for infix matching.
///
/// ```
/// use docsift::search::escape_for_text_contains;
///
/// assert_eq!(escape_for_text_contains("ard"), "*ard*");
/// assert_eq!(escape_for_text_contains("die har"), "*die* *har*");
/// ```
pub fn escape_for_text_contains(value: &str) -> String {
    text_terms(value)
        .into_iter()
        .map(|term| format!("*{}*", escape_text_token(term)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a value for exact phrase matching.
///
/// ```
/// use docsift::search::escape_for_text_exact;
///
/// assert_eq!(escape_for_text_exact("Die Hard"), "\"Die Hard\"");
/// assert_eq!(escape_for_text_exact("say \"yes\""), "\"say \\\"yes\\\"\"");
/// ```
pub fn escape_for_text_exact(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for ch in value.chars() {
        match ch {
            '\\' | '"' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}

// ============================================================================
// Internal helpers
// ============================================================================

fn render_bound(bound: Option<&NumericBound>, unbounded: &str) -> String {
    match bound {
        None => unbounded.to_string(),
        Some(bound) if bound.inclusive => format_numeric(bound.value),
        Some(bound) => format!("({}", format_numeric(bound.value)),
    }
}

fn escape_text_token(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for ch in token.chars() {
        match ch {
            '$' | '{' | '}' | '\\' | '|' | '.' | '-' | ',' | '<' | '>' | '\'' | '"' | ':' | ';' | '!' | '@' | '#'
            | '%' | '^' | '&' | '*' | '(' | ')' | '+' | '=' | '~' | '[' | ']' | '/' | '?' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// `(@field:term)` for one term, `(@field:(a b))` for several.
fn field_terms(field: &str, terms: &str) -> String {
    if terms.contains(' ') {
        format!("(@{field}:({terms}))")
    } else {
        format!("(@{field}:{terms})")
    }
}

fn join_clauses(conditions: &[FilterCondition], separator: &str) -> String {
    let mut clauses: Vec<String> = conditions
        .iter()
        .map(FilterCondition::to_query_clause)
        .filter(|clause| !clause.is_empty())
        .collect();
    match clauses.len() {
        0 => String::new(),
        1 => clauses.remove(0),
        _ => format!("({})", clauses.join(separator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(keywords: &[&str], conditions: Vec<FilterCondition>) -> NativeQuery {
        NativeQuery {
            expression: QueryExpression::Structured {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                conditions,
            },
            sort: Vec::new(),
            limit: 10,
            offset: 0,
            ids_only: false,
        }
    }

    // ========== Clause rendering ==========

    #[test]
    fn numeric_ranges_render_bounds() {
        assert_eq!(FilterCondition::numeric_gte("rating", 4.0).to_query_clause(), "(@rating:[4 +inf])");
        assert_eq!(FilterCondition::numeric_gt("rating", 4.5).to_query_clause(), "(@rating:[(4.5 +inf])");
        assert_eq!(FilterCondition::numeric_lt("year", 2000.0).to_query_clause(), "(@year:[-inf (2000])");
        assert_eq!(FilterCondition::numeric_lte("year", 2000.0).to_query_clause(), "(@year:[-inf 2000])");
        assert_eq!(FilterCondition::numeric_eq("year", 1988.0).to_query_clause(), "(@year:[1988 1988])");
    }

    #[test]
    fn tag_and_boolean_clauses() {
        assert_eq!(FilterCondition::tag_eq("genre", "sci-fi").to_query_clause(), "(@genre:{sci\\-fi})");
        assert_eq!(
            FilterCondition::tag_in("genre", ["action", "drama"]).to_query_clause(),
            "(@genre:{action|drama})"
        );
        assert_eq!(FilterCondition::tag_prefix("genre", "act").to_query_clause(), "(@genre:{act*})");
        assert_eq!(FilterCondition::bool_eq("featured", true).to_query_clause(), "(@featured:{true})");
    }

    #[test]
    fn text_clauses() {
        assert_eq!(FilterCondition::text_exact("title", "Die Hard").to_query_clause(), "(@title:\"Die Hard\")");
        assert_eq!(FilterCondition::text_contains("title", "ard").to_query_clause(), "(@title:*ard*)");
        assert_eq!(FilterCondition::text_prefix("title", "die ha").to_query_clause(), "(@title:(die ha*))");
    }

    #[test]
    fn multi_word_contains_scopes_every_term_to_the_field() {
        assert_eq!(
            FilterCondition::text_contains("title", "die hard").to_query_clause(),
            "(@title:(*die* *hard*))"
        );
        assert_eq!(
            FilterCondition::text_contains("title", "sci-fi/west").to_query_clause(),
            "(@title:(*sci* *fi* *west*))"
        );
    }

    #[test]
    fn query_syntax_in_text_values_is_escaped() {
        assert_eq!(FilterCondition::text_prefix("title", "$5").to_query_clause(), "(@title:\\$5*)");
        assert_eq!(FilterCondition::text_prefix("title", "a*b").to_query_clause(), "(@title:a\\*b*)");
        assert_eq!(
            FilterCondition::text_contains("title", "#1 $x").to_query_clause(),
            "(@title:(*\\#1* *\\$x*))"
        );
        assert_eq!(
            FilterCondition::text_contains("title", "a^b,c;d<e>f=g+h").to_query_clause(),
            "(@title:*a\\^b\\,c\\;d\\<e\\>f\\=g\\+h*)"
        );
    }

    #[test]
    fn or_joins_with_pipe_and_simplifies() {
        let single = FilterCondition::or([FilterCondition::numeric_eq("year", 1988.0)]);
        assert_eq!(single.to_query_clause(), "(@year:[1988 1988])");
        let pair = FilterCondition::or([
            FilterCondition::text_exact("title", "Heat"),
            FilterCondition::text_exact("title", "Ronin"),
        ]);
        assert_eq!(pair.to_query_clause(), "((@title:\"Heat\")|(@title:\"Ronin\"))");
        assert_eq!(FilterCondition::or([]).to_query_clause(), "");
    }

    #[test]
    fn and_and_not_compose_across_fields() {
        let either = FilterCondition::or([
            FilterCondition::and([FilterCondition::tag_eq("genre", "action"), FilterCondition::numeric_gte("rating", 4.0)]),
            FilterCondition::negate(FilterCondition::bool_eq("featured", false)),
        ]);
        assert_eq!(
            either.to_query_clause(),
            "(((@genre:{action}) (@rating:[4 +inf]))|-(@featured:{false}))"
        );
        assert_eq!(FilterCondition::negate(FilterCondition::and([])).to_query_clause(), "");
    }

    #[test]
    fn numeric_admission_respects_inclusivity() {
        let gt = FilterCondition::numeric_gt("rating", 4.0);
        assert!(!gt.admits_numeric(4.0));
        assert!(gt.admits_numeric(4.01));
        let lte = FilterCondition::numeric_lte("rating", 4.0);
        assert!(lte.admits_numeric(4.0));
        assert!(!lte.admits_numeric(4.01));
        assert!(!FilterCondition::bool_eq("featured", true).admits_numeric(1.0));
    }

    // ========== Whole queries ==========

    #[test]
    fn empty_query_matches_everything() {
        assert_eq!(structured(&[], Vec::new()).query_string(), "*");
    }

    #[test]
    fn clauses_are_space_joined() {
        let query = structured(
            &["die", "hard"],
            vec![
                FilterCondition::numeric_gte("rating", 4.0),
                FilterCondition::numeric_lte("rating", 5.0),
            ],
        );
        assert_eq!(query.query_string(), "(die hard) (@rating:[4 +inf]) (@rating:[-inf 5])");
    }

    #[test]
    fn raw_expressions_pass_through() {
        let mut query = structured(&[], Vec::new());
        query.expression = QueryExpression::Raw("@title:(hard) -@genre:{drama}".to_string());
        assert_eq!(query.query_string(), "@title:(hard) -@genre:{drama}");
        query.expression = QueryExpression::Raw("   ".to_string());
        assert_eq!(query.query_string(), "*");
    }

    #[test]
    fn keyword_tokenization_strips_lexer_characters() {
        assert_eq!(tokenize_keywords("Die Hard: (1988)!"), ["die", "hard", "1988"]);
        assert_eq!(tokenize_keywords("sci-fi/western"), ["sci", "fi", "western"]);
        assert_eq!(tokenize_keywords("'quoted' rock'n'roll"), ["quoted", "rock'n'roll"]);
        assert!(tokenize_keywords("@{}|~").is_empty());
    }

    #[test]
    fn keyword_tokens_are_escaped_when_rendered() {
        let query = structured(&["rock'n'roll"], Vec::new());
        assert_eq!(query.query_string(), "(rock\\'n\\'roll)");
    }

    // ========== Escaping ==========

    #[test]
    fn escape_for_text_prefix_handles_separators() {
        assert_eq!(escape_for_text_prefix("config/db/"), "config db*");
        assert_eq!(escape_for_text_prefix("--"), "*");
        assert_eq!(escape_for_text_prefix("user:name"), "user\\:name*");
    }

    #[test]
    fn escape_for_text_contains_escapes_wildcards() {
        assert_eq!(escape_for_text_contains("50%"), "*50\\%*");
        assert_eq!(escape_for_text_contains("a.b"), "*a\\.b*");
        assert_eq!(escape_for_text_contains("a*b"), "*a\\*b*");
        assert_eq!(escape_for_text_contains(" - "), "");
    }
}
