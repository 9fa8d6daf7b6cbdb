use std::ops::{BitAnd, BitOr, Not};

use crate::value::Value;

/// A filter expression over `field__lookup` restrictions, composable across fields.
///
/// Combine criteria with `&` (all), `|` (any) and `!` (not), then pass the
/// result to [`Query::filter_where`](super::Query::filter_where). Values are
/// coerced by the target schema when the criterion is added to a query.
///
/// ```
/// use docsift::search::Criterion;
///
/// let wanted = (Criterion::new("genre", "action") | Criterion::new("rating__gte", 4.5))
///     & !Criterion::new("featured", false);
/// assert!(matches!(wanted, Criterion::All(ref parts) if parts.len() == 2));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Match { field_lookup: String, value: Value },
    All(Vec<Criterion>),
    Any(Vec<Criterion>),
    Not(Box<Criterion>),
}

impl Criterion {
    pub fn new(field_lookup: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Match {
            field_lookup: field_lookup.into(),
            value: value.into(),
        }
    }

    /// Match any of `values` on one `field__lookup`.
    pub fn any_of<I, V>(field_lookup: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Any(values.into_iter().map(|value| Self::new(field_lookup, value)).collect())
    }

    pub fn all(criteria: impl IntoIterator<Item = Criterion>) -> Self {
        Self::All(criteria.into_iter().collect())
    }

    pub fn any(criteria: impl IntoIterator<Item = Criterion>) -> Self {
        Self::Any(criteria.into_iter().collect())
    }
}

impl BitAnd for Criterion {
    type Output = Criterion;

    fn bitand(self, rhs: Criterion) -> Criterion {
        let mut parts = match self {
            Criterion::All(parts) => parts,
            other => vec![other],
        };
        match rhs {
            Criterion::All(more) => parts.extend(more),
            other => parts.push(other),
        }
        Criterion::All(parts)
    }
}

impl BitOr for Criterion {
    type Output = Criterion;

    fn bitor(self, rhs: Criterion) -> Criterion {
        let mut parts = match self {
            Criterion::Any(parts) => parts,
            other => vec![other],
        };
        match rhs {
            Criterion::Any(more) => parts.extend(more),
            other => parts.push(other),
        }
        Criterion::Any(parts)
    }
}

impl Not for Criterion {
    type Output = Criterion;

    fn not(self) -> Criterion {
        match self {
            Criterion::Not(inner) => *inner,
            other => Criterion::Not(Box::new(other)),
        }
    }
}
