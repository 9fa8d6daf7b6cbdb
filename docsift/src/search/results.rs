use std::sync::Arc;
use std::vec;

use crate::backend::{QueryResponse, RawResult};
use crate::document::Document;
use crate::errors::SearchError;
use crate::schema::Schema;

/// Documents returned by one query execution.
///
/// Rows are rebuilt into [`Document`]s one at a time as the iterator is
/// advanced; once consumed the sequence cannot be restarted.
#[derive(Debug)]
pub struct SearchResults {
    schema: Arc<Schema>,
    total: usize,
    rows: vec::IntoIter<RawResult>,
}

impl SearchResults {
    pub(crate) fn new(schema: Arc<Schema>, response: QueryResponse) -> Self {
        Self {
            schema,
            total: response.total,
            rows: response.results.into_iter(),
        }
    }

    /// Matches across the whole index, not just this window.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Collect the remaining documents, stopping at the first one that fails to rehydrate.
    pub fn into_documents(self) -> Result<Vec<Document>, SearchError> {
        self.collect()
    }
}

impl Iterator for SearchResults {
    type Item = Result<Document, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(Document::from_backend_result(self.schema.clone(), row).map_err(SearchError::from))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for SearchResults {}
