//! The contract between docsift and a concrete search engine.
//!
//! Adapters receive documents as flat `(name, kind, value)` triples and
//! queries as a [`NativeQuery`]; they never see [`Document`](crate::Document)
//! or [`Schema`] values beyond what [`SearchBackend::ensure_schema`] needs.

pub mod memory;
pub mod redis;

use serde::Serialize;

use crate::errors::BackendError;
use crate::schema::Schema;
use crate::search::NativeQuery;
use crate::value::{FieldKind, FieldValue};

pub use memory::MemoryBackend;
pub use redis::RedisBackend;

/// One stored attribute: field name, declared kind and coerced value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendField {
    pub name: String,
    pub kind: FieldKind,
    pub value: FieldValue,
}

impl BackendField {
    pub fn new(name: impl Into<String>, kind: FieldKind, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }
}

/// A stored document as the backend hands it back.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub doc_id: String,
    pub fields: Vec<BackendField>,
}

/// One page of hits plus the number of documents matching overall.
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub total: usize,
    pub results: Vec<RawResult>,
}

#[allow(async_fn_in_trait)]
pub trait SearchBackend {
    /// Store (or replace) the document under `doc_id`.
    async fn put(&self, doc_id: &str, fields: &[BackendField]) -> Result<(), BackendError>;

    /// Delete the document; returns whether anything was removed.
    async fn remove(&self, doc_id: &str) -> Result<bool, BackendError>;

    async fn get(&self, doc_id: &str) -> Result<Option<RawResult>, BackendError>;

    /// Run one query. Ordering, window and ids-only mode travel inside `query`.
    async fn execute_query(&self, query: &NativeQuery) -> Result<QueryResponse, BackendError>;

    /// Prepare the backend's index for documents of `schema`.
    async fn ensure_schema(&self, _schema: &Schema) -> Result<(), BackendError> {
        Ok(())
    }
}
