//! The facade tying schemas, documents and queries to one backend index.

use std::sync::Arc;

use log::debug;

use crate::backend::{RedisBackend, SearchBackend};
use crate::config::IndexConfig;
use crate::document::Document;
use crate::errors::{SearchError, ValidationError};
use crate::schema::{DocumentType, Schema};
use crate::search::Query;

pub struct Index<B> {
    backend: B,
    config: IndexConfig,
}

impl<B: SearchBackend> Index<B> {
    pub fn new(backend: B, config: IndexConfig) -> Self {
        Self { backend, config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Create (or confirm) the backend index for documents of `D`.
    pub async fn ensure_schema<D: DocumentType>(&self) -> Result<(), SearchError> {
        let schema = D::schema()?;
        self.backend.ensure_schema(&schema).await?;
        Ok(())
    }

    /// Store a document, replacing any previous version with the same id.
    pub async fn add(&self, document: &Document) -> Result<(), SearchError> {
        let doc_id = required_id(document)?;
        let payload = document.to_backend_payload();
        debug!("adding '{}' to index '{}'", doc_id, self.name());
        self.backend.put(doc_id, &payload).await?;
        Ok(())
    }

    /// Store several documents, one backend call each. Every id is checked before anything is sent.
    pub async fn add_many(&self, documents: &[Document]) -> Result<usize, SearchError> {
        for document in documents {
            required_id(document)?;
        }
        for document in documents {
            self.add(document).await?;
        }
        Ok(documents.len())
    }

    /// Remove a document; returns whether it existed.
    pub async fn remove(&self, doc_id: &str) -> Result<bool, SearchError> {
        if doc_id.is_empty() {
            return Err(missing_id().into());
        }
        debug!("removing '{}' from index '{}'", doc_id, self.name());
        Ok(self.backend.remove(doc_id).await?)
    }

    /// Remove several documents; returns how many existed.
    pub async fn remove_many<I, S>(&self, doc_ids: I) -> Result<usize, SearchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = 0;
        for doc_id in doc_ids {
            if self.remove(doc_id.as_ref()).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Fetch one document of type `D` by id.
    pub async fn get<D: DocumentType>(&self, doc_id: &str) -> Result<Option<Document>, SearchError> {
        self.get_with_schema(doc_id, D::schema()?).await
    }

    pub async fn get_with_schema(&self, doc_id: &str, schema: Arc<Schema>) -> Result<Option<Document>, SearchError> {
        match self.backend.get(doc_id).await? {
            Some(raw) => Ok(Some(Document::from_backend_result(schema, raw)?)),
            None => Ok(None),
        }
    }

    /// Start a query over documents of type `D`.
    pub fn search<D: DocumentType>(&self) -> Result<Query<'_, B>, SearchError> {
        Ok(self.search_schema(D::schema()?))
    }

    pub fn search_schema(&self, schema: Arc<Schema>) -> Query<'_, B> {
        Query::new(&self.backend, schema, self.config.limits())
    }
}

impl Index<RedisBackend> {
    /// Connect to the Redis server named by `config`.
    pub async fn connect(config: IndexConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let backend = RedisBackend::connect(&config).await?;
        Ok(Self::new(backend, config))
    }
}

fn required_id(document: &Document) -> Result<&str, ValidationError> {
    match document.doc_id() {
        Some(doc_id) if !doc_id.is_empty() => Ok(doc_id),
        _ => Err(missing_id()),
    }
}

fn missing_id() -> ValidationError {
    ValidationError::single("doc_id", "required", "a document id is required")
}
