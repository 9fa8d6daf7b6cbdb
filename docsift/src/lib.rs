//! docsift: typed documents and a chainable query builder over a full-text search backend.
//!
//! Document types declare their fields once through [`DocumentType`]; values
//! are coerced and validated on every assignment; queries are assembled with
//! [`Query`] and executed against any [`SearchBackend`]. A RediSearch adapter
//! ([`RedisBackend`]) and an in-process adapter ([`MemoryBackend`]) ship with
//! the crate.

pub mod backend;
pub mod config;
pub mod document;
pub mod errors;
pub mod fields;
pub mod id;
pub mod index;
pub mod keys;
pub mod preprocessors;
pub mod registry;
pub mod schema;
pub mod search;
pub mod value;

pub use backend::{BackendField, MemoryBackend, QueryResponse, RawResult, RedisBackend, SearchBackend};
pub use config::IndexConfig;
pub use document::Document;
pub use errors::*;
pub use fields::Field;
pub use index::Index;
pub use preprocessors::Preprocessor;
pub use registry::{get_schema, register_schema};
pub use schema::{DocumentType, Schema, SchemaBuilder};
pub use search::{Criterion, Query, QueryLimits, SearchResults, SortOrder};
pub use value::{FieldKind, FieldValue, Value};
