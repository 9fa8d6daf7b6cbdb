//! RediSearch adapter.
//!
//! Documents are stored as Redis hashes under `{key_prefix}:{index}:{doc_id}`
//! with a `__kinds` entry mapping each field to its [`FieldKind`], so stored
//! values can be decoded without the schema. Text fields are indexed as
//! `TEXT`, atoms and booleans as `TAG`, numbers and dates as `NUMERIC`
//! (dates as Unix seconds at midnight UTC).

use std::collections::HashMap;

use log::{debug, info, warn};
use redis::{Cmd, Value, aio::ConnectionManager, cmd, from_redis_value};

use crate::config::IndexConfig;
use crate::errors::{BackendError, SearchError};
use crate::keys::KeyContext;
use crate::schema::Schema;
use crate::search::NativeQuery;
use crate::value::{FieldKind, FieldValue, date_to_timestamp, format_numeric, timestamp_to_date};

use super::{BackendField, QueryResponse, RawResult, SearchBackend};

const KINDS_FIELD: &str = "__kinds";
const KEY_FIELD: &str = "__key";
const TAG_SEPARATOR: &str = "|";
const DIALECT: u32 = 2;

#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    index_name: String,
    key_prefix: String,
}

impl RedisBackend {
    pub fn new(conn: ConnectionManager, index_name: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            index_name: index_name.into(),
            key_prefix: key_prefix.into(),
        }
    }

    /// Open a managed connection to the server named by `config`.
    pub async fn connect(config: &IndexConfig) -> Result<Self, SearchError> {
        let url = config.redis_url()?;
        let client = redis::Client::open(url.as_str()).map_err(BackendError::from)?;
        let conn = ConnectionManager::new(client).await.map_err(BackendError::from)?;
        Ok(Self::new(conn, config.name.as_str(), config.key_prefix.as_str()))
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.key_prefix, &self.index_name)
    }

    async fn load_hashes(&self, keys: &[String]) -> Result<Vec<HashMap<String, String>>, BackendError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.hgetall(key);
        }
        let mut conn = self.conn.clone();
        Ok(pipe.query_async(&mut conn).await?)
    }
}

impl SearchBackend for RedisBackend {
    async fn put(&self, doc_id: &str, fields: &[BackendField]) -> Result<(), BackendError> {
        let key = self.keys().document(doc_id);
        let entries = encode_fields(fields)?;
        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore().hset_multiple(&key, &entries).ignore();
        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn).await?;
        debug!("stored {} ({} fields)", key, fields.len());
        Ok(())
    }

    async fn remove(&self, doc_id: &str) -> Result<bool, BackendError> {
        let key = self.keys().document(doc_id);
        let mut conn = self.conn.clone();
        let removed: i64 = cmd("DEL").arg(&key).query_async(&mut conn).await?;
        debug!("removed {} ({})", key, removed);
        Ok(removed > 0)
    }

    async fn get(&self, doc_id: &str) -> Result<Option<RawResult>, BackendError> {
        let key = self.keys().document(doc_id);
        let mut conn = self.conn.clone();
        let hash: HashMap<String, String> = cmd("HGETALL").arg(&key).query_async(&mut conn).await?;
        if hash.is_empty() {
            return Ok(None);
        }
        Ok(Some(RawResult {
            doc_id: doc_id.to_string(),
            fields: decode_fields(hash)?,
        }))
    }

    async fn execute_query(&self, query: &NativeQuery) -> Result<QueryResponse, BackendError> {
        let keys = self.keys();
        let mut conn = self.conn.clone();

        if query.sort.len() <= 1 {
            let command = search_command(&self.index_name, query);
            let raw: Value = command.query_async(&mut conn).await?;
            return parse_search_response(&raw, &keys, query.ids_only);
        }

        // FT.SEARCH sorts by a single key only.
        let command = aggregate_command(&self.index_name, query);
        let raw: Value = command.query_async(&mut conn).await?;
        let (total, found) = parse_aggregate_keys(&raw)?;
        let hashes = if query.ids_only {
            vec![HashMap::new(); found.len()]
        } else {
            self.load_hashes(&found).await?
        };

        let mut results = Vec::with_capacity(found.len());
        for (key, hash) in found.iter().zip(hashes) {
            if !query.ids_only && hash.is_empty() {
                debug!("{} disappeared between aggregate and load", key);
                continue;
            }
            results.push(RawResult {
                doc_id: doc_id_for(&keys, key),
                fields: decode_fields(hash)?,
            });
        }
        Ok(QueryResponse { total, results })
    }

    async fn ensure_schema(&self, schema: &Schema) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let indexes: Vec<String> = cmd("FT._LIST").query_async(&mut conn).await?;
        if indexes.iter().any(|name| name == &self.index_name) {
            return Ok(());
        }

        let command = create_index_command(&self.index_name, &self.keys().index_prefix(), schema);
        if let Err(err) = command.query_async::<()>(&mut conn).await {
            if index_exists_error(&err) {
                return Ok(());
            }
            return Err(err.into());
        }
        info!("created search index '{}' for schema '{}'", self.index_name, schema.name());
        Ok(())
    }
}

pub(crate) fn search_command(index_name: &str, query: &NativeQuery) -> Cmd {
    let mut command = cmd("FT.SEARCH");
    command.arg(index_name).arg(query.query_string());
    if query.ids_only {
        command.arg("NOCONTENT");
    }
    if let Some(sort) = query.sort.first() {
        command.arg("SORTBY").arg(&sort.field).arg(sort.order.as_str());
    }
    command.arg("LIMIT").arg(query.offset).arg(query.limit);
    command.arg("DIALECT").arg(DIALECT);
    command
}

pub(crate) fn aggregate_command(index_name: &str, query: &NativeQuery) -> Cmd {
    let mut command = cmd("FT.AGGREGATE");
    command.arg(index_name).arg(query.query_string());
    command.arg("LOAD").arg(1).arg(format!("@{KEY_FIELD}"));
    command.arg("SORTBY").arg(query.sort.len() * 2);
    for sort in &query.sort {
        command.arg(format!("@{}", sort.field)).arg(sort.order.as_str());
    }
    command.arg("LIMIT").arg(query.offset).arg(query.limit);
    command.arg("DIALECT").arg(DIALECT);
    command
}

pub(crate) fn create_index_command(index_name: &str, prefix: &str, schema: &Schema) -> Cmd {
    let mut command = cmd("FT.CREATE");
    command.arg(index_name);
    command.arg("ON").arg("HASH");
    command.arg("PREFIX").arg(1).arg(prefix);
    command.arg("SCHEMA");
    for field in schema.fields() {
        command.arg(field.name());
        match field.kind() {
            FieldKind::Text => {
                command.arg("TEXT");
            }
            FieldKind::Atom | FieldKind::Boolean => {
                command.arg("TAG").arg("SEPARATOR").arg(TAG_SEPARATOR);
            }
            FieldKind::Integer | FieldKind::Float | FieldKind::Date => {
                command.arg("NUMERIC");
            }
        }
        command.arg("SORTABLE");
    }
    command
}

fn index_exists_error(err: &redis::RedisError) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("already exists") && msg.contains("index")
}

/// Hash entries for a document, including the `__kinds` map.
pub(crate) fn encode_fields(fields: &[BackendField]) -> Result<Vec<(String, String)>, BackendError> {
    let mut entries = Vec::with_capacity(fields.len() + 1);
    let mut kinds = HashMap::with_capacity(fields.len());
    for field in fields {
        let encoded = match &field.value {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Integer(number) => number.to_string(),
            FieldValue::Float(number) => format_numeric(*number),
            FieldValue::Boolean(flag) => flag.to_string(),
            FieldValue::Date(date) => date_to_timestamp(*date).to_string(),
        };
        kinds.insert(field.name.as_str(), field.kind);
        entries.push((field.name.clone(), encoded));
    }
    let kinds = serde_json::to_string(&kinds)
        .map_err(|err| BackendError::response(format!("failed to encode field kinds: {err}")))?;
    entries.push((KINDS_FIELD.to_string(), kinds));
    Ok(entries)
}

/// Rebuild typed fields from a stored hash. Entries without a known kind come back as text.
pub(crate) fn decode_fields(mut hash: HashMap<String, String>) -> Result<Vec<BackendField>, BackendError> {
    let kinds: HashMap<String, FieldKind> = match hash.remove(KINDS_FIELD) {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!("ignoring unreadable {KINDS_FIELD} entry: {err}");
            HashMap::new()
        }),
        None => HashMap::new(),
    };
    hash.remove(KEY_FIELD);

    let mut names: Vec<String> = hash.keys().cloned().collect();
    names.sort();
    let mut fields = Vec::with_capacity(names.len());
    for name in names {
        let Some(raw) = hash.remove(&name) else { continue };
        let Some(kind) = kinds.get(&name).copied() else {
            warn!("stored field '{name}' has no recorded kind; reading it as text");
            fields.push(BackendField::new(name, FieldKind::Text, FieldValue::Text(raw)));
            continue;
        };
        let value = decode_value(kind, &raw)
            .ok_or_else(|| BackendError::response(format!("stored {kind} field '{name}' holds '{raw}'")))?;
        fields.push(BackendField::new(name, kind, value));
    }
    Ok(fields)
}

fn decode_value(kind: FieldKind, raw: &str) -> Option<FieldValue> {
    match kind {
        FieldKind::Text | FieldKind::Atom => Some(FieldValue::Text(raw.to_string())),
        FieldKind::Integer => raw.parse().ok().map(FieldValue::Integer),
        FieldKind::Float => raw.parse().ok().map(FieldValue::Float),
        FieldKind::Boolean => match raw {
            "true" => Some(FieldValue::Boolean(true)),
            "false" => Some(FieldValue::Boolean(false)),
            _ => None,
        },
        FieldKind::Date => raw.parse().ok().and_then(timestamp_to_date).map(FieldValue::Date),
    }
}

fn doc_id_for(keys: &KeyContext<'_>, key: &str) -> String {
    match keys.doc_id_from_key(key) {
        Some(doc_id) => doc_id.to_string(),
        None => {
            warn!("search hit '{key}' is outside the index key prefix");
            key.to_string()
        }
    }
}

/// Parse an `FT.SEARCH` reply: `[total, key, [field, value, ...], key, ...]`
/// (no field arrays when `NOCONTENT` was sent).
pub(crate) fn parse_search_response(
    raw: &Value,
    keys: &KeyContext<'_>,
    ids_only: bool,
) -> Result<QueryResponse, BackendError> {
    let Value::Array(values) = raw else {
        return Err(BackendError::response(format!("unexpected search reply: {raw:?}")));
    };
    let Some((first, rest)) = values.split_first() else {
        return Ok(QueryResponse::default());
    };
    let total = parse_total(first)?;

    let stride = if ids_only { 1 } else { 2 };
    let mut results = Vec::with_capacity(rest.len() / stride);
    for chunk in rest.chunks(stride) {
        let key = value_to_string(&chunk[0])?;
        let fields = match chunk.get(1) {
            Some(Value::Array(items)) => decode_fields(pairs_to_map(items)?)?,
            Some(Value::Map(items)) => {
                let mut hash = HashMap::with_capacity(items.len());
                for (name, value) in items {
                    hash.insert(value_to_string(name)?, value_to_string(value)?);
                }
                decode_fields(hash)?
            }
            Some(Value::Nil) | None => Vec::new(),
            Some(other) => return Err(BackendError::response(format!("unexpected document payload: {other:?}"))),
        };
        results.push(RawResult {
            doc_id: doc_id_for(keys, &key),
            fields,
        });
    }
    Ok(QueryResponse { total, results })
}

/// Parse an `FT.AGGREGATE ... LOAD 1 @__key` reply into the hit count and keys.
pub(crate) fn parse_aggregate_keys(raw: &Value) -> Result<(usize, Vec<String>), BackendError> {
    let Value::Array(values) = raw else {
        return Err(BackendError::response(format!("unexpected aggregate reply: {raw:?}")));
    };
    let Some((first, rest)) = values.split_first() else {
        return Ok((0, Vec::new()));
    };
    let total = parse_total(first)?;
    let mut keys = Vec::with_capacity(rest.len());
    for row in rest {
        let Value::Array(items) = row else {
            return Err(BackendError::response(format!("unexpected aggregate row: {row:?}")));
        };
        let mut row = pairs_to_map(items)?;
        match row.remove(KEY_FIELD) {
            Some(key) => keys.push(key),
            None => return Err(BackendError::response("aggregate row is missing the document key")),
        }
    }
    Ok((total, keys))
}

fn parse_total(value: &Value) -> Result<usize, BackendError> {
    match value {
        Value::Int(total) => usize::try_from(*total).map_err(|_| BackendError::response(format!("negative total {total}"))),
        other => value_to_string(other)?
            .parse()
            .map_err(|_| BackendError::response(format!("invalid total count: {other:?}"))),
    }
}

fn pairs_to_map(items: &[Value]) -> Result<HashMap<String, String>, BackendError> {
    let mut map = HashMap::with_capacity(items.len() / 2);
    for pair in items.chunks(2) {
        if let [name, value] = pair {
            map.insert(value_to_string(name)?, value_to_string(value)?);
        }
    }
    Ok(map)
}

fn value_to_string(value: &Value) -> Result<String, BackendError> {
    match value {
        Value::BulkString(bytes) => String::from_utf8(bytes.clone())
            .map_err(|err| BackendError::response(format!("invalid UTF-8 in reply: {err}"))),
        Value::SimpleString(status) => Ok(status.clone()),
        Value::Int(v) => Ok(v.to_string()),
        Value::Double(v) => Ok(v.to_string()),
        Value::Boolean(v) => Ok(v.to_string()),
        Value::VerbatimString { text, .. } => Ok(text.clone()),
        _ => from_redis_value::<String>(value)
            .map_err(|err| BackendError::response(format!("unexpected reply value: {err}"))),
    }
}
