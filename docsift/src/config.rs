use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::search::QueryLimits;

/// Settings for one search index.
///
/// Loaded from TOML, either as a bare table or under an `[index]` section:
///
/// ```toml
/// [index]
/// name = "films"
/// key_prefix = "catalog"
/// redis_url = "${REDIS_URL}"
/// max_limit = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_window")]
    pub max_limit: usize,
    #[serde(default = "default_window")]
    pub max_offset: usize,
    #[serde(default = "default_window")]
    pub default_limit: usize,
}

fn default_key_prefix() -> String {
    "docsift".to_string()
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

fn default_window() -> usize {
    1000
}

#[derive(Deserialize)]
struct ConfigFile {
    index: IndexConfig,
}

impl IndexConfig {
    /// A config with every optional setting at its default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_prefix: default_key_prefix(),
            redis_url: default_redis_url(),
            max_limit: default_window(),
            max_offset: default_window(),
            default_limit: default_window(),
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(source)?;
        let config = if matches!(table.get("index"), Some(toml::Value::Table(_))) {
            toml::Value::Table(table).try_into::<ConfigFile>()?.index
        } else {
            toml::Value::Table(table).try_into::<IndexConfig>()?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The Redis URL with a `${VAR}` placeholder expanded from the environment.
    pub fn redis_url(&self) -> Result<String, ConfigError> {
        let url = self.redis_url.trim();
        match url.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            Some(var) => std::env::var(var).map_err(|_| ConfigError::MissingEnv { var: var.to_string() }),
            None => Ok(url.to_string()),
        }
    }

    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            max_limit: self.max_limit,
            max_offset: self.max_offset,
            default_limit: self.default_limit,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() || self.name.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                message: format!("index name '{}' must be non-empty and contain no whitespace", self.name),
            });
        }
        if self.key_prefix.is_empty() || self.key_prefix.contains(':') {
            return Err(ConfigError::Invalid {
                message: format!("key prefix '{}' must be non-empty and contain no ':'", self.key_prefix),
            });
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid {
                message: format!(
                    "default_limit {} exceeds max_limit {}",
                    self.default_limit, self.max_limit
                ),
            });
        }
        Ok(())
    }
}
