use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::ConfigError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 10] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
    "access_token",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "token_count", "tokens"];

/// Environment variables that override single config values.
const ENV_OVERRIDES: [(&str, &[&str]); 5] = [
    ("CONTEXT_RAG_VECTOR_STORE_URL", &["vector_store", "url"]),
    ("CONTEXT_RAG_VECTOR_STORE_API_KEY", &["vector_store", "api_key"]),
    ("CONTEXT_RAG_EMBEDDING_API_KEY", &["embedding", "api_key"]),
    ("CONTEXT_RAG_EMBEDDING_BASE_URL", &["embedding", "base_url"]),
    ("CONTEXT_RAG_SERVICE_API_KEY", &["server", "api_key"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("CONTEXT_RAG_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// `config.yml` deep-merged with `secrets.yaml`, before env overrides.
    pub fn load_config(&self) -> Result<Value, ConfigError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        Ok(deep_merge(&public_config, &secrets_config))
    }

    /// The effective configuration: files, then environment, validated and typed.
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let merged = apply_env_overrides(self.load_config()?, |name| env::var(name).ok());
        validate_config(&merged)?;

        tracing::info!(
            "Effective configuration: {}",
            redact_sensitive_values(&merged)
        );

        serde_json::from_value(merged).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|err| ConfigError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let value = serde_yaml::from_str::<Value>(&contents)
        .map_err(|err| ConfigError::Parse(format!("{}: {}", path.display(), err)))?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::Parse(format!(
            "{}: top level must be a mapping",
            path.display()
        ))),
    }
}

fn apply_env_overrides<F>(mut config: Value, lookup: F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    for (name, path) in ENV_OVERRIDES {
        if let Some(value) = present(name) {
            set_path(&mut config, path, Value::String(value));
        }
    }

    let embedding_key_set = config
        .pointer("/embedding/api_key")
        .and_then(Value::as_str)
        .is_some_and(|key| !key.trim().is_empty());
    if !embedding_key_set {
        if let Some(value) = present("OPENAI_API_KEY") {
            set_path(&mut config, &["embedding", "api_key"], Value::String(value));
        }
    }

    if let Some(port) = present("PORT") {
        match port.trim().parse::<u16>() {
            Ok(port) => set_path(&mut config, &["server", "port"], Value::from(port)),
            Err(_) => tracing::warn!("Ignoring PORT={}: not a valid port", port),
        }
    }

    config
}

fn set_path(config: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = config;
    for key in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
