use serde_json::{Map, Value};

use crate::core::errors::ConfigError;
use crate::rag::Distance;

pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_optional_string_field(server, "server.api_key", "api_key")?;
        validate_u64_field(
            server,
            "server.max_body_bytes",
            "max_body_bytes",
            1_024,
            1 << 30,
        )?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_url_field(embedding, "embedding.base_url", "base_url", &["http", "https"])?;
        validate_optional_string_field(embedding, "embedding.api_key", "api_key")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_u64_field(embedding, "embedding.dimension", "dimension", 1, 65_536)?;
        validate_u64_field(embedding, "embedding.batch_size", "batch_size", 1, 2_048)?;
        validate_u64_field(
            embedding,
            "embedding.max_concurrent_batches",
            "max_concurrent_batches",
            1,
            64,
        )?;
        validate_u64_field(
            embedding,
            "embedding.request_timeout_secs",
            "request_timeout_secs",
            1,
            3_600,
        )?;
    }

    if let Some(store) = expect_optional_object(root, "vector_store")? {
        validate_url_field(store, "vector_store.url", "url", &["http", "https", "sqlite"])?;
        validate_optional_string_field(store, "vector_store.api_key", "api_key")?;
        validate_optional_string_field(store, "vector_store.collection", "collection")?;
        validate_distance_field(store, "vector_store.distance", "distance")?;
        validate_u64_field(
            store,
            "vector_store.request_timeout_secs",
            "request_timeout_secs",
            1,
            3_600,
        )?;
    }

    if let Some(chunking) = expect_optional_object(root, "chunking")? {
        validate_u64_field(chunking, "chunking.chunk_size", "chunk_size", 1, 1_000_000)?;
        validate_u64_field(
            chunking,
            "chunking.chunk_overlap",
            "chunk_overlap",
            0,
            1_000_000,
        )?;
        let size = chunking.get("chunk_size").and_then(Value::as_u64).unwrap_or(800);
        let overlap = chunking
            .get("chunk_overlap")
            .and_then(Value::as_u64)
            .unwrap_or(160);
        if overlap >= size {
            return Err(ConfigError::invalid(
                "chunking.chunk_overlap",
                format!("must be smaller than chunk_size ({size})"),
            ));
        }
    }

    if let Some(indexing) = expect_optional_object(root, "indexing")? {
        validate_u64_field(
            indexing,
            "indexing.max_concurrent_runs",
            "max_concurrent_runs",
            1,
            256,
        )?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.default_limit", "default_limit", 1, 1_000)?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ConfigError::invalid(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_url_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    schemes: &[&str],
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    let scheme = text.trim().split_once(':').map(|(scheme, _)| scheme);
    match scheme {
        Some(scheme) if schemes.contains(&scheme.to_ascii_lowercase().as_str()) => Ok(()),
        _ => Err(ConfigError::invalid(
            path,
            format!("url scheme must be one of {}", schemes.join(", ")),
        )),
    }
}

fn validate_distance_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    text.parse::<Distance>()
        .map(|_| ())
        .map_err(|err| ConfigError::invalid(path, err.to_string()))
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::invalid(path, format!("expected {}", expected))
}
