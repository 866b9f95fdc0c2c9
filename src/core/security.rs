use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

/// Shared secret callers present in `x-api-key`.
#[derive(Clone)]
pub struct ServiceKey {
    value: String,
}

impl ServiceKey {
    /// `None` when no key is configured; the API is then open.
    pub fn from_config(value: Option<&str>) -> Option<Self> {
        value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| ServiceKey {
                value: value.to_string(),
            })
    }

    fn matches(&self, candidate: &str) -> bool {
        self.value.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl std::fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServiceKey(****)")
    }
}

pub fn require_api_key(headers: &HeaderMap, expected: Option<&ServiceKey>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    if !expected.matches(header_value) {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}
