//! Common helpers for embedding providers
//!
//! Shared construction and parsing patterns used across the provider
//! implementations.

use vecthare_domain::error::{Error, Result};

/// Common constructor patterns used by embedding providers
pub mod constructor {
    use super::*;

    /// Trim and validate an API key; empty keys are a config error
    pub fn require_api_key(api_key: Option<&str>, provider: &str) -> Result<String> {
        match api_key.map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(Error::config(format!("{provider} requires an API key"))),
        }
    }

    /// Trim and parse a required URL; raised before any network call
    pub fn require_url(url: Option<&str>, provider: &str) -> Result<String> {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Err(Error::config(format!("{provider} requires an API URL")));
        };
        reqwest::Url::parse(url)
            .map_err(|e| Error::config(format!("{provider} URL '{url}' is invalid: {e}")))?;
        Ok(url.trim_end_matches('/').to_string())
    }

    /// Effective URL with fallback to the provider default
    pub fn effective_url(provided: Option<&str>, default_url: &str) -> String {
        provided
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| default_url.to_string())
    }
}

/// Parse one embedding vector out of a JSON array of numbers
pub fn parse_vector(value: &serde_json::Value, provider: &str) -> Result<Vec<f32>> {
    let array = value.as_array().ok_or_else(|| {
        Error::protocol(format!("{provider} returned a non-array embedding"))
    })?;
    Ok(array
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Verify the provider answered one embedding per input text
pub fn check_count(provider: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::protocol(format!(
            "{provider} response count mismatch: expected {expected}, got {got}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_key_and_url_are_config_errors() {
        assert!(matches!(
            constructor::require_api_key(None, "openai"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            constructor::require_api_key(Some("  "), "openai"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            constructor::require_url(None, "llamacpp"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            constructor::require_url(Some("not a url"), "llamacpp"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn valid_urls_are_normalized() {
        let url = constructor::require_url(Some("http://localhost:8080/"), "llamacpp").unwrap();
        assert_eq!(url, "http://localhost:8080");
    }

    #[test]
    fn vector_parsing() {
        let vector = parse_vector(&json!([0.25, -0.5]), "test").unwrap();
        assert_eq!(vector, vec![0.25, -0.5]);
        assert!(parse_vector(&json!({"no": "array"}), "test").is_err());
    }
}
