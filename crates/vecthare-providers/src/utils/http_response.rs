//! HTTP Response Utilities
//!
//! Maps provider HTTP responses into the domain error taxonomy and parses
//! JSON bodies. Shared by the embedding providers and the HTTP-transport
//! vector backends.

use reqwest::Response;

use vecthare_domain::error::{Error, Result};

/// Utilities for processing HTTP responses
pub struct HttpResponseUtils;

impl HttpResponseUtils {
    /// Check response status and parse JSON.
    ///
    /// Non-success statuses become taxonomy errors: 5xx is transient,
    /// anything else is a protocol error carrying the body text.
    pub async fn check_and_parse(response: Response, provider_name: &str) -> Result<serde_json::Value> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let code = status.as_u16();

            return Err(match code {
                401 | 403 => Error::config(format!(
                    "{provider_name} authentication failed ({code}): {error_text}"
                )),
                500..=599 => Error::transient_backend(format!(
                    "{provider_name} server error ({code}): {error_text}"
                )),
                _ => Error::protocol(format!(
                    "{provider_name} request failed ({code}): {error_text}"
                )),
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::protocol(format!("{provider_name} response parse failed: {e}")))
    }

    /// Map a reqwest transport error to the taxonomy
    pub fn transport_error(provider_name: &str, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::network(format!("{provider_name} request timed out: {error}"))
        } else if error.is_connect() {
            Error::network_with_source(format!("{provider_name} connection failed"), error)
        } else {
            Error::network_with_source(format!("{provider_name} request failed"), error)
        }
    }
}
