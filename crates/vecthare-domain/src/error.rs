//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Remediation a user can apply to clear a fixable error
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FixAction {
    /// Delete the collection and embed its source again
    Revectorize,
    /// Rebuild the collection without duplicate hashes
    Deduplicate,
}

/// Diagnostics attached to an embedding-runtime out-of-memory failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OomDiagnostics {
    /// Provider that ran out of memory
    pub provider: String,
    /// Model being used
    pub model: String,
    /// Number of texts in the failing batch
    pub batch_size: usize,
    /// Length in characters of the largest text in the batch
    pub largest_chunk_len: usize,
    /// Index of the largest text within the batch
    pub largest_chunk_index: usize,
}

impl std::fmt::Display for OomDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "provider={} model={} batch_size={} largest_chunk={} chars (index {})",
            self.provider, self.model, self.batch_size, self.largest_chunk_len,
            self.largest_chunk_index
        )
    }
}

/// Main error type for the VectHare retrieval substrate
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration; fatal at subsystem init, never retried
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// DNS/connect/timeout against a remote service; retryable with backoff
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed response or unexpected wire shape; not retried
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol error
        message: String,
    },

    /// Vector length does not match the collection's established dimensions
    #[error(
        "Dimension mismatch in collection '{collection}': expected {expected}, got {got}. \
         Delete the collection and re-vectorize with the current model."
    )]
    DimensionMismatch {
        /// Logical collection the insert targeted
        collection: String,
        /// Dimensions established at first insert
        expected: usize,
        /// Dimensions of the rejected vectors
        got: usize,
    },

    /// Embedding-runtime out-of-memory; not retried, annotated for tuning
    #[error("Embedding runtime out of memory: {message} ({diagnostics})")]
    Oom {
        /// The runtime's own error text
        message: String,
        /// Batch-shape diagnostics for chunk-size tuning
        diagnostics: OomDiagnostics,
    },

    /// Health check failed or the backend answered 5xx; invalidates cached health
    #[error("Backend unavailable: {message}")]
    TransientBackend {
        /// Description of the transient failure
        message: String,
    },

    /// Duplicate hashes, orphaned metadata, and similar non-fatal findings
    #[error("Data integrity warning: {message}")]
    DataIntegrity {
        /// Description of the integrity finding
        message: String,
    },

    /// Resource not found error
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Invalid argument provided to a function
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// I/O operation error
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON parsing or serialization error
    #[error("JSON parsing error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

// Basic error creation methods
impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source
    pub fn network_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<S: Into<String>>(collection: S, expected: usize, got: usize) -> Self {
        Self::DimensionMismatch {
            collection: collection.into(),
            expected,
            got,
        }
    }

    /// Create a transient backend error
    pub fn transient_backend<S: Into<String>>(message: S) -> Self {
        Self::TransientBackend {
            message: message.into(),
        }
    }

    /// Create a data integrity warning
    pub fn data_integrity<S: Into<String>>(message: S) -> Self {
        Self::DataIntegrity {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// Classification helpers used by retry and health-invalidation policy
impl Error {
    /// Errors worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::TransientBackend { .. })
    }

    /// Errors that should invalidate a cached backend's health flag
    pub fn invalidates_health(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::TransientBackend { .. })
    }

    /// Whether a user remediation exists for this error
    pub fn is_fixable(&self) -> bool {
        self.fix_action().is_some()
    }

    /// The remediation for fixable errors
    pub fn fix_action(&self) -> Option<FixAction> {
        match self {
            Self::DimensionMismatch { .. } => Some(FixAction::Revectorize),
            Self::DataIntegrity { .. } => Some(FixAction::Deduplicate),
            _ => None,
        }
    }
}

/// Recognize the embedding-runtime OOM signature in an error message.
///
/// The local ONNX runtime reports exhaustion either through an `OrtRun`
/// failure or a bare `error code = 6`.
pub fn is_oom_signature(message: &str) -> bool {
    message.contains("OrtRun") || message.contains("error code = 6")
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Internal {
            message: s.to_string(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Internal { message: s }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_is_fixable_by_revectorize() {
        let err = Error::dimension_mismatch("vh:chat:abc", 384, 768);
        assert!(err.is_fixable());
        assert_eq!(err.fix_action(), Some(FixAction::Revectorize));
        let text = err.to_string();
        assert!(text.contains("expected 384"));
        assert!(text.contains("got 768"));
    }

    #[test]
    fn oom_signature_detection() {
        assert!(is_oom_signature("OrtRun failed on node 12"));
        assert!(is_oom_signature("non-specific failure, error code = 6"));
        assert!(!is_oom_signature("connection refused"));
    }

    #[test]
    fn retryable_classification() {
        assert!(Error::network("dns failure").is_retryable());
        assert!(Error::transient_backend("503").is_retryable());
        assert!(!Error::config("missing url").is_retryable());
        assert!(!Error::protocol("bad shape").is_retryable());
    }
}
