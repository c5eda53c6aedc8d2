//! Error types for the complaint triage service

/// Result type alias using the triage Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for triage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The inference endpoint answered with a non-success status
    #[error("upstream returned {status}: {body}")]
    Upstream {
        /// HTTP status reported by the upstream service
        status: u16,
        /// Raw upstream body, passed through to the caller
        body: String,
    },

    /// The inference endpoint reported an `{"error": ...}` body (model loading, overloaded)
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The inference response had a shape the normalizer does not understand
    #[error("unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Local classifier execution errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Policy definition errors
    #[error("policy error: {0}")]
    Policy(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Complaint backend errors
    #[error("backend error: {0}")]
    Backend(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new upstream error
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Create a new model-unavailable error
    pub fn model_unavailable(msg: impl Into<String>) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    /// Create a new unexpected-response error carrying the raw payload
    pub fn unexpected_response(raw: impl Into<String>) -> Self {
        Self::UnexpectedResponse(raw.into())
    }

    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new policy error
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short, stable name of the error kind, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upstream { .. } => "upstream",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::UnexpectedResponse(_) => "unexpected_response",
            Self::Classifier(_) => "classifier",
            Self::Policy(_) => "policy",
            Self::Config(_) => "config",
            Self::Backend(_) => "backend",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_includes_body() {
        let err = Error::upstream(502, "bad gateway");
        assert_eq!(err.to_string(), "upstream returned 502: bad gateway");
        assert_eq!(err.kind(), "upstream");
    }

    #[test]
    fn test_serde_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse.into();
        assert_eq!(err.kind(), "serialization");
    }
}
