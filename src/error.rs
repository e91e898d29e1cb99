//! Error types for rate lookups and cache configuration
//!
//! Cache operations themselves never fail; these errors come from the rate
//! producer, settings persistence, and construction-time configuration.

use thiserror::Error;

/// Main error type for the rate-cache library
#[derive(Error, Debug)]
pub enum RateCacheError {
    /// Upstream producer failure - network or HTTP status issues
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Upstream payload could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Caller-supplied value was rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Settings file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No tokio runtime was available to host the settings watcher
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for rate-cache operations
pub type Result<T> = std::result::Result<T, RateCacheError>;

impl From<String> for RateCacheError {
    fn from(s: String) -> Self {
        RateCacheError::Other(s)
    }
}

impl From<&str> for RateCacheError {
    fn from(s: &str) -> Self {
        RateCacheError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for RateCacheError {
    fn from(e: anyhow::Error) -> Self {
        RateCacheError::Upstream(format!("{:#}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RateCacheError::Upstream("503 Service Unavailable".to_string());
        assert_eq!(error.to_string(), "Upstream error: 503 Service Unavailable");

        let error = RateCacheError::InvalidInput("amount must be finite".to_string());
        assert!(error.to_string().contains("amount must be finite"));
    }

    #[test]
    fn test_error_conversion() {
        let error: RateCacheError = "test error".into();
        assert!(matches!(error, RateCacheError::Other(_)));

        let error: RateCacheError = "test error".to_string().into();
        assert!(matches!(error, RateCacheError::Other(_)));

        let error: RateCacheError = anyhow::anyhow!("connection reset").context("fetching rates").into();
        match error {
            RateCacheError::Upstream(msg) => {
                assert!(msg.contains("fetching rates"));
                assert!(msg.contains("connection reset"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: RateCacheError = parse_err.into();
        assert!(matches!(error, RateCacheError::Serialization(_)));
    }
}
