//! hakidgen error types

use thiserror::Error;

/// hakidgen error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prompt setup error (invalid or unreadable prompt definitions)
    #[error("Setup error: {0}")]
    Setup(String),

    /// Upstream generation service returned a non-success status
    #[error("Upstream error from {service} (status {status}): {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Pick requested with nothing available
    #[error("No artifact available")]
    PoolExhausted,

    /// Payload decoding error
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for hakidgen operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_upstream_display_carries_status_and_body() {
        let err = Error::Upstream {
            service: "generateContent",
            status: 429,
            body: "{\"error\":\"quota\"}".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("generateContent"));
        assert!(msg.contains("429"));
        assert!(msg.contains("quota"));
    }
}
