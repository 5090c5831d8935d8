//! Error types for the WebProbe engine

use thiserror::Error;

/// Result type alias using WebProbe Error
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single outbound probe request.
///
/// Probe errors are recoverable: checks either handle them or let them
/// escape, in which case the orchestrator records a `CheckError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Connection to {url} failed: {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("TLS error for {url}: {message}")]
    Tls { url: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl ProbeError {
    /// Whether the failure means the host could not be talked to at all
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ProbeError::Timeout { .. } | ProbeError::ConnectionFailed { .. } | ProbeError::Tls { .. }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            ProbeError::Timeout { .. } => "PROBE_TIMEOUT",
            ProbeError::ConnectionFailed { .. } => "PROBE_CONNECTION_FAILED",
            ProbeError::Tls { .. } => "PROBE_TLS_ERROR",
            ProbeError::InvalidUrl(_) => "PROBE_INVALID_URL",
            ProbeError::Cancelled => "PROBE_CANCELLED",
            ProbeError::Request { .. } => "PROBE_REQUEST_FAILED",
        }
    }
}

/// WebProbe error types
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // === Check Errors ===
    #[error("Unknown check: {name}")]
    UnknownCheck { name: String },

    #[error("Check failed: {check} - {message}")]
    CheckFailed { check: String, message: String },

    #[error("Invalid check definition: {path} - {message}")]
    InvalidCheckDefinition { path: String, message: String },

    // === Scan Errors ===
    #[error("Target unreachable: {target} ({reason})")]
    TargetUnreachable { target: String, reason: String },

    #[error("Orchestrator failure: {0}")]
    Orchestrator(String),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // === IO / Serialization ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error stops a scan before or instead of producing a result
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::InvalidTarget(_)
                | Error::InvalidConfig { .. }
                | Error::UnknownCheck { .. }
                | Error::TargetUnreachable { .. }
                | Error::Orchestrator(_)
        )
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::InvalidTarget(_) => "INVALID_TARGET",
            Error::InvalidConfig { .. } => "INVALID_CONFIG",
            Error::UnknownCheck { .. } => "UNKNOWN_CHECK",
            Error::CheckFailed { .. } => "CHECK_FAILED",
            Error::InvalidCheckDefinition { .. } => "INVALID_CHECK_DEF",
            Error::TargetUnreachable { .. } => "TARGET_UNREACHABLE",
            Error::Orchestrator(_) => "ORCHESTRATOR_FAILURE",
            Error::Probe(e) => e.code(),
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::FileNotFound { .. } => "FILE_NOT_FOUND",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classes() {
        assert!(Error::UnknownCheck { name: "x".into() }.is_fatal());
        assert!(Error::Validation("threads".into()).is_fatal());
        assert!(!Error::CheckFailed {
            check: "a".into(),
            message: "boom".into()
        }
        .is_fatal());
        assert!(!Error::Probe(ProbeError::Cancelled).is_fatal());
    }

    #[test]
    fn test_probe_code_passthrough() {
        let err: Error = ProbeError::InvalidUrl("::".into()).into();
        assert_eq!(err.code(), "PROBE_INVALID_URL");
        assert!(ProbeError::Timeout {
            url: "http://x".into(),
            timeout_ms: 10
        }
        .is_unreachable());
    }
}
