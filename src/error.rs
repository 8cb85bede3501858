//! Error types for the insights pipeline
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use serde_json::Value;
use thiserror::Error;

/// A single field that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Field name (dotted for nested record fields, e.g. `actions[0].value`)
    pub field: String,
    /// What went wrong
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.field, self.reason)
    }
}

/// The main error type for the insights pipeline
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid date range: {message}")]
    InvalidDateRange { message: String },

    #[error("Pipeline '{name}' is not registered")]
    PipelineNotFound { name: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("JWT generation failed: {message}")]
    JwtGeneration { message: String },

    #[error("OAuth2 error: {message}")]
    OAuth2 { message: String },

    #[error("Secret '{name}' unavailable: {message}")]
    Secret { name: String, message: String },

    // ============================================================================
    // Provider Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote request failed ({status}): {message}")]
    RemoteRequest { status: u16, message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Report {report_id} failed: {payload}")]
    ReportFailed { report_id: String, payload: Value },

    #[error("Report {report_id} not complete after {attempts} polls")]
    PollTimeout { report_id: String, attempts: u32 },

    #[error("Unexpected provider response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Transformation Errors
    // ============================================================================
    #[error("Record rejected by pipeline '{pipeline}': {}", join_violations(.violations))]
    Validation {
        pipeline: String,
        violations: Vec<FieldViolation>,
    },

    // ============================================================================
    // Sink Errors
    // ============================================================================
    #[error("Schema mismatch for table '{table}': {detail}")]
    SchemaMismatch { table: String, detail: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    // ============================================================================
    // Queue Errors
    // ============================================================================
    #[error("Task queue error: {message}")]
    Queue { message: String },

    #[error("Only {created} of {total} tasks were created")]
    PartialDispatch { created: usize, total: usize },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid date range error
    pub fn date_range(message: impl Into<String>) -> Self {
        Self::InvalidDateRange {
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a secret error
    pub fn secret(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Secret {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a remote request error
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteRequest {
            status,
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Create a queue error
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(table: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            table: table.into(),
            detail: detail.into(),
        }
    }

    /// Stable machine-readable kind, used in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. } | Error::YamlParse(_) => "config",
            Error::InvalidDateRange { .. } => "invalid_date_range",
            Error::PipelineNotFound { .. } => "pipeline_not_found",
            Error::Auth { .. } | Error::JwtGeneration { .. } | Error::OAuth2 { .. } => "auth",
            Error::Secret { .. } => "secret",
            Error::Http(_)
            | Error::RemoteRequest { .. }
            | Error::Timeout { .. }
            | Error::InvalidUrl(_)
            | Error::Decode { .. } => "remote_request",
            Error::ReportFailed { .. } => "report_failed",
            Error::PollTimeout { .. } => "poll_timeout",
            Error::Validation { .. } => "validation",
            Error::SchemaMismatch { .. } => "schema_mismatch",
            Error::Sink { .. } => "sink",
            Error::Queue { .. } => "queue",
            Error::PartialDispatch { .. } => "partial_dispatch",
            Error::JsonParse(_) => "json",
            Error::Io(_) => "io",
            Error::Other(_) => "internal",
        }
    }

    /// Whether redelivering the originating task could succeed
    ///
    /// Nothing is retried in process; this only informs logs and callers.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout { .. } | Error::PollTimeout { .. } => true,
            Error::RemoteRequest { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }

    /// Names of the fields rejected by a validation error
    pub fn violated_fields(&self) -> Vec<&str> {
        match self {
            Error::Validation { violations, .. } => {
                violations.iter().map(|v| v.field.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Check if an HTTP status code is transient
fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the insights pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
