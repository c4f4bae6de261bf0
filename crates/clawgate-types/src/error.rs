//! Error types for clawgate.
//!
//! [`ClawgateError`] covers startup and configuration failures.
//! [`ToolError`] is what every tool returns; it carries a coarse
//! [`ErrorKind`] so the hosting agent can react to the class of failure
//! without parsing messages. [`ToolFailure`] is the serialized form that
//! crosses the tool boundary.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for configuration and startup.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClawgateError {
    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClawgateError>;

// ── Tool errors ──────────────────────────────────────────────────────────

/// Coarse classification of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A filesystem path failed validation.
    PathDenied,
    /// An outbound destination failed validation.
    NetworkDenied,
    /// A command was rejected by the execution policy.
    PermissionDenied,
    /// A bounded operation exceeded its deadline.
    TimedOut,
    /// The underlying OS or library call errored.
    Failed,
    /// The target resource does not exist.
    NotFound,
    /// The tool was called with malformed arguments.
    InvalidArgs,
}

impl ErrorKind {
    /// Stable name used in serialized payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PathDenied => "PathDenied",
            Self::NetworkDenied => "NetworkDenied",
            Self::PermissionDenied => "PermissionDenied",
            Self::TimedOut => "TimedOut",
            Self::Failed => "Failed",
            Self::NotFound => "NotFound",
            Self::InvalidArgs => "InvalidArgs",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("tool not found: {0}")]
    UnknownTool(String),

    /// The arguments provided to the tool are invalid.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The path matched a deny rule or could not be resolved.
    #[error("path denied: {path} ({reason})")]
    PathDenied { path: String, reason: String },

    /// The file (or content to be written) exceeds the size ceiling.
    #[error("file too large: {path} is {size} bytes (limit {limit} bytes)")]
    TooLarge { path: String, size: u64, limit: u64 },

    /// The outbound destination was rejected.
    #[error("network destination denied: {target} ({reason})")]
    NetworkDenied { target: String, reason: String },

    /// The command was rejected by the execution policy.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A bounded operation ran past its deadline.
    #[error("{operation} timed out after {secs}s")]
    TimedOut { operation: String, secs: u64 },

    /// A file, directory or other resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying operation failed.
    #[error("execution failed: {0}")]
    Failed(String),
}

impl ToolError {
    /// The coarse kind reported to the hosting agent.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool(_) | Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgs(_) => ErrorKind::InvalidArgs,
            Self::PathDenied { .. } => ErrorKind::PathDenied,
            Self::TooLarge { .. } | Self::Failed(_) => ErrorKind::Failed,
            Self::NetworkDenied { .. } => ErrorKind::NetworkDenied,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
        }
    }

    /// Convert into the serializable payload returned across the tool boundary.
    pub fn to_failure(&self) -> ToolFailure {
        ToolFailure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Serialized error payload: a coarse kind plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolFailure {
    /// Wrap into the `{"error": {...}}` envelope used by tool results.
    pub fn into_payload(self) -> serde_json::Value {
        serde_json::json!({ "error": self })
    }
}
