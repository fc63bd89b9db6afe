//! Error types for the Strand runtime.
//!
//! Every failure a data app can observe is a [`StrandError`]. Control plane
//! rejections carry the structured [`ApiError`] payload verbatim so callers can
//! surface per-field details.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur while running a data app.
#[derive(Debug, thiserror::Error)]
pub enum StrandError {
    /// Missing or malformed app config, fixture, process config or toolchain query.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what is misconfigured.
        message: String,
    },

    /// A resource, pipeline or function lookup missed.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What was being looked up (resource, pipeline, function, ...).
        kind: String,
        /// The name or identifier that could not be resolved.
        name: String,
    },

    /// A destination naming constraint was violated.
    #[error("Invalid {subject}: {message}")]
    Validation {
        /// The value that failed validation.
        subject: String,
        /// Why it was rejected.
        message: String,
    },

    /// The control plane rejected a request.
    #[error("{operation} failed for {target}: {source}")]
    RemoteApi {
        /// Operation that was attempted, e.g. `create connector`.
        operation: String,
        /// Resource, pipeline or function name the operation targeted.
        target: String,
        /// Error payload returned by the control plane.
        #[source]
        source: ApiError,
    },

    /// A condition the run cannot continue from.
    #[error("Unrecoverable error: {message}")]
    Fatal {
        /// Description of the unrecoverable condition.
        message: String,
    },
}

impl StrandError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Creates a new `RemoteApi` error.
    #[must_use]
    pub fn remote_api(
        operation: impl Into<String>,
        target: impl Into<String>,
        source: ApiError,
    ) -> Self {
        Self::RemoteApi {
            operation: operation.into(),
            target: target.into(),
            source,
        }
    }

    /// Creates a new `Fatal` error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if the run must not continue after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    /// Returns the error category for logging and exit codes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::RemoteApi { .. } => ErrorCategory::RemoteApi,
            Self::Fatal { .. } => ErrorCategory::Fatal,
        }
    }
}

/// Categories of runtime errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    NotFound,
    Validation,
    RemoteApi,
    Fatal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::RemoteApi => write!(f, "remote_api"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Structured error payload returned by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Per-field problem lists, keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Vec<String>>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_detail(mut self, field: impl Into<String>, problem: impl Into<String>) -> Self {
        self.details
            .entry(field.into())
            .or_default()
            .push(problem.into());
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        let count = self.details.len();
        if count > 0 {
            let noun = if count > 1 { "problems" } else { "problem" };
            write!(f, ". {count} {noun} occurred:")?;
            for (index, (field, problems)) in self.details.iter().enumerate() {
                write!(f, "\n{}. {}: \"{}\"", index + 1, field, problems.join("\", \""))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Convenience alias used across the Strand crates.
pub type StrandResult<T> = Result<T, StrandError>;
