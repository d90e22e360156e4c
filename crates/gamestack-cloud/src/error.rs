// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the control-plane client.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification shared by every gamestack error type.
///
/// The request layer maps these onto client-facing status codes; the core
/// only uses them to decide whether a failure means "absent" or "broken".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required setting is absent; the operation is unsupported.
    Configuration,
    /// The addressed object or service does not exist.
    NotFound,
    /// The input was rejected before any side effect.
    Validation,
    /// A remote call or local subprocess failed.
    Infrastructure,
    /// A deadline elapsed.
    Timeout,
}

/// Control-plane client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A required client setting is missing or empty.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request parameters were rejected before dispatch.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No usable credentials could be obtained.
    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    /// The request could not be signed.
    #[error("Request signing failed: {0}")]
    Signing(String),

    /// The object does not exist in the store.
    #[error("Object not found: s3://{bucket}/{key}")]
    ObjectNotFound {
        /// Bucket that was queried.
        bucket: String,
        /// Key that was queried.
        key: String,
    },

    /// The remote API answered with a non-success status.
    #[error("{operation} failed ({status}): {message}")]
    Api {
        /// Operation name (e.g. `UpdateService`, `PutObject`).
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// The request could not be sent or its response could not be read.
    #[error("{operation} request failed: {source}")]
    Http {
        /// Operation name.
        operation: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The scheduler reported a failure for the described service.
    #[error("Describe service {service} failed: {reason}")]
    ServiceFailure {
        /// Service name.
        service: String,
        /// Reason reported by the scheduler.
        reason: String,
    },

    /// The scheduler does not know the service.
    #[error("Service {service} not found in cluster {cluster}")]
    ServiceNotFound {
        /// Cluster name.
        cluster: String,
        /// Service name.
        service: String,
    },

    /// The service did not converge before the deadline.
    #[error("Timed out after {timeout:?} waiting for service {service} to stabilize")]
    StabilizationTimeout {
        /// Service name.
        service: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// Local file I/O failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// File that was being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::Credentials(_) => ErrorKind::Configuration,
            Error::Validation(_) => ErrorKind::Validation,
            Error::ObjectNotFound { .. } | Error::ServiceNotFound { .. } => ErrorKind::NotFound,
            Error::StabilizationTimeout { .. } => ErrorKind::Timeout,
            Error::Http { source, .. } if source.is_timeout() => ErrorKind::Timeout,
            _ => ErrorKind::Infrastructure,
        }
    }

    /// True when the object store reported that the key does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ObjectNotFound { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type using the control-plane Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguishable() {
        let err = Error::ObjectNotFound {
            bucket: "b".to_string(),
            key: "k".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Object not found: s3://b/k");
    }

    #[test]
    fn test_timeout_kind_is_distinct_from_api_failure() {
        let timeout = Error::StabilizationTimeout {
            service: "mc".to_string(),
            timeout: Duration::from_secs(1),
        };
        let api = Error::Api {
            operation: "UpdateService".to_string(),
            status: 400,
            message: "bad".to_string(),
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(api.kind(), ErrorKind::Infrastructure);
        assert!(!api.is_not_found());
    }
}
