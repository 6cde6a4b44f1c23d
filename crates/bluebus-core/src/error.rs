//! Error types for the discovery and property-watch engine

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors surfaced by bus operations, lookups and projections
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BluebusError {
    /// A call against the bus transport failed (rule install/remove, adapter or device calls)
    #[error("{operation} failed: {reason}")]
    Transport { operation: String, reason: String },

    /// No qualifying announcement arrived before the discovery deadline
    #[error("discovery timeout after {duration_ms}ms")]
    DiscoveryTimeout { duration_ms: u64 },

    /// The cache holds no object matching the lookup
    #[error("no {interface} object matches")]
    NotFound { interface: String },

    #[error("{path}: property {property} not present")]
    MissingProperty { path: String, property: String },

    #[error("property {property}: expected {expected}, found {actual}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid match rule: {rule}")]
    InvalidMatchRule { rule: String },

    /// The shared signal stream ended underneath an active subscriber
    #[error("bus connection closed")]
    ConnectionClosed,

    /// The object cache lost synchronization with remote state
    #[error("object cache desynchronized: {reason}")]
    CacheDesynchronized { reason: String },

    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },
}

impl BluebusError {
    /// Build a transport error for `operation` from any displayable cause
    pub fn transport(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        BluebusError::Transport {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BluebusError::DiscoveryTimeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BluebusError::NotFound { .. })
    }
}

/// Result type for bus operations
pub type BluebusResult<T> = std::result::Result<T, BluebusError>;

/// Combine an operation result with the result of its cleanup.
///
/// The first failure wins: a cleanup error is only reported when the
/// operation itself succeeded.
pub(crate) fn first_failure<T>(
    primary: BluebusResult<T>,
    cleanup: BluebusResult<()>,
) -> BluebusResult<T> {
    match (primary, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), _) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_prefers_primary_error() {
        let primary: BluebusResult<()> = Err(BluebusError::DiscoveryTimeout { duration_ms: 10 });
        let cleanup = Err(BluebusError::transport("RemoveMatch", "gone"));
        assert!(first_failure(primary, cleanup).unwrap_err().is_timeout());
    }

    #[test]
    fn test_first_failure_reports_cleanup_after_success() {
        let cleanup = Err(BluebusError::transport("StopDiscovery", "not ready"));
        let err = first_failure(Ok(1), cleanup).unwrap_err();
        assert_eq!(err.to_string(), "StopDiscovery failed: not ready");
    }

    #[test]
    fn test_error_kinds() {
        assert!(BluebusError::NotFound {
            interface: "org.bluez.Device1".into()
        }
        .is_not_found());
        assert!(!BluebusError::ConnectionClosed.is_timeout());
    }
}
