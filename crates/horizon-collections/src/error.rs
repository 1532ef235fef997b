//! Error types for collections and async lists.

use std::fmt;
use std::sync::Arc;

use crate::async_list::ListOperation;
use crate::key::Key;

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Errors that can occur while building collections or driving an async list.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollectionError {
    /// Two nodes resolved to the same key during a build.
    #[error("Duplicate key '{key}' in collection")]
    DuplicateKey { key: Key },

    /// A node had no explicit key and the key rule produced none.
    #[error("No key for {kind} at position {position}: {reason}")]
    MissingKey {
        kind: &'static str,
        position: usize,
        reason: String,
    },

    /// An operation was requested while another one is still running.
    #[error("Cannot start {requested}: {in_flight} is still in progress")]
    Busy {
        requested: ListOperation,
        in_flight: ListOperation,
    },

    /// `load_more` was requested but no incremental loader is registered.
    #[error("No loader registered for {operation}")]
    NoLoader { operation: ListOperation },

    /// Configuration could not be parsed.
    #[error("Invalid collection configuration: {0}")]
    Config(String),
}

impl CollectionError {
    /// Create a missing-key error.
    pub fn missing_key(kind: &'static str, position: usize, reason: impl Into<String>) -> Self {
        Self::MissingKey {
            kind,
            position,
            reason: reason.into(),
        }
    }

    /// Returns `true` for a busy rejection.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

/// Failure reported by a caller-supplied loader or sort function.
///
/// Loader failures are recoverable: the async list captures them in its
/// state instead of returning them, so views can keep showing the last good
/// items next to an error indicator.
#[derive(Clone, thiserror::Error)]
#[error("{message}")]
pub struct LoadError {
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl LoadError {
    /// Create a load error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a load error wrapping an underlying error.
    pub fn from_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadError")
            .field("message", &self.message)
            .field("source", &self.source.as_ref().map(|s| s.to_string()))
            .finish()
    }
}

impl PartialEq for LoadError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

impl From<CollectionError> for LoadError {
    fn from(err: CollectionError) -> Self {
        Self::from_source(err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_messages() {
        let err = CollectionError::DuplicateKey { key: Key::Int(1) };
        assert_eq!(err.to_string(), "Duplicate key '1' in collection");

        let err = CollectionError::Busy {
            requested: ListOperation::Load,
            in_flight: ListOperation::Sort,
        };
        assert!(err.is_busy());
        assert_eq!(err.to_string(), "Cannot start load: sort is still in progress");
    }

    #[test]
    fn test_load_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = LoadError::from_source("fetch failed", io);
        assert_eq!(err.to_string(), "fetch failed");
        assert_eq!(err.source().map(|s| s.to_string()), Some("timed out".into()));
        assert_eq!(err, LoadError::new("fetch failed"));
    }
}
