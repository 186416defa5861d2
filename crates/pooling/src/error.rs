//! Error types for pooling operations
use thiserror::Error;

/// Result type for pooling operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by pools, the registry and the reaper
#[derive(Error, Debug)]
pub enum Error {
    /// Pool or registry configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// The resource constructor failed
    #[error("Failed to create '{resource}': {reason}")]
    Create {
        /// The resource type name
        resource: String,
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The dispose hook of an instance failed
    #[error("Failed to dispose '{resource}': {reason}")]
    Dispose {
        /// The resource type name
        resource: String,
        /// The failure reason
        reason: String,
    },

    /// An idle instance about to be handed out is still stamped by another pool
    #[error("Instance of '{resource}' in pool {expected} is owned by pool {found}")]
    CrossPool {
        /// The resource type name
        resource: String,
        /// The pool handing the instance out
        expected: u64,
        /// The pool recorded on the instance
        found: u64,
    },

    /// An instance was released to a pool that does not own it
    #[error("Instance of '{resource}' released to pool {pool} but owned by pool {owner}")]
    OrphanedObject {
        /// The resource type name
        resource: String,
        /// The pool the caller released into
        pool: u64,
        /// The pool that actually owns the instance
        owner: u64,
    },

    /// No capacity became available before the acquire deadline
    #[error("Pool for '{resource}' exhausted: {max_size} in use, waited {waited_ms}ms")]
    Exhausted {
        /// The resource type name
        resource: String,
        /// Maximum pool size
        max_size: usize,
        /// How long the caller waited before giving up
        waited_ms: u64,
    },

    /// The pool has been disposed and accepts no further calls
    #[error("Pool for '{resource}' has been disposed")]
    Disposed {
        /// The resource type name
        resource: String,
    },

    /// A before-hook cancelled the operation
    #[error("Operation cancelled by hook '{hook}': {reason}")]
    Cancelled {
        /// The hook name
        hook: String,
        /// Why the hook refused
        reason: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a construction error for `resource`
    pub fn create(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Create {
            resource: resource.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a construction error wrapping an underlying cause
    pub fn create_with_source<E>(resource: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Create {
            resource: resource.into(),
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a dispose error for `resource`
    pub fn dispose(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dispose {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Only exhaustion is: the caller may back off and try again once other
    /// holders release.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Get the resource type name associated with this error (if any)
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } | Self::Cancelled { .. } => None,
            Self::Create { resource, .. }
            | Self::Dispose { resource, .. }
            | Self::CrossPool { resource, .. }
            | Self::OrphanedObject { resource, .. }
            | Self::Exhausted { resource, .. }
            | Self::Disposed { resource } => Some(resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exhaustion_is_retryable() {
        let exhausted = Error::Exhausted {
            resource: "conn".into(),
            max_size: 2,
            waited_ms: 100,
        };
        assert!(exhausted.is_retryable());
        assert!(!Error::configuration("bad").is_retryable());
        assert!(
            !Error::OrphanedObject {
                resource: "conn".into(),
                pool: 1,
                owner: 2,
            }
            .is_retryable()
        );
    }

    #[test]
    fn resource_name_is_exposed() {
        let err = Error::Disposed {
            resource: "conn".into(),
        };
        assert_eq!(err.resource(), Some("conn"));
        assert_eq!(Error::configuration("x").resource(), None);
    }

    #[test]
    fn create_with_source_keeps_cause() {
        let io = std::io::Error::other("refused");
        let err = Error::create_with_source("conn", io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "Failed to create 'conn': refused");
    }
}
