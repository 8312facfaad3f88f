//! Error types for storefleet-core.

use thiserror::Error;

/// Result type alias using storefleet-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for store provisioning
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Could not allocate a unique store id after {0} attempts")]
    IdExhausted(u32),

    // Cluster errors
    #[error("Namespace already exists: {0}")]
    AlreadyExists(String),

    #[error("Kubernetes error ({reason}): {message}")]
    Kubernetes { reason: String, message: String },

    // Release errors
    #[error("Install failed for release {release}:\n{diagnostics}")]
    InstallFailed { release: String, diagnostics: String },

    #[error("Install of release {release} timed out after {timeout_secs}s")]
    InstallTimedOut { release: String, timeout_secs: u64 },

    // Reconciliation errors
    #[error("Reconcile failed for store {store_id}: {message}")]
    ReconcileStep { store_id: String, message: String },

    // Command execution errors
    #[error("{0} not found. Install it and make sure it is on PATH.")]
    CommandNotFound(String),

    #[error("Command failed: {cmd}\n{stderr}")]
    CommandFailed { cmd: String, stderr: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a command failure
    pub fn command_failed(cmd: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            cmd: cmd.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error came from a failed or timed-out release install
    pub fn is_install_failure(&self) -> bool {
        matches!(
            self,
            Error::InstallFailed { .. } | Error::InstallTimedOut { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_failure_classification() {
        let failed = Error::InstallFailed {
            release: "store-abc".to_string(),
            diagnostics: "boom".to_string(),
        };
        let timed_out = Error::InstallTimedOut {
            release: "store-abc".to_string(),
            timeout_secs: 600,
        };

        assert!(failed.is_install_failure());
        assert!(timed_out.is_install_failure());
        assert!(!Error::StoreNotFound("abc".to_string()).is_install_failure());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::command_failed("helm status store-abc", "Error: release: not found");
        assert_eq!(
            err.to_string(),
            "Command failed: helm status store-abc\nError: release: not found"
        );

        let err = Error::Kubernetes {
            reason: "Forbidden".to_string(),
            message: "namespaces is forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "Kubernetes error (Forbidden): namespaces is forbidden");
    }
}
