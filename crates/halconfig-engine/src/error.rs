use std::path::PathBuf;

use halconfig_core::{CollectError, StorageError, TreeError};
use thiserror::Error;

/// How a caller should treat a [`ConfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Report and carry on; nothing was changed.
    Warning,
    Fatal,
}

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The stored document is malformed.
    #[error("Could not parse halconfig at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: TreeError,
    },

    /// An in-memory payload could not be staged.
    #[error("Invalid in-memory halconfig: {0}")]
    IllegalArgument(String),

    #[error("Failed to read halconfig from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    #[error("Failed to write config to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    #[error("Failed to serialize halconfig: {0}")]
    Serialize(#[source] TreeError),

    #[error("No changes staged for writing.")]
    NoPendingChanges,

    #[error("Failed to collect referenced local files: {0}")]
    Introspection(#[from] CollectError),

    #[error("Failed to clean staging directory {}: {reason}", path.display())]
    Cleanup { path: PathBuf, reason: String },
}

impl ConfigError {
    pub fn severity(&self) -> Severity {
        match self {
            ConfigError::NoPendingChanges => Severity::Warning,
            _ => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_no_pending_changes_is_a_warning() {
        assert_eq!(ConfigError::NoPendingChanges.severity(), Severity::Warning);
        assert!(!ConfigError::NoPendingChanges.is_fatal());

        let write = ConfigError::Write {
            path: PathBuf::from("/home/me/.hal/config"),
            source: StorageError::Io("disk full".to_string()),
        };
        assert!(write.is_fatal());
        assert!(write.to_string().contains("/home/me/.hal/config"));

        let cleanup = ConfigError::Cleanup {
            path: PathBuf::from("/staging"),
            reason: "permission denied".to_string(),
        };
        assert_eq!(cleanup.severity(), Severity::Fatal);
    }
}
