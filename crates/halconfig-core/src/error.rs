use thiserror::Error;

/// Errors that can occur in the storage layer.
///
/// Backends never leak their transport error types; callers only ever see
/// these variants, whichever backend produced them.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StorageError {
    /// Whether this error means the object simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Errors raised while building or mutating a config tree.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Malformed YAML: {0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("Failed to read config stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("Expected {expected} at `{path}`, found {found}")]
    Shape {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unsupported mapping key at `{path}`: {reason}")]
    Key { path: String, reason: String },

    #[error("Node `{path}` is not {expected}")]
    NotA {
        path: String,
        expected: &'static str,
    },
}

/// Errors raised while assembling a [`Schema`](crate::Schema).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Shape `{0}` is declared more than once")]
    DuplicateShape(String),

    #[error("Shape `{shape}` field `{field}` refers to undeclared shape `{target}`")]
    UnknownShape {
        shape: String,
        field: String,
        target: String,
    },

    #[error("Root shape `{0}` is not declared")]
    UnknownRoot(String),
}

/// Errors raised by the local file reference collector.
///
/// These always indicate a mismatch between a declared shape and the
/// document, never a user mistake that can be retried.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Cannot read local file field `{field}` on `{node}`: expected a string path, found {found}")]
    Introspection {
        node: String,
        field: String,
        found: &'static str,
    },
}
