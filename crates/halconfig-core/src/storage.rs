use std::io::Read;
use std::path::Path;

use crate::error::StorageError;

/// A readable byte stream handed out by [`StorageBackend::read_stream`].
pub type ObjectStream = Box<dyn Read + Send>;

/// Storage backend abstraction for the config document.
///
/// A location is a filesystem path for local storage, or a path that the
/// backend translates into an object name for remote stores. Every call is
/// blocking and attempted exactly once.
pub trait StorageBackend: Send + Sync {
    /// Returns the backend identifier (e.g., "local", "s3").
    fn backend_name(&self) -> &'static str;

    /// Open the object at `location` for reading.
    ///
    /// Fails with [`StorageError::NotFound`] when nothing is stored there.
    fn read_stream(&self, location: &Path) -> Result<ObjectStream, StorageError>;

    /// Create or replace the object at `location` with `contents`.
    fn write_text_object(&self, location: &Path, contents: &str) -> Result<(), StorageError>;
}

impl<T: StorageBackend + ?Sized> StorageBackend for std::sync::Arc<T> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn read_stream(&self, location: &Path) -> Result<ObjectStream, StorageError> {
        (**self).read_stream(location)
    }

    fn write_text_object(&self, location: &Path, contents: &str) -> Result<(), StorageError> {
        (**self).write_text_object(location, contents)
    }
}
