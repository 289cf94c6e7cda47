use std::fs;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use halconfig_core::{ObjectStream, StorageBackend, StorageError};
use tracing::{debug, instrument};

/// Local filesystem storage backend.
///
/// Locations are filesystem paths. Relative locations are resolved against
/// the base directory; absolute ones are used as given.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage resolving relative locations against `base_dir`.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Get the filesystem path for a location.
    fn resolve(&self, location: &Path) -> PathBuf {
        self.base_dir.join(location)
    }

    /// Get the sibling temp file used for atomic writes.
    fn temp_path(path: &Path) -> Result<PathBuf, StorageError> {
        let mut name = path
            .file_name()
            .ok_or_else(|| {
                StorageError::InvalidArgument(format!("{} does not name a file", path.display()))
            })?
            .to_os_string();
        name.push(".tmp");
        Ok(path.with_file_name(name))
    }
}

impl StorageBackend for LocalStorage {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self), level = "debug")]
    fn read_stream(&self, location: &Path) -> Result<ObjectStream, StorageError> {
        let path = self.resolve(location);
        match fs::File::open(&path) {
            Ok(file) => {
                debug!("Opened {}", path.display());
                Ok(Box::new(BufReader::new(file)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StorageError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    #[instrument(skip(self, contents), level = "debug", fields(data_len = contents.len()))]
    fn write_text_object(&self, location: &Path, contents: &str) -> Result<(), StorageError> {
        let path = self.resolve(location);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!("Failed to create dir {}: {}", parent.display(), e))
            })?;
        }

        // Write atomically via temp file
        let temp_path = Self::temp_path(&path)?;
        fs::write(&temp_path, contents).map_err(|e| {
            StorageError::Io(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &path).map_err(|e| {
            StorageError::Io(format!("Failed to rename to {}: {}", path.display(), e))
        })?;

        debug!("Wrote {} ({} bytes)", path.display(), contents.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use tempfile::TempDir;

    fn setup() -> (LocalStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        (storage, temp_dir)
    }

    fn read_all(storage: &LocalStorage, location: &Path) -> String {
        let mut contents = String::new();
        storage
            .read_stream(location)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
    }

    #[test]
    fn test_write_then_read() {
        let (storage, _temp) = setup();
        let location = Path::new("config");

        // Initially doesn't exist
        let err = storage.read_stream(location).err().unwrap();
        assert!(err.is_not_found());

        storage.write_text_object(location, "halyardVersion: 1\n").unwrap();
        assert_eq!(read_all(&storage, location), "halyardVersion: 1\n");

        // Overwrite
        storage.write_text_object(location, "halyardVersion: 2\n").unwrap();
        assert_eq!(read_all(&storage, location), "halyardVersion: 2\n");
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let (storage, temp) = setup();
        let location = Path::new(".backup/nested/config");

        storage.write_text_object(location, "a: b\n").unwrap();

        assert!(temp.path().join(".backup/nested/config").is_file());
        assert_eq!(read_all(&storage, location), "a: b\n");
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let (storage, temp) = setup();
        storage.write_text_object(Path::new("config"), "x: 1\n").unwrap();

        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["config".to_string()]);
    }

    #[test]
    fn test_absolute_location_ignores_base_dir() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new("/definitely/not/used");
        let location = temp.path().join("config");

        storage.write_text_object(&location, "x: 1\n").unwrap();
        assert_eq!(fs::read_to_string(&location).unwrap(), "x: 1\n");
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let (storage, temp) = setup();
        // a regular file where a directory is needed
        fs::write(temp.path().join("blocker"), "").unwrap();

        let err = storage
            .write_text_object(Path::new("blocker/config"), "x: 1\n")
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
