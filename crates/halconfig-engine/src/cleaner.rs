use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::ConfigError;

/// Outcome of a staging directory cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Orphaned files that were removed.
    pub deleted: Vec<PathBuf>,
    /// Files kept because the config references them.
    pub retained: Vec<PathBuf>,
    /// Set when cleanup did not run at all.
    pub skipped: bool,
}

impl CleanupReport {
    /// Report for a cleanup that was not attempted.
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

/// Delete every file under `dir` that is not in `referenced`.
///
/// A directory that does not exist holds no files; any other non-directory
/// is rejected. Both sides are compared as normalized absolute paths. The
/// first listing or deletion failure aborts the run.
pub(crate) fn clean_staging_dir(
    dir: &Path,
    referenced: &BTreeSet<PathBuf>,
) -> Result<CleanupReport, ConfigError> {
    clean_staging_dir_with(dir, referenced, |path| fs::remove_file(path))
}

fn clean_staging_dir_with(
    dir: &Path,
    referenced: &BTreeSet<PathBuf>,
    mut remove: impl FnMut(&Path) -> io::Result<()>,
) -> Result<CleanupReport, ConfigError> {
    let dir = normalize(dir).map_err(|e| cleanup_error(dir, e))?;
    if !dir.exists() {
        debug!("Staging directory {} does not exist", dir.display());
        return Ok(CleanupReport::default());
    }
    if !dir.is_dir() {
        return Err(cleanup_error(&dir, "not a directory"));
    }

    let referenced = referenced
        .iter()
        .map(|path| normalize(path))
        .collect::<io::Result<BTreeSet<PathBuf>>>()
        .map_err(|e| cleanup_error(&dir, e))?;

    let existing = list_files(&dir)?;
    let (retained, orphans): (Vec<PathBuf>, Vec<PathBuf>) = existing
        .into_iter()
        .partition(|path| referenced.contains(path));

    for orphan in &orphans {
        remove(orphan).map_err(|e| ConfigError::Cleanup {
            path: dir.clone(),
            reason: format!("failed to delete {}: {}", orphan.display(), e),
        })?;
        debug!("Deleted unreferenced staging file {}", orphan.display());
    }

    info!(
        "Cleaned {}: deleted {} files, kept {}",
        dir.display(),
        orphans.len(),
        retained.len()
    );
    Ok(CleanupReport {
        deleted: orphans,
        retained,
        skipped: false,
    })
}

/// Every non-directory entry under `dir`, recursively. Entries inherit the
/// form of `dir`, so a normalized `dir` yields normalized paths.
fn list_files(dir: &Path) -> Result<BTreeSet<PathBuf>, ConfigError> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| cleanup_error(dir, e))?;
        if !entry.file_type().is_dir() {
            files.insert(entry.into_path());
        }
    }
    Ok(files)
}

/// Make `path` absolute and fold `.` and `..` components lexically.
///
/// Symlinks are not resolved; referenced files need not exist.
fn normalize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

fn cleanup_error(dir: &Path, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Cleanup {
        path: dir.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, name).unwrap();
        path
    }

    #[test]
    fn test_deletes_exactly_the_orphans() {
        let temp = TempDir::new().unwrap();
        let a = touch(temp.path(), "a.json");
        let b = touch(temp.path(), "b.kubeconfig");
        let c = touch(temp.path(), "nested/deeper/c.pem");

        let referenced: BTreeSet<PathBuf> = [b.clone()].into_iter().collect();
        let report = clean_staging_dir(temp.path(), &referenced).unwrap();

        assert!(!a.exists());
        assert!(b.exists());
        assert!(!c.exists());
        // directories are left in place
        assert!(temp.path().join("nested/deeper").is_dir());

        let mut deleted = report.deleted.clone();
        deleted.sort();
        let mut expected = vec![a, c];
        expected.sort();
        assert_eq!(deleted, expected);
        assert_eq!(report.retained, vec![b]);
        assert!(!report.skipped);
    }

    #[test]
    fn test_references_outside_dir_are_ignored() {
        let temp = TempDir::new().unwrap();
        let kept = touch(temp.path(), "kept");

        let referenced: BTreeSet<PathBuf> = [kept.clone(), PathBuf::from("/elsewhere/file")]
            .into_iter()
            .collect();
        let report = clean_staging_dir(temp.path(), &referenced).unwrap();

        assert!(report.deleted.is_empty());
        assert_eq!(report.retained, vec![kept]);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let report = clean_staging_dir(&temp.path().join("missing"), &BTreeSet::new()).unwrap();
        assert_eq!(report, CleanupReport::default());
    }

    #[test]
    fn test_file_instead_of_dir_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config = touch(temp.path(), "config");

        let err = clean_staging_dir(&config, &BTreeSet::new()).unwrap_err();

        assert!(matches!(err, ConfigError::Cleanup { ref path, .. } if path == &config));
        assert!(err.is_fatal());
        assert!(config.exists());
    }

    #[test]
    fn test_dot_dot_in_staging_dir_matches_references() {
        let temp = TempDir::new().unwrap();
        let kept = touch(temp.path(), "staging/kept.json");
        let orphan = touch(temp.path(), "staging/orphan.json");
        fs::create_dir_all(temp.path().join("x")).unwrap();

        let referenced: BTreeSet<PathBuf> = [kept.clone()].into_iter().collect();
        let report =
            clean_staging_dir(&temp.path().join("x/../staging"), &referenced).unwrap();

        assert!(kept.exists());
        assert!(!orphan.exists());
        assert_eq!(report.retained, vec![kept]);
        assert_eq!(report.deleted, vec![orphan]);
    }

    #[test]
    fn test_dot_dot_in_references_matches_listing() {
        let temp = TempDir::new().unwrap();
        let kept = touch(temp.path(), "staging/nested/kept.pem");

        let referenced: BTreeSet<PathBuf> = [temp.path().join("staging/./other/../nested/kept.pem")]
            .into_iter()
            .collect();
        let report = clean_staging_dir(&temp.path().join("staging"), &referenced).unwrap();

        assert!(kept.exists());
        assert!(report.deleted.is_empty());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/a/./b/../c")).unwrap(),
            PathBuf::from("/a/c")
        );
        assert!(normalize(Path::new("rel/x")).unwrap().is_absolute());
    }

    #[test]
    fn test_deletion_failure_aborts() {
        let temp = TempDir::new().unwrap();
        let a = touch(temp.path(), "a.json");
        let b = touch(temp.path(), "b.json");

        let mut attempts = Vec::new();
        let err = clean_staging_dir_with(temp.path(), &BTreeSet::new(), |path| {
            attempts.push(path.to_path_buf());
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        })
        .unwrap_err();

        assert!(err.is_fatal());
        match &err {
            ConfigError::Cleanup { reason, .. } => {
                assert!(reason.contains("a.json"), "unexpected reason: {reason}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // stops at the first failure
        assert_eq!(attempts, vec![a.clone()]);
        assert!(a.exists());
        assert!(b.exists());
    }

    #[test]
    fn test_skipped_report() {
        let report = CleanupReport::skipped();
        assert!(report.skipped);
        assert!(report.deleted.is_empty());
    }
}
