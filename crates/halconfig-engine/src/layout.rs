use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config";
const BACKUP_DIR_NAME: &str = ".backup";

/// Where the primary and backup documents live inside a config directory.
///
/// ```text
/// {dir}/
///   config            # primary
///   .backup/
///     config          # backup
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayout {
    dir: PathBuf,
}

impl ConfigLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.dir.join(BACKUP_DIR_NAME)
    }

    pub fn backup_config_path(&self) -> PathBuf {
        self.backup_dir().join(CONFIG_FILE_NAME)
    }
}

impl Default for ConfigLayout {
    /// `~/.hal`, falling back to `./.hal` when there is no home directory.
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".hal"))
    }
}
