use std::path::PathBuf;

use crate::layout::ConfigLayout;

/// Which storage slot is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Primary,
    Backup,
}

/// Two-state switch between the primary and backup locations.
///
/// The backup location is only resolved when the switch moves to
/// [`Slot::Backup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackupSwitch {
    #[default]
    Primary,
    Backup { path: PathBuf },
}

impl BackupSwitch {
    pub fn slot(&self) -> Slot {
        match self {
            BackupSwitch::Primary => Slot::Primary,
            BackupSwitch::Backup { .. } => Slot::Backup,
        }
    }

    pub fn select_backup(&mut self, layout: &ConfigLayout) {
        *self = BackupSwitch::Backup {
            path: layout.backup_config_path(),
        };
    }

    pub fn select_primary(&mut self) {
        *self = BackupSwitch::Primary;
    }

    /// The location reads and writes currently target.
    pub fn active_location(&self, layout: &ConfigLayout) -> PathBuf {
        match self {
            BackupSwitch::Primary => layout.config_path(),
            BackupSwitch::Backup { path } => path.clone(),
        }
    }
}
