use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use halconfig_core::{
    collect_local_files, halconfig_schema, ConfigTree, Schema, StorageBackend, StorageError,
    TreeError,
};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, instrument, warn};

use crate::cleaner::{clean_staging_dir, CleanupReport};
use crate::error::ConfigError;
use crate::layout::ConfigLayout;
use crate::switch::{BackupSwitch, Slot};

/// Host settings the engine consults.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Staging directories are only garbage-collected when running as a
    /// remote daemon.
    pub remote_daemon: bool,
    /// Stamped into freshly generated configs.
    pub version: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            remote_daemon: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The document staged when no config exists yet.
pub fn default_document(version: &str) -> Value {
    let mut deployment = Mapping::new();
    deployment.insert("name".into(), "default".into());
    deployment.insert("version".into(), "".into());
    deployment.insert("providers".into(), Value::Mapping(Mapping::new()));

    let mut root = Mapping::new();
    root.insert("halyardVersion".into(), version.into());
    root.insert("currentDeployment".into(), "default".into());
    root.insert(
        "deploymentConfigurations".into(),
        Value::Sequence(vec![Value::Mapping(deployment)]),
    );
    Value::Mapping(root)
}

/// Holder of at most one staged config tree.
///
/// The first [`get_config`](Self::get_config) loads the document from the
/// active location and keeps it; mutations go to that tree until
/// [`save`](Self::save) writes it back or [`discard`](Self::discard) drops it.
/// A context is owned by one unit of work and is not meant to be shared.
pub struct ConfigContext {
    storage: Arc<dyn StorageBackend>,
    layout: ConfigLayout,
    schema: Arc<Schema>,
    options: EngineOptions,
    current: Option<ConfigTree>,
    switch: BackupSwitch,
}

impl fmt::Debug for ConfigContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigContext")
            .field("storage", &self.storage.backend_name())
            .field("layout", &self.layout)
            .field("options", &self.options)
            .field("staged", &self.current.is_some())
            .field("switch", &self.switch)
            .finish()
    }
}

impl ConfigContext {
    /// Create a context over the built-in halconfig schema.
    pub fn new(storage: Arc<dyn StorageBackend>, layout: ConfigLayout, options: EngineOptions) -> Self {
        Self::with_schema(storage, layout, options, Arc::new(halconfig_schema()))
    }

    pub fn with_schema(
        storage: Arc<dyn StorageBackend>,
        layout: ConfigLayout,
        options: EngineOptions,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            storage,
            layout,
            schema,
            options,
            current: None,
            switch: BackupSwitch::default(),
        }
    }

    pub fn layout(&self) -> &ConfigLayout {
        &self.layout
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn slot(&self) -> Slot {
        self.switch.slot()
    }

    /// The location loads and saves currently target.
    pub fn storage_location(&self) -> PathBuf {
        self.switch.active_location(&self.layout)
    }

    /// The staged tree, if any, without loading.
    pub fn staged(&self) -> Option<&ConfigTree> {
        self.current.as_ref()
    }

    /// Return the staged tree, loading it from the active location first if
    /// nothing is staged.
    #[instrument(skip(self), level = "debug")]
    pub fn get_config(&mut self) -> Result<&mut ConfigTree, ConfigError> {
        let tree = match self.current.take() {
            Some(tree) => tree,
            None => self.load(self.storage_location())?,
        };
        Ok(self.current.insert(tree))
    }

    /// Stage a config parsed from `bytes` without going through storage.
    ///
    /// Replaces anything already staged. The tree carries no location, so a
    /// later save writes it to the active location.
    #[instrument(skip(self, bytes), level = "debug", fields(data_len = bytes.len()))]
    pub fn set_in_memory_config(&mut self, bytes: &[u8]) -> Result<&mut ConfigTree, ConfigError> {
        let tree = ConfigTree::parse(bytes, Arc::clone(&self.schema))
            .map_err(|e| ConfigError::IllegalArgument(e.to_string()))?
            .ok_or_else(|| ConfigError::IllegalArgument("document is empty".to_string()))?;
        Ok(self.current.insert(tree))
    }

    /// Drop the staged tree without writing it.
    pub fn discard(&mut self) {
        if self.current.take().is_some() {
            debug!("Discarded staged halconfig");
        }
    }

    /// Write the staged tree to the active location.
    ///
    /// The stage is released whether or not the write succeeds.
    #[instrument(skip(self), level = "debug")]
    pub fn save(&mut self) -> Result<(), ConfigError> {
        self.save_to(self.storage_location())
    }

    /// Snapshot the primary config into the backup location.
    ///
    /// A tree staged from the primary location is written as staged,
    /// including unsaved changes. Anything else staged is discarded and the
    /// primary config is loaded from storage instead. The active slot is left
    /// unchanged.
    #[instrument(skip(self), level = "debug")]
    pub fn backup_config(&mut self) -> Result<(), ConfigError> {
        let primary = self.layout.config_path();
        let staged_from_primary = self
            .current
            .as_ref()
            .is_some_and(|tree| tree.path() == Some(primary.as_path()));

        if !staged_from_primary {
            if self.current.take().is_some() {
                warn!("Discarding config staged outside {} before backup", primary.display());
            }
            let tree = self.load(primary)?;
            self.current = Some(tree);
        }

        self.save_to(self.layout.backup_config_path())
    }

    /// Discard the stage and target the backup location.
    pub fn switch_to_backup(&mut self) {
        self.discard();
        self.switch.select_backup(&self.layout);
        info!("Switched to backup config at {}", self.storage_location().display());
    }

    /// Discard the stage and target the primary location.
    pub fn switch_to_primary(&mut self) {
        self.discard();
        self.switch.select_primary();
        info!("Switched to primary config at {}", self.storage_location().display());
    }

    /// Local files referenced by the staged config.
    pub fn referenced_files(&mut self) -> Result<BTreeSet<PathBuf>, ConfigError> {
        Ok(collect_local_files(self.get_config()?)?)
    }

    /// Delete files under `staging_dir` that the staged config no longer
    /// references.
    ///
    /// Does nothing unless running as a remote daemon.
    #[instrument(skip(self), level = "debug")]
    pub fn clean_local_files(&mut self, staging_dir: &Path) -> Result<CleanupReport, ConfigError> {
        if !self.options.remote_daemon {
            debug!(
                "Not running as a remote daemon, leaving {} untouched",
                staging_dir.display()
            );
            return Ok(CleanupReport::skipped());
        }

        let referenced = self.referenced_files()?;
        clean_staging_dir(staging_dir, &referenced)
    }

    /// Read, parse and stamp the tree at `location`, falling back to the
    /// default document when nothing is stored there.
    fn load(&self, location: PathBuf) -> Result<ConfigTree, ConfigError> {
        let parsed = match self.storage.read_stream(&location) {
            Ok(stream) => ConfigTree::from_reader(stream, Arc::clone(&self.schema)).map_err(
                |source| match source {
                    TreeError::Io(e) => ConfigError::Read {
                        path: location.clone(),
                        source: StorageError::Io(e.to_string()),
                    },
                    source => ConfigError::Parse {
                        path: location.clone(),
                        source,
                    },
                },
            )?,
            Err(e) if e.is_not_found() => None,
            Err(source) => {
                return Err(ConfigError::Read {
                    path: location,
                    source,
                })
            }
        };

        let mut tree = match parsed {
            Some(tree) => tree,
            None => {
                info!("No halconfig found at {} - generating a new one...", location.display());
                ConfigTree::from_value(
                    default_document(&self.options.version),
                    Arc::clone(&self.schema),
                )
                .map_err(|source| ConfigError::Parse {
                    path: location.clone(),
                    source,
                })?
            }
        };
        tree.set_path(location);
        Ok(tree)
    }

    fn save_to(&mut self, location: PathBuf) -> Result<(), ConfigError> {
        let Some(tree) = self.current.take() else {
            warn!("No changes staged for writing.");
            return Err(ConfigError::NoPendingChanges);
        };

        let contents = tree.to_yaml_string().map_err(ConfigError::Serialize)?;
        self.storage
            .write_text_object(&location, &contents)
            .map_err(|source| ConfigError::Write {
                path: location.clone(),
                source,
            })?;

        info!("Saved halconfig to {}", location.display());
        Ok(())
    }
}
