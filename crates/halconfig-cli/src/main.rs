mod config;

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use halconfig_core::StorageBackend;
use halconfig_engine::{ConfigContext, ConfigError, EngineOptions};
use halconfig_storage_local::LocalStorage;
use halconfig_storage_s3::ObjectStoreStorage;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Backend, Command, Config};

fn main() -> anyhow::Result<()> {
    // Initialize logging (stdout carries command output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    let layout = config.layout();
    info!("Backend: {}", config.backend);
    info!("  Config: {}", layout.config_path().display());

    // Create storage backend
    let storage: Arc<dyn StorageBackend> = match config.backend {
        Backend::Local => Arc::new(LocalStorage::default()),
        Backend::S3 => Arc::new(ObjectStoreStorage::connect(config.object_store_settings()?)?),
    };

    let options = EngineOptions {
        remote_daemon: config.remote_daemon,
        ..Default::default()
    };
    let mut ctx = ConfigContext::new(Arc::clone(&storage), layout, options);

    match run(&mut ctx, &*storage, config.command) {
        Err(e) if e.downcast_ref::<ConfigError>().is_some_and(|e| !e.is_fatal()) => {
            warn!("{}", e);
            Ok(())
        }
        result => result,
    }
}

fn run(ctx: &mut ConfigContext, storage: &dyn StorageBackend, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Show { backup } => {
            if backup {
                ctx.switch_to_backup();
            }
            print!("{}", ctx.get_config()?.to_yaml_string()?);
        }
        Command::Get { path } => {
            let tree = ctx.get_config()?;
            let id = tree
                .resolve(&path)
                .ok_or_else(|| anyhow!("Nothing found at `{}`", path))?;
            print!("{}", serde_yaml::to_string(&tree.value_of(id))?);
        }
        Command::Set { path, value } => {
            let (parent_path, field) = split_field_path(&path)?;
            let value: serde_yaml::Value =
                serde_yaml::from_str(&value).with_context(|| format!("Invalid YAML value for `{}`", path))?;

            let tree = ctx.get_config()?;
            let parent = tree
                .resolve(parent_path)
                .ok_or_else(|| anyhow!("Nothing found at `{}`", parent_path))?;
            tree.set_field(parent, field, value)?;
            ctx.save()?;
            info!("Set {}", path);
        }
        Command::Files => {
            for file in ctx.referenced_files()? {
                println!("{}", file.display());
            }
        }
        Command::Backup => {
            ctx.backup_config()?;
            info!("Backed up config to {}", ctx.layout().backup_config_path().display());
        }
        Command::Restore => {
            let backup = ctx.layout().backup_config_path();
            if let Err(e) = storage.read_stream(&backup) {
                if e.is_not_found() {
                    bail!("No backup found at {}", backup.display());
                }
                return Err(e.into());
            }

            ctx.switch_to_backup();
            let contents = ctx.get_config()?.to_yaml_string()?;
            ctx.switch_to_primary();
            ctx.set_in_memory_config(contents.as_bytes())?;
            ctx.save()?;
            info!("Restored config from {}", backup.display());
        }
        Command::CleanStaging { dir } => {
            let report = ctx.clean_local_files(&dir)?;
            if report.skipped {
                warn!(
                    "Not running as a remote daemon, {} left untouched",
                    dir.display()
                );
            }
            for file in &report.deleted {
                println!("deleted {}", file.display());
            }
        }
    }
    Ok(())
}

/// Split `a.b[0].c` into the parent path `a.b[0]` and the field `c`.
fn split_field_path(path: &str) -> anyhow::Result<(&str, &str)> {
    let (parent, field) = path.rsplit_once('.').unwrap_or(("", path));
    if field.is_empty() || field.contains('[') {
        bail!("`{}` does not end in a field name", path);
    }
    Ok((parent, field))
}
