use std::path::PathBuf;

use clap::{Parser, Subcommand};
use halconfig_engine::ConfigLayout;
use halconfig_storage_s3::ObjectStoreSettings;

/// Configuration for the halconfig command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "halconfig", version)]
#[command(about = "Inspect, edit and back up a staged halconfig document")]
pub struct Config {
    /// Config directory holding `config` and `.backup/config`.
    /// Defaults to ~/.hal for local storage and the bucket root for s3.
    #[arg(long, global = true, env = "HALCONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Storage backend: local or s3
    #[arg(long, global = true, default_value = "local", env = "HALCONFIG_BACKEND")]
    pub backend: Backend,

    /// Bucket name (for s3 backend)
    #[arg(long, global = true, env = "HALCONFIG_BUCKET")]
    pub bucket: Option<String>,

    /// Prefix prepended to every object key (for s3 backend)
    #[arg(long, global = true, env = "HALCONFIG_KEY_PREFIX")]
    pub key_prefix: Option<String>,

    /// Region (for s3 backend)
    #[arg(long, global = true, env = "HALCONFIG_REGION")]
    pub region: Option<String>,

    /// Endpoint URL of an S3-compatible service
    #[arg(long, global = true, env = "HALCONFIG_ENDPOINT")]
    pub endpoint: Option<String>,

    /// JSON credentials key file; the default credentials chain is used otherwise
    #[arg(long, global = true, env = "HALCONFIG_JSON_KEY")]
    pub json_key: Option<PathBuf>,

    /// Run as a remote daemon (enables staging directory cleanup)
    #[arg(long, global = true, env = "HALCONFIG_REMOTE_DAEMON")]
    pub remote_daemon: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the config
    Show {
        /// Read the backup slot instead of the primary one
        #[arg(long)]
        backup: bool,
    },
    /// Print the subtree at a dotted path, e.g. `deploymentConfigurations[0].providers`
    Get { path: String },
    /// Set a field to a YAML value and save
    Set { path: String, value: String },
    /// List local files referenced by the config
    Files,
    /// Snapshot the primary config into the backup slot
    Backup,
    /// Overwrite the primary config with the backup
    Restore,
    /// Delete files in a staging directory that the config no longer references
    CleanStaging { dir: PathBuf },
}

impl Config {
    /// Get the primary/backup layout for the selected backend.
    pub fn layout(&self) -> ConfigLayout {
        match (&self.config_dir, self.backend) {
            (Some(dir), _) => ConfigLayout::new(dir),
            (None, Backend::Local) => ConfigLayout::default(),
            // keys relative to the bucket (and prefix)
            (None, Backend::S3) => ConfigLayout::new(""),
        }
    }

    /// Get the object store settings, failing if no bucket was given.
    pub fn object_store_settings(&self) -> anyhow::Result<ObjectStoreSettings> {
        let bucket = self
            .bucket
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--bucket (or HALCONFIG_BUCKET) is required for the s3 backend"))?;
        Ok(ObjectStoreSettings {
            bucket,
            key_prefix: self.key_prefix.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            json_key_path: self.json_key.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    Local,
    S3,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::S3 => write!(f, "s3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_with_global_flags() {
        let config = Config::try_parse_from([
            "halconfig",
            "set",
            "deploymentConfigurations[0].version",
            "1.9.0",
            "--config-dir",
            "/tmp/hal",
        ])
        .unwrap();

        assert_eq!(
            config.command,
            Command::Set {
                path: "deploymentConfigurations[0].version".to_string(),
                value: "1.9.0".to_string(),
            }
        );
        assert_eq!(config.layout().config_path(), PathBuf::from("/tmp/hal/config"));
    }

    #[test]
    fn test_s3_layout_is_relative() {
        let config = Config::try_parse_from([
            "halconfig",
            "--backend",
            "s3",
            "--bucket",
            "team-hal",
            "show",
            "--backup",
        ])
        .unwrap();

        assert_eq!(config.backend, Backend::S3);
        assert_eq!(config.command, Command::Show { backup: true });
        assert_eq!(
            config.layout().backup_config_path(),
            PathBuf::from(".backup/config")
        );
        assert_eq!(config.object_store_settings().unwrap().bucket, "team-hal");
    }

    #[test]
    fn test_s3_requires_bucket() {
        let config = Config::try_parse_from(["halconfig", "--backend", "s3", "files"]).unwrap();
        assert!(config.object_store_settings().is_err());
    }

    #[test]
    fn test_clean_staging_command() {
        let config =
            Config::try_parse_from(["halconfig", "--remote-daemon", "clean-staging", "/staging"])
                .unwrap();
        assert!(config.remote_daemon);
        assert_eq!(
            config.command,
            Command::CleanStaging {
                dir: PathBuf::from("/staging")
            }
        );
    }
}
