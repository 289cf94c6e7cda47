use std::fmt;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use halconfig_core::{ObjectStream, StorageBackend, StorageError};
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument};

use crate::credentials::KeyFile;

/// Content type set on every object written by this backend.
pub const CONTENT_TYPE: &str = "application/text";

/// Connection settings for [`ObjectStoreStorage`].
#[derive(Debug, Clone, Default)]
pub struct ObjectStoreSettings {
    /// Bucket holding every object this backend reads or writes.
    pub bucket: String,
    /// Optional prefix prepended to every object key.
    pub key_prefix: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services. Enables path-style
    /// addressing.
    pub endpoint: Option<String>,
    /// JSON credentials key file. The default credentials chain is used
    /// when unset.
    pub json_key_path: Option<PathBuf>,
}

/// Object store backend over the S3 API.
///
/// Storage layout:
/// ```text
/// {bucket}/
///   {key_prefix}/
///     config            # primary slot
///     .backup/config    # backup slot
/// ```
///
/// The client and its credentials are resolved once in [`connect`] and
/// reused. Calls block on a runtime owned by the backend, so they must not
/// be made from inside another async runtime.
///
/// [`connect`]: ObjectStoreStorage::connect
pub struct ObjectStoreStorage {
    s3_client: S3Client,
    runtime: Runtime,
    bucket_name: String,
    key_prefix: Option<String>,
}

impl fmt::Debug for ObjectStoreStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreStorage")
            .field("bucket_name", &self.bucket_name)
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl ObjectStoreStorage {
    /// Resolve credentials and build the client.
    pub fn connect(settings: ObjectStoreSettings) -> Result<Self, StorageError> {
        if settings.bucket.is_empty() {
            return Err(StorageError::InvalidArgument(
                "An object store bucket name is required".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::Io(format!("Failed to start object store runtime: {}", e)))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::disabled());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        match &settings.json_key_path {
            Some(path) => {
                let key = KeyFile::load(path)?;
                loader = loader.credentials_provider(key.into_credentials());
                info!("Loaded credentials from {}", path.display());
            }
            None => info!("Using default application credentials"),
        }

        let shared_config = runtime.block_on(loader.load());
        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(settings.endpoint.is_some())
            .build();

        Ok(Self {
            s3_client: S3Client::from_conf(s3_config),
            runtime,
            bucket_name: settings.bucket,
            key_prefix: settings.key_prefix,
        })
    }

    /// Get the object key for a location.
    fn key(&self, location: &Path) -> Result<String, StorageError> {
        object_key(self.key_prefix.as_deref(), location)
    }

    fn display_key(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket_name, key)
    }

    /// Get an object, buffering the whole body.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let result = self
            .s3_client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| {
                        StorageError::Io(format!(
                            "Failed to read {} body: {}",
                            self.display_key(key),
                            e
                        ))
                    })?
                    .into_bytes();
                Ok(bytes.to_vec())
            }
            Err(e) => {
                let missing = e.as_service_error().is_some_and(|se| se.is_no_such_key())
                    || e.raw_response().is_some_and(|r| r.status().as_u16() == 404);
                if missing {
                    Err(StorageError::NotFound(self.display_key(key)))
                } else {
                    Err(StorageError::Io(format!(
                        "get_object error for {}: {}",
                        self.display_key(key),
                        DisplayErrorContext(&e)
                    )))
                }
            }
        }
    }

    /// Put an object with the fixed text content type.
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.s3_client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(CONTENT_TYPE)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| {
                StorageError::Io(format!(
                    "put_object error for {}: {}",
                    self.display_key(key),
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

impl StorageBackend for ObjectStoreStorage {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), level = "debug")]
    fn read_stream(&self, location: &Path) -> Result<ObjectStream, StorageError> {
        let key = self.key(location)?;
        let data = self.runtime.block_on(self.get_object(&key))?;
        debug!("Loaded {} ({} bytes)", self.display_key(&key), data.len());
        Ok(Box::new(Cursor::new(data)))
    }

    #[instrument(skip(self, contents), level = "debug", fields(data_len = contents.len()))]
    fn write_text_object(&self, location: &Path, contents: &str) -> Result<(), StorageError> {
        let key = self.key(location)?;
        self.runtime.block_on(self.put_object(&key, contents.as_bytes()))?;
        debug!("Saved {} ({} bytes)", self.display_key(&key), contents.len());
        Ok(())
    }
}

/// Translate a location into an object key.
///
/// Root and prefix components are dropped, so `/home/me/.hal/config` and
/// `home/me/.hal/config` name the same object. `..` is rejected.
fn object_key(prefix: Option<&str>, location: &Path) -> Result<String, StorageError> {
    let mut parts = Vec::new();
    for component in location.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                return Err(StorageError::InvalidArgument(format!(
                    "Object location {} must not contain `..`",
                    location.display()
                )))
            }
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
        }
    }
    if parts.is_empty() {
        return Err(StorageError::InvalidArgument(format!(
            "Object location {} does not name an object",
            location.display()
        )));
    }

    let key = parts.join("/");
    Ok(match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, key),
        None => key,
    })
}
