use std::path::Path;

use aws_sdk_s3::config::Credentials;
use halconfig_core::StorageError;
use serde::Deserialize;

/// A JSON credentials key file.
///
/// ```json
/// { "access_key_id": "...", "secret_access_key": "...", "session_token": null }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct KeyFile {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl KeyFile {
    /// Read and parse a key file.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Credentials(format!("Failed to read key file {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            StorageError::Credentials(format!("Failed to parse key file {}: {}", path.display(), e))
        })
    }

    pub fn into_credentials(self) -> Credentials {
        Credentials::new(
            self.access_key_id,
            self.secret_access_key,
            self.session_token,
            None,
            "halconfig-key-file",
        )
    }
}
