//! Backend configuration record.
//!
//! A single JSON record at [`CONFIG_STORAGE_PATH`] holds the Rollbar account
//! access token used to authenticate every upstream request. Writes and
//! deletes drop the cached client so the next request sees the new token.

use crate::backend::RollbarBackend;
use crate::error::{BackendError, BackendResult};
use crate::logical::StorageEntry;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, instrument};

/// Storage key of the configuration record.
pub const CONFIG_STORAGE_PATH: &str = "config";

/// Persisted backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbarConfig {
    /// Account access token with read and write scope
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret",
        default = "empty_secret"
    )]
    pub account_access_token: SecretString,
}

impl Default for RollbarConfig {
    fn default() -> Self {
        Self {
            account_access_token: empty_secret(),
        }
    }
}

impl RollbarConfig {
    /// Create a configuration for `account_access_token`.
    #[must_use]
    pub fn new(account_access_token: impl Into<String>) -> Self {
        Self {
            account_access_token: SecretString::from(account_access_token.into()),
        }
    }

    /// Whether an account token is present.
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.account_access_token.expose_secret().is_empty()
    }
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl RollbarBackend {
    /// Read the stored configuration.
    ///
    /// A missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the record cannot be decoded.
    pub async fn read_config(&self) -> BackendResult<Option<RollbarConfig>> {
        let Some(entry) = self.storage().get(CONFIG_STORAGE_PATH).await? else {
            return Ok(None);
        };

        entry
            .decode_json()
            .map(Some)
            .map_err(|e| BackendError::config(format!("error reading root configuration: {e}")))
    }

    /// Whether a configuration record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn config_exists(&self) -> BackendResult<bool> {
        Ok(self.storage().get(CONFIG_STORAGE_PATH).await?.is_some())
    }

    /// Store the configuration, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or stored.
    #[instrument(skip(self, config))]
    pub async fn write_config(&self, config: &RollbarConfig) -> BackendResult<()> {
        let entry = StorageEntry::json(CONFIG_STORAGE_PATH, config)?;
        self.storage().put(entry).await?;
        self.reset().await;

        info!("Rollbar backend configuration written");
        Ok(())
    }

    /// Remove the configuration. Removing a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails; the cached client is kept in that case.
    #[instrument(skip(self))]
    pub async fn delete_config(&self) -> BackendResult<()> {
        self.storage().delete(CONFIG_STORAGE_PATH).await?;
        self.reset().await;

        info!("Rollbar backend configuration deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::{InMemoryStorage, Storage};
    use crate::settings::BackendSettings;
    use std::sync::Arc;

    fn backend() -> (Arc<InMemoryStorage>, RollbarBackend) {
        let storage = Arc::new(InMemoryStorage::new());
        let backend = RollbarBackend::new(storage.clone(), BackendSettings::default());
        (storage, backend)
    }

    #[test]
    fn test_config_json_shape() {
        let config = RollbarConfig::new("acct-token");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json, serde_json::json!({"account_access_token": "acct-token"}));

        let decoded: RollbarConfig = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.account_access_token.expose_secret(), "acct-token");
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = RollbarConfig::new("acct-token-value");
        let debug = format!("{config:?}");
        assert!(!debug.contains("acct-token-value"));
    }

    #[test]
    fn test_missing_token_field_decodes_empty() {
        let config: RollbarConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.has_token());
    }

    #[tokio::test]
    async fn test_read_absent_config() {
        let (_, backend) = backend();
        assert!(backend.read_config().await.unwrap().is_none());
        assert!(!backend.config_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_write_then_read_config() {
        let (_, backend) = backend();
        backend.write_config(&RollbarConfig::new("first")).await.unwrap();
        backend.write_config(&RollbarConfig::new("second")).await.unwrap();

        let config = backend.read_config().await.unwrap().unwrap();
        assert_eq!(config.account_access_token.expose_secret(), "second");
        assert!(backend.config_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_config_is_unconditional() {
        let (_, backend) = backend();
        backend.delete_config().await.unwrap();

        backend.write_config(&RollbarConfig::new("tok")).await.unwrap();
        backend.delete_config().await.unwrap();
        assert!(backend.read_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_config_is_config_error() {
        let (storage, backend) = backend();
        storage
            .put(StorageEntry {
                key: CONFIG_STORAGE_PATH.to_string(),
                value: b"not json".to_vec(),
            })
            .await
            .unwrap();

        let err = backend.read_config().await.unwrap_err();
        assert!(err.is_config());
    }
}
