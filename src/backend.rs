//! Backend handle and Rollbar client cache.
//!
//! One [`RollbarBackend`] exists per mount. It owns the storage handle, the
//! runtime settings and the only piece of shared mutable state: the lazily
//! built [`RollbarClient`], guarded by a read-write lock.

use crate::{
    client::RollbarClient,
    config::CONFIG_STORAGE_PATH,
    error::{BackendResult, ResultExt},
    logical::Storage,
    settings::BackendSettings,
};
use std::{fmt, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Help text shown for the mount.
pub const BACKEND_HELP: &str = "\
The rollbar secrets backend allows for the dynamic generation of rollbar
project access tokens. After mounting this backend, credentials to interact
with the rollbar API must be configured with the /config endpoint.";

/// Rollbar secrets backend.
pub struct RollbarBackend {
    storage: Arc<dyn Storage>,
    settings: BackendSettings,
    client: RwLock<Option<Arc<RollbarClient>>>,
}

impl fmt::Debug for RollbarBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbarBackend")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RollbarBackend {
    /// Create a backend over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, settings: BackendSettings) -> Self {
        Self {
            storage,
            settings,
            client: RwLock::new(None),
        }
    }

    /// Backend storage.
    #[must_use]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Runtime settings.
    #[must_use]
    pub const fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Get the shared Rollbar client, building it from stored configuration
    /// on first use.
    ///
    /// Concurrent callers that miss the cache serialize on the write lock and
    /// re-check it, so exactly one client is stored and every caller gets it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no usable account token is stored.
    pub async fn get_client(&self) -> BackendResult<Arc<RollbarClient>> {
        if let Some(client) = self.client.read().await.as_ref() {
            debug!("Rollbar client cache hit");
            return Ok(Arc::clone(client));
        }

        let mut slot = self.client.write().await;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        debug!("Rollbar client cache miss, building client");
        let config = self
            .read_config()
            .await
            .context("error reading configuration")?
            .unwrap_or_default();
        let client = Arc::new(RollbarClient::new(&config, &self.settings)?);

        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Drop the cached client.
    pub async fn reset(&self) {
        *self.client.write().await = None;
    }

    /// Storage invalidation hook; a change to the configuration record drops
    /// the cached client.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, key: &str) {
        if key == CONFIG_STORAGE_PATH {
            debug!("Configuration invalidated");
            self.reset().await;
        }
    }

    /// Whether a client is currently cached.
    pub async fn has_cached_client(&self) -> bool {
        self.client.read().await.is_some()
    }
}
