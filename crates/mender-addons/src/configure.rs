//! Configuration syncer: on each firing, fetches the server's
//! configuration document; if it differs from the last-synced value
//! cached in the KV store, applies it via the integrator's callback and,
//! on success, reports the now-applied configuration back and updates
//! the cache.

use crate::Addon;
use mender_api_client::ApiClient;
use mender_scheduler::{BoxFuture, WorkCallback};
use mender_storage::KvClient;
use mender_transport::Transport;
use std::sync::Arc;

type ApplyConfigurationFn = dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync;

pub struct ConfigurationSyncer<T: Transport> {
    api_client: Arc<ApiClient<T>>,
    storage: Arc<KvClient>,
    apply_configuration: Arc<ApplyConfigurationFn>,
}

impl<T: Transport + 'static> ConfigurationSyncer<T> {
    pub const ADDON_NAME: &'static str = "configure";

    pub fn new(
        api_client: Arc<ApiClient<T>>,
        storage: Arc<KvClient>,
        apply_configuration: impl Fn(&serde_json::Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            api_client,
            storage,
            apply_configuration: Arc::new(apply_configuration),
        }
    }

    /// Performs one sync cycle. Never propagates an error — sync failures
    /// are logged and retried on the next firing.
    pub async fn fire(&self) {
        let fetched = match self.api_client.fetch_configuration().await {
            Ok(doc) => doc,
            Err(error) => {
                tracing::warn!(%error, "configuration fetch failed");
                return;
            }
        };

        let cached = self.storage.get_device_config(Self::ADDON_NAME).unwrap_or(None);
        if cached.as_ref() == Some(&fetched) {
            tracing::debug!("configuration unchanged, nothing to apply");
            return;
        }

        if let Err(error) = (self.apply_configuration)(&fetched) {
            tracing::warn!(error, "applying new configuration failed, will retry next firing");
            return;
        }

        if let Err(error) = self.api_client.report_configuration(&fetched).await {
            tracing::warn!(%error, "reporting applied configuration failed");
        }
        if let Err(error) = self.storage.set_device_config(Self::ADDON_NAME, &fetched) {
            tracing::warn!(%error, "caching applied configuration failed");
        }
    }

    pub fn work_callback(self: Arc<Self>) -> WorkCallback {
        Arc::new(move || -> BoxFuture {
            let this = Arc::clone(&self);
            Box::pin(async move { this.fire().await })
        })
    }
}

impl<T: Transport + 'static> Addon for ConfigurationSyncer<T> {
    fn name(&self) -> &'static str {
        Self::ADDON_NAME
    }
}
