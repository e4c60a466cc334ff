//! Inventory reporter: on each firing, gathers a static attribute
//! list plus whatever the integrator's dynamic-attributes callback
//! supplies, and reports it via the API client's inventory endpoint.
//! Failures are logged and never affect client state.

use crate::Addon;
use mender_api_client::{ApiClient, InventoryAttribute};
use mender_scheduler::{BoxFuture, WorkCallback};
use mender_transport::Transport;
use std::sync::Arc;

type DynamicAttributesFn = dyn Fn() -> Vec<InventoryAttribute> + Send + Sync;

pub struct InventoryReporter<T: Transport> {
    api_client: Arc<ApiClient<T>>,
    static_attributes: Vec<InventoryAttribute>,
    dynamic_attributes: Option<Arc<DynamicAttributesFn>>,
}

impl<T: Transport + 'static> InventoryReporter<T> {
    pub fn new(api_client: Arc<ApiClient<T>>, static_attributes: Vec<InventoryAttribute>) -> Self {
        Self {
            api_client,
            static_attributes,
            dynamic_attributes: None,
        }
    }

    /// Supplies a callback invoked on every firing to collect attributes
    /// that change at runtime (e.g. free disk space), in addition to the
    /// fixed attributes supplied at registration time.
    pub fn with_dynamic_attributes(mut self, f: impl Fn() -> Vec<InventoryAttribute> + Send + Sync + 'static) -> Self {
        self.dynamic_attributes = Some(Arc::new(f));
        self
    }

    /// Performs one reporting cycle: gathers attributes and PUTs them.
    /// Errors are logged, never propagated — inventory reporting is
    /// best-effort and must not affect the client's own state.
    pub async fn fire(&self) {
        let mut attributes = self.static_attributes.clone();
        if let Some(dynamic) = &self.dynamic_attributes {
            attributes.extend((dynamic)());
        }

        match self.api_client.report_inventory(&attributes).await {
            Ok(()) => tracing::debug!(count = attributes.len(), "inventory reported"),
            Err(error) => tracing::warn!(%error, "inventory report failed"),
        }
    }

    /// Wraps `fire` as a `WorkCallback` for `Scheduler::work_create`.
    pub fn work_callback(self: Arc<Self>) -> WorkCallback {
        Arc::new(move || -> BoxFuture {
            let this = Arc::clone(&self);
            Box::pin(async move { this.fire().await })
        })
    }
}

impl<T: Transport + 'static> Addon for InventoryReporter<T> {
    fn name(&self) -> &'static str {
        "inventory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mender_transport::{EventSink, TransportRequest, TransportResult};
    use std::sync::Mutex;

    struct RecordingTransport {
        last_body: Arc<Mutex<Option<Vec<u8>>>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn perform(&self, request: TransportRequest, _sink: &mut dyn EventSink) -> TransportResult<u16> {
            *self.last_body.lock().unwrap() = request.body;
            Ok(200)
        }
    }

    struct FakeSigner;
    impl mender_types::Signer for FakeSigner {
        fn sign(&self, _payload: &[u8]) -> String {
            "sig".to_string()
        }
    }

    #[tokio::test]
    async fn fire_merges_static_and_dynamic_attributes() {
        let last_body = Arc::new(Mutex::new(None));
        let transport = RecordingTransport {
            last_body: Arc::clone(&last_body),
        };
        let api_client = Arc::new(ApiClient::new(transport));
        // report_inventory requires a cached session token.
        api_client.authenticate("{}", "pem", None, &FakeSigner).await.unwrap();

        let reporter = Arc::new(
            InventoryReporter::new(
                Arc::clone(&api_client),
                vec![InventoryAttribute {
                    name: "device_type".to_string(),
                    value: "raspberrypi4".to_string(),
                }],
            )
            .with_dynamic_attributes(|| {
                vec![InventoryAttribute {
                    name: "artifact_name".to_string(),
                    value: "release-1.2.3".to_string(),
                }]
            }),
        );

        reporter.fire().await;

        let body = last_body.lock().unwrap().clone().unwrap();
        let attributes: Vec<InventoryAttribute> = serde_json::from_slice(&body).unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].name, "device_type");
        assert_eq!(attributes[1].name, "artifact_name");
    }
}
