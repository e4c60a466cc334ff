//! Integrator-supplied callbacks. The client never returns from
//! these synchronously expecting a value it can act on further except the
//! authentication-result callback's own boolean — everything else is
//! fire-and-forget, matching the rest of the collaborator surface.

use std::sync::Arc;

/// Invoked to hand control back to the integrator for a reboot. Expected
/// not to return in production (the process image changes underneath it);
/// test doubles simply record the call.
pub type RestartCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked after `API.authenticate` completes, with `true` if it succeeded.
/// The callback returns its own assessment of whether the device is usable
/// in this authenticated state; returning `false` with a `PendingDeployment`
/// on record is the signal used to trigger a rollback.
pub type AuthResultCallback = Arc<dyn Fn(bool) -> bool + Send + Sync>;

/// Bundles the callbacks `Client::init` requires. Cloned cheaply (every
/// field is an `Arc`).
#[derive(Clone)]
pub struct ClientCallbacks {
    pub restart: RestartCallback,
    pub on_auth_result: Option<AuthResultCallback>,
}

impl ClientCallbacks {
    pub fn new(restart: RestartCallback) -> Self {
        Self {
            restart,
            on_auth_result: None,
        }
    }

    pub fn with_auth_result_callback(mut self, callback: AuthResultCallback) -> Self {
        self.on_auth_result = Some(callback);
        self
    }
}
