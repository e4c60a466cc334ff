//! Remote shell bridge: a stub collaborator. It registers its own
//! work item but, absent a configured shell-session transport, firing is
//! a no-op. Exists to demonstrate that the add-on contract
//! (init/activate/deactivate/exit hooks, an independent work item, no
//! mutation of the client's own state) does not privilege any one
//! add-on; a full remote-shell protocol (session multiplexing, PTY
//! framing) is out of scope here.

use crate::Addon;
use mender_scheduler::{BoxFuture, WorkCallback};
use std::sync::Arc;

/// Extension point a platform port would implement to carry an actual
/// interactive shell session over some transport. No implementation
/// ships in this workspace.
pub trait ShellSessionTransport: Send + Sync {
    fn poll(&self);
}

pub struct RemoteShellBridge {
    session_transport: Option<Arc<dyn ShellSessionTransport>>,
}

impl RemoteShellBridge {
    pub fn new() -> Self {
        Self {
            session_transport: None,
        }
    }

    pub fn with_session_transport(mut self, transport: Arc<dyn ShellSessionTransport>) -> Self {
        self.session_transport = Some(transport);
        self
    }

    pub async fn fire(&self) {
        match &self.session_transport {
            Some(transport) => transport.poll(),
            None => tracing::trace!("remote shell bridge fired with no session transport configured, no-op"),
        }
    }

    pub fn work_callback(self: Arc<Self>) -> WorkCallback {
        Arc::new(move || -> BoxFuture {
            let this = Arc::clone(&self);
            Box::pin(async move { this.fire().await })
        })
    }
}

impl Default for RemoteShellBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Addon for RemoteShellBridge {
    fn name(&self) -> &'static str {
        "remote-shell"
    }
}
