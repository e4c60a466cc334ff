//! `event_sink`: receives (connected), (data-chunk, bytes),
//! (disconnected), (error) notifications as the transport streams a
//! response body.

use crate::TransportError;

pub trait EventSink: Send {
    fn on_connected(&mut self) {}
    fn on_data(&mut self, chunk: &[u8]);
    fn on_disconnected(&mut self) {}
    fn on_error(&mut self, _error: &TransportError) {}
}

/// The simplest possible sink: accumulates the whole body in memory. Used
/// by the API client for the small, non-streamed responses (authenticate,
/// check_for_deployment, publish_deployment_status); the artifact download
/// uses a sink that feeds the streaming parser instead.
#[derive(Default)]
pub struct BufferingSink {
    pub body: Vec<u8>,
    pub connected: bool,
    pub disconnected: bool,
}

impl EventSink for BufferingSink {
    fn on_connected(&mut self) {
        self.connected = true;
    }

    fn on_data(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    fn on_disconnected(&mut self) {
        self.disconnected = true;
    }
}
