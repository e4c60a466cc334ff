//! The Transport collaborator: issues authenticated HTTP requests and
//! streams response bodies as chunks to an `EventSink`.

mod reqwest_transport;
mod sink;

pub use reqwest_transport::ReqwestTransport;
pub use sink::{BufferingSink, EventSink};

use async_trait::async_trait;
use mender_types::describe_status;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// A request to be performed by the transport collaborator. `url_or_path` is
/// either an absolute URL (used verbatim, e.g. an artifact download URI
/// which must never be prefixed with the server host) or a path
/// relative to the configured server host.
pub struct TransportRequest {
    pub method: Method,
    pub url_or_path: String,
    pub token: Option<String>,
    pub body: Option<Vec<u8>>,
    pub signature: Option<String>,
}

impl TransportRequest {
    pub fn new(method: Method, url_or_path: impl Into<String>) -> Self {
        Self {
            method,
            url_or_path: url_or_path.into(),
            token: None,
            body: None,
            signature: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("non-success status {status} ({}){}", describe_status(*status), server_message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    NonSuccessStatus {
        status: u16,
        server_message: Option<String>,
    },
}

impl TransportError {
    /// Distinguishes retryable network/server conditions from fatal ones,
    /// informing whether the caller should reschedule at the normal
    /// interval or treat the failure as terminal for this operation.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_connect() || e.is_timeout(),
            TransportError::NonSuccessStatus { status, .. } => *status >= 500,
            TransportError::InvalidUrl(_) => false,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// `Transport.perform`: issues the request and streams the response
/// body to `sink`, returning the HTTP status code on completion (even for
/// non-2xx statuses — callers inspect the status themselves; only
/// connection-level failures become `Err`).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: TransportRequest, sink: &mut dyn EventSink) -> TransportResult<u16>;
}
