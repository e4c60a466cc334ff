//! The API client collaborator: a thin, stateless-per-call wrapper
//! over the `Transport` collaborator that composes authentication
//! envelopes, deployment queries, status updates, and the artifact
//! download, caching only the current session token between calls.
//!
//! Styled after `auth-engine::SupabaseClient`'s REST wrapper shape: one
//! struct holding a shared HTTP collaborator plus whatever small bit of
//! session state the protocol needs, one method per endpoint, status
//! inspected before the body is trusted, errors logged with `tracing`
//! before being returned.

use mender_artifact::{ArtifactParser, ArtifactResult, PayloadSink};
use mender_transport::{EventSink, Method, Transport, TransportError, TransportRequest};
use mender_types::{DeploymentStatus, Signer};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("unexpected status {status} from {endpoint}{}", server_message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    UnexpectedStatus {
        endpoint: &'static str,
        status: u16,
        server_message: Option<String>,
    },
    #[error("malformed response body from {0}: {1}")]
    MalformedResponse(&'static str, #[source] serde_json::Error),
    #[error("response body is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::string::FromUtf8Error),
    #[error("no session token is cached; authenticate first")]
    NotAuthenticated,
    #[error("artifact parse error: {0}")]
    Artifact(#[from] mender_artifact::ArtifactError),
}

pub type ApiResult<T> = Result<T, ApiError>;

const AUTH_PATH: &str = "/api/devices/v1/authentication/auth_requests";
const DEPLOYMENTS_NEXT_PATH: &str = "/api/devices/v1/deployments/device/deployments/next";
const INVENTORY_PATH: &str = "/api/devices/v1/inventory/device/attributes";
const CONFIGURATION_PATH: &str = "/api/devices/v1/deviceconfig/configuration/device";

#[derive(Debug, Serialize)]
struct AuthRequestBody<'a> {
    id_data: String,
    pubkey: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct DeploymentQueryResponse {
    id: String,
    artifact: DeploymentArtifact,
}

#[derive(Debug, Deserialize)]
struct DeploymentArtifact {
    artifact_name: String,
    source: DeploymentSource,
}

#[derive(Debug, Deserialize)]
struct DeploymentSource {
    uri: String,
}

#[derive(Debug, Serialize)]
struct StatusUpdateBody {
    status: &'static str,
}

/// Result of a successful `check_for_deployment` call that found a pending
/// deployment: `{id, artifact.artifact_name, artifact.source.uri}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOffer {
    pub deployment_id: String,
    pub artifact_name: String,
    pub uri: String,
}

/// One `{name, value}` device attribute reported to the inventory endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryAttribute {
    pub name: String,
    pub value: String,
}

/// The API client collaborator. Generic over the transport
/// implementation so tests can substitute a scripted double for `reqwest`.
pub struct ApiClient<T: Transport> {
    transport: T,
    session_token: Mutex<Option<String>>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            session_token: Mutex::new(None),
        }
    }

    pub fn session_token(&self) -> Option<String> {
        self.session_token.lock().unwrap().clone()
    }

    /// Clears the cached session token. An authentication failure must
    /// clear it before a retry rather than risk reusing a stale token.
    pub fn clear_session_token(&self) {
        *self.session_token.lock().unwrap() = None;
    }

    fn cached_token(&self) -> Option<String> {
        self.session_token.lock().unwrap().clone()
    }

    /// POST /api/devices/v1/authentication/auth_requests. Signs
    /// the exact bytes of the serialized body and caches the returned
    /// bearer token for subsequent calls on success.
    pub async fn authenticate(
        &self,
        id_data_json: &str,
        pubkey_pem: &str,
        tenant_token: Option<&str>,
        signer: &dyn Signer,
    ) -> ApiResult<String> {
        let body = serde_json::to_vec(&AuthRequestBody {
            id_data: id_data_json.to_string(),
            pubkey: pubkey_pem,
            tenant_token,
        })
        .expect("auth request body is always serializable");
        let signature = signer.sign(&body);

        let request = TransportRequest::new(Method::Post, AUTH_PATH)
            .with_body(body)
            .with_signature(signature);

        let mut sink = mender_transport::BufferingSink::default();
        let status = self.transport.perform(request, &mut sink).await?;

        if status != 200 {
            tracing::error!(status, "authentication rejected by server");
            return Err(ApiError::UnexpectedStatus {
                endpoint: "authenticate",
                status,
                server_message: decode_error_body(&sink.body),
            });
        }

        let token = String::from_utf8(sink.body)?;
        let token = token.trim().to_string();
        *self.session_token.lock().unwrap() = Some(token.clone());
        tracing::info!("authentication succeeded, session token cached");
        Ok(token)
    }

    /// GET .../deployments/next?artifact_name=&device_type=.
    /// Returns `None` on 204 ("no deployment available").
    pub async fn check_for_deployment(
        &self,
        artifact_name: &str,
        device_type: &str,
    ) -> ApiResult<Option<DeploymentOffer>> {
        let token = self.cached_token().ok_or(ApiError::NotAuthenticated)?;
        let path = format!(
            "{DEPLOYMENTS_NEXT_PATH}?artifact_name={}&device_type={}",
            urlencode(artifact_name),
            urlencode(device_type)
        );
        let request = TransportRequest::new(Method::Get, path).with_token(token);

        let mut sink = mender_transport::BufferingSink::default();
        let status = self.transport.perform(request, &mut sink).await?;

        match status {
            204 => Ok(None),
            200 => {
                let response: DeploymentQueryResponse = serde_json::from_slice(&sink.body)
                    .map_err(|e| ApiError::MalformedResponse("check_for_deployment", e))?;
                Ok(Some(DeploymentOffer {
                    deployment_id: response.id,
                    artifact_name: response.artifact.artifact_name,
                    uri: response.artifact.source.uri,
                }))
            }
            status => {
                tracing::error!(status, "deployment query rejected by server");
                Err(ApiError::UnexpectedStatus {
                    endpoint: "check_for_deployment",
                    status,
                    server_message: decode_error_body(&sink.body),
                })
            }
        }
    }

    /// PUT .../deployments/{id}/status. Best-effort: callers
    /// should not abort the flow in progress on failure.
    pub async fn publish_deployment_status(
        &self,
        deployment_id: &str,
        status: DeploymentStatus,
    ) -> ApiResult<()> {
        let token = self.cached_token().ok_or(ApiError::NotAuthenticated)?;
        let path = format!("/api/devices/v1/deployments/device/deployments/{deployment_id}/status");
        let body = serde_json::to_vec(&StatusUpdateBody {
            status: status.as_wire_str(),
        })
        .expect("status update body is always serializable");

        let request = TransportRequest::new(Method::Put, path).with_token(token).with_body(body);

        let mut sink = mender_transport::BufferingSink::default();
        let http_status = self.transport.perform(request, &mut sink).await?;

        if http_status != 204 {
            tracing::error!(status = http_status, deployment_id, "status report rejected by server");
            return Err(ApiError::UnexpectedStatus {
                endpoint: "publish_deployment_status",
                status: http_status,
                server_message: decode_error_body(&sink.body),
            });
        }
        Ok(())
    }

    /// GET `uri` (arbitrary, never prefixed with the server host),
    /// streaming the response body into `parser`, which in turn dispatches
    /// payload callbacks to `sink`.
    pub async fn download_artifact(
        &self,
        uri: &str,
        parser: &mut ArtifactParser,
        sink: &mut dyn PayloadSink,
    ) -> ApiResult<()> {
        let request = TransportRequest::new(Method::Get, uri);
        let mut parsing_sink = ParsingSink {
            parser,
            sink,
            error: None,
        };

        let status = self.transport.perform(request, &mut parsing_sink).await?;
        if let Some(error) = parsing_sink.error {
            return Err(ApiError::from(error));
        }
        if status != 200 {
            tracing::error!(status, "artifact download rejected by server");
            return Err(ApiError::UnexpectedStatus {
                endpoint: "download_artifact",
                status,
                server_message: None,
            });
        }
        Ok(())
    }

    /// PUT /api/devices/v1/inventory/device/attributes.
    pub async fn report_inventory(&self, attributes: &[InventoryAttribute]) -> ApiResult<()> {
        let token = self.cached_token().ok_or(ApiError::NotAuthenticated)?;
        let body = serde_json::to_vec(attributes).expect("inventory attributes are always serializable");
        let request = TransportRequest::new(Method::Put, INVENTORY_PATH)
            .with_token(token)
            .with_body(body);

        let mut sink = mender_transport::BufferingSink::default();
        let status = self.transport.perform(request, &mut sink).await?;
        if status != 200 && status != 204 {
            tracing::error!(status, "inventory report rejected by server");
            return Err(ApiError::UnexpectedStatus {
                endpoint: "report_inventory",
                status,
                server_message: decode_error_body(&sink.body),
            });
        }
        Ok(())
    }

    /// GET /api/devices/v1/deviceconfig/configuration/device.
    pub async fn fetch_configuration(&self) -> ApiResult<serde_json::Value> {
        let token = self.cached_token().ok_or(ApiError::NotAuthenticated)?;
        let request = TransportRequest::new(Method::Get, CONFIGURATION_PATH).with_token(token);

        let mut sink = mender_transport::BufferingSink::default();
        let status = self.transport.perform(request, &mut sink).await?;
        if status != 200 {
            tracing::error!(status, "configuration fetch rejected by server");
            return Err(ApiError::UnexpectedStatus {
                endpoint: "fetch_configuration",
                status,
                server_message: decode_error_body(&sink.body),
            });
        }
        serde_json::from_slice(&sink.body).map_err(|e| ApiError::MalformedResponse("fetch_configuration", e))
    }

    /// PUT /api/devices/v1/deviceconfig/configuration/device.
    pub async fn report_configuration(&self, configuration: &serde_json::Value) -> ApiResult<()> {
        let token = self.cached_token().ok_or(ApiError::NotAuthenticated)?;
        let body = serde_json::to_vec(configuration).expect("configuration document is always serializable");
        let request = TransportRequest::new(Method::Put, CONFIGURATION_PATH)
            .with_token(token)
            .with_body(body);

        let mut sink = mender_transport::BufferingSink::default();
        let status = self.transport.perform(request, &mut sink).await?;
        if status != 200 && status != 204 {
            tracing::error!(status, "configuration report rejected by server");
            return Err(ApiError::UnexpectedStatus {
                endpoint: "report_configuration",
                status,
                server_message: decode_error_body(&sink.body),
            });
        }
        Ok(())
    }
}

/// Adapts the transport's raw-byte `EventSink` callbacks to the artifact
/// parser's `feed` calls, capturing the first parse failure so it can be
/// surfaced after `Transport::perform` returns rather than threading a
/// `Result` through the `EventSink` trait.
struct ParsingSink<'a> {
    parser: &'a mut ArtifactParser,
    sink: &'a mut dyn PayloadSink,
    error: Option<mender_artifact::ArtifactError>,
}

impl EventSink for ParsingSink<'_> {
    fn on_data(&mut self, chunk: &[u8]) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = feed(self.parser, chunk, self.sink) {
            self.error = Some(e);
        }
    }
}

fn feed(parser: &mut ArtifactParser, chunk: &[u8], sink: &mut dyn PayloadSink) -> ArtifactResult<()> {
    parser.feed(chunk, sink)?;
    Ok(())
}

/// Best-effort extraction of a server-provided error string from a non-success
/// JSON body (commonly `{"error": "..."}`), used only for log/error context.
fn decode_error_body(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
