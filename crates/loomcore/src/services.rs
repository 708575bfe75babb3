//! Collaborators the engine consumes but does not implement: an HTTP
//! transport and a credential lookup.

use crate::value::{JsonObject, Value};
use crate::NodeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Request body, encoded according to the node's content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum HttpBody {
    None,
    Json(Value),
    Form(Vec<(String, String)>),
    Raw { content_type: String, text: String },
}

/// Transport-neutral description of one outbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status: u16,
    pub headers: JsonObject,
    pub body: Value,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NodeError>;
}

/// Offline transport: answers every request with `200` and echoes the request
/// descriptor as the body. Used when running graphs against simulated data.
#[derive(Debug, Default, Clone)]
pub struct SimulatedTransport;

#[async_trait]
impl HttpTransport for SimulatedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NodeError> {
        tracing::debug!(method = %request.method, url = %request.url, "simulating HTTP request");
        let body = serde_json::to_value(&request)
            .map_err(|e| NodeError::Transport(format!("cannot encode request: {}", e)))?;
        let mut headers = JsonObject::new();
        headers.insert("content-type".to_string(), Value::from("application/json"));
        headers.insert("x-simulated".to_string(), Value::from("true"));
        Ok(HttpResponse {
            status: 200,
            headers,
            body,
        })
    }
}

/// Resolves a credential type name to its decrypted fields.
pub trait CredentialStore: Send + Sync {
    /// Unknown credential types yield an empty map.
    fn lookup(&self, credential_type: &str) -> JsonObject;
}

#[derive(Debug, Default, Clone)]
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn lookup(&self, _credential_type: &str) -> JsonObject {
        JsonObject::new()
    }
}

/// In-memory credentials keyed by type name.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    entries: HashMap<String, JsonObject>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, credential_type: impl Into<String>, fields: JsonObject) -> Self {
        self.entries.insert(credential_type.into(), fields);
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn lookup(&self, credential_type: &str) -> JsonObject {
        self.entries.get(credential_type).cloned().unwrap_or_default()
    }
}

/// Collaborators handed to every node invocation.
#[derive(Clone)]
pub struct Services {
    pub http: Arc<dyn HttpTransport>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl Services {
    pub fn new(http: Arc<dyn HttpTransport>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { http, credentials }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self {
            http: Arc::new(SimulatedTransport),
            credentials: Arc::new(NoCredentials),
        }
    }
}
