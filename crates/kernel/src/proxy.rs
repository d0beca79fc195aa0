use std::collections::HashMap;
use std::sync::Arc;

use control_plane::CredentialStore;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::context::UpstreamContext;
use crate::form::{encode_form, FORM_CONTENT_TYPE};
use crate::resource::{ResourcePath, UpstreamEndpoints};
use crate::types::{ProxyCall, UpstreamRequest, UpstreamResponse};
use crate::{Forwarder, ProxyError, UpstreamFailure};

/// Relays console calls to the upstream platform using whatever
/// credentials are stored at the moment of the call.
pub struct RequestProxy {
    credentials: CredentialStore,
    forwarder: Arc<dyn Forwarder>,
    endpoints: UpstreamEndpoints,
}

impl RequestProxy {
    pub fn new(
        credentials: CredentialStore,
        forwarder: Arc<dyn Forwarder>,
        endpoints: UpstreamEndpoints,
    ) -> Self {
        Self {
            credentials,
            forwarder,
            endpoints,
        }
    }

    /// One upstream page per call; no retry.
    pub async fn invoke(&self, call: &ProxyCall) -> Result<Value, ProxyError> {
        let path = ResourcePath::parse(&call.resource_path)?;
        let context = self.context().await?;
        self.send(&context, &call.method, &path, call.body.as_ref(), &call.query)
            .await
    }

    /// Reads the credentials record and derives the auth context. Fails
    /// before any network activity when nothing is stored.
    pub async fn context(&self) -> Result<UpstreamContext, ProxyError> {
        let store = self.credentials.clone();
        let credentials = tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|err| ProxyError::Internal(err.to_string()))?
            .map_err(|err| ProxyError::Internal(err.to_string()))?
            .ok_or(ProxyError::NoCredentialsConfigured)?;
        UpstreamContext::from_credentials(&credentials)
    }

    pub async fn send(
        &self,
        context: &UpstreamContext,
        method: &str,
        path: &ResourcePath,
        body: Option<&Value>,
        query: &[(String, String)],
    ) -> Result<Value, ProxyError> {
        let method = method.to_ascii_uppercase();
        let url = path.upstream_url(&self.endpoints, query)?;

        let mut headers = HashMap::from([
            (
                "authorization".to_string(),
                context.authorization_header().to_string(),
            ),
            ("accept".to_string(), "application/json".to_string()),
        ]);
        let body = match body {
            Some(body) if method != "GET" && method != "DELETE" => encode_form(body)?,
            _ => Vec::new(),
        };
        if !body.is_empty() {
            headers.insert("content-type".to_string(), FORM_CONTENT_TYPE.to_string());
        }

        debug!(method = %method, resource = %path, auth = ?context.auth_method(), "forwarding upstream");
        let request = UpstreamRequest {
            method,
            url,
            headers,
            body,
        };
        let response = self.forwarder.send(&request).await.map_err(|err| {
            warn!(resource = %path, error = %err, "upstream call failed");
            err
        })?;
        interpret_response(response).map_err(|err| {
            warn!(resource = %path, status = err.http_status(), error = %err, "upstream rejected call");
            err
        })
    }
}

/// Maps an upstream reply to the parsed body or a normalized failure. Empty
/// success bodies (deletes) become `{"success": true}`.
pub fn interpret_response(response: UpstreamResponse) -> Result<Value, ProxyError> {
    if !response.is_success() {
        return Err(ProxyError::Upstream(UpstreamFailure {
            http_status: response.status,
            message: upstream_message(response.status, &response.body),
        }));
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({ "success": true }));
    }
    serde_json::from_slice(&response.body).map_err(|err| {
        ProxyError::Upstream(UpstreamFailure {
            http_status: 500,
            message: format!("malformed upstream response: {err}"),
        })
    })
}

fn upstream_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("upstream request failed with status {status}"))
}
