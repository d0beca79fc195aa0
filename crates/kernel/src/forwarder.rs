use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tracing::debug;

use crate::{Forwarder, ProxyError, UpstreamRequest, UpstreamResponse};

#[derive(Clone, Debug)]
pub struct HttpForwarderConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpForwarderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: "console-kernel".to_string(),
        }
    }
}

/// Sends each upstream request exactly once with a hard per-call timeout.
#[derive(Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(config: HttpForwarderConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, timeout }
    }

    fn transport_error(&self, err: reqwest::Error) -> ProxyError {
        if err.is_timeout() {
            ProxyError::Unavailable(format!(
                "upstream did not answer within {} ms",
                self.timeout.as_millis()
            ))
        } else {
            ProxyError::Unavailable(err.to_string())
        }
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn send(&self, upstream: &UpstreamRequest) -> Result<UpstreamResponse, ProxyError> {
        let method = Method::from_bytes(upstream.method.as_bytes())
            .map_err(|err| ProxyError::Validation(format!("unsupported method: {err}")))?;
        let mut request = self
            .client
            .request(method, &upstream.url)
            .headers(to_header_map(&upstream.headers));
        if !upstream.body.is_empty() {
            request = request.body(upstream.body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect::<HashMap<_, _>>();
        let body = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;
        debug!(status, bytes = body.len(), "upstream answered");
        Ok(UpstreamResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Header names or values that are not valid HTTP are dropped.
fn to_header_map(headers: &HashMap<String, String>) -> HeaderMap {
    headers
        .iter()
        .filter_map(|(name, value)| {
            Some((
                HeaderName::from_bytes(name.as_bytes()).ok()?,
                HeaderValue::from_str(value).ok()?,
            ))
        })
        .collect()
}
