use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct UpstreamRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One inbound API call to be relayed upstream.
#[derive(Clone, Debug)]
pub struct ProxyCall {
    pub method: String,
    pub resource_path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl ProxyCall {
    pub fn new(method: impl Into<String>, resource_path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            resource_path: resource_path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionIntent {
    Archive,
    Close,
}

impl TransitionIntent {
    /// Conversation state the upstream is asked to move to.
    pub fn target_state(self) -> &'static str {
        match self {
            TransitionIntent::Archive => "inactive",
            TransitionIntent::Close => "closed",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Every requested id lands in exactly one of `successful_ids` or `failures`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationResult {
    pub requested_count: usize,
    pub successful_ids: Vec<String>,
    pub failures: Vec<BulkFailure>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReceipt {
    pub transcript_id: String,
}
