mod bulk;
mod context;
mod export;
mod form;
mod forwarder;
mod proxy;
mod resource;
mod types;

pub use bulk::BulkCoordinator;
pub use context::UpstreamContext;
pub use export::ExportBridge;
pub use form::{encode_form, FORM_CONTENT_TYPE};
pub use forwarder::{HttpForwarder, HttpForwarderConfig};
pub use proxy::{interpret_response, RequestProxy};
pub use resource::{
    classify, pascal_case, ResourceOperation, ResourcePath, UpstreamEndpoints, UpstreamProduct,
};
pub use types::{
    BulkFailure, BulkOperationResult, ExportReceipt, ProxyCall, TransitionIntent, UpstreamRequest,
    UpstreamResponse,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized shape of any failure surfaced by the proxied platform.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamFailure {
    pub http_status: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    Validation(String),
    #[error("No credentials configured. Please set up credentials via /api/credentials endpoint.")]
    NoCredentialsConfigured,
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{}", .0.message)]
    Upstream(UpstreamFailure),
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn http_status(&self) -> u16 {
        match self {
            ProxyError::Validation(_) => 400,
            ProxyError::NoCredentialsConfigured | ProxyError::InvalidCredentials(_) => 401,
            ProxyError::Upstream(failure) => failure.http_status,
            ProxyError::Unavailable(_) | ProxyError::Internal(_) => 500,
        }
    }

    pub fn normalized(&self) -> UpstreamFailure {
        UpstreamFailure {
            http_status: self.http_status(),
            message: self.to_string(),
        }
    }
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn send(&self, upstream: &UpstreamRequest) -> Result<UpstreamResponse, ProxyError>;
}
