use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::proxy::RequestProxy;
use crate::resource::{ResourcePath, UpstreamProduct};
use crate::types::ExportReceipt;
use crate::{ProxyError, UpstreamFailure};

/// Hands a conversation to the analysis product and returns the transcript
/// id it produced.
#[derive(Clone)]
pub struct ExportBridge {
    proxy: Arc<RequestProxy>,
}

impl ExportBridge {
    pub fn new(proxy: Arc<RequestProxy>) -> Self {
        Self { proxy }
    }

    pub async fn export_conversation(
        &self,
        service_sid: &str,
        conversation_sid: &str,
        analysis_service_id: Option<&str>,
    ) -> Result<ExportReceipt, ProxyError> {
        let analysis_service_id = analysis_service_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProxyError::Validation("analysisServiceId is required".to_string())
            })?;
        if service_sid.trim().is_empty() || conversation_sid.trim().is_empty() {
            return Err(ProxyError::Validation(
                "service and conversation ids are required".to_string(),
            ));
        }

        let context = self.proxy.context().await?;
        let path = ResourcePath::new(
            UpstreamProduct::Conversations,
            [
                "services",
                service_sid,
                "conversations",
                conversation_sid,
                "export",
            ],
        );
        let body = json!({ "IntelligenceServiceSid": analysis_service_id });
        let reply = self
            .proxy
            .send(&context, "POST", &path, Some(&body), &[])
            .await?;

        let transcript_id = ["transcript_sid", "transcriptSid"]
            .iter()
            .find_map(|key| reply.get(*key).and_then(Value::as_str))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProxyError::Upstream(UpstreamFailure {
                    http_status: 500,
                    message: "export response did not include a transcript id".to_string(),
                })
            })?;

        info!(
            conversation = %conversation_sid,
            transcript = %transcript_id,
            "conversation exported for analysis"
        );
        Ok(ExportReceipt {
            transcript_id: transcript_id.to_string(),
        })
    }
}
