use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::json;
use tracing::{info, warn};

use crate::proxy::RequestProxy;
use crate::resource::ResourcePath;
use crate::types::{BulkFailure, BulkOperationResult, TransitionIntent};
use crate::ProxyError;

/// Applies one state transition to many conversations and reports a
/// per-target outcome.
#[derive(Clone)]
pub struct BulkCoordinator {
    proxy: Arc<RequestProxy>,
}

impl BulkCoordinator {
    pub fn new(proxy: Arc<RequestProxy>) -> Self {
        Self { proxy }
    }

    /// Targets are issued concurrently and every one settles before this
    /// returns. A failing target never aborts the others.
    pub async fn bulk_transition(
        &self,
        service_sid: &str,
        target_ids: &[String],
        intent: TransitionIntent,
    ) -> Result<BulkOperationResult, ProxyError> {
        if service_sid.trim().is_empty() {
            return Err(ProxyError::Validation("service id is required".to_string()));
        }
        if target_ids.is_empty() {
            return Err(ProxyError::Validation(
                "targetIds must be a non-empty array".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let targets: Vec<&str> = target_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        let context = self.proxy.context().await?;
        let body = json!({ "state": intent.target_state() });

        let outcomes = join_all(targets.iter().map(|target| {
            let context = &context;
            let body = &body;
            async move {
                if target.trim().is_empty() {
                    return Err(ProxyError::Validation("target id is empty".to_string()));
                }
                let path = ResourcePath::conversation(service_sid, target);
                self.proxy
                    .send(context, "POST", &path, Some(body), &[])
                    .await
                    .map(|_| ())
            }
        }))
        .await;

        let mut result = BulkOperationResult {
            requested_count: targets.len(),
            ..BulkOperationResult::default()
        };
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(()) => result.successful_ids.push(target.to_string()),
                Err(err) => {
                    warn!(service = %service_sid, target = %target, error = %err, "bulk target failed");
                    result.failures.push(BulkFailure {
                        id: target.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            service = %service_sid,
            intent = ?intent,
            requested = result.requested_count,
            succeeded = result.successful_ids.len(),
            failed = result.failures.len(),
            "bulk transition settled"
        );
        Ok(result)
    }
}
