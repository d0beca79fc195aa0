use std::fmt;

use url::Url;

use crate::types::TransitionIntent;
use crate::ProxyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamProduct {
    Conversations,
    Intelligence,
}

impl UpstreamProduct {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "conversations" => Some(Self::Conversations),
            "intelligence" => Some(Self::Intelligence),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Conversations => "conversations",
            Self::Intelligence => "intelligence",
        }
    }
}

#[derive(Clone, Debug)]
pub struct UpstreamEndpoints {
    pub conversations_base_url: String,
    pub intelligence_base_url: String,
}

impl Default for UpstreamEndpoints {
    fn default() -> Self {
        Self {
            conversations_base_url: "https://conversations.twilio.com/v1".to_string(),
            intelligence_base_url: "https://intelligence.twilio.com/v2".to_string(),
        }
    }
}

impl UpstreamEndpoints {
    fn base_url(&self, product: UpstreamProduct) -> &str {
        match product {
            UpstreamProduct::Conversations => &self.conversations_base_url,
            UpstreamProduct::Intelligence => &self.intelligence_base_url,
        }
    }
}

/// A console-side resource path such as
/// `conversations/services/IS1/conversations/CH1/messages`. The first
/// segment picks the upstream product; the rest alternate between
/// collection names and identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourcePath {
    product: UpstreamProduct,
    segments: Vec<String>,
}

impl ResourcePath {
    pub fn parse(path: &str) -> Result<Self, ProxyError> {
        let mut parts = path.trim_matches('/').split('/');
        let product = parts
            .next()
            .and_then(UpstreamProduct::parse)
            .ok_or_else(|| ProxyError::Validation(format!("unknown resource: {path}")))?;
        let segments: Vec<String> = parts.map(str::to_string).collect();
        if segments.is_empty() {
            return Err(ProxyError::Validation(format!("incomplete resource path: {path}")));
        }
        if segments
            .iter()
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(ProxyError::Validation(format!("malformed resource path: {path}")));
        }
        Ok(Self { product, segments })
    }

    pub fn product(&self) -> UpstreamProduct {
        self.product
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Builds a path from trusted segments; identifiers are percent-encoded
    /// when the upstream url is rendered, so a `/` inside one stays inside it.
    pub fn new<I, S>(product: UpstreamProduct, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            product,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn conversation(service_sid: &str, conversation_sid: &str) -> Self {
        Self::new(
            UpstreamProduct::Conversations,
            ["services", service_sid, "conversations", conversation_sid],
        )
    }

    pub fn upstream_url(
        &self,
        endpoints: &UpstreamEndpoints,
        query: &[(String, String)],
    ) -> Result<String, ProxyError> {
        let base = endpoints.base_url(self.product);
        let mut url = Url::parse(base)
            .map_err(|err| ProxyError::Internal(format!("invalid upstream base url {base}: {err}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ProxyError::Internal(format!("upstream base url cannot be a base: {base}")))?;
            path.pop_if_empty();
            for (index, segment) in self.segments.iter().enumerate() {
                if index % 2 == 0 {
                    path.push(&pascal_case(segment));
                } else {
                    path.push(segment);
                }
            }
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(&pascal_case(key), value);
            }
        }
        Ok(url.into())
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product.as_str(), self.segments.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOperation {
    Passthrough,
    BulkTransition {
        service_sid: String,
        intent: TransitionIntent,
    },
    Export {
        service_sid: String,
        conversation_sid: String,
    },
}

/// Picks out the coordinator-backed operations; everything else is relayed
/// as-is.
pub fn classify(method: &str, path: &ResourcePath) -> ResourceOperation {
    if !method.eq_ignore_ascii_case("POST") || path.product != UpstreamProduct::Conversations {
        return ResourceOperation::Passthrough;
    }
    let segments: Vec<&str> = path.segments.iter().map(String::as_str).collect();
    match segments.as_slice() {
        ["services", service_sid, "conversations", "bulk-archive"] => {
            ResourceOperation::BulkTransition {
                service_sid: service_sid.to_string(),
                intent: TransitionIntent::Archive,
            }
        }
        ["services", service_sid, "conversations", "bulk-close"] => {
            ResourceOperation::BulkTransition {
                service_sid: service_sid.to_string(),
                intent: TransitionIntent::Close,
            }
        }
        ["services", service_sid, "conversations", conversation_sid, "export"] => {
            ResourceOperation::Export {
                service_sid: service_sid.to_string(),
                conversation_sid: conversation_sid.to_string(),
            }
        }
        _ => ResourceOperation::Passthrough,
    }
}

/// `friendlyName` → `FriendlyName`, `operator-results` → `OperatorResults`.
pub fn pascal_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for part in value.split(&['-', '_'][..]).filter(|part| !part.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
