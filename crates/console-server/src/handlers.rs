use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::Json;
use control_plane::{CredentialError, CredentialStatus, CredentialStore, Credentials, SessionIdentity};
use cookie::{Cookie, SameSite};
use kernel::{
    classify, BulkOperationResult, ProxyCall, ResourceOperation, ResourcePath, TransitionIntent,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::AppError;
use crate::state::{AppState, SESSION_COOKIE};

const LOGIN_LINK_MESSAGE: &str =
    "If an account exists for this email, a login link is on its way.";

#[derive(Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct AuthenticateQuery {
    #[serde(default)]
    pub token: String,
    #[serde(default, rename = "tokenKind", alias = "stytch_token_type")]
    pub token_kind: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(flatten)]
    pub identity: Option<SessionIdentity>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsSaved {
    pub success: bool,
    pub message: &'static str,
    pub has_credentials: bool,
}

#[derive(Default, Deserialize)]
pub struct BulkTransitionRequest {
    #[serde(default, rename = "targetIds", alias = "conversationSids")]
    pub target_ids: Vec<String>,
}

#[derive(Default, Deserialize)]
pub struct ExportRequest {
    #[serde(rename = "analysisServiceId", alias = "intelligenceServiceSid")]
    pub analysis_service_id: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn save_credentials(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CredentialsSaved>, AppError> {
    let payload: Credentials = decode_body(parse_body(&body)?)?;
    with_credentials(&state, move |store| store.save(&payload)).await?;
    Ok(Json(CredentialsSaved {
        success: true,
        message: "Credentials saved successfully",
        has_credentials: true,
    }))
}

pub async fn credentials_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CredentialStatus>, AppError> {
    let status = with_credentials(&state, |store| store.status()).await?;
    Ok(Json(status))
}

pub async fn clear_credentials(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    with_credentials(&state, |store| store.clear()).await?;
    Ok(Json(json!({ "success": true, "message": "Credentials cleared" })))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let payload: LoginRequest = decode_body(parse_body(&body)?)?;
    state.gateway.request_login_link(&payload.email).await?;
    Ok(Json(json!({ "success": true, "message": LOGIN_LINK_MESSAGE })))
}

pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthenticateQuery>,
) -> Result<Response<Body>, AppError> {
    let established = state
        .gateway
        .complete_authentication(&query.token, &query.token_kind)
        .await?;
    let mut response = Json(&established.identity).into_response();
    set_cookie(&mut response, session_cookie(&state, established.session_id))?;
    Ok(response)
}

pub async fn session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    let identity = match session_id_from(&headers) {
        Some(session_id) => state.gateway.validate_session(&session_id).await?,
        None => None,
    };
    Ok(Json(SessionResponse {
        authenticated: identity.is_some(),
        identity,
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response<Body>, AppError> {
    if let Some(session_id) = session_id_from(&headers) {
        state.gateway.revoke_session(&session_id).await;
    }
    let mut response = Json(json!({ "success": true })).into_response();
    let mut cookie = session_cookie(&state, String::new());
    cookie.make_removal();
    set_cookie(&mut response, cookie)?;
    Ok(response)
}

#[cfg(feature = "auth-bypass")]
pub async fn admin_bypass(State(state): State<Arc<AppState>>) -> Result<Response<Body>, AppError> {
    let established = state.gateway.open_bypass_session().await?;
    let mut response = Json(&established.identity).into_response();
    set_cookie(&mut response, session_cookie(&state, established.session_id))?;
    Ok(response)
}

/// Guards the upstream routes. The validated identity is attached to the
/// request extensions.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    let no_session = || AppError::unauthorized("Not authenticated").with_code("NO_SESSION");
    let session_id = session_id_from(req.headers()).ok_or_else(no_session)?;
    if !state.gateway.has_session(&session_id).await? {
        return Err(no_session());
    }
    let identity = state
        .gateway
        .validate_session(&session_id)
        .await?
        .ok_or_else(|| {
            AppError::unauthorized("Session expired or invalid").with_code("INVALID_SESSION")
        })?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

pub async fn upstream(
    State(state): State<Arc<AppState>>,
    method: Method,
    Path(resource): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let path = ResourcePath::parse(&resource)?;
    let body = parse_body(&body)?;

    match classify(method.as_str(), &path) {
        ResourceOperation::Passthrough => {
            debug!(method = %method, resource = %path, "relaying upstream call");
            let call = ProxyCall {
                method: method.as_str().to_string(),
                resource_path: resource,
                body,
                query,
            };
            Ok(Json(state.proxy.invoke(&call).await?))
        }
        ResourceOperation::BulkTransition {
            service_sid,
            intent,
        } => {
            let request: BulkTransitionRequest = decode_body(body)?;
            let result = state
                .bulk
                .bulk_transition(&service_sid, &request.target_ids, intent)
                .await?;
            Ok(Json(bulk_summary(intent, result)))
        }
        ResourceOperation::Export {
            service_sid,
            conversation_sid,
        } => {
            let request: ExportRequest = decode_body(body)?;
            let receipt = state
                .export
                .export_conversation(
                    &service_sid,
                    &conversation_sid,
                    request.analysis_service_id.as_deref(),
                )
                .await?;
            Ok(Json(json!({ "transcriptId": receipt.transcript_id })))
        }
    }
}

fn bulk_summary(intent: TransitionIntent, result: BulkOperationResult) -> Value {
    let outcome = match intent {
        TransitionIntent::Archive => "archived",
        TransitionIntent::Close => "closed",
    };
    info!(
        outcome,
        succeeded = result.successful_ids.len(),
        failed = result.failures.len(),
        "bulk request answered"
    );
    let mut summary = json!({
        "success": true,
        "failed": result.failures.len(),
    });
    summary[outcome] = json!(result.successful_ids.len());
    summary["details"] = json!(result);
    summary
}

fn parse_body(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(body)?))
}

fn decode_body<T: DeserializeOwned + Default>(body: Option<Value>) -> Result<T, AppError> {
    match body {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(T::default()),
    }
}

async fn with_credentials<F, R>(state: &AppState, op: F) -> Result<R, AppError>
where
    F: FnOnce(CredentialStore) -> Result<R, CredentialError> + Send + 'static,
    R: Send + 'static,
{
    let store = state.credentials.clone();
    Ok(tokio::task::spawn_blocking(move || op(store)).await??)
}

fn session_cookie(state: &AppState, session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .secure(state.cookie.secure)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(state.cookie.max_age_seconds))
        .build()
}

fn set_cookie(response: &mut Response<Body>, cookie: Cookie<'_>) -> Result<(), AppError> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|err| AppError::internal(err.to_string()))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}

fn session_id_from(headers: &HeaderMap) -> Option<String> {
    for raw in headers.get_all(header::COOKIE) {
        let Ok(raw) = raw.to_str() else {
            continue;
        };
        for part in raw.split(';') {
            if let Ok(cookie) = Cookie::parse(part.trim().to_string()) {
                if cookie.name() == SESSION_COOKIE && !cookie.value().is_empty() {
                    return Some(cookie.value().to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::Router;
    use control_plane::{
        AuthGatewayConfig, Discovery, IdentityError, IdentityProvider,
        InMemoryCredentialRepository, InMemorySessionStore, Member, NewOrganization, Organization,
        ProviderSession, RepositoryError, SessionRecord, SessionStore,
    };
    use kernel::{Forwarder, ProxyError, UpstreamEndpoints, UpstreamRequest, UpstreamResponse};
    use parking_lot::Mutex;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::state::CookieSettings;

    #[derive(Default)]
    struct FakeIdentity {
        reject_sessions: AtomicBool,
        revoked: AtomicUsize,
    }

    fn provider_session(token: String) -> ProviderSession {
        ProviderSession {
            session_token: token,
            member: Member {
                member_id: "member-1".to_string(),
                email_address: "ada@example.com".to_string(),
                name: "Ada".to_string(),
                ..Member::default()
            },
            organization: Organization {
                organization_id: "organization-1".to_string(),
                organization_name: "ada's Organization".to_string(),
                organization_slug: "ada".to_string(),
                ..Organization::default()
            },
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn send_discovery_email(&self, _email: &str, _redirect: &str) -> Result<(), IdentityError> {
            Ok(())
        }

        async fn authenticate_discovery(&self, token: &str) -> Result<Discovery, IdentityError> {
            if token == "stale" {
                return Err(IdentityError::Rejected("magic link expired".to_string()));
            }
            Ok(Discovery {
                intermediate_session_token: "ist-1".to_string(),
                email_address: "ada@example.com".to_string(),
                discovered_organizations: Vec::new(),
            })
        }

        async fn exchange_intermediate_session(
            &self,
            _ist: &str,
            _organization_id: &str,
            _minutes: u32,
        ) -> Result<ProviderSession, IdentityError> {
            Ok(provider_session(Uuid::new_v4().to_string()))
        }

        async fn create_organization(
            &self,
            _ist: &str,
            _organization: &NewOrganization,
            _minutes: u32,
        ) -> Result<ProviderSession, IdentityError> {
            Ok(provider_session(Uuid::new_v4().to_string()))
        }

        async fn authenticate_session(
            &self,
            _session_token: &str,
            _minutes: u32,
        ) -> Result<ProviderSession, IdentityError> {
            if self.reject_sessions.load(Ordering::SeqCst) {
                return Err(IdentityError::Rejected("session expired".to_string()));
            }
            Ok(provider_session(Uuid::new_v4().to_string()))
        }

        async fn revoke_session(&self, _session_token: &str) -> Result<(), IdentityError> {
            self.revoked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeUpstream {
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Forwarder for FakeUpstream {
        async fn send(&self, upstream: &UpstreamRequest) -> Result<UpstreamResponse, ProxyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().push(upstream.url.clone());
            let (status, body) = if upstream.url.ends_with("/CH2") {
                (404, json!({ "message": "conversation not found" }))
            } else if upstream.url.ends_with("/Export") {
                (201, json!({ "transcript_sid": "GT1" }))
            } else {
                (200, json!({ "method": upstream.method, "url": upstream.url }))
            };
            Ok(UpstreamResponse {
                status,
                headers: HashMap::new(),
                body: body.to_string().into_bytes(),
            })
        }
    }

    struct Harness {
        state: Arc<AppState>,
        app: Router,
        identity: Arc<FakeIdentity>,
        upstream: Arc<FakeUpstream>,
    }

    /// Accepts nothing; every write fails.
    struct UnwritableSessions;

    impl SessionStore for UnwritableSessions {
        fn get(&self, _session_id: &str) -> Option<SessionRecord> {
            None
        }

        fn put(&self, _session_id: &str, _record: SessionRecord) -> Result<(), RepositoryError> {
            Err(RepositoryError::Store("connection refused".to_string()))
        }

        fn remove(&self, _session_id: &str) -> Option<SessionRecord> {
            None
        }
    }

    fn harness() -> Harness {
        harness_with(InMemorySessionStore::shared())
    }

    fn harness_with(sessions: Arc<dyn SessionStore>) -> Harness {
        let identity = Arc::new(FakeIdentity::default());
        let upstream = Arc::new(FakeUpstream::default());
        let state = Arc::new(AppState::new(
            CredentialStore::new(InMemoryCredentialRepository::shared()),
            sessions,
            identity.clone(),
            upstream.clone(),
            UpstreamEndpoints::default(),
            AuthGatewayConfig::default(),
            CookieSettings::default(),
        ));
        let app = crate::build_router(state.clone());
        Harness {
            state,
            app,
            identity,
            upstream,
        }
    }

    fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    fn raw_request(uri: &str, body: &'static str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .expect("request")
    }

    async fn send(app: &Router, req: HttpRequest<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(req).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, headers, value)
    }

    async fn sign_in(app: &Router) -> String {
        let (status, headers, _) = send(
            app,
            request(
                "GET",
                "/auth/authenticate?token=magic&stytch_token_type=discovery",
                None,
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let set_cookie = headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("set-cookie");
        set_cookie.split(';').next().expect("pair").to_string()
    }

    fn save_token_credentials(state: &AppState) {
        state
            .credentials
            .save(&Credentials::with_token("AC0123456789abcdef", "tok"))
            .expect("save");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn credentials_lifecycle() {
        let h = harness();
        let payload = json!({ "accountSid": "AC0123456789abcdef", "authToken": "tok" });
        let Json(saved) = save_credentials(State(h.state.clone()), Bytes::from(payload.to_string()))
        .await
        .expect("save");
        assert!(saved.has_credentials);

        let Json(status) = credentials_status(State(h.state.clone())).await.expect("status");
        assert!(status.present);
        assert_eq!(status.partial_account_identifier.as_deref(), Some("AC01234567..."));

        let Json(cleared) = clear_credentials(State(h.state.clone())).await.expect("clear");
        assert_eq!(cleared["success"], true);
        let Json(_) = clear_credentials(State(h.state.clone()))
            .await
            .expect("clear again");
        let Json(status) = credentials_status(State(h.state.clone())).await.expect("status");
        assert!(!status.present);
    }

    #[tokio::test]
    async fn invalid_credentials_are_a_bad_request() {
        let h = harness();
        let (status, _, body) = send(
            &h.app,
            request(
                "POST",
                "/api/credentials",
                None,
                Some(json!({ "accountSid": "AC1" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn upstream_routes_require_a_session() {
        let h = harness();
        save_token_credentials(&h.state);

        let (status, _, body) =
            send(&h.app, request("GET", "/api/upstream/conversations/services", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NO_SESSION");

        let (status, _, body) = send(
            &h.app,
            request(
                "GET",
                "/api/upstream/conversations/services",
                Some("console_session=unknown"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NO_SESSION");
        assert_eq!(h.upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_session_answers_invalid_session() {
        let h = harness();
        save_token_credentials(&h.state);
        let cookie = sign_in(&h.app).await;
        h.identity.reject_sessions.store(true, Ordering::SeqCst);

        let (status, _, body) = send(
            &h.app,
            request("GET", "/api/upstream/conversations/services", Some(&cookie), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_SESSION");
        let session_id = cookie.trim_start_matches("console_session=");
        assert!(!h.state.gateway.has_session(session_id).await.expect("lookup"));
    }

    #[tokio::test]
    async fn session_endpoint_follows_login_and_logout() {
        let h = harness();
        let (_, _, body) = send(&h.app, request("GET", "/auth/session", None, None)).await;
        assert_eq!(body, json!({ "authenticated": false }));

        let cookie = sign_in(&h.app).await;
        let (_, _, body) = send(&h.app, request("GET", "/auth/session", Some(&cookie), None)).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["member"]["email_address"], "ada@example.com");
        assert_eq!(body["organization"]["organization_slug"], "ada");

        let (status, headers, body) =
            send(&h.app, request("POST", "/auth/logout", Some(&cookie), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
        let cleared = headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("set-cookie");
        assert!(cleared.starts_with("console_session=;"));
        assert_eq!(h.identity.revoked.load(Ordering::SeqCst), 1);

        let (_, _, body) = send(&h.app, request("GET", "/auth/session", Some(&cookie), None)).await;
        assert_eq!(body["authenticated"], false);
    }

    #[tokio::test]
    async fn authentication_errors_map_to_status_codes() {
        let h = harness();
        let (status, _, body) = send(
            &h.app,
            request("GET", "/auth/authenticate?token=magic&tokenKind=oauth", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_TOKEN_KIND");

        let (status, headers, _) = send(
            &h.app,
            request("GET", "/auth/authenticate?token=stale&tokenKind=discovery", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(headers.get(header::SET_COOKIE).is_none());

        let (status, _, body) = send(
            &h.app,
            request("POST", "/auth/login", None, Some(json!({ "email": "ada@example.com" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn missing_credentials_stop_proxied_calls() {
        let h = harness();
        let cookie = sign_in(&h.app).await;
        let (status, _, body) = send(
            &h.app,
            request("GET", "/api/upstream/conversations/services", Some(&cookie), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NO_CREDENTIALS");
        assert_eq!(h.upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn passthrough_forwards_query_and_method() {
        let h = harness();
        save_token_credentials(&h.state);
        let cookie = sign_in(&h.app).await;

        let (status, _, body) = send(
            &h.app,
            request(
                "GET",
                "/api/upstream/conversations/services/IS1/conversations?pageSize=5",
                Some(&cookie),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["method"], "GET");
        assert_eq!(
            body["url"],
            "https://conversations.twilio.com/v1/Services/IS1/Conversations?PageSize=5"
        );

        let (status, _, body) = send(
            &h.app,
            request(
                "DELETE",
                "/api/upstream/conversations/services/IS1/conversations/CH2",
                Some(&cookie),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "conversation not found" }));
    }

    #[tokio::test]
    async fn bulk_archive_reports_partial_success() {
        let h = harness();
        save_token_credentials(&h.state);
        let cookie = sign_in(&h.app).await;

        let (status, _, body) = send(
            &h.app,
            request(
                "POST",
                "/api/upstream/conversations/services/IS1/conversations/bulk-archive",
                Some(&cookie),
                Some(json!({ "conversationSids": ["CH1", "CH2", "CH3"] })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["archived"], 2);
        assert_eq!(body["failed"], 1);
        assert_eq!(body["details"]["requestedCount"], 3);
        assert_eq!(body["details"]["successfulIds"], json!(["CH1", "CH3"]));
        assert_eq!(body["details"]["failures"][0]["id"], "CH2");
        assert_eq!(h.upstream.calls.load(Ordering::SeqCst), 3);

        let (status, _, _) = send(
            &h.app,
            request(
                "POST",
                "/api/upstream/conversations/services/IS1/conversations/bulk-close",
                Some(&cookie),
                Some(json!({ "targetIds": [] })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn export_returns_transcript_id() {
        let h = harness();
        save_token_credentials(&h.state);
        let cookie = sign_in(&h.app).await;

        let (status, _, body) = send(
            &h.app,
            request(
                "POST",
                "/api/upstream/conversations/services/IS1/conversations/CH1/export",
                Some(&cookie),
                Some(json!({ "analysisServiceId": "GA1" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "transcriptId": "GT1" }));
        assert_eq!(
            h.upstream.urls.lock().last().map(String::as_str),
            Some("https://conversations.twilio.com/v1/Services/IS1/Conversations/CH1/Export")
        );

        let (status, _, _) = send(
            &h.app,
            request(
                "POST",
                "/api/upstream/conversations/services/IS1/conversations/CH1/export",
                Some(&cookie),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_bodies_use_the_error_envelope() {
        let h = harness();
        for (uri, body) in [
            ("/api/credentials", "{not json"),
            ("/api/credentials", r#"{"accountSid":123,"authToken":"tok"}"#),
            ("/api/credentials", ""),
            ("/auth/login", "{bad"),
        ] {
            let (status, _, reply) = send(&h.app, raw_request(uri, body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
            assert!(reply["error"].as_str().is_some(), "{uri} {body}");
        }
        let Json(status) = credentials_status(State(h.state.clone())).await.expect("status");
        assert!(!status.present);
    }

    #[tokio::test]
    async fn unstored_session_sets_no_cookie() {
        let h = harness_with(Arc::new(UnwritableSessions));
        let (status, headers, body) = send(
            &h.app,
            request("GET", "/auth/authenticate?token=magic&tokenKind=discovery", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().is_some());
        assert!(headers.get(header::SET_COOKIE).is_none());
    }
}
