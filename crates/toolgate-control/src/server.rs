// crates/toolgate-control/src/server.rs
// ============================================================================
// Module: Control-Plane Server
// Description: HTTP surface over the policy store and service governance.
// Purpose: Expose admin mutations, governance operations, and bundle reads.
// Dependencies: axum, tokio, toolgate-core, toolgate-governance, toolgate-store
// ============================================================================

//! ## Overview
//! One route per policy-store operation, one read endpoint for bundle data,
//! one SSE endpoint for the change stream, and one route per governance
//! operation. Admin routes require an admin bearer token; bundle reads, the
//! change stream, and evaluate require a gateway-role token. Every decision
//! is audited. Failures are fail-closed: an unauthenticated request never
//! reaches the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use toolgate_config::ControlPlaneConfig;
use toolgate_core::ApprovalRequest;
use toolgate_core::BundleData;
use toolgate_core::CatalogError;
use toolgate_core::EvaluateRequest;
use toolgate_core::EvaluateResponse;
use toolgate_core::GovernanceId;
use toolgate_core::RequestId;
use toolgate_core::Revision;
use toolgate_core::RuleId;
use toolgate_core::ServiceName;
use toolgate_core::SubjectId;
use toolgate_core::Timestamp;
use toolgate_core::ToolName;
use toolgate_core::ToolTag;
use toolgate_core::rules::AccessRule;
use toolgate_governance::GovernanceError;
use toolgate_governance::GovernanceRegistry;
use toolgate_governance::SharedGovernance;
use toolgate_store::PolicyStore;
use toolgate_store::StoreError;

use crate::audit::ControlAuditEvent;
use crate::audit::ControlAuditSink;
use crate::auth::AuthContext;
use crate::auth::AuthError;
use crate::auth::ControlAuthorizer;
use crate::auth::Role;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Keepalive interval for the change-stream SSE endpoint.
const EVENTS_KEEPALIVE: Duration = Duration::from_secs(15);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal control-plane server errors.
#[derive(Debug, Error)]
pub enum ControlServerError {
    /// Listener could not be bound.
    #[error("control plane bind failed: {0}")]
    Bind(String),
    /// Server terminated with an error.
    #[error("control plane server failed: {0}")]
    Serve(String),
}

/// API error mapped onto an HTTP status and JSON body.
///
/// # Invariants
/// - `status` is always a client or server error code.
#[derive(Debug)]
struct ApiError {
    /// HTTP status for the response.
    status: StatusCode,
    /// Human-readable error message.
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// JSON error body shape.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Error message.
    error: String,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated(message) => Self::new(StatusCode::UNAUTHORIZED, message),
            AuthError::Unauthorized(role) => {
                Self::new(StatusCode::FORBIDDEN, format!("{role} role required"))
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Catalog(CatalogError::UnknownService(_))
            | StoreError::Catalog(CatalogError::UnknownTool { .. }) => {
                Self::new(StatusCode::NOT_FOUND, err.to_string())
            }
            StoreError::Rule(_) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        }
    }
}

impl From<GovernanceError> for ApiError {
    fn from(err: GovernanceError) -> Self {
        match &err {
            GovernanceError::UnknownRequest(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            GovernanceError::InvalidState {
                ..
            } => Self::new(StatusCode::CONFLICT, err.to_string()),
            GovernanceError::MissingReason => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            GovernanceError::Digest(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared control-plane state.
#[derive(Clone)]
pub struct ControlState {
    /// Policy store singleton.
    store: Arc<PolicyStore>,
    /// Governance instance registry.
    registry: Arc<GovernanceRegistry>,
    /// Bearer-token authorizer.
    authorizer: Arc<ControlAuthorizer>,
    /// Audit sink for operation events.
    audit: Arc<dyn ControlAuditSink>,
}

impl ControlState {
    /// Builds control-plane state from configuration and collaborators.
    #[must_use]
    pub fn new(
        config: &ControlPlaneConfig,
        store: Arc<PolicyStore>,
        registry: Arc<GovernanceRegistry>,
        audit: Arc<dyn ControlAuditSink>,
    ) -> Self {
        Self {
            store,
            registry,
            authorizer: Arc::new(ControlAuthorizer::from_config(config)),
            audit,
        }
    }

    /// Authorizes a request, auditing denials.
    fn authorize(
        &self,
        headers: &HeaderMap,
        role: Role,
        operation: &str,
    ) -> Result<AuthContext, ApiError> {
        let header = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
        match self.authorizer.authorize(header, role) {
            Ok(auth) => Ok(auth),
            Err(err) => {
                self.audit.record(&ControlAuditEvent::denied(operation, err.to_string()));
                Err(ApiError::from(err))
            }
        }
    }

    /// Records an allow event for a mutation.
    fn audit_mutation(&self, auth: &AuthContext, operation: &str, revision: Revision) {
        self.audit.record(
            &ControlAuditEvent::allowed(
                operation,
                auth.role.as_str(),
                auth.token_fingerprint.clone(),
            )
            .with_revision(revision),
        );
    }

    /// Returns the governance instance for a service.
    fn governance(&self, service: &ServiceName) -> Result<SharedGovernance, ApiError> {
        self.registry.instance(service).ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                format!("no governance instance for service: {service}"),
            )
        })
    }

    /// Mirrors the catalog tool tags of a service into its governance instance.
    fn mirror_tools(&self, service: &ServiceName) {
        let Some(handle) = self.registry.instance(service) else {
            return;
        };
        let data = self.store.bundle_data();
        let Some(entry) = data.catalog.service(service) else {
            return;
        };
        let mut instance = lock_instance(&handle);
        for (tool, tool_entry) in &entry.tools {
            instance.set_tool_tag(tool.clone(), tool_entry.tag);
        }
    }
}

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Service registration payload.
#[derive(Debug, Deserialize)]
struct ServicePayload {
    /// Service to register.
    service: ServiceName,
}

/// Tool registration payload.
#[derive(Debug, Deserialize)]
struct ToolPayload {
    /// Tool to register.
    tool: ToolName,
    /// Tag label (`open` or `gated`); defaults to `open`.
    tag: Option<String>,
}

/// Tag change payload.
#[derive(Debug, Deserialize)]
struct TagPayload {
    /// Tag label (`open` or `gated`).
    tag: String,
}

/// Revocation payload.
#[derive(Debug, Deserialize)]
struct RevocationPayload {
    /// Subject to revoke.
    subject: SubjectId,
}

/// Governance binding payload.
#[derive(Debug, Deserialize)]
struct GovernancePayload {
    /// Governance instance identifier to bind.
    governance_id: GovernanceId,
}

/// Admin resolution payload for approve/deny.
#[derive(Debug, Deserialize)]
struct ResolvePayload {
    /// Admin resolving the request.
    approver: SubjectId,
    /// Denial reason (required on deny).
    reason: Option<String>,
}

/// Revision response returned by mutations.
#[derive(Debug, Serialize)]
struct RevisionResponse {
    /// Revision after the mutation.
    revision: Revision,
}

/// Health response body.
#[derive(Debug, Serialize)]
struct HealthResponse {
    /// Liveness status label.
    status: &'static str,
    /// Service name.
    service: &'static str,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the control-plane router.
#[must_use]
pub fn router(state: ControlState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/admin/services", post(handle_register_service))
        .route("/admin/services/{service}/enable", post(handle_enable_service))
        .route("/admin/services/{service}/disable", post(handle_disable_service))
        .route("/admin/services/{service}/tools", post(handle_register_tool))
        .route("/admin/services/{service}/tools/{tool}", delete(handle_remove_tool))
        .route("/admin/services/{service}/tools/{tool}/tag", put(handle_set_tag))
        .route("/admin/rules", post(handle_add_rule))
        .route("/admin/rules/{id}", delete(handle_remove_rule))
        .route("/admin/revocations", post(handle_revoke))
        .route("/admin/revocations/{subject}", delete(handle_reinstate))
        .route("/admin/services/{service}/governance", put(handle_attach_governance))
        .route("/bundle", get(handle_bundle))
        .route("/events", get(handle_events))
        .route("/governance/{service}/evaluate", post(handle_evaluate))
        .route("/governance/{service}/requests/{id}/approve", post(handle_approve))
        .route("/governance/{service}/requests/{id}/deny", post(handle_deny))
        .route("/governance/{service}/pending", get(handle_pending))
        .route("/governance/{service}/queued", get(handle_queued))
        .route("/governance/{service}/requests/{id}", get(handle_execution_result))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Serves the control plane until the listener fails.
///
/// # Errors
///
/// Returns [`ControlServerError`] when binding or serving fails.
pub async fn serve(
    config: ControlPlaneConfig,
    store: Arc<PolicyStore>,
    registry: Arc<GovernanceRegistry>,
    audit: Arc<dyn ControlAuditSink>,
) -> Result<(), ControlServerError> {
    let max_body_bytes = config.max_body_bytes;
    let state = ControlState::new(&config, store, registry, audit);
    let app = router(state, max_body_bytes);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .map_err(|err| ControlServerError::Bind(err.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|err| ControlServerError::Serve(err.to_string()))
}

// ============================================================================
// SECTION: Admin Handlers
// ============================================================================

/// Registers a service (disabled until enabled).
async fn handle_register_service(
    State(state): State<ControlState>,
    headers: HeaderMap,
    Json(payload): Json<ServicePayload>,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "register_service")?;
    let revision = state.store.register_service(payload.service);
    state.audit_mutation(&auth, "register_service", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Enables a service.
async fn handle_enable_service(
    State(state): State<ControlState>,
    Path(service): Path<ServiceName>,
    headers: HeaderMap,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "enable_service")?;
    let revision = state.store.enable_service(&service)?;
    state.audit_mutation(&auth, "enable_service", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Disables a service, masking all of its tools.
async fn handle_disable_service(
    State(state): State<ControlState>,
    Path(service): Path<ServiceName>,
    headers: HeaderMap,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "disable_service")?;
    let revision = state.store.disable_service(&service)?;
    state.audit_mutation(&auth, "disable_service", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Registers a tool with a tag.
async fn handle_register_tool(
    State(state): State<ControlState>,
    Path(service): Path<ServiceName>,
    headers: HeaderMap,
    Json(payload): Json<ToolPayload>,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "register_tool")?;
    let tag = parse_tag(payload.tag.as_deref().unwrap_or("open"))?;
    let revision = state.store.register_tool(&service, payload.tool, tag)?;
    state.mirror_tools(&service);
    state.audit_mutation(&auth, "register_tool", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Removes a tool from a service.
async fn handle_remove_tool(
    State(state): State<ControlState>,
    Path((service, tool)): Path<(ServiceName, ToolName)>,
    headers: HeaderMap,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "remove_tool")?;
    let revision = state.store.remove_tool(&service, &tool)?;
    if let Some(handle) = state.registry.instance(&service) {
        lock_instance(&handle).remove_tool(&tool);
    }
    state.audit_mutation(&auth, "remove_tool", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Changes the tag of a registered tool.
async fn handle_set_tag(
    State(state): State<ControlState>,
    Path((service, tool)): Path<(ServiceName, ToolName)>,
    headers: HeaderMap,
    Json(payload): Json<TagPayload>,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "set_tag")?;
    let tag = parse_tag(&payload.tag)?;
    let revision = state.store.set_tag(&service, &tool, tag)?;
    state.mirror_tools(&service);
    state.audit_mutation(&auth, "set_tag", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Inserts an access rule, replacing any rule with the same id.
async fn handle_add_rule(
    State(state): State<ControlState>,
    headers: HeaderMap,
    Json(rule): Json<AccessRule>,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "add_access_rule")?;
    let revision = state.store.add_access_rule(rule)?;
    state.audit_mutation(&auth, "add_access_rule", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Removes an access rule when present.
async fn handle_remove_rule(
    State(state): State<ControlState>,
    Path(id): Path<RuleId>,
    headers: HeaderMap,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "remove_access_rule")?;
    let revision = state.store.remove_access_rule(&id);
    state.audit_mutation(&auth, "remove_access_rule", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Adds a subject to the revocation list.
async fn handle_revoke(
    State(state): State<ControlState>,
    headers: HeaderMap,
    Json(payload): Json<RevocationPayload>,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "revoke_subject")?;
    let revision = state.store.revoke_subject(payload.subject);
    state.audit_mutation(&auth, "revoke_subject", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Removes a subject from the revocation list.
async fn handle_reinstate(
    State(state): State<ControlState>,
    Path(subject): Path<SubjectId>,
    headers: HeaderMap,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "reinstate_subject")?;
    let revision = state.store.reinstate_subject(&subject);
    state.audit_mutation(&auth, "reinstate_subject", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

/// Binds a governance instance to a service.
async fn handle_attach_governance(
    State(state): State<ControlState>,
    Path(service): Path<ServiceName>,
    headers: HeaderMap,
    Json(payload): Json<GovernancePayload>,
) -> Result<Json<RevisionResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "attach_governance")?;
    let revision = state.store.attach_governance(&service, payload.governance_id.clone())?;
    state.registry.attach(service.clone(), payload.governance_id);
    state.mirror_tools(&service);
    state.audit_mutation(&auth, "attach_governance", revision);
    Ok(Json(RevisionResponse {
        revision,
    }))
}

// ============================================================================
// SECTION: Bundle Handlers
// ============================================================================

/// Returns the full policy snapshot (gateway role).
async fn handle_bundle(
    State(state): State<ControlState>,
    headers: HeaderMap,
) -> Result<Json<BundleData>, ApiError> {
    state.authorize(&headers, Role::Gateway, "get_bundle_data")?;
    Ok(Json(state.store.bundle_data()))
}

/// Streams change events over SSE (gateway role).
///
/// Lagged subscribers receive a `reload` event and must re-read the bundle.
async fn handle_events(
    State(state): State<ControlState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&headers, Role::Gateway, "change_stream")?;
    let receiver = state.store.subscribe();
    let stream = BroadcastStream::new(receiver).map(|item| {
        let event = match item {
            Ok(change) => Event::default()
                .event("change")
                .json_data(&change)
                .unwrap_or_else(|_| Event::default().event("reload").data("reload")),
            Err(_lagged) => Event::default().event("reload").data("reload"),
        };
        Ok::<Event, Infallible>(event)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(EVENTS_KEEPALIVE)))
}

// ============================================================================
// SECTION: Governance Handlers
// ============================================================================

/// Evaluates a gated tool call (gateway role).
async fn handle_evaluate(
    State(state): State<ControlState>,
    Path(service): Path<ServiceName>,
    headers: HeaderMap,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let auth = state.authorize(&headers, Role::Gateway, "evaluate")?;
    let handle = state.governance(&service)?;
    let response = {
        let mut instance = lock_instance(&handle);
        instance.evaluate(&request, now_unix_millis())?
    };
    let mut event = ControlAuditEvent::allowed(
        "evaluate",
        auth.role.as_str(),
        auth.token_fingerprint.clone(),
    );
    if let Some(request_id) = &response.request_id {
        event = event.with_request_id(request_id.clone());
    }
    state.audit.record(&event);
    Ok(Json(response))
}

/// Approves a pending request (admin role).
async fn handle_approve(
    State(state): State<ControlState>,
    Path((service, id)): Path<(ServiceName, RequestId)>,
    headers: HeaderMap,
    Json(payload): Json<ResolvePayload>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "approve")?;
    let handle = state.governance(&service)?;
    let record = {
        let mut instance = lock_instance(&handle);
        instance.approve(&id, payload.approver, now_unix_millis())?;
        instance.execution_result(&id).cloned()
    };
    let record = record
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("unknown request: {id}")))?;
    state.audit.record(
        &ControlAuditEvent::allowed("approve", auth.role.as_str(), auth.token_fingerprint.clone())
            .with_request_id(id),
    );
    Ok(Json(record))
}

/// Denies a pending request with a reason (admin role).
async fn handle_deny(
    State(state): State<ControlState>,
    Path((service, id)): Path<(ServiceName, RequestId)>,
    headers: HeaderMap,
    Json(payload): Json<ResolvePayload>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    let auth = state.authorize(&headers, Role::Admin, "deny")?;
    let reason = payload.reason.unwrap_or_default();
    let handle = state.governance(&service)?;
    let record = {
        let mut instance = lock_instance(&handle);
        instance.deny(&id, payload.approver, reason, now_unix_millis())?;
        instance.execution_result(&id).cloned()
    };
    let record = record
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("unknown request: {id}")))?;
    state.audit.record(
        &ControlAuditEvent::allowed("deny", auth.role.as_str(), auth.token_fingerprint.clone())
            .with_request_id(id),
    );
    Ok(Json(record))
}

/// Lists pending requests (admin role).
async fn handle_pending(
    State(state): State<ControlState>,
    Path(service): Path<ServiceName>,
    headers: HeaderMap,
) -> Result<Json<Vec<ApprovalRequest>>, ApiError> {
    state.authorize(&headers, Role::Admin, "pending_requests")?;
    let handle = state.governance(&service)?;
    let records = {
        let instance = lock_instance(&handle);
        instance.pending_requests().into_iter().cloned().collect()
    };
    Ok(Json(records))
}

/// Lists approved, unconsumed requests (admin role).
async fn handle_queued(
    State(state): State<ControlState>,
    Path(service): Path<ServiceName>,
    headers: HeaderMap,
) -> Result<Json<Vec<ApprovalRequest>>, ApiError> {
    state.authorize(&headers, Role::Admin, "queued_for_execution")?;
    let handle = state.governance(&service)?;
    let records = {
        let instance = lock_instance(&handle);
        instance.queued_for_execution().into_iter().cloned().collect()
    };
    Ok(Json(records))
}

/// Returns one request record (admin role).
async fn handle_execution_result(
    State(state): State<ControlState>,
    Path((service, id)): Path<(ServiceName, RequestId)>,
    headers: HeaderMap,
) -> Result<Json<ApprovalRequest>, ApiError> {
    state.authorize(&headers, Role::Admin, "execution_result")?;
    let handle = state.governance(&service)?;
    let record = {
        let instance = lock_instance(&handle);
        instance.execution_result(&id).cloned()
    };
    record.map(Json).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, format!("unknown request: {id}"))
    })
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// Liveness endpoint.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "toolgate-control",
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a tag label into a catalog tag.
fn parse_tag(label: &str) -> Result<ToolTag, ApiError> {
    ToolTag::parse(label).ok_or_else(|| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("invalid tag: {label} (expected open or gated)"),
        )
    })
}

/// Locks a governance instance, recovering from a poisoned lock.
fn lock_instance(
    handle: &SharedGovernance,
) -> std::sync::MutexGuard<'_, toolgate_governance::ServiceGovernance> {
    match handle.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Returns the current wall-clock time as a unix-millisecond timestamp.
fn now_unix_millis() -> Timestamp {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    Timestamp::UnixMillis(i64::try_from(millis).unwrap_or(i64::MAX))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
