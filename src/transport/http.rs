//! HTTP transport
//!
//! REST API over axum. The caller's identity comes from the session headers
//! (see [`HeaderSession`]); every route answers in camelCase JSON and maps
//! failures through [`ApiError`].

use crate::config::{CorsMode, ServerConfig, SessionConfig};
use crate::error::http_mapper::ApiError;
use crate::gateway::{AccessGateway, ReadDecision};
use crate::metrics::MetricsSnapshot;
use crate::model::{
    AccessGrant, AccessRequest, BookId, Notification, NotificationId, RequestId, Resolution,
    UserId,
};
use crate::session::{HeaderSession, Identity, SessionProvider};
use crate::util::{bind_port_strict, find_available_port};
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Default port for the HTTP transport
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind to (e.g., "127.0.0.1:8080")
    pub bind: SocketAddr,
    /// CORS policy
    pub cors: CorsMode,
    /// Fail instead of falling back to a nearby port
    pub strict_port: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_HTTP_PORT)),
            cors: CorsMode::Disabled,
            strict_port: false,
        }
    }
}

impl HttpConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            ..Default::default()
        }
    }

    /// Create config from host and port strings
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, std::net::AddrParseError> {
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        Ok(Self::new(addr))
    }

    pub fn from_server_config(server: &ServerConfig) -> Result<Self, std::net::AddrParseError> {
        Ok(Self {
            cors: server.cors,
            ..Self::from_host_port(&server.host, server.port)?
        })
    }
}

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<AccessGateway>,
    pub session: Arc<SessionConfig>,
    pub server: Arc<ServerInfo>,
}

/// Name and version reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl From<&ServerConfig> for ServerInfo {
    fn from(server: &ServerConfig) -> Self {
        Self {
            name: server.name.clone(),
            version: server.version.clone(),
        }
    }
}

impl AppState {
    pub fn new(gateway: Arc<AccessGateway>, session: SessionConfig, server: ServerInfo) -> Self {
        Self {
            gateway,
            session: Arc::new(session),
            server: Arc::new(server),
        }
    }
}

/// The authenticated caller of a request
pub struct Caller(pub Identity);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session =
            HeaderSession::from_headers(&parts.headers, &state.session, state.gateway.ids());
        Ok(Caller(session.identity().await?))
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessDecisionResponse {
    book_id: BookId,
    decision: ReadDecision,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessCheckResponse {
    user_id: UserId,
    book_id: BookId,
    has_access: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    book_id: String,
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessBody {
    approved: bool,
    #[serde(default)]
    rejection_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationQuery {
    #[serde(default)]
    unread: bool,
}

#[derive(Debug, Serialize)]
struct UnreadCountResponse {
    count: usize,
}

/// Build the API router
pub fn router(state: AppState, cors: CorsMode) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/books/{book_id}/access", get(book_access))
        .route(
            "/api/book-access/check/{user_id}/{book_id}",
            get(check_access),
        )
        .route("/api/book-access/request", post(submit_request))
        .route("/api/book-access/requests", get(pending_requests))
        .route("/api/book-access/requests/mine", get(my_requests))
        .route("/api/book-access/grants/mine", get(my_grants))
        .route(
            "/api/book-access/process/{request_id}",
            post(process_request),
        )
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/{id}/read", post(mark_read))
        .route("/api/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors {
        CorsMode::Disabled => router,
        CorsMode::Permissive => router.layer(CorsLayer::permissive()),
    }
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("'{}' is not a valid {}", raw, what)))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.server.name.clone(),
        version: state.server.version.clone(),
    })
}

async fn book_access(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(book_id): Path<String>,
) -> Result<Json<AccessDecisionResponse>, ApiError> {
    let book_id = state.gateway.ids().book_id(&book_id)?;
    let decision = state.gateway.request_or_read(&identity, &book_id).await?;
    Ok(Json(AccessDecisionResponse { book_id, decision }))
}

async fn check_access(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path((user_id, book_id)): Path<(String, String)>,
) -> Result<Json<AccessCheckResponse>, ApiError> {
    let ids = state.gateway.ids();
    let user_id = ids
        .user_id(&user_id)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let book_id = ids.book_id(&book_id)?;

    let has_access = state
        .gateway
        .has_access(&identity, &user_id, &book_id)
        .await?;
    Ok(Json(AccessCheckResponse {
        user_id,
        book_id,
        has_access,
    }))
}

async fn submit_request(
    State(state): State<AppState>,
    Caller(identity): Caller,
    payload: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AccessRequest>), ApiError> {
    let body = json_body(payload)?;
    let book_id = state.gateway.ids().book_id(&body.book_id)?;
    let request = state
        .gateway
        .submit_request(&identity, &book_id, &body.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn pending_requests(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> Result<Json<Vec<AccessRequest>>, ApiError> {
    Ok(Json(state.gateway.list_pending(&identity).await?))
}

async fn my_requests(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> Result<Json<Vec<AccessRequest>>, ApiError> {
    Ok(Json(state.gateway.my_requests(&identity).await?))
}

async fn my_grants(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> Result<Json<Vec<AccessGrant>>, ApiError> {
    Ok(Json(state.gateway.my_grants(&identity).await?))
}

async fn process_request(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(request_id): Path<String>,
    payload: Result<Json<ProcessBody>, JsonRejection>,
) -> Result<Json<AccessRequest>, ApiError> {
    let request_id: RequestId = parse_id(&request_id, "request id")?;
    let body = json_body(payload)?;
    let resolution = Resolution::from_decision(body.approved, body.rejection_reason.as_deref())?;

    let request = state
        .gateway
        .resolve(&identity, request_id, resolution)
        .await?;
    Ok(Json(request))
}

async fn list_notifications(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let list = if query.unread {
        state.gateway.unread_notifications(&identity).await?
    } else {
        state.gateway.notifications_for(&identity).await?
    };
    Ok(Json(list))
}

async fn unread_count(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let count = state.gateway.unread_count(&identity).await?;
    Ok(Json(UnreadCountResponse { count }))
}

async fn mark_read(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<Json<Notification>, ApiError> {
    let id: NotificationId = parse_id(&id, "notification id")?;
    Ok(Json(
        state.gateway.mark_notification_read(&identity, id).await?,
    ))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.gateway.metrics().snapshot())
}

/// A running HTTP server
#[derive(Debug)]
pub struct HttpHandle {
    /// Address the server is listening on
    pub local_addr: SocketAddr,
    /// Cancel to shut the server down gracefully
    pub ct: CancellationToken,
    task: JoinHandle<()>,
}

impl HttpHandle {
    /// Stop accepting connections and wait for in-flight requests to finish
    pub async fn shutdown(self) {
        self.ct.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "HTTP server task panicked");
        }
    }
}

/// Start the HTTP server in the background.
///
/// Port discovery is used to find an available port if the configured port is
/// taken, unless `strict_port` is set.
pub async fn run_http(state: AppState, config: HttpConfig) -> anyhow::Result<HttpHandle> {
    let host = config.bind.ip().to_string();
    let preferred_port = config.bind.port();
    let actual_port = if config.strict_port {
        bind_port_strict(&host, preferred_port).await?
    } else {
        find_available_port(&host, preferred_port).await?
    };

    let bind_addr = SocketAddr::new(config.bind.ip(), actual_port);
    let listener = TcpListener::bind(bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let app = router(state, config.cors);
    let ct = CancellationToken::new();
    let shutdown = ct.clone();

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "HTTP server failed");
        }
    });

    info!("HTTP server listening on http://{}", local_addr);
    Ok(HttpHandle {
        local_addr,
        ct,
        task,
    })
}

/// Run the HTTP server and wait for shutdown (Ctrl+C)
pub async fn run_http_blocking(state: AppState, config: HttpConfig) -> anyhow::Result<()> {
    let handle = run_http(state, config).await?;

    info!("Press Ctrl+C to stop the server");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = handle.ct.cancelled() => {
            info!("Server cancelled");
        }
    }

    handle.shutdown().await;

    info!("HTTP server stopped");
    Ok(())
}
