//! Casita Panel - Home Control API Server

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use docstore::MemoryStore;
use home_core::{
    ActivityQuery, Authenticator, FieldChanges, HomeError, HomePanel, InMemoryAuthenticator,
    MutationOutcome, PanelConfig, SettingChange,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod websocket;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub panel: Arc<HomePanel>,
}

/// API response wrapper using serde_json::Value for flexibility
#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or(serde_json::Value::Null)),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail(status: StatusCode, msg: impl Into<String>) -> ApiResult {
    (status, Json(ApiResponse::error(msg)))
}

/// Map a core error to an HTTP status
fn home_error(e: &HomeError) -> ApiResult {
    let status = match e {
        HomeError::UnknownField { .. }
        | HomeError::InvalidValue { .. }
        | HomeError::EmptyUpdate(_) => StatusCode::BAD_REQUEST,
        HomeError::Store(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    fail(status, e.to_string())
}

fn loading() -> ApiResult {
    fail(StatusCode::SERVICE_UNAVAILABLE, "Devices are still loading")
}

fn mutation_result(state: &AppState, result: Result<MutationOutcome, HomeError>) -> ApiResult {
    match result {
        Ok(MutationOutcome::Applied(entry)) => ok(entry),
        Ok(MutationOutcome::Skipped) if state.panel.mirror().is_ready() => {
            fail(StatusCode::NOT_FOUND, "Device not found")
        }
        Ok(MutationOutcome::Skipped) => loading(),
        Err(e) => home_error(&e),
    }
}

/// Brightness request
#[derive(Deserialize)]
struct BrightnessRequest {
    brightness: u16,
}

/// Activity log filter.
///
/// `start` and `end` are RFC 3339; use the `Z` suffix or percent-encode `+`.
#[derive(Deserialize)]
struct ActivityParams {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    device: Option<String>,
}

/// Sign-in or sign-up request
#[derive(Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// List all devices
async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    match state.panel.mirror().devices() {
        Some(devices) => ok(devices),
        None => loading(),
    }
}

/// Get a specific device
async fn get_device(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    if !state.panel.mirror().is_ready() {
        return loading();
    }
    match state.panel.mirror().device(&id) {
        Some(device) => ok(device),
        None => fail(StatusCode::NOT_FOUND, "Device not found"),
    }
}

/// Toggle device status
async fn toggle_device(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let result = state.panel.gateway().toggle(&id).await;
    mutation_result(&state, result)
}

/// Set light brightness
async fn set_brightness(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BrightnessRequest>,
) -> ApiResult {
    let level = u8::try_from(req.brightness.min(100)).unwrap_or(100);
    let result = state.panel.gateway().set_brightness(&id, level).await;
    mutation_result(&state, result)
}

/// Update arbitrary device fields
async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<FieldChanges>,
) -> impl IntoResponse {
    let result = state.panel.gateway().update(&id, changes).await;
    mutation_result(&state, result)
}

/// Activity log, newest first
async fn list_activity(
    State(state): State<AppState>,
    params: Result<Query<ActivityParams>, QueryRejection>,
) -> ApiResult {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            tracing::debug!("Rejected activity filter: {}", rejection);
            return fail(
                StatusCode::BAD_REQUEST,
                format!("Invalid activity filter: {}", rejection.body_text()),
            );
        }
    };

    let mut query = ActivityQuery::new();
    if let Some(start) = params.start {
        query = query.since(start);
    }
    if let Some(end) = params.end {
        query = query.until(end);
    }
    if let Some(device) = &params.device {
        query = query.device(device);
    }

    match state.panel.query_activity(&query).await {
        Ok(entries) => ok(entries),
        Err(e) => home_error(&e),
    }
}

/// Open/closed series over the report window
async fn status_history(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    if state.panel.schema().get(&id).is_none() {
        return fail(StatusCode::NOT_FOUND, "Device not found");
    }
    match state.panel.status_history(&id).await {
        Ok(samples) => ok(serde_json::json!({
            "deviceId": id,
            "windowDays": state.panel.config().report_window.num_days(),
            "samples": samples,
        })),
        Err(e) => home_error(&e),
    }
}

/// Current user settings
async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.panel.settings().current())
}

/// Change one setting
async fn update_settings(
    State(state): State<AppState>,
    Json(change): Json<SettingChange>,
) -> ApiResult {
    match state.panel.settings().update(change).await {
        Ok(settings) => ok(settings),
        Err(e) => home_error(&e),
    }
}

async fn login(State(state): State<AppState>, Json(req): Json<CredentialsRequest>) -> ApiResult {
    match state.panel.auth().login(&req.email, &req.password).await {
        Ok(user_id) => ok(serde_json::json!({ "userId": user_id })),
        Err(e) => fail(StatusCode::UNAUTHORIZED, e.to_string()),
    }
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult {
    match state.panel.auth().register(&req.email, &req.password).await {
        Ok(user_id) => ok(serde_json::json!({ "userId": user_id })),
        Err(e) => fail(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn logout(State(state): State<AppState>) -> ApiResult {
    match state.panel.auth().logout().await {
        Ok(()) => ok(serde_json::json!({ "userId": null })),
        Err(e) => fail(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket::handle_socket(socket, state))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/devices", get(list_devices))
        .route("/api/v1/devices/:id", get(get_device).patch(update_device))
        .route("/api/v1/devices/:id/toggle", post(toggle_device))
        .route("/api/v1/devices/:id/brightness", post(set_brightness))
        .route("/api/v1/activity", get(list_activity))
        .route("/api/v1/reports/:id/status-history", get(status_history))
        .route("/api/v1/settings", get(get_settings).patch(update_settings))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/logout", post(logout))
        // WebSocket
        .route("/ws", get(ws_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "home_panel_api=debug,home_core=debug,docstore=info,info".into()
            }),
        )
        .init();

    tracing::info!("Starting Casita Panel API server");

    let config = PanelConfig::from_env()?;
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let store_file = config.store_file();
    tracing::info!("Using store file {}", store_file.display());
    let store = Arc::new(MemoryStore::open(&store_file).await);
    let auth = Arc::new(InMemoryAuthenticator::new());

    let addr = config.listen_addr;
    let panel = Arc::new(HomePanel::start(store, auth, config));
    let state = AppState {
        panel: Arc::clone(&panel),
    };

    let app = router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    // Open WebSocket tasks may still hold the panel
    panel.shutdown().await;

    Ok(())
}
