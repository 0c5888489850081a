//! REST API server for the settlements ledger
//!
//! Exposes the proxied ledger operations over HTTP. Callers identify
//! themselves with a hex address in the request body; admin checks happen in
//! the ledger logic, not here.

use axum::{
    extract::{Path, Query, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hex::decode_to_slice;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::LedgerError;
use crate::ledger::{Address, SessionInfo};
use crate::proxy::{Call, Proxy};

/// Shared API state: the proxy plus request statistics.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<RwLock<Proxy>>,
    api_stats: Arc<RwLock<ApiStats>>,
}

impl AppState {
    pub fn new(proxy: Proxy) -> Self {
        Self {
            proxy: Arc::new(RwLock::new(proxy)),
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }
}

/// API statistics and monitoring
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    operations_submitted: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    InvalidInput(String),
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Ledger(e) => {
                let status = match &e {
                    LedgerError::OnlyAdmin => StatusCode::FORBIDDEN,
                    LedgerError::AlreadyInitialized
                    | LedgerError::NotInitialized
                    | LedgerError::InsufficientClientBalance
                    | LedgerError::InsufficientNativeBalance => StatusCode::CONFLICT,
                    LedgerError::DatabaseError(_) | LedgerError::IoError(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct BalanceResponse {
    pub id: String,
    pub client_balance: u64,
    pub native_balance: u64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub initialized: bool,
    pub version: u32,
    pub tracked_ids: usize,
    pub total_tracked: u64,
    pub events: usize,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub operations_submitted: u64,
    pub uptime_seconds: u64,
}

#[derive(Deserialize)]
pub struct InitializeRequest {
    pub caller: String,
    pub token: String,
    pub admin: String,
}

#[derive(Deserialize)]
pub struct TopUpRequest {
    pub caller: String,
    pub amount: u64,
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct PaymentRequest {
    pub caller: String,
    pub client_id: String,
    pub native_id: String,
    pub amount: u64,
    #[serde(default)]
    pub session: Option<SessionInfo>,
}

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub caller: String,
    pub native_id: String,
    pub receiver: String,
    pub amount: u64,
}

#[derive(Deserialize)]
pub struct BackFundsRequest {
    pub caller: String,
    pub client_id: String,
    pub receiver: String,
    pub amount: u64,
}

#[derive(Deserialize)]
pub struct SweepRequest {
    pub caller: String,
    pub receiver: String,
    pub amount: u64,
}

#[derive(Deserialize)]
pub struct ChangeAdminRequest {
    pub caller: String,
    pub new_admin: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    message: String,
}

#[derive(Deserialize)]
struct PaginationQuery {
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_page() -> u64 {
    0
}
fn default_limit() -> u64 {
    10
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Parses a 64-character hex string into an Address ([u8; 32]).
fn parse_address(addr_str: &str) -> Result<Address, ApiError> {
    if addr_str.len() != 64 {
        return Err(ApiError::InvalidInput(
            "Address must be a 64-character hex string".to_string(),
        ));
    }
    let mut addr = [0u8; 32];
    decode_to_slice(addr_str, &mut addr)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid hex address: {}", e)))?;
    Ok(addr)
}

// ============================================================================
// Middleware
// ============================================================================

/// Request statistics middleware
async fn stats_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    let mut stats = state.api_stats.write().await;
    stats.record_request(success);

    response
}

/// Detailed request logging middleware. Logs method, path, status and
/// duration.
async fn logging_middleware(State(_state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints (for testing)
pub fn build_api_router(state: AppState) -> Router {
    // CORS configuration - allow all origins with credentials
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    let api_routes = Router::new()
        // Ledger reads
        .route("/admin", get(get_admin))
        .route("/balance/:id", get(get_balance))
        .route("/events", get(get_events))
        .route("/ledger/stats", get(get_ledger_stats))
        // Ledger operations
        .route("/initialize", post(initialize))
        .route("/topup", post(top_up))
        .route("/payment", post(payment))
        .route("/withdraw", post(withdraw))
        .route("/backfunds", post(back_funds))
        .route("/sweep", post(sweep))
        .route("/admin/change", post(change_admin))
        // Proxy endpoints
        .route("/proxy/impl", get(get_proxy_impl))
        .route("/proxy/admin", get(get_proxy_admin))
        .route("/proxy/admin/change", post(change_proxy_admin))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so we always record timing
        .layer(middleware::from_fn_with_state(
            state.clone(),
            logging_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            stats_middleware,
        ))
        .with_state(state)
        .layer(cors.clone());

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Run the API server
pub async fn run_api_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "api.listening");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let proxy = state.proxy.read().await;
    Json(serde_json::json!({
        "status": "healthy",
        "initialized": proxy.state().is_initialized(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_admin(State(state): State<AppState>) -> impl IntoResponse {
    let proxy = state.proxy.read().await;
    Json(serde_json::json!({
        "admin": hex::encode(proxy.get_admin())
    }))
}

async fn get_balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    if id.is_empty() {
        return Err(ApiError::InvalidInput("Id cannot be empty".to_string()));
    }
    let proxy = state.proxy.read().await;
    let record = proxy.get_balance(&id);
    Ok(Json(BalanceResponse {
        id,
        client_balance: record.client_balance,
        native_balance: record.native_balance,
    }))
}

async fn get_events(
    State(state): State<AppState>,
    Query(params): Query<PaginationQuery>,
) -> impl IntoResponse {
    let proxy = state.proxy.read().await;
    let entries = proxy.events().entries();
    let total = entries.len();

    let limit = params.limit.min(100); // Max 100 events per request

    // Both values are caller-controlled; saturate instead of overflowing
    let offset = params.page.saturating_mul(limit);

    let page: Vec<_> = entries
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect();

    Json(serde_json::json!({
        "events": page,
        "total": total,
        "page": params.page,
        "limit": limit
    }))
}

async fn get_ledger_stats(State(state): State<AppState>) -> impl IntoResponse {
    let proxy = state.proxy.read().await;
    let ledger = proxy.state();
    Json(StatsResponse {
        initialized: ledger.is_initialized(),
        version: ledger.version,
        tracked_ids: ledger.balances.len(),
        total_tracked: ledger.total_tracked(),
        events: proxy.events().len(),
    })
}

async fn initialize(
    State(state): State<AppState>,
    Json(req): Json<InitializeRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let token = parse_address(&req.token)?;
    let admin = parse_address(&req.admin)?;

    let mut proxy = state.proxy.write().await;
    proxy.call(caller, Call::Initialize { token, admin })?;
    record_operation(&state).await;

    Ok(Json(SuccessResponse {
        message: "Ledger initialized".to_string(),
    }))
}

async fn top_up(
    State(state): State<AppState>,
    Json(req): Json<TopUpRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    if req.user_id.is_empty() {
        return Err(ApiError::InvalidInput("user_id cannot be empty".to_string()));
    }

    let mut proxy = state.proxy.write().await;
    proxy.call(
        caller,
        Call::TopUpClientBalance {
            amount: req.amount,
            user_id: req.user_id.clone(),
        },
    )?;
    record_operation(&state).await;

    let record = proxy.get_balance(&req.user_id);
    Ok(Json(BalanceResponse {
        id: req.user_id,
        client_balance: record.client_balance,
        native_balance: record.native_balance,
    }))
}

async fn payment(
    State(state): State<AppState>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    if req.client_id.is_empty() || req.native_id.is_empty() {
        return Err(ApiError::InvalidInput("Ids cannot be empty".to_string()));
    }

    let mut proxy = state.proxy.write().await;
    proxy.call(
        caller,
        Call::PaymentClientToNative {
            client_id: req.client_id,
            native_id: req.native_id,
            amount: req.amount,
            session: req.session,
        },
    )?;
    record_operation(&state).await;

    Ok(Json(SuccessResponse {
        message: "Payment recorded".to_string(),
    }))
}

async fn withdraw(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let receiver = parse_address(&req.receiver)?;

    let mut proxy = state.proxy.write().await;
    proxy.call(
        caller,
        Call::WithdrawFundsToNative {
            native_id: req.native_id,
            receiver,
            amount: req.amount,
        },
    )?;
    record_operation(&state).await;

    Ok(Json(SuccessResponse {
        message: "Withdrawal completed".to_string(),
    }))
}

async fn back_funds(
    State(state): State<AppState>,
    Json(req): Json<BackFundsRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let receiver = parse_address(&req.receiver)?;

    let mut proxy = state.proxy.write().await;
    proxy.call(
        caller,
        Call::BackFundsToClient {
            client_id: req.client_id,
            receiver,
            amount: req.amount,
        },
    )?;
    record_operation(&state).await;

    Ok(Json(SuccessResponse {
        message: "Refund completed".to_string(),
    }))
}

async fn sweep(
    State(state): State<AppState>,
    Json(req): Json<SweepRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let receiver = parse_address(&req.receiver)?;

    let mut proxy = state.proxy.write().await;
    proxy.call(
        caller,
        Call::WithdrawTokens {
            receiver,
            amount: req.amount,
        },
    )?;
    record_operation(&state).await;

    Ok(Json(SuccessResponse {
        message: "Tokens withdrawn".to_string(),
    }))
}

async fn change_admin(
    State(state): State<AppState>,
    Json(req): Json<ChangeAdminRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let new_admin = parse_address(&req.new_admin)?;

    let mut proxy = state.proxy.write().await;
    proxy.call(caller, Call::ChangeAdmin { new_admin })?;
    record_operation(&state).await;

    Ok(Json(SuccessResponse {
        message: "Admin changed".to_string(),
    }))
}

async fn get_proxy_impl(State(state): State<AppState>) -> impl IntoResponse {
    let proxy = state.proxy.read().await;
    Json(serde_json::json!({
        "implementation": proxy.get_impl()
    }))
}

async fn get_proxy_admin(State(state): State<AppState>) -> impl IntoResponse {
    let proxy = state.proxy.read().await;
    Json(serde_json::json!({
        "proxy_admin": hex::encode(proxy.get_proxy_admin())
    }))
}

async fn change_proxy_admin(
    State(state): State<AppState>,
    Json(req): Json<ChangeAdminRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let new_admin = parse_address(&req.new_admin)?;

    let mut proxy = state.proxy.write().await;
    proxy.change_proxy_admin(caller, new_admin)?;
    record_operation(&state).await;

    Ok(Json(SuccessResponse {
        message: "Proxy admin changed".to_string(),
    }))
}

async fn get_api_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.api_stats.read().await;
    let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);

    Json(ApiStatsResponse {
        total_requests: stats.total_requests,
        successful_requests: stats.successful_requests,
        failed_requests: stats.failed_requests,
        operations_submitted: stats.operations_submitted,
        uptime_seconds: uptime,
    })
}

async fn record_operation(state: &AppState) {
    let mut stats = state.api_stats.write().await;
    stats.operations_submitted += 1;
}
