//! HTTP front end: `POST /api/v1/ipo/analyze` over axum.
//!
//! The handler reads the multipart upload, runs [`crate::analyze`] and maps
//! failures to `{"detail": "..."}` bodies with the status given by
//! [`AnalysisError::category`]: bad input → 400, provider failures → 502,
//! everything else → 500.
//!
//! Every request gets an `x-request-id` (propagated from a proxy or freshly
//! generated), which is echoed on the response and recorded on the request's
//! tracing span so the analysis logs can be correlated with the access.

use crate::analyze::analyze_bytes_with_id;
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, ErrorCategory};
use crate::model::{AnalysisInputs, AnalysisResult};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tracing::{error, info, info_span, warn, Instrument};

pub const ANALYZE_PATH: &str = "/api/v1/ipo/analyze";
pub const HEALTH_PATH: &str = "/health";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Multipart field carrying the PDF.
pub const UPLOAD_FIELD: &str = "rhp";

// ── Configuration ────────────────────────────────────────────────────────

/// Settings for the HTTP layer only; analysis settings live in
/// [`AnalyzerConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub app_name: String,
    /// Allowed CORS origins; `"*"` allows any.
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            app_name: "IPO Assistant Backend".to_string(),
            cors_origins: vec!["http://localhost:5173".to_string()],
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Read `RHP_BIND_ADDR`, `APP_NAME`, `BACKEND_CORS_ORIGINS` and
    /// `RHP_MAX_UPLOAD_MB`.
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AnalysisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("RHP_BIND_ADDR") {
            config.bind = addr.trim().parse().map_err(|_| {
                AnalysisError::InvalidConfig(format!("RHP_BIND_ADDR: cannot parse '{addr}'"))
            })?;
        }
        if let Some(name) = get("APP_NAME") {
            config.app_name = name;
        }
        if let Some(origins) = get("BACKEND_CORS_ORIGINS") {
            config.cors_origins = parse_origins(&origins);
        }
        if let Some(mb) = get("RHP_MAX_UPLOAD_MB") {
            let mb: usize = mb.trim().parse().map_err(|_| {
                AnalysisError::InvalidConfig(format!("RHP_MAX_UPLOAD_MB: cannot parse '{mb}'"))
            })?;
            config.max_upload_bytes = mb * 1024 * 1024;
        }
        Ok(config)
    }
}

/// Accept a comma-separated list or a JSON array of origins.
pub fn parse_origins(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
            return list;
        }
    }
    raw.split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── State & router ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<AnalyzerConfig>,
    pub app_name: Arc<str>,
}

impl AppState {
    pub fn new(analyzer: AnalyzerConfig, server: &ServerConfig) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            app_name: Arc::from(server.app_name.as_str()),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route(ANALYZE_PATH, post(analyze_ipo))
        .route(HEALTH_PATH, get(health))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors_layer(&server.cors_origins))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
///
/// An unknown provider name is rejected here rather than on the first
/// upload; a missing credential only warns, since it may be provisioned
/// before traffic arrives.
pub async fn serve(analyzer: AnalyzerConfig, server: ServerConfig) -> Result<(), AnalysisError> {
    if analyzer.provider.is_none() {
        let (kind, settings) = analyzer
            .active_settings()
            .map_err(|e| AnalysisError::InvalidConfig(e.to_string()))?;
        if settings.api_key.is_none() {
            warn!(
                "{} is not set; analysis requests will fail until it is",
                kind.key_env_var()
            );
        }
    }

    let provider = analyzer.provider_name.clone();
    let model = analyzer.effective_model().unwrap_or_default();
    let app = router(AppState::new(analyzer, &server), &server);

    let listener = tokio::net::TcpListener::bind(server.bind)
        .await
        .map_err(|e| AnalysisError::Internal(format!("cannot bind {}: {}", server.bind, e)))?;
    info!(
        "{} listening on http://{} (provider: {}, model: {})",
        server.app_name, server.bind, provider, model
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AnalysisError::Internal(format!("server error: {}", e)))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any).allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {:?}", o);
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

// ── Request id ───────────────────────────────────────────────────────────

/// Request id carried through handler extensions.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Propagate or generate a UUID v4 request id, run the request inside a
/// span carrying it, and echo it on the response.
pub async fn request_id_middleware(headers: HeaderMap, mut request: Request, next: Next) -> Response {
    let id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(crate::analyze::new_request_id);

    let span = info_span!(
        "http",
        request_id = %id,
        method = %request.method(),
        path = %request.uri().path()
    );
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).instrument(span).await;
    if let Ok(val) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    response
}

// ── Errors ───────────────────────────────────────────────────────────────

/// An error response body: `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        let status = match e.category() {
            ErrorCategory::BadInput => StatusCode::BAD_REQUEST,
            ErrorCategory::Upstream => StatusCode::BAD_GATEWAY,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &e {
            AnalysisError::InvalidConfig(_) | AnalysisError::Internal(_) => {
                format!("Unexpected error during analysis: {}", e)
            }
            _ => e.to_string(),
        };
        Self { status, detail }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), "{}", self.detail);
        } else {
            warn!(status = self.status.as_u16(), "{}", self.detail);
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "app": &*state.app_name,
        "provider": state.analyzer.provider_name,
        "model": state.analyzer.effective_model(),
    }))
}

/// The parsed multipart form.
struct UploadForm {
    filename: String,
    pdf: Vec<u8>,
    inputs: AnalysisInputs,
}

async fn analyze_ipo(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    multipart: Multipart,
) -> Result<Json<AnalysisResult>, ApiError> {
    let form = read_upload(multipart).await?;
    info!(
        file = %form.filename,
        bytes = form.pdf.len(),
        "RHP upload received"
    );

    let output = analyze_bytes_with_id(form.pdf, form.inputs, &state.analyzer, request_id).await?;
    Ok(Json(output.result))
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut inputs = AnalysisInputs::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("form field", e))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            UPLOAD_FIELD => {
                if !is_pdf_content_type(field.content_type()) {
                    return Err(ApiError::bad_request("Uploaded file must be a PDF."));
                }
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("file data", e))?
                    .to_vec();
                upload = Some((filename, data));
            }
            "issue_price" | "gmp" | "sub_retail" | "sub_nii" | "sub_qib" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(&name, e))?;
                if raw.trim().is_empty() {
                    continue;
                }
                let value = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        ApiError::bad_request(format!(
                            "Invalid IPO data: {} must be a number, got '{}'",
                            name, raw
                        ))
                    })?;
                match name.as_str() {
                    "issue_price" => inputs.issue_price = value,
                    "gmp" => inputs.gmp = value,
                    "sub_retail" => inputs.sub_retail = value,
                    "sub_nii" => inputs.sub_nii = value,
                    _ => inputs.sub_qib = value,
                }
            }
            _ => {
                field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(&name, e))?;
            }
        }
    }

    let (filename, pdf) = upload.ok_or_else(|| {
        ApiError::bad_request(format!("Missing '{}' file field.", UPLOAD_FIELD))
    })?;
    Ok(UploadForm {
        filename,
        pdf,
        inputs,
    })
}

/// Keep the status axum assigns (413 for an oversized upload, 400 otherwise).
fn multipart_error(what: &str, e: MultipartError) -> ApiError {
    ApiError {
        status: e.status(),
        detail: format!("Failed to read {}: {}", what, e.body_text()),
    }
}

fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/pdf"))
        .unwrap_or(false)
}
