//! HTTP server for the reconciliation API.
//!
//! The review UI drives a run through these endpoints: upload a sheet, get a
//! suggested mapping back, submit the approved mapping for import or
//! matching, then submit the reviewed selection as a bulk action.
//!
//! # API Endpoints
//!
//! | Method | Path               | Description                              |
//! |--------|--------------------|------------------------------------------|
//! | GET    | `/health`          | Health check                             |
//! | POST   | `/api/sheet`       | Upload CSV, get headers/rows/mapping     |
//! | POST   | `/api/import`      | Import rows as new contacts              |
//! | POST   | `/api/matches`     | Find existing contacts for each row      |
//! | POST   | `/api/bulk-action` | Apply a reviewed bulk action             |
//! | GET    | `/api/logs`        | SSE stream for real-time logs            |
//!
//! Expected failures come back as `200` with `success: false`. Only
//! malformed requests get a 4xx.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Json, Response, Sse,
    },
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, log_success, log_warning, LOG_BROADCASTER};
use super::types::{error_response, failure_envelope, ImportRequest, MatchRequest, SheetQuery};
use crate::cache::MappingRegistry;
use crate::config::AppConfig;
use crate::error::{PipelineResult, ServerError, ServerResult};
use crate::models::{ActionResponse, BulkActionRequest, FieldMapping, MappingPurpose};
use crate::store::{JsonFileStore, RecordStore};
use crate::transform::pipeline::{
    apply_bulk, find_sheet_matches, import_sheet, preview_bytes, SheetPreview,
};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(error_response(&msg))).into_response()
            }
            ServerError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(&msg))).into_response()
            }
            // Expected failure: 200 envelope
            ServerError::Pipeline(e) => Json(failure_envelope(e.to_string())).into_response(),
        }
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub registry: Arc<Mutex<MappingRegistry>>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, registry: MappingRegistry, config: AppConfig) -> Self {
        Self {
            store,
            registry: Arc::new(Mutex::new(registry)),
            config,
        }
    }

    /// File-backed store and registry at the configured locations
    pub fn from_config(config: AppConfig) -> Self {
        let store = Arc::new(JsonFileStore::new(&config.store_path));
        let registry = MappingRegistry::with_dir(&config.registry_dir);
        Self::new(store, registry, config)
    }

    /// Parse an upload and suggest a mapping, counting a use of the stored
    /// mapping it came from.
    fn preview(&self, bytes: &[u8], purpose: MappingPurpose) -> PipelineResult<SheetPreview> {
        let Ok(mut registry) = self.registry.lock() else {
            log_warning("Mapping registry unavailable");
            return preview_bytes(bytes, purpose, None);
        };

        let preview = preview_bytes(bytes, purpose, Some(&*registry))?;
        if let Some(id) = &preview.registry_mapping_id {
            if let Err(e) = registry.record_use(id) {
                log_warning(format!("Could not record use of {}: {}", id, e));
            }
        }
        Ok(preview)
    }

    /// Save an approved mapping when the caller asked for it. Failures are
    /// logged; they never fail the operation that was already applied.
    fn remember_mapping(
        &self,
        name: Option<&str>,
        mapping: &FieldMapping,
        purpose: MappingPurpose,
        headers: &[String],
    ) {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return;
        };
        let saved = match self.registry.lock() {
            Ok(mut registry) => registry.save(mapping.clone(), name, purpose, headers.to_vec()),
            Err(_) => {
                log_warning("Mapping registry unavailable");
                return;
            }
        };
        match saved {
            Ok(id) => log_success(format!("Mapping saved as {}", id)),
            Err(e) => log_warning(format!("Could not save mapping: {}", e)),
        }
    }
}

/// Routes with CORS and upload limit applied
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/sheet", post(upload_sheet))
        .route("/api/import", post(import))
        .route("/api/matches", post(matches))
        .route("/api/bulk-action", post(bulk_action))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> ServerResult<()> {
    let port = config.port;
    let store_path = config.store_path.display().to_string();
    let app = build_router(AppState::from_config(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Reconcile server running on http://localhost:{}", port);
    println!("   POST /api/sheet       - Upload CSV file");
    println!("   POST /api/import      - Import rows as contacts");
    println!("   POST /api/matches     - Find matching contacts");
    println!("   POST /api/bulk-action - Apply reviewed action");
    println!("   GET  /api/logs        - SSE log stream");
    println!("   GET  /health          - Health check");
    println!();
    println!("📁 Record store: {}", store_path);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Internal(format!("Cannot bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "reconcile",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "sheet": "POST /api/sheet",
            "import": "POST /api/import",
            "matches": "POST /api/matches",
            "bulkAction": "POST /api/bulk-action",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Parse an uploaded CSV and propose a mapping
async fn upload_sheet(
    State(state): State<AppState>,
    Query(query): Query<SheetQuery>,
    mut multipart: Multipart,
) -> ServerResult<Response> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;

    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let preview = state.preview(&bytes, query.purpose)?;
    Ok(Json(preview).into_response())
}

async fn import(
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> Json<ActionResponse> {
    let Some(group) = state.config.group_or_default(req.associated_group.as_deref()) else {
        return Json(failure_envelope(
            "An associated group is required to import connections.",
        ));
    };

    let response = import_sheet(state.store.as_ref(), &req.sheet, &req.mapping, &group).await;
    if response.success {
        state.remember_mapping(
            req.save_mapping_as.as_deref(),
            &req.mapping,
            MappingPurpose::Import,
            &req.sheet.headers,
        );
    }
    Json(response)
}

async fn matches(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Json<ActionResponse> {
    let response = find_sheet_matches(
        state.store.as_ref(),
        &req.sheet,
        &req.mapping,
        req.associated_group.as_deref(),
    )
    .await;
    if response.success {
        state.remember_mapping(
            req.save_mapping_as.as_deref(),
            &req.mapping,
            MappingPurpose::Reconcile,
            &req.sheet.headers,
        );
    }
    Json(response)
}

async fn bulk_action(
    State(state): State<AppState>,
    Json(req): Json<BulkActionRequest>,
) -> Json<ActionResponse> {
    Json(apply_bulk(state.store.as_ref(), &req).await)
}
