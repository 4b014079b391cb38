//! HTTP server for the profile router.
//!
//! # API Endpoints
//!
//! | Method       | Path              | Description                          |
//! |--------------|-------------------|--------------------------------------|
//! | GET          | `/health`         | Health check                         |
//! | GET/POST     | `/eventcollector` | Collect events for a session         |
//! | POST         | `/api/import`     | Run an import job on an uploaded file|
//! | GET          | `/api/logs`       | SSE stream for real-time logs        |
//!
//! `OPTIONS` requests are answered by the CORS layer.

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::collector::{collect_events, EventService, ProfileService};
use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{error_response, ImportResponse};
use crate::config::ImportConfiguration;
use crate::error::{ImportError, RegistryError, ServerError, ServerResult};
use crate::registry::ConfigRegistry;
use crate::schema::PropertyTypeProvider;
use crate::sink::MemorySink;
use crate::transform::pipeline::{run_import_bytes, ErrorPolicy};

/// Shared services of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileService>,
    pub events: Arc<dyn EventService>,
    pub property_types: Arc<dyn PropertyTypeProvider>,
    pub registry: Arc<Mutex<ConfigRegistry>>,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/eventcollector", get(collect_events).post(collect_events))
        .route("/api/import", post(import_upload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> ServerResult<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Profile router running on http://localhost:{}", port);
    println!("   GET|POST /eventcollector - Collect session events");
    println!("   POST     /api/import     - Run an import job");
    println!("   GET      /api/logs       - SSE log stream");
    println!("   GET      /health         - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "profile-router",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "collector": "GET|POST /eventcollector",
            "import": "POST /api/import",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers drop the missed entries
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Parts of an import upload.
#[derive(Debug, Default)]
pub struct ImportUpload {
    /// Inline configuration JSON.
    pub config: Option<String>,
    /// Id of a stored configuration.
    pub config_id: Option<String>,
    pub file_name: Option<String>,
    pub file: Option<Vec<u8>>,
}

type Rejection = (StatusCode, Json<Value>);

fn reject(err: ServerError) -> Rejection {
    (status_for(&err), Json(error_response(&err.to_string())))
}

fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
        ServerError::Import(ImportError::Config(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Import(ImportError::Record(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /api/import` with multipart parts `config` or `configId`, and `file`.
async fn import_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, Rejection> {
    let mut upload = ImportUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(ServerError::BadRequest(format!("Multipart error: {}", e))))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                upload.file = Some(bytes.to_vec());
            }
            "config" | "configId" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                if name == "config" {
                    upload.config = Some(text);
                } else {
                    upload.config_id = Some(text.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let response = tokio::task::spawn_blocking(move || execute_import(&state, upload))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response(&format!("Import task failed: {}", e))),
            )
        })?
        .map_err(reject)?;

    Ok(Json(response))
}

/// Resolve the configuration of an upload and run the job into memory.
///
/// Every rejection is collected into the report. Runs of stored
/// configurations are recorded in the registry.
pub fn execute_import(state: &AppState, upload: ImportUpload) -> ServerResult<ImportResponse> {
    let bytes = upload
        .file
        .ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;

    let (config, stored_id) = match (upload.config, upload.config_id) {
        (Some(json), _) => {
            let config = ImportConfiguration::from_json(&json).map_err(ImportError::from)?;
            (config, None)
        }
        (None, Some(id)) => {
            let registry = state.registry.lock().unwrap_or_else(|e| e.into_inner());
            let config = registry.require(&id)?.configuration.clone();
            (config, Some(id))
        }
        (None, None) => {
            return Err(ServerError::BadRequest(
                "Either 'config' or 'configId' is required".into(),
            ))
        }
    };

    log_info(format!(
        "📄 Upload {} ({} bytes)",
        upload.file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let mut sink = MemorySink::new();
    let report = run_import_bytes(
        &bytes,
        &config,
        state.property_types.as_ref(),
        &mut sink,
        ErrorPolicy::Collect,
    )?;

    if let Some(id) = stored_id {
        let mut registry = state.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.record_run(&id, &report)?;
    }

    Ok(ImportResponse::new(config.item_id, report, sink.envelopes))
}
