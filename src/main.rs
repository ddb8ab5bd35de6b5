//! Insurance OCR - document text recognition server for insurance paperwork.

mod cleaner;
mod config;
mod entities;
mod error;
mod extractor;
mod input;
mod ocr;
mod preprocess;
mod schema;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use config::ServiceConfig;
use entities::{FieldExtractor, StructuredFields};
use extractor::{Extractor, OcrRequest};
use ocr::{paddle::PaddleEngine, tesseract::TesseractEngine, EngineChoice, EngineKind, EngineRegistry};
use preprocess::Preprocessor;
use schema::{unix_timestamp, ErrorResponse, FieldsRequest, OcrResponse};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "Insurance OCR API";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    extractor: Extractor,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "insurance_ocr=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env().context("Invalid configuration")?;

    // Engines load their models once; a failed engine is left out.
    let mut engines = EngineRegistry::new();
    match TesseractEngine::new(&config.tesseract) {
        Ok(engine) => {
            info!("Tesseract languages: {}", engine.language());
            engines.register(Arc::new(engine));
        }
        Err(e) => warn!("Tesseract disabled: {}", e),
    }
    match PaddleEngine::new(&config.paddle) {
        Ok(engine) => engines.register(Arc::new(engine)),
        Err(e) => warn!("PaddleOCR disabled: {}", e),
    }
    if engines.available().is_empty() {
        warn!("No OCR engine could be initialized; /ocr requests will fail");
    }

    let preprocessor = Preprocessor::new(&config.pdf);
    preprocessor.pdf().probe();

    let fields = FieldExtractor::new();
    if fields.is_empty() {
        warn!("No field patterns compiled; field extraction returns nothing");
    }

    let state = AppState {
        extractor: Extractor::new(preprocessor, engines, fields),
    };

    let app = router(state, config.max_upload_bytes);

    // Run server
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ocr", post(ocr_document))
        .route("/fields", post(extract_fields))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Service banner.
async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Health check endpoint.
async fn health(State(state): State<AppState>) -> Json<Value> {
    let engines: Vec<EngineKind> = state.extractor.engines().available();
    Json(json!({
        "status": "healthy",
        "timestamp": unix_timestamp(),
        "engines": engines,
    }))
}

#[derive(Debug, Default, serde::Deserialize)]
struct OcrQuery {
    engine: Option<String>,
    clean: Option<String>,
    fields: Option<String>,
}

/// Upload a document and recognize its text.
async fn ocr_document(
    State(state): State<AppState>,
    Query(query): Query<OcrQuery>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, ApiError> {
    let mut options = query;
    let mut filename = String::new();
    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().unwrap_or("document").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read file: {}", e)))?;
                file_data = Some(bytes.to_vec());
            }
            "engine" | "clean" | "fields" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read field '{}': {}", name, e)))?;
                match name.as_str() {
                    "engine" => options.engine = Some(value),
                    "clean" => options.clean = Some(value),
                    _ => options.fields = Some(value),
                }
            }
            _ => {}
        }
    }

    let data = file_data.ok_or_else(|| bad_request("No file uploaded"))?;
    if data.is_empty() {
        return Err(bad_request("Uploaded file is empty"));
    }

    let request = OcrRequest {
        filename,
        data,
        engine: options
            .engine
            .as_deref()
            .map(EngineChoice::from_param)
            .unwrap_or_default(),
        clean: flag(options.clean.as_deref(), "clean", true)?,
        extract_fields: flag(options.fields.as_deref(), "fields", false)?,
    };

    info!(
        "Received file: {} ({} bytes), engine={:?}, clean={}, fields={}",
        request.filename,
        request.data.len(),
        request.engine,
        request.clean,
        request.extract_fields
    );

    state.extractor.process(request).await.map(Json).map_err(|e| {
        error!("OCR processing failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("OCR processing failed: {}", e))),
        )
    })
}

/// Extract structured fields from already-recognized text.
async fn extract_fields(
    State(state): State<AppState>,
    Json(request): Json<FieldsRequest>,
) -> Json<StructuredFields> {
    Json(
        state
            .extractor
            .extract_fields(&request.text, request.clean, request.normalize),
    )
}

// ============================================================================
// Helper functions
// ============================================================================

fn bad_request(detail: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(detail)))
}

/// Parse a boolean request option.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn flag(value: Option<&str>, name: &str, default: bool) -> Result<bool, ApiError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => parse_flag(v)
            .ok_or_else(|| bad_request(format!("Invalid value for '{}': {}", name, v))),
    }
}
