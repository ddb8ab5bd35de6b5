//! Request and response payload types.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::entities::StructuredFields;
use crate::ocr::EngineKind;

/// Seconds since the Unix epoch, with sub-second precision.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Text produced by one engine run.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub engine: EngineKind,
    pub text: String,
    pub elapsed: Duration,
}

/// Successful `/ocr` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResponse {
    pub success: bool,
    pub text: String,
    pub engine: EngineKind,
    /// Wall-clock seconds for the whole pipeline.
    pub processing_time: f64,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<StructuredFields>,
}

/// Error payload for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Body of `POST /fields`.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldsRequest {
    pub text: String,
    /// Run the text cleaner first.
    #[serde(default)]
    pub clean: bool,
    /// Normalize dates, phone numbers and amounts.
    #[serde(default)]
    pub normalize: bool,
}
