//! OCR pipeline orchestrator.
//!
//! normalize upload → preprocess → pick engine → recognize → clean →
//! (optionally) extract fields. Any failure ends the request; nothing
//! partial is returned.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;
use uuid::Uuid;

use crate::cleaner::clean_text;
use crate::entities::{FieldExtractor, StructuredFields};
use crate::error::PipelineError;
use crate::input::normalize_upload;
use crate::ocr::{EngineChoice, EngineRegistry};
use crate::preprocess::{Preprocessed, Preprocessor};
use crate::schema::{ExtractionResult, OcrResponse};

/// One uploaded document plus the caller's options.
#[derive(Debug, Clone)]
pub struct OcrRequest {
    pub filename: String,
    pub data: Vec<u8>,
    pub engine: EngineChoice,
    pub clean: bool,
    pub extract_fields: bool,
}

/// Extraction pipeline orchestrator. Cheap to clone, shared by all handlers.
#[derive(Clone)]
pub struct Extractor {
    preprocessor: Arc<Preprocessor>,
    engines: Arc<EngineRegistry>,
    fields: Arc<FieldExtractor>,
}

impl Extractor {
    pub fn new(preprocessor: Preprocessor, engines: EngineRegistry, fields: FieldExtractor) -> Self {
        Self {
            preprocessor: Arc::new(preprocessor),
            engines: Arc::new(engines),
            fields: Arc::new(fields),
        }
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    /// Run the whole pipeline for one document.
    pub async fn process(&self, request: OcrRequest) -> Result<OcrResponse, PipelineError> {
        let start = Instant::now();
        let request_id = Uuid::new_v4();
        info!(
            "[{}] Processing file: {} ({} bytes)",
            request_id,
            request.filename,
            request.data.len()
        );

        let normalized = normalize_upload(request.data);
        info!(
            "[{}] Upload encoding: {} ({} bytes)",
            request_id,
            normalized.encoding(),
            normalized.as_bytes().len()
        );

        let preprocessor = Arc::clone(&self.preprocessor);
        let bytes = normalized.into_bytes();
        let preprocessed = tokio::task::spawn_blocking(move || preprocessor.run(bytes))
            .await
            .map_err(|e| PipelineError::Internal(format!("preprocessing task failed: {}", e)))?;
        match &preprocessed {
            Preprocessed::Processed {
                deskew_angle: Some(angle),
                ..
            } => info!("[{}] Page deskewed by {:.2} degrees", request_id, angle),
            Preprocessed::Processed { .. } => {}
            Preprocessed::PassThrough { reason, .. } => {
                info!("[{}] Sending original bytes to the engine ({})", request_id, reason)
            }
        }

        let kind = request.engine.resolve(&request.filename);
        let engine = self.engines.get(kind)?;

        let recognize_start = Instant::now();
        let raw = engine.recognize(preprocessed.into_bytes()).await?;
        let extraction = ExtractionResult {
            engine: kind,
            text: raw,
            elapsed: recognize_start.elapsed(),
        };
        info!(
            "[{}] {} extracted {} characters in {:.2}s",
            request_id,
            extraction.engine,
            extraction.text.len(),
            extraction.elapsed.as_secs_f64()
        );

        let text = if request.clean {
            clean_text(&extraction.text)
        } else {
            extraction.text
        };

        let fields = request.extract_fields.then(|| self.fields.extract(&text));

        let processing_time = start.elapsed().as_secs_f64();
        info!("[{}] OCR completed in {:.2}s", request_id, processing_time);

        Ok(OcrResponse {
            success: true,
            text,
            engine: extraction.engine,
            processing_time,
            filename: request.filename,
            fields,
        })
    }

    /// Field extraction for text that has already been recognized.
    pub fn extract_fields(&self, text: &str, clean: bool, normalize: bool) -> StructuredFields {
        let fields = if clean {
            self.fields.extract(&clean_text(text))
        } else {
            self.fields.extract(text)
        };
        if normalize {
            fields.normalized()
        } else {
            fields
        }
    }
}
