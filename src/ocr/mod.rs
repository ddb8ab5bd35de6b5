//! OCR engine abstraction.
//!
//! Defines the [`OcrEngine`] trait, the engine identifiers, filename-based
//! engine selection and the [`EngineRegistry`] that holds the engines built
//! once at startup.

pub mod paddle;
pub mod tesseract;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::OcrError;

/// Known engine identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Tesseract,
    Paddle,
}

impl EngineKind {
    /// Wire name, as used in requests and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tesseract => "tesseract",
            Self::Paddle => "paddle",
        }
    }

    /// Human-readable name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Tesseract => "Tesseract OCR",
            Self::Paddle => "PaddleOCR",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineChoice {
    #[default]
    Auto,
    Fixed(EngineKind),
}

impl EngineChoice {
    /// Parse the `engine` request parameter. Unknown values fall back to
    /// Tesseract.
    pub fn from_param(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Self::Auto,
            "tesseract" => Self::Fixed(EngineKind::Tesseract),
            "paddle" => Self::Fixed(EngineKind::Paddle),
            other => {
                warn!("Unknown engine '{}', using tesseract", other);
                Self::Fixed(EngineKind::Tesseract)
            }
        }
    }

    /// Resolve to a concrete engine for `filename`.
    pub fn resolve(self, filename: &str) -> EngineKind {
        match self {
            Self::Auto => select_engine(filename),
            Self::Fixed(kind) => kind,
        }
    }
}

const DOCUMENT_EXTENSIONS: [&str; 3] = [".pdf", ".tif", ".tiff"];
const PHOTO_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// Pick an engine from the filename alone.
///
/// Scanned documents (PDF, TIFF) go to Tesseract, which has the Turkish
/// model; photos go to PaddleOCR, which copes better with layout and
/// rotation. Everything else defaults to Tesseract.
pub fn select_engine(filename: &str) -> EngineKind {
    let name = filename.to_lowercase();

    if DOCUMENT_EXTENSIONS.iter().any(|ext| name.contains(ext)) {
        info!("Selected Tesseract for document file {}", filename);
        return EngineKind::Tesseract;
    }
    if PHOTO_EXTENSIONS.iter().any(|ext| name.contains(ext)) {
        info!("Selected PaddleOCR for image file {}", filename);
        return EngineKind::Paddle;
    }

    info!("Selected Tesseract as default for {}", filename);
    EngineKind::Tesseract
}

/// Async trait implemented by each recognizer.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Recognize the text in an encoded image. Output is trimmed.
    async fn recognize(&self, image: Vec<u8>) -> Result<String, OcrError>;
}

/// Engines available to the pipeline, keyed by kind.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: HashMap<EngineKind, Arc<dyn OcrEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, engine: Arc<dyn OcrEngine>) {
        info!("Registered OCR engine: {}", engine.kind());
        self.engines.insert(engine.kind(), engine);
    }

    pub fn get(&self, kind: EngineKind) -> Result<Arc<dyn OcrEngine>, OcrError> {
        self.engines
            .get(&kind)
            .cloned()
            .ok_or(OcrError::Unavailable(kind))
    }

    /// Registered kinds, in a stable order.
    pub fn available(&self) -> Vec<EngineKind> {
        [EngineKind::Tesseract, EngineKind::Paddle]
            .into_iter()
            .filter(|k| self.engines.contains_key(k))
            .collect()
    }
}
