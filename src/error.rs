//! Error types for the OCR pipeline.
//!
//! Only terminal failures live here. Degraded outcomes (undecodable uploads,
//! images that could not be preprocessed) are ordinary values, see
//! [`crate::input::Normalized`] and [`crate::preprocess::Preprocessed`].

use thiserror::Error;

use crate::ocr::EngineKind;

/// Failures raised by an OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The recognizer itself failed. The message is prefixed with the engine
    /// name, e.g. `Tesseract OCR failed: ...`.
    #[error("{} failed: {message}", .engine.label())]
    Engine { engine: EngineKind, message: String },

    /// The engine did not initialize at startup and is not registered.
    #[error("{} is not available on this server", .0.label())]
    Unavailable(EngineKind),
}

impl OcrError {
    pub fn engine(engine: EngineKind, message: impl Into<String>) -> Self {
        Self::Engine {
            engine,
            message: message.into(),
        }
    }
}

/// Failures of a whole `/ocr` request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ocr(#[from] OcrError),

    /// A blocking stage panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}
