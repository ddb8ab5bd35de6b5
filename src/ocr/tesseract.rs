//! Tesseract engine (leptess), tuned for Turkish + English documents.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use leptess::{LepTess, Variable};
use tracing::{debug, info};

use super::{EngineKind, OcrEngine};
use crate::config::TesseractConfig;
use crate::error::OcrError;

/// Page segmentation mode 6: a single uniform block of text.
const PAGE_SEG_MODE: &str = "6";

/// Tesseract handle, initialized once with its language models.
#[derive(Clone)]
pub struct TesseractEngine {
    inner: Arc<Mutex<LepTess>>,
    language: String,
}

impl TesseractEngine {
    /// Load the language models. This is the slow part and happens once.
    pub fn new(config: &TesseractConfig) -> Result<Self, OcrError> {
        let mut lt = LepTess::new(config.data_path.as_deref(), &config.language).map_err(|e| {
            OcrError::engine(
                EngineKind::Tesseract,
                format!("Failed to initialize Tesseract ({}): {}", config.language, e),
            )
        })?;

        lt.set_variable(Variable::TesseditPagesegMode, PAGE_SEG_MODE)
            .map_err(|e| {
                OcrError::engine(
                    EngineKind::Tesseract,
                    format!("Failed to set page segmentation mode: {}", e),
                )
            })?;

        info!("Tesseract initialized with language '{}'", config.language);
        Ok(Self {
            inner: Arc::new(Mutex::new(lt)),
            language: config.language.clone(),
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn recognize_blocking(inner: &Mutex<LepTess>, image_data: &[u8]) -> Result<String, OcrError> {
        let fail = |msg: String| OcrError::engine(EngineKind::Tesseract, msg);

        let png = to_rgb_png(image_data).map_err(fail)?;

        let mut lt = match inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        lt.set_image_from_mem(&png)
            .map_err(|e| fail(format!("Failed to set image for OCR: {}", e)))?;
        let text = lt
            .get_utf8_text()
            .map_err(|e| fail(format!("Failed to read recognized text: {}", e)))?;

        let text = text.trim().to_string();
        debug!("Tesseract extracted {} characters", text.len());
        Ok(text)
    }
}

#[async_trait::async_trait]
impl OcrEngine for TesseractEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Tesseract
    }

    async fn recognize(&self, image: Vec<u8>) -> Result<String, OcrError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || Self::recognize_blocking(&inner, &image))
            .await
            .map_err(|e| {
                OcrError::engine(EngineKind::Tesseract, format!("recognition task failed: {}", e))
            })?
    }
}

/// Decode any supported image and hand it over as RGB PNG.
fn to_rgb_png(image_data: &[u8]) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| format!("Failed to load image: {}", e))?;
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut png = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| format!("Failed to convert image: {}", e))?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    #[test]
    fn test_to_rgb_png_converts_grayscale() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 3, Luma([200])));
        let mut input = Vec::new();
        gray.write_to(&mut Cursor::new(&mut input), image::ImageFormat::Png)
            .unwrap();

        let png = to_rgb_png(&input).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert!(matches!(decoded, DynamicImage::ImageRgb8(_)));
        assert_eq!(decoded.width(), 4);
    }

    #[test]
    fn test_invalid_image_data_error() {
        let err = to_rgb_png(b"not valid image data").unwrap_err();
        assert!(err.contains("Failed to load image"));
    }

    #[test]
    fn test_missing_language_data_fails_init() {
        let config = TesseractConfig {
            data_path: Some("/nonexistent/tessdata".to_string()),
            language: "tur+eng".to_string(),
        };
        match TesseractEngine::new(&config) {
            Err(e) => assert!(e.to_string().starts_with("Tesseract OCR failed")),
            Ok(_) => panic!("expected init failure without tessdata"),
        }
    }
}
