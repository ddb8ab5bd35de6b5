//! PaddleOCR engine (ONNX models via `paddle-ocr-rs`).
//!
//! Detection, direction classification and recognition models are loaded
//! once. Orientation classification is always on, so rotated text lines are
//! read upright.

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::RgbImage;
use paddle_ocr_rs::ocr_lite::OcrLite;
use tracing::{debug, info};

use super::{EngineKind, OcrEngine};
use crate::config::PaddleConfig;
use crate::error::OcrError;

const PADDING: u32 = 50;
const BOX_SCORE_THRESH: f32 = 0.5;
const BOX_THRESH: f32 = 0.3;
const UNCLIP_RATIO: f32 = 1.6;
const MIN_SIDE_LEN: u32 = 1024;
const MAX_SIDE_LEN: u32 = 3072;

/// PaddleOCR handle with its three models loaded.
#[derive(Clone)]
pub struct PaddleEngine {
    inner: Arc<Mutex<OcrLite>>,
}

impl PaddleEngine {
    pub fn new(config: &PaddleConfig) -> Result<Self, OcrError> {
        let fail = |msg: String| OcrError::engine(EngineKind::Paddle, msg);

        for model in [&config.det_model, &config.cls_model, &config.rec_model] {
            if !model.exists() {
                return Err(fail(format!("model file not found: {}", model.display())));
            }
        }

        let det = path_str(&config.det_model);
        let cls = path_str(&config.cls_model);
        let rec = path_str(&config.rec_model);

        let mut ocr = OcrLite::new();
        match &config.keys_file {
            Some(keys) => ocr
                .init_models_with_dict(&det, &cls, &rec, &path_str(keys), config.threads)
                .map_err(|e| fail(format!("model init with dictionary failed: {}", e)))?,
            None => ocr
                .init_models(&det, &cls, &rec, config.threads)
                .map_err(|e| fail(format!("model init failed: {}", e)))?,
        }

        info!(
            "PaddleOCR initialized (det={}, rec={}, threads={})",
            det, rec, config.threads
        );
        Ok(Self {
            inner: Arc::new(Mutex::new(ocr)),
        })
    }

    fn recognize_blocking(inner: &Mutex<OcrLite>, image_data: &[u8]) -> Result<String, OcrError> {
        let fail = |msg: String| OcrError::engine(EngineKind::Paddle, msg);

        let image: RgbImage = image::load_from_memory(image_data)
            .map_err(|e| fail(format!("Failed to load image: {}", e)))?
            .to_rgb8();
        let max_side_len = image
            .width()
            .max(image.height())
            .clamp(MIN_SIDE_LEN, MAX_SIDE_LEN);

        let mut ocr = match inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = ocr
            .detect(
                &image,
                PADDING,
                max_side_len,
                BOX_SCORE_THRESH,
                BOX_THRESH,
                UNCLIP_RATIO,
                true,
                false,
            )
            .map_err(|e| fail(format!("detection failed: {}", e)))?;

        let lines: Vec<String> = result
            .text_blocks
            .into_iter()
            .map(|block| block.text)
            .collect();
        let text = join_lines(&lines);
        debug!(
            "PaddleOCR extracted {} characters from {} lines",
            text.len(),
            lines.len()
        );
        Ok(text)
    }
}

#[async_trait::async_trait]
impl OcrEngine for PaddleEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Paddle
    }

    async fn recognize(&self, image: Vec<u8>) -> Result<String, OcrError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || Self::recognize_blocking(&inner, &image))
            .await
            .map_err(|e| {
                OcrError::engine(EngineKind::Paddle, format!("recognition task failed: {}", e))
            })?
    }
}

/// Lines in detection order, one per row, trimmed as a whole.
fn join_lines(lines: &[String]) -> String {
    lines.join("\n").trim().to_string()
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
