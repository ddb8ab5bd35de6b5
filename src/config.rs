//! Service configuration loaded from the environment.
//!
//! Every setting has a default so the service starts with no `.env` at all.
//! Parsing goes through a lookup function; [`ServiceConfig::from_env`] wires
//! it to `std::env::var`.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_TESSERACT_LANG: &str = "tur+eng";
const DEFAULT_PADDLE_MODEL_DIR: &str = "models/paddle";
const DEFAULT_PADDLE_DET_MODEL: &str = "en_PP-OCRv3_det_infer.onnx";
const DEFAULT_PADDLE_CLS_MODEL: &str = "ch_ppocr_mobile_v2.0_cls_infer.onnx";
const DEFAULT_PADDLE_REC_MODEL: &str = "en_PP-OCRv3_rec_infer.onnx";
const DEFAULT_PADDLE_THREADS: usize = 2;
const DEFAULT_PDF_RENDER_DPI: u32 = 200;

/// Top-level configuration for the server.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub tesseract: TesseractConfig,
    pub paddle: PaddleConfig,
    pub pdf: PdfConfig,
}

/// Tesseract (leptess) settings.
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Directory holding `*.traineddata`. `None` uses the system default.
    pub data_path: Option<String>,
    pub language: String,
}

/// PaddleOCR ONNX model locations.
#[derive(Debug, Clone)]
pub struct PaddleConfig {
    pub det_model: PathBuf,
    pub cls_model: PathBuf,
    pub rec_model: PathBuf,
    /// Character dictionary for the recognition model, when it is not embedded.
    pub keys_file: Option<PathBuf>,
    pub threads: usize,
}

/// PDF rasterization settings.
#[derive(Debug, Clone)]
pub struct PdfConfig {
    /// Explicit pdfium shared library. `None` binds the system library.
    pub library_path: Option<PathBuf>,
    pub render_dpi: u32,
}

impl ServiceConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = parse_or(&get, "OCR_BIND_ADDR", || {
            SocketAddr::from_str(DEFAULT_BIND_ADDR).context("default bind address")
        })?;
        let max_upload_bytes =
            parse_or(&get, "OCR_MAX_UPLOAD_BYTES", || Ok(DEFAULT_MAX_UPLOAD_BYTES))?;

        let tesseract = TesseractConfig {
            data_path: get("TESSDATA_PREFIX"),
            language: get("OCR_TESSERACT_LANG").unwrap_or_else(|| DEFAULT_TESSERACT_LANG.to_string()),
        };

        let model_dir = PathBuf::from(
            get("PADDLE_MODEL_DIR").unwrap_or_else(|| DEFAULT_PADDLE_MODEL_DIR.to_string()),
        );
        let model_file = |key: &str, default: &str| {
            model_dir.join(get(key).unwrap_or_else(|| default.to_string()))
        };
        let paddle = PaddleConfig {
            det_model: model_file("PADDLE_DET_MODEL", DEFAULT_PADDLE_DET_MODEL),
            cls_model: model_file("PADDLE_CLS_MODEL", DEFAULT_PADDLE_CLS_MODEL),
            rec_model: model_file("PADDLE_REC_MODEL", DEFAULT_PADDLE_REC_MODEL),
            keys_file: get("PADDLE_KEYS_FILE").map(|f| model_dir.join(f)),
            threads: parse_or(&get, "PADDLE_THREADS", || Ok(DEFAULT_PADDLE_THREADS))?,
        };

        let pdf = PdfConfig {
            library_path: get("PDFIUM_LIBRARY_PATH").map(PathBuf::from),
            render_dpi: parse_or(&get, "PDF_RENDER_DPI", || Ok(DEFAULT_PDF_RENDER_DPI))?,
        };

        if paddle.threads == 0 {
            anyhow::bail!("PADDLE_THREADS must be at least 1");
        }
        if pdf.render_dpi == 0 {
            anyhow::bail!("PDF_RENDER_DPI must be at least 1");
        }

        Ok(Self {
            bind_addr,
            max_upload_bytes,
            tesseract,
            paddle,
            pdf,
        })
    }
}

/// Parse `key` with `FromStr`, falling back to `default` when unset.
fn parse_or<T, G, D>(get: &G, key: &str, default: D) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
    D: FnOnce() -> Result<T>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServiceConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.tesseract.language, "tur+eng");
        assert!(config.tesseract.data_path.is_none());
        assert_eq!(
            config.paddle.det_model,
            PathBuf::from("models/paddle/en_PP-OCRv3_det_infer.onnx")
        );
        assert!(config.paddle.keys_file.is_none());
        assert_eq!(config.pdf.render_dpi, 200);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("OCR_BIND_ADDR", "127.0.0.1:9100"),
            ("OCR_TESSERACT_LANG", "tur"),
            ("PADDLE_MODEL_DIR", "/opt/paddle"),
            ("PADDLE_REC_MODEL", "latin_rec.onnx"),
            ("PADDLE_KEYS_FILE", "latin_dict.txt"),
            ("PDF_RENDER_DPI", "300"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9100");
        assert_eq!(config.tesseract.language, "tur");
        assert_eq!(config.paddle.rec_model, PathBuf::from("/opt/paddle/latin_rec.onnx"));
        assert_eq!(
            config.paddle.keys_file,
            Some(PathBuf::from("/opt/paddle/latin_dict.txt"))
        );
        assert_eq!(config.pdf.render_dpi, 300);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config_from(&[("OCR_TESSERACT_LANG", "  ")]).unwrap();
        assert_eq!(config.tesseract.language, "tur+eng");
    }

    #[test]
    fn test_invalid_number_is_error() {
        let err = config_from(&[("PADDLE_THREADS", "many")]).unwrap_err();
        assert!(err.to_string().contains("PADDLE_THREADS"));

        assert!(config_from(&[("PADDLE_THREADS", "0")]).is_err());
    }
}
