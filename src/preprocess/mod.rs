//! Image preprocessing ahead of recognition.
//!
//! PDF → first page raster, then grayscale, non-local-means denoising,
//! adaptive Gaussian threshold and deskew, re-encoded as PNG. Preprocessing
//! never fails: when a step cannot run, the original bytes go to the engine
//! unchanged and the reason is reported in [`Preprocessed::PassThrough`].

pub mod denoise;
pub mod deskew;
pub mod pdf;
pub mod threshold;

use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};

use image::{DynamicImage, GrayImage, ImageFormat};
use tracing::{info, warn};

use crate::config::PdfConfig;
use crate::input::is_pdf;
use denoise::{non_local_means, NlMeansParams};
use deskew::{estimate_skew, rotate, MIN_CORRECTION_DEGREES};
use pdf::PdfRasterizer;
use threshold::adaptive_gaussian_threshold;

const THRESHOLD_BLOCK_SIZE: u32 = 11;
const THRESHOLD_CONSTANT: i32 = 2;

/// Why preprocessing was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    PdfRender(String),
    Decode(String),
    Encode(String),
    Panicked(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PdfRender(e) => write!(f, "PDF conversion failed: {}", e),
            Self::Decode(e) => write!(f, "could not decode image: {}", e),
            Self::Encode(e) => write!(f, "could not encode processed image: {}", e),
            Self::Panicked(e) => write!(f, "image processing panicked: {}", e),
        }
    }
}

/// Outcome of preprocessing.
#[derive(Debug, Clone, PartialEq)]
pub enum Preprocessed {
    /// Binarized, deskewed page as PNG.
    Processed {
        png: Vec<u8>,
        /// Applied rotation in degrees, if any.
        deskew_angle: Option<f32>,
    },
    /// Original bytes, untouched.
    PassThrough { bytes: Vec<u8>, reason: SkipReason },
}

impl Preprocessed {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Processed { png, .. } => png,
            Self::PassThrough { bytes, .. } => bytes,
        }
    }

    #[cfg(test)]
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Runs the preprocessing chain. Blocking; call from `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    pdf: PdfRasterizer,
    denoise: NlMeansParams,
}

impl Preprocessor {
    pub fn new(pdf_config: &PdfConfig) -> Self {
        Self {
            pdf: PdfRasterizer::new(pdf_config),
            denoise: NlMeansParams::default(),
        }
    }

    pub fn pdf(&self) -> &PdfRasterizer {
        &self.pdf
    }

    pub fn run(&self, bytes: Vec<u8>) -> Preprocessed {
        let _span = tracing::info_span!("preprocess", bytes = bytes.len()).entered();

        let decoded = if is_pdf(&bytes) {
            info!("Detected PDF file, converting first page to image");
            match self.pdf.render_first_page(&bytes) {
                Ok(image) => image,
                Err(e) => return pass_through(bytes, SkipReason::PdfRender(e)),
            }
        } else {
            match image::load_from_memory(&bytes) {
                Ok(image) => image,
                Err(e) => return pass_through(bytes, SkipReason::Decode(e.to_string())),
            }
        };

        let processed = catch_unwind(AssertUnwindSafe(|| self.clean_page(&decoded)));
        let (page, deskew_angle) = match processed {
            Ok(result) => result,
            Err(payload) => {
                return pass_through(bytes, SkipReason::Panicked(panic_message(&*payload)))
            }
        };

        match encode_png(page) {
            Ok(png) => {
                info!("Image preprocessing completed ({} bytes PNG)", png.len());
                Preprocessed::Processed { png, deskew_angle }
            }
            Err(e) => pass_through(bytes, SkipReason::Encode(e)),
        }
    }

    /// Grayscale → denoise → threshold → deskew.
    fn clean_page(&self, image: &DynamicImage) -> (GrayImage, Option<f32>) {
        let gray = image.to_luma8();
        let denoised = non_local_means(&gray, self.denoise);
        let binary = adaptive_gaussian_threshold(&denoised, THRESHOLD_BLOCK_SIZE, THRESHOLD_CONSTANT);

        match estimate_skew(&binary) {
            Some(angle) if angle.abs() > MIN_CORRECTION_DEGREES => {
                info!("Deskewing by {:.2} degrees", angle);
                (rotate(&binary, angle), Some(angle))
            }
            _ => (binary, None),
        }
    }
}

fn pass_through(bytes: Vec<u8>, reason: SkipReason) -> Preprocessed {
    warn!("Skipping preprocessing: {}", reason);
    Preprocessed::PassThrough { bytes, reason }
}

fn encode_png(image: GrayImage) -> Result<Vec<u8>, String> {
    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(png)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Luma, Rgb, RgbImage};
    use std::path::PathBuf;

    fn preprocessor() -> Preprocessor {
        Preprocessor::new(&PdfConfig {
            library_path: Some(PathBuf::from("/nonexistent/libpdfium.so")),
            render_dpi: 200,
        })
    }

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Vec::new();
        image.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    /// Light page with a few dark "text lines".
    fn page() -> RgbImage {
        RgbImage::from_fn(48, 40, |x, y| {
            if (8..12).contains(&y) && (6..42).contains(&x) || (20..24).contains(&y) && (6..30).contains(&x) {
                Rgb([30, 30, 30])
            } else {
                Rgb([235, 235, 235])
            }
        })
    }

    #[test]
    fn test_png_is_processed_to_grayscale_png() {
        let input = encode(DynamicImage::ImageRgb8(page()), ImageFormat::Png);

        let result = preprocessor().run(input);
        assert!(result.is_processed());

        let output = image::load_from_memory(&result.into_bytes()).unwrap();
        assert_eq!(output.dimensions(), (48, 40));
        assert!(matches!(output, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_jpeg_is_processed() {
        let input = encode(DynamicImage::ImageRgb8(page()), ImageFormat::Jpeg);
        assert!(preprocessor().run(input).is_processed());
    }

    #[test]
    fn test_output_is_binarized() {
        let input = encode(DynamicImage::ImageRgb8(page()), ImageFormat::Png);
        let png = preprocessor().run(input).into_bytes();
        let gray = image::load_from_memory(&png).unwrap().to_luma8();
        assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(gray.get_pixel(20, 10), &Luma([0]));
    }

    #[test]
    fn test_corrupt_bytes_pass_through() {
        let input = b"definitely not an image".to_vec();
        match preprocessor().run(input.clone()) {
            Preprocessed::PassThrough { bytes, reason } => {
                assert_eq!(bytes, input);
                assert!(matches!(reason, SkipReason::Decode(_)));
            }
            other => panic!("expected pass-through, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_passes_through() {
        let result = preprocessor().run(Vec::new());
        assert_eq!(result.clone().into_bytes(), Vec::<u8>::new());
        assert!(!result.is_processed());
    }

    #[test]
    fn test_pdf_without_renderer_passes_through() {
        let input = b"%PDF-1.4\n% broken".to_vec();
        match preprocessor().run(input.clone()) {
            Preprocessed::PassThrough { bytes, reason } => {
                assert_eq!(bytes, input);
                assert!(matches!(reason, SkipReason::PdfRender(_)));
            }
            other => panic!("expected pass-through, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_png_passes_through() {
        let mut input = encode(DynamicImage::ImageRgb8(page()), ImageFormat::Png);
        input.truncate(input.len() / 2);
        assert!(!preprocessor().run(input).is_processed());
    }
}
