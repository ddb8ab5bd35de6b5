//! First-page PDF rasterization via pdfium.
//!
//! pdfium is bound per call on the current (blocking) thread. A missing
//! library is an ordinary error; the caller treats it as "skip PDF
//! conversion".

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::PdfConfig;

/// Renders the first page of a PDF to an image.
#[derive(Debug, Clone)]
pub struct PdfRasterizer {
    library_path: Option<PathBuf>,
    dpi: u32,
}

impl PdfRasterizer {
    pub fn new(config: &PdfConfig) -> Self {
        Self {
            library_path: config.library_path.clone(),
            dpi: config.render_dpi,
        }
    }

    /// Check once whether pdfium can be bound, for the startup log.
    pub fn probe(&self) -> bool {
        match self.bind() {
            Ok(_) => {
                info!("pdfium available, PDFs render at {} DPI", self.dpi);
                true
            }
            Err(e) => {
                warn!("pdfium not available ({}), PDF uploads will skip preprocessing", e);
                false
            }
        }
    }

    /// Render page 1 of `pdf` at the configured DPI.
    pub fn render_first_page(&self, pdf: &[u8]) -> Result<DynamicImage, String> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| format!("failed to load PDF: {:?}", e))?;

        let pages = document.pages();
        if pages.len() == 0 {
            return Err("PDF has no pages".to_string());
        }
        let page = pages
            .get(0)
            .map_err(|e| format!("failed to open page 1: {:?}", e))?;

        let render_config =
            PdfRenderConfig::new().scale_page_by_factor(self.dpi as f32 / 72.0);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| format!("failed to render page 1: {:?}", e))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered PDF page 1 → {}x{} px ({} pages total)",
            image.width(),
            image.height(),
            pages.len()
        );
        Ok(image)
    }

    fn bind(&self) -> Result<Pdfium, String> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| format!("pdfium library unavailable: {:?}", e))?;
        Ok(Pdfium::new(bindings))
    }
}
