//! Slide extraction: PDF → ordered [`SlideUnit`]s.
//!
//! Each page becomes one slide carrying its text, a count of visual
//! elements (image and vector-path objects) and, when vision is enabled, a
//! PNG rendering of the whole page. Text-only slides are rendered too so
//! that layout and emphasis still reach a vision model.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not run on a Tokio worker. The whole document is handled
//! on one blocking-pool thread.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Slides are usually 10 in wide, but exported posters and scanned handouts
//! are not. `max_rendered_pixels` caps the longest edge regardless of the
//! page's physical size.

use crate::config::NotesConfig;
use crate::error::NotesError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use futures::future::BoxFuture;
use image::DynamicImage;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One slide's extracted content. Indices are 1-based and contiguous.
#[derive(Debug, Clone)]
pub struct SlideUnit {
    pub index: usize,
    pub text: String,
    pub image: Option<ImageData>,
    pub visual_elements: usize,
}

impl SlideUnit {
    /// A text-only slide, mostly useful for tests and fakes.
    pub fn text_only(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            image: None,
            visual_elements: 0,
        }
    }

    pub fn has_visuals(&self) -> bool {
        self.visual_elements > 0
    }
}

/// Turns one input file into its slides.
///
/// Extraction is not resumable; a resumed run extracts again and skips the
/// slides already done.
pub trait SlideExtractor: Send + Sync {
    fn extract<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<SlideUnit>, NotesError>>;
}

/// [`SlideExtractor`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumExtractor {
    dpi: u32,
    max_pixels: u32,
    password: Option<String>,
    render_images: bool,
}

impl PdfiumExtractor {
    pub fn from_config(config: &NotesConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            render_images: config.vision,
        }
    }
}

impl SlideExtractor for PdfiumExtractor {
    fn extract<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<SlideUnit>, NotesError>> {
        let path = path.to_path_buf();
        let this = self.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || this.extract_blocking(&path))
                .await
                .map_err(|e| NotesError::Internal(format!("Extraction task panicked: {}", e)))?
        })
    }
}

impl PdfiumExtractor {
    fn extract_blocking(&self, pdf_path: &Path) -> Result<Vec<SlideUnit>, NotesError> {
        let pdfium = pdfium_auto::bind_pdfium_silent()
            .map_err(|e| NotesError::PdfiumBindingFailed(e.to_string()))?;

        let password = self.password.as_deref();
        let document = pdfium
            .load_pdf_from_file(pdf_path, password)
            .map_err(|e| map_load_error(pdf_path, password.is_some(), e))?;

        let pages = document.pages();
        let total = pages.len() as usize;
        info!("PDF loaded: {} slides", total);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut slides = Vec::with_capacity(total);
        for (i, page) in pages.iter().enumerate() {
            let index = i + 1;

            let text = page
                .text()
                .map(|t| clean_text(&t.all()))
                .map_err(|e| NotesError::ExtractionFailed {
                    path: pdf_path.to_path_buf(),
                    detail: format!("slide {index}: {e:?}"),
                })?;

            let visual_elements = page
                .objects()
                .iter()
                .filter(|o| {
                    matches!(
                        o.object_type(),
                        PdfPageObjectType::Image | PdfPageObjectType::Path
                    )
                })
                .count();

            let image = if self.render_images {
                render_slide(&page, &render_config, index)
            } else {
                None
            };

            debug!(
                slide = index,
                chars = text.len(),
                visual_elements,
                rendered = image.is_some(),
                "Extracted slide"
            );
            slides.push(SlideUnit {
                index,
                text,
                image,
                visual_elements,
            });
        }

        let with_visuals = slides.iter().filter(|s| s.has_visuals()).count();
        info!(
            "Extracted {} slides from {} ({} with visual content)",
            slides.len(),
            pdf_path.display(),
            with_visuals
        );
        Ok(slides)
    }
}

/// Rasterise and encode one page. A failure only costs the image.
fn render_slide(page: &PdfPage, config: &PdfRenderConfig, index: usize) -> Option<ImageData> {
    let bitmap = match page.render_with_config(config) {
        Ok(b) => b,
        Err(e) => {
            warn!(slide = index, "Failed to render slide: {e:?}");
            return None;
        }
    };
    let image = bitmap.as_image();
    debug!(slide = index, "Rendered slide → {}x{} px", image.width(), image.height());
    match encode_page(&image) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(slide = index, "Failed to encode slide image: {e}");
            None
        }
    }
}

fn map_load_error(path: &Path, had_password: bool, e: PdfiumError) -> NotesError {
    let err_str = format!("{:?}", e);
    let path: PathBuf = path.to_path_buf();
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            NotesError::WrongPassword { path }
        } else {
            NotesError::PasswordRequired { path }
        }
    } else {
        NotesError::CorruptPdf {
            path,
            detail: err_str,
        }
    }
}

/// Encode a rendered page as a base64 PNG ready for a vision request.
///
/// PNG keeps rendered text crisp; `detail: "high"` lets GPT-4-class models
/// tile the image instead of downscaling it to one overview tile.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    let b64 = STANDARD.encode(&buf);
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse all whitespace runs to single spaces and trim.
pub fn clean_text(raw: &str) -> String {
    WHITESPACE_RE.replace_all(raw, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Quarterly\n\n  Results\t2026 "), "Quarterly Results 2026");
        assert_eq!(clean_text("\n\t "), "");
    }

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn text_only_unit_has_no_visuals() {
        let s = SlideUnit::text_only(1, "Agenda");
        assert!(!s.has_visuals());
        assert!(s.image.is_none());
    }

    #[test]
    fn extractor_follows_config() {
        let config = NotesConfig::builder().dpi(200).vision(false).build().unwrap();
        let x = PdfiumExtractor::from_config(&config);
        assert_eq!(x.dpi, 200);
        assert!(!x.render_images);
    }
}
