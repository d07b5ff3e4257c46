//! Block extraction via Google PDFium.
//!
//! Walks the page objects of every page: text objects become text blocks
//! (coalesced per line), image objects become image blocks whose raster is
//! cropped from a page render at the OCR resolution.
//!
//! `PdfiumBlockExtractor` is stateless. Each document load creates a fresh
//! `Pdfium` instance because the upstream type is `!Send`; the OS caches
//! the `dlopen`/`LoadLibrary` call, so repeat loads are near-free.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::blocks::{coalesce_text_lines, order_blocks};
use super::types::{Block, BlockExtractor, BlockRect, Page, SourceDocument};
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd DPI settings.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// Image regions smaller than this (in rendered pixels, either side) are
/// decorations such as rules and bullets, not readable content.
const MIN_REGION_PX: u32 = 8;

pub struct PdfiumBlockExtractor {
    dpi: u32,
}

impl PdfiumBlockExtractor {
    /// Create an extractor rendering image blocks at `dpi`, verifying the
    /// PDFium library is loadable.
    ///
    /// Discovery order:
    /// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to library file)
    /// 2. Alongside the running executable
    /// 3. System library search paths
    pub fn new(dpi: u32) -> Result<Self, ExtractionError> {
        let _ = load_pdfium()?;
        Ok(Self { dpi })
    }
}

fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| ExtractionError::PdfParsing(
            format!("Failed to load PDFium from {path}: {e}"),
        ))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidates = [exe_dir.to_path_buf(), exe_dir.join("lib")];
            for dir in &candidates {
                let lib_path =
                    Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::PdfParsing(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors, singling out encrypted documents.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let msg = format!("{e}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfParsing(format!("Failed to load PDF: {e}"))
    }
}

/// Compute pixel dimensions for rendering, applying the dimension guard.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

/// Render a whole page at `dpi` (dimension guard applied).
fn render_page(
    page: &PdfPage<'_>,
    index: usize,
    width_pt: f32,
    height_pt: f32,
    dpi: u32,
) -> Result<DynamicImage, ExtractionError> {
    let (target_w, target_h) = compute_render_dimensions(width_pt, height_pt, dpi);
    let config = PdfRenderConfig::new()
        .set_target_width(target_w as i32)
        .set_maximum_height(target_h as i32);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| ExtractionError::PdfRendering {
            page: index,
            reason: e.to_string(),
        })?;
    Ok(bitmap.as_image())
}

/// Pixel crop box for a block on a page rendered to `image_w` x `image_h`.
/// Returns `None` when the clamped region is too small to hold text.
fn crop_box(
    rect: &BlockRect,
    page_width_pt: f32,
    page_height_pt: f32,
    image_w: u32,
    image_h: u32,
) -> Option<(u32, u32, u32, u32)> {
    if page_width_pt <= 0.0 || page_height_pt <= 0.0 {
        return None;
    }
    let sx = image_w as f32 / page_width_pt;
    let sy = image_h as f32 / page_height_pt;

    let x0 = (rect.x0 * sx).floor().clamp(0.0, image_w as f32) as u32;
    let y0 = (rect.y0 * sy).floor().clamp(0.0, image_h as f32) as u32;
    let x1 = (rect.x1 * sx).ceil().clamp(0.0, image_w as f32) as u32;
    let y1 = (rect.y1 * sy).ceil().clamp(0.0, image_h as f32) as u32;

    let w = x1.saturating_sub(x0);
    let h = y1.saturating_sub(y0);
    if w < MIN_REGION_PX || h < MIN_REGION_PX {
        return None;
    }
    Some((x0, y0, w, h))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ExtractionError> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

impl BlockExtractor for PdfiumBlockExtractor {
    fn extract_blocks(&self, path: &Path) -> Result<SourceDocument, ExtractionError> {
        if !path.is_file() {
            return Err(ExtractionError::DocumentNotFound(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(map_load_error)?;

        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let width_pt = page.width().value;
            let height_pt = page.height().value;

            let mut fragments: Vec<(BlockRect, String)> = Vec::new();
            let mut image_rects: Vec<BlockRect> = Vec::new();

            for object in page.objects().iter() {
                let bounds = match object.bounds() {
                    Ok(bounds) => bounds,
                    Err(e) => {
                        debug!(page = index, error = %e, "Skipping page object without bounds");
                        continue;
                    }
                };
                let rect = BlockRect::from_pdf_bounds(
                    bounds.left().value,
                    bounds.top().value,
                    bounds.right().value,
                    bounds.bottom().value,
                    height_pt,
                );

                match object.object_type() {
                    PdfPageObjectType::Text => {
                        if let Some(text_object) = object.as_text_object() {
                            fragments.push((rect, text_object.text()));
                        }
                    }
                    PdfPageObjectType::Image => image_rects.push(rect),
                    _ => {}
                }
            }

            let mut blocks = coalesce_text_lines(fragments);

            if !image_rects.is_empty() {
                match render_page(&page, index, width_pt, height_pt, self.dpi) {
                    Ok(rendered) => {
                        for rect in &image_rects {
                            let Some((x, y, w, h)) =
                                crop_box(rect, width_pt, height_pt, rendered.width(), rendered.height())
                            else {
                                debug!(page = index, "Image region too small for OCR, skipped");
                                continue;
                            };
                            match encode_png(&rendered.crop_imm(x, y, w, h)) {
                                Ok(png) => blocks.push(Block::image(png, *rect)),
                                Err(e) => {
                                    warn!(document = %name, page = index, error = %e, "Image block dropped");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            document = %name,
                            page = index,
                            images = image_rects.len(),
                            error = %e,
                            "Page render failed; image blocks on this page are omitted"
                        );
                    }
                }
            }

            order_blocks(&mut blocks);
            debug!(document = %name, page = index, blocks = blocks.len(), "Page blocks extracted");
            pages.push(Page { index, blocks });
        }

        Ok(SourceDocument {
            name,
            path: path.to_path_buf(),
            pages,
        })
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Block extractor serving pre-built pages, keyed by file name.
///
/// Used by linearizer and processor tests that need a `BlockExtractor`
/// without requiring the actual PDFium binary. Unknown files fail the same
/// way a missing document does.
pub struct MockBlockExtractor {
    documents: Vec<(String, Vec<Page>)>,
}

impl MockBlockExtractor {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    pub fn with_document(mut self, name: &str, pages: Vec<Page>) -> Self {
        self.documents.push((name.to_string(), pages));
        self
    }
}

impl Default for MockBlockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockExtractor for MockBlockExtractor {
    fn extract_blocks(&self, path: &Path) -> Result<SourceDocument, ExtractionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let pages = self
            .documents
            .iter()
            .find(|(doc, _)| *doc == name)
            .map(|(_, pages)| pages.clone())
            .ok_or_else(|| ExtractionError::DocumentNotFound(path.to_path_buf()))?;

        let pages = pages
            .into_iter()
            .map(|mut page| {
                order_blocks(&mut page.blocks);
                page
            })
            .collect();

        Ok(SourceDocument {
            name,
            path: path.to_path_buf(),
            pages,
        })
    }
}
