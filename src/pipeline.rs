//! Export pipeline – activates each page in turn, rasterizes it and
//! assembles the rasters into a single multi-page PDF.

use serde::{Deserialize, Serialize};

use crate::editor::Editor;
use crate::error::{EditorError, ExportError, Notice};
use crate::raster::{PageRasterizer, RasterContext};
use crate::render::assemble_pdf;

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Configuration for the PDF export.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Document title embedded in the PDF metadata (default: "Relatório").
    pub title: String,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Overrides the document's orientation when set.
    pub orientation: Option<PageOrientation>,
    /// Raster pixels per canvas unit (default: 2).
    pub scale: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: "Relatório".to_string(),
            page_width: 595.28,
            page_height: 841.89,
            orientation: None,
            scale: 2.0,
        }
    }
}

impl ExportConfig {
    /// Effective page width after applying orientation.
    pub fn effective_width(&self, orientation: PageOrientation) -> f32 {
        match orientation {
            PageOrientation::Portrait => self.page_width,
            PageOrientation::Landscape => self.page_height,
        }
    }

    /// Effective page height after applying orientation.
    pub fn effective_height(&self, orientation: PageOrientation) -> f32 {
        match orientation {
            PageOrientation::Portrait => self.page_height,
            PageOrientation::Landscape => self.page_width,
        }
    }

    /// Create an A4 landscape config.
    pub fn a4_landscape() -> Self {
        Self {
            orientation: Some(PageOrientation::Landscape),
            ..Self::default()
        }
    }
}

/// Full export: every page of `editor`'s document → PDF bytes.
///
/// Pages are processed strictly in order. Each one is made the active page
/// (which clears the selection, so no handles end up in the output) before
/// it is rasterized. Any failure aborts the whole export with a blocking
/// notice and no bytes. The page that was active before the export is
/// active again afterwards, whatever the outcome.
pub fn export_pdf(
    editor: &mut Editor,
    rasterizer: &mut dyn PageRasterizer,
    config: &ExportConfig,
) -> Result<Vec<u8>, EditorError> {
    let previous = editor.active_page_index();
    let result = rasterize_all(editor, rasterizer, config);
    editor.select_page(previous);

    match result {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            let err = EditorError::from(err);
            log::warn!("export aborted: {err}");
            editor.push_notice(Notice::from(&err));
            Err(err)
        }
    }
}

fn rasterize_all(
    editor: &mut Editor,
    rasterizer: &mut dyn PageRasterizer,
    config: &ExportConfig,
) -> Result<Vec<u8>, ExportError> {
    let orientation = config.orientation.unwrap_or(editor.document().orientation);
    let canvas = match orientation {
        PageOrientation::Portrait => editor.config().canvas,
        PageOrientation::Landscape => editor.config().canvas.rotated(),
    };

    let page_count = editor.document().page_count();
    let mut rasters = Vec::with_capacity(page_count);
    for index in 0..page_count {
        editor.select_page(index);
        let page = editor
            .document()
            .page(index)
            .ok_or_else(|| ExportError::Rasterize {
                page: index,
                reason: "page disappeared during export".to_string(),
            })?;
        let ctx = RasterContext {
            canvas,
            scale: config.scale,
            page_index: index,
        };
        rasters.push(rasterizer.rasterize(page, &ctx)?);
    }

    let bytes = assemble_pdf(
        &config.title,
        config.effective_width(orientation),
        config.effective_height(orientation),
        &rasters,
    )?;
    log::info!("exported {page_count} page(s) ({orientation:?})");
    Ok(bytes)
}
