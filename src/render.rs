//! PDF assembly – takes one raster per page and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API). Each raster is embedded as a single
//! image XObject stretched over the whole page.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, XObjectTransform,
};

use crate::error::ExportError;

const PT_TO_MM: f32 = 0.352778;

/// Build a PDF with one page per raster, in order. Pages are
/// `page_width_pt` × `page_height_pt`.
pub fn assemble_pdf(
    title: &str,
    page_width_pt: f32,
    page_height_pt: f32,
    rasters: &[RgbaImage],
) -> Result<Vec<u8>, ExportError> {
    if rasters.is_empty() {
        return Err(ExportError::Assemble("no pages to export".to_string()));
    }
    if !(page_width_pt > 0.0 && page_height_pt > 0.0) {
        return Err(ExportError::Assemble(format!(
            "invalid page size {page_width_pt}x{page_height_pt} pt"
        )));
    }

    let page_w = Mm(page_width_pt * PT_TO_MM);
    let page_h = Mm(page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(title);
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();
    let mut pages = Vec::with_capacity(rasters.len());

    for (index, raster) in rasters.iter().enumerate() {
        let png = encode_png(raster).map_err(|reason| ExportError::Encode {
            page: index,
            reason,
        })?;
        let raw = RawImage::decode_from_bytes(&png, &mut img_warnings).map_err(|e| {
            ExportError::Encode {
                page: index,
                reason: e.to_string(),
            }
        })?;
        let xobj_id = doc.add_image(&raw);

        // At dpi=72 printpdf maps 1 px to 1 pt, so scale = page_pt / px.
        let scale_x = page_width_pt / raster.width().max(1) as f32;
        let scale_y = page_height_pt / raster.height().max(1) as f32;

        let ops = vec![Op::UseXobject {
            id: xobj_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                dpi: Some(72.0),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                rotate: None,
            },
        }];
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    for warning in &img_warnings {
        log::debug!("pdf image warning: {warning:?}");
    }

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    log::info!("assembled {} page(s), {} bytes", rasters.len(), bytes.len());
    Ok(bytes)
}

/// PNG bytes of `raster` with the alpha channel dropped; pages are opaque.
fn encode_png(raster: &RgbaImage) -> Result<Vec<u8>, String> {
    let rgb = DynamicImage::ImageRgba8(raster.clone()).to_rgb8();
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| format!("PNG encode error: {e}"))?;
    Ok(out.into_inner())
}
