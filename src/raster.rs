//! Page rasterization.
//!
//! A [`PageRasterizer`] turns one page into an RGBA bitmap at the export
//! scale. [`SoftwareRasterizer`] is the built-in implementation: a white
//! canvas with every element painted in paint order, images scaled to the
//! element width and text drawn with the bitmap faces from [`crate::fonts`].
//! Painting is clipped to the canvas before any pixel work, so an element's
//! cost is bounded by the part of it that lands on the page.

use std::collections::HashMap;

use image::{Rgba, RgbaImage};

use crate::config::CanvasSize;
use crate::document::Page;
use crate::element::{Element, ElementContent, TextContent};
use crate::error::ExportError;
use crate::fonts::{wrap_text, FontManager, FontMetrics, GlyphFace};
use crate::ingest::decode_data_uri;
use crate::library::AssetStore;

/// Largest raster edge, in pixels.
pub const MAX_RASTER_EDGE: u32 = 16_384;

/// Inner padding of a text box, in canvas units.
pub const TEXT_PADDING: f32 = 4.0;

/// Horizontal shear applied to italic glyphs (x offset per unit of height).
const ITALIC_SHEAR: f32 = 0.2;

const PLACEHOLDER_FILL: Rgba<u8> = Rgba([253, 236, 236, 255]);
const PLACEHOLDER_STROKE: Rgba<u8> = Rgba([220, 38, 38, 255]);

/// Everything a rasterizer needs to know besides the page itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterContext {
    /// Canvas size with orientation already applied.
    pub canvas: CanvasSize,
    /// Raster pixels per canvas unit.
    pub scale: f32,
    /// Index of the page in the document, for error reporting.
    pub page_index: usize,
}

impl RasterContext {
    /// Pixel dimensions of the output raster.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.canvas.width * self.scale).round() as u32,
            (self.canvas.height * self.scale).round() as u32,
        )
    }
}

/// Converts a page into a bitmap.
pub trait PageRasterizer {
    fn rasterize(&mut self, page: &Page, ctx: &RasterContext) -> Result<RgbaImage, ExportError>;
}

/// Built-in CPU rasterizer.
#[derive(Debug, Default)]
pub struct SoftwareRasterizer {
    assets: AssetStore,
    fonts: FontManager,
    /// Decoded images keyed by source; `None` marks a source that failed.
    decoded: HashMap<String, Option<RgbaImage>>,
}

impl SoftwareRasterizer {
    pub fn new(assets: AssetStore) -> Self {
        Self {
            assets,
            fonts: FontManager::new(),
            decoded: HashMap::new(),
        }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Decoded bitmap for an image element, or `None` when it cannot be
    /// resolved. Each source is decoded once per rasterizer.
    fn image_for(&mut self, element: &Element) -> Option<&RgbaImage> {
        let key = element.image_source_key()?;
        if !self.decoded.contains_key(&key) {
            let decoded = self.decode(element);
            if decoded.is_none() {
                log::warn!("{}: image unavailable, painting placeholder", element.id);
            }
            self.decoded.insert(key.clone(), decoded);
        }
        self.decoded.get(&key).and_then(Option::as_ref)
    }

    fn decode(&self, element: &Element) -> Option<RgbaImage> {
        let bytes: Option<Vec<u8>> = match &element.content {
            ElementContent::ChartImage { chart } => self.assets.chart(chart).map(<[u8]>::to_vec),
            ElementContent::ExternalImage { src, .. } if src.starts_with("data:") => {
                match decode_data_uri(src) {
                    Ok(b) => Some(b),
                    Err(e) => {
                        log::warn!("{}: {e}", element.id);
                        None
                    }
                }
            }
            ElementContent::ExternalImage { src, .. } => self.assets.url(src).map(<[u8]>::to_vec),
            ElementContent::Text(_) => None,
        };

        bytes.and_then(|b| match image::load_from_memory(&b) {
            Ok(img) => Some(img.to_rgba8()),
            Err(e) => {
                log::warn!("{}: image decode error: {e}", element.id);
                None
            }
        })
    }

    fn paint_image(&mut self, canvas: &mut RgbaImage, element: &Element, scale: f32) {
        let bounds = PixelRect::of(canvas);
        let x = (element.x * scale).round() as i64;
        let y = (element.y * scale).round() as i64;
        let width = ((element.width * scale).round() as i64).max(1);

        match self.image_for(element) {
            Some(source) if source.width() > 0 && source.height() > 0 => {
                let aspect = source.height() as f64 / source.width() as f64;
                let height = ((width as f64 * aspect).round() as i64).max(1);
                let dest = PixelRect::sized(x, y, width, height);
                if let Some(visible) = dest.intersect(&bounds) {
                    draw_scaled(canvas, source, &dest, &visible);
                }
            }
            _ => {
                let height = ((element.height * scale).round() as i64).max(1);
                let dest = PixelRect::sized(x, y, width, height);
                if let Some(visible) = dest.intersect(&bounds) {
                    let stroke = (2.0 * scale).max(1.0) as i64;
                    paint_placeholder(canvas, &dest, &visible, stroke);
                }
            }
        }
    }

    fn paint_text(&mut self, canvas: &mut RgbaImage, element: &Element, text: &TextContent, scale: f32) {
        let element_box = PixelRect {
            x0: (element.x * scale).floor() as i64,
            y0: (element.y * scale).floor() as i64,
            x1: ((element.x + element.width) * scale).ceil() as i64,
            y1: ((element.y + element.height) * scale).ceil() as i64,
        };
        let Some(clip) = element_box.intersect(&PixelRect::of(canvas)) else {
            return;
        };

        let style = &text.style;
        let metrics = FontMetrics::for_size(style.font_size);
        let inner_width = element.width - 2.0 * TEXT_PADDING;
        let lines = wrap_text(&text.content, style.font_size, inner_width, &self.fonts);
        let color = Rgba(style.color.to_rgba());

        let cell_w = metrics.advance * scale;
        let cell_h = style.font_size * scale;
        let face = GlyphFace::for_pixel_height(cell_h);
        let bold_offset = (scale * style.font_size / 16.0).round().max(1.0) as i64;
        let underline_thickness = (scale * style.font_size / 16.0).round().max(1.0) as i64;
        let shear_span = if style.italic { cell_h * ITALIC_SHEAR } else { 0.0 };
        // Bold strikes a second copy `bold_offset` to the right, so ink left
        // of the clip can still land inside it.
        let ink_x0 = clip.x0 - if style.bold { bold_offset } else { 0 };

        for (line_no, line) in lines.iter().enumerate() {
            let line_top = element.y + TEXT_PADDING + line_no as f32 * metrics.line_height;
            if line_top * scale >= clip.y1 as f32 {
                break;
            }
            let cell_top = (line_top + metrics.leading) * scale;
            let py_start = (cell_top.floor() as i64).max(clip.y0);
            let py_end = ((cell_top + cell_h).ceil() as i64).min(clip.y1);
            let left = (element.x + TEXT_PADDING) * scale;

            if py_start < py_end {
                for (col, ch) in line.chars().enumerate() {
                    let gx0 = left + col as f32 * cell_w;
                    let px_start = (gx0.floor() as i64).max(ink_x0);
                    let px_end = ((gx0 + cell_w + shear_span).ceil() as i64).min(clip.x1);
                    if gx0.floor() as i64 >= clip.x1 {
                        break;
                    }
                    if px_start >= px_end {
                        continue;
                    }
                    let glyph = self.fonts.glyph(face, ch);

                    for py in py_start..py_end {
                        let v = (py as f32 + 0.5 - cell_top) / cell_h;
                        let shear = if style.italic { (1.0 - v) * shear_span } else { 0.0 };
                        for px in px_start..px_end {
                            let u = (px as f32 + 0.5 - gx0 - shear) / cell_w;
                            if glyph.sample(u, v) {
                                clip.put(canvas, px, py, color);
                                if style.bold {
                                    clip.put(canvas, px + bold_offset, py, color);
                                }
                            }
                        }
                    }
                }
            }

            if style.underline && !line.is_empty() {
                let base = (cell_top + cell_h * 0.92).round() as i64;
                let x_start = (left.round() as i64).max(clip.x0);
                let x_end = ((left + line.chars().count() as f32 * cell_w).round() as i64).min(clip.x1);
                let y_start = base.max(clip.y0);
                let y_end = base.saturating_add(underline_thickness).min(clip.y1);
                for py in y_start..y_end {
                    for px in x_start..x_end {
                        clip.put(canvas, px, py, color);
                    }
                }
            }
        }
    }
}

impl PageRasterizer for SoftwareRasterizer {
    fn rasterize(&mut self, page: &Page, ctx: &RasterContext) -> Result<RgbaImage, ExportError> {
        if !(ctx.scale.is_finite() && ctx.scale > 0.0) {
            return Err(ExportError::Rasterize {
                page: ctx.page_index,
                reason: format!("invalid raster scale {}", ctx.scale),
            });
        }
        let (width, height) = ctx.pixel_size();
        if width == 0 || height == 0 || width > MAX_RASTER_EDGE || height > MAX_RASTER_EDGE {
            return Err(ExportError::Rasterize {
                page: ctx.page_index,
                reason: format!("raster size {width}x{height} is out of bounds"),
            });
        }

        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        for element in &page.elements {
            match &element.content {
                ElementContent::Text(text) => self.paint_text(&mut canvas, element, text, ctx.scale),
                _ => self.paint_image(&mut canvas, element, ctx.scale),
            }
        }
        log::debug!(
            "rasterized {} ({} elements) at {width}x{height}",
            page.id,
            page.len()
        );
        Ok(canvas)
    }
}

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl PixelRect {
    fn of(canvas: &RgbaImage) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: canvas.width() as i64,
            y1: canvas.height() as i64,
        }
    }

    fn sized(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x.saturating_add(width),
            y1: y.saturating_add(height),
        }
    }

    fn width(&self) -> f64 {
        self.x1 as f64 - self.x0 as f64
    }

    fn height(&self) -> f64 {
        self.y1 as f64 - self.y0 as f64
    }

    fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let r = PixelRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (r.x0 < r.x1 && r.y0 < r.y1).then_some(r)
    }

    /// Write `color` at (`x`, `y`) if it lies inside. Only used with
    /// rectangles already intersected with the canvas.
    fn put(&self, canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
        if x < self.x0 || y < self.y0 || x >= self.x1 || y >= self.y1 {
            return;
        }
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

/// Paint the `visible` part of `source` stretched over `dest`, sampling the
/// source once per canvas pixel: bilinear when magnifying, a box average
/// over the covered source pixels when minifying.
fn draw_scaled(canvas: &mut RgbaImage, source: &RgbaImage, dest: &PixelRect, visible: &PixelRect) {
    let kx = source.width() as f64 / dest.width();
    let ky = source.height() as f64 / dest.height();

    for py in visible.y0..visible.y1 {
        let fy0 = (py as f64 - dest.y0 as f64) * ky;
        for px in visible.x0..visible.x1 {
            let fx0 = (px as f64 - dest.x0 as f64) * kx;
            let rgba = if kx <= 1.0 && ky <= 1.0 {
                bilinear(source, fx0 + kx / 2.0 - 0.5, fy0 + ky / 2.0 - 0.5)
            } else {
                box_average(source, fx0, fx0 + kx, fy0, fy0 + ky)
            };
            blend(canvas.get_pixel_mut(px as u32, py as u32), rgba);
        }
    }
}

fn bilinear(source: &RgbaImage, sx: f64, sy: f64) -> [f64; 4] {
    let max_x = (source.width() - 1) as f64;
    let max_y = (source.height() - 1) as f64;
    let sx = sx.clamp(0.0, max_x);
    let sy = sy.clamp(0.0, max_y);
    let (x0, y0) = (sx.floor(), sy.floor());
    let (x1, y1) = ((x0 + 1.0).min(max_x), (y0 + 1.0).min(max_y));
    let (tx, ty) = (sx - x0, sy - y0);

    let p = |x: f64, y: f64| source.get_pixel(x as u32, y as u32).0;
    let (a, b, c, d) = (p(x0, y0), p(x1, y0), p(x0, y1), p(x1, y1));
    let mut out = [0.0; 4];
    for (i, v) in out.iter_mut().enumerate() {
        let top = a[i] as f64 * (1.0 - tx) + b[i] as f64 * tx;
        let bottom = c[i] as f64 * (1.0 - tx) + d[i] as f64 * tx;
        *v = top * (1.0 - ty) + bottom * ty;
    }
    out
}

fn box_average(source: &RgbaImage, fx0: f64, fx1: f64, fy0: f64, fy1: f64) -> [f64; 4] {
    let span = |lo: f64, hi: f64, len: u32| {
        let start = (lo.floor().max(0.0) as u32).min(len - 1);
        let end = (hi.ceil().max(0.0) as u32).clamp(start + 1, len);
        start..end
    };
    let xs = span(fx0, fx1, source.width());
    let ys = span(fy0, fy1, source.height());

    let mut sum = [0.0; 4];
    let mut n = 0.0;
    for y in ys {
        for x in xs.clone() {
            let p = source.get_pixel(x, y).0;
            for (s, c) in sum.iter_mut().zip(p) {
                *s += c as f64;
            }
            n += 1.0;
        }
    }
    sum.map(|s| s / n)
}

/// Source-over onto the opaque canvas.
fn blend(dst: &mut Rgba<u8>, src: [f64; 4]) {
    let alpha = (src[3] / 255.0).clamp(0.0, 1.0);
    for i in 0..3 {
        let v = src[i] * alpha + dst.0[i] as f64 * (1.0 - alpha);
        dst.0[i] = v.round().clamp(0.0, 255.0) as u8;
    }
}

/// Broken-image box over `dest`: light fill with a red frame and a diagonal
/// cross. Only the `visible` part is painted.
fn paint_placeholder(canvas: &mut RgbaImage, dest: &PixelRect, visible: &PixelRect, stroke: i64) {
    let (w, h, s) = (dest.width(), dest.height(), stroke as f64);
    let tol = s * w.max(h);
    for py in visible.y0..visible.y1 {
        let dy = py as f64 - dest.y0 as f64;
        for px in visible.x0..visible.x1 {
            let dx = px as f64 - dest.x0 as f64;
            let on_frame = dx < s || dy < s || dx >= w - s || dy >= h - s;
            let on_diagonal = (dx * h - dy * w).abs() < tol || (dx * h - (h - 1.0 - dy) * w).abs() < tol;
            let color = if on_frame || on_diagonal {
                PLACEHOLDER_STROKE
            } else {
                PLACEHOLDER_FILL
            };
            canvas.put_pixel(px as u32, py as u32, color);
        }
    }
}
