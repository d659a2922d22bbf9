//! Bitmap fonts for text rasterization using `spleen-font`.
//!
//! Text boxes are drawn with the Spleen monospace faces scaled to the
//! requested font size: the 12×24 face for anything rendered at 12 px or
//! more, the 6×12 face below that. Every glyph cell is half as wide as the
//! font size, which keeps measurement and word wrapping exact.

use std::collections::HashMap;

use spleen_font::{PSF2Font, FONT_12X24, FONT_6X12};

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Glyph advance as a multiple of the font size.
pub const ADVANCE_FACTOR: f32 = 0.5;

/// Layout metrics of the bitmap face at one font size, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub font_size: f32,
    /// Horizontal advance of every glyph.
    pub advance: f32,
    /// Distance between consecutive baselines' line tops.
    pub line_height: f32,
    /// Gap above the glyph cell inside a line.
    pub leading: f32,
}

impl FontMetrics {
    pub fn for_size(font_size: f32) -> Self {
        let line_height = font_size * LINE_HEIGHT_FACTOR;
        Self {
            font_size,
            advance: font_size * ADVANCE_FACTOR,
            line_height,
            leading: (line_height - font_size) / 2.0,
        }
    }
}

/// Which Spleen face a glyph was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphFace {
    Small,
    Large,
}

impl GlyphFace {
    /// Face to sample for a glyph cell `pixel_height` pixels tall.
    pub fn for_pixel_height(pixel_height: f32) -> Self {
        if pixel_height < 12.0 {
            GlyphFace::Small
        } else {
            GlyphFace::Large
        }
    }

    fn dimensions(&self) -> (usize, usize) {
        match self {
            GlyphFace::Small => (6, 12),
            GlyphFace::Large => (12, 24),
        }
    }
}

/// A 1-bit glyph bitmap, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    bits: Vec<bool>,
}

impl GlyphBitmap {
    fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    /// Hollow rectangle used for characters the face does not cover.
    fn missing(width: usize, height: usize) -> Self {
        let mut glyph = Self::blank(width, height);
        let top = height / 4;
        let bottom = height.saturating_sub(height / 8 + 1);
        let right = width.saturating_sub(2);
        for y in top..=bottom {
            for x in 1..=right {
                if y == top || y == bottom || x == 1 || x == right {
                    glyph.bits[y * width + x] = true;
                }
            }
        }
        glyph
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.bits[y * self.width + x]
    }

    /// Nearest-neighbour lookup with `u`, `v` in `[0, 1)`.
    pub fn sample(&self, u: f32, v: f32) -> bool {
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return false;
        }
        let x = (u * self.width as f32) as usize;
        let y = (v * self.height as f32) as usize;
        self.is_set(x, y)
    }
}

/// Decodes and caches glyph bitmaps.
#[derive(Debug, Default)]
pub struct FontManager {
    cache: HashMap<(GlyphFace, char), GlyphBitmap>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmap for `ch` from `face`. Whitespace is blank; characters the face
    /// lacks come back as a hollow box.
    pub fn glyph(&mut self, face: GlyphFace, ch: char) -> &GlyphBitmap {
        self.cache
            .entry((face, ch))
            .or_insert_with(|| decode_glyph(face, ch))
    }

    /// Width of `text` at `font_size`, in canvas units.
    pub fn measure_text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * ADVANCE_FACTOR
    }

    pub fn cached_glyphs(&self) -> usize {
        self.cache.len()
    }
}

fn decode_glyph(face: GlyphFace, ch: char) -> GlyphBitmap {
    let (width, height) = face.dimensions();
    if ch.is_whitespace() {
        return GlyphBitmap::blank(width, height);
    }

    let font = match face {
        GlyphFace::Small => PSF2Font::new(FONT_6X12),
        GlyphFace::Large => PSF2Font::new(FONT_12X24),
    };
    let mut font = match font {
        Ok(f) => f,
        Err(e) => {
            log::warn!("bitmap font unavailable: {e:?}");
            return GlyphBitmap::missing(width, height);
        }
    };

    let utf8 = ch.to_string();
    match font.glyph_for_utf8(utf8.as_bytes()) {
        Some(rows) => {
            let mut glyph = GlyphBitmap::blank(width, height);
            for (y, row) in rows.enumerate() {
                for (x, on) in row.enumerate() {
                    if on && x < width && y < height {
                        glyph.bits[y * width + x] = true;
                    }
                }
            }
            glyph
        }
        None => {
            log::trace!("no glyph for {ch:?}");
            GlyphBitmap::missing(width, height)
        }
    }
}

/// Word-wrap text to fit within `max_width` canvas units. Explicit newlines
/// start new lines and words longer than a line are broken by character.
pub fn wrap_text(text: &str, font_size: f32, max_width: f32, fonts: &FontManager) -> Vec<String> {
    if max_width <= 0.0 || font_size <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }
    let max_chars = ((max_width / (font_size * ADVANCE_FACTOR)).floor() as usize).max(1);

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current_line, word)
            };
            if fonts.measure_text_width(&candidate, font_size) <= max_width {
                current_line = candidate;
                continue;
            }
            if !current_line.is_empty() {
                lines.push(std::mem::take(&mut current_line));
            }
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(max_chars).peekable();
            while let Some(chunk) = chunks.next() {
                let piece: String = chunk.iter().collect();
                if chunks.peek().is_some() {
                    lines.push(piece);
                } else {
                    current_line = piece;
                }
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monospace_width() {
        let mgr = FontManager::new();
        // 5 chars × 16 × 0.5 = 40
        assert!((mgr.measure_text_width("Hello", 16.0) - 40.0).abs() < 0.01);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::new();
        let lines = wrap_text("Hello world foo bar", 16.0, 60.0, &mgr);
        assert_eq!(lines, vec!["Hello", "world", "foo", "bar"]);
    }

    #[test]
    fn long_words_are_split() {
        let mgr = FontManager::new();
        let lines = wrap_text("abcdefghij", 10.0, 20.0, &mgr);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn newlines_are_kept() {
        let mgr = FontManager::new();
        let lines = wrap_text("a\n\nb", 16.0, 300.0, &mgr);
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn letters_have_ink_and_spaces_do_not() {
        let mut mgr = FontManager::new();
        let a = mgr.glyph(GlyphFace::Large, 'A').clone();
        assert_eq!((a.width, a.height), (12, 24));
        assert!(a.bits.iter().any(|b| *b));
        let space = mgr.glyph(GlyphFace::Small, ' ');
        assert!(!space.bits.iter().any(|b| *b));
        assert_eq!(mgr.cached_glyphs(), 2);
    }

    #[test]
    fn face_selection() {
        assert_eq!(GlyphFace::for_pixel_height(8.0), GlyphFace::Small);
        assert_eq!(GlyphFace::for_pixel_height(32.0), GlyphFace::Large);
        let m = FontMetrics::for_size(20.0);
        assert!((m.line_height - 24.0).abs() < 0.01);
        assert!((m.leading - 2.0).abs() < 0.01);
    }
}
