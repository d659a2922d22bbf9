//! Placeable canvas elements.
//!
//! An [`Element`] is a positioned rectangle with one of three payloads: a
//! styled text box, a chart image hosted by the reporting backend, or an
//! external image (remote URL or data URI). Coordinates are canvas-local
//! logical units with the origin at the top-left of the page; nothing keeps
//! an element inside the page.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::style::{Color, TextStyle};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point (or offset) in canvas-local logical units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A width/height pair in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn half(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of an element, unique within its page (`"{kind}-{n}"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric token after the last `-`, if any.
    pub(crate) fn token(&self) -> Option<u64> {
        self.0.rsplit('-').next().and_then(|t| t.parse().ok())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Discriminant of [`ElementContent`]; also the id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Text,
    ChartImage,
    ExternalImage,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Text => "text",
            ElementKind::ChartImage => "image",
            ElementKind::ExternalImage => "external-image",
        }
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// A chart image saved in the backend library, addressed by group + filename
/// under the current job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChartRef {
    pub group: String,
    pub filename: String,
}

impl ChartRef {
    pub fn new(group: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            filename: filename.into(),
        }
    }

    /// Key of this chart's bitmap; see [`Element::image_source_key`].
    pub fn source_key(&self) -> String {
        format!("chart:{}/{}", self.group, self.filename)
    }

    /// JSON carried by a library drag source; accepted back by drop ingestion.
    pub fn drag_payload(&self) -> String {
        serde_json::json!({ "group": self.group, "filename": self.filename }).to_string()
    }
}

/// Text and style of a text box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
    #[serde(flatten)]
    pub style: TextStyle,
}

/// Payload of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementContent {
    #[serde(rename = "text")]
    Text(TextContent),
    #[serde(rename = "image")]
    ChartImage { chart: ChartRef },
    #[serde(rename = "external-image")]
    ExternalImage { src: String, filename: String },
}

/// A placeable item on a page.
///
/// For image kinds `height` is advisory: renderers derive the drawn height
/// from the image's aspect ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(flatten)]
    pub content: ElementContent,
}

impl Element {
    pub fn text_box(
        id: ElementId,
        origin: Point,
        size: Size,
        content: impl Into<String>,
        style: TextStyle,
    ) -> Self {
        Self {
            id,
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
            content: ElementContent::Text(TextContent {
                content: content.into(),
                style,
            }),
        }
    }

    pub fn chart_image(id: ElementId, origin: Point, size: Size, chart: ChartRef) -> Self {
        Self {
            id,
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
            content: ElementContent::ChartImage { chart },
        }
    }

    pub fn external_image(
        id: ElementId,
        origin: Point,
        size: Size,
        src: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            id,
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
            content: ElementContent::ExternalImage {
                src: src.into(),
                filename: filename.into(),
            },
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self.content {
            ElementContent::Text(_) => ElementKind::Text,
            ElementContent::ChartImage { .. } => ElementKind::ChartImage,
            ElementContent::ExternalImage { .. } => ElementKind::ExternalImage,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.content, ElementContent::Text(_))
    }

    pub fn text(&self) -> Option<&TextContent> {
        match &self.content {
            ElementContent::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Key identifying the bitmap behind an image element: the chart's
    /// library path or the external source. `None` for text.
    pub fn image_source_key(&self) -> Option<String> {
        match &self.content {
            ElementContent::ChartImage { chart } => Some(chart.source_key()),
            ElementContent::ExternalImage { src, .. } => Some(src.clone()),
            ElementContent::Text(_) => None,
        }
    }

    /// Structural deep copy under a new id, shifted by `offset`.
    pub fn duplicate(&self, id: ElementId, offset: Point) -> Element {
        let content = match &self.content {
            ElementContent::Text(t) => ElementContent::Text(TextContent {
                content: t.content.clone(),
                style: t.style.clone(),
            }),
            ElementContent::ChartImage { chart } => ElementContent::ChartImage {
                chart: chart.clone(),
            },
            ElementContent::ExternalImage { src, filename } => ElementContent::ExternalImage {
                src: src.clone(),
                filename: filename.clone(),
            },
        };
        Element {
            id,
            x: self.x + offset.x,
            y: self.y + offset.y,
            width: self.width,
            height: self.height,
            content,
        }
    }

    /// Merge `patch` into this element. Text attributes are ignored on image
    /// kinds; non-positive sizes are ignored. Returns whether anything changed.
    pub fn apply(&mut self, patch: &ElementPatch) -> bool {
        let before = self.clone();

        if let Some(x) = patch.x.filter(|v| v.is_finite()) {
            self.x = x;
        }
        if let Some(y) = patch.y.filter(|v| v.is_finite()) {
            self.y = y;
        }
        if let Some(w) = patch.width.filter(|v| v.is_finite() && *v > 0.0) {
            self.width = w;
        }
        if let Some(h) = patch.height.filter(|v| v.is_finite() && *v > 0.0) {
            self.height = h;
        }

        if let ElementContent::Text(text) = &mut self.content {
            if let Some(content) = &patch.content {
                text.content = content.clone();
            }
            if let Some(size) = patch.font_size.filter(|v| v.is_finite() && *v > 0.0) {
                text.style.font_size = size;
            }
            if let Some(bold) = patch.bold {
                text.style.bold = bold;
            }
            if let Some(italic) = patch.italic {
                text.style.italic = italic;
            }
            if let Some(underline) = patch.underline {
                text.style.underline = underline;
            }
            if let Some(color) = patch.color {
                text.style.color = color;
            }
        }

        *self != before
    }
}

/// Partial attribute update for [`Element::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub content: Option<String>,
    pub font_size: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub color: Option<Color>,
}

impl ElementPatch {
    pub fn position(p: Point) -> Self {
        Self {
            x: Some(p.x),
            y: Some(p.y),
            ..Self::default()
        }
    }

    pub fn size(width: f32, height: f32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> Element {
        Element::text_box(
            ElementId::from("text-1"),
            Point::new(100.0, 100.0),
            Size::new(300.0, 100.0),
            "Digite aqui...",
            TextStyle::default(),
        )
    }

    #[test]
    fn json_shape_matches_saved_reports() {
        let el = sample_text();
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["id"], "text-1");
        assert_eq!(json["content"], "Digite aqui...");
        assert_eq!(json["color"], "#000000");
        assert_eq!(json["fontWeight"], "normal");
        assert_eq!(json["fontStyle"], "normal");
        assert_eq!(json["textDecoration"], "none");
        assert_eq!(json["fontSize"], 16.0);

        let chart = Element::chart_image(
            ElementId::from("image-2"),
            Point::default(),
            Size::new(500.0, 350.0),
            ChartRef::new("G1", "cp_cpk.png"),
        );
        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["chart"]["filename"], "cp_cpk.png");
    }

    #[test]
    fn reads_web_editor_text_box() {
        let json = r##"{"id":"text-1712000000000","type":"text","content":"Digite aqui...",
            "x":100,"y":100,"width":300,"height":100,"fontSize":16,"fontWeight":"bold",
            "fontStyle":"normal","textDecoration":"underline","color":"#000000"}"##;
        let el: Element = serde_json::from_str(json).unwrap();
        let style = &el.text().unwrap().style;
        assert!(style.bold && !style.italic && style.underline);
        assert_eq!(style.font_size, 16.0);
    }

    #[test]
    fn drag_payload_round_trips() {
        let chart = ChartRef::new("xbar", "a \"b\".png");
        let back: ChartRef = serde_json::from_str(&chart.drag_payload()).unwrap();
        assert_eq!(back, chart);
    }

    #[test]
    fn parses_integer_geometry() {
        let json = r##"{"id":"external-image-3","type":"external-image","x":10,"y":20,
            "width":500,"height":350,"src":"https://x/y.png","filename":"y.png"}"##;
        let el: Element = serde_json::from_str(json).unwrap();
        assert_eq!(el.kind(), ElementKind::ExternalImage);
        assert_eq!(el.position(), Point::new(10.0, 20.0));
    }

    #[test]
    fn patch_ignores_text_fields_on_images() {
        let mut el = Element::external_image(
            ElementId::from("external-image-1"),
            Point::default(),
            Size::new(500.0, 350.0),
            "data:image/png;base64,AAAA",
            "a.png",
        );
        let patch = ElementPatch {
            bold: Some(true),
            content: Some("nope".to_string()),
            ..ElementPatch::default()
        };
        assert!(!el.apply(&patch));
    }

    #[test]
    fn patch_rejects_non_positive_width() {
        let mut el = sample_text();
        el.apply(&ElementPatch::size(0.0, -5.0));
        assert_eq!(el.size(), Size::new(300.0, 100.0));
        assert!(el.apply(&ElementPatch::size(120.0, 60.0)));
        assert_eq!(el.size(), Size::new(120.0, 60.0));
    }

    #[test]
    fn duplicate_is_independent() {
        let el = sample_text();
        let mut copy = el.duplicate(ElementId::from("text-2"), Point::new(20.0, 20.0));
        assert_eq!(copy.position(), Point::new(120.0, 120.0));
        copy.apply(&ElementPatch::content("changed"));
        assert_eq!(el.text().unwrap().content, "Digite aqui...");
    }

    #[test]
    fn id_token() {
        assert_eq!(ElementId::from("external-image-42").token(), Some(42));
        assert_eq!(ElementId::from("text-1712000000000").token(), Some(1712000000000));
        assert_eq!(ElementId::from("custom").token(), None);
    }
}
