//! Editor configuration.
//!
//! Defaults reproduce the web report builder: an A4 canvas at 96 dpi,
//! 500×350 dropped images, a 100×50 resize floor and 300×100 text boxes at
//! (100, 100). `from_env` overlays the backend location and job id.

use std::env;

use crate::element::{Point, Size};
use crate::style::TextStyle;

/// Environment variable holding the backend base URL.
pub const ENV_API_URL: &str = "REPORT_API_URL";
/// Environment variable holding the active job id.
pub const ENV_JOB_ID: &str = "REPORT_JOB_ID";

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Logical size of the editing canvas for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl CanvasSize {
    /// A4 portrait at 96 logical units per inch.
    pub const A4: CanvasSize = CanvasSize {
        width: 794.0,
        height: 1123.0,
    };

    /// Same canvas with width and height swapped.
    pub fn rotated(&self) -> CanvasSize {
        CanvasSize {
            width: self.height,
            height: self.width,
        }
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Geometry and content of a freshly added text box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBoxDefaults {
    pub origin: Point,
    pub size: Size,
    pub content: String,
    pub style: TextStyle,
}

impl Default for TextBoxDefaults {
    fn default() -> Self {
        Self {
            origin: Point::new(100.0, 100.0),
            size: Size::new(300.0, 100.0),
            content: "Digite aqui...".to_string(),
            style: TextStyle::default(),
        }
    }
}

/// Configuration for an [`Editor`](crate::editor::Editor) session.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Base URL of the reporting backend (default: `http://localhost:8000`).
    pub api_base_url: String,
    /// Job whose saved charts form the asset library.
    pub job_id: Option<String>,
    /// Portrait canvas size; landscape documents use it rotated.
    pub canvas: CanvasSize,
    /// Smallest size a resize gesture can produce.
    pub min_element_size: Size,
    /// Size of images created by a drop.
    pub drop_size: Size,
    /// Offset applied to duplicated elements on both axes.
    pub duplicate_offset: f32,
    pub text_box: TextBoxDefaults,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            job_id: None,
            canvas: CanvasSize::A4,
            min_element_size: Size::new(100.0, 50.0),
            drop_size: Size::new(500.0, 350.0),
            duplicate_offset: 20.0,
            text_box: TextBoxDefaults::default(),
        }
    }
}

impl EditorConfig {
    /// Defaults overlaid with `REPORT_API_URL` / `REPORT_JOB_ID`.
    pub fn from_env() -> Self {
        Self::default().with_lookup(|key| env::var(key).ok())
    }

    fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_URL).filter(|s| !s.trim().is_empty()) {
            self.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(job) = lookup(ENV_JOB_ID).filter(|s| !s.trim().is_empty()) {
            self.job_id = Some(job.trim().to_string());
        }
        self
    }

    /// Offset subtracted from the drop point so the new image is centred
    /// under the cursor.
    pub fn drop_anchor(&self) -> Point {
        self.drop_size.half()
    }
}
