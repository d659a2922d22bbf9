//! # report-canvas – multi-page report canvas editor
//!
//! A headless editing core for assembling quality-control reports: charts
//! from a backend library, external images and styled text boxes are placed
//! freely on A4 pages, then every page is rasterized and bound into one PDF.
//!
//! 1. **Model** – pages and elements ([`document`], [`element`], [`style`])
//! 2. **Interact** – selection, drag-move and resize ([`interaction`])
//! 3. **Ingest** – drops from the library, files, markup or URLs ([`ingest`], [`dom`])
//! 4. **Format** – text toolbar operations ([`format`])
//! 5. **Export** – rasterize pages and assemble the PDF ([`pipeline`],
//!    [`raster`], [`render`], [`fonts`])
//!
//! [`editor::Editor`] ties these together into one session. The reporting
//! backend is reached through [`library`]; a C-compatible FFI surface is
//! exposed via the [`ffi`] module.

pub mod config;
pub mod document;
pub mod dom;
pub mod editor;
pub mod element;
pub mod error;
pub mod ffi;
pub mod fonts;
pub mod format;
pub mod ingest;
pub mod interaction;
pub mod library;
pub mod pipeline;
pub mod raster;
pub mod render;
pub mod style;

// Re-exports for convenience
pub use config::EditorConfig;
pub use document::{Document, Page, PageId};
pub use editor::Editor;
pub use element::{ChartRef, Element, ElementId, ElementPatch, Point, Size};
pub use error::{EditorError, Notice, NoticeLevel, Result};
pub use pipeline::{export_pdf, ExportConfig, PageOrientation};
pub use raster::{PageRasterizer, SoftwareRasterizer};
