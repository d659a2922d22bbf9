//! Drop ingestion: turning whatever the host dropped onto the canvas into a
//! new image element.
//!
//! A drop can carry several representations at once. They are tried in a
//! fixed order and the first usable one wins:
//!
//! 1. a library asset (`{"group": .., "filename": ..}` JSON from the chart
//!    library panel);
//! 2. the first dropped file, which must be an image and is read
//!    asynchronously;
//! 3. the `src` of the first `<img>` in dropped markup;
//! 4. plain text that looks like an image URL (`http…` or `data:image…`).
//!
//! New images are `drop_size` large and centred on the drop point, pushed
//! back inside the page when that would give a negative coordinate.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

use crate::config::EditorConfig;
use crate::document::PageId;
use crate::dom::first_img_src;
use crate::element::{ChartRef, ElementId, Point, Size};
use crate::error::IngestError;

/// Filename used when a URL has no usable last segment.
pub const FALLBACK_IMAGE_NAME: &str = "imagem-externa";

/// A file dropped from the desktop or a file picker.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedFile {
    pub name: String,
    /// MIME type reported by the host, if any.
    pub mime: Option<String>,
    /// Where to read the content from when `bytes` is absent.
    pub path: Option<PathBuf>,
    pub bytes: Option<Vec<u8>>,
}

impl DroppedFile {
    /// A file whose content the host already holds in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: None,
            path: None,
            bytes: Some(bytes),
        }
    }

    /// A file to be read from disk.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            mime: None,
            path: Some(path),
            bytes: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Host-supplied MIME type, or one guessed from the file name.
    pub fn effective_mime(&self) -> String {
        match self.mime.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            Some(mime) => mime.to_ascii_lowercase(),
            None => mime_guess::from_path(Path::new(&self.name))
                .first_or_octet_stream()
                .to_string(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.effective_mime().starts_with("image/")
    }
}

/// Everything the host offered for one drop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropPayload {
    /// Drop point in canvas-local units.
    pub position: Point,
    /// Library drag data (JSON [`ChartRef`]).
    pub library_asset: Option<String>,
    pub files: Vec<DroppedFile>,
    /// `text/html` flavour.
    pub html: Option<String>,
    /// `text/plain` flavour.
    pub text: Option<String>,
}

impl DropPayload {
    pub fn at(position: Point) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_library_asset(mut self, json: impl Into<String>) -> Self {
        self.library_asset = Some(json.into());
        self
    }

    pub fn with_file(mut self, file: DroppedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// What a drop resolves to, before any element is created.
#[derive(Debug, Clone, PartialEq)]
pub enum DropAction {
    /// Insert a library chart.
    Chart {
        origin: Point,
        size: Size,
        chart: ChartRef,
    },
    /// Insert an image referenced by URL or data URI.
    External {
        origin: Point,
        size: Size,
        src: String,
        filename: String,
    },
    /// Read this file, then insert it as a data URI.
    ReadFile {
        origin: Point,
        size: Size,
        file: DroppedFile,
    },
    /// Nothing usable was dropped.
    Ignore,
}

/// Result of [`Editor::handle_drop`](crate::editor::Editor::handle_drop).
#[derive(Debug)]
pub enum DropOutcome {
    /// An element was inserted on the active page.
    Inserted(ElementId),
    /// A file read must complete before the element is inserted.
    Pending(PendingFileRead),
    Ignored,
}

/// A dropped image file waiting to be read. It remembers the page that was
/// active at drop time so the image lands there even if the user switches
/// pages before the read finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFileRead {
    pub page: PageId,
    pub origin: Point,
    pub size: Size,
    pub file: DroppedFile,
}

impl PendingFileRead {
    /// Read the file content (in-memory bytes first, then the path).
    pub async fn read(&self) -> Result<Vec<u8>, IngestError> {
        if let Some(bytes) = &self.file.bytes {
            return Ok(bytes.clone());
        }
        match &self.file.path {
            Some(path) => Ok(tokio::fs::read(path).await?),
            None => Err(IngestError::Unreadable(self.file.name.clone())),
        }
    }

    /// `data:` URI for the file's content.
    pub fn data_uri(&self, bytes: &[u8]) -> String {
        encode_data_uri(&self.file.effective_mime(), bytes)
    }
}

/// Top-left corner for a `size`-sized image centred on `pointer`, clamped
/// to non-negative coordinates.
pub fn drop_origin(pointer: Point, config: &EditorConfig) -> Point {
    let origin = pointer - config.drop_anchor();
    Point::new(origin.x.max(0.0), origin.y.max(0.0))
}

/// Decide what a drop should do. Only a non-image file is an error.
pub fn resolve_drop(payload: &DropPayload, config: &EditorConfig) -> Result<DropAction, IngestError> {
    let origin = drop_origin(payload.position, config);
    let size = config.drop_size;

    if let Some(raw) = payload.library_asset.as_deref() {
        match serde_json::from_str::<ChartRef>(raw) {
            Ok(chart) => return Ok(DropAction::Chart { origin, size, chart }),
            Err(e) => log::warn!("ignoring malformed library drag data: {e}"),
        }
    }

    if let Some(file) = payload.files.first() {
        let mime = file.effective_mime();
        if !mime.starts_with("image/") {
            return Err(IngestError::NotAnImage {
                name: file.name.clone(),
                mime,
            });
        }
        return Ok(DropAction::ReadFile {
            origin,
            size,
            file: file.clone(),
        });
    }

    if let Some(src) = payload.html.as_deref().and_then(first_img_src) {
        let filename = filename_from_url(&src);
        return Ok(DropAction::External {
            origin,
            size,
            src,
            filename,
        });
    }

    if let Some(text) = payload.text.as_deref().map(str::trim) {
        if text.starts_with("http") || text.starts_with("data:image") {
            return Ok(DropAction::External {
                origin,
                size,
                src: text.to_string(),
                filename: filename_from_url(text),
            });
        }
    }

    Ok(DropAction::Ignore)
}

/// Last `/`-separated segment of `url`, or [`FALLBACK_IMAGE_NAME`].
pub fn filename_from_url(url: &str) -> String {
    if url.starts_with("data:") {
        return FALLBACK_IMAGE_NAME.to_string();
    }
    match url.rsplit('/').next().map(str::trim) {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => FALLBACK_IMAGE_NAME.to_string(),
    }
}

/// `data:<mime>;base64,<payload>`.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64_STD.encode(bytes))
}

/// Decode a `data:<mime>;base64,<data>` URI into raw bytes.
pub fn decode_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URI".to_string())?;
    let comma_pos = rest
        .find(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    let header = &rest[..comma_pos];
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(rest[comma_pos + 1..].trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EditorConfig {
        EditorConfig::default()
    }

    #[test]
    fn library_asset_wins() {
        let payload = DropPayload::at(Point::new(400.0, 400.0))
            .with_library_asset(ChartRef::new("xbar", "chart.png").drag_payload())
            .with_file(DroppedFile::from_bytes("notes.txt", b"x".to_vec()))
            .with_text("https://example.com/a.png");
        match resolve_drop(&payload, &cfg()).unwrap() {
            DropAction::Chart { origin, size, chart } => {
                assert_eq!(origin, Point::new(150.0, 225.0));
                assert_eq!(size, Size::new(500.0, 350.0));
                assert_eq!(chart, ChartRef::new("xbar", "chart.png"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_library_payload_falls_through() {
        let payload = DropPayload::at(Point::new(0.0, 0.0))
            .with_library_asset("{not json")
            .with_text("https://example.com/img/b.jpg");
        match resolve_drop(&payload, &cfg()).unwrap() {
            DropAction::External { origin, filename, .. } => {
                assert_eq!(origin, Point::new(0.0, 0.0));
                assert_eq!(filename, "b.jpg");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_image_file_is_rejected() {
        let payload = DropPayload::at(Point::new(300.0, 300.0))
            .with_file(DroppedFile::from_bytes("report.pdf", vec![1, 2, 3]))
            .with_text("https://example.com/a.png");
        let err = resolve_drop(&payload, &cfg()).unwrap_err();
        assert!(matches!(err, IngestError::NotAnImage { ref mime, .. } if mime == "application/pdf"));
    }

    #[test]
    fn host_mime_beats_extension() {
        let file = DroppedFile::from_bytes("blob", vec![]).with_mime("IMAGE/PNG");
        assert!(file.is_image());
        assert_eq!(file.effective_mime(), "image/png");
        assert!(DroppedFile::from_path("/tmp/photo.jpeg").is_image());
    }

    #[test]
    fn markup_then_text() {
        let payload = DropPayload::at(Point::new(600.0, 500.0))
            .with_html("<div><img src='https://h/charts/'></div>")
            .with_text("https://ignored/x.png");
        match resolve_drop(&payload, &cfg()).unwrap() {
            DropAction::External { src, filename, .. } => {
                assert_eq!(src, "https://h/charts/");
                assert_eq!(filename, FALLBACK_IMAGE_NAME);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plain_text_must_look_like_an_image() {
        let words = DropPayload::at(Point::default()).with_text("hello there");
        assert_eq!(resolve_drop(&words, &cfg()).unwrap(), DropAction::Ignore);
        let data = DropPayload::at(Point::default()).with_text("data:image/png;base64,AAAA");
        assert!(matches!(
            resolve_drop(&data, &cfg()).unwrap(),
            DropAction::External { ref filename, .. } if filename == FALLBACK_IMAGE_NAME
        ));
        assert_eq!(
            resolve_drop(&DropPayload::default(), &cfg()).unwrap(),
            DropAction::Ignore
        );
    }

    #[test]
    fn data_uri_round_trip() {
        let uri = encode_data_uri("image/png", &[0x89, b'P', b'N', b'G']);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_uri(&uri).unwrap(), vec![0x89, b'P', b'N', b'G']);
        assert!(decode_data_uri("https://x/y.png").is_err());
        assert!(decode_data_uri("data:image/svg+xml,<svg/>").is_err());
    }

    #[tokio::test]
    async fn pending_read_prefers_memory_then_disk() {
        let pending = PendingFileRead {
            page: PageId::new(1),
            origin: Point::default(),
            size: Size::new(500.0, 350.0),
            file: DroppedFile::from_bytes("a.png", vec![7, 8]),
        };
        assert_eq!(pending.read().await.unwrap(), vec![7, 8]);

        let path = std::env::temp_dir().join(format!("rcanvas-ingest-{}.png", std::process::id()));
        tokio::fs::write(&path, [1u8, 2, 3]).await.unwrap();
        let from_disk = PendingFileRead {
            file: DroppedFile::from_path(&path),
            ..pending.clone()
        };
        assert_eq!(from_disk.read().await.unwrap(), vec![1, 2, 3]);
        let _ = tokio::fs::remove_file(&path).await;

        let nothing = PendingFileRead {
            file: DroppedFile {
                name: "ghost.png".into(),
                mime: None,
                path: None,
                bytes: None,
            },
            ..pending
        };
        assert!(matches!(nothing.read().await, Err(IngestError::Unreadable(_))));
    }
}
