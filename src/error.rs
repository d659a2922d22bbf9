//! Error types and user-visible notices.
//!
//! Every failure the editor can surface falls into one of four buckets:
//! ingestion, network, export and invariant guards. Each bucket maps to a
//! [`NoticeLevel`] so a host UI knows whether to block or merely toast.

use thiserror::Error;

/// Model-level failures (page bookkeeping).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// A document must keep at least one page.
    #[error("A report must keep at least one page")]
    LastPage,

    #[error("Page index {index} is out of range (document has {len} pages)")]
    PageOutOfRange { index: usize, len: usize },

    #[error("Invalid document JSON: {0}")]
    InvalidJson(String),

    #[error("Could not serialise document: {0}")]
    Serialize(String),
}

/// Failures while turning a drop payload into an element.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The first dropped file is not an image.
    #[error("Only image files can be dropped onto the canvas ({name} is {mime})")]
    NotAnImage { name: String, mime: String },

    /// The dropped file has neither in-memory bytes nor a readable path.
    #[error("Dropped file '{0}' has no readable content")]
    Unreadable(String),

    #[error("I/O error reading dropped file: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the reporting backend.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Failures in the multi-page export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Rasterizing one page failed; the whole export is abandoned.
    #[error("Failed to rasterize page {page}: {reason}")]
    Rasterize { page: usize, reason: String },

    #[error("Failed to encode page {page} for the PDF: {reason}")]
    Encode { page: usize, reason: String },

    #[error("Failed to assemble PDF: {0}")]
    Assemble(String),
}

/// Top-level error for editor operations.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl EditorError {
    /// How a host should present this error.
    pub fn notice_level(&self) -> NoticeLevel {
        match self {
            EditorError::Library(_) => NoticeLevel::Transient,
            _ => NoticeLevel::Blocking,
        }
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Modal alert; the operation was aborted.
    Blocking,
    /// Toast-style message; the editor keeps going and the action can be retried.
    Transient,
}

/// A message queued for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Blocking,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Transient,
            message: message.into(),
        }
    }
}

impl From<&EditorError> for Notice {
    fn from(err: &EditorError) -> Self {
        Self {
            level: err.notice_level(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_transient() {
        let err = EditorError::from(LibraryError::Status {
            url: "http://localhost:8000/jobs/job/x/charts".to_string(),
            status: 500,
        });
        assert_eq!(err.notice_level(), NoticeLevel::Transient);
        let notice = Notice::from(&err);
        assert!(notice.message.contains("HTTP 500"));
    }

    #[test]
    fn guard_errors_are_blocking() {
        let err = EditorError::from(DocumentError::LastPage);
        assert_eq!(Notice::from(&err).level, NoticeLevel::Blocking);
    }
}
