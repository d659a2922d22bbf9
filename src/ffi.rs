//! C-compatible FFI API for embedding the editor in native hosts.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names.
//!
//! ## Handles
//! - `rcanvas_editor_new` returns an opaque `RcanvasEditor*` owning one
//!   editing session plus the image assets the host registered for export.
//! - Release it with `rcanvas_editor_free`. Handles are not thread-safe;
//!   use each one from a single thread.
//!
//! ## Memory management
//! - Buffers and strings returned through out-parameters are allocated on
//!   the Rust heap. Callers **must** free them with `rcanvas_free_buffer` /
//!   `rcanvas_free_string`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int` (0 = success, non-zero = error).
//! - Error details can be retrieved via `rcanvas_last_error`.
//! - User-facing notices (e.g. "only images can be dropped") are queued on
//!   the editor; drain them with `rcanvas_take_notices`.
//!
//! ## Usage from Go (cgo)
//! ```go
//! // #cgo LDFLAGS: -lreport_canvas
//! // #include "rcanvas.h"
//! import "C"
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use crate::config::EditorConfig;
use crate::document::Document;
use crate::editor::Editor;
use crate::element::{ChartRef, ElementId, Point};
use crate::error::NoticeLevel;
use crate::library::AssetStore;
use crate::pipeline::{ExportConfig, PageOrientation};
use crate::raster::SoftwareRasterizer;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Opaque editing session.
pub struct RcanvasEditor {
    editor: Editor,
    assets: AssetStore,
}

// ---------------------------------------------------------------------------
// C-compatible configuration types
// ---------------------------------------------------------------------------

/// Page orientation for use in [`RcanvasExportConfig`].
#[repr(C)]
pub enum RcanvasOrientation {
    /// Use the orientation stored in the document (default).
    Document = 0,
    Portrait = 1,
    Landscape = 2,
}

/// Optional export configuration passed to `rcanvas_export_pdf`.
///
/// Fields set to `0` (or `NULL` for `title`) fall back to their defaults:
/// - `page_width`  → 595.28 pt
/// - `page_height` → 841.89 pt
/// - `scale`       → 2 raster pixels per canvas unit
/// - `title`       → "Relatório"
#[repr(C)]
pub struct RcanvasExportConfig {
    /// Null-terminated UTF-8 document title embedded in PDF metadata.
    pub title: *const c_char,
    pub page_width: f32,
    pub page_height: f32,
    pub scale: f32,
    pub orientation: RcanvasOrientation,
}

/// Convert an `RcanvasExportConfig` (FFI) to an `ExportConfig` (Rust).
///
/// # Safety
/// `cfg.title`, if non-null, must point to a valid null-terminated UTF-8 string.
unsafe fn export_config_from_c(cfg: &RcanvasExportConfig) -> ExportConfig {
    let defaults = ExportConfig::default();

    let title = if cfg.title.is_null() {
        defaults.title.clone()
    } else {
        CStr::from_ptr(cfg.title)
            .to_str()
            .map(str::to_string)
            .unwrap_or_else(|_| defaults.title.clone())
    };

    let or_default = |value: f32, default: f32| if value > 0.0 { value } else { default };

    let orientation = match cfg.orientation {
        RcanvasOrientation::Document => None,
        RcanvasOrientation::Portrait => Some(PageOrientation::Portrait),
        RcanvasOrientation::Landscape => Some(PageOrientation::Landscape),
    };

    ExportConfig {
        title,
        page_width: or_default(cfg.page_width, defaults.page_width),
        page_height: or_default(cfg.page_height, defaults.page_height),
        orientation,
        scale: or_default(cfg.scale, defaults.scale),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

unsafe fn handle<'a>(ptr: *mut RcanvasEditor) -> Option<&'a mut RcanvasEditor> {
    if ptr.is_null() {
        set_last_error("Null editor handle");
        None
    } else {
        Some(&mut *ptr)
    }
}

unsafe fn str_arg<'a>(ptr: *const c_char, what: &str) -> Option<&'a str> {
    if ptr.is_null() {
        set_last_error(&format!("Null {what}"));
        return None;
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Some(s),
        Err(e) => {
            set_last_error(&format!("Invalid UTF-8 in {what}: {e}"));
            None
        }
    }
}

unsafe fn write_string(out: *mut *mut c_char, value: String) -> c_int {
    match CString::new(value) {
        Ok(cs) => {
            *out = cs.into_raw();
            0
        }
        Err(e) => {
            set_last_error(&format!("String contains NUL: {e}"));
            3
        }
    }
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Create an editor over a fresh one-page document. Configuration comes
/// from `REPORT_API_URL` / `REPORT_JOB_ID` when set.
#[no_mangle]
pub extern "C" fn rcanvas_editor_new() -> *mut RcanvasEditor {
    Box::into_raw(Box::new(RcanvasEditor {
        editor: Editor::new(EditorConfig::from_env()),
        assets: AssetStore::new(),
    }))
}

/// # Safety
/// `ptr` must come from `rcanvas_editor_new` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_editor_free(ptr: *mut RcanvasEditor) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr));
    }
}

/// Replace the document with one parsed from JSON.
///
/// # Safety
/// `ptr` must be a live handle; `json` must point to `json_len` valid bytes.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_load_json(
    ptr: *mut RcanvasEditor,
    json: *const u8,
    json_len: u32,
) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    if json.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }
    let bytes = slice::from_raw_parts(json, json_len as usize);
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            set_last_error(&format!("Invalid UTF-8: {e}"));
            return 2;
        }
    };
    match Document::from_json(text) {
        Ok(doc) => {
            h.editor.load_document(doc);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            3
        }
    }
}

/// Serialise the document to JSON.
///
/// # Safety
/// `ptr` must be a live handle; free `*out_json` with `rcanvas_free_string`.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_save_json(ptr: *mut RcanvasEditor, out_json: *mut *mut c_char) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    if out_json.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }
    match h.editor.document().to_json() {
        Ok(json) => write_string(out_json, json),
        Err(e) => {
            set_last_error(&e.to_string());
            3
        }
    }
}

/// Drain queued notices as a JSON array of `{"level","message"}` objects,
/// `level` being `"blocking"` or `"transient"`.
///
/// # Safety
/// `ptr` must be a live handle; free `*out_json` with `rcanvas_free_string`.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_take_notices(ptr: *mut RcanvasEditor, out_json: *mut *mut c_char) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    if out_json.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }
    let notices: Vec<serde_json::Value> = h
        .editor
        .take_notices()
        .into_iter()
        .map(|n| {
            let level = match n.level {
                NoticeLevel::Blocking => "blocking",
                NoticeLevel::Transient => "transient",
            };
            serde_json::json!({ "level": level, "message": n.message })
        })
        .collect();
    write_string(out_json, serde_json::Value::Array(notices).to_string())
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// # Safety
/// `ptr` must be a live handle or null.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_page_count(ptr: *mut RcanvasEditor) -> u32 {
    handle(ptr).map_or(0, |h| h.editor.document().page_count() as u32)
}

/// Append a page and make it active. Returns its index, or -1 on a null
/// handle.
///
/// # Safety
/// `ptr` must be a live handle or null.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_add_page(ptr: *mut RcanvasEditor) -> c_int {
    match handle(ptr) {
        Some(h) => h.editor.add_page() as c_int,
        None => -1,
    }
}

/// # Safety
/// `ptr` must be a live handle or null.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_select_page(ptr: *mut RcanvasEditor, index: u32) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    if h.editor.select_page(index as usize) {
        0
    } else {
        set_last_error(&format!("Page index {index} is out of range"));
        2
    }
}

/// Delete a page. Deleting the only page fails (and queues a notice).
///
/// # Safety
/// `ptr` must be a live handle or null.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_delete_page(ptr: *mut RcanvasEditor, index: u32) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    match h.editor.delete_page(index as usize) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            2
        }
    }
}

// ---------------------------------------------------------------------------
// Elements and pointer input
// ---------------------------------------------------------------------------

/// Add a default text box to the active page; its id is written to `*out_id`.
///
/// # Safety
/// `ptr` must be a live handle; free `*out_id` with `rcanvas_free_string`.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_add_text_box(ptr: *mut RcanvasEditor, out_id: *mut *mut c_char) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    if out_id.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }
    let id = h.editor.add_text_box();
    write_string(out_id, id.to_string())
}

/// Double-click on an element: toggle its selection.
///
/// # Safety
/// `ptr` must be a live handle; `id` a null-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_activate(ptr: *mut RcanvasEditor, id: *const c_char) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    let Some(id) = str_arg(id, "element id") else { return 2 };
    h.editor.activate(&ElementId::from(id));
    0
}

/// # Safety
/// `ptr` must be a live handle or null.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_click_background(ptr: *mut RcanvasEditor) {
    if let Some(h) = handle(ptr) {
        h.editor.click_background();
    }
}

/// Returns whether a move or resize started.
///
/// # Safety
/// `ptr` must be a live handle or null.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_pointer_down(ptr: *mut RcanvasEditor, x: f32, y: f32) -> bool {
    handle(ptr).is_some_and(|h| h.editor.pointer_down(Point::new(x, y)))
}

/// Returns whether the active page changed.
///
/// # Safety
/// `ptr` must be a live handle or null.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_pointer_move(ptr: *mut RcanvasEditor, x: f32, y: f32) -> bool {
    handle(ptr).is_some_and(|h| h.editor.pointer_move(Point::new(x, y)))
}

/// # Safety
/// `ptr` must be a live handle or null.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_pointer_up(ptr: *mut RcanvasEditor) {
    if let Some(h) = handle(ptr) {
        h.editor.pointer_up();
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Register image bytes for a remote URL referenced by external images.
///
/// # Safety
/// `ptr` must be a live handle; `url` a null-terminated UTF-8 string;
/// `data` must point to `data_len` valid bytes.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_add_url_asset(
    ptr: *mut RcanvasEditor,
    url: *const c_char,
    data: *const u8,
    data_len: u32,
) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    let Some(url) = str_arg(url, "url") else { return 2 };
    if data.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }
    let bytes = slice::from_raw_parts(data, data_len as usize).to_vec();
    h.editor.record_image(url, &bytes);
    h.assets.insert_url(url, bytes);
    0
}

/// Register image bytes for a library chart.
///
/// # Safety
/// `ptr` must be a live handle; `group` and `filename` null-terminated
/// UTF-8 strings; `data` must point to `data_len` valid bytes.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_add_chart_asset(
    ptr: *mut RcanvasEditor,
    group: *const c_char,
    filename: *const c_char,
    data: *const u8,
    data_len: u32,
) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    let Some(group) = str_arg(group, "group") else { return 2 };
    let Some(filename) = str_arg(filename, "filename") else { return 2 };
    if data.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }
    let bytes = slice::from_raw_parts(data, data_len as usize).to_vec();
    let chart = ChartRef::new(group, filename);
    h.editor.record_image(chart.source_key(), &bytes);
    h.assets.insert_chart(chart, bytes);
    0
}

/// Export every page to a PDF.
///
/// # Parameters
/// - `cfg`: optional configuration; pass `NULL` for defaults
/// - `out_buf`, `out_len`: receive the heap-allocated PDF bytes
///
/// # Returns
/// `0` on success, non-zero on error. On error, call `rcanvas_last_error`.
///
/// # Safety
/// - `ptr` must be a live handle; `out_buf` and `out_len` valid pointers.
/// - `cfg`, if non-null, must point to a valid `RcanvasExportConfig`.
/// - The caller must free `*out_buf` by calling `rcanvas_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_export_pdf(
    ptr: *mut RcanvasEditor,
    cfg: *const RcanvasExportConfig,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    let Some(h) = handle(ptr) else { return 1 };
    if out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }

    let config = if cfg.is_null() {
        ExportConfig::default()
    } else {
        export_config_from_c(&*cfg)
    };

    let mut rasterizer = SoftwareRasterizer::new(h.assets.clone());
    match h.editor.export_pdf(&mut rasterizer, &config) {
        Ok(pdf_bytes) => {
            let len = pdf_bytes.len() as u32;
            let buf = pdf_bytes.into_boxed_slice();
            *out_buf = Box::into_raw(buf) as *mut u8;
            *out_len = len;
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            3
        }
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a buffer returned by `rcanvas_export_pdf`.
///
/// # Safety
/// `buf` must have been returned by `rcanvas_export_pdf`, and `len` must be
/// the corresponding length.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_free_buffer(buf: *mut u8, len: u32) {
    if !buf.is_null() {
        let _ = Box::from_raw(slice::from_raw_parts_mut(buf, len as usize));
    }
}

/// Free a string returned through an out-parameter.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn rcanvas_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error message. Returns a null-terminated string.
///
/// The returned pointer is valid until the next `rcanvas_*` call on the same
/// thread. The caller should **not** free this pointer – it is managed
/// internally.
///
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn rcanvas_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        let borrow = e.borrow();
        match borrow.as_ref() {
            Some(cs) => cs.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn rcanvas_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(p: *mut c_char) -> String {
        let s = CStr::from_ptr(p).to_str().unwrap().to_string();
        rcanvas_free_string(p);
        s
    }

    #[test]
    fn ffi_session_round_trip() {
        unsafe {
            let ed = rcanvas_editor_new();
            let mut id_ptr: *mut c_char = ptr::null_mut();
            assert_eq!(rcanvas_add_text_box(ed, &mut id_ptr), 0);
            let id = take_string(id_ptr);
            assert!(id.starts_with("text-"));

            // Selected by add: drag it 10 units right.
            assert!(rcanvas_pointer_down(ed, 150.0, 150.0));
            assert!(rcanvas_pointer_move(ed, 160.0, 150.0));
            rcanvas_pointer_up(ed);

            let mut json_ptr: *mut c_char = ptr::null_mut();
            assert_eq!(rcanvas_save_json(ed, &mut json_ptr), 0);
            let json = take_string(json_ptr);
            let doc = Document::from_json(&json).unwrap();
            let el = &doc.pages()[0].elements[0];
            assert_eq!((el.x, el.y), (110.0, 100.0));

            let other = rcanvas_editor_new();
            assert_eq!(rcanvas_load_json(other, json.as_ptr(), json.len() as u32), 0);
            assert_eq!(rcanvas_page_count(other), 1);

            rcanvas_editor_free(ed);
            rcanvas_editor_free(other);
        }
    }

    #[test]
    fn ffi_last_page_guard() {
        unsafe {
            let ed = rcanvas_editor_new();
            assert_ne!(rcanvas_delete_page(ed, 0), 0);
            let err = CStr::from_ptr(rcanvas_last_error()).to_str().unwrap();
            assert!(err.contains("at least one page"));

            let mut json_ptr: *mut c_char = ptr::null_mut();
            assert_eq!(rcanvas_take_notices(ed, &mut json_ptr), 0);
            let notices: serde_json::Value = serde_json::from_str(&take_string(json_ptr)).unwrap();
            assert_eq!(notices[0]["level"], "blocking");

            assert_eq!(rcanvas_add_page(ed), 1);
            assert_eq!(rcanvas_select_page(ed, 0), 0);
            assert_ne!(rcanvas_select_page(ed, 5), 0);
            assert_eq!(rcanvas_delete_page(ed, 1), 0);
            rcanvas_editor_free(ed);
        }
    }

    #[test]
    fn ffi_rejects_invalid_document() {
        unsafe {
            let ed = rcanvas_editor_new();
            let json = r##"{"pages":[{"id":1,"elements":[
                {"id":"text-1","type":"text","x":0,"y":0,"width":300,"height":100,"content":"a","fontSize":16},
                {"id":"text-1","type":"text","x":0,"y":0,"width":-5,"height":0,"content":"b","fontSize":16}
            ]}]}"##;
            assert_eq!(rcanvas_load_json(ed, json.as_ptr(), json.len() as u32), 3);
            let err = CStr::from_ptr(rcanvas_last_error()).to_str().unwrap();
            assert!(err.contains("duplicate element id"), "{err}");
            assert_eq!(rcanvas_page_count(ed), 1);
            rcanvas_editor_free(ed);
        }
    }

    #[test]
    fn ffi_export_pdf() {
        unsafe {
            let ed = rcanvas_editor_new();
            rcanvas_add_page(ed);
            let cfg = RcanvasExportConfig {
                title: ptr::null(),
                page_width: 0.0,
                page_height: 0.0,
                scale: 0.5,
                orientation: RcanvasOrientation::Landscape,
            };
            let mut out_buf: *mut u8 = ptr::null_mut();
            let mut out_len: u32 = 0;
            assert_eq!(rcanvas_export_pdf(ed, &cfg, &mut out_buf, &mut out_len), 0);
            let bytes = slice::from_raw_parts(out_buf, out_len as usize);
            assert_eq!(&bytes[0..5], b"%PDF-");
            rcanvas_free_buffer(out_buf, out_len);
            rcanvas_editor_free(ed);
        }
    }

    #[test]
    fn ffi_null_handles() {
        unsafe {
            let mut out: *mut c_char = ptr::null_mut();
            assert_ne!(rcanvas_save_json(ptr::null_mut(), &mut out), 0);
            assert_eq!(rcanvas_page_count(ptr::null_mut()), 0);
            assert!(!rcanvas_pointer_down(ptr::null_mut(), 0.0, 0.0));
            rcanvas_editor_free(ptr::null_mut());
        }
    }

    #[test]
    fn ffi_version() {
        let v = rcanvas_version();
        let version = unsafe { CStr::from_ptr(v) }.to_str().unwrap();
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }
}
