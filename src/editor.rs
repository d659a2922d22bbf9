//! The editing session.
//!
//! [`Editor`] owns the document, the index of the active page, the single
//! [`InteractionController`] and the queue of user-facing notices. Every
//! mutation goes through `&mut self`, so there is never more than one writer
//! and never more than one drag in progress.

use crate::config::EditorConfig;
use crate::document::{Document, Page};
use crate::element::{ChartRef, Element, ElementId, ElementKind, ElementPatch, Point};
use crate::error::{EditorError, Notice, Result};
use crate::ingest::{decode_data_uri, resolve_drop, DropAction, DropOutcome, DropPayload, PendingFileRead};
use crate::interaction::{ImageExtents, InteractionController, NoCapture, PointerCapture};
use crate::library::LibraryClient;
use crate::pipeline::{self, ExportConfig, PageOrientation};
use crate::raster::PageRasterizer;

#[derive(Debug)]
pub struct Editor {
    config: EditorConfig,
    document: Document,
    active_page: usize,
    controller: InteractionController,
    notices: Vec<Notice>,
    library: Vec<ChartRef>,
}

impl Editor {
    /// A session over a fresh one-page document.
    pub fn new(config: EditorConfig) -> Self {
        Self::with_capture(config, Box::new(NoCapture))
    }

    /// Like [`Editor::new`] with a host pointer-capture hook.
    pub fn with_capture(config: EditorConfig, capture: Box<dyn PointerCapture>) -> Self {
        let controller = InteractionController::new(config.min_element_size, capture);
        Self {
            config,
            document: Document::new(),
            active_page: 0,
            controller,
            notices: Vec::new(),
            library: Vec::new(),
        }
    }

    /// A session over an existing document, first page active.
    pub fn from_document(config: EditorConfig, document: Document) -> Self {
        let mut editor = Self::new(config);
        editor.load_document(document);
        editor
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Replace the document; the first page becomes active.
    pub fn load_document(&mut self, document: Document) {
        self.controller.clear_selection();
        self.document = document;
        self.active_page = 0;
        log::debug!("loaded document with {} pages", self.document.page_count());
    }

    pub fn set_orientation(&mut self, orientation: PageOrientation) {
        self.document.orientation = orientation;
    }

    // -- notices ------------------------------------------------------------

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Drain queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub(crate) fn push_notice(&mut self, notice: Notice) {
        log::debug!("notice ({:?}): {}", notice.level, notice.message);
        self.notices.push(notice);
    }

    /// Queue a notice for `err` and hand it back.
    fn fail<T>(&mut self, err: impl Into<EditorError>) -> Result<T> {
        let err = err.into();
        self.push_notice(Notice::from(&err));
        Err(err)
    }

    // -- pages --------------------------------------------------------------

    pub fn active_page_index(&self) -> usize {
        self.active_page
    }

    pub fn active_page(&self) -> &Page {
        // `active_page` is kept in range by every page operation.
        &self.document.pages()[self.active_page]
    }

    /// Make page `index` active. Selection and any drag are cleared.
    /// Returns `false` for an out-of-range index.
    pub fn select_page(&mut self, index: usize) -> bool {
        if index >= self.document.page_count() {
            return false;
        }
        self.controller.clear_selection();
        self.active_page = index;
        true
    }

    /// Append an empty page and make it active.
    pub fn add_page(&mut self) -> usize {
        let index = self.document.add_page();
        self.select_page(index);
        index
    }

    /// Deep-copy page `index` right after it.
    pub fn duplicate_page(&mut self, index: usize) -> Result<usize> {
        match self.document.duplicate_page(index) {
            Ok(new_index) => {
                if new_index <= self.active_page {
                    self.active_page += 1;
                }
                Ok(new_index)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Delete page `index`. The only page cannot be deleted.
    pub fn delete_page(&mut self, index: usize) -> Result<()> {
        if let Err(e) = self.document.delete_page(index) {
            return self.fail(e);
        }
        if index == self.active_page {
            self.controller.clear_selection();
        }
        if index < self.active_page || self.active_page >= self.document.page_count() {
            self.active_page = self.active_page.saturating_sub(1);
        }
        Ok(())
    }

    /// Move page `from` to index `to`; the active page stays active.
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<()> {
        let active_id = self.active_page().id;
        if let Err(e) = self.document.move_page(from, to) {
            return self.fail(e);
        }
        self.active_page = self.document.page_index(active_id).unwrap_or(0);
        Ok(())
    }

    // -- elements -----------------------------------------------------------

    pub fn selected(&self) -> Option<&ElementId> {
        self.controller.selected()
    }

    pub fn selected_element(&self) -> Option<&Element> {
        self.selected().and_then(|id| self.active_page().element(id))
    }

    fn active_page_mut(&mut self) -> &mut Page {
        let index = self.active_page;
        &mut self.document.pages_mut()[index]
    }

    /// Add a default text box to the active page and select it.
    pub fn add_text_box(&mut self) -> ElementId {
        let id = self.document.next_element_id(ElementKind::Text);
        let defaults = &self.config.text_box;
        let element = Element::text_box(
            id.clone(),
            defaults.origin,
            defaults.size,
            defaults.content.clone(),
            defaults.style.clone(),
        );
        self.active_page_mut().insert_element(element);
        self.controller.select(id.clone());
        id
    }

    /// Copy element `id` of the active page, offset by the configured
    /// amount on both axes.
    pub fn duplicate_element(&mut self, id: &ElementId) -> Option<ElementId> {
        let offset = Point::new(self.config.duplicate_offset, self.config.duplicate_offset);
        self.document.duplicate_element(self.active_page, id, offset)
    }

    /// Remove element `id` from the active page; clears the selection if it
    /// was selected.
    pub fn delete_element(&mut self, id: &ElementId) -> bool {
        let removed = self.active_page_mut().remove_element(id).is_some();
        if removed && self.selected() == Some(id) {
            self.controller.clear_selection();
        }
        removed
    }

    pub fn update_element(&mut self, id: &ElementId, patch: &ElementPatch) -> bool {
        self.active_page_mut().update_element(id, patch)
    }

    // -- pointer ------------------------------------------------------------

    /// Double-click on element `id`: toggle its selection.
    pub fn activate(&mut self, id: &ElementId) {
        if self.active_page().element(id).is_some() {
            self.controller.activate(id);
        }
    }

    pub fn click_background(&mut self) {
        self.controller.click_background();
    }

    pub fn pointer_down(&mut self, point: Point) -> bool {
        let page = &self.document.pages()[self.active_page];
        self.controller.pointer_down(page, point)
    }

    pub fn pointer_move(&mut self, point: Point) -> bool {
        let index = self.active_page;
        let page = &mut self.document.pages_mut()[index];
        self.controller.pointer_move(page, point)
    }

    pub fn pointer_up(&mut self) {
        self.controller.pointer_up();
    }

    pub fn is_dragging(&self) -> bool {
        self.controller.is_dragging()
    }

    /// Remember the shape of the bitmap behind image source `key` so image
    /// hit boxes match what is drawn. Returns whether `bytes` could be read.
    pub fn record_image(&mut self, key: impl Into<String>, bytes: &[u8]) -> bool {
        self.controller.extents_mut().record_bytes(key, bytes)
    }

    pub fn image_extents(&self) -> &ImageExtents {
        self.controller.extents()
    }

    // -- drops --------------------------------------------------------------

    /// Ingest a drop on the active page. A rejected file queues a blocking
    /// notice and leaves the document unchanged.
    pub fn handle_drop(&mut self, payload: &DropPayload) -> Result<DropOutcome> {
        let action = match resolve_drop(payload, &self.config) {
            Ok(action) => action,
            Err(e) => return self.fail(e),
        };

        let outcome = match action {
            DropAction::Chart {
                origin,
                size,
                chart,
            } => {
                let id = self.document.next_element_id(ElementKind::ChartImage);
                self.active_page_mut()
                    .insert_element(Element::chart_image(id.clone(), origin, size, chart));
                DropOutcome::Inserted(id)
            }
            DropAction::External {
                origin,
                size,
                src,
                filename,
            } => {
                if let Ok(bytes) = decode_data_uri(&src) {
                    self.record_image(src.clone(), &bytes);
                }
                let id = self.document.next_element_id(ElementKind::ExternalImage);
                self.active_page_mut().insert_element(Element::external_image(
                    id.clone(),
                    origin,
                    size,
                    src,
                    filename,
                ));
                DropOutcome::Inserted(id)
            }
            DropAction::ReadFile { origin, size, file } => DropOutcome::Pending(PendingFileRead {
                page: self.active_page().id,
                origin,
                size,
                file,
            }),
            DropAction::Ignore => DropOutcome::Ignored,
        };
        Ok(outcome)
    }

    /// Insert the content of a finished file read on the page captured at
    /// drop time. If that page has since been deleted nothing happens.
    pub fn complete_file_read(&mut self, pending: &PendingFileRead, bytes: &[u8]) -> Option<ElementId> {
        self.document.page_index(pending.page)?;
        let id = self.document.next_element_id(ElementKind::ExternalImage);
        let src = pending.data_uri(bytes);
        self.record_image(src.clone(), bytes);
        let element = Element::external_image(
            id.clone(),
            pending.origin,
            pending.size,
            src,
            pending.file.name.clone(),
        );
        self.document.page_by_id_mut(pending.page)?.insert_element(element);
        Some(id)
    }

    /// Read a pending file and insert it. A read failure queues a blocking
    /// notice.
    pub async fn ingest_file(&mut self, pending: &PendingFileRead) -> Result<Option<ElementId>> {
        match pending.read().await {
            Ok(bytes) => Ok(self.complete_file_read(pending, &bytes)),
            Err(e) => self.fail(e),
        }
    }

    // -- library ------------------------------------------------------------

    pub fn library(&self) -> &[ChartRef] {
        &self.library
    }

    pub fn set_library(&mut self, charts: Vec<ChartRef>) {
        self.library = charts;
    }

    /// Reload the chart library of the configured job. Network failures
    /// queue a transient notice and keep the previous listing. Returns
    /// whether the listing was replaced.
    pub async fn refresh_library(&mut self, client: &LibraryClient) -> bool {
        let Some(job) = self.config.job_id.clone() else {
            log::debug!("no job configured, library left empty");
            return false;
        };
        match client.list_charts(&job).await {
            Ok(charts) => {
                self.library = charts;
                true
            }
            Err(e) => {
                log::warn!("library refresh failed: {e}");
                let _ = self.fail::<()>(e);
                false
            }
        }
    }

    // -- export -------------------------------------------------------------

    /// Export every page to a PDF. See [`pipeline::export_pdf`].
    pub fn export_pdf(&mut self, rasterizer: &mut dyn PageRasterizer, config: &ExportConfig) -> Result<Vec<u8>> {
        pipeline::export_pdf(self, rasterizer, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoticeLevel;
    use crate::ingest::DroppedFile;

    fn editor() -> Editor {
        Editor::new(EditorConfig::default())
    }

    #[test]
    fn add_text_box_uses_defaults_and_selects() {
        let mut ed = editor();
        let id = ed.add_text_box();
        let el = ed.selected_element().unwrap();
        assert_eq!(el.id, id);
        assert_eq!(el.position(), Point::new(100.0, 100.0));
        assert_eq!(el.text().unwrap().content, "Digite aqui...");
        assert_eq!(el.text().unwrap().style.font_size, 16.0);
    }

    #[test]
    fn deleting_only_page_queues_blocking_notice() {
        let mut ed = editor();
        assert!(ed.delete_page(0).is_err());
        assert_eq!(ed.document().page_count(), 1);
        let notices = ed.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Blocking);
        assert!(ed.notices().is_empty());
    }

    #[test]
    fn active_index_follows_page_edits() {
        let mut ed = editor();
        ed.add_page();
        ed.add_page();
        assert_eq!(ed.active_page_index(), 2);
        ed.delete_page(2).unwrap();
        assert_eq!(ed.active_page_index(), 1);
        ed.delete_page(0).unwrap();
        assert_eq!(ed.active_page_index(), 0);

        ed.add_page();
        let active_id = ed.active_page().id;
        ed.duplicate_page(0).unwrap();
        assert_eq!(ed.active_page().id, active_id);
        ed.move_page(2, 0).unwrap();
        assert_eq!(ed.active_page().id, active_id);
        assert_eq!(ed.active_page_index(), 0);
    }

    #[test]
    fn switching_pages_clears_selection() {
        let mut ed = editor();
        ed.add_text_box();
        ed.add_page();
        assert!(ed.selected().is_none());
        ed.select_page(0);
        assert!(ed.selected().is_none());
        assert!(!ed.select_page(9));
    }

    #[test]
    fn delete_selected_element_clears_selection() {
        let mut ed = editor();
        let id = ed.add_text_box();
        assert!(ed.delete_element(&id));
        assert!(ed.selected().is_none());
        assert!(!ed.delete_element(&id));
    }

    #[test]
    fn rejected_drop_leaves_document_untouched() {
        let mut ed = editor();
        let payload = DropPayload::at(Point::new(300.0, 300.0))
            .with_file(DroppedFile::from_bytes("data.csv", b"a,b".to_vec()));
        assert!(ed.handle_drop(&payload).is_err());
        assert!(ed.active_page().is_empty());
        assert_eq!(ed.take_notices()[0].level, NoticeLevel::Blocking);
    }

    #[test]
    fn file_lands_on_page_captured_at_drop_time() {
        let mut ed = editor();
        let payload = DropPayload::at(Point::new(300.0, 300.0))
            .with_file(DroppedFile::from_bytes("a.png", vec![1, 2, 3]));
        let DropOutcome::Pending(pending) = ed.handle_drop(&payload).unwrap() else {
            panic!("expected pending read");
        };
        ed.add_page();
        let id = ed.complete_file_read(&pending, &[1, 2, 3]).unwrap();
        assert!(ed.active_page().is_empty());
        let el = ed.document().page(0).unwrap().element(&id).unwrap();
        assert_eq!(el.position(), Point::new(50.0, 125.0));
        match &el.content {
            crate::element::ElementContent::ExternalImage { src, filename } => {
                assert_eq!(src, "data:image/png;base64,AQID");
                assert_eq!(filename, "a.png");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dropped_image_handle_follows_bitmap_shape() {
        let mut png = std::io::Cursor::new(Vec::new());
        image::RgbaImage::new(40, 10)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        let bytes = png.into_inner();

        let mut ed = editor();
        let payload = DropPayload::at(Point::new(300.0, 300.0))
            .with_file(DroppedFile::from_bytes("wide.png", bytes.clone()));
        let DropOutcome::Pending(pending) = ed.handle_drop(&payload).unwrap() else {
            panic!("expected pending read");
        };
        let id = ed.complete_file_read(&pending, &bytes).unwrap();
        assert_eq!(ed.image_extents().len(), 1);

        // Origin (50,125), 500 wide, drawn 125 tall: the handle is at (550,250).
        ed.activate(&id);
        assert!(ed.pointer_down(Point::new(550.0, 250.0)));
        ed.pointer_move(Point::new(650.0, 400.0));
        ed.pointer_up();
        let el = ed.active_page().element(&id).unwrap();
        assert_eq!(el.position(), Point::new(50.0, 125.0));
        assert_eq!(el.size(), crate::element::Size::new(600.0, 275.0));
    }

    #[test]
    fn file_read_for_deleted_page_is_dropped() {
        let mut ed = editor();
        ed.add_page();
        let payload = DropPayload::at(Point::new(0.0, 0.0))
            .with_file(DroppedFile::from_bytes("a.png", vec![1]));
        let DropOutcome::Pending(pending) = ed.handle_drop(&payload).unwrap() else {
            panic!("expected pending read");
        };
        ed.delete_page(1).unwrap();
        assert!(ed.complete_file_read(&pending, &[1]).is_none());
        assert!(ed.take_notices().is_empty());
    }

    #[tokio::test]
    async fn library_refresh_failure_is_transient() {
        let config = EditorConfig {
            job_id: Some("job".to_string()),
            ..EditorConfig::default()
        };
        let mut ed = Editor::new(config);
        ed.set_library(vec![ChartRef::new("g", "kept.png")]);
        let client = LibraryClient::new("http://127.0.0.1:9").unwrap();
        assert!(!ed.refresh_library(&client).await);
        assert_eq!(ed.library(), &[ChartRef::new("g", "kept.png")]);
        assert_eq!(ed.take_notices()[0].level, NoticeLevel::Transient);
    }
}
