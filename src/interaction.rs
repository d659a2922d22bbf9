//! Pointer interaction: selection, drag-move and resize.
//!
//! The controller is the single owner of "what is selected" and "what is
//! being dragged". Dragging is a two-step gesture: an element must first be
//! activated (double-click) before a pointer-down on it starts a move.
//!
//! While a move or resize is in progress the host must keep delivering
//! pointer-move/up events even when the pointer leaves the element or the
//! canvas. The controller asks for that through [`PointerCapture`], acquiring
//! it exactly when a drag starts and releasing it exactly when it ends.

use std::collections::HashMap;
use std::io::Cursor;

use crate::document::Page;
use crate::element::{Element, ElementId, ElementPatch, Point, Size};

/// Side of the square resize handle at an element's bottom-right corner.
pub const HANDLE_SIZE: f32 = 12.0;

/// Current drag state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragMode {
    Idle,
    /// `anchor` is the pointer position relative to the element's origin at
    /// pointer-down; it stays constant for the whole gesture.
    Moving { anchor: Point },
    Resizing,
}

/// Which part of an element a point falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRegion {
    Body,
    ResizeHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub id: ElementId,
    pub region: HitRegion,
}

/// Height-to-width ratios of image bitmaps the editor has seen, keyed by
/// [`Element::image_source_key`]. Images are drawn at their element width
/// with this ratio, so hit boxes follow it whenever it is known.
#[derive(Debug, Clone, Default)]
pub struct ImageExtents {
    aspects: HashMap<String, f32>,
}

impl ImageExtents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspects.insert(key.into(), height as f32 / width as f32);
        }
    }

    /// Read the dimensions from an encoded image header. Returns whether
    /// they could be determined.
    pub fn record_bytes(&mut self, key: impl Into<String>, bytes: &[u8]) -> bool {
        let dims = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());
        match dims {
            Some((width, height)) => {
                self.insert(key, width, height);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    /// Box `el` occupies on screen: the drawn height for images of known
    /// shape, the stored size otherwise.
    pub fn drawn_size(&self, el: &Element) -> Size {
        el.image_source_key()
            .and_then(|key| self.aspects.get(&key))
            .map_or(el.size(), |aspect| Size::new(el.width, el.width * aspect))
    }
}

/// Find what lies under `point`. The selected element's resize handle wins,
/// then elements are tried from the top of the paint order down.
pub fn hit_test(
    page: &Page,
    point: Point,
    selected: Option<&ElementId>,
    extents: &ImageExtents,
) -> Option<Hit> {
    if let Some(el) = selected.and_then(|id| page.element(id)) {
        let size = extents.drawn_size(el);
        let corner = Point::new(el.x + size.width, el.y + size.height);
        let half = HANDLE_SIZE / 2.0;
        if (point.x - corner.x).abs() <= half && (point.y - corner.y).abs() <= half {
            return Some(Hit {
                id: el.id.clone(),
                region: HitRegion::ResizeHandle,
            });
        }
    }

    page.elements
        .iter()
        .rev()
        .find(|el| {
            let size = extents.drawn_size(el);
            point.x >= el.x && point.x <= el.x + size.width && point.y >= el.y && point.y <= el.y + size.height
        })
        .map(|el| Hit {
            id: el.id.clone(),
            region: HitRegion::Body,
        })
}

/// Host hook for the global pointer subscription used during a drag.
pub trait PointerCapture {
    /// Start routing pointer-move/up events to the editor regardless of
    /// where the pointer is.
    fn acquire(&mut self);
    /// Stop routing global pointer events.
    fn release(&mut self);
}

/// Capture for hosts that already deliver every pointer event.
#[derive(Debug, Default)]
pub struct NoCapture;

impl PointerCapture for NoCapture {
    fn acquire(&mut self) {}
    fn release(&mut self) {}
}

/// Selection and drag state machine for the active page.
pub struct InteractionController {
    selected: Option<ElementId>,
    mode: DragMode,
    min_size: Size,
    extents: ImageExtents,
    capture: Box<dyn PointerCapture>,
}

impl std::fmt::Debug for InteractionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionController")
            .field("selected", &self.selected)
            .field("mode", &self.mode)
            .field("min_size", &self.min_size)
            .field("extents", &self.extents.len())
            .finish_non_exhaustive()
    }
}

impl InteractionController {
    pub fn new(min_size: Size, capture: Box<dyn PointerCapture>) -> Self {
        Self {
            selected: None,
            mode: DragMode::Idle,
            min_size,
            extents: ImageExtents::new(),
            capture,
        }
    }

    pub fn extents(&self) -> &ImageExtents {
        &self.extents
    }

    pub fn extents_mut(&mut self) -> &mut ImageExtents {
        &mut self.extents
    }

    pub fn selected(&self) -> Option<&ElementId> {
        self.selected.as_ref()
    }

    pub fn mode(&self) -> DragMode {
        self.mode
    }

    pub fn is_dragging(&self) -> bool {
        self.mode != DragMode::Idle
    }

    /// Programmatic selection (e.g. a freshly added text box).
    pub fn select(&mut self, id: ElementId) {
        self.end_drag();
        self.selected = Some(id);
    }

    /// Double-click: toggles `id`, replacing any other selection.
    pub fn activate(&mut self, id: &ElementId) {
        self.end_drag();
        if self.selected.as_ref() == Some(id) {
            log::debug!("deselect {id}");
            self.selected = None;
        } else {
            log::debug!("select {id}");
            self.selected = Some(id.clone());
        }
    }

    /// Click on empty canvas.
    pub fn click_background(&mut self) {
        self.clear_selection();
    }

    /// Drop the selection and any drag in progress.
    pub fn clear_selection(&mut self) {
        self.end_drag();
        self.selected = None;
    }

    /// Start a move or resize when `point` is on the selected element.
    /// Returns whether a drag started.
    pub fn pointer_down(&mut self, page: &Page, point: Point) -> bool {
        if self.is_dragging() {
            return false;
        }
        let Some(selected) = self.selected.clone() else {
            return false;
        };
        let Some(hit) = hit_test(page, point, Some(&selected), &self.extents) else {
            return false;
        };
        if hit.id != selected {
            return false;
        }
        let Some(el) = page.element(&selected) else {
            return false;
        };

        let mode = match hit.region {
            HitRegion::Body => DragMode::Moving {
                anchor: point - el.position(),
            },
            HitRegion::ResizeHandle => DragMode::Resizing,
        };
        self.begin_drag(mode);
        true
    }

    /// Apply a pointer move to the dragged element. Returns whether the page
    /// was updated.
    pub fn pointer_move(&mut self, page: &mut Page, point: Point) -> bool {
        let Some(id) = self.selected.clone() else {
            return false;
        };
        match self.mode {
            DragMode::Idle => false,
            DragMode::Moving { anchor } => {
                page.update_element(&id, &ElementPatch::position(point - anchor))
            }
            DragMode::Resizing => {
                let Some(origin) = page.element(&id).map(|el| el.position()) else {
                    return false;
                };
                let width = (point.x - origin.x).max(self.min_size.width);
                let height = (point.y - origin.y).max(self.min_size.height);
                page.update_element(&id, &ElementPatch::size(width, height))
            }
        }
    }

    /// Finish any drag, wherever the pointer is.
    pub fn pointer_up(&mut self) {
        self.end_drag();
    }

    fn begin_drag(&mut self, mode: DragMode) {
        log::debug!("drag start: {mode:?}");
        self.capture.acquire();
        self.mode = mode;
    }

    fn end_drag(&mut self) {
        if self.mode != DragMode::Idle {
            log::debug!("drag end: {:?}", self.mode);
            self.mode = DragMode::Idle;
            self.capture.release();
        }
    }
}

impl Drop for InteractionController {
    fn drop(&mut self) {
        self.end_drag();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageId;
    use crate::element::ChartRef;
    use crate::style::TextStyle;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct CountingCapture {
        held: Rc<Cell<i32>>,
        acquired: Rc<Cell<u32>>,
    }

    impl PointerCapture for CountingCapture {
        fn acquire(&mut self) {
            self.held.set(self.held.get() + 1);
            self.acquired.set(self.acquired.get() + 1);
        }
        fn release(&mut self) {
            self.held.set(self.held.get() - 1);
        }
    }

    fn page_with(ids: &[&str]) -> Page {
        let mut page = Page::new(PageId::new(1));
        for (i, id) in ids.iter().enumerate() {
            page.insert_element(Element::text_box(
                ElementId::from(*id),
                Point::new(100.0 + i as f32 * 400.0, 100.0),
                Size::new(300.0, 100.0),
                "x",
                TextStyle::default(),
            ));
        }
        page
    }

    fn controller() -> (InteractionController, CountingCapture) {
        let capture = CountingCapture::default();
        let ctl = InteractionController::new(Size::new(100.0, 50.0), Box::new(capture.clone()));
        (ctl, capture)
    }

    #[test]
    fn unselected_element_does_not_drag() {
        let (mut ctl, capture) = controller();
        let page = page_with(&["a"]);
        assert!(!ctl.pointer_down(&page, Point::new(150.0, 150.0)));
        assert_eq!(ctl.mode(), DragMode::Idle);
        assert_eq!(capture.acquired.get(), 0);
    }

    #[test]
    fn activate_toggles_and_replaces() {
        let (mut ctl, _) = controller();
        let a = ElementId::from("a");
        let b = ElementId::from("b");
        ctl.activate(&a);
        assert_eq!(ctl.selected(), Some(&a));
        ctl.activate(&a);
        assert_eq!(ctl.selected(), None);
        ctl.activate(&a);
        ctl.activate(&b);
        assert_eq!(ctl.selected(), Some(&b));
        ctl.click_background();
        assert_eq!(ctl.selected(), None);
    }

    #[test]
    fn move_keeps_anchor() {
        let (mut ctl, capture) = controller();
        let mut page = page_with(&["a"]);
        let a = ElementId::from("a");
        ctl.activate(&a);
        assert!(ctl.pointer_down(&page, Point::new(130.0, 110.0)));
        assert_eq!(capture.held.get(), 1);

        ctl.pointer_move(&mut page, Point::new(230.0, 10.0));
        assert_eq!(page.element(&a).unwrap().position(), Point::new(200.0, 0.0));
        // No clamping: the element may leave the page.
        ctl.pointer_move(&mut page, Point::new(0.0, -50.0));
        assert_eq!(page.element(&a).unwrap().position(), Point::new(-30.0, -60.0));

        ctl.pointer_up();
        assert_eq!(ctl.mode(), DragMode::Idle);
        assert_eq!(capture.held.get(), 0);
        ctl.pointer_move(&mut page, Point::new(500.0, 500.0));
        assert_eq!(page.element(&a).unwrap().position(), Point::new(-30.0, -60.0));
    }

    #[test]
    fn resize_respects_floor() {
        let (mut ctl, _) = controller();
        let mut page = page_with(&["a"]);
        let a = ElementId::from("a");
        ctl.activate(&a);
        assert!(ctl.pointer_down(&page, Point::new(400.0, 200.0)));
        assert_eq!(ctl.mode(), DragMode::Resizing);

        ctl.pointer_move(&mut page, Point::new(600.0, 420.0));
        assert_eq!(page.element(&a).unwrap().size(), Size::new(500.0, 320.0));
        ctl.pointer_move(&mut page, Point::new(-200.0, 20.0));
        assert_eq!(page.element(&a).unwrap().size(), Size::new(100.0, 50.0));
    }

    #[test]
    fn topmost_element_is_hit_first() {
        let mut page = page_with(&["below"]);
        page.insert_element(Element::text_box(
            ElementId::from("above"),
            Point::new(150.0, 120.0),
            Size::new(100.0, 50.0),
            "y",
            TextStyle::default(),
        ));
        let extents = ImageExtents::new();
        let hit = hit_test(&page, Point::new(160.0, 130.0), None, &extents).unwrap();
        assert_eq!(hit.id, ElementId::from("above"));
        assert!(hit_test(&page, Point::new(5.0, 5.0), None, &extents).is_none());
    }

    #[test]
    fn image_handle_sits_at_drawn_corner() {
        let mut page = Page::new(PageId::new(1));
        let chart = ChartRef::new("xbar", "wide.png");
        let id = ElementId::from("image-1");
        page.insert_element(Element::chart_image(
            id.clone(),
            Point::new(0.0, 0.0),
            Size::new(500.0, 350.0),
            chart.clone(),
        ));
        let stored_corner = Point::new(500.0, 350.0);
        let drawn_corner = Point::new(500.0, 125.0);

        let unknown = ImageExtents::new();
        let hit = hit_test(&page, stored_corner, Some(&id), &unknown).unwrap();
        assert_eq!(hit.region, HitRegion::ResizeHandle);

        let mut extents = ImageExtents::new();
        extents.insert(chart.source_key(), 400, 100);
        let hit = hit_test(&page, drawn_corner, Some(&id), &extents).unwrap();
        assert_eq!(hit.region, HitRegion::ResizeHandle);
        // Below the drawn image is empty canvas.
        assert!(hit_test(&page, Point::new(250.0, 300.0), Some(&id), &extents).is_none());
    }

    #[test]
    fn extents_read_image_headers() {
        let img = image::RgbaImage::new(20, 10);
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();
        let mut extents = ImageExtents::new();
        assert!(extents.record_bytes("a", png.get_ref()));
        assert!(!extents.record_bytes("b", b"not an image"));
        let el = Element::external_image(
            ElementId::from("external-image-1"),
            Point::default(),
            Size::new(100.0, 350.0),
            "a",
            "a.png",
        );
        assert_eq!(extents.drawn_size(&el), Size::new(100.0, 50.0));
    }

    #[test]
    fn dropping_mid_drag_releases_capture() {
        let (mut ctl, capture) = controller();
        let page = page_with(&["a"]);
        ctl.activate(&ElementId::from("a"));
        ctl.pointer_down(&page, Point::new(150.0, 150.0));
        assert_eq!(capture.held.get(), 1);
        drop(ctl);
        assert_eq!(capture.held.get(), 0);
    }

    #[test]
    fn deselect_ends_drag() {
        let (mut ctl, capture) = controller();
        let page = page_with(&["a"]);
        ctl.activate(&ElementId::from("a"));
        ctl.pointer_down(&page, Point::new(150.0, 150.0));
        ctl.clear_selection();
        assert!(!ctl.is_dragging());
        assert_eq!(capture.held.get(), 0);
    }
}
