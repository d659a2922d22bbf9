//! Page and document model.
//!
//! A [`Document`] is an ordered list of [`Page`]s; a page is an ordered list
//! of [`Element`]s whose order is also the paint order (last paints on top
//! and is hit first). A document never has fewer than one page.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementId, ElementKind, ElementPatch, Point};
use crate::error::DocumentError;
use crate::pipeline::PageOrientation;

/// Identifier of a page, unique within its document and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(u64);

impl PageId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// One sheet of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Page {
    pub fn new(id: PageId) -> Self {
        Self {
            id,
            elements: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Append an element; it paints above everything already on the page.
    pub fn insert_element(&mut self, element: Element) {
        log::debug!("{}: insert {}", self.id, element.id);
        self.elements.push(element);
    }

    /// Merge `patch` into the element with `id`. A missing id is a silent
    /// no-op; returns whether an element was found.
    pub fn update_element(&mut self, id: &ElementId, patch: &ElementPatch) -> bool {
        match self.element_mut(id) {
            Some(el) => {
                el.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Remove the first element with `id`, if present.
    pub fn remove_element(&mut self, id: &ElementId) -> Option<Element> {
        let index = self.position(id)?;
        log::debug!("{}: remove {}", self.id, id);
        Some(self.elements.remove(index))
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| &e.id == id)
    }

    pub fn element_mut(&mut self, id: &ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| &e.id == id)
    }

    /// Paint-order index of the element with `id`.
    pub fn position(&self, id: &ElementId) -> Option<usize> {
        self.elements.iter().position(|e| &e.id == id)
    }

    fn duplicate(&self, id: PageId) -> Page {
        Page {
            id,
            elements: self
                .elements
                .iter()
                .map(|e| e.duplicate(e.id.clone(), Point::default()))
                .collect(),
        }
    }
}

/// Largest page id or element token a loaded document may carry
/// (2^53 - 1, the largest integer the web editor's numbers hold exactly).
/// Counters start at most one past it, so they never run out.
pub const MAX_LOADED_ID: u64 = (1 << 53) - 1;

/// Monotonic id source shared by every page of a document.
#[derive(Debug, Clone, PartialEq)]
struct IdGenerator {
    next_page: u64,
    next_element: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self {
            next_page: 1,
            next_element: 1,
        }
    }
}

impl IdGenerator {
    fn page(&mut self) -> PageId {
        let id = PageId::new(self.next_page);
        self.next_page += 1;
        id
    }

    fn element(&mut self, kind: ElementKind) -> ElementId {
        let id = ElementId::new(format!("{}-{}", kind.as_str(), self.next_element));
        self.next_element += 1;
        id
    }

    /// Move both counters past every id already present in `pages`.
    ///
    /// Page ids above [`MAX_LOADED_ID`] are rejected. Element tokens above it
    /// are skipped: the counter can never count up to them.
    fn reseed(&mut self, pages: &[Page]) -> Result<(), DocumentError> {
        for page in pages {
            let next = page
                .id
                .0
                .checked_add(1)
                .filter(|_| page.id.0 <= MAX_LOADED_ID)
                .ok_or_else(|| DocumentError::InvalidJson(format!("page id {} is too large", page.id.0)))?;
            self.next_page = self.next_page.max(next);
            for el in &page.elements {
                match el.id.token() {
                    Some(token) if token <= MAX_LOADED_ID => {
                        if let Some(next) = token.checked_add(1) {
                            self.next_element = self.next_element.max(next);
                        }
                    }
                    Some(_) => log::debug!("{}: id token out of counter range, ignored", el.id),
                    None => {}
                }
            }
        }
        Ok(())
    }
}

/// An exportable report: ordered pages plus the output orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pages: Vec<Page>,
    #[serde(default)]
    pub orientation: PageOrientation,
    #[serde(skip)]
    ids: IdGenerator,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A document with one empty page.
    pub fn new() -> Self {
        let mut ids = IdGenerator::default();
        let first = Page::new(ids.page());
        Self {
            pages: vec![first],
            orientation: PageOrientation::default(),
            ids,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub(crate) fn pages_mut(&mut self) -> &mut [Page] {
        &mut self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn page_mut(&mut self, index: usize) -> Option<&mut Page> {
        self.pages.get_mut(index)
    }

    pub fn page_index(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }

    pub fn page_by_id_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    fn check_index(&self, index: usize) -> Result<(), DocumentError> {
        if index < self.pages.len() {
            Ok(())
        } else {
            Err(DocumentError::PageOutOfRange {
                index,
                len: self.pages.len(),
            })
        }
    }

    /// Append an empty page and return its index.
    pub fn add_page(&mut self) -> usize {
        let page = Page::new(self.ids.page());
        log::debug!("add {}", page.id);
        self.pages.push(page);
        self.pages.len() - 1
    }

    /// Deep-copy the page at `index` into a new page right after it. Element
    /// ids are kept (they only need to be unique per page); the page gets a
    /// fresh id. Returns the new page's index.
    pub fn duplicate_page(&mut self, index: usize) -> Result<usize, DocumentError> {
        self.check_index(index)?;
        let copy = self.pages[index].duplicate(self.ids.page());
        log::debug!("duplicate {} as {}", self.pages[index].id, copy.id);
        self.pages.insert(index + 1, copy);
        Ok(index + 1)
    }

    /// Remove the page at `index`. Removing the only page is rejected.
    pub fn delete_page(&mut self, index: usize) -> Result<Page, DocumentError> {
        self.check_index(index)?;
        if self.pages.len() == 1 {
            return Err(DocumentError::LastPage);
        }
        let page = self.pages.remove(index);
        log::debug!("delete {}", page.id);
        Ok(page)
    }

    /// Move the page at `from` so it ends up at index `to`.
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<(), DocumentError> {
        self.check_index(from)?;
        self.check_index(to)?;
        let page = self.pages.remove(from);
        self.pages.insert(to, page);
        Ok(())
    }

    /// Fresh element id, never handed out before in this document.
    pub fn next_element_id(&mut self, kind: ElementKind) -> ElementId {
        self.ids.element(kind)
    }

    /// Copy element `id` on page `page_index` under a fresh id, shifted by
    /// `offset`, and insert it immediately after the source.
    pub fn duplicate_element(
        &mut self,
        page_index: usize,
        id: &ElementId,
        offset: Point,
    ) -> Option<ElementId> {
        let source_index = self.pages.get(page_index)?.position(id)?;
        let kind = self.pages[page_index].elements[source_index].kind();
        let new_id = self.ids.element(kind);
        let page = &mut self.pages[page_index];
        let copy = page.elements[source_index].duplicate(new_id.clone(), offset);
        log::debug!("{}: duplicate {} as {}", page.id, id, new_id);
        page.elements.insert(source_index + 1, copy);
        Some(new_id)
    }

    /// Serialise to pretty JSON.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// Deserialise from JSON. The loaded pages must satisfy the model
    /// invariants (see [`Document::validate`]); id counters are moved past
    /// every loaded id.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let mut doc: Document =
            serde_json::from_str(json).map_err(|e| DocumentError::InvalidJson(e.to_string()))?;
        doc.validate()?;
        doc.ids.reseed(&doc.pages)?;
        if doc.pages.is_empty() {
            let id = doc.ids.page();
            doc.pages.push(Page::new(id));
        }
        Ok(doc)
    }

    /// Check the invariants the editor relies on: page ids unique in the
    /// document, element ids unique per page, finite coordinates, positive
    /// width (and positive height for text) and a positive font size.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let invalid = |msg: String| Err(DocumentError::InvalidJson(msg));
        let mut page_ids = HashSet::new();
        for page in &self.pages {
            if !page_ids.insert(page.id) {
                return invalid(format!("duplicate page id {}", page.id.0));
            }
            let mut element_ids = HashSet::new();
            for el in &page.elements {
                if !element_ids.insert(&el.id) {
                    return invalid(format!("{}: duplicate element id {}", page.id, el.id));
                }
                if !(el.x.is_finite() && el.y.is_finite()) {
                    return invalid(format!("{}: position is not finite", el.id));
                }
                if !(el.width.is_finite() && el.width > 0.0) {
                    return invalid(format!("{}: width must be positive, got {}", el.id, el.width));
                }
                if !el.height.is_finite() {
                    return invalid(format!("{}: height is not finite", el.id));
                }
                if let Some(text) = el.text() {
                    if el.height <= 0.0 {
                        return invalid(format!("{}: height must be positive, got {}", el.id, el.height));
                    }
                    let size = text.style.font_size;
                    if !(size.is_finite() && size > 0.0) {
                        return invalid(format!("{}: font size must be positive, got {size}", el.id));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Size;
    use crate::style::TextStyle;

    fn text(doc: &mut Document, x: f32) -> Element {
        Element::text_box(
            doc.next_element_id(ElementKind::Text),
            Point::new(x, 0.0),
            Size::new(300.0, 100.0),
            "t",
            TextStyle::default(),
        )
    }

    #[test]
    fn new_document_has_one_empty_page() {
        let doc = Document::new();
        assert_eq!(doc.page_count(), 1);
        assert!(doc.pages()[0].is_empty());
    }

    #[test]
    fn deleting_last_page_is_rejected() {
        let mut doc = Document::new();
        assert_eq!(doc.delete_page(0), Err(DocumentError::LastPage));
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn page_ids_are_never_reused() {
        let mut doc = Document::new();
        let second = doc.add_page();
        let removed = doc.delete_page(second).unwrap();
        let third = doc.add_page();
        assert_ne!(doc.pages()[third].id, removed.id);
    }

    #[test]
    fn update_missing_element_is_noop() {
        let mut doc = Document::new();
        let page = doc.page_mut(0).unwrap();
        assert!(!page.update_element(&ElementId::from("ghost"), &ElementPatch::size(1.0, 1.0)));
        assert!(page.remove_element(&ElementId::from("ghost")).is_none());
    }

    #[test]
    fn duplicate_element_goes_right_after_source() {
        let mut doc = Document::new();
        let a = text(&mut doc, 0.0);
        let b = text(&mut doc, 50.0);
        let a_id = a.id.clone();
        doc.page_mut(0).unwrap().insert_element(a);
        doc.page_mut(0).unwrap().insert_element(b);

        let copy_id = doc
            .duplicate_element(0, &a_id, Point::new(20.0, 20.0))
            .unwrap();
        let page = doc.page(0).unwrap();
        assert_eq!(page.position(&copy_id), Some(1));
        let copy = page.element(&copy_id).unwrap();
        assert_eq!(copy.position(), Point::new(20.0, 20.0));
        assert_ne!(copy.id, a_id);
    }

    #[test]
    fn duplicate_page_deep_copies() {
        let mut doc = Document::new();
        for i in 0..3 {
            let el = text(&mut doc, i as f32 * 10.0);
            doc.page_mut(0).unwrap().insert_element(el);
        }
        doc.add_page();
        let copy_index = doc.duplicate_page(0).unwrap();
        assert_eq!(copy_index, 1);
        assert_eq!(doc.page_count(), 3);

        let original_ids: Vec<_> = doc.pages()[0].elements.iter().map(|e| e.id.clone()).collect();
        let copy_ids: Vec<_> = doc.pages()[1].elements.iter().map(|e| e.id.clone()).collect();
        assert_eq!(original_ids, copy_ids);
        assert_ne!(doc.pages()[0].id, doc.pages()[1].id);

        let first = original_ids[0].clone();
        doc.page_mut(1)
            .unwrap()
            .update_element(&first, &ElementPatch::position(Point::new(999.0, 999.0)));
        assert_eq!(
            doc.page(0).unwrap().element(&first).unwrap().position(),
            Point::new(0.0, 0.0)
        );
    }

    #[test]
    fn move_page_reorders() {
        let mut doc = Document::new();
        doc.add_page();
        doc.add_page();
        let ids: Vec<_> = doc.pages().iter().map(|p| p.id).collect();
        doc.move_page(0, 2).unwrap();
        let moved: Vec<_> = doc.pages().iter().map(|p| p.id).collect();
        assert_eq!(moved, vec![ids[1], ids[2], ids[0]]);
        assert!(doc.move_page(0, 3).is_err());
    }

    #[test]
    fn json_round_trip_reseeds_ids() {
        let mut doc = Document::new();
        let el = text(&mut doc, 0.0);
        doc.page_mut(0).unwrap().insert_element(el);
        doc.page_mut(0).unwrap().insert_element(Element::text_box(
            ElementId::from("text-1712000000000"),
            Point::default(),
            Size::new(300.0, 100.0),
            "legacy",
            TextStyle::default(),
        ));

        let json = doc.to_json().unwrap();
        let mut loaded = Document::from_json(&json).unwrap();
        assert_eq!(loaded.pages(), doc.pages());

        let fresh = loaded.next_element_id(ElementKind::Text);
        assert_eq!(fresh.as_str(), "text-1712000000001");
        let page_index = loaded.add_page();
        assert!(loaded.pages()[page_index].id.get() > doc.pages()[0].id.get());
    }

    #[test]
    fn empty_json_document_gets_a_page() {
        let doc = Document::from_json(r#"{"pages":[]}"#).unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    fn text_json(id: &str, width: f32, height: f32) -> String {
        format!(
            r##"{{"id":"{id}","type":"text","x":0,"y":0,"width":{width},"height":{height},
                "content":"t","fontSize":16,"color":"#000000"}}"##
        )
    }

    fn rejected(json: &str) -> String {
        match Document::from_json(json) {
            Err(DocumentError::InvalidJson(msg)) => msg,
            other => panic!("expected InvalidJson, got {other:?}"),
        }
    }

    #[test]
    fn oversized_page_id_is_rejected() {
        let msg = rejected(r#"{"pages":[{"id":18446744073709551615,"elements":[]}]}"#);
        assert!(msg.contains("too large"), "{msg}");
        let doc = Document::from_json(&format!(r#"{{"pages":[{{"id":{MAX_LOADED_ID}}}]}}"#)).unwrap();
        assert_eq!(doc.pages()[0].id.get(), MAX_LOADED_ID);
    }

    #[test]
    fn huge_element_token_never_collides() {
        let json = format!(
            r#"{{"pages":[{{"id":1,"elements":[{},{}]}}]}}"#,
            text_json("text-18446744073709551615", 300.0, 100.0),
            text_json(&format!("text-{MAX_LOADED_ID}"), 300.0, 100.0),
        );
        let mut doc = Document::from_json(&json).unwrap();
        let fresh = doc.next_element_id(ElementKind::Text);
        assert_eq!(fresh.as_str(), format!("text-{}", MAX_LOADED_ID + 1));
        let again = doc.next_element_id(ElementKind::Text);
        assert_ne!(again, fresh);
        assert!(doc.pages()[0].element(&fresh).is_none());
        assert!(doc.pages()[0].element(&again).is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = format!(
            r#"{{"pages":[{{"id":1,"elements":[{},{}]}}]}}"#,
            text_json("text-1", 300.0, 100.0),
            text_json("text-1", 200.0, 50.0),
        );
        assert!(rejected(&json).contains("duplicate element id text-1"));

        let pages = r#"{"pages":[{"id":4,"elements":[]},{"id":4,"elements":[]}]}"#;
        assert!(rejected(pages).contains("duplicate page id 4"));

        // The same element id on two pages is fine.
        let json = format!(
            r#"{{"pages":[{{"id":1,"elements":[{}]}},{{"id":2,"elements":[{}]}}]}}"#,
            text_json("text-1", 300.0, 100.0),
            text_json("text-1", 300.0, 100.0),
        );
        assert_eq!(Document::from_json(&json).unwrap().page_count(), 2);
    }

    #[test]
    fn bad_geometry_is_rejected() {
        for (width, height) in [(-5.0, 100.0), (0.0, 100.0), (300.0, 0.0), (300.0, -1.0)] {
            let json = format!(
                r#"{{"pages":[{{"id":1,"elements":[{}]}}]}}"#,
                text_json("text-1", width, height)
            );
            rejected(&json);
        }
        // Out-of-range floats overflow f32 to infinity.
        let json = format!(
            r#"{{"pages":[{{"id":1,"elements":[{}]}}]}}"#,
            text_json("text-1", 300.0, 100.0).replace(r#""x":0"#, r#""x":1e300"#)
        );
        assert!(rejected(&json).contains("not finite"));

        // Image height is advisory and may be zero.
        let image = r#"{"pages":[{"id":1,"elements":[{"id":"external-image-1",
            "type":"external-image","x":0,"y":0,"width":500,"height":0,
            "src":"https://h/a.png","filename":"a.png"}]}]}"#;
        assert!(Document::from_json(image).is_ok());
    }
}
