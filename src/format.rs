//! Format toolbar operations.
//!
//! Every control acts on the selected element of the active page and only
//! when it is a text box; with nothing selected, or an image selected, the
//! controls are disabled and each call is a no-op returning `false`.

use crate::editor::Editor;
use crate::element::{ElementId, ElementPatch};
use crate::style::{Color, TextStyle};

impl Editor {
    /// Style of the selected text box, or `None` when the controls are
    /// disabled.
    pub fn format_state(&self) -> Option<&TextStyle> {
        self.selected_element()
            .and_then(|el| el.text())
            .map(|t| &t.style)
    }

    fn selected_text_id(&self) -> Option<ElementId> {
        self.selected_element()
            .filter(|el| el.is_text())
            .map(|el| el.id.clone())
    }

    fn patch_selected_text(&mut self, patch: ElementPatch) -> bool {
        match self.selected_text_id() {
            Some(id) => self.update_element(&id, &patch),
            None => false,
        }
    }

    pub fn set_font_size(&mut self, size: f32) -> bool {
        if !(size.is_finite() && size > 0.0) {
            return false;
        }
        self.patch_selected_text(ElementPatch {
            font_size: Some(size),
            ..ElementPatch::default()
        })
    }

    pub fn toggle_bold(&mut self) -> bool {
        let Some(bold) = self.format_state().map(|s| !s.bold) else {
            return false;
        };
        self.patch_selected_text(ElementPatch {
            bold: Some(bold),
            ..ElementPatch::default()
        })
    }

    pub fn toggle_italic(&mut self) -> bool {
        let Some(italic) = self.format_state().map(|s| !s.italic) else {
            return false;
        };
        self.patch_selected_text(ElementPatch {
            italic: Some(italic),
            ..ElementPatch::default()
        })
    }

    pub fn toggle_underline(&mut self) -> bool {
        let Some(underline) = self.format_state().map(|s| !s.underline) else {
            return false;
        };
        self.patch_selected_text(ElementPatch {
            underline: Some(underline),
            ..ElementPatch::default()
        })
    }

    /// Set the text colour from a `#rrggbb`/`#rgb` string; invalid input is
    /// ignored.
    pub fn set_color(&mut self, hex: &str) -> bool {
        let Some(color) = Color::from_hex(hex) else {
            log::debug!("ignoring invalid colour {hex:?}");
            return false;
        };
        self.patch_selected_text(ElementPatch {
            color: Some(color),
            ..ElementPatch::default()
        })
    }

    /// Replace the content of the selected text box.
    pub fn set_text(&mut self, text: &str) -> bool {
        self.patch_selected_text(ElementPatch::content(text))
    }
}
