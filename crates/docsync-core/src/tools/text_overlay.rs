//! The floating text entry box shown while a text annotation is typed.
//!
//! The overlay lives in screen space over the document. Its box starts at
//! the dragged rectangle and grows while the content overflows, one axis at
//! a time, without crossing the document edges or the configured maximum.
//! Backspacing shrinks it again, never below the dragged size.

use crate::config::TextOverlayLimits;
use crate::elements::{AnnotationColor, ElementId, TextElement};
use crate::viewport::Scale;
use kurbo::{Point, Rect, Size};

#[derive(Debug, Clone)]
pub struct TextOverlay {
    /// Box in container-local screen coordinates.
    rect: Rect,
    /// Size of the rectangle the user dragged; the shrink floor.
    dragged: Size,
    content: String,
    limits: TextOverlayLimits,
}

impl TextOverlay {
    pub fn open(rect: Rect, limits: TextOverlayLimits) -> Self {
        Self {
            rect,
            dragged: rect.size(),
            content: String::new(),
            limits,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Append typed text, truncated at the character limit, then grow if the
    /// host reports the content overflowing. Returns how many characters
    /// were accepted.
    pub fn type_text(&mut self, text: &str, overflowing: bool, document: Size) -> usize {
        let room = self
            .limits
            .max_chars
            .saturating_sub(self.content.chars().count());
        let accepted: String = text.chars().take(room).collect();
        let count = accepted.chars().count();
        self.content.push_str(&accepted);
        self.grow(overflowing, document);
        count
    }

    /// Delete the last character, then shrink if the content fits.
    pub fn backspace(&mut self, overflowing: bool) {
        self.content.pop();
        self.shrink(overflowing);
    }

    /// Grow one step, width first.
    pub fn grow(&mut self, overflowing: bool, document: Size) {
        if !overflowing {
            return;
        }
        let l = &self.limits;
        let (w, h) = (self.rect.width(), self.rect.height());
        if w + self.rect.x0 < document.width - l.edge_margin_x && w < l.max_width {
            self.rect.x1 += l.grow_x;
        } else if h + self.rect.y0 < document.height - l.edge_margin_y && h < l.max_height {
            self.rect.y1 += l.grow_y;
        }
    }

    /// Shrink back towards the dragged size while the content fits.
    pub fn shrink(&mut self, overflowing: bool) {
        if overflowing {
            return;
        }
        if self.rect.width() > self.dragged.width {
            self.rect.x1 = (self.rect.x1 - self.limits.shrink_x)
                .max(self.rect.x0 + self.dragged.width);
        }
        if self.rect.height() > self.dragged.height {
            self.rect.y1 = (self.rect.y1 - self.limits.shrink_y)
                .max(self.rect.y0 + self.dragged.height);
        }
    }

    /// Rough check whether the content plus `pending` would overflow the box,
    /// for hosts that cannot measure layout. Assumes an average glyph width
    /// of 0.6 em and a line height of 1.4 em.
    pub fn estimate_overflow(&self, pending: &str) -> bool {
        let font = self.limits.font_size;
        let per_line = (self.rect.width() / (font * 0.6)).floor().max(1.0) as usize;
        let chars = self.content.chars().count() + pending.chars().count();
        let lines = chars.div_ceil(per_line).max(1);
        lines as f64 * font * 1.4 > self.rect.height()
    }

    /// Convert the overlay into a base-space text element. Whitespace-only
    /// content produces nothing.
    pub fn commit(&self, id: ElementId, scale: Scale, color: AnnotationColor) -> Option<TextElement> {
        if self.content.trim().is_empty() {
            return None;
        }
        let inset = self.limits.inset;
        let origin = Point::new(
            self.rect.x0 / scale.x + inset,
            self.rect.y0 / scale.y + inset,
        );
        let size = Size::new(self.rect.width() / scale.x, self.rect.height() / scale.y);
        Some(TextElement::new(
            id,
            origin,
            size,
            self.content.clone(),
            color,
            self.limits.font_size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: Size = Size::new(1000.0, 800.0);

    fn overlay() -> TextOverlay {
        TextOverlay::open(
            Rect::new(100.0, 100.0, 160.0, 130.0),
            TextOverlayLimits::default(),
        )
    }

    #[test]
    fn test_grows_width_first() {
        let mut o = overlay();
        o.type_text("hello", true, DOC);
        assert!((o.rect().width() - 75.0).abs() < f64::EPSILON);
        assert!((o.rect().height() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_grows_height_at_max_width() {
        let mut o = TextOverlay::open(
            Rect::new(0.0, 0.0, 200.0, 30.0),
            TextOverlayLimits::default(),
        );
        o.type_text("x", true, DOC);
        assert!((o.rect().width() - 200.0).abs() < f64::EPSILON);
        assert!((o.rect().height() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_growth_without_overflow() {
        let mut o = overlay();
        o.type_text("hi", false, DOC);
        assert_eq!(o.rect(), Rect::new(100.0, 100.0, 160.0, 130.0));
    }

    #[test]
    fn test_respects_document_edge() {
        let mut o = TextOverlay::open(
            Rect::new(900.0, 760.0, 990.0, 790.0),
            TextOverlayLimits::default(),
        );
        o.type_text("x", true, DOC);
        assert_eq!(o.rect(), Rect::new(900.0, 760.0, 990.0, 790.0));
    }

    #[test]
    fn test_shrinks_back_to_dragged_size() {
        let mut o = overlay();
        o.type_text("a", true, DOC);
        o.type_text("b", true, DOC);
        assert!((o.rect().width() - 90.0).abs() < f64::EPSILON);
        o.backspace(false);
        o.backspace(false);
        o.backspace(false);
        assert!((o.rect().width() - 60.0).abs() < f64::EPSILON);
        assert!(o.content().is_empty());
    }

    #[test]
    fn test_shrink_stops_at_dragged_height() {
        let mut o = TextOverlay::open(
            Rect::new(0.0, 0.0, 200.0, 30.0),
            TextOverlayLimits::default(),
        );
        o.type_text("ab", true, DOC);
        assert!((o.rect().height() - 60.0).abs() < f64::EPSILON);
        o.backspace(false);
        assert!((o.rect().height() - 40.0).abs() < f64::EPSILON);
        o.backspace(false);
        assert!((o.rect().height() - 30.0).abs() < f64::EPSILON);
        o.backspace(false);
        assert!((o.rect().height() - 30.0).abs() < f64::EPSILON);
        assert!((o.rect().width() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_character_limit() {
        let mut o = overlay();
        let long = "x".repeat(250);
        assert_eq!(o.type_text(&long, false, DOC), 200);
        assert_eq!(o.type_text("y", false, DOC), 0);
        assert_eq!(o.content().len(), 200);
    }

    #[test]
    fn test_commit_uses_matching_axes() {
        let mut o = TextOverlay::open(
            Rect::new(200.0, 100.0, 300.0, 160.0),
            TextOverlayLimits::default(),
        );
        o.type_text("note", false, DOC);
        let text = o
            .commit(ElementId::new("a", 1), Scale { x: 2.0, y: 4.0 }, AnnotationColor::Red)
            .unwrap();
        assert!((text.origin.x - 106.0).abs() < f64::EPSILON);
        assert!((text.origin.y - 31.0).abs() < f64::EPSILON);
        assert!((text.size.width - 50.0).abs() < f64::EPSILON);
        assert!((text.size.height - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_commit_skips_blank() {
        let mut o = overlay();
        o.type_text("   ", false, DOC);
        assert!(o.commit(ElementId::new("a", 0), Scale::IDENTITY, AnnotationColor::Black).is_none());
    }

    #[test]
    fn test_estimate_overflow() {
        let mut o = overlay();
        o.type_text("short", false, DOC);
        assert!(!o.estimate_overflow(""));
        assert!(o.estimate_overflow(&"word ".repeat(10)));
        o.type_text(&"word ".repeat(10), false, DOC);
        assert!(o.estimate_overflow(""));
    }
}
