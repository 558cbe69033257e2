//! Text annotations, rendered as an HTML block inside a `foreignObject`.

use super::{escape_markup, fmt_num, AnnotationColor, ElementId, ElementTrait};
use kurbo::{Point, Rect, Size};

/// A committed text box in base space.
#[derive(Debug, Clone)]
pub struct TextElement {
    id: ElementId,
    /// Top-left corner of the text block.
    pub origin: Point,
    pub size: Size,
    pub content: String,
    pub color: AnnotationColor,
    pub font_size: f64,
}

impl TextElement {
    pub fn new(
        id: ElementId,
        origin: Point,
        size: Size,
        content: impl Into<String>,
        color: AnnotationColor,
        font_size: f64,
    ) -> Self {
        Self {
            id,
            origin,
            size,
            content: content.into(),
            color,
            font_size,
        }
    }
}

impl ElementTrait for TextElement {
    fn id(&self) -> &ElementId {
        &self.id
    }

    fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.origin, self.size)
    }

    fn to_markup(&self) -> String {
        let w = fmt_num(self.size.width);
        let h = fmt_num(self.size.height);
        format!(
            r#"<foreignObject id="{}" x="{}" y="{}" width="{w}" height="{h}" style="font-size: {}px; font-family: Open Sans;"><div style="width:{w}px; height:{h}px; color:{}">{}</div></foreignObject>"#,
            self.id,
            fmt_num(self.origin.x),
            fmt_num(self.origin.y),
            fmt_num(self.font_size),
            self.color.hex(),
            escape_markup(&self.content)
        )
    }
}
