use super::{fmt_num, AnnotationColor, ElementId, ElementTrait};
use crate::config::StrokeConfig;
use kurbo::{Point, Rect};

/// A rounded, unfilled rectangle outline in base space.
#[derive(Debug, Clone)]
pub struct RectElement {
    id: ElementId,
    pub rect: Rect,
    pub color: AnnotationColor,
    pub stroke_width: f64,
    pub corner_radius: f64,
}

impl RectElement {
    /// Build from two opposite corners in any order.
    pub fn from_corners(
        id: ElementId,
        p0: Point,
        p1: Point,
        color: AnnotationColor,
        strokes: &StrokeConfig,
    ) -> Self {
        Self {
            id,
            // from_points normalizes to min/max corners.
            rect: Rect::from_points(p0, p1),
            color,
            stroke_width: strokes.rect_width,
            corner_radius: strokes.rect_corner_radius,
        }
    }

    pub fn x(&self) -> f64 {
        self.rect.x0
    }

    pub fn y(&self) -> f64 {
        self.rect.y0
    }

    pub fn width(&self) -> f64 {
        self.rect.width()
    }

    pub fn height(&self) -> f64 {
        self.rect.height()
    }
}

impl ElementTrait for RectElement {
    fn id(&self) -> &ElementId {
        &self.id
    }

    fn bounds(&self) -> Rect {
        self.rect
    }

    fn to_markup(&self) -> String {
        format!(
            r#"<rect id="{}" rx="{}" x="{}" y="{}" width="{}" height="{}" style="stroke: {}; stroke-width: {}; fill: none;"></rect>"#,
            self.id,
            fmt_num(self.corner_radius),
            fmt_num(self.x()),
            fmt_num(self.y()),
            fmt_num(self.width()),
            fmt_num(self.height()),
            self.color.hex(),
            fmt_num(self.stroke_width)
        )
    }
}
