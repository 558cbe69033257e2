//! Freehand ink and highlighter strokes.

use super::{fmt_num, AnnotationColor, ElementId, ElementTrait};
use crate::config::StrokeConfig;
use kurbo::{Point, Rect};

/// Which freehand tool produced the stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeKind {
    Pencil,
    /// Wider, translucent stroke.
    Highlight,
}

/// An open or finished freehand path. Points are in base space, in the order
/// they were drawn.
#[derive(Debug, Clone)]
pub struct PathElement {
    id: ElementId,
    pub kind: StrokeKind,
    pub color: AnnotationColor,
    pub stroke_width: f64,
    /// Alpha byte for highlight strokes.
    pub alpha: Option<u8>,
    points: Vec<Point>,
}

impl PathElement {
    /// Start a new path at `start`.
    pub fn start(
        id: ElementId,
        kind: StrokeKind,
        color: AnnotationColor,
        strokes: &StrokeConfig,
        start: Point,
    ) -> Self {
        let (stroke_width, alpha) = match kind {
            StrokeKind::Pencil => (strokes.pencil_width, None),
            StrokeKind::Highlight => (strokes.highlight_width, Some(strokes.highlight_alpha)),
        };
        Self {
            id,
            kind,
            color,
            stroke_width,
            alpha,
            points: vec![start],
        }
    }

    /// Append a point to the path.
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn stroke_css(&self) -> String {
        match self.alpha {
            Some(alpha) => self.color.hex_with_alpha(alpha),
            None => self.color.hex(),
        }
    }

    /// The `d` attribute. The first point is repeated after `L` so that a
    /// single click still draws a dot.
    fn path_data(&self) -> String {
        let mut iter = self.points.iter();
        let Some(first) = iter.next() else {
            return String::new();
        };
        let head = format!("{},{}", fmt_num(first.x), fmt_num(first.y));
        let mut d = format!("M{head}L{head}");
        for p in iter {
            d.push(' ');
            d.push_str(&fmt_num(p.x));
            d.push(',');
            d.push_str(&fmt_num(p.y));
        }
        d
    }
}

impl ElementTrait for PathElement {
    fn id(&self) -> &ElementId {
        &self.id
    }

    fn bounds(&self) -> Rect {
        let mut iter = self.points.iter();
        let Some(first) = iter.next() else {
            return Rect::ZERO;
        };
        iter.fold(Rect::from_points(*first, *first), |acc, p| {
            acc.union_pt(*p)
        })
    }

    fn to_markup(&self) -> String {
        format!(
            r#"<path id="{}" stroke-linejoin="round" style="stroke: {}; stroke-width: {}; fill: none;" d="{}"></path>"#,
            self.id,
            self.stroke_css(),
            fmt_num(self.stroke_width),
            self.path_data()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pencil(start: Point) -> PathElement {
        PathElement::start(
            ElementId::new("p", 0),
            StrokeKind::Pencil,
            AnnotationColor::Purple,
            &StrokeConfig::default(),
            start,
        )
    }

    #[test]
    fn test_path_points_in_order() {
        let mut path = pencil(Point::new(1.0, 2.0));
        path.push(Point::new(3.0, 4.0));
        path.push(Point::new(5.0, 6.0));
        assert_eq!(path.len(), 3);
        assert_eq!(path.points()[2], Point::new(5.0, 6.0));
    }

    #[test]
    fn test_pencil_markup() {
        let mut path = pencil(Point::new(10.0, 20.0));
        path.push(Point::new(30.5, 40.0));
        let markup = path.to_markup();
        assert!(markup.starts_with(r#"<path id="p-0""#));
        assert!(markup.contains("stroke: #c9c9ff; stroke-width: 4;"));
        assert!(markup.contains(r#"d="M10,20L10,20 30.5,40""#));
    }

    #[test]
    fn test_highlight_is_translucent() {
        let path = PathElement::start(
            ElementId::new("p", 1),
            StrokeKind::Highlight,
            AnnotationColor::Yellow,
            &StrokeConfig::default(),
            Point::ZERO,
        );
        let markup = path.to_markup();
        assert!(markup.contains("stroke: #fedd9e6e; stroke-width: 12;"));
    }

    #[test]
    fn test_bounds() {
        let mut path = pencil(Point::new(10.0, 50.0));
        path.push(Point::new(40.0, 20.0));
        let b = path.bounds();
        assert!((b.x0 - 10.0).abs() < f64::EPSILON);
        assert!((b.y0 - 20.0).abs() < f64::EPSILON);
        assert!((b.x1 - 40.0).abs() < f64::EPSILON);
        assert!((b.y1 - 50.0).abs() < f64::EPSILON);
    }
}
