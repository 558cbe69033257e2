//! Coordinate mapping between the live viewport and base space.
//!
//! Base space is the unscaled size of the document as first rendered. It is
//! captured once per mount and everything persisted is expressed in it; the
//! live size changes with every zoom and resize. The scale is always derived
//! from the two sizes and never stored, so repeated zooming cannot drift.

use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;

/// Page orientation derived from the base size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn of(size: Size) -> Self {
        if size.width > size.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Per-axis ratio of live size to base size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    pub const IDENTITY: Scale = Scale { x: 1.0, y: 1.0 };
}

/// Snapshot of the viewport sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub base_width: f64,
    pub base_height: f64,
    pub current_width: f64,
    pub current_height: f64,
    pub orientation: Orientation,
}

/// Maps client (screen) coordinates into base space.
#[derive(Debug, Clone, Default)]
pub struct CoordinateMapper {
    base: OnceCell<Size>,
    current: Size,
    /// Screen-space origin of the document container, if mounted.
    origin: Option<Point>,
}

impl CoordinateMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapper whose base is fixed up front, as for embedded slides.
    pub fn with_base(base: Size) -> Self {
        let mapper = Self::default();
        // Fresh cell, cannot already be set.
        let _ = mapper.base.set(base);
        mapper
    }

    /// Forget the baseline. Called when a new document or page instance mounts.
    pub fn remount(&mut self, fixed_base: Option<Size>) {
        self.base = OnceCell::new();
        if let Some(base) = fixed_base {
            let _ = self.base.set(base);
        }
        log::debug!("Viewport remounted, fixed base: {fixed_base:?}");
    }

    /// Record the live rendered size of the document element.
    pub fn set_rendered_size(&mut self, size: Size) {
        self.current = size;
    }

    /// Record where the document container sits on screen. `None` means no
    /// container is mounted.
    pub fn set_container_origin(&mut self, origin: Option<Point>) {
        self.origin = origin;
    }

    pub fn has_container(&self) -> bool {
        self.origin.is_some()
    }

    pub fn current_size(&self) -> Size {
        self.current
    }

    /// The baseline, establishing it from the current size on first use.
    /// Nothing is captured until something has actually been rendered.
    pub fn base_size(&self) -> Size {
        if let Some(base) = self.base.get() {
            return *base;
        }
        if !has_area(self.current) {
            return self.current;
        }
        *self.base.get_or_init(|| self.current)
    }

    /// Use the document's natural size as the baseline, unless one is
    /// already established for this mount.
    pub fn establish_base(&mut self, natural: Size) {
        if !has_area(natural) {
            return;
        }
        if self.base.set(natural).is_ok() {
            log::debug!("Viewport base established at {natural:?}");
        }
    }

    pub fn is_base_established(&self) -> bool {
        self.base.get().is_some()
    }

    /// Live scale on each axis. Identity while nothing has been rendered.
    pub fn get_scale(&self) -> Scale {
        let base = self.base_size();
        if !has_area(base) {
            return Scale::IDENTITY;
        }
        Scale {
            x: self.current.width / base.width,
            y: self.current.height / base.height,
        }
    }

    /// Client coordinates to container-local screen coordinates, clamped to
    /// the rendered area. `None` until a container is mounted and the
    /// document has been laid out.
    pub fn to_local(&self, client: Point) -> Option<Point> {
        let origin = self.origin?;
        if !has_area(self.current) {
            return None;
        }
        let local = client - origin.to_vec2();
        Some(Point::new(
            local.x.clamp(0.0, self.current.width),
            local.y.clamp(0.0, self.current.height),
        ))
    }

    /// Local screen coordinates to base space.
    pub fn local_to_document(&self, local: Point) -> Point {
        let scale = self.get_scale();
        Point::new(local.x / scale.x, local.y / scale.y)
    }

    /// Client coordinates to base space. Out-of-bounds positions are clamped
    /// to the document edge. Returns `None` when no container is mounted.
    pub fn map_to_document_space(&self, client: Point) -> Option<Point> {
        self.to_local(client).map(|local| self.local_to_document(local))
    }

    /// Base space back to client coordinates.
    pub fn document_to_client(&self, doc: Point) -> Option<Point> {
        let origin = self.origin?;
        let scale = self.get_scale();
        Some(origin + Vec2::new(doc.x * scale.x, doc.y * scale.y))
    }

    pub fn viewport_state(&self) -> ViewportState {
        let base = self.base_size();
        ViewportState {
            base_width: base.width,
            base_height: base.height,
            current_width: self.current.width,
            current_height: self.current.height,
            orientation: Orientation::of(base),
        }
    }
}

fn has_area(size: Size) -> bool {
    size.width > 0.0 && size.height > 0.0
}

/// Rendered document size that fits `natural` into `window` (letterboxed on
/// the longer axis), multiplied by `zoom`.
pub fn fit_to_window(natural: Size, window: Size, zoom: f64) -> Size {
    if natural.width <= 0.0 || natural.height <= 0.0 || window.height <= 0.0 {
        return Size::ZERO;
    }
    let doc_ratio = natural.width / natural.height;
    let win_ratio = window.width / window.height;
    if doc_ratio > win_ratio {
        let width = window.width * zoom;
        Size::new(width, natural.height * width / natural.width)
    } else {
        let height = window.height * zoom;
        Size::new(natural.width * height / natural.height, height)
    }
}

/// Which axes of a rendered document exceed the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Overflow {
    pub x: bool,
    pub y: bool,
}

/// Overflowing axes should be start-aligned so the user can scroll to the
/// beginning; the others are centred.
pub fn overflow(rendered: Size, window: Size) -> Overflow {
    Overflow {
        x: rendered.width > window.width,
        y: rendered.height > window.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted(base: Size, current: Size) -> CoordinateMapper {
        let mut mapper = CoordinateMapper::new();
        mapper.set_rendered_size(base);
        mapper.base_size();
        mapper.set_rendered_size(current);
        mapper.set_container_origin(Some(Point::new(40.0, 60.0)));
        mapper
    }

    #[test]
    fn test_baseline_captured_once() {
        let mut mapper = CoordinateMapper::new();
        mapper.set_rendered_size(Size::new(800.0, 600.0));
        assert_eq!(mapper.base_size(), Size::new(800.0, 600.0));
        mapper.set_rendered_size(Size::new(1600.0, 1200.0));
        assert_eq!(mapper.base_size(), Size::new(800.0, 600.0));
        let scale = mapper.get_scale();
        assert!((scale.x - 2.0).abs() < f64::EPSILON);
        assert!((scale.y - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_remount_resets_baseline() {
        let mut mapper = mounted(Size::new(800.0, 600.0), Size::new(400.0, 300.0));
        mapper.remount(None);
        assert!(!mapper.is_base_established());
        assert_eq!(mapper.base_size(), Size::new(400.0, 300.0));
    }

    #[test]
    fn test_fixed_base_for_slides() {
        let mut mapper = CoordinateMapper::with_base(Size::new(1280.0, 720.0));
        mapper.set_rendered_size(Size::new(640.0, 360.0));
        let scale = mapper.get_scale();
        assert!((scale.x - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_map_clamps_out_of_bounds() {
        let mapper = mounted(Size::new(100.0, 100.0), Size::new(200.0, 200.0));
        let p = mapper.map_to_document_space(Point::new(0.0, 1000.0)).unwrap();
        assert!(p.x.abs() < f64::EPSILON);
        assert!((p.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_size_is_never_the_baseline() {
        let mut mapper = CoordinateMapper::new();
        mapper.set_container_origin(Some(Point::ZERO));
        assert!(mapper.map_to_document_space(Point::new(10.0, 10.0)).is_none());
        assert!(!mapper.is_base_established());

        mapper.establish_base(Size::new(1280.0, 720.0));
        mapper.set_rendered_size(Size::new(640.0, 360.0));
        assert_eq!(mapper.base_size(), Size::new(1280.0, 720.0));
        let p = mapper.map_to_document_space(Point::new(100.0, 50.0)).unwrap();
        assert!((p.x - 200.0).abs() < f64::EPSILON);
        assert!((p.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fixed_base_without_layout_maps_nothing() {
        let mut mapper = CoordinateMapper::with_base(Size::new(1280.0, 720.0));
        mapper.set_container_origin(Some(Point::ZERO));
        assert!(mapper.map_to_document_space(Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn test_map_without_container() {
        let mut mapper = mounted(Size::new(100.0, 100.0), Size::new(100.0, 100.0));
        mapper.set_container_origin(None);
        assert!(mapper.map_to_document_space(Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn test_round_trip_at_any_scale() {
        let base = Size::new(1280.0, 720.0);
        for factor in [0.25, 0.5, 1.0, 1.35, 2.0, 3.7] {
            let mapper = mounted(base, base * factor);
            let doc = Point::new(321.5, 123.25);
            let client = mapper.document_to_client(doc).unwrap();
            let back = mapper.map_to_document_space(client).unwrap();
            assert!((back.x - doc.x).abs() < 1e-9);
            assert!((back.y - doc.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_viewport_state() {
        let mapper = mounted(Size::new(600.0, 800.0), Size::new(300.0, 400.0));
        let state = mapper.viewport_state();
        assert_eq!(state.orientation, Orientation::Portrait);
        assert!((state.base_width - 600.0).abs() < f64::EPSILON);
        assert!((state.current_height - 400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_to_window() {
        // Wide document in a square window: width-bound.
        let size = fit_to_window(Size::new(1280.0, 720.0), Size::new(1000.0, 1000.0), 1.0);
        assert!((size.width - 1000.0).abs() < 1e-9);
        assert!((size.height - 562.5).abs() < 1e-9);
        // Tall document: height-bound, then zoomed.
        let size = fit_to_window(Size::new(600.0, 800.0), Size::new(1000.0, 1000.0), 1.5);
        assert!((size.height - 1500.0).abs() < 1e-9);
        assert!((size.width - 1125.0).abs() < 1e-9);
    }

    #[test]
    fn test_overflow() {
        let o = overflow(Size::new(1125.0, 1500.0), Size::new(1000.0, 1000.0));
        assert!(o.x && o.y);
        let o = overflow(Size::new(900.0, 500.0), Size::new(1000.0, 1000.0));
        assert_eq!(o, Overflow::default());
    }
}
