//! Annotation elements and their SVG markup.
//!
//! Every committed element is stored as a markup string keyed by its id. All
//! geometry inside the markup is in base space, so a peer rendering the layer
//! with `viewBox="0 0 baseWidth baseHeight"` sees it at the right place no
//! matter how far it is zoomed.

mod color;
mod path;
mod rect;
mod text;

pub use color::AnnotationColor;
pub use path::{PathElement, StrokeKind};
pub use rect::RectElement;
pub use text::TextElement;

use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a participant's client instance.
pub type PeerId = String;

/// Peer-scoped element identifier, rendered as `"<owner>-<seq>"`.
///
/// The owner prefix makes ids unique across peers without coordination, so
/// two peers drawing at the same time can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ElementId {
    owner: PeerId,
    seq: u64,
}

impl ElementId {
    pub fn new(owner: impl Into<PeerId>, seq: u64) -> Self {
        Self {
            owner: owner.into(),
            seq,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.owner, self.seq)
    }
}

/// Error returned when a store key is not a valid element id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid element id: {0}")]
pub struct InvalidElementId(pub String);

impl FromStr for ElementId {
    type Err = InvalidElementId;

    /// Peer ids may contain `-` themselves, so the split is on the last one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, seq) = s
            .rsplit_once('-')
            .ok_or_else(|| InvalidElementId(s.to_string()))?;
        if owner.is_empty() {
            return Err(InvalidElementId(s.to_string()));
        }
        let seq = seq.parse().map_err(|_| InvalidElementId(s.to_string()))?;
        Ok(Self::new(owner, seq))
    }
}

impl From<ElementId> for String {
    fn from(id: ElementId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ElementId {
    type Error = InvalidElementId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Per-peer, per-session allocator of element ids.
#[derive(Debug, Clone)]
pub struct ElementCounter {
    owner: PeerId,
    next: u64,
}

impl ElementCounter {
    pub fn new(owner: impl Into<PeerId>) -> Self {
        Self {
            owner: owner.into(),
            next: 0,
        }
    }

    /// Allocate the next id. Ids are never reused within a session.
    pub fn next_id(&mut self) -> ElementId {
        let id = ElementId::new(self.owner.clone(), self.next);
        self.next += 1;
        id
    }

    /// The id the next call to `next_id` will return.
    pub fn peek(&self) -> ElementId {
        ElementId::new(self.owner.clone(), self.next)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

/// Kind of committed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Path,
    Rect,
    Text,
}

/// Common behaviour of all element types.
pub trait ElementTrait {
    /// Get the element id.
    fn id(&self) -> &ElementId;

    /// Bounding box in base space.
    fn bounds(&self) -> Rect;

    /// Serialize to the SVG markup stored in the page store.
    fn to_markup(&self) -> String;
}

/// A committed annotation element.
#[derive(Debug, Clone)]
pub enum AnnotationElement {
    Path(PathElement),
    Rect(RectElement),
    Text(TextElement),
}

impl AnnotationElement {
    pub fn id(&self) -> &ElementId {
        match self {
            AnnotationElement::Path(e) => e.id(),
            AnnotationElement::Rect(e) => e.id(),
            AnnotationElement::Text(e) => e.id(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            AnnotationElement::Path(_) => ElementKind::Path,
            AnnotationElement::Rect(_) => ElementKind::Rect,
            AnnotationElement::Text(_) => ElementKind::Text,
        }
    }

    pub fn owner(&self) -> &str {
        self.id().owner()
    }

    pub fn bounds(&self) -> Rect {
        match self {
            AnnotationElement::Path(e) => e.bounds(),
            AnnotationElement::Rect(e) => e.bounds(),
            AnnotationElement::Text(e) => e.bounds(),
        }
    }

    pub fn markup(&self) -> String {
        match self {
            AnnotationElement::Path(e) => e.to_markup(),
            AnnotationElement::Rect(e) => e.to_markup(),
            AnnotationElement::Text(e) => e.to_markup(),
        }
    }
}

/// Format a coordinate for markup, rounded to two decimals.
pub(crate) fn fmt_num(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid "-0" in output.
    if rounded == 0.0 {
        return "0".to_string();
    }
    rounded.to_string()
}

/// Escape text for embedding in markup.
pub(crate) fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
