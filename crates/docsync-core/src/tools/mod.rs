//! Tool system for annotating.
//!
//! [`ToolStateMachine`] interprets pointer gestures against the active tool
//! and reports what happened as [`ToolEffect`]s. It never touches the store
//! or the render layer itself; the session applies the effects.

mod text_overlay;

pub use text_overlay::TextOverlay;

use crate::config::{SessionConfig, StrokeConfig, TextOverlayLimits};
use crate::elements::{
    AnnotationColor, AnnotationElement, ElementCounter, ElementId, ElementTrait, PathElement,
    RectElement, StrokeKind,
};
use crate::input::PointerInput;
use crate::viewport::CoordinateMapper;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    #[default]
    Cursor,
    Pencil,
    Highlight,
    Shape,
    Text,
    Erase,
    /// Activation clears the page; never stays selected.
    EraseAll,
    /// Colour picker; selecting it draws nothing.
    Color,
}

impl ToolKind {
    fn stroke_kind(self) -> Option<StrokeKind> {
        match self {
            ToolKind::Pencil => Some(StrokeKind::Pencil),
            ToolKind::Highlight => Some(StrokeKind::Highlight),
            _ => None,
        }
    }

    /// Tools that show a tracer box while dragging.
    fn uses_tracer(self) -> bool {
        matches!(self, ToolKind::Shape | ToolKind::Text)
    }
}

/// State of a pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawingState {
    #[default]
    Idle,
    Drawing,
}

/// A gesture in progress. Points are container-local screen coordinates;
/// they are converted to base space when an element is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSession {
    pub tool: ToolKind,
    pub start: Point,
    pub current: Point,
    pub state: DrawingState,
}

/// Something the session has to apply to the layer, the store or the channel.
#[derive(Debug, Clone)]
pub enum ToolEffect {
    /// An unfinished stroke to show locally. Not replicated.
    DraftUpdated { id: ElementId, markup: String },
    /// An unfinished stroke was abandoned.
    DraftDiscarded(ElementId),
    /// A finished element to render and write to the page store.
    Commit(AnnotationElement),
    /// Screen-space tracer box; `None` hides it.
    TracerChanged(Option<Rect>),
    /// Element selected for erasing.
    Dimmed(ElementId),
    /// Remove these elements locally and from the store.
    Erase(Vec<ElementId>),
    /// Clear the whole page.
    EraseAll,
    /// Show the text entry box at this screen-space rectangle.
    TextOverlayOpened(Rect),
    TextOverlayClosed,
}

/// Owns the active tool, the current gesture and the peer's element counter.
#[derive(Debug, Clone)]
pub struct ToolStateMachine {
    current_tool: ToolKind,
    color: AnnotationColor,
    session: Option<PointerSession>,
    /// Stroke being drawn by the current gesture.
    draft: Option<PathElement>,
    pending_erase: BTreeSet<ElementId>,
    overlay: Option<TextOverlay>,
    counter: ElementCounter,
    strokes: StrokeConfig,
    text_limits: TextOverlayLimits,
}

impl ToolStateMachine {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            current_tool: ToolKind::default(),
            color: config.initial_color,
            session: None,
            draft: None,
            pending_erase: BTreeSet::new(),
            overlay: None,
            counter: ElementCounter::new(config.peer_id.clone()),
            strokes: config.strokes,
            text_limits: config.text,
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.current_tool
    }

    pub fn color(&self) -> AnnotationColor {
        self.color
    }

    pub fn set_color(&mut self, color: AnnotationColor) {
        self.color = color;
    }

    pub fn session(&self) -> Option<&PointerSession> {
        self.session.as_ref()
    }

    pub fn drawing_state(&self) -> DrawingState {
        self.session.map(|s| s.state).unwrap_or_default()
    }

    pub fn pending_erase(&self) -> &BTreeSet<ElementId> {
        &self.pending_erase
    }

    pub fn overlay(&self) -> Option<&TextOverlay> {
        self.overlay.as_ref()
    }

    /// Id the next committed element will get.
    pub fn next_id(&self) -> ElementId {
        self.counter.peek()
    }

    /// Select a tool. Abandons any gesture in progress.
    pub fn set_tool(&mut self, tool: ToolKind) -> Vec<ToolEffect> {
        let mut effects = self.cancel();
        if tool == ToolKind::EraseAll {
            self.pending_erase.clear();
            self.current_tool = ToolKind::Cursor;
            effects.push(ToolEffect::EraseAll);
        } else {
            self.current_tool = tool;
        }
        log::debug!("Tool set to {:?}", self.current_tool);
        effects
    }

    /// Abandon the current gesture.
    pub fn cancel(&mut self) -> Vec<ToolEffect> {
        let mut effects = Vec::new();
        if let Some(session) = self.session.take() {
            if session.tool.uses_tracer() {
                effects.push(ToolEffect::TracerChanged(None));
            }
        }
        if let Some(draft) = self.draft.take() {
            effects.push(ToolEffect::DraftDiscarded(draft.id().clone()));
        }
        effects
    }

    pub fn pointer_down(&mut self, mapper: &CoordinateMapper, input: &PointerInput) -> Vec<ToolEffect> {
        let mut effects = self.cancel();
        let Some(local) = input.client_point().and_then(|p| mapper.to_local(p)) else {
            return effects;
        };
        let tool = self.current_tool;
        match tool {
            ToolKind::Pencil | ToolKind::Highlight | ToolKind::Shape | ToolKind::Text | ToolKind::Erase => {}
            _ => return effects,
        }
        self.session = Some(PointerSession {
            tool,
            start: local,
            current: local,
            state: DrawingState::Drawing,
        });
        if let Some(kind) = tool.stroke_kind() {
            let draft = PathElement::start(
                self.counter.peek(),
                kind,
                self.color,
                &self.strokes,
                mapper.local_to_document(local),
            );
            effects.push(ToolEffect::DraftUpdated {
                id: draft.id().clone(),
                markup: draft.to_markup(),
            });
            self.draft = Some(draft);
        }
        effects
    }

    pub fn pointer_move(&mut self, mapper: &CoordinateMapper, input: &PointerInput) -> Vec<ToolEffect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let Some(local) = input.client_point().and_then(|p| mapper.to_local(p)) else {
            return Vec::new();
        };
        session.current = local;
        if let Some(draft) = self.draft.as_mut() {
            draft.push(mapper.local_to_document(local));
            return vec![ToolEffect::DraftUpdated {
                id: draft.id().clone(),
                markup: draft.to_markup(),
            }];
        }
        if session.tool.uses_tracer() {
            return vec![ToolEffect::TracerChanged(Some(Rect::from_points(
                session.start,
                local,
            )))];
        }
        Vec::new()
    }

    pub fn pointer_up(&mut self, mapper: &CoordinateMapper, input: &PointerInput) -> Vec<ToolEffect> {
        if self.current_tool == ToolKind::Erase {
            self.session = None;
            return self.take_erase_selection();
        }
        let Some(session) = self.session else {
            return Vec::new();
        };
        let end = input
            .client_point()
            .and_then(|p| mapper.to_local(p))
            .unwrap_or(session.current);
        if !mapper.has_container() {
            log::debug!("Gesture dropped, no document container");
            return self.cancel();
        }
        self.session = None;

        match session.tool {
            ToolKind::Pencil | ToolKind::Highlight => match self.draft.take() {
                Some(path) => {
                    self.counter.next_id();
                    vec![ToolEffect::Commit(AnnotationElement::Path(path))]
                }
                None => Vec::new(),
            },
            ToolKind::Shape => {
                let rect = RectElement::from_corners(
                    self.counter.next_id(),
                    mapper.local_to_document(session.start),
                    mapper.local_to_document(end),
                    self.color,
                    &self.strokes,
                );
                vec![
                    ToolEffect::TracerChanged(None),
                    ToolEffect::Commit(AnnotationElement::Rect(rect)),
                ]
            }
            ToolKind::Text => {
                let rect = Rect::from_points(session.start, end);
                self.overlay = Some(TextOverlay::open(rect, self.text_limits));
                self.current_tool = ToolKind::Cursor;
                vec![
                    ToolEffect::TracerChanged(None),
                    ToolEffect::TextOverlayOpened(rect),
                ]
            }
            _ => Vec::new(),
        }
    }

    /// The pointer left the document; finishes the gesture like a release.
    pub fn pointer_leave(&mut self, mapper: &CoordinateMapper, input: &PointerInput) -> Vec<ToolEffect> {
        self.pointer_up(mapper, input)
    }

    /// The pointer entered a rendered element. Selects it for erasing when
    /// the erase tool is active.
    pub fn element_hover(&mut self, id: &ElementId) -> Option<ToolEffect> {
        if self.current_tool != ToolKind::Erase {
            return None;
        }
        self.pending_erase.insert(id.clone());
        Some(ToolEffect::Dimmed(id.clone()))
    }

    /// Drop an element from the erase selection, e.g. after a remote delete.
    pub fn forget_element(&mut self, id: &ElementId) {
        self.pending_erase.remove(id);
    }

    /// Clear the erase selection without erasing (page change).
    pub fn clear_selection(&mut self) {
        self.pending_erase.clear();
    }

    fn take_erase_selection(&mut self) -> Vec<ToolEffect> {
        if self.pending_erase.is_empty() {
            return Vec::new();
        }
        let ids: Vec<ElementId> = std::mem::take(&mut self.pending_erase).into_iter().collect();
        vec![ToolEffect::Erase(ids)]
    }

    /// Type into the open text overlay.
    pub fn type_text(&mut self, text: &str, overflowing: bool, mapper: &CoordinateMapper) -> usize {
        match self.overlay.as_mut() {
            Some(overlay) => overlay.type_text(text, overflowing, mapper.current_size()),
            None => 0,
        }
    }

    pub fn backspace(&mut self, overflowing: bool) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.backspace(overflowing);
        }
    }

    /// The text overlay lost focus: commit its content as a text element.
    pub fn blur_text(&mut self, mapper: &CoordinateMapper) -> Vec<ToolEffect> {
        let Some(overlay) = self.overlay.take() else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        if mapper.has_container() {
            if let Some(text) = overlay.commit(self.counter.peek(), mapper.get_scale(), self.color) {
                self.counter.next_id();
                effects.push(ToolEffect::Commit(AnnotationElement::Text(text)));
            }
        } else {
            log::debug!("Text dropped, no document container");
        }
        effects.push(ToolEffect::TextOverlayClosed);
        effects
    }
}
