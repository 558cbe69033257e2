//! The rendered annotation layer of the current page.
//!
//! [`AnnotationLayer`] owns the mapping from element id to rendered node, so
//! lookups never go through the host's global id namespace. The actual
//! drawing is delegated to a [`RenderSurface`] (an SVG element in the
//! browser, [`MemorySurface`] in tests).

use crate::elements::ElementId;
use kurbo::Size;
use std::collections::{BTreeMap, HashMap};

/// Something annotation markup can be mounted into.
pub trait RenderSurface {
    /// Opaque reference to a mounted node.
    type Handle: Clone + std::fmt::Debug;

    /// Mount markup as a new top-most node. `wrapped` puts it inside its own
    /// group so it can later be removed as a unit.
    fn mount(&mut self, id: &ElementId, markup: &str, wrapped: bool) -> Self::Handle;

    /// Replace the markup of a mounted node.
    fn update(&mut self, handle: &Self::Handle, markup: &str);

    /// Remove a node (and its wrapping group, if any).
    fn unmount(&mut self, handle: &Self::Handle);

    /// Visually mark a node as selected for erasing.
    fn set_dimmed(&mut self, handle: &Self::Handle, dimmed: bool);

    /// Remove every node.
    fn clear(&mut self);

    /// The base-space size markup is drawn in, whatever size it is shown at.
    fn set_base_size(&mut self, _base: Size) {}

    /// Drain the ids of nodes the pointer entered since the last call.
    fn take_hovered(&mut self) -> Vec<ElementId> {
        Vec::new()
    }
}

#[derive(Debug, Clone)]
struct Node<H> {
    handle: H,
    dimmed: bool,
}

/// Arena of rendered elements for one page.
#[derive(Debug)]
pub struct AnnotationLayer<S: RenderSurface> {
    surface: S,
    nodes: HashMap<ElementId, Node<S::Handle>>,
    /// Draw order, first drawn first.
    order: Vec<ElementId>,
}

impl<S: RenderSurface> AnnotationLayer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            nodes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Render an element. An id that is already present has its markup
    /// replaced in place instead of being drawn twice.
    pub fn upsert(&mut self, id: &ElementId, markup: &str, wrapped: bool) {
        if let Some(node) = self.nodes.get(id) {
            self.surface.update(&node.handle, markup);
            return;
        }
        let handle = self.surface.mount(id, markup, wrapped);
        self.nodes.insert(
            id.clone(),
            Node {
                handle,
                dimmed: false,
            },
        );
        self.order.push(id.clone());
    }

    /// Remove an element. Unknown ids are ignored.
    pub fn remove(&mut self, id: &ElementId) -> bool {
        let Some(node) = self.nodes.remove(id) else {
            return false;
        };
        self.surface.unmount(&node.handle);
        self.order.retain(|i| i != id);
        true
    }

    /// Dim an element to show it is selected for erasing.
    pub fn dim(&mut self, id: &ElementId) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                if !node.dimmed {
                    node.dimmed = true;
                    self.surface.set_dimmed(&node.handle, true);
                }
                true
            }
            None => false,
        }
    }

    pub fn is_dimmed(&self, id: &ElementId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.dimmed)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Ids in draw order.
    pub fn ids(&self) -> &[ElementId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.surface.clear();
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

/// A node recorded by [`MemorySurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryNode {
    pub id: ElementId,
    pub markup: String,
    pub wrapped: bool,
    pub dimmed: bool,
}

/// Render surface that records nodes in memory.
#[derive(Debug, Default)]
pub struct MemorySurface {
    nodes: BTreeMap<u64, MemoryNode>,
    next: u64,
    base: Option<Size>,
    hovered: Vec<ElementId>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounted nodes in draw order.
    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.values()
    }

    pub fn markup_of(&self, id: &ElementId) -> Option<&str> {
        self.nodes
            .values()
            .find(|n| &n.id == id)
            .map(|n| n.markup.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn base_size(&self) -> Option<Size> {
        self.base
    }

    /// Act as if the pointer entered the node mounted for `id`.
    pub fn hover(&mut self, id: &ElementId) {
        if self.nodes.values().any(|n| &n.id == id) {
            self.hovered.push(id.clone());
        }
    }
}

impl RenderSurface for MemorySurface {
    type Handle = u64;

    fn mount(&mut self, id: &ElementId, markup: &str, wrapped: bool) -> u64 {
        let handle = self.next;
        self.next += 1;
        self.nodes.insert(
            handle,
            MemoryNode {
                id: id.clone(),
                markup: markup.to_string(),
                wrapped,
                dimmed: false,
            },
        );
        handle
    }

    fn update(&mut self, handle: &u64, markup: &str) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.markup = markup.to_string();
        }
    }

    fn unmount(&mut self, handle: &u64) {
        self.nodes.remove(handle);
    }

    fn set_dimmed(&mut self, handle: &u64, dimmed: bool) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.dimmed = dimmed;
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.hovered.clear();
    }

    fn set_base_size(&mut self, base: Size) {
        self.base = Some(base);
    }

    fn take_hovered(&mut self) -> Vec<ElementId> {
        std::mem::take(&mut self.hovered)
    }
}
