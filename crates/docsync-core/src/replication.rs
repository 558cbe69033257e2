//! Replication of page annotations through the per-page store.
//!
//! Local commits and erases are queued as [`StoreOp`]s and written on
//! [`AnnotationReplication::flush`]. Remote writes arrive as store change
//! notifications and are turned into [`AnnotationDelta`]s for the layer.
//! Exactly one page subscription is alive at a time: entering a page first
//! unsubscribes the previous one, so its late deltas are never applied to
//! the wrong page.

use crate::elements::{AnnotationElement, ElementId};
use crate::layer::{AnnotationLayer, RenderSurface};
use crate::store::{
    annotation_store_name, flush_ops, KeyPattern, KeyValueStore, StoreChange, StoreHub, StoreOp,
};
use serde_json::Value;

/// A remote change to the current page.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationDelta {
    Created { id: ElementId, markup: String },
    Deleted(ElementId),
}

impl AnnotationDelta {
    /// Interpret a store change. Keys that are not element ids and values
    /// that are not markup strings are skipped.
    pub fn from_change(change: StoreChange) -> Option<Self> {
        let id: ElementId = match change.key.parse() {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Ignoring annotation change: {}", e);
                return None;
            }
        };
        match change.value {
            None => Some(AnnotationDelta::Deleted(id)),
            Some(Value::String(markup)) => Some(AnnotationDelta::Created { id, markup }),
            Some(other) => {
                log::warn!("Ignoring non-markup value for {}: {}", id, other);
                None
            }
        }
    }

    pub fn id(&self) -> &ElementId {
        match self {
            AnnotationDelta::Created { id, .. } | AnnotationDelta::Deleted(id) => id,
        }
    }

    /// Apply to a layer. Remote elements are wrapped in their own group.
    pub fn apply<S: RenderSurface>(&self, layer: &mut AnnotationLayer<S>) {
        match self {
            AnnotationDelta::Created { id, markup } => layer.upsert(id, markup, true),
            AnnotationDelta::Deleted(id) => {
                layer.remove(id);
            }
        }
    }
}

/// Links the current page's layer with its replicated store.
pub struct AnnotationReplication<H: StoreHub> {
    hub: H,
    page: Option<u32>,
    store: Option<H::Store>,
    /// Pending writes, in issue order.
    outgoing: Vec<StoreOp>,
}

impl<H: StoreHub> AnnotationReplication<H> {
    pub fn new(hub: H) -> Self {
        Self {
            hub,
            page: None,
            store: None,
            outgoing: Vec::new(),
        }
    }

    pub fn hub(&self) -> &H {
        &self.hub
    }

    pub fn page(&self) -> Option<u32> {
        self.page
    }

    pub fn store(&self) -> Option<&H::Store> {
        self.store.as_ref()
    }

    /// Switch to a page: drop the old subscription, clear the layer, fetch
    /// the new page's store, subscribe to it and render its contents once.
    /// Returns the number of elements loaded.
    pub async fn enter_page<S: RenderSurface>(
        &mut self,
        page: u32,
        layer: &mut AnnotationLayer<S>,
    ) -> usize {
        self.leave_page();
        layer.clear();

        let name = annotation_store_name(page);
        if let Err(e) = self.hub.populate(&name).await {
            log::warn!("Failed to populate {}: {}", name, e);
        }
        let store = self.hub.create(&name);
        store.subscribe(KeyPattern::All);
        // The snapshot below already contains anything queued so far.
        store.take_changes();

        let mut loaded = 0;
        for (key, value) in store.get_all() {
            let change = StoreChange {
                key,
                value: Some(value),
            };
            if let Some(delta) = AnnotationDelta::from_change(change) {
                delta.apply(layer);
                loaded += 1;
            }
        }
        log::info!("Entered page {} with {} annotations", page, loaded);
        self.page = Some(page);
        self.store = Some(store);
        loaded
    }

    /// Drop the current page subscription.
    pub fn leave_page(&mut self) {
        if let Some(store) = self.store.take() {
            store.unsubscribe(&KeyPattern::All);
            log::debug!("Unsubscribed from {}", store.name());
        }
        self.page = None;
    }

    fn current_store_name(&self) -> Option<String> {
        self.page.map(annotation_store_name)
    }

    /// Queue a committed element for writing.
    pub fn commit(&mut self, element: &AnnotationElement) {
        let Some(store) = self.current_store_name() else {
            log::debug!("No page open, dropping {}", element.id());
            return;
        };
        self.outgoing.push(StoreOp::Set {
            store,
            key: element.id().to_string(),
            value: Value::String(element.markup()),
        });
    }

    /// Queue deletes for erased elements.
    pub fn erase(&mut self, ids: &[ElementId]) {
        let Some(store) = self.current_store_name() else {
            return;
        };
        for id in ids {
            self.outgoing.push(StoreOp::Delete {
                store: store.clone(),
                key: id.to_string(),
            });
        }
    }

    /// Queue replacement of the page store with an empty one. Any writes
    /// still queued for the page are obsolete and dropped.
    pub fn erase_all(&mut self) {
        let Some(store) = self.current_store_name() else {
            return;
        };
        self.outgoing.retain(|op| op.store() != store);
        self.outgoing.push(StoreOp::Reset { store });
    }

    /// Remote deltas for the current page, in arrival order.
    pub fn poll_deltas(&mut self) -> Vec<AnnotationDelta> {
        let Some(store) = self.store.as_ref() else {
            return Vec::new();
        };
        store
            .take_changes()
            .into_iter()
            .filter_map(AnnotationDelta::from_change)
            .collect()
    }

    /// Take all pending writes.
    pub fn take_outgoing(&mut self) -> Vec<StoreOp> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_pending(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Write all pending operations. Failures are logged, never retried.
    pub async fn flush(&mut self) {
        let ops = self.take_outgoing();
        flush_ops(&self.hub, ops).await;
    }
}
