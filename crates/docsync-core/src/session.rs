//! One peer's annotation session.
//!
//! [`PeerSession`] wires the coordinate mapper, the tool state machine, the
//! render layer, view sync and slide navigation to the replicated stores and
//! the peer channel. Input handlers are synchronous and only queue store
//! writes; [`PeerSession::flush`] sends them and [`PeerSession::poll`] takes
//! in whatever other peers did meanwhile.

use crate::channel::{MessageChannel, PeerEvent};
use crate::config::{SessionConfig, ViewerKind};
use crate::elements::{AnnotationColor, ElementId};
use crate::input::PointerInput;
use crate::key_sequence::{NavKey, RemoteKeySequencer};
use crate::layer::{AnnotationLayer, RenderSurface};
use crate::replication::{AnnotationDelta, AnnotationReplication};
use crate::store::{
    annotation_store_name, flush_ops, KeyPattern, KeyValueStore, StoreHub, StoreOp, DOC_STORE,
    KEYS_STORE,
};
use crate::tools::{ToolEffect, ToolKind, ToolStateMachine};
use crate::view_sync::{ScrollMetrics, ScrollTarget, ViewCommand, ViewSyncBroadcaster};
use crate::viewer::{OutboundViewerMessage, ViewerBridge, ViewerMessage};
use crate::viewport::{fit_to_window, overflow, CoordinateMapper, Overflow};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of the open document in the `doc` store.
pub const DOCUMENT_KEY: &str = "document";
/// Key of the shared page number in the `doc` store.
pub const PAGE_KEY: &str = "page";

/// The open document, as stored under `doc/document`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ViewerKind,
}

impl DocumentInfo {
    pub fn new(url: impl Into<String>, kind: ViewerKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// Decode a stored entry. A missing entry or an empty url means no
    /// document is open.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        match serde_json::from_value::<DocumentInfo>(value?.clone()) {
            Ok(info) if !info.url.is_empty() => Some(info),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Ignoring malformed document entry: {}", e);
                None
            }
        }
    }
}

fn page_from_value(value: Option<&Value>) -> Option<u32> {
    let page = match value? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    page.filter(|p| *p >= 1)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    natural: Size,
    window: Size,
}

/// A peer taking part in a shared document session.
pub struct PeerSession<H: StoreHub, C: MessageChannel, S: RenderSurface> {
    mapper: CoordinateMapper,
    tools: ToolStateMachine,
    layer: AnnotationLayer<S>,
    replication: AnnotationReplication<H>,
    view: ViewSyncBroadcaster,
    sequencer: RemoteKeySequencer,
    channel: C,
    bridge: Option<Box<dyn ViewerBridge>>,
    doc_store: H::Store,
    keys_store: H::Store,
    document: Option<DocumentInfo>,
    page: u32,
    page_count: u32,
    /// Screen-space tracer box while a shape or text box is dragged.
    tracer: Option<Rect>,
    layout: Option<Layout>,
    scroll_extent: Size,
    scroll_target: Option<ScrollTarget>,
    /// Pending writes to the `doc` store and page store drops.
    outgoing: Vec<StoreOp>,
    config: SessionConfig,
}

impl<H: StoreHub, C: MessageChannel, S: RenderSurface> PeerSession<H, C, S> {
    /// Join a session: load the shared document state, start listening on
    /// the channel and render the current page if a document is open.
    pub async fn connect(config: SessionConfig, hub: H, channel: C, surface: S) -> Self {
        for name in [DOC_STORE, KEYS_STORE] {
            if let Err(e) = hub.populate(name).await {
                log::warn!("Failed to populate {}: {}", name, e);
            }
        }
        let doc_store = hub.create(DOC_STORE);
        doc_store.subscribe(KeyPattern::Key(DOCUMENT_KEY.to_string()));
        doc_store.subscribe(KeyPattern::Key(PAGE_KEY.to_string()));
        doc_store.take_changes();
        let keys_store = hub.create(KEYS_STORE);
        keys_store.subscribe(KeyPattern::All);
        keys_store.take_changes();

        for name in [
            PeerEvent::REMOTE_ERASE_ALL,
            PeerEvent::SYNC_ZOOM,
            PeerEvent::SYNC_SCROLL,
            PeerEvent::REMOTE_KEYPRESS,
        ] {
            channel.add_listener(name);
        }

        let mut session = Self {
            mapper: CoordinateMapper::new(),
            tools: ToolStateMachine::new(&config),
            layer: AnnotationLayer::new(surface),
            replication: AnnotationReplication::new(hub),
            view: ViewSyncBroadcaster::new(&config),
            sequencer: RemoteKeySequencer::new(1),
            channel,
            bridge: None,
            doc_store,
            keys_store,
            document: None,
            page: 1,
            page_count: 1,
            tracer: None,
            layout: None,
            scroll_extent: Size::ZERO,
            scroll_target: None,
            outgoing: Vec::new(),
            config,
        };

        session.sequencer.load_all(session.keys_store.get_all());
        let document = DocumentInfo::from_value(session.doc_store.get(DOCUMENT_KEY).as_ref());
        if let Some(document) = document {
            let page = session.shared_page();
            session.mount_document(document);
            session.enter_page(page).await;
        }
        log::info!(
            "Peer {} connected as {:?}",
            session.config.peer_id,
            session.view.role()
        );
        session
    }

    /// Leave the session: drop every subscription and listener.
    pub fn disconnect(&mut self) {
        self.replication.leave_page();
        self.doc_store.unsubscribe(&KeyPattern::Key(DOCUMENT_KEY.to_string()));
        self.doc_store.unsubscribe(&KeyPattern::Key(PAGE_KEY.to_string()));
        self.keys_store.unsubscribe(&KeyPattern::All);
        for name in [
            PeerEvent::REMOTE_ERASE_ALL,
            PeerEvent::SYNC_ZOOM,
            PeerEvent::SYNC_SCROLL,
            PeerEvent::REMOTE_KEYPRESS,
        ] {
            self.channel.remove_listeners(name);
        }
        log::info!("Peer {} disconnected", self.config.peer_id);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn mapper_mut(&mut self) -> &mut CoordinateMapper {
        &mut self.mapper
    }

    pub fn tools(&self) -> &ToolStateMachine {
        &self.tools
    }

    pub fn layer(&self) -> &AnnotationLayer<S> {
        &self.layer
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.layer.surface_mut()
    }

    pub fn view(&self) -> &ViewSyncBroadcaster {
        &self.view
    }

    pub fn sequencer(&self) -> &RemoteKeySequencer {
        &self.sequencer
    }

    pub fn document(&self) -> Option<&DocumentInfo> {
        self.document.as_ref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn tracer(&self) -> Option<Rect> {
        self.tracer
    }

    /// Screen-space box of the open text overlay.
    pub fn overlay_rect(&self) -> Option<Rect> {
        self.tools.overlay().map(|o| o.rect())
    }

    /// Attach the embedded slide viewer.
    pub fn set_viewer(&mut self, bridge: Box<dyn ViewerBridge>) {
        self.bridge = Some(bridge);
    }

    pub fn detach_viewer(&mut self) {
        self.bridge = None;
        self.sequencer.reset_viewer();
    }

    /// Reassign the zoom and scroll authority.
    pub fn set_host(&mut self, host_id: Option<String>) {
        self.view
            .set_authority(host_id.as_deref(), &self.config.peer_id, self.config.follows_host);
        self.config.host_id = host_id;
    }

    fn viewer_kind(&self) -> Option<ViewerKind> {
        self.document.as_ref().map(|d| d.kind)
    }

    fn is_slides(&self) -> bool {
        self.viewer_kind() == Some(ViewerKind::Slides)
    }

    fn shared_page(&self) -> u32 {
        page_from_value(self.doc_store.get(PAGE_KEY).as_ref()).unwrap_or(1)
    }

    fn emit(&self, event: &PeerEvent) {
        if let Err(e) = self.channel.emit(event) {
            log::warn!("Failed to emit {}: {}", event.name(), e);
        }
    }

    fn post_to_viewer(&mut self, message: &OutboundViewerMessage) {
        match self.bridge.as_mut() {
            Some(bridge) => {
                if let Err(e) = bridge.post(message) {
                    log::warn!("Viewer post failed: {}", e);
                }
            }
            None => log::debug!("No viewer attached, dropping {:?}", message),
        }
    }

    // --- Documents and pages ---

    fn mount_document(&mut self, info: DocumentInfo) {
        let fixed = (info.kind == ViewerKind::Slides).then_some(self.config.slide_size);
        self.mapper.remount(fixed);
        self.sequencer.reset_viewer();
        self.page_count = 1;
        log::info!("Mounted {:?} document {}", info.kind, info.url);
        self.document = Some(info);
        self.relayout();
    }

    fn unmount(&mut self) {
        let effects = self.tools.cancel();
        self.apply_effects(effects);
        self.tools.clear_selection();
        self.replication.leave_page();
        self.layer.clear();
        self.document = None;
        self.tracer = None;
        self.page = 1;
        self.page_count = 1;
        self.sequencer.set_page(1);
        self.sequencer.reset_viewer();
        self.mapper.remount(None);
    }

    async fn enter_page(&mut self, page: u32) {
        let effects = self.tools.cancel();
        self.apply_effects(effects);
        self.tools.clear_selection();
        if !self.is_slides() && self.page != page {
            // Each PDF page is its own mount with its own baseline.
            self.mapper.remount(None);
            self.relayout();
        }
        self.page = page;
        self.sequencer.set_page(page);
        self.replication.enter_page(page, &mut self.layer).await;
    }

    /// Open a document for everybody, starting on page 1.
    pub async fn open_document(&mut self, info: DocumentInfo) {
        match serde_json::to_value(&info) {
            Ok(value) => self.outgoing.push(StoreOp::Set {
                store: DOC_STORE.to_string(),
                key: DOCUMENT_KEY.to_string(),
                value,
            }),
            Err(e) => log::warn!("Failed to encode document entry: {}", e),
        }
        self.outgoing.push(StoreOp::Set {
            store: DOC_STORE.to_string(),
            key: PAGE_KEY.to_string(),
            value: Value::from(1),
        });
        self.mount_document(info);
        self.enter_page(1).await;
    }

    /// Close the document for everybody and delete its annotations and key
    /// sequences.
    pub fn close_document(&mut self) {
        if self.document.is_none() {
            return;
        }
        let pages = self.page_count;
        self.unmount();
        for page in 1..=pages {
            self.outgoing.push(StoreOp::Drop {
                store: annotation_store_name(page),
            });
        }
        self.sequencer.delete_pages(pages);
        self.outgoing.push(StoreOp::Delete {
            store: DOC_STORE.to_string(),
            key: DOCUMENT_KEY.to_string(),
        });
        log::info!("Closed document with {} pages", pages);
    }

    /// Page count as reported by the PDF renderer. Slide decks report it
    /// through [`ViewerMessage::Loaded`].
    pub fn set_page_count(&mut self, page_count: u32) {
        self.page_count = page_count.max(1);
    }

    /// Navigate to `page` and make every other peer follow.
    pub async fn change_page(&mut self, page: u32) {
        if self.document.is_none() {
            log::debug!("No document open, ignoring page {}", page);
            return;
        }
        let page = page.max(1);
        if page == self.page && self.replication.page() == Some(page) {
            return;
        }
        self.outgoing.push(StoreOp::Set {
            store: DOC_STORE.to_string(),
            key: PAGE_KEY.to_string(),
            value: Value::from(page),
        });
        self.enter_page(page).await;
    }

    pub async fn next_page(&mut self) {
        self.navigate(NavKey::Next).await;
    }

    pub async fn prev_page(&mut self) {
        self.navigate(NavKey::Previous).await;
    }

    /// PDFs change page directly. The slide viewer has no page API, so it
    /// gets a key press and reports the page it lands on.
    async fn navigate(&mut self, key: NavKey) {
        match self.viewer_kind() {
            Some(ViewerKind::Slides) => {
                self.post_to_viewer(&OutboundViewerMessage::KeyDown { code: key.code() });
            }
            Some(ViewerKind::Pdf) => {
                let target = match key {
                    NavKey::Next => (self.page + 1).min(self.page_count),
                    NavKey::Previous => self.page.saturating_sub(1).max(1),
                };
                self.change_page(target).await;
            }
            None => {}
        }
    }

    /// Handle a message posted by the embedded slide viewer.
    pub async fn on_viewer_message(&mut self, message: ViewerMessage) {
        if !self.is_slides() {
            log::debug!("Ignoring viewer message {:?}, no slides open", message);
            return;
        }
        match message {
            ViewerMessage::Loaded { page_count } => {
                self.page_count = page_count.max(1);
                self.sequencer.viewer_loaded();
            }
            ViewerMessage::PageChanged { page } => {
                if page != self.page {
                    self.sequencer.cross_to(page);
                    self.change_page(page).await;
                }
            }
            ViewerMessage::KeyPressed { code, page } => {
                if let Some(page) = self.sequencer.key_pressed(code, page) {
                    self.change_page(page).await;
                }
            }
        }
        self.dispatch_sequencer();
    }

    fn dispatch_sequencer(&mut self) {
        for message in self.sequencer.take_viewer_messages() {
            self.post_to_viewer(&message);
        }
        for event in self.sequencer.take_events() {
            self.emit(&event);
        }
    }

    // --- Layout and view sync ---

    /// Record the document's natural size and the window it is shown in.
    pub fn set_layout(&mut self, natural: Size, window: Size) {
        let natural_changed = self.layout.is_some_and(|l| l.natural != natural);
        if natural_changed && !self.is_slides() {
            self.mapper.remount(None);
        }
        self.layout = Some(Layout { natural, window });
        self.relayout();
    }

    fn relayout(&mut self) {
        let Some(layout) = self.layout else {
            return;
        };
        if !self.is_slides() {
            self.mapper.establish_base(layout.natural);
        }
        let rendered = fit_to_window(layout.natural, layout.window, self.view.zoom());
        self.mapper.set_rendered_size(rendered);
        if self.mapper.is_base_established() {
            let base = self.mapper.base_size();
            self.layer.surface_mut().set_base_size(base);
        }
    }

    /// Rendered document size for the current zoom.
    pub fn rendered_size(&self) -> Size {
        self.mapper.current_size()
    }

    /// Which axes overflow the window and should be start-aligned.
    pub fn overflow(&self) -> Option<Overflow> {
        self.layout
            .map(|l| overflow(self.mapper.current_size(), l.window))
    }

    /// Record where the document container sits on screen.
    pub fn set_container_origin(&mut self, origin: Option<Point>) {
        self.mapper.set_container_origin(origin);
    }

    pub fn zoom_in(&mut self) {
        let event = self.view.zoom_in();
        self.after_zoom(event);
    }

    pub fn zoom_out(&mut self) {
        let event = self.view.zoom_out();
        self.after_zoom(event);
    }

    fn after_zoom(&mut self, event: Option<PeerEvent>) {
        if let Some(event) = event {
            self.emit(&event);
        }
        self.relayout();
    }

    /// The local container scrolled.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        self.scroll_extent = Size::new(metrics.width, metrics.height);
        if let Some(event) = self.view.on_scroll(metrics) {
            self.emit(&event);
        }
    }

    /// Scrollable size of the local container.
    pub fn set_scroll_extent(&mut self, extent: Size) {
        self.scroll_extent = extent;
    }

    /// Scroll position requested by the authority, if any arrived.
    pub fn take_scroll_target(&mut self) -> Option<ScrollTarget> {
        self.scroll_target.take()
    }

    // --- Tools ---

    pub fn set_tool(&mut self, tool: ToolKind) {
        let effects = self.tools.set_tool(tool);
        self.apply_effects(effects);
    }

    pub fn set_color(&mut self, color: AnnotationColor) {
        self.tools.set_color(color);
    }

    pub fn pointer_down(&mut self, input: &PointerInput) {
        if self.document.is_none() {
            return;
        }
        let effects = self.tools.pointer_down(&self.mapper, input);
        self.apply_effects(effects);
    }

    pub fn pointer_move(&mut self, input: &PointerInput) {
        if self.document.is_none() {
            return;
        }
        self.take_hovers();
        let effects = self.tools.pointer_move(&self.mapper, input);
        self.apply_effects(effects);
    }

    pub fn pointer_up(&mut self, input: &PointerInput) {
        if self.document.is_none() {
            return;
        }
        self.take_hovers();
        let effects = self.tools.pointer_up(&self.mapper, input);
        self.apply_effects(effects);
    }

    pub fn pointer_leave(&mut self, input: &PointerInput) {
        if self.document.is_none() {
            return;
        }
        let effects = self.tools.pointer_leave(&self.mapper, input);
        self.apply_effects(effects);
    }

    /// Feed hovers reported by the render surface into the erase selection.
    fn take_hovers(&mut self) {
        for id in self.layer.surface_mut().take_hovered() {
            self.element_hover(&id);
        }
    }

    /// The pointer entered a rendered element.
    pub fn element_hover(&mut self, id: &ElementId) {
        if !self.layer.contains(id) {
            return;
        }
        if let Some(effect) = self.tools.element_hover(id) {
            self.apply_effects(vec![effect]);
        }
    }

    /// Type into the text overlay. Returns the number of characters accepted.
    pub fn type_text(&mut self, text: &str, overflowing: bool) -> usize {
        self.tools.type_text(text, overflowing, &self.mapper)
    }

    pub fn backspace(&mut self, overflowing: bool) {
        self.tools.backspace(overflowing);
    }

    /// The text overlay lost focus.
    pub fn blur_text(&mut self) {
        let effects = self.tools.blur_text(&self.mapper);
        self.apply_effects(effects);
    }

    fn apply_effects(&mut self, effects: Vec<ToolEffect>) {
        for effect in effects {
            match effect {
                ToolEffect::DraftUpdated { id, markup } => self.layer.upsert(&id, &markup, false),
                ToolEffect::DraftDiscarded(id) => {
                    self.layer.remove(&id);
                }
                ToolEffect::Commit(element) => {
                    self.layer.upsert(element.id(), &element.markup(), false);
                    self.replication.commit(&element);
                }
                ToolEffect::TracerChanged(tracer) => self.tracer = tracer,
                ToolEffect::Dimmed(id) => {
                    self.layer.dim(&id);
                }
                ToolEffect::Erase(ids) => {
                    for id in &ids {
                        self.layer.remove(id);
                    }
                    self.replication.erase(&ids);
                }
                ToolEffect::EraseAll => {
                    self.layer.clear();
                    self.emit(&PeerEvent::RemoteEraseAll);
                    self.replication.erase_all();
                }
                ToolEffect::TextOverlayOpened(_) | ToolEffect::TextOverlayClosed => {}
            }
        }
    }

    // --- Remote input ---

    /// Take in everything other peers did since the last poll.
    pub async fn poll(&mut self) {
        for event in self.channel.take_events() {
            self.handle_peer_event(event);
        }

        for change in self.doc_store.take_changes() {
            match change.key.as_str() {
                DOCUMENT_KEY => {
                    let info = DocumentInfo::from_value(change.value.as_ref());
                    self.follow_document(info).await;
                }
                PAGE_KEY => {
                    if let Some(page) = page_from_value(change.value.as_ref()) {
                        self.follow_page(page).await;
                    }
                }
                other => log::debug!("Ignoring doc store key {}", other),
            }
        }

        for change in self.keys_store.take_changes() {
            self.sequencer.apply_remote(&change.key, change.value.as_ref());
        }

        for delta in self.replication.poll_deltas() {
            if let AnnotationDelta::Deleted(id) = &delta {
                self.tools.forget_element(id);
            }
            delta.apply(&mut self.layer);
        }

        self.dispatch_sequencer();
    }

    fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::RemoteEraseAll => {
                log::debug!("Remote erase-all on page {}", self.page);
                self.layer.clear();
                self.tools.clear_selection();
            }
            PeerEvent::RemoteKeypress { code } => {
                if self.is_slides() {
                    self.sequencer.remote_keypress(code);
                }
            }
            PeerEvent::SyncZoom { .. } | PeerEvent::SyncScroll { .. } => {
                match self.view.apply_remote(&event, self.scroll_extent) {
                    Some(ViewCommand::SetZoom(_)) => self.relayout(),
                    Some(ViewCommand::ScrollTo(target)) => self.scroll_target = Some(target),
                    None => {}
                }
            }
        }
    }

    async fn follow_document(&mut self, info: Option<DocumentInfo>) {
        match info {
            None => {
                if self.document.is_some() {
                    log::info!("Document closed by another peer");
                    self.unmount();
                }
            }
            Some(info) => {
                if self.document.as_ref() == Some(&info) {
                    return;
                }
                let page = self.shared_page();
                self.mount_document(info);
                self.enter_page(page).await;
            }
        }
    }

    async fn follow_page(&mut self, page: u32) {
        if self.document.is_none() {
            return;
        }
        if page == self.page && self.replication.page() == Some(page) {
            return;
        }
        log::debug!("Following page {}", page);
        self.enter_page(page).await;
    }

    // --- Store writes ---

    pub fn has_pending(&self) -> bool {
        !self.outgoing.is_empty() || self.replication.has_pending()
    }

    /// Write everything queued. Annotation writes go first so that a page
    /// store dropped by a close is not recreated by a late commit.
    pub async fn flush(&mut self) {
        let mut ops = self.replication.take_outgoing();
        ops.extend(self.sequencer.take_store_ops());
        ops.append(&mut self.outgoing);
        if ops.is_empty() {
            return;
        }
        log::debug!("Flushing {} store writes", ops.len());
        flush_ops(self.replication.hub(), ops).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{MemoryBus, MemoryChannel};
    use crate::layer::MemorySurface;
    use crate::store::{MemoryHub, MemoryNetwork};
    use crate::viewer::RecordingViewer;

    type TestSession = PeerSession<MemoryHub, MemoryChannel, MemorySurface>;

    fn connect(network: &MemoryNetwork, bus: &MemoryBus, peer: &str) -> TestSession {
        let config = SessionConfig {
            host_id: Some("host".to_string()),
            ..SessionConfig::for_peer(peer)
        };
        let mut session = pollster::block_on(PeerSession::connect(
            config,
            network.join(peer),
            bus.join(peer),
            MemorySurface::new(),
        ));
        session.set_layout(Size::new(1280.0, 720.0), Size::new(1280.0, 720.0));
        session.set_container_origin(Some(Point::ZERO));
        session
    }

    fn draw_line(session: &mut TestSession) {
        session.set_tool(ToolKind::Pencil);
        session.pointer_down(&PointerInput::mouse(10.0, 10.0));
        session.pointer_move(&PointerInput::mouse(20.0, 20.0));
        session.pointer_up(&PointerInput::mouse(20.0, 20.0));
    }

    #[test]
    fn test_document_info_wire_format() {
        let info = DocumentInfo::new("https://example.com/deck", ViewerKind::Slides);
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value, serde_json::json!({"url": "https://example.com/deck", "type": "slides"}));
        assert_eq!(DocumentInfo::from_value(Some(&value)), Some(info));
        let legacy = serde_json::json!({"url": "x", "type": "googleslides"});
        assert_eq!(
            DocumentInfo::from_value(Some(&legacy)).map(|d| d.kind),
            Some(ViewerKind::Slides)
        );
        let empty = serde_json::json!({"url": "", "type": "pdf"});
        assert!(DocumentInfo::from_value(Some(&empty)).is_none());
        assert!(DocumentInfo::from_value(None).is_none());
    }

    #[test]
    fn test_page_from_value() {
        assert_eq!(page_from_value(Some(&Value::from(3))), Some(3));
        assert_eq!(page_from_value(Some(&Value::from("4"))), Some(4));
        assert_eq!(page_from_value(Some(&Value::from(0))), None);
        assert_eq!(page_from_value(None), None);
    }

    #[test]
    fn test_pointer_ignored_without_document() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect(&network, &bus, "alice");
        draw_line(&mut alice);
        assert!(alice.layer().is_empty());
        assert!(!alice.has_pending());
    }

    #[test]
    fn test_open_document_and_draw() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect(&network, &bus, "alice");
        pollster::block_on(alice.open_document(DocumentInfo::new("a.pdf", ViewerKind::Pdf)));
        draw_line(&mut alice);
        assert_eq!(alice.layer().len(), 1);
        pollster::block_on(alice.flush());

        let doc = network.snapshot("doc");
        assert!(doc.iter().any(|(k, _)| k == "document"));
        assert!(doc.contains(&("page".to_string(), Value::from(1))));
        let page = network.snapshot("annotation-page-1");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].0, "alice-0");
    }

    #[test]
    fn test_late_joiner_loads_current_page() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect(&network, &bus, "alice");
        pollster::block_on(alice.open_document(DocumentInfo::new("a.pdf", ViewerKind::Pdf)));
        alice.set_page_count(3);
        pollster::block_on(alice.change_page(2));
        draw_line(&mut alice);
        pollster::block_on(alice.flush());

        let bob = connect(&network, &bus, "bob");
        assert_eq!(bob.page(), 2);
        assert_eq!(bob.layer().len(), 1);
    }

    #[test]
    fn test_pdf_navigation_is_clamped() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect(&network, &bus, "alice");
        pollster::block_on(alice.open_document(DocumentInfo::new("a.pdf", ViewerKind::Pdf)));
        alice.set_page_count(2);
        pollster::block_on(alice.prev_page());
        assert_eq!(alice.page(), 1);
        pollster::block_on(alice.next_page());
        pollster::block_on(alice.next_page());
        assert_eq!(alice.page(), 2);
    }

    #[test]
    fn test_slides_navigation_posts_keys() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect(&network, &bus, "alice");
        let viewer = RecordingViewer::new();
        alice.set_viewer(Box::new(viewer.clone()));
        pollster::block_on(alice.open_document(DocumentInfo::new("deck", ViewerKind::Slides)));
        pollster::block_on(alice.next_page());
        pollster::block_on(alice.prev_page());
        assert_eq!(
            viewer.take(),
            vec![
                OutboundViewerMessage::KeyDown { code: 39 },
                OutboundViewerMessage::KeyDown { code: 37 },
            ]
        );
        assert_eq!(alice.page(), 1);
    }

    #[test]
    fn test_close_document_drops_pages() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect(&network, &bus, "alice");
        pollster::block_on(alice.open_document(DocumentInfo::new("a.pdf", ViewerKind::Pdf)));
        alice.set_page_count(2);
        draw_line(&mut alice);
        pollster::block_on(alice.change_page(2));
        draw_line(&mut alice);
        pollster::block_on(alice.flush());
        assert!(network.store_names().contains(&"annotation-page-2".to_string()));

        alice.close_document();
        pollster::block_on(alice.flush());
        assert!(alice.document().is_none());
        assert!(alice.layer().is_empty());
        let names = network.store_names();
        assert!(!names.iter().any(|n| n.starts_with("annotation-page-")));
        assert!(!network.snapshot("doc").iter().any(|(k, _)| k == "document"));
    }

    #[test]
    fn test_zoom_relayouts() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect(&network, &bus, "alice");
        pollster::block_on(alice.open_document(DocumentInfo::new("a.pdf", ViewerKind::Pdf)));
        for _ in 0..20 {
            alice.zoom_in();
        }
        assert_eq!(alice.rendered_size(), Size::new(2560.0, 1440.0));
        assert_eq!(alice.mapper().base_size(), Size::new(1280.0, 720.0));
        let scale = alice.mapper().get_scale();
        assert!((scale.x - 2.0).abs() < f64::EPSILON);
        assert_eq!(alice.overflow(), Some(Overflow { x: true, y: true }));
    }

    fn connect_unlaid(network: &MemoryNetwork, bus: &MemoryBus, peer: &str) -> TestSession {
        let mut session = pollster::block_on(PeerSession::connect(
            SessionConfig::for_peer(peer),
            network.join(peer),
            bus.join(peer),
            MemorySurface::new(),
        ));
        session.set_container_origin(Some(Point::ZERO));
        session
    }

    #[test]
    fn test_input_before_layout_keeps_pdf_baseline() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect_unlaid(&network, &bus, "alice");
        pollster::block_on(alice.open_document(DocumentInfo::new("a.pdf", ViewerKind::Pdf)));
        draw_line(&mut alice);
        assert!(alice.layer().is_empty());

        alice.set_layout(Size::new(1280.0, 720.0), Size::new(640.0, 360.0));
        assert_eq!(alice.mapper().base_size(), Size::new(1280.0, 720.0));
        alice.set_tool(ToolKind::Shape);
        alice.pointer_down(&PointerInput::mouse(100.0, 50.0));
        alice.pointer_move(&PointerInput::mouse(300.0, 200.0));
        alice.pointer_up(&PointerInput::mouse(300.0, 200.0));
        pollster::block_on(alice.flush());

        let stored = network.snapshot("annotation-page-1");
        assert_eq!(stored.len(), 1);
        let markup = stored[0].1.as_str().unwrap();
        assert!(markup.contains(r#"x="200" y="100" width="400" height="300""#));
    }

    #[test]
    fn test_input_before_slide_layout_is_dropped() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect_unlaid(&network, &bus, "alice");
        pollster::block_on(alice.open_document(DocumentInfo::new("deck", ViewerKind::Slides)));
        draw_line(&mut alice);
        pollster::block_on(alice.flush());
        assert!(alice.layer().is_empty());
        assert!(network.snapshot("annotation-page-1").is_empty());
    }

    #[test]
    fn test_surface_hover_selects_for_erase() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect(&network, &bus, "alice");
        pollster::block_on(alice.open_document(DocumentInfo::new("a.pdf", ViewerKind::Pdf)));
        draw_line(&mut alice);
        pollster::block_on(alice.flush());
        let id = ElementId::new("alice", 0);

        alice.set_tool(ToolKind::Erase);
        alice.pointer_down(&PointerInput::mouse(15.0, 15.0));
        alice.surface_mut().hover(&id);
        alice.pointer_move(&PointerInput::mouse(16.0, 16.0));
        assert!(alice.layer().is_dimmed(&id));
        alice.pointer_up(&PointerInput::mouse(16.0, 16.0));
        pollster::block_on(alice.flush());
        assert!(alice.layer().is_empty());
        assert!(network.snapshot("annotation-page-1").is_empty());
    }

    #[test]
    fn test_surface_follows_base_size() {
        let network = MemoryNetwork::new();
        let bus = MemoryBus::new();
        let mut alice = connect(&network, &bus, "alice");
        pollster::block_on(alice.open_document(DocumentInfo::new("a.pdf", ViewerKind::Pdf)));
        assert_eq!(alice.layer().surface().base_size(), Some(Size::new(1280.0, 720.0)));
        alice.set_layout(Size::new(600.0, 800.0), Size::new(1280.0, 720.0));
        assert_eq!(alice.layer().surface().base_size(), Some(Size::new(600.0, 800.0)));
    }
}
