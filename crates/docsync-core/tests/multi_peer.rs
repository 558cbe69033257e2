use docsync_core::viewer::RecordingViewer;
use docsync_core::{
    DocumentInfo, ElementId, MemoryBus, MemoryChannel, MemoryHub, MemoryNetwork, MemorySurface,
    OutboundViewerMessage, PeerSession, PointerInput, ScrollMetrics, SessionConfig, ToolKind,
    ViewRole, ViewerKind, ViewerMessage,
};
use kurbo::{Point, Size};
use pollster::block_on;

type Peer = PeerSession<MemoryHub, MemoryChannel, MemorySurface>;

const NATURAL: Size = Size::new(1280.0, 720.0);

struct Room {
    network: MemoryNetwork,
    bus: MemoryBus,
}

impl Room {
    fn new() -> Self {
        Self {
            network: MemoryNetwork::new(),
            bus: MemoryBus::new(),
        }
    }

    fn join(&self, config: SessionConfig, window: Size) -> Peer {
        let peer_id = config.peer_id.clone();
        let mut peer = block_on(PeerSession::connect(
            config,
            self.network.join(&peer_id),
            self.bus.join(&peer_id),
            MemorySurface::new(),
        ));
        peer.set_layout(NATURAL, window);
        peer.set_container_origin(Some(Point::ZERO));
        peer
    }

    fn stored_markup(&self, page: u32, id: &str) -> Option<String> {
        self.network
            .snapshot(&format!("annotation-page-{page}"))
            .into_iter()
            .find(|(key, _)| key == id)
            .and_then(|(_, value)| value.as_str().map(str::to_string))
    }
}

fn config(peer: &str, follows: bool) -> SessionConfig {
    SessionConfig {
        host_id: Some("alice".to_string()),
        follows_host: follows,
        ..SessionConfig::for_peer(peer)
    }
}

/// Flush every peer, then let every peer take in the result.
fn sync(peers: &mut [&mut Peer]) {
    for peer in peers.iter_mut() {
        block_on(peer.flush());
    }
    for peer in peers.iter_mut() {
        block_on(peer.poll());
    }
}

fn draw_rect(peer: &mut Peer, from: (f64, f64), to: (f64, f64)) {
    peer.set_tool(ToolKind::Shape);
    peer.pointer_down(&PointerInput::mouse(from.0, from.1));
    peer.pointer_move(&PointerInput::mouse(to.0, to.1));
    peer.pointer_up(&PointerInput::mouse(to.0, to.1));
}

fn open_pdf(alice: &mut Peer, pages: u32) {
    block_on(alice.open_document(DocumentInfo::new("deck.pdf", ViewerKind::Pdf)));
    alice.set_page_count(pages);
}

#[test]
fn test_rect_is_invariant_to_zoom() {
    let room = Room::new();
    let mut alice = room.join(config("alice", false), NATURAL);
    let mut bob = room.join(config("bob", true), Size::new(2560.0, 1440.0));
    open_pdf(&mut alice, 1);
    sync(&mut [&mut alice, &mut bob]);
    assert!(bob.document().is_some());
    let scale = bob.mapper().get_scale();
    assert!((scale.x - 2.0).abs() < f64::EPSILON);
    assert!((scale.y - 2.0).abs() < f64::EPSILON);

    draw_rect(&mut alice, (100.0, 50.0), (300.0, 200.0));
    sync(&mut [&mut alice, &mut bob]);

    let stored = room.stored_markup(1, "alice-0").unwrap();
    assert!(stored.contains(r#"x="100" y="50" width="200" height="150""#));
    let alice_id = ElementId::new("alice", 0);
    assert_eq!(bob.layer().surface().markup_of(&alice_id), Some(stored.as_str()));

    // The same rect drawn by the zoomed peer is stored identically.
    draw_rect(&mut bob, (200.0, 100.0), (600.0, 400.0));
    sync(&mut [&mut alice, &mut bob]);
    let from_bob = room.stored_markup(1, "bob-0").unwrap();
    assert_eq!(from_bob.replace("bob-0", "alice-0"), stored);
    assert_eq!(alice.layer().len(), 2);
}

#[test]
fn test_erase_all_then_reopen_page() {
    let room = Room::new();
    let mut alice = room.join(config("alice", false), NATURAL);
    let mut bob = room.join(config("bob", false), NATURAL);
    open_pdf(&mut alice, 3);
    block_on(alice.change_page(3));
    draw_rect(&mut alice, (10.0, 10.0), (50.0, 50.0));
    draw_rect(&mut alice, (60.0, 60.0), (90.0, 90.0));
    sync(&mut [&mut alice, &mut bob]);
    assert_eq!(bob.page(), 3);
    assert_eq!(bob.layer().len(), 2);

    alice.set_tool(ToolKind::EraseAll);
    assert_eq!(alice.tools().tool(), ToolKind::Cursor);
    assert!(alice.layer().is_empty());
    sync(&mut [&mut alice, &mut bob]);
    assert!(bob.layer().is_empty());
    assert!(room.network.snapshot("annotation-page-3").is_empty());

    block_on(alice.change_page(1));
    sync(&mut [&mut alice, &mut bob]);
    block_on(alice.change_page(3));
    sync(&mut [&mut alice, &mut bob]);
    assert_eq!(alice.layer().len(), 0);
    assert_eq!(bob.layer().len(), 0);

    draw_rect(&mut alice, (10.0, 10.0), (20.0, 20.0));
    sync(&mut [&mut alice, &mut bob]);
    assert_eq!(bob.layer().len(), 1);

    block_on(alice.change_page(2));
    block_on(alice.change_page(3));
    assert_eq!(alice.layer().len(), 1);
    assert!(alice.layer().contains(&ElementId::new("alice", 2)));
}

#[test]
fn test_double_delete_is_harmless() {
    let room = Room::new();
    let mut alice = room.join(config("alice", false), NATURAL);
    let mut bob = room.join(config("bob", false), NATURAL);
    open_pdf(&mut alice, 1);
    sync(&mut [&mut alice, &mut bob]);
    draw_rect(&mut alice, (10.0, 10.0), (50.0, 50.0));
    sync(&mut [&mut alice, &mut bob]);

    let id = ElementId::new("alice", 0);
    for peer in [&mut alice, &mut bob] {
        peer.set_tool(ToolKind::Erase);
        peer.pointer_down(&PointerInput::mouse(30.0, 30.0));
        peer.element_hover(&id);
        assert!(peer.layer().is_dimmed(&id));
        peer.pointer_up(&PointerInput::mouse(30.0, 30.0));
        assert!(peer.layer().is_empty());
    }
    sync(&mut [&mut alice, &mut bob]);
    sync(&mut [&mut alice, &mut bob]);

    assert!(room.network.snapshot("annotation-page-1").is_empty());
    assert!(alice.layer().is_empty());
    assert!(bob.layer().is_empty());
    assert!(alice.tools().pending_erase().is_empty());
}

#[test]
fn test_only_authority_drives_the_view() {
    let room = Room::new();
    let mut alice = room.join(config("alice", false), NATURAL);
    let mut bob = room.join(config("bob", true), Size::new(2560.0, 1440.0));
    let mut carol = room.join(config("carol", false), NATURAL);
    assert_eq!(alice.view().role(), ViewRole::Authority);
    assert_eq!(bob.view().role(), ViewRole::Follower);
    assert_eq!(carol.view().role(), ViewRole::Independent);
    open_pdf(&mut alice, 1);
    sync(&mut [&mut alice, &mut bob, &mut carol]);

    alice.zoom_in();
    sync(&mut [&mut alice, &mut bob, &mut carol]);
    assert!((bob.view().zoom() - 1.05).abs() < f64::EPSILON);
    assert!((bob.rendered_size().height - 1512.0).abs() < 1e-9);
    assert!((carol.view().zoom() - 1.0).abs() < f64::EPSILON);

    // Zooming as a non-authority changes only the local view.
    bob.zoom_in();
    carol.zoom_out();
    sync(&mut [&mut alice, &mut bob, &mut carol]);
    assert!((alice.view().zoom() - 1.05).abs() < f64::EPSILON);
    assert!((bob.view().zoom() - 1.1).abs() < f64::EPSILON);

    bob.set_scroll_extent(Size::new(2000.0, 1000.0));
    alice.on_scroll(ScrollMetrics {
        left: 250.0,
        top: 100.0,
        width: 1000.0,
        height: 500.0,
    });
    sync(&mut [&mut alice, &mut bob, &mut carol]);
    let target = bob.take_scroll_target().unwrap();
    assert!((target.left - 500.0).abs() < f64::EPSILON);
    assert!((target.top - 200.0).abs() < f64::EPSILON);
    assert!(target.smooth);
    assert!(carol.take_scroll_target().is_none());
}

#[test]
fn test_slide_keys_replayed_for_late_joiner() {
    let room = Room::new();
    let mut alice = room.join(config("alice", false), NATURAL);
    alice.set_viewer(Box::new(RecordingViewer::new()));
    block_on(alice.open_document(DocumentInfo::new("deck", ViewerKind::Slides)));
    block_on(alice.on_viewer_message(ViewerMessage::Loaded { page_count: 10 }));
    assert_eq!(alice.page_count(), 10);
    for code in [39, 37, 39] {
        block_on(alice.on_viewer_message(ViewerMessage::KeyPressed { code, page: 1 }));
    }
    block_on(alice.flush());

    let mut bob = room.join(config("bob", false), NATURAL);
    assert_eq!(
        bob.sequencer().sequence(1).map(|s| s.codes()),
        Some(vec![39])
    );
    let bob_viewer = RecordingViewer::new();
    bob.set_viewer(Box::new(bob_viewer.clone()));
    block_on(bob.on_viewer_message(ViewerMessage::Loaded { page_count: 10 }));
    assert_eq!(
        bob_viewer.take(),
        vec![OutboundViewerMessage::KeyDownRemote { code: 39 }]
    );

    // A key that crosses into page 2 moves bob's viewer and page.
    block_on(alice.on_viewer_message(ViewerMessage::KeyPressed { code: 39, page: 2 }));
    assert_eq!(alice.page(), 2);
    sync(&mut [&mut alice, &mut bob]);
    assert_eq!(bob.page(), 2);
    assert_eq!(
        bob_viewer.take(),
        vec![OutboundViewerMessage::KeyDownRemote { code: 39 }]
    );

    // A peer whose viewer has not loaded yet replays each key once.
    let mut carol = room.join(config("carol", false), NATURAL);
    let carol_viewer = RecordingViewer::new();
    carol.set_viewer(Box::new(carol_viewer.clone()));
    block_on(alice.on_viewer_message(ViewerMessage::KeyPressed { code: 37, page: 2 }));
    sync(&mut [&mut alice, &mut bob, &mut carol]);
    assert!(carol_viewer.take().is_empty());
    block_on(carol.on_viewer_message(ViewerMessage::Loaded { page_count: 10 }));
    assert_eq!(
        carol_viewer.take(),
        vec![OutboundViewerMessage::KeyDownRemote { code: 37 }]
    );
}

#[test]
fn test_closing_document_unmounts_followers() {
    let room = Room::new();
    let mut alice = room.join(config("alice", false), NATURAL);
    let mut bob = room.join(config("bob", false), NATURAL);
    open_pdf(&mut alice, 2);
    draw_rect(&mut alice, (10.0, 10.0), (50.0, 50.0));
    sync(&mut [&mut alice, &mut bob]);
    assert_eq!(bob.layer().len(), 1);

    alice.close_document();
    sync(&mut [&mut alice, &mut bob]);
    assert!(bob.document().is_none());
    assert!(bob.layer().is_empty());
    assert!(room.network.snapshot("annotation-page-1").is_empty());

    // Pointer input without a document is dropped.
    draw_rect(&mut bob, (10.0, 10.0), (50.0, 50.0));
    assert!(bob.layer().is_empty());
}
