//! Scenario files and their replay.
//!
//! A scenario lists the peers of a session and the steps they take. Steps
//! only queue work; `sync` flushes every peer and then polls every peer, the
//! way a round trip through the real store would.

use docsync_core::config::ConfigError;
use docsync_core::elements::InvalidElementId;
use docsync_core::view_sync::ScrollMetrics;
use docsync_core::viewer::RecordingViewer;
use docsync_core::{
    AnnotationColor, DocumentInfo, ElementId, MemoryBus, MemoryChannel, MemoryHub, MemoryNetwork,
    MemorySurface, OutboundViewerMessage, PeerSession, PointerInput, SessionConfig, ToolKind,
    ViewerError, ViewerKind, ViewerMessage,
};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Simulation errors.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),
    #[error("Duplicate peer: {0}")]
    DuplicatePeer(String),
    #[error(transparent)]
    ElementId(#[from] InvalidElementId),
    #[error(transparent)]
    Viewer(#[from] ViewerError),
}

fn default_natural() -> Size {
    Size::new(1280.0, 720.0)
}

/// One peer of a scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerSpec {
    pub config: SessionConfig,
    /// Window the document is fitted into.
    #[serde(default = "default_natural")]
    pub window: Size,
    /// Screen position of the document container.
    #[serde(default)]
    pub origin: Point,
}

/// A step taken by one peer, or a sync round.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// A peer joining after the session started.
    Join(PeerSpec),
    OpenDocument {
        peer: String,
        url: String,
        #[serde(rename = "type", default)]
        kind: ViewerKind,
        #[serde(default)]
        pages: Option<u32>,
    },
    CloseDocument { peer: String },
    Page { peer: String, page: u32 },
    NextPage { peer: String },
    PrevPage { peer: String },
    Tool { peer: String, tool: ToolKind },
    Color { peer: String, color: AnnotationColor },
    Down { peer: String, x: f64, y: f64 },
    Move { peer: String, x: f64, y: f64 },
    Up { peer: String, x: f64, y: f64 },
    Leave { peer: String, x: f64, y: f64 },
    Hover { peer: String, id: String },
    Type { peer: String, text: String },
    Blur { peer: String },
    ZoomIn { peer: String },
    ZoomOut { peer: String },
    Scroll {
        peer: String,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
    },
    /// A raw message posted by the peer's slide viewer.
    Viewer { peer: String, message: Value },
    Sync,
}

/// A complete scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Natural size of every document page.
    #[serde(default = "default_natural")]
    pub natural: Size,
    pub peers: Vec<PeerSpec>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        let late = scenario.steps.iter().filter_map(|step| match step {
            Step::Join(spec) => Some(spec),
            _ => None,
        });
        for peer in scenario.peers.iter().chain(late) {
            peer.config.validate()?;
        }
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, SimError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Final state of one peer.
#[derive(Debug, Clone, Serialize)]
pub struct PeerReport {
    pub id: String,
    pub role: String,
    pub document: Option<DocumentInfo>,
    pub page: u32,
    pub page_count: u32,
    pub zoom: f64,
    pub elements: Vec<String>,
    /// Everything posted to the peer's slide viewer.
    pub viewer: Vec<OutboundViewerMessage>,
}

/// Final state of the whole session.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub stores: BTreeMap<String, BTreeMap<String, Value>>,
    pub peers: Vec<PeerReport>,
}

type Session = PeerSession<MemoryHub, MemoryChannel, MemorySurface>;

struct SimPeer {
    id: String,
    session: Session,
    viewer: RecordingViewer,
    posted: Vec<OutboundViewerMessage>,
}

/// Replays a scenario against an in-memory network.
pub struct Simulation {
    network: MemoryNetwork,
    bus: MemoryBus,
    peers: Vec<SimPeer>,
    natural: Size,
    sync_every_step: bool,
}

impl Simulation {
    pub fn new(natural: Size, sync_every_step: bool) -> Self {
        Self {
            network: MemoryNetwork::new(),
            bus: MemoryBus::new(),
            peers: Vec::new(),
            natural,
            sync_every_step,
        }
    }

    /// Connect a peer.
    pub async fn join(&mut self, spec: PeerSpec) -> Result<(), SimError> {
        let id = spec.config.peer_id.clone();
        if self.peers.iter().any(|p| p.id == id) {
            return Err(SimError::DuplicatePeer(id));
        }
        let mut session = PeerSession::connect(
            spec.config,
            self.network.join(&id),
            self.bus.join(&id),
            MemorySurface::new(),
        )
        .await;
        session.set_layout(self.natural, spec.window);
        session.set_container_origin(Some(spec.origin));
        let viewer = RecordingViewer::new();
        session.set_viewer(Box::new(viewer.clone()));
        log::info!("{} joined", id);
        self.peers.push(SimPeer {
            id,
            session,
            viewer,
            posted: Vec::new(),
        });
        Ok(())
    }

    fn peer(&mut self, id: &str) -> Result<&mut Session, SimError> {
        self.peers
            .iter_mut()
            .find(|p| p.id == id)
            .map(|p| &mut p.session)
            .ok_or_else(|| SimError::UnknownPeer(id.to_string()))
    }

    /// Flush every peer, then poll every peer.
    pub async fn sync(&mut self) {
        for peer in &mut self.peers {
            peer.session.flush().await;
        }
        for peer in &mut self.peers {
            peer.session.poll().await;
            peer.posted.extend(peer.viewer.take());
        }
    }

    pub async fn step(&mut self, step: Step) -> Result<(), SimError> {
        log::debug!("Step {:?}", step);
        match step {
            Step::Join(spec) => self.join(spec).await?,
            Step::OpenDocument {
                peer,
                url,
                kind,
                pages,
            } => {
                let session = self.peer(&peer)?;
                session.open_document(DocumentInfo::new(url, kind)).await;
                if let Some(pages) = pages {
                    session.set_page_count(pages);
                }
            }
            Step::CloseDocument { peer } => self.peer(&peer)?.close_document(),
            Step::Page { peer, page } => self.peer(&peer)?.change_page(page).await,
            Step::NextPage { peer } => self.peer(&peer)?.next_page().await,
            Step::PrevPage { peer } => self.peer(&peer)?.prev_page().await,
            Step::Tool { peer, tool } => self.peer(&peer)?.set_tool(tool),
            Step::Color { peer, color } => self.peer(&peer)?.set_color(color),
            Step::Down { peer, x, y } => self.peer(&peer)?.pointer_down(&PointerInput::mouse(x, y)),
            Step::Move { peer, x, y } => self.peer(&peer)?.pointer_move(&PointerInput::mouse(x, y)),
            Step::Up { peer, x, y } => self.peer(&peer)?.pointer_up(&PointerInput::mouse(x, y)),
            Step::Leave { peer, x, y } => {
                self.peer(&peer)?.pointer_leave(&PointerInput::mouse(x, y))
            }
            Step::Hover { peer, id } => {
                let id: ElementId = id.parse()?;
                self.peer(&peer)?.element_hover(&id);
            }
            Step::Type { peer, text } => {
                let session = self.peer(&peer)?;
                // One character at a time, so the box grows as it fills.
                for ch in text.chars() {
                    let typed = ch.to_string();
                    let overflowing = session
                        .tools()
                        .overlay()
                        .is_some_and(|o| o.estimate_overflow(&typed));
                    session.type_text(&typed, overflowing);
                }
            }
            Step::Blur { peer } => self.peer(&peer)?.blur_text(),
            Step::ZoomIn { peer } => self.peer(&peer)?.zoom_in(),
            Step::ZoomOut { peer } => self.peer(&peer)?.zoom_out(),
            Step::Scroll {
                peer,
                left,
                top,
                width,
                height,
            } => self.peer(&peer)?.on_scroll(ScrollMetrics {
                left,
                top,
                width,
                height,
            }),
            Step::Viewer { peer, message } => {
                let message = ViewerMessage::from_value(message)?;
                self.peer(&peer)?.on_viewer_message(message).await;
            }
            Step::Sync => {
                self.sync().await;
                return Ok(());
            }
        }
        if self.sync_every_step {
            self.sync().await;
        }
        Ok(())
    }

    /// Collect the final state.
    pub fn report(&mut self) -> Report {
        let stores = self
            .network
            .store_names()
            .into_iter()
            .map(|name| {
                let entries = self.network.snapshot(&name).into_iter().collect();
                (name, entries)
            })
            .collect();
        let peers = self
            .peers
            .iter_mut()
            .map(|peer| {
                peer.posted.extend(peer.viewer.take());
                let session = &peer.session;
                PeerReport {
                    id: peer.id.clone(),
                    role: format!("{:?}", session.view().role()),
                    document: session.document().cloned(),
                    page: session.page(),
                    page_count: session.page_count(),
                    zoom: session.view().zoom(),
                    elements: session.layer().ids().iter().map(|id| id.to_string()).collect(),
                    viewer: peer.posted.clone(),
                }
            })
            .collect();
        Report { stores, peers }
    }
}

/// Run a whole scenario and report the final state.
pub async fn run(scenario: Scenario, sync_every_step: bool) -> Result<Report, SimError> {
    let mut sim = Simulation::new(scenario.natural, sync_every_step);
    for spec in scenario.peers {
        sim.join(spec).await?;
    }
    let steps = scenario.steps.len();
    for step in scenario.steps {
        sim.step(step).await?;
    }
    // Settle whatever the last steps queued.
    sim.sync().await;
    log::info!("Replayed {} steps", steps);
    Ok(sim.report())
}
