//! Zoom and scroll following.
//!
//! One peer (the host) is authoritative. It broadcasts its zoom after every
//! step and its scroll position as fractions of the scrollable extent, so
//! followers with other screen sizes land on the same part of the page.

use crate::channel::PeerEvent;
use crate::config::{SessionConfig, ZoomConfig};
use kurbo::Size;

/// How this peer takes part in view sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRole {
    /// Broadcasts zoom and scroll.
    Authority,
    /// Applies the authority's zoom and scroll.
    Follower,
    /// Neither emits nor applies.
    Independent,
}

/// Scroll position and scrollable extent of the document container, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Where a follower should scroll to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTarget {
    pub left: f64,
    pub top: f64,
    pub smooth: bool,
}

/// What a follower should do after a remote view event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewCommand {
    SetZoom(f64),
    ScrollTo(ScrollTarget),
}

fn round_zoom(zoom: f64) -> f64 {
    (zoom * 100.0).round() / 100.0
}

fn fraction(offset: f64, extent: f64) -> f64 {
    if extent > 0.0 { offset / extent } else { 0.0 }
}

#[derive(Debug, Clone)]
pub struct ViewSyncBroadcaster {
    role: ViewRole,
    zoom: f64,
    config: ZoomConfig,
}

impl ViewSyncBroadcaster {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            role: Self::role_for(config.host_id.as_deref(), &config.peer_id, config.follows_host),
            zoom: round_zoom(config.zoom.initial.max(config.zoom.min)),
            config: config.zoom,
        }
    }

    fn role_for(host_id: Option<&str>, peer_id: &str, follows_host: bool) -> ViewRole {
        if host_id == Some(peer_id) {
            ViewRole::Authority
        } else if follows_host {
            ViewRole::Follower
        } else {
            ViewRole::Independent
        }
    }

    pub fn role(&self) -> ViewRole {
        self.role
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Reassign the authority. The old authority simply stops emitting.
    pub fn set_authority(&mut self, host_id: Option<&str>, peer_id: &str, follows_host: bool) {
        self.role = Self::role_for(host_id, peer_id, follows_host);
        log::info!("View sync role is now {:?}", self.role);
    }

    pub fn zoom_in(&mut self) -> Option<PeerEvent> {
        self.set_zoom(self.zoom + self.config.step)
    }

    pub fn zoom_out(&mut self) -> Option<PeerEvent> {
        self.set_zoom(self.zoom - self.config.step)
    }

    /// Set the local zoom. Returns the event to broadcast, if this peer is
    /// the authority and the zoom actually changed.
    pub fn set_zoom(&mut self, zoom: f64) -> Option<PeerEvent> {
        let zoom = round_zoom(zoom.max(self.config.min));
        if (zoom - self.zoom).abs() < f64::EPSILON {
            return None;
        }
        self.zoom = zoom;
        (self.role == ViewRole::Authority).then_some(PeerEvent::SyncZoom { zoom })
    }

    /// The local container scrolled.
    pub fn on_scroll(&self, metrics: ScrollMetrics) -> Option<PeerEvent> {
        if self.role != ViewRole::Authority {
            return None;
        }
        Some(PeerEvent::SyncScroll {
            x: fraction(metrics.left, metrics.width),
            y: fraction(metrics.top, metrics.height),
        })
    }

    /// Apply a view event from the authority. `scroll_extent` is the local
    /// container's scrollable size. Non-followers ignore everything.
    pub fn apply_remote(&mut self, event: &PeerEvent, scroll_extent: Size) -> Option<ViewCommand> {
        if self.role != ViewRole::Follower {
            return None;
        }
        match *event {
            PeerEvent::SyncZoom { zoom } => {
                self.zoom = round_zoom(zoom.max(self.config.min));
                Some(ViewCommand::SetZoom(self.zoom))
            }
            PeerEvent::SyncScroll { x, y } => Some(ViewCommand::ScrollTo(ScrollTarget {
                left: x * scroll_extent.width,
                top: y * scroll_extent.height,
                smooth: true,
            })),
            _ => None,
        }
    }
}
