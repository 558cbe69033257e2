//! Fire-and-forget messaging between peers of a session.
//!
//! Transient signals that must not go through the store (erase-all, view
//! sync, remote navigation keys) travel over a [`MessageChannel`].

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

/// Messaging errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Channel closed")]
    Closed,
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Events exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PeerEvent {
    /// Every annotation on the current page was erased.
    #[serde(rename = "remote-erase-all")]
    RemoteEraseAll,
    /// The host changed zoom.
    #[serde(rename = "syncZoom")]
    SyncZoom { zoom: f64 },
    /// The host scrolled; fractions of the scrollable extent.
    #[serde(rename = "syncScroll")]
    SyncScroll { x: f64, y: f64 },
    /// The navigating peer sent a key to its slide viewer.
    #[serde(rename = "remote-keypress")]
    RemoteKeypress { code: u32 },
}

impl PeerEvent {
    pub const REMOTE_ERASE_ALL: &'static str = "remote-erase-all";
    pub const SYNC_ZOOM: &'static str = "syncZoom";
    pub const SYNC_SCROLL: &'static str = "syncScroll";
    pub const REMOTE_KEYPRESS: &'static str = "remote-keypress";

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            PeerEvent::RemoteEraseAll => Self::REMOTE_ERASE_ALL,
            PeerEvent::SyncZoom { .. } => Self::SYNC_ZOOM,
            PeerEvent::SyncScroll { .. } => Self::SYNC_SCROLL,
            PeerEvent::RemoteKeypress { .. } => Self::REMOTE_KEYPRESS,
        }
    }
}

/// Pub/sub channel to every other peer in the session.
pub trait MessageChannel {
    fn emit(&self, event: &PeerEvent) -> ChannelResult<()>;

    /// Start receiving events with this name.
    fn add_listener(&self, event_name: &str);

    fn remove_listeners(&self, event_name: &str);

    /// Drain received events in arrival order.
    fn take_events(&self) -> Vec<PeerEvent>;
}

#[derive(Debug, Default)]
struct Mailbox {
    listeners: HashSet<String>,
    queue: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct Bus {
    mailboxes: HashMap<String, Mailbox>,
    closed: bool,
}

/// In-memory message bus shared by all peers of a simulated session.
/// Events are carried as JSON text, like the real channel.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    inner: Rc<RefCell<Bus>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, peer_id: impl Into<String>) -> MemoryChannel {
        let peer = peer_id.into();
        self.inner
            .borrow_mut()
            .mailboxes
            .entry(peer.clone())
            .or_default();
        MemoryChannel {
            peer,
            bus: self.inner.clone(),
        }
    }

    /// Make every subsequent emit fail.
    pub fn close(&self) {
        self.inner.borrow_mut().closed = true;
    }
}

/// One peer's endpoint on a [`MemoryBus`].
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    peer: String,
    bus: Rc<RefCell<Bus>>,
}

impl MessageChannel for MemoryChannel {
    fn emit(&self, event: &PeerEvent) -> ChannelResult<()> {
        let payload = serde_json::to_string(event)?;
        let mut bus = self.bus.borrow_mut();
        if bus.closed {
            return Err(ChannelError::Closed);
        }
        let name = event.name();
        for (peer, mailbox) in bus.mailboxes.iter_mut() {
            if *peer != self.peer && mailbox.listeners.contains(name) {
                mailbox.queue.push((name.to_string(), payload.clone()));
            }
        }
        Ok(())
    }

    fn add_listener(&self, event_name: &str) {
        let mut bus = self.bus.borrow_mut();
        let mailbox = bus.mailboxes.entry(self.peer.clone()).or_default();
        mailbox.listeners.insert(event_name.to_string());
    }

    fn remove_listeners(&self, event_name: &str) {
        let mut bus = self.bus.borrow_mut();
        if let Some(mailbox) = bus.mailboxes.get_mut(&self.peer) {
            mailbox.listeners.remove(event_name);
            mailbox.queue.retain(|(name, _)| name != event_name);
        }
    }

    fn take_events(&self) -> Vec<PeerEvent> {
        let queue = {
            let mut bus = self.bus.borrow_mut();
            match bus.mailboxes.get_mut(&self.peer) {
                Some(mailbox) => std::mem::take(&mut mailbox.queue),
                None => return Vec::new(),
            }
        };
        queue
            .into_iter()
            .filter_map(|(name, payload)| match serde_json::from_str(&payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    log::warn!("Dropping malformed '{}' event: {}", name, e);
                    None
                }
            })
            .collect()
    }
}
