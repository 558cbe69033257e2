//! Page agreement for the embedded slide viewer.
//!
//! The slide iframe only understands left/right key presses and never tells
//! other peers where it is. The navigating peer therefore records, per
//! page, the keys it sent since arriving there, compacted so the list stays
//! short, and replicates the list through the `keys` store. A peer whose
//! iframe (re)loads replays the current page's list against it.

use crate::channel::PeerEvent;
use crate::store::{StoreOp, KEYS_STORE};
use crate::viewer::OutboundViewerMessage;
use serde_json::Value;
use std::collections::BTreeMap;

/// Navigation keys understood by the slide viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NavKey {
    Previous = 37,
    Next = 39,
}

impl NavKey {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            37 => Some(NavKey::Previous),
            39 => Some(NavKey::Next),
            _ => None,
        }
    }
}

/// Compacted navigation history of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequence {
    keys: Vec<NavKey>,
}

impl KeySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored list; unknown codes are skipped.
    pub fn from_codes(codes: &[u32]) -> Self {
        Self {
            keys: codes.iter().filter_map(|c| NavKey::from_code(*c)).collect(),
        }
    }

    /// Decode a store value (a JSON array of codes).
    pub fn from_value(value: &Value) -> Self {
        let codes: Vec<u32> = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_u64().and_then(|c| u32::try_from(c).ok()))
                    .collect()
            })
            .unwrap_or_default();
        Self::from_codes(&codes)
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.codes())
    }

    pub fn codes(&self) -> Vec<u32> {
        self.keys.iter().map(|k| k.code()).collect()
    }

    pub fn keys(&self) -> &[NavKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Record a key. `Next` right after a trailing `Previous` cancels it
    /// instead of being appended.
    pub fn push(&mut self, key: NavKey) {
        if key == NavKey::Next && self.keys.last() == Some(&NavKey::Previous) {
            self.keys.pop();
            return;
        }
        self.keys.push(key);
    }

    /// Pop one trailing `Previous`, if any. Returns whether the list changed.
    pub fn pop_trailing_previous(&mut self) -> bool {
        if self.keys.last() == Some(&NavKey::Previous) {
            self.keys.pop();
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Tracks the key sequences of every page and the slide viewer's state.
#[derive(Debug, Default)]
pub struct RemoteKeySequencer {
    page: u32,
    sequences: BTreeMap<u32, KeySequence>,
    /// Whether the local iframe has reported `load`.
    loaded: bool,
    /// Remote keys received before the iframe loaded.
    held: Vec<u32>,
    viewer_out: Vec<OutboundViewerMessage>,
    events_out: Vec<PeerEvent>,
    store_out: Vec<StoreOp>,
}

impl RemoteKeySequencer {
    pub fn new(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn sequence(&self, page: u32) -> Option<&KeySequence> {
        self.sequences.get(&page)
    }

    /// Follow a page change made by another peer; no compaction.
    pub fn set_page(&mut self, page: u32) {
        if page != self.page && !self.loaded {
            // The new page's replay supersedes keys held for the old one.
            self.held.clear();
        }
        self.page = page;
    }

    /// A new iframe instance is being mounted; keys wait for its `load`.
    pub fn reset_viewer(&mut self) {
        self.loaded = false;
    }

    /// Replace the local mirror with the `keys` store contents.
    pub fn load_all(&mut self, entries: Vec<(String, Value)>) {
        self.sequences.clear();
        for (key, value) in entries {
            self.apply_remote(&key, Some(&value));
        }
    }

    /// Mirror a change of the `keys` store.
    pub fn apply_remote(&mut self, key: &str, value: Option<&Value>) {
        let Ok(page) = key.parse::<u32>() else {
            log::warn!("Ignoring key sequence for page '{}'", key);
            return;
        };
        if page == self.page && !self.loaded {
            // Held keys are already part of the sequence that will be replayed.
            self.held.clear();
        }
        match value {
            Some(value) => {
                self.sequences.insert(page, KeySequence::from_value(value));
            }
            None => {
                self.sequences.remove(&page);
            }
        }
    }

    /// The local viewer reported a key press while on `page`. Returns the
    /// page the viewer is now on if it crossed a page boundary.
    pub fn key_pressed(&mut self, code: u32, page: u32) -> Option<u32> {
        self.events_out.push(PeerEvent::RemoteKeypress { code });
        if page != self.page {
            self.cross_to(page);
            return Some(page);
        }
        let key = NavKey::from_code(code)?;
        let sequence = self.sequences.entry(page).or_default();
        sequence.push(key);
        let value = sequence.to_value();
        self.write(page, value);
        None
    }

    /// Move to `page` as the navigating peer, compacting the old page.
    pub fn cross_to(&mut self, page: u32) {
        let old = self.page;
        if page > old {
            let changed = self
                .sequences
                .get_mut(&old)
                .is_some_and(|s| s.pop_trailing_previous());
            if changed {
                let value = self.sequences.get(&old).map(|s| s.to_value());
                if let Some(value) = value {
                    self.write(old, value);
                }
            }
        } else if page < old {
            self.sequences.insert(old, KeySequence::new());
            self.write(old, Value::Array(Vec::new()));
        }
        self.page = page;
    }

    /// The local viewer finished loading: replay the current page's keys,
    /// then any remote keys held meanwhile.
    pub fn viewer_loaded(&mut self) {
        self.loaded = true;
        let replay = self
            .sequences
            .get(&self.page)
            .map(|s| s.codes())
            .unwrap_or_default();
        log::debug!("Replaying {} keys on page {}", replay.len(), self.page);
        for code in replay.into_iter().chain(self.held.drain(..)) {
            self.viewer_out
                .push(OutboundViewerMessage::KeyDownRemote { code });
        }
    }

    /// Another peer pressed a navigation key.
    pub fn remote_keypress(&mut self, code: u32) {
        if self.loaded {
            self.viewer_out
                .push(OutboundViewerMessage::KeyDownRemote { code });
        } else {
            self.held.push(code);
        }
    }

    /// Queue deletion of the sequences of pages `1..=pages`.
    pub fn delete_pages(&mut self, pages: u32) {
        for page in 1..=pages {
            self.sequences.remove(&page);
            self.store_out.push(StoreOp::Delete {
                store: KEYS_STORE.to_string(),
                key: page.to_string(),
            });
        }
    }

    fn write(&mut self, page: u32, value: Value) {
        self.store_out.push(StoreOp::Set {
            store: KEYS_STORE.to_string(),
            key: page.to_string(),
            value,
        });
    }

    pub fn take_viewer_messages(&mut self) -> Vec<OutboundViewerMessage> {
        std::mem::take(&mut self.viewer_out)
    }

    pub fn take_events(&mut self) -> Vec<PeerEvent> {
        std::mem::take(&mut self.events_out)
    }

    pub fn take_store_ops(&mut self) -> Vec<StoreOp> {
        std::mem::take(&mut self.store_out)
    }
}
