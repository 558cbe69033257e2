//! In-memory replicated store network.
//!
//! All peers joined to one [`MemoryNetwork`] share a backend. Writes land
//! immediately and are queued as change notifications for every other peer
//! subscribed to the store, to be drained on that peer's next poll.

use super::{BoxFuture, KeyPattern, KeyValueStore, StoreChange, StoreError, StoreHub, StoreResult};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
struct Entry {
    seq: u64,
    value: Value,
}

#[derive(Debug, Default)]
struct StoreData {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// (peer, store name)
type Slot = (String, String);

#[derive(Debug, Default)]
struct Backend {
    stores: HashMap<String, StoreData>,
    subscriptions: HashMap<Slot, Vec<KeyPattern>>,
    inbox: HashMap<Slot, Vec<StoreChange>>,
    failing: bool,
}

impl Backend {
    fn check_available(&self) -> StoreResult<()> {
        if self.failing {
            return Err(StoreError::Backend("backend unavailable".into()));
        }
        Ok(())
    }

    fn write(&mut self, writer: &str, store: &str, key: &str, value: Option<Value>) -> StoreResult<()> {
        self.check_available()?;
        match &value {
            Some(v) => {
                let data = self.stores.entry(store.to_string()).or_default();
                if let Some(entry) = data.entries.get_mut(key) {
                    entry.value = v.clone();
                } else {
                    let seq = data.next_seq;
                    data.next_seq += 1;
                    data.entries.insert(
                        key.to_string(),
                        Entry {
                            seq,
                            value: v.clone(),
                        },
                    );
                }
            }
            None => {
                let removed = self
                    .stores
                    .get_mut(store)
                    .and_then(|data| data.entries.remove(key));
                if removed.is_none() {
                    return Ok(());
                }
            }
        }
        self.notify(
            writer,
            store,
            StoreChange {
                key: key.to_string(),
                value,
            },
        );
        Ok(())
    }

    fn notify(&mut self, writer: &str, store: &str, change: StoreChange) {
        let recipients: Vec<Slot> = self
            .subscriptions
            .iter()
            .filter(|((peer, name), patterns)| {
                peer != writer && name == store && patterns.iter().any(|p| p.matches(&change.key))
            })
            .map(|(slot, _)| slot.clone())
            .collect();
        for slot in recipients {
            self.inbox.entry(slot).or_default().push(change.clone());
        }
    }

    fn remove_store(&mut self, name: &str) {
        self.stores.remove(name);
        self.inbox.retain(|(_, store), _| store != name);
    }
}

/// A shared in-memory backend standing in for the replicated store service.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    backend: Rc<RefCell<Backend>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a peer to the network.
    pub fn join(&self, peer_id: impl Into<String>) -> MemoryHub {
        MemoryHub {
            peer: peer_id.into(),
            backend: self.backend.clone(),
        }
    }

    /// Make every subsequent write, delete and populate fail.
    pub fn set_failing(&self, failing: bool) {
        self.backend.borrow_mut().failing = failing;
    }

    /// Names of all live stores, sorted.
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backend.borrow().stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Contents of a store in write order.
    pub fn snapshot(&self, name: &str) -> Vec<(String, Value)> {
        entries_of(&self.backend.borrow(), name)
    }
}

fn entries_of(backend: &Backend, name: &str) -> Vec<(String, Value)> {
    let Some(data) = backend.stores.get(name) else {
        return Vec::new();
    };
    let mut entries: Vec<(&String, &Entry)> = data.entries.iter().collect();
    entries.sort_by_key(|(_, e)| e.seq);
    entries
        .into_iter()
        .map(|(k, e)| (k.clone(), e.value.clone()))
        .collect()
}

/// One peer's view of a [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemoryHub {
    peer: String,
    backend: Rc<RefCell<Backend>>,
}

impl MemoryHub {
    pub fn peer_id(&self) -> &str {
        &self.peer
    }

    fn handle(&self, name: &str) -> MemoryStore {
        MemoryStore {
            name: name.to_string(),
            peer: self.peer.clone(),
            backend: self.backend.clone(),
        }
    }
}

impl StoreHub for MemoryHub {
    type Store = MemoryStore;

    fn create(&self, name: &str) -> MemoryStore {
        self.backend
            .borrow_mut()
            .stores
            .entry(name.to_string())
            .or_default();
        self.handle(name)
    }

    fn get(&self, name: &str) -> Option<MemoryStore> {
        let exists = self.backend.borrow().stores.contains_key(name);
        exists.then(|| self.handle(name))
    }

    fn populate(&self, name: &str) -> BoxFuture<'_, StoreResult<()>> {
        let name = name.to_string();
        Box::pin(async move {
            self.backend.borrow().check_available()?;
            log::debug!("Populated store '{}' for {}", name, self.peer);
            Ok(())
        })
    }

    fn delete(&self, name: &str) -> BoxFuture<'_, StoreResult<()>> {
        let name = name.to_string();
        Box::pin(async move {
            let mut backend = self
                .backend
                .try_borrow_mut()
                .map_err(|e| StoreError::Backend(format!("Borrow error: {}", e)))?;
            backend.check_available()?;
            backend.remove_store(&name);
            Ok(())
        })
    }
}

/// Handle to one named store on a [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    peer: String,
    backend: Rc<RefCell<Backend>>,
}

impl MemoryStore {
    fn slot(&self) -> Slot {
        (self.peer.clone(), self.name.clone())
    }

    fn write(&self, key: &str, value: Option<Value>) -> BoxFuture<'_, StoreResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut backend = self
                .backend
                .try_borrow_mut()
                .map_err(|e| StoreError::Backend(format!("Borrow error: {}", e)))?;
            backend.write(&self.peer, &self.name, &key, value)
        })
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.backend
            .borrow()
            .stores
            .get(&self.name)
            .and_then(|data| data.entries.get(key))
            .map(|e| e.value.clone())
    }

    fn get_all(&self) -> Vec<(String, Value)> {
        entries_of(&self.backend.borrow(), &self.name)
    }

    fn set(&self, key: &str, value: Value) -> BoxFuture<'_, StoreResult<()>> {
        self.write(key, Some(value))
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, StoreResult<()>> {
        self.write(key, None)
    }

    fn subscribe(&self, pattern: KeyPattern) {
        let mut backend = self.backend.borrow_mut();
        let patterns = backend.subscriptions.entry(self.slot()).or_default();
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }

    fn unsubscribe(&self, pattern: &KeyPattern) {
        let slot = self.slot();
        let mut backend = self.backend.borrow_mut();
        if let Some(patterns) = backend.subscriptions.get_mut(&slot) {
            patterns.retain(|p| p != pattern);
            if patterns.is_empty() {
                backend.subscriptions.remove(&slot);
                backend.inbox.remove(&slot);
            }
        }
    }

    fn take_changes(&self) -> Vec<StoreChange> {
        self.backend
            .borrow_mut()
            .inbox
            .remove(&self.slot())
            .unwrap_or_default()
    }
}
