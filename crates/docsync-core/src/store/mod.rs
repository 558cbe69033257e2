//! Replicated key-value store boundary.
//!
//! The store itself (delivery, ordering, last-write-wins) is an external
//! collaborator. This module only describes the operations the engine needs
//! from it and provides an in-memory network for tests and the simulator.

mod memory;

pub use memory::{MemoryHub, MemoryNetwork, MemoryStore};

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future for async operations (single-threaded, compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Name of the store holding one page's annotations.
pub fn annotation_store_name(page: u32) -> String {
    format!("annotation-page-{page}")
}

/// Store holding the navigation key sequence of every page, keyed by page.
pub const KEYS_STORE: &str = "keys";

/// Store holding the open document and the current page.
pub const DOC_STORE: &str = "doc";

/// Which keys a subscription covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    /// Wildcard, every key of the store.
    All,
    Key(String),
}

impl KeyPattern {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::All => true,
            KeyPattern::Key(k) => k == key,
        }
    }
}

/// One change notification. A missing value means the key was deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: String,
    pub value: Option<Value>,
}

/// Handle to one named replicated store.
///
/// Reads are local and reflect local writes immediately. Writes are async and
/// propagate to other peers eventually. Change notifications are pulled with
/// [`KeyValueStore::take_changes`] rather than pushed through callbacks.
pub trait KeyValueStore {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<Value>;

    /// All entries, in the order keys were first written.
    fn get_all(&self) -> Vec<(String, Value)>;

    fn set(&self, key: &str, value: Value) -> BoxFuture<'_, StoreResult<()>>;

    /// Deleting a missing key succeeds and changes nothing.
    fn delete(&self, key: &str) -> BoxFuture<'_, StoreResult<()>>;

    fn subscribe(&self, pattern: KeyPattern);

    fn unsubscribe(&self, pattern: &KeyPattern);

    /// Drain pending remote change notifications matching a live subscription.
    fn take_changes(&self) -> Vec<StoreChange>;
}

/// Factory for named stores.
pub trait StoreHub {
    type Store: KeyValueStore + Clone;

    /// Get or create the local handle for a store.
    fn create(&self, name: &str) -> Self::Store;

    fn get(&self, name: &str) -> Option<Self::Store>;

    /// Fetch a store's current contents from the replicated backend.
    fn populate(&self, name: &str) -> BoxFuture<'_, StoreResult<()>>;

    /// Delete a whole store and all its keys.
    fn delete(&self, name: &str) -> BoxFuture<'_, StoreResult<()>>;
}

/// A store write queued by the synchronous engine and executed on flush.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Set {
        store: String,
        key: String,
        value: Value,
    },
    Delete {
        store: String,
        key: String,
    },
    /// Replace the store with a fresh empty one.
    Reset { store: String },
    /// Delete the store without recreating it.
    Drop { store: String },
}

impl StoreOp {
    pub fn store(&self) -> &str {
        match self {
            StoreOp::Set { store, .. }
            | StoreOp::Delete { store, .. }
            | StoreOp::Reset { store }
            | StoreOp::Drop { store } => store,
        }
    }

    /// Run the operation against a hub.
    pub async fn apply<H: StoreHub>(&self, hub: &H) -> StoreResult<()> {
        match self {
            StoreOp::Set { store, key, value } => {
                let handle = hub.create(store);
                handle.set(key, value.clone()).await
            }
            StoreOp::Delete { store, key } => {
                let handle = hub.create(store);
                handle.delete(key).await
            }
            StoreOp::Reset { store } => {
                hub.delete(store).await?;
                hub.create(store);
                Ok(())
            }
            StoreOp::Drop { store } => hub.delete(store).await,
        }
    }
}

/// Execute queued writes in order. Failures are logged and dropped; the next
/// population of the store heals any divergence.
pub async fn flush_ops<H: StoreHub>(hub: &H, ops: Vec<StoreOp>) {
    for op in ops {
        if let Err(e) = op.apply(hub).await {
            log::warn!("Store write to '{}' failed: {}", op.store(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches() {
        assert!(KeyPattern::All.matches("anything"));
        assert!(KeyPattern::Key("page".into()).matches("page"));
        assert!(!KeyPattern::Key("page".into()).matches("document"));
    }

    #[test]
    fn test_store_names() {
        assert_eq!(annotation_store_name(3), "annotation-page-3");
    }

    #[test]
    fn test_flush_swallows_failures() {
        let network = MemoryNetwork::new();
        let hub = network.join("alice");
        network.set_failing(true);
        let ops = vec![StoreOp::Set {
            store: "s".into(),
            key: "k".into(),
            value: Value::from(1),
        }];
        pollster::block_on(flush_ops(&hub, ops));
        network.set_failing(false);
        assert!(hub.create("s").get("k").is_none());
    }

    #[test]
    fn test_reset_empties_store() {
        let network = MemoryNetwork::new();
        let hub = network.join("alice");
        let store = hub.create("s");
        pollster::block_on(store.set("k", Value::from(1))).unwrap();
        let op = StoreOp::Reset { store: "s".into() };
        pollster::block_on(op.apply(&hub)).unwrap();
        assert!(hub.get("s").is_some());
        assert!(hub.create("s").get_all().is_empty());
    }
}
