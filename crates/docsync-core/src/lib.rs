//! DocSync Core Library
//!
//! Annotation synchronization and coordinate normalization for a document
//! viewport shared between the peers of a call.

pub mod channel;
pub mod config;
pub mod elements;
pub mod input;
pub mod key_sequence;
pub mod layer;
pub mod replication;
pub mod session;
pub mod store;
pub mod tools;
pub mod view_sync;
pub mod viewer;
pub mod viewport;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use channel::{ChannelError, MemoryBus, MemoryChannel, MessageChannel, PeerEvent};
pub use config::{ConfigError, SessionConfig, ViewerKind};
pub use elements::{AnnotationColor, AnnotationElement, ElementId};
pub use input::{PointerInput, PointerPhase};
pub use key_sequence::{KeySequence, NavKey, RemoteKeySequencer};
pub use layer::{AnnotationLayer, MemorySurface, RenderSurface};
pub use replication::{AnnotationDelta, AnnotationReplication};
pub use session::{DocumentInfo, PeerSession};
pub use store::{KeyValueStore, MemoryHub, MemoryNetwork, StoreError, StoreHub};
pub use tools::{ToolKind, ToolStateMachine};
pub use view_sync::{ScrollMetrics, ViewRole, ViewSyncBroadcaster};
pub use viewer::{OutboundViewerMessage, ViewerBridge, ViewerError, ViewerMessage};
pub use viewport::{fit_to_window, CoordinateMapper, Scale, ViewportState};
