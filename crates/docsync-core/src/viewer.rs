//! Messages exchanged with the embedded slide viewer iframe.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Viewer message errors.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Malformed viewer message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Viewer message '{event}' is missing '{field}'")]
    MissingField { event: String, field: &'static str },
    #[error("Invalid number in viewer message: {0}")]
    InvalidNumber(String),
    #[error("Unknown viewer event: {0}")]
    UnknownEvent(String),
    #[error("Viewer unavailable: {0}")]
    Unavailable(String),
}

/// Inbound messages posted by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerMessage {
    /// `{event: 'load', set}`: the deck finished loading.
    Loaded { page_count: u32 },
    /// `{event: 'page', page}`
    PageChanged { page: u32 },
    /// `{event: 'keypress', code, page}`: a navigation key was pressed in
    /// the viewer, which is now on `page`.
    KeyPressed { code: u32, page: u32 },
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    event: String,
    #[serde(default)]
    set: Option<Value>,
    #[serde(default)]
    page: Option<Value>,
    #[serde(default)]
    code: Option<Value>,
}

/// Numbers arrive either as JSON numbers or as strings.
fn number(value: Option<&Value>, event: &str, field: &'static str) -> Result<u32, ViewerError> {
    let value = value.ok_or_else(|| ViewerError::MissingField {
        event: event.to_string(),
        field,
    })?;
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ViewerError::InvalidNumber(value.to_string()))
}

impl ViewerMessage {
    pub fn from_value(value: Value) -> Result<Self, ViewerError> {
        let raw: RawMessage = serde_json::from_value(value)?;
        let event = raw.event.as_str();
        match event {
            "load" => Ok(ViewerMessage::Loaded {
                page_count: number(raw.set.as_ref(), event, "set")?,
            }),
            "page" => Ok(ViewerMessage::PageChanged {
                page: number(raw.page.as_ref(), event, "page")?,
            }),
            "keypress" => Ok(ViewerMessage::KeyPressed {
                code: number(raw.code.as_ref(), event, "code")?,
                page: number(raw.page.as_ref(), event, "page")?,
            }),
            other => Err(ViewerError::UnknownEvent(other.to_string())),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ViewerError> {
        Self::from_value(serde_json::from_str(json)?)
    }
}

/// Outbound messages posted to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum OutboundViewerMessage {
    /// Local navigation.
    #[serde(rename = "keydown")]
    KeyDown { code: u32 },
    /// Navigation replayed on behalf of another peer.
    #[serde(rename = "keydown-remote")]
    KeyDownRemote { code: u32 },
}

/// Channel to the embedded viewer.
pub trait ViewerBridge {
    fn post(&mut self, message: &OutboundViewerMessage) -> Result<(), ViewerError>;
}

/// Viewer bridge that records posted messages. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingViewer {
    posted: Rc<RefCell<Vec<OutboundViewerMessage>>>,
}

impl RecordingViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<OutboundViewerMessage> {
        std::mem::take(&mut *self.posted.borrow_mut())
    }
}

impl ViewerBridge for RecordingViewer {
    fn post(&mut self, message: &OutboundViewerMessage) -> Result<(), ViewerError> {
        self.posted.borrow_mut().push(*message);
        Ok(())
    }
}
