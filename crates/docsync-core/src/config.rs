//! Session configuration.
//!
//! Every field has a default so a config file only needs to name what it
//! changes. Loading goes through serde_json.

use crate::elements::AnnotationColor;
use kurbo::Size;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Natural size of an embedded slide, used as the fixed base space for slides.
pub const DEFAULT_SLIDE_SIZE: Size = Size::new(1280.0, 720.0);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Which viewer the annotation layer is mounted over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerKind {
    /// A PDF page rendered locally; its base size is captured on first layout.
    #[default]
    Pdf,
    /// An embedded slide iframe; base size is fixed and navigation is keystroke only.
    #[serde(alias = "googleslides")]
    Slides,
}

/// Zoom stepping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub initial: f64,
    pub step: f64,
    pub min: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            initial: 1.0,
            step: 0.05,
            min: 0.25,
        }
    }
}

/// Stroke parameters applied to newly created elements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeConfig {
    pub pencil_width: f64,
    pub highlight_width: f64,
    /// Alpha byte appended to the highlight colour.
    pub highlight_alpha: u8,
    pub rect_width: f64,
    pub rect_corner_radius: f64,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            pencil_width: 4.0,
            highlight_width: 12.0,
            highlight_alpha: 0x6e,
            rect_width: 4.0,
            rect_corner_radius: 8.0,
        }
    }
}

/// Bounds and step sizes for the text entry overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOverlayLimits {
    pub max_width: f64,
    pub max_height: f64,
    pub grow_x: f64,
    pub grow_y: f64,
    pub shrink_x: f64,
    pub shrink_y: f64,
    /// Distance kept from the right viewport edge while growing.
    pub edge_margin_x: f64,
    /// Distance kept from the bottom viewport edge while growing.
    pub edge_margin_y: f64,
    pub max_chars: usize,
    /// Offset between the overlay box and the committed text element.
    pub inset: f64,
    pub font_size: f64,
}

impl Default for TextOverlayLimits {
    fn default() -> Self {
        Self {
            max_width: 200.0,
            max_height: 300.0,
            grow_x: 15.0,
            grow_y: 30.0,
            shrink_x: 15.0,
            shrink_y: 20.0,
            edge_margin_x: 10.0,
            edge_margin_y: 20.0,
            max_chars: 200,
            inset: 6.0,
            font_size: 14.0,
        }
    }
}

/// Configuration of one peer's annotation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Local peer id, also the prefix of every element id this peer creates.
    pub peer_id: String,
    /// Peer authoritative for zoom and scroll.
    pub host_id: Option<String>,
    /// Whether this peer applies the host's zoom and scroll (recorders, observers).
    pub follows_host: bool,
    pub slide_size: Size,
    pub zoom: ZoomConfig,
    pub strokes: StrokeConfig,
    pub text: TextOverlayLimits,
    pub initial_color: AnnotationColor,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            peer_id: Uuid::new_v4().to_string(),
            host_id: None,
            follows_host: false,
            slide_size: DEFAULT_SLIDE_SIZE,
            zoom: ZoomConfig::default(),
            strokes: StrokeConfig::default(),
            text: TextOverlayLimits::default(),
            initial_color: AnnotationColor::Purple,
        }
    }
}

impl SessionConfig {
    /// Create a config for the given peer with defaults elsewhere.
    pub fn for_peer(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the rest of the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peer_id.is_empty() {
            return Err(ConfigError::Invalid("peer_id must not be empty".into()));
        }
        if self.zoom.step <= 0.0 || self.zoom.min <= 0.0 || self.zoom.initial < self.zoom.min {
            return Err(ConfigError::Invalid(format!(
                "zoom step/min/initial out of range: {:?}",
                self.zoom
            )));
        }
        if self.slide_size.width <= 0.0 || self.slide_size.height <= 0.0 {
            return Err(ConfigError::Invalid("slide_size must be positive".into()));
        }
        Ok(())
    }

    /// Whether this peer is the authority for zoom and scroll.
    pub fn is_host(&self) -> bool {
        self.host_id.as_deref() == Some(self.peer_id.as_str())
    }
}
