//! Pointer input for mouse and touch.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Raw pointer position as delivered by the platform, in client coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerInput {
    Mouse { client: Point },
    /// Active touches in the order the platform reports them.
    Touch { touches: Vec<Point> },
}

impl PointerInput {
    pub fn mouse(x: f64, y: f64) -> Self {
        PointerInput::Mouse {
            client: Point::new(x, y),
        }
    }

    pub fn touch(x: f64, y: f64) -> Self {
        PointerInput::Touch {
            touches: vec![Point::new(x, y)],
        }
    }

    /// The single client point used for mapping. Touch uses the first touch.
    /// `None` for a touch event that carries no touches (e.g. `touchend`).
    pub fn client_point(&self) -> Option<Point> {
        match self {
            PointerInput::Mouse { client } => Some(*client),
            PointerInput::Touch { touches } => touches.first().copied(),
        }
    }
}

impl From<Point> for PointerInput {
    fn from(client: Point) -> Self {
        PointerInput::Mouse { client }
    }
}

/// Phase of a pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    /// Pointer left the document; ends the gesture like `Up`.
    Leave,
}
