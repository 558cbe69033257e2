//! Named annotation colours.

use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed palette offered by the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationColor {
    Pink,
    Red,
    Orange,
    Blue,
    Yellow,
    #[default]
    Black,
    White,
    Grey,
    Purple,
    Peach,
    Green,
    Olive,
}

impl AnnotationColor {
    /// Get all palette entries in toolbar order.
    pub fn all() -> &'static [AnnotationColor] {
        &[
            AnnotationColor::Pink,
            AnnotationColor::Red,
            AnnotationColor::Orange,
            AnnotationColor::Blue,
            AnnotationColor::Yellow,
            AnnotationColor::Black,
            AnnotationColor::White,
            AnnotationColor::Grey,
            AnnotationColor::Purple,
            AnnotationColor::Peach,
            AnnotationColor::Green,
            AnnotationColor::Olive,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnnotationColor::Pink => "pink",
            AnnotationColor::Red => "red",
            AnnotationColor::Orange => "orange",
            AnnotationColor::Blue => "blue",
            AnnotationColor::Yellow => "yellow",
            AnnotationColor::Black => "black",
            AnnotationColor::White => "white",
            AnnotationColor::Grey => "grey",
            AnnotationColor::Purple => "purple",
            AnnotationColor::Peach => "peach",
            AnnotationColor::Green => "green",
            AnnotationColor::Olive => "olive",
        }
    }

    /// Get the palette entry as a peniko Color.
    pub fn color(&self) -> Color {
        match self {
            AnnotationColor::Pink => Color::from_rgba8(0xf1, 0xcb, 0xff, 0xff),
            AnnotationColor::Red => Color::from_rgba8(0xdc, 0x26, 0x26, 0xff),
            AnnotationColor::Orange => Color::from_rgba8(0xff, 0xa0, 0x71, 0xff),
            AnnotationColor::Blue => Color::from_rgba8(0xc8, 0xe5, 0xff, 0xff),
            AnnotationColor::Yellow => Color::from_rgba8(0xfe, 0xdd, 0x9e, 0xff),
            AnnotationColor::Black => Color::from_rgba8(0x00, 0x00, 0x00, 0xff),
            AnnotationColor::White => Color::from_rgba8(0xee, 0xee, 0xee, 0xff),
            AnnotationColor::Grey => Color::from_rgba8(0x6b, 0x72, 0x80, 0xff),
            AnnotationColor::Purple => Color::from_rgba8(0xc9, 0xc9, 0xff, 0xff),
            AnnotationColor::Peach => Color::from_rgba8(0xff, 0xbd, 0xbd, 0xff),
            AnnotationColor::Green => Color::from_rgba8(0xe1, 0xf7, 0xd5, 0xff),
            AnnotationColor::Olive => Color::from_rgba8(0x77, 0x8a, 0x35, 0xff),
        }
    }

    /// CSS hex form, `#rrggbb`.
    pub fn hex(&self) -> String {
        let rgba = self.color().to_rgba8();
        format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b)
    }

    /// CSS hex form with an explicit alpha byte, `#rrggbbaa`.
    pub fn hex_with_alpha(&self, alpha: u8) -> String {
        format!("{}{:02x}", self.hex(), alpha)
    }
}

impl fmt::Display for AnnotationColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnnotationColor {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to black, like the toolbar does.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::all()
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        assert_eq!(AnnotationColor::Purple.hex(), "#c9c9ff");
        assert_eq!(AnnotationColor::Olive.hex(), "#778a35");
        assert_eq!(AnnotationColor::White.hex(), "#eeeeee");
        assert_eq!(AnnotationColor::Black.hex(), "#000000");
        assert_eq!(AnnotationColor::Red.hex_with_alpha(0x6e), "#dc26266e");
    }

    #[test]
    fn test_unknown_name_is_black() {
        let color: AnnotationColor = "magenta".parse().unwrap();
        assert_eq!(color, AnnotationColor::Black);
        let color: AnnotationColor = "olive".parse().unwrap();
        assert_eq!(color, AnnotationColor::Olive);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&AnnotationColor::Peach).unwrap();
        assert_eq!(json, "\"peach\"");
    }
}
