//! Text styling for canvas text boxes: colour, font size and the
//! bold/italic/underline toggles exposed by the format toolbar.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Font sizes offered by the format toolbar, in points.
pub const FONT_SIZE_PRESETS: [f32; 11] = [
    10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 24.0, 28.0, 32.0, 36.0, 48.0,
];

/// Default font size of a fresh text box.
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// Opaque RGB colour, serialised as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or the `#rgb` shorthand (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return None;
        }
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Self { r, g, b })
        } else if hex.len() == 3 {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Self { r, g, b })
        } else {
            None
        }
    }

    /// Lower-case `#rrggbb`.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// RGBA pixel for raster output.
    pub fn to_rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid hex colour: {value:?}"))
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

/// Resolved style of a text box.
///
/// The toggles are stored as CSS keywords (`fontWeight: "bold"`,
/// `fontStyle: "italic"`, `textDecoration: "underline"`) so saved reports
/// keep the web editor's shape. Plain booleans are accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    /// Font size in points.
    pub font_size: f32,
    #[serde(rename = "fontWeight", alias = "bold", with = "css_keyword::weight", default)]
    pub bold: bool,
    #[serde(rename = "fontStyle", alias = "italic", with = "css_keyword::style", default)]
    pub italic: bool,
    #[serde(
        rename = "textDecoration",
        alias = "underline",
        with = "css_keyword::decoration",
        default
    )]
    pub underline: bool,
    #[serde(default)]
    pub color: Color,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            bold: false,
            italic: false,
            underline: false,
            color: Color::BLACK,
        }
    }
}

/// Serde adapters between the boolean toggles and their CSS keywords.
mod css_keyword {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Number(f64),
        Keyword(String),
    }

    fn read<'de, D: Deserializer<'de>>(d: D, on: impl Fn(&str) -> bool) -> Result<bool, D::Error> {
        Ok(match Raw::deserialize(d)? {
            Raw::Flag(b) => b,
            // Numeric font weights: 600 and above render bold.
            Raw::Number(n) => n >= 600.0,
            Raw::Keyword(k) => on(k.trim().to_ascii_lowercase().as_str()),
        })
    }

    pub mod weight {
        use super::*;

        pub fn serialize<S: Serializer>(bold: &bool, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(if *bold { "bold" } else { "normal" })
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
            read(d, |k| match k {
                "bold" | "bolder" => true,
                other => other.parse::<u16>().is_ok_and(|w| w >= 600),
            })
        }
    }

    pub mod style {
        use super::*;

        pub fn serialize<S: Serializer>(italic: &bool, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(if *italic { "italic" } else { "normal" })
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
            read(d, |k| k == "italic" || k == "oblique")
        }
    }

    pub mod decoration {
        use super::*;

        pub fn serialize<S: Serializer>(underline: &bool, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(if *underline { "underline" } else { "none" })
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
            read(d, |k| k.split_whitespace().any(|part| part == "underline"))
        }
    }
}
