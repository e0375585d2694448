//! Export options: margin preset, background color, page format, output name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConvertError;
use crate::layout::Inset;

/// Default name of the generated document.
pub const DEFAULT_FILE_NAME: &str = "converted.pdf";

/// All options controlling one export.
/// Passed by value into the engine; nothing is shared between exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub verbose: u8,
    pub margin: MarginPreset,
    pub background: Color,
    pub file_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            verbose: 0,
            margin: MarginPreset::None,
            background: Color::WHITE,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

/// Named margin applied symmetrically to all four page edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarginPreset {
    #[default]
    #[serde(alias = "no-margin")]
    None,
    #[serde(alias = "low-margin")]
    Low,
    #[serde(alias = "medium-margin")]
    Medium,
    #[serde(alias = "big-margin")]
    Big,
}

impl MarginPreset {
    pub const ALL: [MarginPreset; 4] = [
        MarginPreset::None,
        MarginPreset::Low,
        MarginPreset::Medium,
        MarginPreset::Big,
    ];

    /// Fixed inset in layout units. Absolute, not proportional to the page.
    pub fn inset(self) -> Inset {
        let v = match self {
            MarginPreset::None => 0.0,
            MarginPreset::Low => 10.0,
            MarginPreset::Medium => 30.0,
            MarginPreset::Big => 70.0,
        };
        Inset { x: v, y: v }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarginPreset::None => "none",
            MarginPreset::Low => "low",
            MarginPreset::Medium => "medium",
            MarginPreset::Big => "big",
        }
    }
}

impl fmt::Display for MarginPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarginPreset {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_suffix("-margin").unwrap_or(&lower);
        match name {
            "none" | "no" => Ok(MarginPreset::None),
            "low" => Ok(MarginPreset::Low),
            "medium" => Ok(MarginPreset::Medium),
            "big" => Ok(MarginPreset::Big),
            _ => Err(ConvertError::InvalidMargin(s.to_string())),
        }
    }
}

/// An 8-bit RGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels scaled to 0.0..=1.0, as PDF fill operators expect.
    pub fn to_unit_rgb(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ConvertError;

    /// Accepts `#rrggbb`, `rrggbb`, `#rgb` and `rgb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConvertError::InvalidColor(s.to_string());
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        match hex.len() {
            6 => {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
                Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
            }
            3 => {
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| invalid())
                };
                Ok(Color::rgb(channel(0)?, channel(1)?, channel(2)?))
            }
            _ => Err(invalid()),
        }
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Page geometry shared by every page of a document.
///
/// Layout happens in "units" where one unit is 4/3 pt, so an image's pixel
/// dimensions are used directly as its unscaled size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFormat {
    pub name: &'static str,
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageFormat {
    /// ISO A4, portrait.
    pub const A4: PageFormat = PageFormat {
        name: "a4",
        width_pt: 595.28,
        height_pt: 841.89,
    };

    pub const POINTS_PER_UNIT: f32 = 96.0 / 72.0;

    pub fn width(&self) -> f32 {
        self.width_pt / Self::POINTS_PER_UNIT
    }

    pub fn height(&self) -> f32 {
        self.height_pt / Self::POINTS_PER_UNIT
    }

    pub fn width_mm(&self) -> f32 {
        self.width_pt * 25.4 / 72.0
    }

    pub fn height_mm(&self) -> f32 {
        self.height_pt * 25.4 / 72.0
    }
}

impl Default for PageFormat {
    fn default() -> Self {
        PageFormat::A4
    }
}
