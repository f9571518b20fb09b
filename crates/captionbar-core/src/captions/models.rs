//! Caption Data Models
//!
//! Defines the timed text units that flow from the transcriber into the cue
//! document and from the cue document into the compositor, plus the styling
//! applied when a cue is rasterized into the caption bar.

use serde::{Deserialize, Serialize};

// =============================================================================
// Timed Text
// =============================================================================

/// A timed transcript segment as produced by the transcriber
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text (untrimmed)
    pub text: String,
}

impl Segment {
    /// Creates a new segment
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// A single cue recovered from a cue document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// 1-based position in the document
    pub index: usize,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Trimmed caption text (may contain line breaks)
    pub text: String,
}

// =============================================================================
// Caption Styling
// =============================================================================

/// RGBA color value (0-255 for each component)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Creates a new color from RGBA components
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color from RGB components
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// White color
    pub const fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    /// Black color
    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// Horizontal alignment of caption text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    /// Left-aligned
    Left,
    /// Centered (default)
    #[default]
    Center,
    /// Right-aligned
    Right,
}

impl std::str::FromStr for TextAlignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(TextAlignment::Left),
            "center" | "centre" => Ok(TextAlignment::Center),
            "right" => Ok(TextAlignment::Right),
            _ => Err(format!("Unknown alignment: {}", s)),
        }
    }
}

/// Caption bar styling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionStyle {
    /// Font file to load (None = search system fonts, then built-in face)
    pub font_path: Option<std::path::PathBuf>,
    /// Text color
    pub text_color: Color,
    /// Solid color of the caption bar
    pub bar_color: Color,
    /// Text alignment
    pub alignment: TextAlignment,
    /// Horizontal padding as a fraction of the bar width (per side)
    pub padding_x_ratio: f32,
    /// Vertical padding as a fraction of the bar height (per side)
    pub padding_y_ratio: f32,
    /// Gap between wrapped lines as a fraction of the font size
    pub line_spacing_ratio: f32,
    /// Smallest font size the fit search may shrink to
    pub min_font_size: u32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_path: None,
            text_color: Color::black(),
            bar_color: Color::white(),
            alignment: TextAlignment::Center,
            padding_x_ratio: 0.03,
            padding_y_ratio: 0.10,
            line_spacing_ratio: 0.25,
            min_font_size: 10,
        }
    }
}

impl CaptionStyle {
    /// Initial font size for a bar of the given height.
    ///
    /// Short bars start proportionally larger so that a single line still
    /// reads well before the fit search shrinks it.
    pub fn initial_font_size(&self, bar_height: u32) -> u32 {
        let size = if bar_height < 70 {
            ((bar_height as f32 * 0.40) as u32).max(10)
        } else {
            ((bar_height as f32 * 0.30) as u32).max(12)
        };
        size.max(self.min_font_size)
    }
}
