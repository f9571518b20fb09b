//! Font Resolution
//!
//! Loads an outline font with `fontdue`, falling back to well-known system
//! font locations and finally to a built-in 8x8 bitmap face so that text can
//! always be rendered.

use std::path::{Path, PathBuf};

use font8x8::{UnicodeFonts, BASIC_FONTS, GREEK_FONTS, LATIN_FONTS};
use fontdue::{Font, FontSettings};
use tracing::{debug, warn};

use super::RasterError;

/// Vertical metrics of one text line at a given pixel size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Distance from the line top to the baseline
    pub ascent: f32,
    /// Distance from the baseline to the line bottom (positive)
    pub descent: f32,
}

impl LineMetrics {
    pub fn height(&self) -> f32 {
        self.ascent + self.descent
    }
}

/// Coverage mask of a single rasterized glyph
#[derive(Debug, Clone)]
pub struct GlyphMask {
    pub width: usize,
    pub height: usize,
    /// Horizontal offset from the pen position to the mask's left edge
    pub xmin: i32,
    /// Offset from the baseline to the mask's bottom edge (positive = up)
    pub ymin: i32,
    /// Row-major coverage, 0-255
    pub coverage: Vec<u8>,
}

/// A loaded font face
pub enum FontFace {
    /// TrueType/OpenType face parsed by fontdue
    Outline { font: Font, source: PathBuf },
    /// Built-in 8x8 bitmap glyphs scaled to the requested size
    Builtin,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontFace::Outline { source, .. } => {
                f.debug_struct("Outline").field("source", source).finish()
            }
            FontFace::Builtin => f.write_str("Builtin"),
        }
    }
}

impl FontFace {
    /// Resolves a usable face. Never fails.
    ///
    /// Tries the requested file first, then common system fonts, then the
    /// built-in bitmap face.
    pub fn resolve(requested: Option<&Path>) -> Self {
        if let Some(path) = requested {
            match Self::from_file(path) {
                Ok(face) => return face,
                Err(e) => warn!(path = %path.display(), error = %e, "Falling back from requested font"),
            }
        }

        for candidate in common_font_paths() {
            if !candidate.exists() {
                continue;
            }
            match Self::from_file(&candidate) {
                Ok(face) => {
                    debug!(path = %candidate.display(), "Using system font");
                    return face;
                }
                Err(e) => debug!(path = %candidate.display(), error = %e, "System font unusable"),
            }
        }

        warn!("No outline font available, using built-in bitmap face");
        FontFace::Builtin
    }

    /// Loads an outline face from a font file
    pub fn from_file(path: &Path) -> Result<Self, RasterError> {
        let bytes = std::fs::read(path).map_err(|e| {
            RasterError::FontUnavailable(format!("{}: {}", path.display(), e))
        })?;
        Self::from_bytes(bytes, path.to_path_buf())
    }

    /// Parses an outline face from raw font bytes
    pub fn from_bytes(bytes: Vec<u8>, source: PathBuf) -> Result<Self, RasterError> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| {
            RasterError::FontUnavailable(format!("{}: {}", source.display(), e))
        })?;
        Ok(FontFace::Outline { font, source })
    }

    pub fn builtin() -> Self {
        FontFace::Builtin
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, FontFace::Builtin)
    }

    /// Horizontal advance of `ch` at `px`
    pub fn advance(&self, ch: char, px: f32) -> f32 {
        match self {
            FontFace::Outline { font, .. } => font.metrics(ch, px).advance_width,
            FontFace::Builtin => px,
        }
    }

    /// Kerning adjustment between two characters at `px`
    pub fn kern(&self, left: char, right: char, px: f32) -> f32 {
        match self {
            FontFace::Outline { font, .. } => font.horizontal_kern(left, right, px).unwrap_or(0.0),
            FontFace::Builtin => 0.0,
        }
    }

    pub fn line_metrics(&self, px: f32) -> LineMetrics {
        match self {
            FontFace::Outline { font, .. } => match font.horizontal_line_metrics(px) {
                Some(m) => LineMetrics {
                    ascent: m.ascent,
                    descent: -m.descent,
                },
                None => LineMetrics {
                    ascent: px * 0.8,
                    descent: px * 0.2,
                },
            },
            FontFace::Builtin => LineMetrics {
                ascent: px,
                descent: 0.0,
            },
        }
    }

    /// Rasterizes a glyph into a coverage mask
    pub fn rasterize(&self, ch: char, px: f32) -> GlyphMask {
        match self {
            FontFace::Outline { font, .. } => {
                let (metrics, coverage) = font.rasterize(ch, px);
                GlyphMask {
                    width: metrics.width,
                    height: metrics.height,
                    xmin: metrics.xmin,
                    ymin: metrics.ymin,
                    coverage,
                }
            }
            FontFace::Builtin => rasterize_builtin(ch, px),
        }
    }
}

fn builtin_rows(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| GREEK_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Nearest-neighbour scaling of an 8x8 glyph to a `px`-sized cell
fn rasterize_builtin(ch: char, px: f32) -> GlyphMask {
    let size = px.round().max(1.0) as usize;
    let rows = builtin_rows(ch);
    let mut coverage = vec![0u8; size * size];

    for y in 0..size {
        let row = rows[y * 8 / size];
        for x in 0..size {
            // Bit 0 is the leftmost pixel.
            if row & (1 << (x * 8 / size)) != 0 {
                coverage[y * size + x] = 255;
            }
        }
    }

    GlyphMask {
        width: size,
        height: size,
        xmin: 0,
        ymin: 0,
        coverage,
    }
}

/// Common font locations for the current platform
fn common_font_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        let windir = std::env::var("WINDIR").unwrap_or_else(|_| r"C:\Windows".to_string());
        let fonts = PathBuf::from(windir).join("Fonts");
        paths.push(fonts.join("arial.ttf"));
        paths.push(fonts.join("segoeui.ttf"));
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/Library/Fonts/Arial.ttf"));
        paths.push(PathBuf::from(
            "/System/Library/Fonts/Supplemental/Arial.ttf",
        ));
        paths.push(PathBuf::from("/System/Library/Fonts/Helvetica.ttc"));
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from(
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        ));
        paths.push(PathBuf::from("/usr/share/fonts/TTF/DejaVuSans.ttf"));
        paths.push(PathBuf::from(
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        ));
        paths.push(PathBuf::from(
            "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
        ));
        paths.push(PathBuf::from(
            "/usr/share/fonts/truetype/msttcorefonts/Arial.ttf",
        ));
    }

    paths
}
