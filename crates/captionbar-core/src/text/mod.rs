//! Caption Text Rasterization Module
//!
//! Turns one cue's text into a fixed-size, transparent RGBA bitmap sized to
//! the caption bar. The font size is searched downwards until the wrapped
//! text fits the padded bar; rendering failures degrade to a blank bitmap.
//!
//! # Example
//!
//! ```rust,ignore
//! use captionbar_core::captions::CaptionStyle;
//! use captionbar_core::text::{CaptionRasterizer, FontFace};
//!
//! let rasterizer = CaptionRasterizer::new(FontFace::resolve(None), CaptionStyle::default());
//! let bitmap = rasterizer.render("Hello World", 1280, 108, 32);
//! assert_eq!(bitmap.dimensions(), (1280, 108));
//! ```

mod font;
mod layout;
mod raster;

pub use font::{FontFace, GlyphMask, LineMetrics};
pub use layout::{
    block_height, fit_text, measure_line, wrap_words, FitOutcome, FitRequest, FONT_SIZE_STEP,
    MIN_CHARS_PER_LINE,
};
pub use raster::{is_blank, render_text, CaptionRasterizer};

/// Errors that can occur while rasterizing caption text
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("Font unavailable: {0}")]
    FontUnavailable(String),

    #[error("Invalid bitmap dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}
