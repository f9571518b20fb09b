//! Caption Compositor Module
//!
//! Extends a video's canvas with a caption bar and burns cue text into it.
//!
//! # Modules
//!
//! - `geometry`: Canvas and caption bar dimensions
//! - `timeline`: Cue intervals flattened into non-overlapping spans
//! - `frames`: Raw RGBA caption bar frames resolved from the timeline
//! - `compositor`: FFmpeg encode that stacks the bar under the source

mod compositor;
mod frames;
mod geometry;
mod timeline;

pub use compositor::{BurnRequest, BurnResult, CaptionCompositor, EncodeSettings};
pub use frames::{composite_over, BarFrameGenerator};
pub use geometry::{CanvasGeometry, DEFAULT_BAR_PERCENT};
pub use timeline::{CueSpan, CueTimeline};
