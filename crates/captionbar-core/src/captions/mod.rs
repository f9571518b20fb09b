//! Caption System Module
//!
//! Provides the caption data flow between transcription and rendering:
//! - Segment and cue data models plus caption styling
//! - SRT timestamp codec (seconds <-> `HH:MM:SS,mmm`)
//! - Cue document serialization and tolerant parsing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caption System                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs     - Data structures (Segment, Cue, CaptionStyle)   │
//! │  timestamp.rs  - SRT timestamp encode/decode                    │
//! │  srt.rs        - Cue document writer and parser                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use captionbar_core::captions::{parse_cue_document, write_cue_document, Segment};
//!
//! let segments = vec![Segment::new(0.0, 2.5, "Hello World")];
//! let document = write_cue_document(&segments)?;
//!
//! let outcome = parse_cue_document(&document);
//! let cues = outcome.require_cues()?;
//! ```

mod models;
mod srt;
pub mod timestamp;

pub use models::{CaptionStyle, Color, Cue, Segment, TextAlignment};
pub use srt::{parse_cue_document, write_cue_document, CueParseOutcome, SkippedBlock};
pub use timestamp::{format_srt_timestamp, parse_srt_timestamp, TimestampError};
