//! captionbar Core Engine
//!
//! Burns transcribed captions into a video by extending its canvas with a
//! caption bar. Handles cue documents, adaptive text rasterization, FFmpeg
//! compositing and the end-to-end pipeline.

pub mod captions;
pub mod ffmpeg;
pub mod pipeline;
pub mod render;
pub mod settings;
pub mod text;
pub mod transcription;

mod error;
pub use error::*;
